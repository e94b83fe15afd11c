//! HxC MFM bitstream images.

use std::collections::BTreeMap;
use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt};
use log::debug;

use super::{sectors_to_blocks, ImageSide};
use crate::bits::{reverse_bit_order, BitStream};
use crate::blockdev::{FileAccess, MediaHandle, SectorStore};
use crate::error::{Error, Result};
use crate::geometry::{Encoding, Geometry, SECTOR_BYTES};
use crate::track::{check_track, decode_mfm_track, Sector};

const HEADER_SIZE: usize = 19;
const TRACK_ENTRY_SIZE: usize = 11;

struct Header {
    tracks: u16,
    sides: u8,
    track_list_offset: u64,
}

fn read_header(media: &MediaHandle) -> Result<Header> {
    let data = media.borrow_mut().read(0, HEADER_SIZE)?;
    if data.len() < HEADER_SIZE || data[..7] != *b"HXCMFM\0" {
        return Err(Error::Unrecognized(
            "HxC MFM header signature is invalid".to_string(),
        ));
    }
    let mut cursor = Cursor::new(&data);
    cursor.set_position(7);
    let tracks = cursor
        .read_u16::<LittleEndian>()
        .map_err(Error::NonFileOs)?;
    let sides = cursor.read_u8().map_err(Error::NonFileOs)?;
    let _rpm = cursor
        .read_u16::<LittleEndian>()
        .map_err(Error::NonFileOs)?;
    let _bitrate = cursor
        .read_u16::<LittleEndian>()
        .map_err(Error::NonFileOs)?;
    let interface_type = cursor.read_u8().map_err(Error::NonFileOs)?;
    let track_list_offset = u64::from(
        cursor
            .read_u32::<LittleEndian>()
            .map_err(Error::NonFileOs)?,
    );
    if track_list_offset < HEADER_SIZE as u64 {
        return Err(Error::Unrecognized(format!(
            "the track list begins at file position {track_list_offset}, \
             which is within the header itself"
        )));
    }
    if sides > 2 {
        return Err(Error::Unsupported(format!(
            "image file encodes more than 2 sides: {sides}"
        )));
    }
    if interface_type != 4 {
        return Err(Error::Unsupported(format!(
            "image file has unsupported interface type {interface_type}"
        )));
    }
    Ok(Header {
        tracks,
        sides,
        track_list_offset,
    })
}

struct TrackData {
    size: u32,
    offset: u64,
}

fn read_track_list(media: &MediaHandle, header: &Header) -> Result<BTreeMap<(u16, u8), TrackData>> {
    let mut result = BTreeMap::new();
    let mut pos = header.track_list_offset;
    loop {
        let raw = media.borrow_mut().read(pos, TRACK_ENTRY_SIZE)?;
        if raw.len() < TRACK_ENTRY_SIZE {
            return Err(Error::Unrecognized(
                "image file ends in the middle of its track list".to_string(),
            ));
        }
        let mut cursor = Cursor::new(&raw);
        let track = cursor
            .read_u16::<LittleEndian>()
            .map_err(Error::NonFileOs)?;
        let side = cursor.read_u8().map_err(Error::NonFileOs)?;
        let size = cursor
            .read_u32::<LittleEndian>()
            .map_err(Error::NonFileOs)?;
        let offset = u64::from(
            cursor
                .read_u32::<LittleEndian>()
                .map_err(Error::NonFileOs)?,
        );
        debug!("track ({track},{side}) data: {size} bytes at offset {offset}");
        result.insert((track, side), TrackData { size, offset });
        if track == header.tracks.saturating_sub(1) && side == header.sides.saturating_sub(1) {
            break;
        }
        pos += TRACK_ENTRY_SIZE as u64;
    }
    Ok(result)
}

fn read_side_sectors(
    media: &MediaHandle,
    side: u8,
    track_list: &BTreeMap<(u16, u8), TrackData>,
) -> Result<Vec<Sector>> {
    let mut all = Vec::new();
    for ((track, entry_side), td) in track_list {
        if *entry_side != side {
            continue;
        }
        let mut raw = media.borrow_mut().read(td.offset, td.size as usize)?;
        if raw.len() != td.size as usize {
            return Err(Error::Unrecognized(format!(
                "track {track} claims {} bytes at offset {} but this does not fit \
                 within the file",
                td.size, td.offset
            )));
        }
        for b in raw.iter_mut() {
            *b = reverse_bit_order(*b);
        }
        let mut sectors = decode_mfm_track(&BitStream::new(&raw));
        sectors.sort_by_key(|s| s.address);
        check_track(&sectors, u32::from(*track), u32::from(side), SECTOR_BYTES)?;
        all.extend(sectors);
    }
    Ok(all)
}

/// Geometry inferred from what was actually decoded: the set of cylinders
/// and the set of record numbers seen.
fn compute_geometry(sectors: &[Sector]) -> Geometry {
    let mut cylinders = std::collections::BTreeSet::new();
    let mut records = std::collections::BTreeSet::new();
    for s in sectors {
        cylinders.insert(s.address.cylinder);
        records.insert(s.address.record);
    }
    Geometry::new(
        cylinders.len() as u32,
        1,
        records.len() as u32,
        Some(Encoding::Mfm),
    )
}

pub fn open(name: &str, compressed: bool, media: MediaHandle) -> Result<Vec<ImageSide>> {
    let header = read_header(&media)?;
    let track_list = read_track_list(&media, &header)?;
    let mut sides = Vec::new();
    for side in 0..header.sides {
        let sectors = read_side_sectors(&media, side, &track_list)?;
        let geometry = compute_geometry(&sectors);
        let blocks = sectors_to_blocks(&sectors, geometry.cylinders, geometry.sectors);
        let description = format!(
            "side {side} of {}HxC MFM file {name}",
            if compressed { "compressed " } else { "" }
        );
        sides.push(ImageSide::formatted(Box::new(SectorStore::new(
            description,
            geometry,
            blocks,
        ))));
    }
    Ok(sides)
}
