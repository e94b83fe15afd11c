//! HFE (HxC Floppy Emulator) bitstream images, versions 1 and 3.
//!
//! A 512-byte header is followed by a per-track lookup table at offset 512.
//! Each track's data holds both sides in alternating 256-byte blocks, with
//! bits stored LSB-first and the FM cell stream recorded at twice the data
//! rate, so decoding reverses the bit order and then keeps every second
//! bit. HFE v3 additionally embeds opcodes in the track stream.

use std::io::Cursor;

use byteorder::{LittleEndian, ReadBytesExt};
use log::debug;

use super::{sectors_to_blocks, ImageSide};
use crate::bits::{reverse_bit_order, BitStream};
use crate::blockdev::{FileAccess, MediaHandle, SectorStore};
use crate::error::{Error, Result};
use crate::geometry::{Encoding, Geometry, SECTOR_BYTES};
use crate::track::{check_track, decode_fm_track, Sector};

const ISOIBM_MFM_ENCODING: u8 = 0x00;
const AMIGA_MFM_ENCODING: u8 = 0x01;
const ISOIBM_FM_ENCODING: u8 = 0x02;
const EMU_FM_ENCODING: u8 = 0x03;

const OPCODE_MASK: u8 = 0xF0;
const NOP_OPCODE: u8 = 0xF0;
const SETINDEX_OPCODE: u8 = 0xF1;
const SETBITRATE_OPCODE: u8 = 0xF2;
const SKIPBITS_OPCODE: u8 = 0xF3;
const RAND_OPCODE: u8 = 0xF4;

/// Blocks within each track alternate 256 bytes for side 0, 256 for side 1.
const SIDE_BLOCK_SIZE: usize = 256;

struct Header {
    version: u8,
    tracks: u8,
    sides: u8,
    track_encoding: u8,
    track0s0_altencoding: u8,
    track0s0_encoding: u8,
    track0s1_altencoding: u8,
    track0s1_encoding: u8,
}

fn encoding_name(val: u8) -> &'static str {
    match val {
        ISOIBM_MFM_ENCODING => "ISO/IBM MFM",
        AMIGA_MFM_ENCODING => "Amiga MFM",
        ISOIBM_FM_ENCODING => "ISO/IBM FM",
        EMU_FM_ENCODING => "EMU FM",
        _ => "unknown",
    }
}

fn decode_header(data: &[u8]) -> Result<Header> {
    let version = if data[..8] == *b"HXCPICFE" {
        1
    } else if data[..8] == *b"HXCHFEV3" {
        3
    } else {
        return Err(Error::Unrecognized(format!(
            "invalid HFE header signature {:02X?}",
            &data[..8]
        )));
    };
    let mut cursor = Cursor::new(data);
    cursor.set_position(9);
    let tracks = cursor.read_u8().map_err(Error::NonFileOs)?;
    let sides = cursor.read_u8().map_err(Error::NonFileOs)?;
    let track_encoding = cursor.read_u8().map_err(Error::NonFileOs)?;
    cursor.set_position(22);
    let track0s0_altencoding = cursor.read_u8().map_err(Error::NonFileOs)?;
    let track0s0_encoding = cursor.read_u8().map_err(Error::NonFileOs)?;
    let track0s1_altencoding = cursor.read_u8().map_err(Error::NonFileOs)?;
    let track0s1_encoding = cursor.read_u8().map_err(Error::NonFileOs)?;
    Ok(Header {
        version,
        tracks,
        sides,
        track_encoding,
        track0s0_altencoding,
        track0s0_encoding,
        track0s1_altencoding,
        track0s1_encoding,
    })
}

impl Header {
    fn encoding_of_track(&self, side: u32, track: u32) -> u8 {
        if track == 0 {
            if side == 0 {
                if self.track0s0_altencoding == 0 {
                    return self.track0s0_encoding;
                }
            } else if self.track0s1_altencoding == 0 {
                return self.track0s1_encoding;
            }
        }
        self.track_encoding
    }
}

struct TrackEntry {
    offset_in_blocks: u16,
    raw_len: u16,
}

impl TrackEntry {
    /// Track data occupies whole 512-byte blocks in the file.
    fn len(&self) -> usize {
        let len = usize::from(self.raw_len);
        if len & 0x1FF != 0 {
            (len & !0x1FF) + 0x200
        } else {
            len
        }
    }

    fn file_offset(&self) -> u64 {
        u64::from(self.offset_in_blocks) * 512
    }
}

fn read_track_lut(media: &MediaHandle, tracks: u8) -> Result<Vec<TrackEntry>> {
    let want = usize::from(tracks) * 4;
    let buf = media.borrow_mut().read(512, want)?;
    if buf.len() != want {
        return Err(Error::Unrecognized(format!(
            "file is too short to contain a LUT for the {tracks} tracks indicated \
             in the HFE file header"
        )));
    }
    let mut cursor = Cursor::new(&buf);
    let mut result = Vec::with_capacity(usize::from(tracks));
    for _ in 0..tracks {
        let offset_in_blocks = cursor
            .read_u16::<LittleEndian>()
            .map_err(Error::NonFileOs)?;
        let raw_len = cursor
            .read_u16::<LittleEndian>()
            .map_err(Error::NonFileOs)?;
        result.push(TrackEntry {
            offset_in_blocks,
            raw_len,
        });
    }
    Ok(result)
}

/// Expand one side-block of HFE track data into the FM cell stream:
/// process v3 opcodes, then keep every second bit of the double-rate
/// recording.
fn copy_hfe(hfe3: bool, input: &[u8], dest: &mut Vec<u8>) -> Result<()> {
    let mut take_this_bit = false;
    let mut got_bits = 0u32;
    let mut out = 0u8;
    let mut iter = input.iter().copied();
    while let Some(mut byte) = iter.next() {
        let mut skipbits = 0u8;
        if hfe3 && byte & OPCODE_MASK == OPCODE_MASK {
            match byte {
                NOP_OPCODE => continue,
                // An index pulse tells a real controller where the track
                // wraps; our input is finite so we can ignore it.
                SETINDEX_OPCODE => continue,
                SETBITRATE_OPCODE => {
                    if iter.next().is_none() {
                        debug!("track data ends inside an HFEv3 SETBITRATE instruction");
                    }
                    continue;
                }
                SKIPBITS_OPCODE => {
                    skipbits = match iter.next() {
                        Some(n) => n,
                        None => {
                            debug!("track data ends inside an HFEv3 SKIPBITS instruction");
                            continue;
                        }
                    };
                    byte = match iter.next() {
                        Some(b) => b,
                        None => {
                            debug!("track data ends inside an HFEv3 SKIPBITS instruction");
                            continue;
                        }
                    };
                }
                // RAND marks weak bits. Emit no clock bits at all, so the
                // decoder loses sync there rather than reading noise.
                RAND_OPCODE => byte = 0,
                _ => {
                    return Err(Error::Unrecognized(format!(
                        "track contains an invalid HFEv3 opcode {byte:#04X}"
                    )));
                }
            }
        }
        for bitnum in 0..8 {
            if skipbits > 0 {
                skipbits -= 1;
                continue;
            }
            if take_this_bit {
                let bit = byte & (0x80 >> bitnum) != 0;
                out = (out << 1) | u8::from(bit);
                got_bits += 1;
                if got_bits == 8 {
                    dest.push(out);
                    out = 0;
                    got_bits = 0;
                }
            }
            take_this_bit = !take_this_bit;
        }
    }
    Ok(())
}

fn read_side_sectors(
    media: &MediaHandle,
    header: &Header,
    lut: &[TrackEntry],
    side: u32,
) -> Result<(Vec<Sector>, u32)> {
    let mut all = Vec::new();
    let mut sectors_per_track: Option<usize> = None;
    for (track, entry) in lut.iter().enumerate() {
        let encoding = header.encoding_of_track(side, track as u32);
        if encoding != ISOIBM_FM_ENCODING {
            return Err(Error::Unsupported(format!(
                "track {track} has unsupported track encoding value {encoding} ({})",
                encoding_name(encoding)
            )));
        }
        let mut raw = media.borrow_mut().read(entry.file_offset(), entry.len())?;
        for b in raw.iter_mut() {
            *b = reverse_bit_order(*b);
        }
        // Pick out this side's alternating 256-byte blocks and expand them
        // into the cell stream.
        let mut stream = Vec::with_capacity(raw.len() / 4);
        let mut begin = SIDE_BLOCK_SIZE * side as usize;
        while begin < raw.len() {
            let end = (begin + SIDE_BLOCK_SIZE).min(raw.len());
            copy_hfe(header.version == 3, &raw[begin..end], &mut stream)?;
            begin += SIDE_BLOCK_SIZE * 2;
        }

        let mut sectors = decode_fm_track(&BitStream::new(&stream));
        debug!("found {} sectors on track {track} side {side}", sectors.len());
        match sectors_per_track {
            None => sectors_per_track = Some(sectors.len()),
            Some(expected) if expected != sectors.len() => {
                return Err(Error::Unsupported(format!(
                    "track {track} has {} sectors but other tracks have {expected}",
                    sectors.len()
                )));
            }
            Some(_) => {}
        }
        sectors.sort_by_key(|s| s.address);
        check_track(&sectors, track as u32, side, SECTOR_BYTES)?;
        all.extend(sectors);
    }
    let spt = sectors_per_track.unwrap_or(0) as u32;
    Ok((all, spt))
}

pub fn open(name: &str, compressed: bool, media: MediaHandle) -> Result<Vec<ImageSide>> {
    let header_data = media.borrow_mut().read(0, 512)?;
    if header_data.len() < 512 {
        return Err(Error::Unrecognized(
            "file is too short to contain the HFE file header".to_string(),
        ));
    }
    let header = decode_header(&header_data)?;
    let encoding = match header.track_encoding {
        ISOIBM_MFM_ENCODING | AMIGA_MFM_ENCODING => Encoding::Mfm,
        ISOIBM_FM_ENCODING | EMU_FM_ENCODING => Encoding::Fm,
        other => {
            return Err(Error::Unsupported(format!(
                "disc has unsupported encoding {other} ({})",
                encoding_name(other)
            )));
        }
    };
    let lut = read_track_lut(&media, header.tracks)?;

    let mut sides = Vec::new();
    for side in 0..u32::from(header.sides) {
        let (sectors, spt) = read_side_sectors(&media, &header, &lut, side)?;
        let geometry = Geometry::new(u32::from(header.tracks), 1, spt, Some(encoding));
        let blocks = sectors_to_blocks(&sectors, u32::from(header.tracks), spt);
        let description = format!(
            "side {side} of {}HFE file {name}",
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
