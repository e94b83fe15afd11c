//! Container file openers.
//!
//! A container file (SSD/SDD, DSD/DDD, MMB, HFE, HxC MFM, optionally gzip
//! compressed) holds the sectors of one or more emulated disc surfaces.
//! Each opener interprets the container and returns one block device per
//! surface or slot; `connect_image_file` then identifies the filesystem on
//! each formatted surface and attaches everything to the storage
//! configuration.

mod hfe;
mod hxcmfm;
mod mmb;
mod sdf;

use crate::blockdev::{media_handle, BlockDevice, DecompressedFile, Media, MediaHandle, OsFile};
use crate::error::{Error, Result};
use crate::geometry::{SectorBuffer, SECTOR_BYTES};
use crate::probe::identify_file_system;
use crate::storage::{DriveAllocation, DriveConfig, StorageConfiguration};
use crate::track::Sector;

/// Arrange decoded sectors into LBA order for a [`crate::blockdev::SectorStore`];
/// undecodable sectors stay as holes.
pub(crate) fn sectors_to_blocks(sectors: &[Sector], tracks: u32, spt: u32) -> Vec<Option<SectorBuffer>> {
    let mut blocks: Vec<Option<SectorBuffer>> = vec![None; (tracks * spt) as usize];
    for sector in sectors {
        let lba = u32::from(sector.address.cylinder) * spt + u32::from(sector.address.record);
        if let Some(slot) = blocks.get_mut(lba as usize) {
            let mut buf = [0u8; SECTOR_BYTES];
            buf.copy_from_slice(&sector.data);
            *slot = Some(buf);
        }
    }
    blocks
}

/// One surface or slot exposed by a container.
pub struct ImageSide {
    pub device: Box<dyn BlockDevice>,
    pub formatted: bool,
}

impl std::fmt::Debug for ImageSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageSide")
            .field("formatted", &self.formatted)
            .finish_non_exhaustive()
    }
}

impl ImageSide {
    fn formatted(device: Box<dyn BlockDevice>) -> ImageSide {
        ImageSide {
            device,
            formatted: true,
        }
    }

    fn unformatted(device: Box<dyn BlockDevice>) -> ImageSide {
        ImageSide {
            device,
            formatted: false,
        }
    }
}

fn split_extensions(name: &str) -> Vec<String> {
    let base = name.rsplit('/').next().unwrap_or(name);
    base.split('.').skip(1).map(str::to_lowercase).collect()
}

/// Open a container file and decode it into per-surface block devices.
pub fn open_image_file(name: &str) -> Result<Vec<ImageSide>> {
    let mut extensions = split_extensions(name);
    if extensions.is_empty() {
        return Err(Error::Unrecognized(format!(
            "image file {name} has no extension, so we cannot tell what kind of image it is"
        )));
    }
    let mut compressed = false;
    if extensions.last().map(String::as_str) == Some("gz") {
        compressed = true;
        extensions.pop();
        if extensions.is_empty() {
            return Err(Error::Unrecognized(format!(
                "compressed image file {name} has no additional extension, so we cannot \
                 tell what kind of image it contains"
            )));
        }
    }
    let media: MediaHandle = if compressed {
        media_handle(Media::Decompressed(DecompressedFile::open(name)?))
    } else {
        media_handle(Media::Os(OsFile::open(name)?))
    };

    let ext = extensions.last().map(String::as_str).unwrap_or("");
    match ext {
        "ssd" | "sdd" => sdf::open_noninterleaved(name, compressed, media),
        "dsd" | "ddd" => sdf::open_interleaved(name, compressed, media),
        "mmb" => mmb::open(name, compressed, media),
        "hfe" => hfe::open(name, compressed, media),
        "mfm" => hxcmfm::open(name, compressed, media),
        _ => Err(Error::Unrecognized(format!(
            "image file {name} does not seem to be of a supported type; the extension \
             {ext} is not recognised"
        ))),
    }
}

/// Open `name` and connect every surface it exposes to `storage`.
pub fn connect_image_file(
    name: &str,
    storage: &mut StorageConfiguration,
    how: DriveAllocation,
) -> Result<()> {
    let sides = open_image_file(name)?;
    let mut drives = Vec::with_capacity(sides.len());
    for mut side in sides {
        if !side.formatted {
            drives.push(None);
            continue;
        }
        let geometry = side.device.geometry();
        let format = identify_file_system(&mut *side.device, geometry, false).map_err(|e| {
            Error::Unrecognized(format!(
                "unable to connect {}: {e}",
                side.device.description()
            ))
        })?;
        drives.push(Some(DriveConfig::new(format, side.device)));
    }
    if !storage.connect_drives(drives, how) {
        return Err(Error::Unrecognized(format!(
            "no free drive slots for the surfaces of {name}"
        )));
    }
    Ok(())
}
