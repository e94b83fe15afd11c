//! MMB archives: up to 511 single-sided disc images in one file.
//!
//! The file starts with 32 reserved sectors holding 16-byte records. The
//! first record is a header (which drives load at boot; we don't care);
//! each subsequent record describes one slot, with byte 15 giving the slot
//! status. Slot N's image follows the reserved area at an offset of N
//! 80-track disc images.

use log::warn;

use super::ImageSide;
use crate::blockdev::{BlockSource, Blockwise, FileView, MediaHandle};
use crate::error::{Error, Result};
use crate::geometry::{Encoding, Geometry, SECTOR_BYTES};

const MMB_ENTRY_BYTES: usize = 16;
const MMB_RESERVED_SECTORS: u64 = 32;

const STATUS_READ_ONLY: u8 = 0x00;
const STATUS_READ_WRITE: u8 = 0x0F;
const STATUS_UNFORMATTED: u8 = 0xF0;
const STATUS_MISSING: u8 = 0xFF;

pub fn open(name: &str, compressed: bool, media: MediaHandle) -> Result<Vec<ImageSide>> {
    let slot_geometry = Geometry::new(80, 1, 10, Some(Encoding::Fm));
    let slot_sectors = u64::from(slot_geometry.total_sectors());
    let entries_per_sector = SECTOR_BYTES / MMB_ENTRY_BYTES;
    let mut blocks = Blockwise::new(media.clone());
    let mut sides = Vec::new();
    for sec in 0..MMB_RESERVED_SECTORS {
        let buf = blocks
            .read_block(sec)?
            .ok_or_else(|| Error::BadFileSystem("MMB file is too short".to_string()))?;
        for i in 0..entries_per_sector {
            if sec == 0 && i == 0 {
                continue; // the header record
            }
            let slot = sec as usize * entries_per_sector + i - 1;
            let entry = &buf[i * MMB_ENTRY_BYTES..(i + 1) * MMB_ENTRY_BYTES];
            let status = entry[0x0F];
            let (status_desc, present) = match status {
                STATUS_READ_ONLY => ("read-only", true),
                STATUS_READ_WRITE => ("read-write", true),
                STATUS_UNFORMATTED => ("unformatted", false),
                STATUS_MISSING => ("missing", false),
                _ => {
                    warn!("MMB entry {slot} has unexpected status {status:#04X}");
                    ("unknown", false)
                }
            };
            let description = format!(
                "{status_desc} slot {slot:3} of {}MMB file {name}",
                if compressed { "compressed " } else { "" }
            );
            if present {
                let initial_skip = MMB_RESERVED_SECTORS + slot as u64 * slot_sectors;
                sides.push(ImageSide::formatted(Box::new(FileView::new(
                    media.clone(),
                    description,
                    slot_geometry,
                    initial_skip,
                    slot_sectors,
                    0,
                    slot_sectors,
                ))));
            } else {
                sides.push(ImageSide::unformatted(Box::new(FileView::unformatted(
                    description,
                    slot_geometry,
                ))));
            }
        }
    }
    Ok(sides)
}
