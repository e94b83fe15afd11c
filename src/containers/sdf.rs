//! Sector dump files: plain (SSD/SDD) and track-interleaved (DSD/DDD).

use super::ImageSide;
use crate::blockdev::{Blockwise, FileView, MediaHandle};
use crate::error::Result;
use crate::probe::identify_image;

fn describe(compressed: bool, kind: &str, name: &str) -> String {
    format!(
        "{}{kind} file {name}",
        if compressed { "compressed " } else { "" }
    )
}

/// A raw concatenation of sectors: all of side 0, then (for a two-sided
/// image) all of side 1.
pub fn open_noninterleaved(
    name: &str,
    compressed: bool,
    media: MediaHandle,
) -> Result<Vec<ImageSide>> {
    let format = identify_image(&mut Blockwise::new(media.clone()), name)?;
    let geometry = format.geometry;
    let side_geometry = geometry.single_sided();
    let side_len = u64::from(side_geometry.total_sectors());
    let mut sides = Vec::new();
    let mut skip = 0u64;
    for surface in 0..geometry.heads {
        let mut description = describe(compressed, "non-interleaved", name);
        if geometry.heads > 1 {
            description.push_str(&format!(" side {surface}"));
        }
        sides.push(ImageSide::formatted(Box::new(FileView::new(
            media.clone(),
            description,
            side_geometry,
            skip,
            side_len,
            0,
            side_len,
        ))));
        skip += side_len;
    }
    Ok(sides)
}

/// Sectors interleaved by track: side 0 track 0, side 1 track 0, side 0
/// track 1, and so on.
pub fn open_interleaved(name: &str, compressed: bool, media: MediaHandle) -> Result<Vec<ImageSide>> {
    let format = identify_image(&mut Blockwise::new(media.clone()), name)?;
    let geometry = format.geometry;
    let side_geometry = geometry.single_sided();
    let track_len = u64::from(side_geometry.sectors);
    let side_len = u64::from(side_geometry.total_sectors());
    let mut sides = Vec::new();
    for surface in 0..2u64 {
        let description = format!(
            "side {surface} of {}",
            describe(compressed, "interleaved", name)
        );
        sides.push(ImageSide::formatted(Box::new(FileView::new(
            media.clone(),
            description,
            side_geometry,
            surface * track_len,
            track_len,
            track_len,
            side_len,
        ))));
    }
    Ok(sides)
}
