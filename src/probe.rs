//! Geometry and filesystem-format probing.
//!
//! Given blockwise access to media of unknown structure (and a filename
//! whose extension may hint at the layout), decide which filesystem format
//! is present and which geometry the container uses. All candidates are
//! considered; filters only ever remove candidates, and the smallest
//! survivor wins.

use log::debug;

use crate::blockdev::BlockSource;
use crate::catalog::{Catalog, CatalogFragment};
use crate::error::{Error, Result};
use crate::filesystem::Format;
use crate::geometry::{Encoding, Geometry, SectorBuffer};
use crate::opus::OpusDiscCatalogue;

/// How the sectors of one filesystem are arranged within a container file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageFileFormat {
    pub geometry: Geometry,
    pub interleaved: bool,
}

impl ImageFileFormat {
    pub fn new(geometry: Geometry, interleaved: bool) -> ImageFileFormat {
        ImageFileFormat {
            geometry,
            interleaved,
        }
    }

    pub fn description(&self) -> String {
        format!(
            "{}interleaved file, {}",
            if self.interleaved { "" } else { "non-" },
            self.geometry.description()
        )
    }
}

/// Read the catalog fragment at `location`; `Ok(Err(reason))` means the
/// media is readable there but does not hold a valid catalog.
fn catalog_fragment_at(
    source: &mut dyn BlockSource,
    location: u64,
) -> Result<std::result::Result<CatalogFragment, String>> {
    let names = match source.read_block(location)? {
        Some(buf) => buf,
        None => {
            return Ok(Err(format!(
                "media cannot contain a catalog at logical block address {location} \
                 because that sector is not readable"
            )))
        }
    };
    let metadata = match source.read_block(location + 1)? {
        Some(buf) => buf,
        None => {
            return Ok(Err(format!(
                "media cannot contain a catalog at logical block address {} \
                 because that sector is not readable",
                location + 1
            )))
        }
    };
    let fragment = CatalogFragment::parse(Format::Acorn, location, &names, &metadata);
    match fragment.validate() {
        Ok(()) => Ok(Ok(fragment)),
        Err(reason) => Ok(Err(reason)),
    }
}

fn smells_like_hdfs(sec1: &SectorBuffer) -> bool {
    sec1[0x06] & 8 != 0
}

fn hdfs_sector_count(sec1: &SectorBuffer) -> Result<u32> {
    let sectors_per_side = u32::from(sec1[0x07]) | (u32::from(sec1[0x06]) & 3) << 8;
    if sec1[0x06] & 4 != 0 {
        // The source material for double-sided HDFS layouts is incomplete,
        // so refuse rather than guess.
        return Err(Error::Unsupported(
            "double-sided HDFS discs are not supported".to_string(),
        ));
    }
    Ok(sectors_per_side)
}

fn smells_like_watford(source: &mut dyn BlockSource, sec1: &SectorBuffer) -> Result<bool> {
    // Watford DFS doubles the catalog into sectors 2 and 3 and puts
    // recognition bytes at the start of sector 2. A DFS-format disc could
    // carry those bytes inside a file body, so first check whether any
    // file of the standard catalog starts in sector 2.
    let last_entry_pos = sec1[0x05];
    let mut pos = 8usize;
    while pos <= usize::from(last_entry_pos).min(31 * 8) {
        if sec1[pos + 7] == 2 {
            debug!("eliminated Watford DFS because sector 2 is in use by a file");
            return Ok(false);
        }
        pos += 8;
    }
    match source.read_block(2)? {
        None => {
            debug!("eliminated Watford DFS because the media is not long enough for a 62-file catalog");
            Ok(false)
        }
        Some(sec2) => {
            if sec2[..8].iter().all(|&b| b == 0xAA) {
                Ok(true)
            } else {
                debug!("eliminated Watford DFS because the marker bytes are not present");
                Ok(false)
            }
        }
    }
}

/// Returns the total sector count when the media carries a valid Opus DDOS
/// disc catalogue.
fn smells_like_opus_ddos(source: &mut dyn BlockSource) -> Result<Option<u32>> {
    let sector16 = match source.read_block(16)? {
        Some(buf) => buf,
        None => {
            debug!("eliminated Opus DDOS because the disc has no sector 16");
            return Ok(None);
        }
    };
    if sector16[3] != 18 {
        debug!(
            "eliminated Opus DDOS because the sectors-per-track field is {} instead of 18",
            sector16[3]
        );
        return Ok(None);
    }
    // Sector 16 also records the total sectors and sectors per track, so
    // the volume list can be cross-checked for self-consistency even
    // before the geometry is known.
    let disc_cat = match OpusDiscCatalogue::parse(&sector16, None) {
        Ok(cat) => cat,
        Err(Error::BadFileSystem(reason)) => {
            debug!("eliminated Opus DDOS: {reason}");
            return Ok(None);
        }
        Err(e) => return Err(e),
    };
    if disc_cat.volume_locations().is_empty() {
        debug!("eliminated Opus DDOS because the disc catalogue lists no volumes");
        return Ok(None);
    }
    for loc in disc_cat.volume_locations() {
        if loc.start_sector() <= 17 {
            debug!(
                "eliminated Opus DDOS because volume {} would start inside track 0",
                loc.volume()
            );
            return Ok(None);
        }
        let root = match Catalog::read(Format::OpusDdos, loc.catalog_location(), source) {
            Ok(root) => root,
            Err(Error::BadFileSystem(reason)) => {
                debug!("eliminated Opus DDOS: catalog for volume {}: {reason}", loc.volume());
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        if let Err(reason) = root.validate() {
            debug!(
                "eliminated Opus DDOS because the catalog for volume {} would be invalid: {reason}",
                loc.volume()
            );
            return Ok(None);
        }
    }
    let total = disc_cat.total_sectors();
    if total == 0 {
        debug!("eliminated Opus DDOS because the total sectors field of sector 16 is zero");
        return Ok(None);
    }
    // Emulators sometimes truncate images; reject media physically shorter
    // than the metadata claims.
    if source.read_block(u64::from(total) - 1)?.is_none() {
        debug!(
            "eliminated Opus DDOS because sector {} is not readable",
            total - 1
        );
        return Ok(None);
    }
    match total {
        // 35 tracks is unusual but the Opus FORMAT command will produce it.
        630 | 720 | 1440 => Ok(Some(total)),
        _ => {
            debug!(
                "eliminated Opus DDOS because the total sectors field is {total}, \
                 not one of 630, 720 or 1440"
            );
            Ok(None)
        }
    }
}

/// Decide the filesystem format and its declared sector count from the
/// self-descriptions in the first sectors of the media.
pub fn probe_format(source: &mut dyn BlockSource) -> Result<(Format, u32)> {
    let sec1 = source.read_block(1)?.ok_or_else(|| {
        Error::Unrecognized("failed to read catalog from sector 1".to_string())
    })?;

    if smells_like_hdfs(&sec1) {
        return Ok((Format::Hdfs, hdfs_sector_count(&sec1)?));
    }
    if smells_like_watford(source, &sec1)? {
        let frag = match catalog_fragment_at(source, 0)? {
            Ok(frag) => frag,
            Err(reason) => return Err(Error::Unrecognized(reason)),
        };
        return Ok((Format::Watford, frag.total_sectors()));
    }
    if let Some(total) = smells_like_opus_ddos(source)? {
        return Ok((Format::OpusDdos, total));
    }
    match catalog_fragment_at(source, 0)? {
        Ok(frag) => Ok((Format::Acorn, frag.total_sectors())),
        Err(reason) => Err(Error::Unrecognized(format!(
            "unable to find a file system match; for example, this doesn't seem to be \
             an Acorn DFS disc because: {reason}"
        ))),
    }
}

fn sectors_per_track_options(encoding: Encoding) -> &'static [u32] {
    match encoding {
        Encoding::Fm => &[10],
        Encoding::Mfm => &[18, 16],
    }
}

/// Enumerate the candidate layouts, narrowed by any filename hints.
pub fn make_candidate_list(name: &str) -> Vec<ImageFileFormat> {
    let mut encoding_hint = None;
    let mut interleaving_hint = None;
    let mut sides_hint = None;
    if name.ends_with(".ssd") || name.ends_with(".sdd") {
        interleaving_hint = Some(false);
        // might be 1 or 2 sides
    }
    if name.ends_with(".dsd") || name.ends_with(".ddd") {
        interleaving_hint = Some(true);
        sides_hint = Some(2);
    }
    if name.ends_with(".ssd") || name.ends_with(".dsd") {
        encoding_hint = Some(Encoding::Fm);
    }
    if name.ends_with(".sdd") || name.ends_with(".ddd") {
        encoding_hint = Some(Encoding::Mfm);
    }

    let encodings: &[Encoding] = match encoding_hint {
        Some(Encoding::Fm) => &[Encoding::Fm],
        Some(Encoding::Mfm) => &[Encoding::Mfm],
        None => &[Encoding::Fm, Encoding::Mfm],
    };
    let sides: &[u32] = if sides_hint.is_some() { &[2] } else { &[2, 1] };
    let interleavings: &[bool] = match interleaving_hint {
        Some(true) => &[true],
        Some(false) => &[false],
        None => &[false, true],
    };

    let mut candidates = Vec::with_capacity(48);
    for &encoding in encodings {
        for &heads in sides {
            // Opus DDOS will format 35-track discs.
            for &tracks in &[40u32, 80, 35] {
                for &sectors in sectors_per_track_options(encoding) {
                    let geometry = Geometry::new(tracks, heads, sectors, Some(encoding));
                    for &interleaved in interleavings {
                        candidates.push(ImageFileFormat::new(geometry, interleaved));
                    }
                }
            }
        }
    }
    candidates
}

/// Filter the candidate geometries against the filesystem's declared sector
/// count and pick the best survivor.
pub fn probe_geometry(
    source: &mut dyn BlockSource,
    format: Format,
    total_sectors: u32,
    candidates: &[ImageFileFormat],
) -> Result<ImageFileFormat> {
    // A single-sided filesystem only ever reads one side, so counting both
    // sides of a two-sided 40-track candidate would wrongly let it stand in
    // for the single-sided 80-track layout the data actually has.
    let single_sided = format.is_single_sided();
    let mut possible: Vec<ImageFileFormat> = Vec::with_capacity(candidates.len());
    for cand in candidates {
        let available = if single_sided {
            cand.geometry.cylinders * cand.geometry.sectors
        } else {
            cand.geometry.total_sectors()
        };
        if available < total_sectors {
            debug!(
                "eliminated {} because it has only {available} sectors available but the \
                 file system needs {total_sectors}",
                cand.description()
            );
            continue;
        }
        // The candidate must also account for the whole container: if the
        // media still has data past the candidate's last sector, the real
        // layout is bigger than this guess (a 40-track single-sided guess
        // would silently ignore the second half of a 200 KiB image).
        if source
            .read_block(u64::from(cand.geometry.total_sectors()))?
            .is_some()
        {
            debug!(
                "eliminated {} because the media extends past its last sector",
                cand.description()
            );
            continue;
        }
        possible.push(*cand);
    }

    if possible.len() > 1 {
        // A two-sided candidate implies a second catalog where the other
        // side begins; requiring it distinguishes 40-track two-sided files
        // from 80-track one-sided ones. The other side's filesystem might
        // legitimately be absent, so this filter only runs when the guess
        // would otherwise stay ambiguous.
        let mut filtered = Vec::with_capacity(possible.len());
        for cand in &possible {
            if cand.geometry.heads == 1 {
                filtered.push(*cand);
                continue;
            }
            let other = u64::from(cand.geometry.sectors)
                * u64::from(if cand.interleaved {
                    1
                } else {
                    cand.geometry.cylinders
                });
            match catalog_fragment_at(source, other)? {
                Ok(_) => filtered.push(*cand),
                Err(reason) => {
                    debug!(
                        "eliminated {} because this two-sided format should also have a \
                         catalog at sector {other}: {reason}",
                        cand.description()
                    );
                }
            }
        }
        possible = filtered;
    }

    // Prefer geometries with 10 or 18 sectors per track over 16 (16 is rare
    // for DFS, common for ADFS); among equals, pick the smallest, and on a
    // tie the earliest candidate.
    possible
        .into_iter()
        .enumerate()
        .min_by(|(li, left), (ri, right)| {
            let left_disfavoured = left.geometry.sectors == 16;
            let right_disfavoured = right.geometry.sectors == 16;
            left_disfavoured
                .cmp(&right_disfavoured)
                .then(
                    left.geometry
                        .total_sectors()
                        .cmp(&right.geometry.total_sectors()),
                )
                .then(li.cmp(ri))
        })
        .map(|(_, ff)| ff)
        .ok_or_else(|| {
            Error::FailedToGuessFormat("all known formats have been eliminated".to_string())
        })
}

/// Probe both the filesystem format and the geometry.
pub fn probe(
    source: &mut dyn BlockSource,
    candidates: &[ImageFileFormat],
) -> Result<(Format, ImageFileFormat)> {
    let (format, total_sectors) = probe_format(source)?;
    debug!(
        "file system format appears to be {} occupying {total_sectors} sectors",
        format.name()
    );
    let ff = probe_geometry(source, format, total_sectors, candidates)?;
    debug!("selected format: {}", ff.description());
    Ok((format, ff))
}

/// Identify the layout of an image file of unknown geometry.
pub fn identify_image(source: &mut dyn BlockSource, name: &str) -> Result<ImageFileFormat> {
    let candidates = make_candidate_list(name);
    Ok(probe(source, &candidates)?.1)
}

/// Identify the filesystem format on a device whose geometry is known.
pub fn identify_file_system(
    source: &mut dyn BlockSource,
    geometry: Geometry,
    interleaved: bool,
) -> Result<Format> {
    let only = [ImageFileFormat::new(geometry, interleaved)];
    Ok(probe(source, &only)?.0)
}
