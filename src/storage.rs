//! The storage configuration: which block device sits behind each drive
//! number, and how to mount a volume from it.

use std::collections::BTreeMap;
use std::io::Write;

use crate::blockdev::{BlockDevice, SectorCache};
use crate::error::{Error, Result};
use crate::filesystem::{FileSystem, Format, Volume};
use crate::names::{SurfaceSelector, VolumeSelector};

/// Sectors of each drive kept in the write-through cache; enough to cover
/// the catalog.
const CACHED_SECTORS: usize = 4;

/// How surfaces are assigned when an image exposes several sides or slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveAllocation {
    /// Use the next free surface for each side.
    First,
    /// Allocate in pairs, so a two-sided image occupies n and n+2 the way
    /// the two sides of a physical drive do.
    Physical,
}

/// A formatted surface: its filesystem format and the device holding it.
pub struct DriveConfig {
    format: Format,
    device: SectorCache,
}

impl DriveConfig {
    pub fn new(format: Format, device: Box<dyn BlockDevice>) -> DriveConfig {
        DriveConfig {
            format,
            device: SectorCache::new(device, CACHED_SECTORS),
        }
    }

    pub fn format(&self) -> Format {
        self.format
    }

    pub fn device(&mut self) -> &mut SectorCache {
        &mut self.device
    }
}

/// A mounted volume: the parsed filesystem plus the borrowed device needed
/// to read file bodies out of it.
pub struct MountedVolume<'a> {
    pub fs: FileSystem,
    pub device: &'a mut SectorCache,
    subvolume: Option<char>,
}

impl std::fmt::Debug for MountedVolume<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MountedVolume")
            .field("subvolume", &self.subvolume)
            .finish_non_exhaustive()
    }
}

impl MountedVolume<'_> {
    pub fn volume(&self) -> Result<&Volume> {
        self.fs.volume(self.subvolume)
    }
}

/// Maps surface numbers to drives. `None` entries are connected but
/// unformatted surfaces (e.g. an absent MMB slot).
#[derive(Default)]
pub struct StorageConfiguration {
    drives: BTreeMap<SurfaceSelector, Option<DriveConfig>>,
}

impl StorageConfiguration {
    pub fn new() -> StorageConfiguration {
        StorageConfiguration::default()
    }

    pub fn is_drive_connected(&self, surface: SurfaceSelector) -> bool {
        self.drives.contains_key(&surface)
    }

    fn sequence_fits(&self, start: u32, count: usize) -> bool {
        if self.is_drive_connected(SurfaceSelector(start).opposite_surface()) {
            return false;
        }
        (0..count as u32).all(|i| !self.is_drive_connected(SurfaceSelector(start + 2 * i)))
    }

    /// Attach the surfaces of one image file. Returns false when no layout
    /// satisfying the allocation policy exists.
    pub fn connect_drives(
        &mut self,
        drives: Vec<Option<DriveConfig>>,
        how: DriveAllocation,
    ) -> bool {
        match how {
            DriveAllocation::Physical => {
                let count = drives.len();
                let mut base = 0u32;
                loop {
                    if self.sequence_fits(base, count) {
                        for (i, drive) in drives.into_iter().enumerate() {
                            self.drives
                                .insert(SurfaceSelector(base + 2 * i as u32), drive);
                        }
                        return true;
                    }
                    base = match base.checked_add(1) {
                        Some(n) => n,
                        None => return false,
                    };
                }
            }
            DriveAllocation::First => {
                let mut next = 0u32;
                for drive in drives {
                    while self.is_drive_connected(SurfaceSelector(next)) {
                        next += 1;
                    }
                    self.drives.insert(SurfaceSelector(next), drive);
                }
                true
            }
        }
    }

    pub fn occupied_surfaces(&self) -> Vec<SurfaceSelector> {
        self.drives.keys().copied().collect()
    }

    pub fn drive_format(&self, surface: SurfaceSelector) -> Option<Format> {
        self.drives
            .get(&surface)
            .and_then(|d| d.as_ref())
            .map(|d| d.format())
    }

    /// The device in `surface`, or an error naming the empty/unformatted
    /// drive.
    pub fn select_drive(&mut self, surface: SurfaceSelector) -> Result<&mut DriveConfig> {
        match self.drives.get_mut(&surface) {
            None => Err(Error::MediaNotPresent(format!(
                "there is no disc in drive {surface}"
            ))),
            Some(None) => Err(Error::MediaNotPresent(format!(
                "the disc in drive {surface} is unformatted"
            ))),
            Some(Some(config)) => Ok(config),
        }
    }

    /// Parse and mount the filesystem on one surface.
    pub fn mount_fs(&mut self, surface: SurfaceSelector) -> Result<(FileSystem, &mut SectorCache)> {
        let config = self.select_drive(surface)?;
        let format = config.format();
        let geometry = config.device().geometry();
        let device = config.device();
        let fs = FileSystem::mount(&mut *device, format, geometry)?;
        Ok((fs, device))
    }

    /// Mount a specific volume.
    pub fn mount(&mut self, vol: &VolumeSelector) -> Result<MountedVolume<'_>> {
        let subvolume = vol.subvolume;
        let (fs, device) = self.mount_fs(vol.surface)?;
        // Fail now if the requested volume is absent.
        fs.volume(subvolume)?;
        Ok(MountedVolume {
            fs,
            device,
            subvolume,
        })
    }

    /// Describe every slot up to at least the default last Acorn drive.
    pub fn show_configuration(&mut self, out: &mut dyn Write) -> std::io::Result<()> {
        let limit = self
            .drives
            .keys()
            .last()
            .copied()
            .unwrap_or(SurfaceSelector(0))
            .max(SurfaceSelector::acorn_default_last_surface());
        for n in 0..=limit.0 {
            let surface = SurfaceSelector(n);
            match self.drives.get_mut(&surface) {
                None => writeln!(out, "Drive {surface}: empty")?,
                Some(None) => writeln!(out, "Drive {surface}: occupied, unformatted")?,
                Some(Some(config)) => {
                    let geometry = config.device().geometry();
                    writeln!(
                        out,
                        "Drive {surface}: occupied, {}, {}",
                        geometry.description(),
                        config.device().description()
                    )?;
                }
            }
        }
        Ok(())
    }
}
