//! Mounted filesystems and volumes.
//!
//! A `FileSystem` is the parsed state of one disc surface: its format, its
//! geometry, and one `Volume` per root catalog (one unnamed volume for
//! everything except Opus DDOS, which has up to eight lettered volumes).
//! Neither type holds the block device; body reads take the device as an
//! argument, so ownership stays with the storage configuration.

use std::collections::BTreeMap;

use crate::blockdev::BlockSource;
use crate::catalog::Catalog;
use crate::error::{Error, Result};
use crate::geometry::{Geometry, SectorBuffer};
use crate::names::{SurfaceSelector, VolumeSelector};
use crate::opus::OpusDiscCatalogue;
use crate::sectormap::SectorMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Format {
    Acorn,
    Watford,
    Solidisk,
    Hdfs,
    OpusDdos,
}

impl Format {
    pub fn name(&self) -> &'static str {
        match self {
            Format::Acorn => "Acorn DFS",
            Format::Watford => "Watford DFS",
            Format::Solidisk => "Solidisk DFS",
            Format::Hdfs => "HDFS",
            Format::OpusDdos => "Opus DDOS",
        }
    }

    /// Sectors occupied by the root catalog.
    pub fn catalog_sectors(&self) -> u32 {
        if *self == Format::Watford {
            4
        } else {
            2
        }
    }

    /// Data-region sectors which can never belong to a file.
    pub fn data_sectors_reserved_for_catalog(&self) -> u32 {
        match self {
            Format::Watford => 4,
            // Opus file start sectors are measured from the volume's data
            // area, which excludes track 0 entirely.
            Format::OpusDdos => 0,
            _ => 2,
        }
    }

    /// Whether a filesystem of this format occupies a single disc side.
    /// HDFS is the only format which can span both sides.
    pub fn is_single_sided(&self) -> bool {
        *self != Format::Hdfs
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A root catalog plus the data extent it describes.
pub struct Volume {
    catalog_location: u64,
    data_origin: u64,
    total_sectors: u32,
    root: Catalog,
}

impl Volume {
    pub fn mount(
        format: Format,
        catalog_location: u64,
        data_origin: u64,
        total_sectors: u32,
        media: &mut dyn BlockSource,
    ) -> Result<Volume> {
        let root = Catalog::read(format, catalog_location, media)?;
        Ok(Volume {
            catalog_location,
            data_origin,
            total_sectors,
            root,
        })
    }

    pub fn root(&self) -> &Catalog {
        &self.root
    }

    pub fn data_origin(&self) -> u64 {
        self.data_origin
    }

    /// Sectors available for file storage in this volume.
    pub fn file_storage_space(&self) -> u32 {
        self.total_sectors
    }

    /// The volume's data area as a windowed block device; file start
    /// sectors are relative to this region.
    pub fn data_region<'a>(&self, media: &'a mut dyn BlockSource) -> DataRegion<'a> {
        DataRegion {
            origin: self.data_origin,
            len: u64::from(self.total_sectors),
            media,
        }
    }

    pub fn map_sectors(&self, vol: &VolumeSelector, out: &mut SectorMap) {
        self.root
            .map_sectors(vol, self.catalog_location, self.data_origin, out);
    }
}

/// A window onto the underlying device starting at `origin`.
pub struct DataRegion<'a> {
    origin: u64,
    len: u64,
    media: &'a mut dyn BlockSource,
}

impl BlockSource for DataRegion<'_> {
    fn read_block(&mut self, lba: u64) -> Result<Option<SectorBuffer>> {
        if lba >= self.len {
            return Ok(None);
        }
        self.media.read_block(self.origin + lba)
    }
}

pub struct FileSystem {
    format: Format,
    geometry: Geometry,
    total_disc_sectors: u32,
    volumes: BTreeMap<Option<char>, Volume>,
}

impl FileSystem {
    /// Parse the volumes of a surface whose format and geometry are already
    /// known (normally from the prober).
    pub fn mount(media: &mut dyn BlockSource, format: Format, geometry: Geometry) -> Result<FileSystem> {
        let mut volumes = BTreeMap::new();
        let total_disc_sectors;
        if format == Format::OpusDdos {
            let sector16 = media.read_block(16)?.ok_or_else(|| {
                Error::BadFileSystem(
                    "file system detected as Opus DDOS but the sector which should contain \
                     the disc catalogue is unreadable"
                        .to_string(),
                )
            })?;
            let disc_cat = OpusDiscCatalogue::parse(&sector16, Some(&geometry))?;
            total_disc_sectors = disc_cat.total_sectors();
            for loc in disc_cat.volume_locations() {
                let volume = Volume::mount(
                    format,
                    loc.catalog_location(),
                    loc.start_sector(),
                    loc.len(),
                    media,
                )?;
                volumes.insert(Some(loc.volume()), volume);
            }
        } else {
            let volume = Volume::mount(format, 0, 0, geometry.total_sectors(), media)?;
            total_disc_sectors = volume.root().total_sectors();
            volumes.insert(None, volume);
        }
        Ok(FileSystem {
            format,
            geometry,
            total_disc_sectors,
            volumes,
        })
    }

    pub fn disc_format(&self) -> Format {
        self.format
    }

    pub fn geometry(&self) -> Geometry {
        self.geometry
    }

    /// Sector count as declared by the filesystem itself.
    pub fn disc_sector_count(&self) -> u32 {
        self.total_disc_sectors
    }

    pub fn subvolumes(&self) -> Vec<Option<char>> {
        self.volumes.keys().copied().collect()
    }

    /// Select a volume. Non-Opus formats ignore the sub-volume letter; on
    /// Opus an absent letter means volume A.
    pub fn volume(&self, subvol: Option<char>) -> Result<&Volume> {
        if self.format == Format::OpusDdos {
            let letter = subvol.unwrap_or('A');
            self.volumes.get(&Some(letter)).ok_or_else(|| {
                Error::MediaNotPresent(format!("volume {letter} is not present on this disc"))
            })
        } else {
            Ok(self
                .volumes
                .get(&None)
                .expect("non-Opus file systems have an unnamed volume"))
        }
    }

    /// Build the surface's sector ownership map.
    pub fn sector_map(&self, surface: SurfaceSelector) -> SectorMap {
        let mut map = SectorMap::new(self.format == Format::OpusDdos);
        if self.format == Format::OpusDdos {
            map.add_other(16, "disc-cat");
            map.add_other(17, "reserved");
        }
        for (subvol, volume) in &self.volumes {
            let vol = VolumeSelector {
                surface,
                subvolume: *subvol,
            };
            volume.map_sectors(&vol, &mut map);
        }
        map
    }
}
