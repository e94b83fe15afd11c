//! Sector-to-owner mapping for the sector-map and extract-unused commands.

use std::collections::BTreeMap;

use crate::names::VolumeSelector;

/// Which file (or structure) occupies each sector of a surface. Sectors
/// with no entry are unused.
pub struct SectorMap {
    multiple_catalogs: bool,
    used_by: BTreeMap<u64, String>,
}

impl SectorMap {
    /// `multiple_catalogs` is set for formats with several root catalogs on
    /// one surface (Opus DDOS); labels then carry the volume letter.
    pub fn new(multiple_catalogs: bool) -> SectorMap {
        SectorMap {
            multiple_catalogs,
            used_by: BTreeMap::new(),
        }
    }

    pub fn at(&self, sector: u64) -> Option<&str> {
        self.used_by.get(&sector).map(String::as_str)
    }

    pub fn add_file_sectors(&mut self, begin: u64, end: u64, vol: &VolumeSelector, name: &str) {
        let label = if self.multiple_catalogs {
            format!("{}:{}", vol.effective_subvolume(), name)
        } else {
            name.to_string()
        };
        for sector in begin..end {
            self.used_by.insert(sector, label.clone());
        }
    }

    pub fn add_catalog_sector(&mut self, sector: u64, vol: &VolumeSelector) {
        let label = if self.multiple_catalogs {
            format!("{}:cat", vol.effective_subvolume())
        } else {
            "catalog".to_string()
        };
        self.used_by.insert(sector, label);
    }

    pub fn add_other(&mut self, sector: u64, label: &str) {
        self.used_by.insert(sector, label.to_string());
    }
}
