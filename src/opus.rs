//! The Opus DDOS disc catalogue.
//!
//! Opus DDOS divides a double-density disc into up to eight volumes named
//! A-H, each with an ordinary two-sector DFS catalog in track 0 (volume A
//! at sectors 0/1, B at 2/3, and so on). Sector 16 is the disc catalogue:
//! bytes 1-2 hold the total sector count big-endian, byte 3 the sectors per
//! track, and every second byte from offset 8 (offsets 8, 10, ... 22)
//! records the starting track of one volume's data area, zero meaning the
//! volume is absent. The odd bytes in between are unused.

use crate::error::{Error, Result};
use crate::geometry::{Geometry, SectorBuffer};

/// Byte offset of volume A's start-track byte within sector 16. The entry
/// for volume N is at offset 8 + 2N, so the table ends at byte 22.
const VOLUME_TABLE_OFFSET: usize = 8;
const VOLUME_TABLE_STRIDE: usize = 2;
pub const MAX_VOLUMES: usize = 8;

#[derive(Debug, Clone, Copy)]
pub struct VolumeLocation {
    index: usize,
    start_sector: u64,
    len: u32,
}

impl VolumeLocation {
    pub fn volume(&self) -> char {
        (b'A' + self.index as u8) as char
    }

    /// Where the volume's 2-sector root catalog lives (in track 0).
    pub fn catalog_location(&self) -> u64 {
        2 * self.index as u64
    }

    /// First sector of the volume's data area.
    pub fn start_sector(&self) -> u64 {
        self.start_sector
    }

    /// Sectors in the volume's data extent.
    pub fn len(&self) -> u32 {
        self.len
    }
}

pub struct OpusDiscCatalogue {
    total_sectors: u32,
    sectors_per_track: u8,
    locations: Vec<VolumeLocation>,
}

impl OpusDiscCatalogue {
    /// Parse sector 16. With a geometry available the catalogue must agree
    /// with it exactly; without one (while probing, before the geometry is
    /// known) the catalogue's own total-sector field bounds the volumes.
    pub fn parse(sector16: &SectorBuffer, geometry: Option<&Geometry>) -> Result<OpusDiscCatalogue> {
        let total_sectors = u32::from(sector16[1]) << 8 | u32::from(sector16[2]);
        let sectors_per_track = sector16[3];
        if let Some(geom) = geometry {
            if total_sectors != geom.total_sectors() {
                return Err(Error::BadFileSystem(format!(
                    "inconsistent total sector count ({total_sectors} from sector 16, \
                     {} from the disc image geometry) in Opus DDOS disc catalogue",
                    geom.total_sectors()
                )));
            }
            if u32::from(sectors_per_track) != geom.sectors {
                return Err(Error::BadFileSystem(
                    "inconsistent sectors-per-track in Opus DDOS disc catalogue".to_string(),
                ));
            }
        }
        let mut locations = Vec::new();
        for index in 0..MAX_VOLUMES {
            let start_track = sector16[VOLUME_TABLE_OFFSET + VOLUME_TABLE_STRIDE * index];
            if start_track == 0 {
                continue;
            }
            if let Some(geom) = geometry {
                if u32::from(start_track) >= geom.cylinders {
                    return Err(Error::BadFileSystem(format!(
                        "volume {} has starting track {start_track} but the disc itself \
                         only has {} tracks",
                        (b'A' + index as u8) as char,
                        geom.cylinders
                    )));
                }
            }
            let start_sector = u64::from(start_track) * u64::from(sectors_per_track);
            if total_sectors != 0 && start_sector >= u64::from(total_sectors) {
                return Err(Error::BadFileSystem(format!(
                    "volume {} has starting sector {start_sector} but the disc itself \
                     only has {total_sectors} sectors",
                    (b'A' + index as u8) as char
                )));
            }
            locations.push(VolumeLocation {
                index,
                start_sector,
                len: 0,
            });
        }
        // Each volume's extent runs to the start of the next volume, so
        // order by start sector before measuring.
        locations.sort_by_key(|loc| loc.start_sector);
        for i in 0..locations.len() {
            let end = if i + 1 < locations.len() {
                locations[i + 1].start_sector
            } else {
                u64::from(total_sectors)
            };
            locations[i].len = end.saturating_sub(locations[i].start_sector) as u32;
        }
        Ok(OpusDiscCatalogue {
            total_sectors,
            sectors_per_track,
            locations,
        })
    }

    pub fn total_sectors(&self) -> u32 {
        self.total_sectors
    }

    pub fn sectors_per_track(&self) -> u8 {
        self.sectors_per_track
    }

    /// Present volumes, ordered by start sector.
    pub fn volume_locations(&self) -> &[VolumeLocation] {
        &self.locations
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Encoding;

    fn sector16(volumes: &[(usize, u8)]) -> SectorBuffer {
        let mut buf = [0u8; 256];
        buf[1] = (720u16 >> 8) as u8;
        buf[2] = (720u16 & 0xFF) as u8;
        buf[3] = 18;
        for &(index, track) in volumes {
            buf[VOLUME_TABLE_OFFSET + VOLUME_TABLE_STRIDE * index] = track;
        }
        buf
    }

    #[test]
    fn volume_entries_sit_on_every_second_byte() {
        // Volumes A and C, with a stray value on the unused byte between
        // the A and B entries which must not be taken for a volume.
        let mut buf = sector16(&[(0, 1), (2, 10)]);
        buf[9] = 7;
        let cat = OpusDiscCatalogue::parse(&buf, None).unwrap();
        let locations = cat.volume_locations();
        assert_eq!(locations.len(), 2);
        assert_eq!(locations[0].volume(), 'A');
        assert_eq!(locations[0].catalog_location(), 0);
        assert_eq!(locations[0].start_sector(), 18);
        assert_eq!(locations[0].len(), 180 - 18);
        assert_eq!(locations[1].volume(), 'C');
        assert_eq!(locations[1].catalog_location(), 4);
        assert_eq!(locations[1].start_sector(), 180);
        assert_eq!(locations[1].len(), 720 - 180);
    }

    #[test]
    fn volumes_are_ordered_by_start_sector() {
        let buf = sector16(&[(0, 20), (1, 1)]);
        let cat = OpusDiscCatalogue::parse(&buf, None).unwrap();
        let volumes: Vec<char> = cat.volume_locations().iter().map(|l| l.volume()).collect();
        assert_eq!(volumes, vec!['B', 'A']);
        assert_eq!(cat.volume_locations()[0].len(), 360 - 18);
    }

    #[test]
    fn catalogue_must_agree_with_the_geometry() {
        let buf = sector16(&[(0, 1)]);
        let geom = Geometry::new(40, 1, 18, Some(Encoding::Mfm));
        assert!(OpusDiscCatalogue::parse(&buf, Some(&geom)).is_ok());
        let wrong_total = Geometry::new(80, 1, 18, Some(Encoding::Mfm));
        assert!(OpusDiscCatalogue::parse(&buf, Some(&wrong_total)).is_err());
        let wrong_spt = Geometry::new(45, 1, 16, Some(Encoding::Mfm));
        assert!(OpusDiscCatalogue::parse(&buf, Some(&wrong_spt)).is_err());
    }

    #[test]
    fn start_track_beyond_the_disc_is_rejected() {
        let buf = sector16(&[(0, 50)]);
        let geom = Geometry::new(40, 1, 18, Some(Encoding::Mfm));
        assert!(OpusDiscCatalogue::parse(&buf, Some(&geom)).is_err());
    }
}
