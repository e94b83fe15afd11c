//! Disc geometry: cylinders, heads, sectors per track, encoding.

use std::fmt;

/// Sector sizes are always 256 bytes on BBC Micro filesystems.
pub const SECTOR_BYTES: usize = 256;

pub type SectorBuffer = [u8; SECTOR_BYTES];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Single density.
    Fm,
    /// Double density.
    Mfm,
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Encoding::Fm => write!(f, "FM"),
            Encoding::Mfm => write!(f, "MFM"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    /// For a single-surface device, same as the track count.
    pub cylinders: u32,
    pub heads: u32,
    pub sectors: u32,
    pub encoding: Option<Encoding>,
}

impl Geometry {
    pub fn new(cylinders: u32, heads: u32, sectors: u32, encoding: Option<Encoding>) -> Geometry {
        Geometry {
            cylinders,
            heads,
            sectors,
            encoding,
        }
    }

    pub fn total_sectors(&self) -> u32 {
        self.cylinders * self.heads * self.sectors
    }

    /// The geometry of one side of this device.
    pub fn single_sided(&self) -> Geometry {
        Geometry {
            heads: 1,
            ..*self
        }
    }

    pub fn description(&self) -> String {
        let density = match self.encoding {
            Some(Encoding::Fm) => "single density",
            Some(Encoding::Mfm) => "double density",
            None => "unknown density",
        };
        format!(
            "{} tracks, {} side{}, {} sectors per track, {}",
            self.cylinders,
            self.heads,
            if self.heads == 1 { "" } else { "s" },
            self.sectors,
            density
        )
    }
}

impl fmt::Display for Geometry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{chs={},{},{}", self.cylinders, self.heads, self.sectors)?;
        match self.encoding {
            Some(e) => write!(f, ", encoding={}}}", e),
            None => write!(f, ", encoding unknown}}"),
        }
    }
}
