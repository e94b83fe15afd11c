//! Reading DFS catalogs.
//!
//! A catalog fragment is a pair of sectors: the names sector (disc title
//! bytes 0-7, then 8 bytes per entry: 7 name characters plus the directory
//! byte whose top bit is the locked flag) and the metadata sector (title
//! bytes 0-3, sequence number, offset of the last entry, a composite byte
//! carrying the boot option and the high bits of the total sector count,
//! then 8 bytes of addresses per entry). Acorn DFS has one fragment at
//! sectors 0/1; Watford DFS adds a second at sectors 2/3 for entries 32-62.

use crate::blockdev::BlockSource;
use crate::error::{Error, Result};
use crate::filesystem::Format;
use crate::geometry::{SectorBuffer, SECTOR_BYTES};
use crate::names::{ParsedFileName, VolumeSelector};
use crate::sectormap::SectorMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootSetting {
    None,
    Load,
    Run,
    Exec,
}

impl BootSetting {
    pub fn value(&self) -> u8 {
        match self {
            BootSetting::None => 0,
            BootSetting::Load => 1,
            BootSetting::Run => 2,
            BootSetting::Exec => 3,
        }
    }
}

impl std::fmt::Display for BootSetting {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            BootSetting::None => "off",
            BootSetting::Load => "load",
            BootSetting::Run => "run",
            BootSetting::Exec => "exec",
        };
        write!(f, "{name}")
    }
}

/// Sign-extend an 18-bit load or exec address to 24 bits, matching what the
/// DFS *INFO command prints: the top bits record whether the file was saved
/// from the I/O processor, so &3F1900 is shown as FF1900.
pub fn sign_extend(address: u32) -> u32 {
    if address & 0x20000 != 0 {
        0xFF0000 | address
    } else {
        address
    }
}

fn byte_to_ascii7(b: u8) -> char {
    char::from(b & 0x7F)
}

/// One catalog entry, holding its own copies of the raw name and metadata
/// bytes.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    raw_name: [u8; 8],
    raw_metadata: [u8; 8],
}

impl CatalogEntry {
    pub fn new(name: &[u8], metadata: &[u8]) -> CatalogEntry {
        let mut raw_name = [0u8; 8];
        let mut raw_metadata = [0u8; 8];
        raw_name.copy_from_slice(name);
        raw_metadata.copy_from_slice(metadata);
        CatalogEntry {
            raw_name,
            raw_metadata,
        }
    }

    /// The file name without space padding: "FOO", not "FOO    ".
    pub fn name(&self) -> String {
        let mut result = String::with_capacity(7);
        for &b in &self.raw_name[..7] {
            let ch = byte_to_ascii7(b);
            if ch == ' ' || ch == '\0' {
                break;
            }
            result.push(ch);
        }
        result
    }

    pub fn directory(&self) -> char {
        byte_to_ascii7(self.raw_name[7])
    }

    /// The directory-qualified name, for example "$.FOO".
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.directory(), self.name())
    }

    pub fn is_locked(&self) -> bool {
        self.raw_name[7] & 0x80 != 0
    }

    fn metadata_word(&self, offset: usize) -> u32 {
        u32::from(self.raw_metadata[offset]) | u32::from(self.raw_metadata[offset + 1]) << 8
    }

    /// 18-bit load address (bits 16-17 from the packed byte).
    pub fn load_address(&self) -> u32 {
        self.metadata_word(0) | (u32::from(self.raw_metadata[6] >> 2) & 3) << 16
    }

    /// 18-bit execution address.
    pub fn exec_address(&self) -> u32 {
        self.metadata_word(2) | (u32::from(self.raw_metadata[6] >> 6) & 3) << 16
    }

    /// 18-bit file length in bytes.
    pub fn file_length(&self) -> u32 {
        self.metadata_word(4) | (u32::from(self.raw_metadata[6] >> 4) & 3) << 16
    }

    /// 10-bit start sector, relative to the volume's data region.
    pub fn start_sector(&self) -> u32 {
        u32::from(self.raw_metadata[7]) | (u32::from(self.raw_metadata[6]) & 3) << 8
    }

    /// The last sector the file's body occupies.
    pub fn last_sector(&self) -> u32 {
        let sectors = self.file_length().div_ceil(SECTOR_BYTES as u32);
        self.start_sector() + sectors.max(1) - 1
    }

    pub fn has_name(&self, wanted: &ParsedFileName) -> bool {
        wanted.dir.eq_ignore_ascii_case(&self.directory())
            && wanted.name.trim_end().eq_ignore_ascii_case(self.name().trim_end())
    }

    /// Feed the file body to `visitor`, sector by sector, reading through
    /// `media` (the volume's data region of `total_sectors` sectors).
    pub fn visit_file_body(
        &self,
        media: &mut dyn BlockSource,
        total_sectors: u32,
        visitor: &mut dyn FnMut(&[u8]) -> Result<()>,
    ) -> Result<()> {
        let start = self.start_sector();
        let end = self.last_sector();
        if start >= total_sectors {
            return Err(Error::BadFileSystem(
                "file begins beyond the end of the media".to_string(),
            ));
        }
        if end >= total_sectors {
            return Err(Error::BadFileSystem(
                "file ends beyond the end of the media".to_string(),
            ));
        }
        let mut remaining = self.file_length() as usize;
        for sec in start..=end {
            let buf = media.read_block(u64::from(sec))?.ok_or_else(|| {
                Error::BadFileSystem("end of media during body of file".to_string())
            })?;
            let take = remaining.min(SECTOR_BYTES);
            visitor(&buf[..take])?;
            remaining -= take;
        }
        Ok(())
    }
}

impl std::fmt::Display for CatalogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}.{:<7} {} {:06X} {:06X} {:06X} {:03X}",
            self.directory(),
            self.name(),
            if self.is_locked() { "L" } else { " " },
            sign_extend(self.load_address()),
            sign_extend(self.exec_address()),
            self.file_length(),
            self.start_sector()
        )
    }
}

fn convert_title(names: &SectorBuffer, metadata: &SectorBuffer) -> String {
    let mut title = String::with_capacity(12);
    for &b in names[..8].iter().chain(metadata[..4].iter()) {
        if b == 0 {
            break;
        }
        title.push(byte_to_ascii7(b));
    }
    title.trim_end().to_string()
}

/// A two-sector catalog: the Acorn DFS root, one half of a Watford DFS
/// root, or an Opus DDOS sub-volume root.
#[derive(Debug, Clone)]
pub struct CatalogFragment {
    format: Format,
    location: u64,
    title: String,
    sequence_number: u8,
    last_entry_offset: u8,
    boot: BootSetting,
    total_sectors: u32,
    entries: Vec<CatalogEntry>,
}

impl CatalogFragment {
    pub fn parse(
        format: Format,
        location: u64,
        names: &SectorBuffer,
        metadata: &SectorBuffer,
    ) -> CatalogFragment {
        let boot = match (metadata[6] >> 4) & 3 {
            0 => BootSetting::None,
            1 => BootSetting::Load,
            2 => BootSetting::Run,
            _ => BootSetting::Exec,
        };
        let mut total_sectors = u32::from(metadata[7]) | (u32::from(metadata[6]) & 3) << 8;
        if format == Format::Hdfs && names[0] & 0x80 != 0 {
            // HDFS stores bit 10 of the sector count in the top bit of the
            // title's first character. The manual and mdfs.net disagree
            // about this bit; we follow the manual.
            total_sectors |= 1 << 9;
        }
        let last_entry_offset = metadata[5];
        let mut entries = Vec::new();
        let mut offset = 8usize;
        while offset <= usize::from(last_entry_offset).min(31 * 8) {
            entries.push(CatalogEntry::new(
                &names[offset..offset + 8],
                &metadata[offset..offset + 8],
            ));
            offset += 8;
        }
        CatalogFragment {
            format,
            location,
            title: convert_title(names, metadata),
            sequence_number: metadata[4],
            last_entry_offset,
            boot,
            total_sectors,
            entries,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn sequence_number(&self) -> u8 {
        self.sequence_number
    }

    pub fn boot_setting(&self) -> BootSetting {
        self.boot
    }

    pub fn total_sectors(&self) -> u32 {
        self.total_sectors
    }

    pub fn location(&self) -> u64 {
        self.location
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn find(&self, name: &ParsedFileName) -> Option<&CatalogEntry> {
        self.entries.iter().find(|e| e.has_name(name))
    }

    /// Structural self-consistency, used both as a probe filter and as a
    /// mount-time check.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.last_entry_offset % 8 != 0 {
            return Err("position of last catalog entry is not a multiple of 8".to_string());
        }
        if self.last_entry_offset > 31 * 8 {
            return Err(format!(
                "position of last catalog entry {} is beyond the catalog",
                self.last_entry_offset
            ));
        }
        if self.total_sectors < 2 {
            return Err(format!(
                "total sector count {} is too small to hold a catalog",
                self.total_sectors
            ));
        }
        for entry in &self.entries {
            // Opus file start sectors are relative to the volume's data
            // area, which does not contain the catalog.
            if self.format != Format::OpusDdos && entry.start_sector() < 2 {
                return Err(format!(
                    "file {} would overlap the catalog",
                    entry.full_name()
                ));
            }
            if entry.last_sector() >= self.total_sectors {
                return Err(format!(
                    "file {} extends beyond the {} sectors of the file system",
                    entry.full_name(),
                    self.total_sectors
                ));
            }
        }
        Ok(())
    }
}

/// The root catalog of a volume: one fragment, or two for Watford DFS.
#[derive(Debug, Clone)]
pub struct Catalog {
    format: Format,
    fragments: Vec<CatalogFragment>,
}

impl Catalog {
    /// Read the catalog found at sector `location` of `media`.
    pub fn read(format: Format, location: u64, media: &mut dyn BlockSource) -> Result<Catalog> {
        let mut fragments = Vec::new();
        let fragment_count = if format == Format::Watford { 2 } else { 1 };
        for i in 0..fragment_count {
            let base = location + 2 * i;
            let names = media
                .read_block(base)?
                .ok_or_else(Error::eof_in_catalog)?;
            let metadata = media
                .read_block(base + 1)?
                .ok_or_else(Error::eof_in_catalog)?;
            fragments.push(CatalogFragment::parse(format, base, &names, &metadata));
        }
        Ok(Catalog { format, fragments })
    }

    /// The fragment holding the title, boot option and sector count.
    pub fn primary(&self) -> &CatalogFragment {
        &self.fragments[0]
    }

    pub fn fragments(&self) -> &[CatalogFragment] {
        &self.fragments
    }

    pub fn disc_format(&self) -> Format {
        self.format
    }

    pub fn title(&self) -> &str {
        self.primary().title()
    }

    /// In the root catalog HDFS stores a checksum where the other formats
    /// keep the sequence number.
    pub fn sequence_number(&self) -> Option<u8> {
        if self.format == Format::Hdfs {
            None
        } else {
            Some(self.primary().sequence_number())
        }
    }

    pub fn boot_setting(&self) -> BootSetting {
        self.primary().boot_setting()
    }

    pub fn total_sectors(&self) -> u32 {
        self.primary().total_sectors()
    }

    pub fn max_file_count(&self) -> usize {
        if self.format == Format::Watford {
            62
        } else {
            31
        }
    }

    /// All entries, in on-disc order across the fragments (the same order
    /// as *INFO).
    pub fn entries(&self) -> Vec<&CatalogEntry> {
        self.fragments.iter().flat_map(|f| f.entries()).collect()
    }

    pub fn find(&self, name: &ParsedFileName) -> Option<&CatalogEntry> {
        self.fragments.iter().find_map(|f| f.find(name))
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        for fragment in &self.fragments {
            fragment.validate()?;
        }
        Ok(())
    }

    /// Label each sector this catalog accounts for: the catalog sectors
    /// themselves at `catalog_origin_lba`, and every file body relative to
    /// `data_origin_lba`.
    pub fn map_sectors(
        &self,
        vol: &VolumeSelector,
        catalog_origin_lba: u64,
        data_origin_lba: u64,
        out: &mut SectorMap,
    ) {
        for (i, fragment) in self.fragments.iter().enumerate() {
            let base = catalog_origin_lba + 2 * i as u64;
            out.add_catalog_sector(base, vol);
            out.add_catalog_sector(base + 1, vol);
            for entry in fragment.entries() {
                out.add_file_sectors(
                    data_origin_lba + u64::from(entry.start_sector()),
                    data_origin_lba + u64::from(entry.last_sector()) + 1,
                    vol,
                    &entry.full_name(),
                );
            }
        }
    }
}
