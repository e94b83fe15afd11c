//! Byte-level and block-level access to image files.
//!
//! Two layers, mirroring the two ways containers are consumed: `FileAccess`
//! is a plain positioned byte reader over the underlying file, and
//! `BlockSource`/`BlockDevice` present 256-byte sectors. `read_block`
//! returns `Ok(None)` for reads past the end of the media; that is not an
//! error. Real I/O failures carry the file name and OS error.

use std::cell::RefCell;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::rc::Rc;

use flate2::read::GzDecoder;

use crate::error::{Error, Result};
use crate::geometry::{Geometry, SectorBuffer, SECTOR_BYTES};

/// Positioned reads over a container file. Reads beyond EOF are short or
/// empty, never errors.
pub trait FileAccess {
    fn read(&mut self, pos: u64, len: usize) -> Result<Vec<u8>>;
}

/// An ordinary OS file.
#[derive(Debug)]
pub struct OsFile {
    path: PathBuf,
    file: File,
}

impl OsFile {
    pub fn open(path: impl AsRef<Path>) -> Result<OsFile> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path).map_err(|e| Error::file_io(&path, e))?;
        Ok(OsFile { path, file })
    }
}

impl FileAccess for OsFile {
    fn read(&mut self, pos: u64, len: usize) -> Result<Vec<u8>> {
        read_at(&mut self.file, &self.path, pos, len)
    }
}

/// The inflated contents of a gzip-compressed container, backed by an
/// anonymous temporary file so that large images are not held in memory.
pub struct DecompressedFile {
    name: PathBuf,
    file: File,
}

impl DecompressedFile {
    pub fn open(path: impl AsRef<Path>) -> Result<DecompressedFile> {
        let path = path.as_ref();
        let compressed = File::open(path).map_err(|e| Error::file_io(path, e))?;
        let mut temp = tempfile::tempfile().map_err(Error::NonFileOs)?;
        let mut decoder = GzDecoder::new(compressed);
        std::io::copy(&mut decoder, &mut temp).map_err(|e| Error::file_io(path, e))?;
        Ok(DecompressedFile {
            name: PathBuf::from(format!("decompressed version of {}", path.display())),
            file: temp,
        })
    }
}

impl FileAccess for DecompressedFile {
    fn read(&mut self, pos: u64, len: usize) -> Result<Vec<u8>> {
        read_at(&mut self.file, &self.name, pos, len)
    }
}

fn read_at(file: &mut File, name: &Path, pos: u64, len: usize) -> Result<Vec<u8>> {
    file.seek(SeekFrom::Start(pos))
        .map_err(|e| Error::file_io(name, e))?;
    let mut buf = vec![0u8; len];
    let mut filled = 0;
    while filled < len {
        match file.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::file_io(name, e)),
        }
    }
    buf.truncate(filled);
    Ok(buf)
}

/// The opened media behind a container, shared between the per-side views.
pub enum Media {
    Os(OsFile),
    Decompressed(DecompressedFile),
}

impl FileAccess for Media {
    fn read(&mut self, pos: u64, len: usize) -> Result<Vec<u8>> {
        match self {
            Media::Os(f) => f.read(pos, len),
            Media::Decompressed(f) => f.read(pos, len),
        }
    }
}

pub type MediaHandle = Rc<RefCell<Media>>;

pub fn media_handle(media: Media) -> MediaHandle {
    Rc::new(RefCell::new(media))
}

/// Blockwise read access; `None` signals a read past the end of the media.
pub trait BlockSource {
    fn read_block(&mut self, lba: u64) -> Result<Option<SectorBuffer>>;
}

/// A block source describing a whole emulated device (one disc side).
pub trait BlockDevice: BlockSource {
    fn geometry(&self) -> Geometry;
    fn description(&self) -> String;
}

fn read_sector(media: &MediaHandle, lba: u64) -> Result<Option<SectorBuffer>> {
    let got = media
        .borrow_mut()
        .read(lba * SECTOR_BYTES as u64, SECTOR_BYTES)?;
    if got.is_empty() {
        return Ok(None);
    }
    let mut buf: SectorBuffer = [0u8; SECTOR_BYTES];
    // A partial sector at a truncated end of the image reads as
    // zero-padded, the way emulators treat such images.
    buf[..got.len()].copy_from_slice(&got);
    Ok(Some(buf))
}

/// The whole file presented as consecutive 256-byte blocks; what the format
/// prober runs against before any per-side view exists.
pub struct Blockwise {
    media: MediaHandle,
}

impl Blockwise {
    pub fn new(media: MediaHandle) -> Blockwise {
        Blockwise { media }
    }
}

impl BlockSource for Blockwise {
    fn read_block(&mut self, lba: u64) -> Result<Option<SectorBuffer>> {
        read_sector(&self.media, lba)
    }
}

/// A windowed view selecting the sectors of one emulated device out of a
/// container that holds several, laid out with regular gaps.
///
/// The container is modelled as `initial_skip` sectors to ignore, then
/// repeating groups of `take` sectors belonging to this device followed by
/// `leave` sectors belonging to others. Sector `lba` of the device is at
/// container sector
///
///   initial_skip + (lba / take) * (take + leave) + lba % take
///
/// With `initial_skip == 0` and `leave == 0` this is the identity mapping.
/// `take == 0` marks an unformatted device: every read returns `None`.
pub struct FileView {
    media: Option<MediaHandle>,
    description: String,
    geometry: Geometry,
    initial_skip: u64,
    take: u64,
    leave: u64,
    total: u64,
}

impl FileView {
    pub fn new(
        media: MediaHandle,
        description: String,
        geometry: Geometry,
        initial_skip: u64,
        take: u64,
        leave: u64,
        total: u64,
    ) -> FileView {
        assert!(take > 0);
        FileView {
            media: Some(media),
            description,
            geometry,
            initial_skip,
            take,
            leave,
            total,
        }
    }

    pub fn unformatted(description: String, geometry: Geometry) -> FileView {
        FileView {
            media: None,
            description,
            geometry,
            initial_skip: 0,
            take: 0,
            leave: 1,
            total: 1,
        }
    }

    pub fn is_formatted(&self) -> bool {
        self.take != 0
    }
}

impl BlockSource for FileView {
    fn read_block(&mut self, lba: u64) -> Result<Option<SectorBuffer>> {
        if self.take == 0 || lba >= self.total {
            return Ok(None);
        }
        let media = self.media.as_ref().expect("formatted view has media");
        let pos = self.initial_skip + (lba / self.take) * (self.take + self.leave) + lba % self.take;
        read_sector(media, pos)
    }
}

impl BlockDevice for FileView {
    fn geometry(&self) -> Geometry {
        self.geometry
    }

    fn description(&self) -> String {
        self.description.clone()
    }
}

/// Fully decoded sectors held in memory; how the bitstream containers
/// (HFE, HxC MFM) present a disc side. Holes are unreadable sectors.
pub struct SectorStore {
    description: String,
    geometry: Geometry,
    blocks: Vec<Option<SectorBuffer>>,
}

impl SectorStore {
    pub fn new(
        description: String,
        geometry: Geometry,
        blocks: Vec<Option<SectorBuffer>>,
    ) -> SectorStore {
        SectorStore {
            description,
            geometry,
            blocks,
        }
    }
}

impl BlockSource for SectorStore {
    fn read_block(&mut self, lba: u64) -> Result<Option<SectorBuffer>> {
        let idx = usize::try_from(lba).ok();
        Ok(idx.and_then(|i| self.blocks.get(i)).copied().flatten())
    }
}

impl BlockDevice for SectorStore {
    fn geometry(&self) -> Geometry {
        self.geometry
    }

    fn description(&self) -> String {
        self.description.clone()
    }
}

/// Write-through cache over another device, covering the low-numbered
/// sectors where catalogs live.
pub struct SectorCache {
    inner: Box<dyn BlockDevice>,
    cache: Vec<Option<Box<SectorBuffer>>>,
}

impl SectorCache {
    pub fn new(inner: Box<dyn BlockDevice>, cached_sectors: usize) -> SectorCache {
        let mut cache = Vec::new();
        cache.resize_with(cached_sectors, || None);
        SectorCache { inner, cache }
    }
}

impl BlockSource for SectorCache {
    fn read_block(&mut self, lba: u64) -> Result<Option<SectorBuffer>> {
        let slot = usize::try_from(lba).ok().filter(|&i| i < self.cache.len());
        if let Some(i) = slot {
            if let Some(buf) = &self.cache[i] {
                return Ok(Some(**buf));
            }
        }
        let got = self.inner.read_block(lba)?;
        if let (Some(i), Some(buf)) = (slot, got.as_ref()) {
            self.cache[i] = Some(Box::new(*buf));
        }
        Ok(got)
    }
}

impl BlockDevice for SectorCache {
    fn geometry(&self) -> Geometry {
        self.inner.geometry()
    }

    fn description(&self) -> String {
        self.inner.description()
    }
}
