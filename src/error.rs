//! Error taxonomy for the disc-image side of the crate.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while opening, probing or reading disc images.
#[derive(Error, Debug)]
pub enum Error {
    /// The container or filesystem format could not be identified at all.
    #[error("unrecognized image format: {0}")]
    Unrecognized(String),

    /// Several candidate geometries survived probing and none is preferred.
    #[error("failed to guess geometry: {0}")]
    FailedToGuessFormat(String),

    /// Structural corruption: premature end, impossible lengths, entries
    /// out of order, inconsistent cross-references.
    #[error("bad file system: {0}")]
    BadFileSystem(String),

    /// An I/O failure against a named path.
    #[error("{path}: {source}")]
    FileIo { path: PathBuf, source: io::Error },

    /// An I/O failure not tied to a single path (e.g. tempfile creation).
    #[error("OS error: {0}")]
    NonFileOs(io::Error),

    #[error("{0}")]
    MediaNotPresent(String),

    #[error("Opus DDOS: {0} is not yet supported")]
    OpusUnsupported(String),

    /// A container feature combination we do not handle.
    #[error("unsupported image: {0}")]
    Unsupported(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn file_io(path: impl Into<PathBuf>, source: io::Error) -> Error {
        Error::FileIo {
            path: path.into(),
            source,
        }
    }

    pub fn eof_in_catalog() -> Error {
        Error::BadFileSystem("unexpectedly encountered end of media while reading catalog".to_string())
    }
}
