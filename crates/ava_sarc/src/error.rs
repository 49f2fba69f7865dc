//! Error types that can be emitted from this library

use miette::Diagnostic;
use thiserror::Error;

/// Error type for library
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Transparent wrapper for [`std::io::Error`]
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// Transparent wrapper for [`binrw::Error`]
    #[error(transparent)]
    BinRWError(#[from] binrw::Error),

    /// a chunk payload failed to decode
    #[error(transparent)]
    #[diagnostic(transparent)]
    Codec(#[from] ava_tab::error::CodecError),

    /// chunk {index} has magic {magic:#010x}
    #[error("chunk {index} has magic {magic:#010x}, expected `EWAM`")]
    InvalidChunkMagic { index: u32, magic: u32 },

    /// container decoded to the wrong size
    #[error("container decoded to {actual} bytes, header declares {expected}")]
    SizeMismatch { expected: u64, actual: u64 },

    /// the entry has no bytes in this blob
    #[error("{name} is not resident in this archive ({reason})")]
    #[diagnostic(help("the data lives in a patch archive, read it from there instead"))]
    NotResident {
        name: String,
        reason: NotResidentReason,
    },

    /// no entry with this name
    #[error("no entry named {0}")]
    FileNotFound(String),

    /// operation is not implemented for this archive version
    #[error("stream archive version {0} cannot be modified")]
    UnsupportedVersion(u32),

    /// {0}
    #[error("{0}")]
    CustomError(String),
}

/// Why an entry's bytes could not be sliced out of the archive blob
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum NotResidentReason {
    /// offset is one of the "stored elsewhere" sentinels
    Patched,
    /// offset and size point past the end of the blob
    OutOfBounds,
}

impl std::fmt::Display for NotResidentReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NotResidentReason::Patched => write!(f, "patched"),
            NotResidentReason::OutOfBounds => write!(f, "out of bounds"),
        }
    }
}

impl Error {
    /// Whether the failure only means "look elsewhere" rather than a broken file
    pub fn is_not_resident(&self) -> bool {
        matches!(self, Error::NotResident { .. })
    }
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
