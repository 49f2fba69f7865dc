//! Error types that can be emitted from this library

use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

use crate::compression::CompressionKind;

/// Error type for library
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Transparent wrapper for [`std::io::Error`]
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// Transparent wrapper for [`binrw::Error`]
    #[error(transparent)]
    BinRWError(#[from] binrw::Error),

    /// file is not a tab index
    #[error("file is not a tab index (magic {0:#010x})")]
    #[diagnostic(help("tab indices start with the bytes `TAB\\0`"))]
    InvalidMagic(u32),

    /// payload could not be decoded
    #[error(transparent)]
    #[diagnostic(transparent)]
    Codec(#[from] CodecError),

    /// one half of an archive pair is missing
    #[error("archive pair file is missing")]
    FileNotFound(#[from] FileNotFoundError),

    /// hash {0:#010x} is not in the index
    #[error("hash {0:#010x} is not in the index")]
    EntryNotFound(u32),

    /// block {index} is past the end of the block table ({count} blocks)
    #[error("block {index} is past the end of the block table ({count} blocks)")]
    BlockOutOfRange { index: u32, count: usize },

    /// {0}
    #[error("{0}")]
    CustomError(String),
}

/// Error type to provide further information when an archive pair file has not been found
#[derive(Error, Diagnostic, Debug)]
#[error("unable to find archive pair file")]
pub enum FileNotFoundError {
    /// index file {0}
    #[error("index file {0}")]
    Index(PathBuf),

    /// data file {0}
    #[error("data file {0}")]
    Data(PathBuf),
}

/// Failures of the payload codecs
#[derive(Error, Diagnostic, Debug, Clone, PartialEq)]
pub enum CodecError {
    /// the decoder rejected the stream
    #[error("{kind:?} stream is corrupt: {reason}")]
    Corrupt {
        kind: CompressionKind,
        reason: String,
    },

    /// decoded size differs from the size recorded for the payload
    #[error("{kind:?} payload decoded to {actual} bytes, expected {expected}")]
    LengthMismatch {
        kind: CompressionKind,
        expected: usize,
        actual: usize,
    },

    /// the declared output is larger than the input could ever expand to
    #[error("{kind:?} payload of {input} bytes cannot decode to the declared {declared} bytes")]
    ImplausibleSize {
        kind: CompressionKind,
        declared: usize,
        input: usize,
    },

    /// no decoder is installed for the proprietary codec
    #[error("no decompressor is installed for {0:?}")]
    #[diagnostic(help("install an `LzDecompressor` on the codec to read these entries"))]
    Unavailable(CompressionKind),

    /// compression is not implemented for this codec
    #[error("compressing with {0:?} is not supported")]
    Unsupported(CompressionKind),

    /// a compression kind byte that no codec is registered for
    #[error("unknown compression kind {0}")]
    UnknownKind(u8),
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;
