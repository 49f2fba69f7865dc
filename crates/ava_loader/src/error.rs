//! Error types that can be emitted from this library

use std::{fmt::Display, sync::Arc};

use bytes::Bytes;
use miette::Diagnostic;
use thiserror::Error;

/// Error type for library
#[derive(Error, Diagnostic, Debug)]
pub enum Error {
    /// Transparent wrapper for [`std::io::Error`]
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// Archive pair or table failure
    #[error(transparent)]
    #[diagnostic(transparent)]
    Tab(#[from] ava_tab::error::Error),

    /// Stream archive or AAF container failure
    #[error(transparent)]
    #[diagnostic(transparent)]
    Sarc(#[from] ava_sarc::error::Error),

    /// content dictionary could not be parsed
    #[error("content dictionary is malformed")]
    #[diagnostic(help("some features are disabled until a valid dictionary is supplied"))]
    Dictionary(#[from] serde_json::Error),

    /// {0} is not in the content dictionary
    #[error("{0} is not in the content dictionary")]
    #[diagnostic(help("check that the game directory and generation are correct"))]
    NotInDictionary(String),

    /// {0} is in the content dictionary without an archive to read it from
    #[error("{0} is in the content dictionary without an archive to read it from")]
    #[diagnostic(help("the dictionary entry lists no archive paths"))]
    NoArchiveLocation(String),

    /// no loaded archive is named {0}
    #[error("no loaded archive is named {0}")]
    ArchiveNotLoaded(String),

    /// the read was abandoned before it produced a result
    #[error("the read was abandoned before it produced a result")]
    Dropped,

    /// {0}
    #[error("{0}")]
    CustomError(String),
}

/// Shared failure delivered to every waiter of a read
///
/// A single failed read can complete many requests, so the error is reference counted.
#[derive(Error, Debug, Clone)]
#[error(transparent)]
pub struct ReadError(Arc<Error>);

impl ReadError {
    /// The underlying error
    pub fn inner(&self) -> &Error {
        &self.0
    }
}

impl Diagnostic for ReadError {
    fn code<'a>(&'a self) -> Option<Box<dyn Display + 'a>> {
        self.0.code()
    }

    fn help<'a>(&'a self) -> Option<Box<dyn Display + 'a>> {
        self.0.help()
    }
}

impl From<Error> for ReadError {
    fn from(error: Error) -> Self {
        Self(Arc::new(error))
    }
}

impl From<ava_tab::error::Error> for ReadError {
    fn from(error: ava_tab::error::Error) -> Self {
        Error::from(error).into()
    }
}

impl From<ava_sarc::error::Error> for ReadError {
    fn from(error: ava_sarc::error::Error) -> Self {
        Error::from(error).into()
    }
}

impl From<std::io::Error> for ReadError {
    fn from(error: std::io::Error) -> Self {
        Error::from(error).into()
    }
}

/// Generic result type with crate's Error as its error variant
pub type Result<T> = core::result::Result<T, Error>;

/// Result delivered to the waiters of a read
pub type ReadResult<T = Bytes> = core::result::Result<T, ReadError>;
