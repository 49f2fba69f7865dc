//! Reading assets out of a `.tab`/`.arc` archive pair on disk.

use std::{
    fs::File,
    io::{self, BufReader},
    path::{Path, PathBuf},
};

use bytes::Bytes;
use tracing::{debug, instrument};

use crate::{
    compression::Codec,
    error::{Error, FileNotFoundError, Result},
    read::ArchiveTable,
    types::TableFormat,
};

/// Paths of the index and data file of the pair `name` in `directory`
pub fn pair_paths(directory: &Path, name: &str) -> (PathBuf, PathBuf) {
    (
        directory.join(format!("{name}.tab")),
        directory.join(format!("{name}.arc")),
    )
}

/// An opened archive pair
///
/// The index is parsed once on open, so many entries can be read without re-reading it.
#[derive(Debug)]
pub struct ArchivePair {
    name: String,
    table: ArchiveTable,
    data: BufReader<File>,
}

impl ArchivePair {
    /// Open `{directory}/{name}.tab` and `{directory}/{name}.arc`
    #[instrument(skip(directory), fields(directory = %directory.as_ref().display()), err)]
    pub fn open(directory: impl AsRef<Path>, name: &str, format: TableFormat) -> Result<Self> {
        let (index_path, data_path) = pair_paths(directory.as_ref(), name);

        let index = std::fs::read(&index_path)
            .map_err(|e| not_found(e, FileNotFoundError::Index(index_path.clone())))?;
        let data = File::open(&data_path)
            .map_err(|e| not_found(e, FileNotFoundError::Data(data_path.clone())))?;

        let table = ArchiveTable::parse(&index, format)?;
        debug!("opened {} with {} entries", name, table.len());

        Ok(Self {
            name: name.to_owned(),
            table,
            data: BufReader::new(data),
        })
    }

    /// The pair name, without extension
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The parsed index
    pub fn table(&self) -> &ArchiveTable {
        &self.table
    }

    /// Whether the index lists `hash`
    pub fn contains(&self, hash: u32) -> bool {
        self.table.contains(hash)
    }

    /// Read and decode the payload for `hash`
    pub fn read_entry(&mut self, hash: u32, codec: &Codec) -> Result<Bytes> {
        self.table.read_entry(&mut self.data, hash, codec)
    }
}

/// Read a single asset from the pair `name` in `directory`
///
/// Opens both files, parses the index and reads the payload. Use [`ArchivePair`] when several
/// entries of the same pair are needed.
pub fn read_entry(
    directory: impl AsRef<Path>,
    name: &str,
    hash: u32,
    format: TableFormat,
    codec: &Codec,
) -> Result<Bytes> {
    ArchivePair::open(directory, name, format)?.read_entry(hash, codec)
}

fn not_found(error: io::Error, which: FileNotFoundError) -> Error {
    match error.kind() {
        io::ErrorKind::NotFound => which.into(),
        _ => error.into(),
    }
}
