//! Types for writing TAB/ARC archive pairs
//!

use bon::Builder;
use std::fmt::Debug;
use std::io::{self, Seek, Write};
use tracing::{debug, instrument, Level};

use crate::compression::{Codec, CompressionKind};
use crate::error::{Error, Result};
use crate::hash::hash_path;
use crate::read::ArchiveTable;
use crate::types::{TableEntry, TableFormat};

/// Options for how the archive pair should be written
#[derive(Debug, Clone, Copy, Builder)]
pub struct ArchivePairWriterOptions {
    /// Layout of the index file
    #[builder(default)]
    pub format: TableFormat,

    /// Payload alignment inside the data file, also recorded in the index header
    #[builder(default = 16)]
    pub alignment: u32,
}

struct PendingFile {
    hash: u32,
    compression: CompressionKind,
    buffer: Vec<u8>,
}

/// Archive pair generator
///
/// ```
/// # fn doit() -> ava_tab::error::Result<()>
/// # {
/// use std::io::{Cursor, Write};
/// use ava_tab::write::{ArchivePairWriter, ArchivePairWriterOptions};
/// use ava_tab::{CompressionKind, TableFormat};
///
/// let mut pair = ArchivePairWriter::new(
///     Cursor::new(Vec::new()),
///     Cursor::new(Vec::new()),
///     ArchivePairWriterOptions::builder()
///         .format(TableFormat::Current)
///         .build(),
/// );
///
/// pair.start_file("settings/hello_world.txt", CompressionKind::Zlib)?;
/// pair.write_all(b"Hello, World!")?;
///
/// let (index, data) = pair.finish()?;
/// # Ok(())
/// # }
/// # doit().unwrap();
/// ```
pub struct ArchivePairWriter<I: Write + Seek, D: Write> {
    index: I,
    data: D,
    data_len: u64,
    table: ArchiveTable,
    codec: Codec,
    options: ArchivePairWriterOptions,
    current: Option<PendingFile>,
}

impl<I: Write + Seek, D: Write> ArchivePairWriter<I, D> {
    /// Initializes the pair.
    ///
    /// Before writing to this object, the [`ArchivePairWriter::start_file`] function should be
    /// called.
    pub fn new(index: I, data: D, options: ArchivePairWriterOptions) -> Self {
        let mut table = ArchiveTable::new(options.format);
        table.header_mut().set_alignment(options.alignment as i32);

        Self {
            index,
            data,
            data_len: 0,
            table,
            codec: Codec::new(),
            options,
            current: None,
        }
    }

    /// Returns true if a file is currently open for writing.
    pub const fn is_writing_file(&self) -> bool {
        self.current.is_some()
    }

    /// Start a new file addressed by the hash of its generic path
    #[instrument(skip(self, path), fields(path = path.as_ref()), err)]
    pub fn start_file(&mut self, path: impl AsRef<str>, compression: CompressionKind) -> Result<()> {
        self.start_file_hash(hash_path(path.as_ref()), compression)
    }

    /// Start a new file addressed by a precomputed content hash
    ///
    /// Legacy indices cannot describe compressed payloads, so the file is stored as is for them.
    #[instrument(skip(self), err)]
    pub fn start_file_hash(&mut self, hash: u32, compression: CompressionKind) -> Result<()> {
        if self.current.is_some() {
            self.finish_file()?;
        }

        let compression = match self.options.format {
            TableFormat::Legacy => CompressionKind::None,
            TableFormat::Current => compression,
        };

        self.current = Some(PendingFile {
            hash,
            compression,
            buffer: Vec::new(),
        });

        Ok(())
    }

    #[instrument(skip(self), err)]
    fn finish_file(&mut self) -> Result<()> {
        let Some(file) = self.current.take() else {
            return Ok(());
        };

        let packed = self.codec.compress(file.compression, &file.buffer)?;
        // payloads that do not shrink are stored as is
        let (compression, payload) = if packed.len() < file.buffer.len() {
            (file.compression, &packed[..])
        } else {
            (CompressionKind::None, &file.buffer[..])
        };

        self.pad_to_alignment()?;

        let entry = TableEntry {
            content_hash: file.hash,
            offset: self.data_len,
            compressed_size: u32::try_from(payload.len())
                .map_err(|_| Error::CustomError("payload exceeds 4 GiB".into()))?,
            uncompressed_size: file.buffer.len() as u32,
            compression,
            compressed_block_index: 0,
            flags: 0,
        };
        debug!(
            "stored {:#010x} at {:#x} ({} -> {} bytes)",
            entry.content_hash, entry.offset, entry.uncompressed_size, entry.compressed_size
        );

        self.data.write_all(payload)?;
        self.data_len += payload.len() as u64;
        self.table.push_entry(entry);

        Ok(())
    }

    fn pad_to_alignment(&mut self) -> io::Result<()> {
        let alignment = self.options.alignment as u64;
        if alignment <= 1 {
            return Ok(());
        }

        let padding = (alignment - self.data_len % alignment) % alignment;
        if padding > 0 {
            self.data.write_all(&vec![0u8; padding as usize])?;
            self.data_len += padding;
        }
        Ok(())
    }

    /// Finish the last file and write the index
    ///
    /// Returns the index and data writers.
    #[instrument(skip(self), err)]
    pub fn finish(mut self) -> Result<(I, D)> {
        self.finish_file()?;

        self.table.write(&mut self.index)?;
        self.index.flush()?;
        self.data.flush()?;

        Ok((self.index, self.data))
    }
}

impl<I: Write + Seek, D: Write> Write for ArchivePairWriter<I, D> {
    #[instrument(skip_all, err, ret(level = Level::TRACE), fields(size=buf.len()) )]
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let Some(file) = self.current.as_mut() else {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                "No file has been started",
            ));
        };
        file.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    #[instrument(skip(self), err)]
    fn flush(&mut self) -> io::Result<()> {
        self.data.flush()
    }
}
