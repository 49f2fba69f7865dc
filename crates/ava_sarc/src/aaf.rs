//! AAF chunked compression containers.
//!
//! Stream archives are usually shipped wrapped in an AAF container. The payload is cut into
//! chunks that are deflated independently, each chunk padded with `0x30` bytes so the next one
//! starts on a 16 byte boundary.

use std::io::{Cursor, Read, Seek, SeekFrom};

use ava_tab::compression::{decoded_capacity, deflate_raw, inflate_raw};
use binrw::{BinRead, BinWrite};
use bytes::Bytes;
use tracing::{debug, instrument, trace};

use crate::{
    error::{Error, Result},
    types::{AafChunkHeader, AafHeader, AAF_HEADER_SIZE, CHUNK_HEADER_SIZE, CHUNK_MAGIC},
};

/// Largest uncompressed chunk written by [`compress`] unless told otherwise
pub const DEFAULT_CHUNK_SIZE: usize = 0x0200_0000;

const PADDING_BYTE: u8 = 0x30;

/// Whether `bytes` starts like an AAF container
pub fn is_aaf(bytes: &[u8]) -> bool {
    bytes.starts_with(b"AAF\0")
}

/// Decode every chunk of an AAF container
#[instrument(skip(bytes), fields(len = bytes.len()), err)]
pub fn decompress(bytes: &[u8]) -> Result<Bytes> {
    let mut reader = Cursor::new(bytes);
    let header = AafHeader::read(&mut reader)?;
    debug!(
        "{} chunks, {} bytes total, {} byte buffer",
        header.chunk_count, header.total_uncompressed_size, header.uncompressed_buffer_size
    );

    let mut output = Vec::with_capacity(decoded_capacity(
        bytes.len(),
        header.total_uncompressed_size as usize,
    ));
    for index in 0..header.chunk_count {
        let chunk_start = reader.stream_position()?;
        let chunk = AafChunkHeader::read(&mut reader)?;
        trace!("chunk {}: {:?}", index, chunk);

        if chunk.magic != CHUNK_MAGIC {
            return Err(Error::InvalidChunkMagic {
                index,
                magic: chunk.magic,
            });
        }

        let mut payload = Vec::new();
        reader
            .by_ref()
            .take(chunk.compressed_size as u64)
            .read_to_end(&mut payload)?;
        if payload.len() != chunk.compressed_size as usize {
            return Err(Error::CustomError(format!(
                "chunk {index} is truncated ({} of {} bytes)",
                payload.len(),
                chunk.compressed_size
            )));
        }

        output.extend_from_slice(&inflate_raw(&payload, chunk.uncompressed_size as usize)?);
        reader.seek(SeekFrom::Start(chunk_start + chunk.data_size as u64))?;
    }

    if output.len() != header.total_uncompressed_size as usize {
        return Err(Error::SizeMismatch {
            expected: header.total_uncompressed_size as u64,
            actual: output.len() as u64,
        });
    }

    Ok(output.into())
}

/// One encoded chunk
#[derive(Debug, Clone, PartialEq)]
pub struct AafChunk {
    pub header: AafChunkHeader,
    /// Raw deflate stream
    pub payload: Vec<u8>,
    /// Number of padding bytes written after the payload
    pub padding: u32,
}

/// An encoded container, ready to be written out
#[derive(Debug, Clone, PartialEq)]
pub struct AafContainer {
    pub header: AafHeader,
    pub chunks: Vec<AafChunk>,
}

impl AafContainer {
    /// Split into header and chunks
    pub fn into_parts(self) -> (AafHeader, Vec<AafChunk>) {
        (self.header, self.chunks)
    }

    /// Size of the serialised container
    pub fn len(&self) -> u64 {
        AAF_HEADER_SIZE
            + self
                .chunks
                .iter()
                .map(|c| c.header.data_size as u64)
                .sum::<u64>()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Serialise header, chunks and padding
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Cursor::new(Vec::with_capacity(self.len() as usize));
        self.header.write(&mut out)?;
        for chunk in &self.chunks {
            chunk.header.write(&mut out)?;
            std::io::Write::write_all(&mut out, &chunk.payload)?;
            std::io::Write::write_all(&mut out, &vec![PADDING_BYTE; chunk.padding as usize])?;
        }
        Ok(out.into_inner())
    }
}

/// Encode `input` as an AAF container with chunks of at most `target_chunk_size` bytes
///
/// `1 + len / target_chunk_size` chunks are produced.
#[instrument(skip(input), fields(len = input.len()), err)]
pub fn compress(input: &[u8], target_chunk_size: usize) -> Result<AafContainer> {
    if target_chunk_size == 0 {
        return Err(Error::CustomError("chunk size must not be zero".into()));
    }

    let chunk_count = 1 + input.len() / target_chunk_size;
    let header = AafHeader {
        total_uncompressed_size: narrow(input.len())?,
        uncompressed_buffer_size: if chunk_count > 1 {
            narrow(target_chunk_size)?
        } else {
            narrow(input.len())?
        },
        chunk_count: narrow(chunk_count)?,
        ..Default::default()
    };
    debug!(
        "{} chunks, {} bytes total",
        header.chunk_count, header.total_uncompressed_size
    );

    let mut position = AAF_HEADER_SIZE;
    let mut chunks = Vec::with_capacity(chunk_count);
    let mut pieces = input.chunks(target_chunk_size);
    for _ in 0..chunk_count {
        // an input that is an exact multiple of the chunk size ends with an empty chunk
        let piece = pieces.next().unwrap_or(&[]);
        let payload = deflate_raw(piece)?;

        let end = position + CHUNK_HEADER_SIZE + payload.len() as u64;
        let padding = (16 - end % 16) % 16;

        let chunk = AafChunk {
            header: AafChunkHeader {
                compressed_size: narrow(payload.len())?,
                uncompressed_size: narrow(piece.len())?,
                data_size: narrow((CHUNK_HEADER_SIZE + payload.len() as u64 + padding) as usize)?,
                ..Default::default()
            },
            payload,
            padding: padding as u32,
        };
        trace!("chunk {:?}", chunk.header);

        position += chunk.header.data_size as u64;
        chunks.push(chunk);
    }

    Ok(AafContainer { header, chunks })
}

fn narrow(value: usize) -> Result<u32> {
    u32::try_from(value).map_err(|_| Error::CustomError(format!("{value} does not fit a u32")))
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;

    use super::{compress, decompress, is_aaf, DEFAULT_CHUNK_SIZE};
    use crate::error::{Error, Result};
    use crate::types::CHUNK_MAGIC;

    #[traced_test]
    #[test]
    fn two_chunks_round_trip() -> Result<()> {
        let input = b"0123456789ABcdefghij";

        let container = compress(input, 12)?;
        assert_eq!(container.header.chunk_count, 2);
        assert_eq!(container.header.total_uncompressed_size, 20);
        assert_eq!(container.header.uncompressed_buffer_size, 12);
        assert_eq!(container.chunks[0].header.uncompressed_size, 12);
        assert_eq!(container.chunks[1].header.uncompressed_size, 8);

        let bytes = container.to_bytes()?;
        assert!(is_aaf(&bytes));
        assert_eq!(bytes.len() as u64, container.len());
        assert_eq!(bytes.len() % 16, 0);

        let actual = decompress(&bytes)?;
        assert_eq!(actual.len(), 20);
        assert_eq!(&actual[..], input);

        Ok(())
    }

    #[traced_test]
    #[test]
    fn single_chunk_uses_input_length() -> Result<()> {
        let input = vec![7u8; 1000];

        let container = compress(&input, DEFAULT_CHUNK_SIZE)?;
        assert_eq!(container.header.chunk_count, 1);
        assert_eq!(container.header.uncompressed_buffer_size, 1000);

        let chunk = &container.chunks[0];
        assert_eq!(
            chunk.header.data_size as usize,
            16 + chunk.payload.len() + chunk.padding as usize
        );
        assert_eq!(&decompress(&container.to_bytes()?)?[..], &input[..]);

        Ok(())
    }

    #[traced_test]
    #[test]
    fn exact_multiple_ends_with_empty_chunk() -> Result<()> {
        let input = [1u8; 16];

        let container = compress(&input, 8)?;
        assert_eq!(container.header.chunk_count, 3);
        assert_eq!(container.chunks[2].header.uncompressed_size, 0);
        assert_eq!(&decompress(&container.to_bytes()?)?[..], &input[..]);

        Ok(())
    }

    #[traced_test]
    #[test]
    fn empty_input() -> Result<()> {
        let container = compress(&[], DEFAULT_CHUNK_SIZE)?;
        assert_eq!(container.header.chunk_count, 1);
        assert!(decompress(&container.to_bytes()?)?.is_empty());
        Ok(())
    }

    #[traced_test]
    #[test]
    fn corrupted_chunk_magic() -> Result<()> {
        let mut bytes = compress(b"0123456789ABcdefghij", 12)?.to_bytes()?;
        // magic of the first chunk header
        bytes[48 + 12] ^= 0xFF;

        let actual = decompress(&bytes);
        assert!(matches!(
            actual,
            Err(Error::InvalidChunkMagic { index: 0, magic }) if magic != CHUNK_MAGIC
        ));

        Ok(())
    }

    #[traced_test]
    #[test]
    fn declared_total_mismatch() -> Result<()> {
        let mut bytes = compress(b"0123456789", 64)?.to_bytes()?;
        // total_uncompressed_size
        bytes[36] = 11;

        assert!(matches!(
            decompress(&bytes),
            Err(Error::SizeMismatch {
                expected: 11,
                actual: 10
            })
        ));

        Ok(())
    }

    #[traced_test]
    #[test]
    fn huge_declared_total_without_chunks() -> Result<()> {
        let mut bytes = compress(b"", DEFAULT_CHUNK_SIZE)?.to_bytes()?;
        bytes.truncate(48);
        // total_uncompressed_size and chunk_count
        bytes[36..40].copy_from_slice(&u32::MAX.to_le_bytes());
        bytes[44..48].copy_from_slice(&0u32.to_le_bytes());

        assert!(matches!(
            decompress(&bytes),
            Err(Error::SizeMismatch {
                expected: 0xFFFF_FFFF,
                actual: 0
            })
        ));

        Ok(())
    }

    #[test]
    fn rejects_other_formats() {
        assert!(!is_aaf(b"SARC"));
        assert!(decompress(b"\x04\x00\x00\x00SARC").is_err());
    }
}
