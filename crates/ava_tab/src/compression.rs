//! Payload compression and decompression handling.

use std::{
    fmt::{self, Debug},
    io::{Read, Write},
    sync::Arc,
};

use binrw::{BinRead, BinWrite};
use bytes::Bytes;
use flate2::{
    read::{DeflateDecoder, ZlibDecoder},
    write::ZlibEncoder,
    Compression,
};
use tracing::{instrument, trace};

use crate::error::CodecError;

/// Identifies the codec used to store a payload inside an archive pair
///
/// Stored as a single byte in current format index entries. Legacy indices have no field for it,
/// their entries are always [`CompressionKind::None`].
#[derive(BinRead, BinWrite, Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
#[brw(repr=u8)]
pub enum CompressionKind {
    /// Stores the data as it is
    #[default]
    None = 0,

    /// Zlib framed deflate stream
    Zlib = 1,

    /// The proprietary LZ family shipped with newer titles, decoded by an external library
    ProprietaryLz = 4,
}

impl TryFrom<u8> for CompressionKind {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(CompressionKind::None),
            1 => Ok(CompressionKind::Zlib),
            4 => Ok(CompressionKind::ProprietaryLz),
            other => Err(CodecError::UnknownKind(other)),
        }
    }
}

/// An external decoder for [`CompressionKind::ProprietaryLz`] payloads
///
/// Implementations fill `output` completely and return the number of bytes produced, or a
/// description of why the stream could not be decoded.
pub trait LzDecompressor: Send + Sync {
    fn decompress(&self, input: &[u8], output: &mut [u8]) -> Result<usize, String>;
}

/// Largest ratio of decoded to encoded bytes a deflate stream can reach
pub const MAX_DEFLATE_EXPANSION: usize = 1032;

/// Largest ratio of decoded to encoded bytes accepted from an [`LzDecompressor`]
pub const MAX_LZ_EXPANSION: usize = 0x1_0000;

/// Bytes to reserve up front for `declared` decoded bytes produced from `encoded_len` input bytes
///
/// Declared sizes come from file headers, the reservation never exceeds what the input could
/// expand to.
pub fn decoded_capacity(encoded_len: usize, declared: usize) -> usize {
    declared.min(encoded_len.saturating_mul(MAX_DEFLATE_EXPANSION))
}

/// Upper bound of the zlib output for `len` input bytes.
pub const fn compress_bound(len: usize) -> usize {
    len + (len >> 12) + (len >> 14) + (len >> 25) + 13
}

/// Remove the 2 byte zlib header and 4 byte Adler-32 trailer, leaving the raw deflate stream.
pub fn strip_zlib_framing(data: &[u8]) -> &[u8] {
    if data.len() < 6 {
        return &[];
    }
    &data[2..data.len() - 4]
}

/// Inflate a headerless deflate stream into exactly `expected_len` bytes.
#[instrument(skip(input), err, fields(input_len = input.len()))]
pub fn inflate_raw(input: &[u8], expected_len: usize) -> Result<Bytes, CodecError> {
    read_exactly(
        DeflateDecoder::new(input),
        input.len(),
        CompressionKind::Zlib,
        expected_len,
    )
}

/// Deflate `input` and return the stream without zlib framing.
pub fn deflate_raw(input: &[u8]) -> Result<Vec<u8>, CodecError> {
    let framed = zlib_compress(input)?;
    Ok(strip_zlib_framing(&framed).to_vec())
}

fn zlib_compress(input: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut encoder = ZlibEncoder::new(
        Vec::with_capacity(compress_bound(input.len())),
        Compression::default(),
    );
    encoder
        .write_all(input)
        .and_then(|_| encoder.finish())
        .map_err(|e| CodecError::Corrupt {
            kind: CompressionKind::Zlib,
            reason: e.to_string(),
        })
}

fn read_exactly(
    decoder: impl Read,
    input_len: usize,
    kind: CompressionKind,
    expected_len: usize,
) -> Result<Bytes, CodecError> {
    let mut output = Vec::with_capacity(decoded_capacity(input_len, expected_len));
    // one byte past the expected size is enough to notice an overlong stream
    decoder
        .take(expected_len as u64 + 1)
        .read_to_end(&mut output)
        .map_err(|e| CodecError::Corrupt {
            kind,
            reason: e.to_string(),
        })?;

    if output.len() != expected_len {
        return Err(CodecError::LengthMismatch {
            kind,
            expected: expected_len,
            actual: output.len(),
        });
    }

    Ok(output.into())
}

/// Dispatches payloads to the codec recorded for them
///
/// [`CompressionKind::None`] and [`CompressionKind::Zlib`] are always available. The proprietary
/// codec needs an [`LzDecompressor`] installed with [`Codec::with_lz`], reads of such entries fail
/// with [`CodecError::Unavailable`] otherwise.
#[derive(Clone, Default)]
pub struct Codec {
    lz: Option<Arc<dyn LzDecompressor>>,
}

impl Debug for Codec {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Codec")
            .field("lz", &self.lz.is_some())
            .finish()
    }
}

impl Codec {
    /// A codec that only handles the built-in formats
    pub fn new() -> Self {
        Self::default()
    }

    /// A codec that forwards proprietary payloads to `lz`
    pub fn with_lz(lz: Arc<dyn LzDecompressor>) -> Self {
        Self { lz: Some(lz) }
    }

    /// Whether proprietary payloads can be decoded
    pub fn supports(&self, kind: CompressionKind) -> bool {
        kind != CompressionKind::ProprietaryLz || self.lz.is_some()
    }

    /// Decode `input` and check it produces exactly `expected_len` bytes
    #[instrument(skip(self, input), err, fields(input_len = input.len()))]
    pub fn decompress(
        &self,
        kind: CompressionKind,
        input: &[u8],
        expected_len: usize,
    ) -> Result<Bytes, CodecError> {
        match kind {
            CompressionKind::None => {
                if input.len() != expected_len {
                    return Err(CodecError::LengthMismatch {
                        kind,
                        expected: expected_len,
                        actual: input.len(),
                    });
                }
                Ok(Bytes::copy_from_slice(input))
            }
            CompressionKind::Zlib => {
                read_exactly(ZlibDecoder::new(input), input.len(), kind, expected_len)
            }
            CompressionKind::ProprietaryLz => {
                let lz = self.lz.as_ref().ok_or(CodecError::Unavailable(kind))?;
                if expected_len > input.len().saturating_mul(MAX_LZ_EXPANSION) {
                    return Err(CodecError::ImplausibleSize {
                        kind,
                        declared: expected_len,
                        input: input.len(),
                    });
                }

                let mut output = vec![0u8; expected_len];
                let written = lz
                    .decompress(input, &mut output)
                    .map_err(|reason| CodecError::Corrupt { kind, reason })?;
                if written != expected_len {
                    return Err(CodecError::LengthMismatch {
                        kind,
                        expected: expected_len,
                        actual: written,
                    });
                }

                trace!("decoded {} proprietary bytes", written);
                Ok(output.into())
            }
        }
    }

    /// Encode `input`, only [`CompressionKind::None`] and [`CompressionKind::Zlib`] can be written
    #[instrument(skip(self, input), err, fields(input_len = input.len()))]
    pub fn compress(&self, kind: CompressionKind, input: &[u8]) -> Result<Bytes, CodecError> {
        match kind {
            CompressionKind::None => Ok(Bytes::copy_from_slice(input)),
            CompressionKind::Zlib => Ok(zlib_compress(input)?.into()),
            CompressionKind::ProprietaryLz => Err(CodecError::Unsupported(kind)),
        }
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use pretty_assertions::assert_eq;
    use tracing_test::traced_test;

    use super::*;

    const HELLO: &[u8] = b"Hello World";

    #[rustfmt::skip]
    const HELLO_ZLIB: [u8; 19] = [
        0x78, 0x9C, 0xF3, 0x48, 0xCD, 0xC9, 0xC9, 0x57,
        0x08, 0xCF, 0x2F, 0xCA, 0x49, 0x01, 0x00, 0x18,
        0x0B, 0x04, 0x1D,
    ];

    struct Reverse;

    impl LzDecompressor for Reverse {
        fn decompress(&self, input: &[u8], output: &mut [u8]) -> Result<usize, String> {
            if input.len() != output.len() {
                return Err("size".into());
            }
            for (o, i) in output.iter_mut().zip(input.iter().rev()) {
                *o = *i;
            }
            Ok(input.len())
        }
    }

    #[test]
    fn kind_from_byte() {
        assert_eq!(CompressionKind::try_from(0), Ok(CompressionKind::None));
        assert_eq!(CompressionKind::try_from(1), Ok(CompressionKind::Zlib));
        assert_eq!(
            CompressionKind::try_from(4),
            Ok(CompressionKind::ProprietaryLz)
        );
        assert_eq!(
            CompressionKind::try_from(2),
            Err(CodecError::UnknownKind(2))
        );
    }

    #[traced_test]
    #[test]
    fn decompress_zlib() -> Result<(), CodecError> {
        let actual = Codec::new().decompress(CompressionKind::Zlib, &HELLO_ZLIB, HELLO.len())?;
        assert_eq!(&actual[..], HELLO);
        Ok(())
    }

    #[traced_test]
    #[test]
    fn decompress_zlib_length_mismatch() {
        let actual = Codec::new().decompress(CompressionKind::Zlib, &HELLO_ZLIB, 4);
        assert_eq!(
            actual,
            Err(CodecError::LengthMismatch {
                kind: CompressionKind::Zlib,
                expected: 4,
                actual: 5,
            })
        );
    }

    #[traced_test]
    #[test]
    fn decompress_zlib_garbage() {
        let actual = Codec::new().decompress(CompressionKind::Zlib, &[0xAB; 16], 16);
        assert!(matches!(actual, Err(CodecError::Corrupt { .. })));
    }

    #[test]
    fn decompress_none_checks_length() {
        let codec = Codec::new();
        assert!(codec
            .decompress(CompressionKind::None, HELLO, HELLO.len())
            .is_ok());
        assert!(matches!(
            codec.decompress(CompressionKind::None, HELLO, 3),
            Err(CodecError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn proprietary_without_decoder() {
        let codec = Codec::new();
        assert!(!codec.supports(CompressionKind::ProprietaryLz));
        assert_eq!(
            codec.decompress(CompressionKind::ProprietaryLz, HELLO, HELLO.len()),
            Err(CodecError::Unavailable(CompressionKind::ProprietaryLz))
        );
    }

    #[test]
    fn proprietary_rejects_oversized_output() {
        let codec = Codec::with_lz(Arc::new(Reverse));
        assert_eq!(
            codec.decompress(CompressionKind::ProprietaryLz, b"olleh", u32::MAX as usize),
            Err(CodecError::ImplausibleSize {
                kind: CompressionKind::ProprietaryLz,
                declared: u32::MAX as usize,
                input: 5,
            })
        );
    }

    #[test]
    fn declared_size_does_not_drive_the_reservation() {
        assert_eq!(decoded_capacity(16, 11), 11);
        assert_eq!(
            decoded_capacity(48, u32::MAX as usize),
            48 * MAX_DEFLATE_EXPANSION
        );
        assert_eq!(decoded_capacity(0, 4096), 0);
    }

    #[traced_test]
    #[test]
    fn decompress_zlib_with_hostile_length() {
        let actual =
            Codec::new().decompress(CompressionKind::Zlib, &HELLO_ZLIB, u32::MAX as usize);
        assert_eq!(
            actual,
            Err(CodecError::LengthMismatch {
                kind: CompressionKind::Zlib,
                expected: u32::MAX as usize,
                actual: HELLO.len(),
            })
        );
    }

    #[test]
    fn proprietary_with_decoder() -> Result<(), CodecError> {
        let codec = Codec::with_lz(Arc::new(Reverse));
        assert!(codec.supports(CompressionKind::ProprietaryLz));

        let actual = codec.decompress(CompressionKind::ProprietaryLz, b"olleh", 5)?;
        assert_eq!(&actual[..], b"hello");
        Ok(())
    }

    #[test]
    fn compress_then_decompress() -> Result<(), CodecError> {
        let codec = Codec::new();
        let input = b"abcabcabcabcabcabcabcabcabcabcabcabc".repeat(32);

        let packed = codec.compress(CompressionKind::Zlib, &input)?;
        assert!(packed.len() <= compress_bound(input.len()));

        let unpacked = codec.decompress(CompressionKind::Zlib, &packed, input.len())?;
        assert_eq!(&unpacked[..], &input[..]);
        Ok(())
    }

    #[test]
    fn compress_proprietary_is_unsupported() {
        assert_eq!(
            Codec::new().compress(CompressionKind::ProprietaryLz, HELLO),
            Err(CodecError::Unsupported(CompressionKind::ProprietaryLz))
        );
    }

    #[test]
    fn raw_deflate_round_trip() -> Result<(), CodecError> {
        let raw = deflate_raw(HELLO)?;
        assert_eq!(&inflate_raw(&raw, HELLO.len())?[..], HELLO);

        let stripped = strip_zlib_framing(&HELLO_ZLIB);
        assert_eq!(stripped.len(), HELLO_ZLIB.len() - 6);
        assert_eq!(&inflate_raw(stripped, HELLO.len())?[..], HELLO);
        Ok(())
    }
}
