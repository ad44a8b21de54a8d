//! Transport compression for span payloads.
//!
//! Request bodies may be gzip-compressed, signalled by a `Content-Encoding`
//! value that mentions `gzip` anywhere in it (`gzip`, `x-gzip`, `gzip, identity`).

use bytes::Bytes;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{self, Read, Write};
use thiserror::Error;

/// Token that marks a gzip-compressed body.
pub const GZIP_TOKEN: &str = "gzip";

/// Error returned when a body declared as gzip cannot be inflated.
#[derive(Debug, Error)]
pub enum DecompressionError {
    /// The gzip stream was corrupt, truncated, or failed its checksum.
    #[error("Cannot gunzip spans: {0}")]
    Gunzip(#[source] io::Error),
}

/// Returns true if the declared encoding names gzip.
#[must_use]
pub fn is_gzip(encoding: Option<&str>) -> bool {
    encoding.is_some_and(|e| e.contains(GZIP_TOKEN))
}

/// Reverses the transport compression declared by `encoding`.
///
/// Bodies without a gzip encoding are returned untouched.
///
/// # Errors
///
/// Returns [`DecompressionError`] if the body is declared as gzip but cannot
/// be fully inflated.
pub fn decompress(body: Bytes, encoding: Option<&str>) -> Result<Bytes, DecompressionError> {
    if !is_gzip(encoding) {
        return Ok(body);
    }
    gunzip(&body)
        .map(Bytes::from)
        .map_err(DecompressionError::Gunzip)
}

/// Inflates a complete gzip stream into memory.
///
/// Every member of a multi-member stream is inflated, in order.
///
/// # Errors
///
/// Returns the underlying I/O error on a bad header, truncated stream, or
/// checksum mismatch.
pub fn gunzip(input: &[u8]) -> io::Result<Vec<u8>> {
    let mut decoder = MultiGzDecoder::new(input);
    let mut out = Vec::with_capacity(input.len());
    decoder.read_to_end(&mut out)?;
    Ok(out)
}

/// Compresses `input` as a single gzip member.
///
/// # Errors
///
/// Returns an error if the encoder fails to write.
pub fn gzip(input: &[u8]) -> io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(input)?;
    encoder.finish()
}
