//! Gzip codec for metadata and filedrop plaintexts

use crate::{CryptoError, Result};
use flate2::{read::GzDecoder, write::GzEncoder, Compression};
use std::io::{Read, Write};

/// Gzip-compress bytes
pub fn compress(content: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(content)
        .map_err(|err| CryptoError::Compression(format!("gzip write failed: {err:?}")))?;
    encoder
        .finish()
        .map_err(|err| CryptoError::Compression(format!("gzip finish failed: {err:?}")))
}

/// Gzip-decompress bytes
pub fn decompress(content: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(content);
    let mut result = Vec::<u8>::new();
    decoder
        .read_to_end(&mut result)
        .map_err(|err| CryptoError::Compression(format!("gzip read failed: {err:?}")))?;
    Ok(result)
}

/// Decompress into a UTF-8 string
pub fn decompress_to_string(content: &[u8]) -> Result<String> {
    String::from_utf8(decompress(content)?)
        .map_err(|err| CryptoError::Compression(format!("decompressed data is not UTF-8: {err}")))
}

#[test]
fn compress_decompress() {
    assert_eq!(decompress(&compress(b"hello").unwrap()).unwrap(), b"hello");
}

#[test]
fn gzip_magic_header() {
    let gz = compress(b"{}").unwrap();
    assert_eq!(&gz[..2], &[0x1f, 0x8b]);
}

#[test]
fn rejects_non_gzip_input() {
    assert!(matches!(
        decompress(b"{\"plain\":true}"),
        Err(CryptoError::Compression(_))
    ));
}
