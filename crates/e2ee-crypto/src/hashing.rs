//! Hashing utilities using SHA-256
//!
//! This module provides:
//! - Metadata key checksums, compared verbatim by servers and other clients
//! - The legacy folder checksum over a mnemonic, file tokens and wrapped key
//! - Message digests for CMS signatures

use crate::keys::SymmetricKey;
use sha2::{Digest, Sha256};
use std::fmt;

/// Size of a SHA-256 output in bytes
pub const HASH_BYTE_SIZE: usize = 32;

/// Minimum width of a rendered metadata key checksum
pub const CHECKSUM_MIN_WIDTH: usize = 32;

/// Type alias for hash output bytes
pub type HashOutput = [u8; HASH_BYTE_SIZE];

/// A SHA-256 digest
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Sha256Hash(HashOutput);

impl Sha256Hash {
    /// Get the hash as bytes
    pub fn as_bytes(&self) -> &HashOutput {
        &self.0
    }

    /// Full-width lowercase hex
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for Sha256Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sha256Hash({})", self.to_hex())
    }
}

impl fmt::Display for Sha256Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl AsRef<[u8]> for Sha256Hash {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Hash data in one call
pub fn sha256(data: &[u8]) -> Sha256Hash {
    Sha256Hash(Sha256::digest(data).into())
}

/// Full-width lowercase hex SHA-256 of a string's UTF-8 bytes
pub fn sha256_hex(s: &str) -> String {
    sha256(s.as_bytes()).to_hex()
}

/// Checksum of a metadata key as stored in `keyChecksums`.
///
/// The digest is read as a big-endian unsigned integer and rendered in
/// lowercase hex without leading zeros, then left-padded with `0` to at
/// least 32 characters. Digests starting with a zero byte therefore render
/// shorter than 64 characters.
pub fn hash_metadata_key(key: &SymmetricKey) -> String {
    let full = sha256(key.as_bytes()).to_hex();
    let trimmed = full.trim_start_matches('0');
    format!("{:0>width$}", trimmed, width = CHECKSUM_MIN_WIDTH)
}

/// Legacy folder checksum.
///
/// SHA-256 hex over the mnemonic with spaces removed, the file tokens in
/// sorted order and the wrapped metadata key, concatenated.
pub fn legacy_folder_checksum<'a, I>(mnemonic: &str, file_tokens: I, wrapped_key: &str) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut tokens: Vec<&str> = file_tokens.into_iter().collect();
    tokens.sort_unstable();

    let mut input = mnemonic.replace(' ', "");
    for token in tokens {
        input.push_str(token);
    }
    input.push_str(wrapped_key);
    sha256_hex(&input)
}
