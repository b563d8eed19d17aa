//! Error types for the e2ee-crypto crate

use thiserror::Error;

/// Result type alias using `CryptoError`
pub type Result<T> = std::result::Result<T, CryptoError>;

/// Errors that can occur during cryptographic operations
#[derive(Error, Debug)]
pub enum CryptoError {
    /// Encryption failed
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Decryption failed (AEAD tag mismatch, wrong key, corrupt ciphertext)
    #[error("decryption failed: {0}")]
    Decryption(String),

    /// Invalid key format or length
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// Certificate could not be parsed or carries an unusable public key
    #[error("invalid certificate: {0}")]
    InvalidCertificate(String),

    /// Invalid ciphertext format
    #[error("invalid ciphertext: {0}")]
    InvalidCiphertext(String),

    /// Invalid nonce
    #[error("invalid nonce: {0}")]
    InvalidNonce(String),

    /// The detached authentication tag does not match the ciphertext
    #[error("authentication tag does not match ciphertext")]
    TagMismatch,

    /// Building a CMS signed-data structure failed
    #[error("signing failed: {0}")]
    Signing(String),

    /// Signature verification failed
    #[error("signature verification failed")]
    SignatureVerification,

    /// Gzip compression or decompression failed
    #[error("compression error: {0}")]
    Compression(String),

    /// Base64 decode error
    #[error("base64 decode error: {0}")]
    Base64Decode(#[from] base64::DecodeError),
}

impl From<der::Error> for CryptoError {
    fn from(err: der::Error) -> Self {
        CryptoError::InvalidCertificate(err.to_string())
    }
}
