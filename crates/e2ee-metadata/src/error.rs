//! Metadata engine error types

use e2ee_crypto::CryptoError;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, MetadataError>;

/// Failure reported by a remote or local collaborator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{operation} failed ({status}): {message}")]
pub struct RemoteError {
    /// Operation that failed, e.g. `lock`
    pub operation: String,
    /// HTTP-like status code, 0 when no response was received
    pub status: u16,
    /// Human-readable detail
    pub message: String,
}

impl RemoteError {
    /// Create a new remote error
    pub fn new(operation: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            status,
            message: message.into(),
        }
    }
}

/// Metadata engine errors
#[derive(Error, Debug)]
pub enum MetadataError {
    /// AEAD tag mismatch, malformed ciphertext or a failing primitive
    #[error("crypto failure: {0}")]
    CryptoFailure(#[source] CryptoError),

    /// The metadata key could not be unwrapped with the caller's private key
    #[error("cannot unwrap metadata key: {0}")]
    KeyUnwrap(#[source] CryptoError),

    /// The caller is not in the folder's user list
    #[error("user {user_id} is not authorized for this folder")]
    UserNotAuthorized { user_id: String },

    /// The metadata counter went backwards
    #[error("stale metadata: counter {received} is older than {expected}")]
    StaleMetadata { expected: u64, received: u64 },

    /// The metadata key's checksum is not in `keyChecksums`
    #[error("metadata key checksum {checksum} not recognized")]
    KeyNotRecognized { checksum: String },

    /// No authorized user's certificate verifies the signature
    #[error("metadata signature is invalid")]
    SignatureInvalid,

    /// Legacy metadata could not be migrated
    #[error("migration failed: {0}")]
    Migration(String),

    /// A filedrop entry could not be decrypted
    #[error("filedrop entry {token} is corrupt: {reason}")]
    FiledropCorrupt { token: String, reason: String },

    /// Metadata for the folder or one of its ancestors could not be fetched
    #[error("metadata unavailable: {0}")]
    MetadataUnavailable(String),

    /// The document declares a version this engine cannot read
    #[error("unsupported metadata version: {0}")]
    UnsupportedVersion(String),

    /// The legacy folder checksum does not match
    #[error("legacy folder checksum mismatch")]
    ChecksumMismatch,

    /// No file entry under the given token
    #[error("file {0} not found in metadata")]
    FileNotFound(String),

    /// No sharee with the given id
    #[error("user {0} not found in metadata")]
    UserNotFound(String),

    /// A sharing operation was attempted on a subfolder document
    #[error("operation requires a top-level encrypted folder")]
    NotTopFolder,

    /// Locking the folder failed
    #[error("lock failed: {0}")]
    LockFailed(#[source] RemoteError),

    /// Storing or updating the metadata failed
    #[error("upload failed: {0}")]
    UploadFailed(#[source] RemoteError),

    /// Releasing the folder lock failed
    #[error("unlock failed: {0}")]
    UnlockFailed(#[source] RemoteError),

    /// JSON could not be parsed or produced
    #[error("codec error: {0}")]
    Codec(String),

    /// The metadata counter cannot advance any further
    #[error("metadata counter exhausted at {0}")]
    CounterExhausted(u64),
}

impl MetadataError {
    /// Errors indicating tampering, rollback or a foreign key
    pub fn is_integrity_failure(&self) -> bool {
        matches!(
            self,
            Self::StaleMetadata { .. }
                | Self::KeyNotRecognized { .. }
                | Self::SignatureInvalid
                | Self::ChecksumMismatch
        )
    }

    /// Errors the caller may retry later as a whole operation
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::MetadataUnavailable(_)
                | Self::LockFailed(_)
                | Self::UploadFailed(_)
                | Self::UnlockFailed(_)
        )
    }
}

impl From<CryptoError> for MetadataError {
    fn from(err: CryptoError) -> Self {
        MetadataError::CryptoFailure(err)
    }
}

impl From<serde_json::Error> for MetadataError {
    fn from(err: serde_json::Error) -> Self {
        MetadataError::Codec(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integrity_classification() {
        assert!(MetadataError::SignatureInvalid.is_integrity_failure());
        assert!(MetadataError::StaleMetadata { expected: 3, received: 2 }.is_integrity_failure());
        assert!(!MetadataError::SignatureInvalid.is_retryable());
        assert!(!MetadataError::UserNotAuthorized { user_id: "bob".into() }.is_integrity_failure());
    }

    #[test]
    fn test_retry_classification() {
        let remote = RemoteError::new("lock", 423, "locked");
        assert!(MetadataError::LockFailed(remote).is_retryable());
        assert!(MetadataError::MetadataUnavailable("timeout".into()).is_retryable());
        assert!(!MetadataError::Migration("no key".into()).is_retryable());
    }

    #[test]
    fn test_crypto_errors_convert() {
        let err: MetadataError = CryptoError::TagMismatch.into();
        assert!(matches!(err, MetadataError::CryptoFailure(CryptoError::TagMismatch)));
    }
}
