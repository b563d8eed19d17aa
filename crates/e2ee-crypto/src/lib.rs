//! # E2EE Crypto
//!
//! Cryptographic primitives for end-to-end encrypted folder metadata.
//!
//! This crate provides:
//! - **AES-GCM**: Authenticated encryption of metadata bodies and file records
//! - **RSA-OAEP**: Wrapping symmetric keys for each user's certificate
//! - **X.509**: Certificate parsing and key-pair matching
//! - **CMS**: Detached and attached signed-data signatures
//! - **SHA-256**: Metadata key checksums
//! - **Gzip / Base64**: The wire codecs
//!
//! ## Security Model
//!
//! - All encryption happens client-side
//! - Private keys never leave the client device
//! - The server only stores ciphertext, wrapped keys and signatures
//!
//! ## Example
//!
//! ```rust,ignore
//! use e2ee_crypto::{symmetric, Decryptor, Encryptor, MetadataKey};
//!
//! let key = MetadataKey::generate();
//! let sealed = symmetric::seal(&key, b"{\"files\":{}}")?;
//!
//! // Wrap the key for a recipient
//! let wrapped = Encryptor::new(&recipient_certificate)?.encrypt_key(&key)?;
//!
//! // Recipient unwraps it
//! let key = Decryptor::new(&recipient_private_key).decrypt_key(&wrapped)?;
//! ```

pub mod asymmetric;
pub mod certificate;
pub mod compression;
pub mod encoding;
pub mod error;
pub mod hashing;
pub mod keys;
pub mod signing;
pub mod symmetric;

#[cfg(any(test, feature = "test-fixtures"))]
pub mod fixtures;

pub use asymmetric::{Decryptor, Encryptor};
pub use certificate::Certificate;
pub use error::{CryptoError, Result};
pub use hashing::{hash_metadata_key, Sha256Hash};
pub use keys::{is_matching_keys, MetadataKey, PrivateKey, SymmetricKey, UserKeyPair};
pub use symmetric::{Aead, Nonce, Sealed};
