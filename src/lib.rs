//! # e2ee
//!
//! End-to-end encrypted folder metadata for file-sync clients.
//!
//! - [`crypto`]: AES-GCM, RSA-OAEP key wrapping, X.509 certificates, CMS
//!   signatures and the wire codecs
//! - [`metadata`]: Folder documents, the key hierarchy, verification,
//!   filedrop, legacy migration and the [`E2eeEngine`]

pub use e2ee_crypto as crypto;
pub use e2ee_metadata as metadata;

pub use e2ee_crypto::{Certificate, CryptoError, MetadataKey, PrivateKey, UserKeyPair};
pub use e2ee_metadata::{
    AncestorResolver, DecryptedFile, DecryptedFolderMetadataFile, E2eeEngine, EngineConfig, FileStore,
    MetadataError, MetadataRemote, SignaturePolicy,
};
