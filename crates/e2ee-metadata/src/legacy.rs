//! Legacy (1.x) folder metadata
//!
//! Version 1 documents keep the metadata key wrapped per folder rather than
//! per user, and encrypt each file record on its own into a combined
//! `base64(ct)|base64(iv)` string. These documents are only ever read and
//! migrated; nothing here is used on the write path of a live folder.

use crate::{
    types::{null_as_default, string_or_number},
    MetadataError, Result,
};
use e2ee_crypto::{
    encoding, hashing::legacy_folder_checksum, symmetric, Certificate, Decryptor, Encryptor, MetadataKey,
    PrivateKey,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, error};

/// Version written by [`encrypt_v1`]
pub const LEGACY_VERSION: &str = "1.2";

/// Folder-level section of a legacy document
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyMetadata {
    /// Historical wrapped keys by index
    #[serde(default, deserialize_with = "null_as_default")]
    pub metadata_keys: BTreeMap<String, String>,
    /// Single wrapped key (1.2)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata_key: Option<String>,
    /// Format version, 1, 1.1 or 1.2
    #[serde(default, deserialize_with = "string_or_number")]
    pub version: String,
    /// Folder checksum (1.2)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checksum: Option<String>,
}

impl LegacyMetadata {
    fn wrapped_key_for(&self, index: u32) -> Option<&str> {
        self.metadata_key
            .as_deref()
            .or_else(|| self.metadata_keys.get(&index.to_string()).map(String::as_str))
    }
}

/// Encrypted file record of a legacy document
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyEncryptedFile {
    /// Combined `base64(ct)|base64(iv)` of the record
    pub encrypted: String,
    /// Base64 nonce of the file content
    pub initialization_vector: String,
    /// Base64 tag of the file content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authentication_tag: Option<String>,
    /// Index into `metadataKeys`
    #[serde(default)]
    pub metadata_key: u32,
}

/// Full legacy document as stored on the server
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedFolderMetadataFileV1 {
    /// Folder-level section
    pub metadata: LegacyMetadata,
    /// Token to encrypted file record
    #[serde(default, deserialize_with = "null_as_default")]
    pub files: BTreeMap<String, LegacyEncryptedFile>,
}

/// Plaintext of a legacy file record
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyData {
    /// Base64 content key
    pub key: String,
    /// Plaintext name
    pub filename: String,
    /// MIME type; folders use [`crate::types::FOLDER_MIMETYPE`]
    pub mimetype: String,
    /// Record version
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<f64>,
}

/// Decrypted legacy file record
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyDecryptedFile {
    /// The decrypted record
    pub encrypted: LegacyData,
    /// Base64 nonce of the file content
    pub initialization_vector: String,
    /// Base64 tag of the file content
    #[serde(default)]
    pub authentication_tag: Option<String>,
    /// Index into `metadataKeys`
    #[serde(default)]
    pub metadata_key: u32,
}

/// Decrypted legacy document
#[derive(Clone, Debug)]
pub struct DecryptedFolderMetadataFileV1 {
    /// Folder-level section, still holding the wrapped keys
    pub metadata: LegacyMetadata,
    /// Token to decrypted record
    pub files: BTreeMap<String, LegacyDecryptedFile>,
    /// Every key the document's records were decrypted with
    pub keys: Vec<MetadataKey>,
}

/// Decrypt a legacy document.
///
/// The single `metadataKey` wins over the indexed list. With a mnemonic the
/// folder checksum is verified whenever the document carries one.
pub fn decrypt_v1(
    document: &EncryptedFolderMetadataFileV1,
    private_key: &PrivateKey,
    mnemonic: Option<&str>,
) -> Result<DecryptedFolderMetadataFileV1> {
    let decryptor = Decryptor::new(private_key);
    let mut unwrapped: BTreeMap<u32, MetadataKey> = BTreeMap::new();
    let mut files = BTreeMap::new();

    for (token, file) in &document.files {
        let key = match unwrapped.get(&file.metadata_key) {
            Some(key) => key.clone(),
            None => {
                let wrapped = document
                    .metadata
                    .wrapped_key_for(file.metadata_key)
                    .ok_or_else(|| MetadataError::Migration(format!("no metadata key for file {token}")))?;
                let key = decryptor.decrypt_key_legacy(wrapped).map_err(MetadataError::KeyUnwrap)?;
                unwrapped.insert(file.metadata_key, key.clone());
                key
            }
        };

        let plaintext = symmetric::open_legacy(&key, &file.encrypted)?;
        let json = std::str::from_utf8(&plaintext)
            .map_err(|e| MetadataError::Codec(format!("legacy record {token}: {e}")))
            .and_then(|b64| Ok(encoding::decode(b64)?))?;
        let data: LegacyData = serde_json::from_slice(&json)?;

        files.insert(
            token.clone(),
            LegacyDecryptedFile {
                encrypted: data,
                initialization_vector: file.initialization_vector.clone(),
                authentication_tag: file.authentication_tag.clone(),
                metadata_key: file.metadata_key,
            },
        );
    }

    if let (Some(mnemonic), Some(expected)) = (mnemonic, document.metadata.checksum.as_deref()) {
        if !expected.is_empty() {
            let actual = legacy_folder_checksum(
                mnemonic.trim(),
                document.files.keys().map(String::as_str),
                document.metadata.metadata_key.as_deref().unwrap_or_default(),
            );
            if actual != expected {
                error!("legacy folder checksum mismatch");
                return Err(MetadataError::ChecksumMismatch);
            }
        }
    }

    debug!(files = files.len(), keys = unwrapped.len(), "legacy metadata decrypted");
    Ok(DecryptedFolderMetadataFileV1 {
        metadata: document.metadata.clone(),
        files,
        keys: unwrapped.into_values().collect(),
    })
}

/// Encrypt records into a legacy 1.2 document under `key`.
///
/// Kept for interoperability tests against the migration path.
pub fn encrypt_v1(
    files: &BTreeMap<String, LegacyDecryptedFile>,
    key: &MetadataKey,
    certificate: &Certificate,
    mnemonic: Option<&str>,
) -> Result<EncryptedFolderMetadataFileV1> {
    let wrapped = Encryptor::new(certificate)?.encrypt_key_legacy(key)?;

    let mut encrypted_files = BTreeMap::new();
    for (token, file) in files {
        let json = serde_json::to_string(&file.encrypted)?;
        encrypted_files.insert(
            token.clone(),
            LegacyEncryptedFile {
                encrypted: symmetric::seal_legacy(key, encoding::encode(json).as_bytes())?,
                initialization_vector: file.initialization_vector.clone(),
                authentication_tag: file.authentication_tag.clone(),
                metadata_key: 0,
            },
        );
    }

    let checksum =
        mnemonic.map(|m| legacy_folder_checksum(m.trim(), files.keys().map(String::as_str), &wrapped));

    Ok(EncryptedFolderMetadataFileV1 {
        metadata: LegacyMetadata {
            metadata_keys: BTreeMap::from([("0".to_string(), wrapped.clone())]),
            metadata_key: Some(wrapped),
            version: LEGACY_VERSION.to_string(),
            checksum,
        },
        files: encrypted_files,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{detect_version, E2eVersion};
    use e2ee_crypto::fixtures;

    const MNEMONIC: &str = "quarter plate lunch sick stone prize unique mixed";

    fn record(name: &str, mimetype: &str) -> LegacyDecryptedFile {
        LegacyDecryptedFile {
            encrypted: LegacyData {
                key: "a2V5a2V5a2V5a2V5a2V5aw==".into(),
                filename: name.into(),
                mimetype: mimetype.into(),
                version: Some(1.0),
            },
            initialization_vector: "aXZpdml2aXZpdml2aXZpdg==".into(),
            authentication_tag: Some("dGFndGFndGFndGFndGFndA==".into()),
            metadata_key: 0,
        }
    }

    fn sample() -> BTreeMap<String, LegacyDecryptedFile> {
        BTreeMap::from([
            ("tok-a".to_string(), record("report.pdf", "application/pdf")),
            ("tok-b".to_string(), record("Photos", crate::types::FOLDER_MIMETYPE)),
        ])
    }

    #[test]
    fn test_v1_roundtrip() {
        let alice = fixtures::alice();
        let key = MetadataKey::generate();
        let encrypted = encrypt_v1(&sample(), &key, alice.certificate(), None).unwrap();

        let decrypted = decrypt_v1(&encrypted, alice.private_key(), None).unwrap();

        assert_eq!(decrypted.files, sample());
        assert_eq!(decrypted.keys, vec![key]);
    }

    #[test]
    fn test_version_is_detected_as_legacy() {
        let alice = fixtures::alice();
        let encrypted = encrypt_v1(&sample(), &MetadataKey::generate(), alice.certificate(), None).unwrap();
        let json = serde_json::to_string(&encrypted).unwrap();
        assert_eq!(detect_version(&json), E2eVersion::V1_2);
    }

    #[test]
    fn test_indexed_key_used_without_single_key() {
        let alice = fixtures::alice();
        let mut encrypted = encrypt_v1(&sample(), &MetadataKey::generate(), alice.certificate(), None).unwrap();
        encrypted.metadata.metadata_key = None;
        assert_eq!(decrypt_v1(&encrypted, alice.private_key(), None).unwrap().files.len(), 2);

        encrypted.metadata.metadata_keys.clear();
        assert!(matches!(
            decrypt_v1(&encrypted, alice.private_key(), None),
            Err(MetadataError::Migration(_))
        ));
    }

    #[test]
    fn test_checksum_verified_with_mnemonic() {
        let alice = fixtures::alice();
        let encrypted =
            encrypt_v1(&sample(), &MetadataKey::generate(), alice.certificate(), Some(MNEMONIC)).unwrap();

        decrypt_v1(&encrypted, alice.private_key(), Some(MNEMONIC)).unwrap();
        decrypt_v1(&encrypted, alice.private_key(), None).unwrap();

        let result = decrypt_v1(&encrypted, alice.private_key(), Some("another mnemonic"));
        assert!(matches!(result, Err(MetadataError::ChecksumMismatch)));
    }

    #[test]
    fn test_wrong_private_key() {
        let encrypted =
            encrypt_v1(&sample(), &MetadataKey::generate(), fixtures::alice().certificate(), None).unwrap();
        assert!(matches!(
            decrypt_v1(&encrypted, fixtures::bob().private_key(), None),
            Err(MetadataError::KeyUnwrap(_))
        ));
    }

    #[test]
    fn test_parses_numeric_version() {
        let doc: EncryptedFolderMetadataFileV1 =
            serde_json::from_str(r#"{"metadata":{"metadataKeys":{"0":"x"},"version":1},"files":{}}"#).unwrap();
        assert_eq!(doc.metadata.version, "1");
        assert!(doc.metadata.metadata_key.is_none());
    }
}
