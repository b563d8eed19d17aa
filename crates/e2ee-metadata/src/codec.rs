//! Metadata codec: JSON, gzip, AES-GCM and version detection

use crate::{
    types::{DecryptedMetadata, EncryptedFolderMetadataFile, EncryptedMetadata},
    MetadataError, Result,
};
use e2ee_crypto::{compression, encoding, symmetric, MetadataKey};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

/// Metadata format versions
#[allow(non_camel_case_types)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum E2eVersion {
    /// Legacy, one key per folder
    V1_0,
    /// Legacy with key list
    V1_1,
    /// Legacy with single wrapped key and checksum
    V1_2,
    /// Current format
    V2_0,
    /// Anything else
    Unknown,
}

impl E2eVersion {
    /// Whether this is one of the legacy versions
    pub fn is_legacy(&self) -> bool {
        matches!(self, E2eVersion::V1_0 | E2eVersion::V1_1 | E2eVersion::V1_2)
    }
}

/// Detect the format version of a serialized document.
///
/// A numeric `metadata.version` of 1, 1.1 or 1.2 is legacy. `"2"` or `"2.0"`
/// (string or number) at `metadata.version` or at the top level is current.
pub fn detect_version(json: &str) -> E2eVersion {
    let Ok(value) = serde_json::from_str::<Value>(json) else {
        return E2eVersion::Unknown;
    };
    let candidates = [
        value.get("metadata").and_then(|m| m.get("version")),
        value.get("version"),
    ];
    for version in candidates.into_iter().flatten() {
        let detected = match version {
            Value::Number(n) => match n.as_f64() {
                Some(v) if v == 1.0 => E2eVersion::V1_0,
                Some(v) if v == 1.1 => E2eVersion::V1_1,
                Some(v) if v == 1.2 => E2eVersion::V1_2,
                Some(v) if v == 2.0 => E2eVersion::V2_0,
                _ => E2eVersion::Unknown,
            },
            Value::String(s) => match s.as_str() {
                "1" | "1.0" => E2eVersion::V1_0,
                "1.1" => E2eVersion::V1_1,
                "1.2" => E2eVersion::V1_2,
                "2" | "2.0" => E2eVersion::V2_0,
                _ => E2eVersion::Unknown,
            },
            _ => E2eVersion::Unknown,
        };
        if detected != E2eVersion::Unknown {
            return detected;
        }
    }
    E2eVersion::Unknown
}

/// Serialize to compact JSON
pub fn to_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

/// Parse JSON
pub fn from_json<T: DeserializeOwned>(json: &str) -> Result<T> {
    Ok(serde_json::from_str(json)?)
}

/// Encrypt a metadata body: JSON, then gzip, then AES-GCM
pub fn encrypt_metadata(
    metadata: &DecryptedMetadata,
    key: &MetadataKey,
    version: &str,
) -> Result<EncryptedMetadata> {
    let json = to_json(metadata)?;
    let compressed = compression::compress(json.as_bytes())?;
    let sealed = symmetric::seal(key, &compressed)?;
    Ok(EncryptedMetadata {
        ciphertext: sealed.ciphertext_base64(),
        nonce: sealed.nonce_base64(),
        authentication_tag: sealed.tag_base64(),
        version: version.to_string(),
    })
}

/// Decrypt a metadata body and attach `key` to the result
pub fn decrypt_metadata(encrypted: &EncryptedMetadata, key: &MetadataKey) -> Result<DecryptedMetadata> {
    let compressed = symmetric::open(
        key,
        &encrypted.ciphertext,
        &encrypted.nonce,
        Some(&encrypted.authentication_tag),
    )?;
    let json = compression::decompress_to_string(&compressed)?;
    let mut metadata: DecryptedMetadata =
        serde_json::from_str(&json).map_err(|e| MetadataError::Codec(format!("metadata body: {e}")))?;
    metadata.metadata_key = Some(key.clone());
    Ok(metadata)
}

/// The string a metadata signature covers.
///
/// Base64 of the canonical JSON with the filedrop map removed, since the
/// server appends filedrop entries after the uploader signed.
pub fn signing_payload(document: &EncryptedFolderMetadataFile) -> Result<String> {
    let mut canonical = document.clone();
    canonical.filedrop.clear();
    Ok(encoding::encode(to_json(&canonical)?))
}
