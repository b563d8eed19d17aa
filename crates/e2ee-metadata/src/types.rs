//! Wire and in-memory types for folder metadata
//!
//! All wire structures serialize with camelCase field names. Maps are
//! ordered so that serialization is deterministic.

use e2ee_crypto::{Certificate, MetadataKey};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;

/// Local database id of a file or folder
pub type FileId = u64;

/// Token returned by the server when a folder is locked
pub type LockToken = String;

/// MIME type marking a folder entry in legacy metadata
pub const FOLDER_MIMETYPE: &str = "httpd/unix-directory";

/// One file's record inside a folder's metadata
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecryptedFile {
    /// Plaintext file name
    pub filename: String,
    /// MIME type
    pub mimetype: String,
    /// Base64 nonce of the file content encryption
    pub nonce: String,
    /// Base64 authentication tag of the file content
    pub authentication_tag: String,
    /// Base64 symmetric key of the file content
    pub key: String,
}

impl DecryptedFile {
    /// Create a new file record
    pub fn new(
        filename: impl Into<String>,
        mimetype: impl Into<String>,
        nonce: impl Into<String>,
        authentication_tag: impl Into<String>,
        key: impl Into<String>,
    ) -> Self {
        Self {
            filename: filename.into(),
            mimetype: mimetype.into(),
            nonce: nonce.into(),
            authentication_tag: authentication_tag.into(),
            key: key.into(),
        }
    }
}

/// Plaintext folder descriptor
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecryptedMetadata {
    /// Checksums of every metadata key issued for this folder
    #[serde(default, deserialize_with = "null_as_default")]
    pub key_checksums: Vec<String>,
    /// Folder tombstone
    #[serde(default)]
    pub deleted: bool,
    /// Rollback guard, bumped on every mutation
    #[serde(default)]
    pub counter: u64,
    /// Encrypted token to plaintext subfolder name
    #[serde(default, deserialize_with = "null_as_default")]
    pub folders: BTreeMap<String, String>,
    /// Encrypted token to file record
    #[serde(default, deserialize_with = "null_as_default")]
    pub files: BTreeMap<String, DecryptedFile>,
    /// Key protecting this document, populated only in memory
    #[serde(skip)]
    pub metadata_key: Option<MetadataKey>,
}

impl DecryptedMetadata {
    /// Record a checksum unless already present
    pub fn add_key_checksum(&mut self, checksum: String) {
        if !self.key_checksums.contains(&checksum) {
            self.key_checksums.push(checksum);
        }
    }
}

/// A sharee of a top-level folder
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecryptedUser {
    /// User id
    pub user_id: String,
    /// PEM certificate carrying the user's public key
    pub certificate: String,
}

impl DecryptedUser {
    /// Create a new sharee
    pub fn new(user_id: impl Into<String>, certificate: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            certificate: certificate.into(),
        }
    }

    /// Parse the certificate
    pub fn parse_certificate(&self) -> e2ee_crypto::Result<Certificate> {
        Certificate::from_pem(&self.certificate)
    }
}

/// Whether a document owns its sharing list or inherits it
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FolderRole {
    /// Top-most encrypted folder: owns the users and the metadata key
    Top {
        /// Everyone the metadata key is wrapped for
        users: Vec<DecryptedUser>,
    },
    /// Nested encrypted folder: key comes from the top-most ancestor
    Subfolder,
}

impl FolderRole {
    /// Users of a top folder, empty for subfolders
    pub fn users(&self) -> &[DecryptedUser] {
        match self {
            FolderRole::Top { users } => users,
            FolderRole::Subfolder => &[],
        }
    }

    /// Whether this is a top-most folder
    pub fn is_top(&self) -> bool {
        matches!(self, FolderRole::Top { .. })
    }
}

/// Decrypted folder document as handed to callers
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DecryptedFolderMetadataFile {
    /// The folder descriptor
    pub metadata: DecryptedMetadata,
    /// Top folder with users, or subfolder
    pub role: FolderRole,
}

/// Encrypted metadata envelope
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedMetadata {
    /// Base64 `ciphertext || tag` of the gzip'd JSON body
    pub ciphertext: String,
    /// Base64 nonce
    pub nonce: String,
    /// Base64 authentication tag
    pub authentication_tag: String,
    /// Format version, `"2.0"` on write
    #[serde(default, deserialize_with = "string_or_number")]
    pub version: String,
}

/// A sharee with the metadata key wrapped for them
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedUser {
    /// User id
    pub user_id: String,
    /// PEM certificate
    pub certificate: String,
    /// Base64 RSA-OAEP wrapped metadata key
    pub encrypted_metadata_key: String,
}

/// Recipient record of a filedrop entry
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedFiledropUser {
    /// Recipient user id
    pub user_id: String,
    /// Base64 RSA-OAEP wrapped content key
    pub encrypted_filedrop_key: String,
}

/// A file deposited by a write-only collaborator
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedFiledrop {
    /// Base64 `ciphertext || tag` of the gzip'd [`DecryptedFile`] JSON
    pub ciphertext: String,
    /// Base64 nonce
    pub nonce: String,
    /// Base64 authentication tag
    pub authentication_tag: String,
    /// Recipients the content key is wrapped for
    #[serde(default, deserialize_with = "null_as_default")]
    pub users: Vec<EncryptedFiledropUser>,
}

/// Full encrypted folder document as stored on the server
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedFolderMetadataFile {
    /// Encrypted body
    pub metadata: EncryptedMetadata,
    /// Sharees, empty for subfolders
    #[serde(default, deserialize_with = "null_as_default")]
    pub users: Vec<EncryptedUser>,
    /// Pending filedrop entries, only on top-most folders
    #[serde(
        default,
        deserialize_with = "null_as_default",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub filedrop: BTreeMap<String, EncryptedFiledrop>,
}

pub(crate) fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

pub(crate) fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => s,
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decrypted_metadata_field_order() {
        let mut metadata = DecryptedMetadata::default();
        metadata.counter = 3;
        metadata.add_key_checksum("abc".into());
        let json = serde_json::to_string(&metadata).unwrap();
        assert_eq!(
            json,
            r#"{"keyChecksums":["abc"],"deleted":false,"counter":3,"folders":{},"files":{}}"#
        );
    }

    #[test]
    fn test_metadata_key_never_serialized() {
        let metadata = DecryptedMetadata {
            metadata_key: Some(MetadataKey::generate()),
            ..Default::default()
        };
        let json = serde_json::to_string(&metadata).unwrap();
        assert!(!json.contains("metadataKey"));
    }

    #[test]
    fn test_checksums_deduplicated() {
        let mut metadata = DecryptedMetadata::default();
        metadata.add_key_checksum("a".into());
        metadata.add_key_checksum("a".into());
        metadata.add_key_checksum("b".into());
        assert_eq!(metadata.key_checksums, vec!["a", "b"]);
    }

    #[test]
    fn test_file_camel_case() {
        let file = DecryptedFile::new("photo.jpg", "image/jpeg", "bm9uY2U=", "dGFn", "a2V5");
        let json = serde_json::to_value(&file).unwrap();
        assert_eq!(json["authenticationTag"], "dGFn");
        assert_eq!(json["filename"], "photo.jpg");
    }

    #[test]
    fn test_null_collections_tolerated() {
        let doc: EncryptedFolderMetadataFile = serde_json::from_str(
            r#"{"metadata":{"ciphertext":"c","nonce":"n","authenticationTag":"t","version":2},
                "users":null,"filedrop":null}"#,
        )
        .unwrap();
        assert!(doc.users.is_empty());
        assert!(doc.filedrop.is_empty());
        assert_eq!(doc.metadata.version, "2");
    }

    #[test]
    fn test_empty_filedrop_omitted() {
        let doc = EncryptedFolderMetadataFile {
            metadata: EncryptedMetadata {
                ciphertext: "c".into(),
                nonce: "n".into(),
                authentication_tag: "t".into(),
                version: "2.0".into(),
            },
            users: vec![],
            filedrop: BTreeMap::new(),
        };
        let json = serde_json::to_string(&doc).unwrap();
        assert!(!json.contains("filedrop"));
    }

    #[test]
    fn test_folder_role_users() {
        let role = FolderRole::Top {
            users: vec![DecryptedUser::new("alice", "cert")],
        };
        assert!(role.is_top());
        assert_eq!(role.users().len(), 1);
        assert!(FolderRole::Subfolder.users().is_empty());
    }
}
