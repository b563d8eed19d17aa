//! Legacy to current format migration

use crate::{
    key_hierarchy,
    legacy::{DecryptedFolderMetadataFileV1, LegacyDecryptedFile},
    types::{
        DecryptedFile, DecryptedFolderMetadataFile, DecryptedMetadata, DecryptedUser, FolderRole, FOLDER_MIMETYPE,
    },
    MetadataError, Result,
};
use tracing::debug;

/// Rebuild a legacy document as a current top folder owned by `user_id`.
///
/// Legacy folders were never shared, so the result has exactly one user. A
/// fresh metadata key is generated and its checksum is the only one
/// recorded. Entries with the folder MIME type become subfolder names.
pub fn migrate_v1_to_v2(
    v1: &DecryptedFolderMetadataFileV1,
    user_id: &str,
    certificate: &str,
) -> Result<DecryptedFolderMetadataFile> {
    if v1.metadata.metadata_keys.get("0").is_none() && v1.metadata.metadata_key.is_none() {
        return Err(MetadataError::Migration("legacy metadata has no metadata key".into()));
    }

    let mut metadata = DecryptedMetadata::default();
    for (token, file) in &v1.files {
        if file.encrypted.mimetype == FOLDER_MIMETYPE {
            metadata
                .folders
                .insert(token.clone(), file.encrypted.filename.clone());
        } else {
            metadata.files.insert(token.clone(), migrate_file(file));
        }
    }
    key_hierarchy::rotate(&mut metadata);

    debug!(
        files = metadata.files.len(),
        folders = metadata.folders.len(),
        "legacy metadata migrated"
    );
    Ok(DecryptedFolderMetadataFile {
        metadata,
        role: FolderRole::Top {
            users: vec![DecryptedUser::new(user_id, certificate)],
        },
    })
}

/// Reshape one legacy file record
pub fn migrate_file(v1: &LegacyDecryptedFile) -> DecryptedFile {
    DecryptedFile::new(
        v1.encrypted.filename.clone(),
        v1.encrypted.mimetype.clone(),
        v1.initialization_vector.clone(),
        v1.authentication_tag.clone().unwrap_or_default(),
        v1.encrypted.key.clone(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::legacy::{LegacyData, LegacyMetadata};
    use e2ee_crypto::{hash_metadata_key, MetadataKey};
    use std::collections::BTreeMap;

    fn record(name: &str, mimetype: &str, tag: Option<&str>) -> LegacyDecryptedFile {
        LegacyDecryptedFile {
            encrypted: LegacyData {
                key: "ZmlsZWtleQ==".into(),
                filename: name.into(),
                mimetype: mimetype.into(),
                version: None,
            },
            initialization_vector: "aXY=".into(),
            authentication_tag: tag.map(Into::into),
            metadata_key: 0,
        }
    }

    fn legacy(keys: BTreeMap<String, String>, single: Option<&str>) -> DecryptedFolderMetadataFileV1 {
        let old_key = MetadataKey::generate();
        DecryptedFolderMetadataFileV1 {
            metadata: LegacyMetadata {
                metadata_keys: keys,
                metadata_key: single.map(Into::into),
                version: "1.2".into(),
                checksum: None,
            },
            files: BTreeMap::from([
                ("t1".to_string(), record("a.txt", "text/plain", Some("dGFn"))),
                ("t2".to_string(), record("Music", FOLDER_MIMETYPE, None)),
                ("t3".to_string(), record("b.bin", "application/octet-stream", None)),
            ]),
            keys: vec![old_key],
        }
    }

    #[test]
    fn test_partitions_folders_and_files() {
        let v1 = legacy(BTreeMap::from([("0".into(), "wrapped".into())]), None);
        let v2 = migrate_v1_to_v2(&v1, "alice", "cert").unwrap();

        assert_eq!(v2.metadata.folders["t2"], "Music");
        assert_eq!(v2.metadata.files.len(), 2);
        assert_eq!(v2.metadata.files["t1"].authentication_tag, "dGFn");
        assert_eq!(v2.metadata.files["t3"].authentication_tag, "");
        assert_eq!(v2.metadata.files["t1"].nonce, "aXY=");
        assert_eq!(v2.metadata.counter, 0);
        assert_eq!(v2.users(), &[DecryptedUser::new("alice", "cert")]);
    }

    #[test]
    fn test_migration_rotates_key() {
        let v1 = legacy(BTreeMap::new(), Some("wrapped"));
        let v2 = migrate_v1_to_v2(&v1, "alice", "cert").unwrap();

        let key = v2.metadata_key().unwrap();
        assert!(!v1.keys.contains(key));
        assert_eq!(v2.metadata.key_checksums, vec![hash_metadata_key(key)]);
    }

    #[test]
    fn test_missing_key_fails() {
        let v1 = legacy(BTreeMap::new(), None);
        assert!(matches!(
            migrate_v1_to_v2(&v1, "alice", "cert"),
            Err(MetadataError::Migration(_))
        ));
    }
}
