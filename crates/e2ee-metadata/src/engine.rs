//! The metadata engine
//!
//! Ties the codec, key hierarchy, verification and filedrop modules to the
//! collaborators that know the folder tree and talk to the server.
//!
//! ```text
//!   retrieve_metadata(folder)
//!        │
//!        ├─ none on server ──────────► new Top / Subfolder document
//!        ├─ legacy ──► decrypt_v1 ──► migrate ──► commit (optional)
//!        └─ current ─► decrypt ──► verify ──► merge filedrop ──► commit (drain)
//!
//!   commit(folder, doc)
//!        lock ─► encrypt + sign ─► store/update ─► unlock ─► persist counter
//! ```

use crate::{
    codec::{self, E2eVersion},
    config::EngineConfig,
    filedrop,
    key_hierarchy::{decrypt_metadata_key, encrypt_user, find_user, transform_user},
    legacy::{self, DecryptedFolderMetadataFileV1, EncryptedFolderMetadataFileV1},
    migration,
    remote::{AncestorResolver, FileStore, MetadataRemote},
    types::{
        DecryptedFolderMetadataFile, DecryptedUser, EncryptedFolderMetadataFile, FileId, FolderRole, LockToken,
    },
    verify, MetadataError, Result,
};
use e2ee_crypto::{signing, CryptoError, MetadataKey, UserKeyPair};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, info, instrument, warn};

/// Result of decrypting a folder document
#[derive(Debug)]
pub struct DecryptOutcome {
    /// The decrypted document, filedrop entries merged into `files`
    pub document: DecryptedFolderMetadataFile,
    /// Filedrop entries that could not be decrypted
    pub filedrop_errors: Vec<MetadataError>,
    /// Whether merged filedrop entries were uploaded back
    pub drained: bool,
}

/// End-to-end encrypted folder metadata engine for one user
pub struct E2eeEngine<R, I> {
    config: EngineConfig,
    user_id: String,
    keys: UserKeyPair,
    remote: R,
    index: I,
}

impl<R, I> E2eeEngine<R, I>
where
    R: MetadataRemote,
    I: AncestorResolver + FileStore,
{
    /// Create an engine acting as `user_id`
    pub fn new(config: EngineConfig, user_id: impl Into<String>, keys: UserKeyPair, remote: R, index: I) -> Self {
        Self {
            config,
            user_id: user_id.into(),
            keys,
            remote,
            index,
        }
    }

    /// The engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The user this engine acts as
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// The remote collaborator
    pub fn remote(&self) -> &R {
        &self.remote
    }

    /// The file index collaborator
    pub fn index(&self) -> &I {
        &self.index
    }

    // ═══════════════════════════════════════════════════════════════════════
    // TOP-MOST ANCESTOR
    // ═══════════════════════════════════════════════════════════════════════

    /// The nearest folder at or above `folder` whose parent is not encrypted
    pub fn retrieve_top_most_folder(&self, folder: FileId) -> Result<FileId> {
        let mut current = folder;
        let mut visited = HashSet::from([folder]);
        while let Some(parent) = self.index.parent_of(current) {
            if !self.index.is_encrypted(parent) {
                break;
            }
            if !visited.insert(parent) {
                return Err(MetadataError::MetadataUnavailable(format!(
                    "ancestor chain of {folder} loops at {parent}"
                )));
            }
            current = parent;
        }
        Ok(current)
    }

    /// Fetch and decrypt the top-most ancestor's document.
    ///
    /// Revoked access and integrity failures are reported as such; anything
    /// else that prevents reading the ancestor is `MetadataUnavailable`.
    #[instrument(skip(self))]
    pub fn retrieve_top_most_metadata(&self, folder: FileId) -> Result<DecryptedFolderMetadataFile> {
        let top = self.retrieve_top_most_folder(folder)?;
        let response = self
            .remote
            .get_metadata(&self.index.local_id(top))
            .map_err(|e| MetadataError::MetadataUnavailable(e.to_string()))?
            .ok_or_else(|| MetadataError::MetadataUnavailable(format!("top-most folder {top} has no metadata")))?;

        let decrypted = codec::from_json::<EncryptedFolderMetadataFile>(&response.metadata).and_then(|encrypted| {
            self.decrypt_top(
                &encrypted,
                top,
                self.index.e2e_counter(top),
                response.signature.as_deref(),
                false,
            )
        });
        match decrypted {
            Ok(outcome) => Ok(outcome.document),
            Err(e) if matches!(e, MetadataError::UserNotAuthorized { .. }) || e.is_integrity_failure() => Err(e),
            Err(e) => Err(MetadataError::MetadataUnavailable(format!("top-most folder {top}: {e}"))),
        }
    }

    /// The metadata key of the top-most ancestor
    pub fn retrieve_top_most_metadata_key(&self, folder: FileId) -> Result<MetadataKey> {
        self.retrieve_top_most_metadata(folder)?
            .metadata_key()
            .cloned()
            .ok_or_else(|| MetadataError::MetadataUnavailable("top-most folder has no metadata key".into()))
    }

    // ═══════════════════════════════════════════════════════════════════════
    // ENCRYPT / DECRYPT
    // ═══════════════════════════════════════════════════════════════════════

    /// Encrypt a document for upload.
    ///
    /// Top folders wrap their key for every current user. Subfolders are
    /// encrypted under the top-most ancestor's key with their own key and
    /// checksums left out. The filedrop map is always empty.
    #[instrument(skip(self, document))]
    pub fn encrypt_folder_metadata_file(
        &self,
        document: &DecryptedFolderMetadataFile,
        folder: FileId,
    ) -> Result<EncryptedFolderMetadataFile> {
        let version = &self.config.metadata_version;
        let (metadata, users) = match &document.role {
            FolderRole::Top { users } => {
                let key = document
                    .metadata_key()
                    .ok_or_else(|| CryptoError::InvalidKey("top folder has no metadata key".into()))?;
                let users = users
                    .iter()
                    .map(|user| encrypt_user(user, key))
                    .collect::<Result<Vec<_>>>()?;
                (codec::encrypt_metadata(&document.metadata, key, version)?, users)
            }
            FolderRole::Subfolder => {
                let key = self.retrieve_top_most_metadata_key(folder)?;
                let mut body = document.metadata.clone();
                body.metadata_key = None;
                body.key_checksums.clear();
                (codec::encrypt_metadata(&body, &key, version)?, Vec::new())
            }
        };
        debug!(users = users.len(), "folder metadata encrypted");
        Ok(EncryptedFolderMetadataFile {
            metadata,
            users,
            filedrop: BTreeMap::new(),
        })
    }

    /// Decrypt and verify a document.
    ///
    /// For a top folder, filedrop entries are merged into `files`; when all
    /// of them merged and draining is enabled, the merged document is
    /// committed back so the entries are consumed exactly once.
    #[instrument(skip(self, encrypted, signature))]
    pub fn decrypt_folder_metadata_file(
        &self,
        encrypted: &EncryptedFolderMetadataFile,
        folder: FileId,
        old_counter: Option<u64>,
        signature: Option<&str>,
    ) -> Result<DecryptOutcome> {
        if self.index.has_encrypted_parent(folder) {
            self.decrypt_subfolder(encrypted, folder, old_counter, signature)
        } else {
            self.decrypt_top(encrypted, folder, old_counter, signature, self.config.drain_filedrop)
        }
    }

    fn decrypt_subfolder(
        &self,
        encrypted: &EncryptedFolderMetadataFile,
        folder: FileId,
        old_counter: Option<u64>,
        signature: Option<&str>,
    ) -> Result<DecryptOutcome> {
        let top = self.retrieve_top_most_metadata(folder)?;
        let key = top
            .metadata_key()
            .ok_or_else(|| MetadataError::MetadataUnavailable("top-most folder has no metadata key".into()))?;

        let mut metadata = codec::decrypt_metadata(&encrypted.metadata, key)?;
        for checksum in &top.metadata.key_checksums {
            metadata.add_key_checksum(checksum.clone());
        }
        let document = DecryptedFolderMetadataFile {
            metadata,
            role: FolderRole::Subfolder,
        };
        self.verify_metadata(encrypted, &document, old_counter, signature, top.users())?;

        debug!(files = document.metadata.files.len(), "subfolder metadata decrypted");
        Ok(DecryptOutcome {
            document,
            filedrop_errors: Vec::new(),
            drained: false,
        })
    }

    fn decrypt_top(
        &self,
        encrypted: &EncryptedFolderMetadataFile,
        folder: FileId,
        old_counter: Option<u64>,
        signature: Option<&str>,
        drain: bool,
    ) -> Result<DecryptOutcome> {
        let me = find_user(&encrypted.users, &self.user_id)?;
        let key = decrypt_metadata_key(me, self.keys.private_key())?;
        let metadata = codec::decrypt_metadata(&encrypted.metadata, &key)?;
        let users: Vec<DecryptedUser> = encrypted.users.iter().map(transform_user).collect();

        let mut document = DecryptedFolderMetadataFile {
            metadata,
            role: FolderRole::Top { users },
        };
        let authorized = document.users().to_vec();
        self.verify_metadata(encrypted, &document, old_counter, signature, &authorized)?;

        let before = document.metadata.files.len();
        let mut filedrop_errors = Vec::new();
        let mut merged = 0;
        for (token, result) in filedrop::decrypt_filedrop_map(&encrypted.filedrop, &self.user_id, self.keys.private_key())
        {
            // A deposit never replaces a record the folder already has
            let result = result.and_then(|file| {
                if document.metadata.files.contains_key(&token) {
                    Err(MetadataError::FiledropCorrupt {
                        token: token.clone(),
                        reason: "token already present in folder".into(),
                    })
                } else {
                    Ok(file)
                }
            });
            match result {
                Ok(file) => {
                    document.metadata.files.insert(token, file);
                    merged += 1;
                }
                Err(e) => {
                    warn!(%token, error = %e, "skipping filedrop entry");
                    filedrop_errors.push(e);
                }
            }
        }

        let drained = drain
            && merged > 0
            && filedrop_errors.is_empty()
            && document.metadata.files.len() == before + encrypted.filedrop.len();
        if drained {
            document.bump_counter()?;
            self.commit(folder, &document, true)?;
            info!(merged, "filedrop drained");
        }

        debug!(files = document.metadata.files.len(), merged, "top folder metadata decrypted");
        Ok(DecryptOutcome {
            document,
            filedrop_errors,
            drained,
        })
    }

    // ═══════════════════════════════════════════════════════════════════════
    // SIGNATURES
    // ═══════════════════════════════════════════════════════════════════════

    /// Run the integrity checks under the configured signature policy
    pub fn verify_metadata(
        &self,
        encrypted: &EncryptedFolderMetadataFile,
        decrypted: &DecryptedFolderMetadataFile,
        old_counter: Option<u64>,
        signature: Option<&str>,
        authorized: &[DecryptedUser],
    ) -> Result<()> {
        verify::verify_metadata(
            encrypted,
            decrypted,
            old_counter,
            signature,
            authorized,
            self.config.signature_policy,
        )
    }

    /// Detached base64 CMS signature over the document's signing payload
    pub fn sign_metadata(&self, encrypted: &EncryptedFolderMetadataFile) -> Result<String> {
        let payload = codec::signing_payload(encrypted)?;
        Ok(signing::sign_detached(
            self.keys.certificate(),
            self.keys.private_key(),
            payload.as_bytes(),
        )?)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // UPLOAD
    // ═══════════════════════════════════════════════════════════════════════

    /// Encrypt, sign and upload under an already held lock
    #[instrument(skip(self, document, token))]
    pub fn upload_metadata(
        &self,
        folder: FileId,
        document: &DecryptedFolderMetadataFile,
        token: &str,
        exists: bool,
    ) -> Result<()> {
        let encrypted = self.encrypt_folder_metadata_file(document, folder)?;
        let json = codec::to_json(&encrypted)?;
        let signature = self.sign_metadata(&encrypted)?;
        let remote_id = self.index.remote_id(folder);

        let uploaded = if exists {
            self.remote.update_metadata(&remote_id, &json, token, &signature)
        } else {
            self.remote.store_metadata(&remote_id, &json, token, &signature)
        };
        uploaded.map_err(MetadataError::UploadFailed)?;
        debug!(counter = document.metadata.counter, "metadata uploaded");
        Ok(())
    }

    /// Lock, upload and unlock, then record the uploaded counter.
    ///
    /// Unlock is attempted even when the upload fails; the upload error is
    /// the one reported.
    #[instrument(skip(self, document))]
    pub fn commit(&self, folder: FileId, document: &DecryptedFolderMetadataFile, exists: bool) -> Result<()> {
        let local_id = self.index.local_id(folder);
        let token: LockToken = self
            .remote
            .lock_folder(&local_id, document.metadata.counter)
            .map_err(MetadataError::LockFailed)?;

        let uploaded = self.upload_metadata(folder, document, &token, exists);
        let unlocked = self.remote.unlock_folder(&local_id, &token);

        match (uploaded, unlocked) {
            (Ok(()), Ok(())) => {
                self.index.set_e2e_counter(folder, document.metadata.counter);
                Ok(())
            }
            (Ok(()), Err(e)) => Err(MetadataError::UnlockFailed(e)),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(unlock)) => {
                warn!(error = %unlock, "unlock after failed upload also failed");
                Err(e)
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // RETRIEVE OR CREATE
    // ═══════════════════════════════════════════════════════════════════════

    /// Fetch a folder's document, creating a fresh one if the server has none.
    ///
    /// Returns whether the document already existed on the server. Legacy
    /// documents are migrated (and uploaded when configured); current ones
    /// are decrypted and verified, and the accepted counter is recorded.
    #[instrument(skip(self))]
    pub fn retrieve_metadata(&self, folder: FileId) -> Result<(bool, DecryptedFolderMetadataFile)> {
        let response = self
            .remote
            .get_metadata(&self.index.local_id(folder))
            .map_err(|e| MetadataError::MetadataUnavailable(e.to_string()))?;

        let Some(response) = response else {
            let document = if self.index.has_encrypted_parent(folder) {
                DecryptedFolderMetadataFile::new_subfolder()
            } else {
                DecryptedFolderMetadataFile::new_top_folder(&self.user_id, self.keys.certificate().to_pem())
            };
            debug!("no metadata on server, created new document");
            return Ok((false, document));
        };

        match codec::detect_version(&response.metadata) {
            E2eVersion::V2_0 => {
                let encrypted: EncryptedFolderMetadataFile = codec::from_json(&response.metadata)?;
                let outcome = self.decrypt_folder_metadata_file(
                    &encrypted,
                    folder,
                    self.index.e2e_counter(folder),
                    response.signature.as_deref(),
                )?;
                if !outcome.drained {
                    self.index.set_e2e_counter(folder, outcome.document.metadata.counter);
                }
                Ok((true, outcome.document))
            }
            version if version.is_legacy() => {
                let v1 = self.decrypt_legacy(&response.metadata)?;
                let document = if self.config.upload_after_migration {
                    self.migrate_v1_to_v2_and_upload(folder, &v1)?
                } else {
                    self.migrate(folder, &v1)?
                };
                Ok((true, document))
            }
            _ => Err(MetadataError::UnsupportedVersion(
                serde_json::from_str::<serde_json::Value>(&response.metadata)
                    .ok()
                    .and_then(|v| {
                        v.pointer("/metadata/version")
                            .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
                    })
                    .unwrap_or_else(|| "missing".into()),
            )),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // LEGACY MIGRATION
    // ═══════════════════════════════════════════════════════════════════════

    /// Decrypt a serialized legacy document with this user's key
    pub fn decrypt_legacy(&self, json: &str) -> Result<DecryptedFolderMetadataFileV1> {
        let document: EncryptedFolderMetadataFileV1 = codec::from_json(json)?;
        legacy::decrypt_v1(&document, self.keys.private_key(), self.config.mnemonic.as_deref())
    }

    /// Migrate a legacy document, then commit it over the legacy one
    #[instrument(skip(self, v1))]
    pub fn migrate_v1_to_v2_and_upload(
        &self,
        folder: FileId,
        v1: &DecryptedFolderMetadataFileV1,
    ) -> Result<DecryptedFolderMetadataFile> {
        let document = self.migrate(folder, v1)?;
        self.commit(folder, &document, true)?;
        info!("legacy metadata migrated and uploaded");
        Ok(document)
    }

    fn migrate(&self, folder: FileId, v1: &DecryptedFolderMetadataFileV1) -> Result<DecryptedFolderMetadataFile> {
        let document = migration::migrate_v1_to_v2(v1, &self.user_id, self.keys.certificate().to_pem())?;
        if self.index.has_encrypted_parent(folder) {
            Ok(document.into_subfolder())
        } else {
            Ok(document)
        }
    }
}
