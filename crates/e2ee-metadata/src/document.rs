//! Creating and mutating decrypted folder documents
//!
//! Every mutation bumps the counter so that the next upload is newer than
//! anything the server or other clients have seen.

use crate::{
    key_hierarchy,
    types::{DecryptedFile, DecryptedFolderMetadataFile, DecryptedMetadata, DecryptedUser, FolderRole},
    MetadataError, Result,
};
use e2ee_crypto::MetadataKey;

impl DecryptedFolderMetadataFile {
    /// A new top-most folder shared only with its creator
    pub fn new_top_folder(user_id: impl Into<String>, certificate: impl Into<String>) -> Self {
        let mut metadata = DecryptedMetadata::default();
        key_hierarchy::rotate(&mut metadata);
        Self {
            metadata,
            role: FolderRole::Top {
                users: vec![DecryptedUser::new(user_id, certificate)],
            },
        }
    }

    /// A new nested folder, keyed by its top-most ancestor
    pub fn new_subfolder() -> Self {
        Self {
            metadata: DecryptedMetadata::default(),
            role: FolderRole::Subfolder,
        }
    }

    /// The current metadata key, if one is loaded
    pub fn metadata_key(&self) -> Option<&MetadataKey> {
        self.metadata.metadata_key.as_ref()
    }

    /// Sharees of a top folder, empty for subfolders
    pub fn users(&self) -> &[DecryptedUser] {
        self.role.users()
    }

    /// Advance the counter by one.
    ///
    /// Fails without touching the document when the counter is at `u64::MAX`.
    pub fn bump_counter(&mut self) -> Result<u64> {
        self.metadata.counter = self.next_counter()?;
        Ok(self.metadata.counter)
    }

    fn next_counter(&self) -> Result<u64> {
        self.metadata
            .counter
            .checked_add(1)
            .ok_or(MetadataError::CounterExhausted(self.metadata.counter))
    }

    /// Add or replace a file record
    pub fn add_file(&mut self, token: impl Into<String>, file: DecryptedFile) -> Result<()> {
        let next = self.next_counter()?;
        self.metadata.files.insert(token.into(), file);
        self.metadata.counter = next;
        Ok(())
    }

    /// Add or replace a subfolder name
    pub fn add_folder(&mut self, token: impl Into<String>, name: impl Into<String>) -> Result<()> {
        let next = self.next_counter()?;
        self.metadata.folders.insert(token.into(), name.into());
        self.metadata.counter = next;
        Ok(())
    }

    /// Remove a file record
    pub fn remove_file(&mut self, token: &str) -> Result<DecryptedFile> {
        let next = self.next_counter()?;
        let removed = self
            .metadata
            .files
            .remove(token)
            .ok_or_else(|| MetadataError::FileNotFound(token.to_string()))?;
        self.metadata.counter = next;
        Ok(removed)
    }

    /// Remove a subfolder name; absent tokens are ignored
    pub fn remove_folder(&mut self, token: &str) -> Result<Option<String>> {
        let next = self.next_counter()?;
        let removed = self.metadata.folders.remove(token);
        self.metadata.counter = next;
        Ok(removed)
    }

    /// Rename a file
    pub fn rename_file(&mut self, token: &str, new_name: impl Into<String>) -> Result<()> {
        let next = self.next_counter()?;
        let file = self
            .metadata
            .files
            .get_mut(token)
            .ok_or_else(|| MetadataError::FileNotFound(token.to_string()))?;
        file.filename = new_name.into();
        self.metadata.counter = next;
        Ok(())
    }

    /// Share the folder with another user.
    ///
    /// An existing user id gets its certificate replaced. The metadata key
    /// is rotated either way.
    pub fn add_sharee(&mut self, user_id: impl Into<String>, certificate: impl Into<String>) -> Result<()> {
        let FolderRole::Top { users } = &mut self.role else {
            return Err(MetadataError::NotTopFolder);
        };
        let counter = self.metadata.counter;
        let next = counter.checked_add(1).ok_or(MetadataError::CounterExhausted(counter))?;
        let user = DecryptedUser::new(user_id, certificate);
        match users.iter_mut().find(|u| u.user_id == user.user_id) {
            Some(existing) => *existing = user,
            None => users.push(user),
        }
        key_hierarchy::rotate(&mut self.metadata);
        self.metadata.counter = next;
        Ok(())
    }

    /// Revoke a user's access and rotate the metadata key
    pub fn remove_sharee(&mut self, user_id: &str) -> Result<DecryptedUser> {
        let FolderRole::Top { users } = &mut self.role else {
            return Err(MetadataError::NotTopFolder);
        };
        let position = users
            .iter()
            .position(|u| u.user_id == user_id)
            .ok_or_else(|| MetadataError::UserNotFound(user_id.to_string()))?;
        let counter = self.metadata.counter;
        let next = counter.checked_add(1).ok_or(MetadataError::CounterExhausted(counter))?;
        let removed = users.remove(position);
        key_hierarchy::rotate(&mut self.metadata);
        self.metadata.counter = next;
        Ok(removed)
    }

    /// Turn a top folder into a subfolder, dropping users, key and checksums
    pub fn into_subfolder(mut self) -> Self {
        self.role = FolderRole::Subfolder;
        self.metadata.metadata_key = None;
        self.metadata.key_checksums.clear();
        self
    }
}
