//! Collaborators the engine talks to
//!
//! The engine never reaches into a database or HTTP client directly. It is
//! handed implementations of these traits, which are expected to be
//! blocking and to apply their own timeouts and retries.

use crate::{
    error::RemoteError,
    types::{FileId, LockToken},
};

/// Result of a remote call
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Raw metadata as returned by the server
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetadataResponse {
    /// Serialized document
    pub metadata: String,
    /// Base64 detached CMS signature, if the server sent one
    pub signature: Option<String>,
}

/// Read-only view of the local file index
pub trait AncestorResolver: Send + Sync {
    /// Whether the file or folder is flagged encrypted
    fn is_encrypted(&self, id: FileId) -> bool;

    /// Parent folder, `None` at the root
    fn parent_of(&self, id: FileId) -> Option<FileId>;

    /// Id the server uses for metadata reads and locking
    fn local_id(&self, id: FileId) -> String;

    /// Id the server uses for metadata writes
    fn remote_id(&self, id: FileId) -> String;

    /// Whether the folder has an encrypted parent
    fn has_encrypted_parent(&self, id: FileId) -> bool {
        self.parent_of(id).is_some_and(|parent| self.is_encrypted(parent))
    }
}

/// Persisted per-folder state
pub trait FileStore: Send + Sync {
    /// Last accepted metadata counter, `None` if never recorded
    fn e2e_counter(&self, id: FileId) -> Option<u64>;

    /// Record the accepted metadata counter
    fn set_e2e_counter(&self, id: FileId, counter: u64);
}

/// Server-side metadata operations
pub trait MetadataRemote: Send + Sync {
    /// Fetch a folder's metadata, `None` if it has none yet
    fn get_metadata(&self, local_id: &str) -> RemoteResult<Option<MetadataResponse>>;

    /// Lock a folder, announcing the counter about to be written
    fn lock_folder(&self, local_id: &str, counter: u64) -> RemoteResult<LockToken>;

    /// Store metadata for a folder that has none
    fn store_metadata(&self, remote_id: &str, metadata: &str, token: &str, signature: &str) -> RemoteResult<()>;

    /// Replace existing metadata
    fn update_metadata(&self, remote_id: &str, metadata: &str, token: &str, signature: &str) -> RemoteResult<()>;

    /// Release a folder lock
    fn unlock_folder(&self, local_id: &str, token: &str) -> RemoteResult<()>;
}
