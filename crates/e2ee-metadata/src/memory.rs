//! In-memory collaborators for testing and offline simulation

use crate::{
    error::RemoteError,
    remote::{AncestorResolver, FileStore, MetadataRemote, MetadataResponse, RemoteResult},
    types::{EncryptedFiledrop, EncryptedFolderMetadataFile, FileId, LockToken},
};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Remote operation kinds, for failure injection and the call log
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RemoteOp {
    Get,
    Lock,
    Store,
    Update,
    Unlock,
}

impl RemoteOp {
    fn name(self) -> &'static str {
        match self {
            RemoteOp::Get => "get metadata",
            RemoteOp::Lock => "lock folder",
            RemoteOp::Store => "store metadata",
            RemoteOp::Update => "update metadata",
            RemoteOp::Unlock => "unlock folder",
        }
    }
}

#[derive(Clone, Debug)]
struct StoredMetadata {
    metadata: String,
    signature: Option<String>,
}

#[derive(Default)]
struct RemoteState {
    documents: HashMap<String, StoredMetadata>,
    locks: HashMap<String, LockToken>,
    failures: HashMap<RemoteOp, (u16, String)>,
    calls: Vec<RemoteOp>,
}

/// An in-memory metadata server.
///
/// Documents, locks and tokens are keyed by the folder id string, so local
/// and remote ids must coincide (as they do with [`MemoryFileIndex`]).
#[derive(Clone, Default)]
pub struct MemoryRemote {
    state: Arc<Mutex<RemoteState>>,
}

impl MemoryRemote {
    /// Create an empty server
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call of `op` fail with `status` until cleared
    pub fn fail(&self, op: RemoteOp, status: u16, message: impl Into<String>) {
        self.state.lock().failures.insert(op, (status, message.into()));
    }

    /// Remove all injected failures
    pub fn clear_failures(&self) {
        self.state.lock().failures.clear();
    }

    /// Every operation attempted so far, in order
    pub fn calls(&self) -> Vec<RemoteOp> {
        self.state.lock().calls.clone()
    }

    /// Number of attempts of `op`
    pub fn call_count(&self, op: RemoteOp) -> usize {
        self.state.lock().calls.iter().filter(|c| **c == op).count()
    }

    /// Whether a folder is currently locked
    pub fn is_locked(&self, id: &str) -> bool {
        self.state.lock().locks.contains_key(id)
    }

    /// Store a document directly, bypassing locking
    pub fn put_raw(&self, id: &str, metadata: impl Into<String>, signature: Option<String>) {
        self.state.lock().documents.insert(
            id.to_string(),
            StoredMetadata {
                metadata: metadata.into(),
                signature,
            },
        );
    }

    /// The stored document, if any
    pub fn get_raw(&self, id: &str) -> Option<String> {
        self.state.lock().documents.get(id).map(|d| d.metadata.clone())
    }

    /// Append a filedrop entry the way the server does for depositors
    pub fn add_filedrop(&self, id: &str, token: &str, entry: EncryptedFiledrop) -> RemoteResult<()> {
        let mut state = self.state.lock();
        let stored = state
            .documents
            .get_mut(id)
            .ok_or_else(|| RemoteError::new("filedrop", 404, format!("no metadata for {id}")))?;
        let mut document: EncryptedFolderMetadataFile = serde_json::from_str(&stored.metadata)
            .map_err(|e| RemoteError::new("filedrop", 400, e.to_string()))?;
        document.filedrop.insert(token.to_string(), entry);
        stored.metadata =
            serde_json::to_string(&document).map_err(|e| RemoteError::new("filedrop", 500, e.to_string()))?;
        Ok(())
    }

    fn begin(&self, state: &mut RemoteState, op: RemoteOp) -> RemoteResult<()> {
        state.calls.push(op);
        match state.failures.get(&op) {
            Some((status, message)) => Err(RemoteError::new(op.name(), *status, message.clone())),
            None => Ok(()),
        }
    }

    fn check_token(state: &RemoteState, op: RemoteOp, id: &str, token: &str) -> RemoteResult<()> {
        match state.locks.get(id) {
            Some(held) if held == token => Ok(()),
            Some(_) => Err(RemoteError::new(op.name(), 403, "lock token mismatch")),
            None => Err(RemoteError::new(op.name(), 403, "folder not locked")),
        }
    }
}

impl MetadataRemote for MemoryRemote {
    fn get_metadata(&self, local_id: &str) -> RemoteResult<Option<MetadataResponse>> {
        let mut state = self.state.lock();
        self.begin(&mut state, RemoteOp::Get)?;
        Ok(state.documents.get(local_id).map(|d| MetadataResponse {
            metadata: d.metadata.clone(),
            signature: d.signature.clone(),
        }))
    }

    fn lock_folder(&self, local_id: &str, counter: u64) -> RemoteResult<LockToken> {
        let mut state = self.state.lock();
        self.begin(&mut state, RemoteOp::Lock)?;
        if state.locks.contains_key(local_id) {
            return Err(RemoteError::new(RemoteOp::Lock.name(), 423, "folder already locked"));
        }
        let token = uuid::Uuid::new_v4().to_string();
        state.locks.insert(local_id.to_string(), token.clone());
        debug!(folder = local_id, counter, "folder locked");
        Ok(token)
    }

    fn store_metadata(&self, remote_id: &str, metadata: &str, token: &str, signature: &str) -> RemoteResult<()> {
        let mut state = self.state.lock();
        self.begin(&mut state, RemoteOp::Store)?;
        Self::check_token(&state, RemoteOp::Store, remote_id, token)?;
        if state.documents.contains_key(remote_id) {
            return Err(RemoteError::new(RemoteOp::Store.name(), 409, "metadata already exists"));
        }
        state.documents.insert(
            remote_id.to_string(),
            StoredMetadata {
                metadata: metadata.to_string(),
                signature: Some(signature.to_string()),
            },
        );
        Ok(())
    }

    fn update_metadata(&self, remote_id: &str, metadata: &str, token: &str, signature: &str) -> RemoteResult<()> {
        let mut state = self.state.lock();
        self.begin(&mut state, RemoteOp::Update)?;
        Self::check_token(&state, RemoteOp::Update, remote_id, token)?;
        let stored = state
            .documents
            .get_mut(remote_id)
            .ok_or_else(|| RemoteError::new(RemoteOp::Update.name(), 404, "no metadata to update"))?;
        stored.metadata = metadata.to_string();
        stored.signature = Some(signature.to_string());
        Ok(())
    }

    fn unlock_folder(&self, local_id: &str, token: &str) -> RemoteResult<()> {
        let mut state = self.state.lock();
        self.begin(&mut state, RemoteOp::Unlock)?;
        Self::check_token(&state, RemoteOp::Unlock, local_id, token)?;
        state.locks.remove(local_id);
        debug!(folder = local_id, "folder unlocked");
        Ok(())
    }
}

#[derive(Clone, Debug, Default)]
struct IndexEntry {
    parent: Option<FileId>,
    encrypted: bool,
    counter: Option<u64>,
}

/// An in-memory file index.
///
/// Local and remote ids are both the decimal file id.
#[derive(Clone, Default)]
pub struct MemoryFileIndex {
    entries: Arc<RwLock<HashMap<FileId, IndexEntry>>>,
}

impl MemoryFileIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a folder
    pub fn add_folder(&self, id: FileId, parent: Option<FileId>, encrypted: bool) {
        self.entries.write().insert(
            id,
            IndexEntry {
                parent,
                encrypted,
                counter: None,
            },
        );
    }

    /// Move a folder under another parent
    pub fn set_parent(&self, id: FileId, parent: Option<FileId>) {
        if let Some(entry) = self.entries.write().get_mut(&id) {
            entry.parent = parent;
        }
    }
}

impl AncestorResolver for MemoryFileIndex {
    fn is_encrypted(&self, id: FileId) -> bool {
        self.entries.read().get(&id).is_some_and(|e| e.encrypted)
    }

    fn parent_of(&self, id: FileId) -> Option<FileId> {
        self.entries.read().get(&id).and_then(|e| e.parent)
    }

    fn local_id(&self, id: FileId) -> String {
        id.to_string()
    }

    fn remote_id(&self, id: FileId) -> String {
        id.to_string()
    }
}

impl FileStore for MemoryFileIndex {
    fn e2e_counter(&self, id: FileId) -> Option<u64> {
        self.entries.read().get(&id).and_then(|e| e.counter)
    }

    fn set_e2e_counter(&self, id: FileId, counter: u64) {
        self.entries.write().entry(id).or_default().counter = Some(counter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_store_unlock() {
        let remote = MemoryRemote::new();
        let token = remote.lock_folder("7", 1).unwrap();
        assert!(remote.is_locked("7"));

        remote.store_metadata("7", "{}", &token, "sig").unwrap();
        remote.unlock_folder("7", &token).unwrap();

        assert!(!remote.is_locked("7"));
        let response = remote.get_metadata("7").unwrap().unwrap();
        assert_eq!(response.metadata, "{}");
        assert_eq!(response.signature.as_deref(), Some("sig"));
    }

    #[test]
    fn test_lock_conflicts() {
        let remote = MemoryRemote::new();
        let token = remote.lock_folder("7", 1).unwrap();
        assert_eq!(remote.lock_folder("7", 1).unwrap_err().status, 423);
        assert_eq!(remote.unlock_folder("7", "bogus").unwrap_err().status, 403);
        assert_eq!(remote.store_metadata("7", "{}", "bogus", "s").unwrap_err().status, 403);
        remote.unlock_folder("7", &token).unwrap();
    }

    #[test]
    fn test_store_and_update_preconditions() {
        let remote = MemoryRemote::new();
        let token = remote.lock_folder("7", 0).unwrap();
        assert_eq!(remote.update_metadata("7", "{}", &token, "s").unwrap_err().status, 404);
        remote.store_metadata("7", "{}", &token, "s").unwrap();
        assert_eq!(remote.store_metadata("7", "{}", &token, "s").unwrap_err().status, 409);
        remote.update_metadata("7", "{\"a\":1}", &token, "s").unwrap();
        assert_eq!(remote.get_raw("7").unwrap(), "{\"a\":1}");
    }

    #[test]
    fn test_failure_injection_and_call_log() {
        let remote = MemoryRemote::new();
        remote.fail(RemoteOp::Get, 503, "maintenance");
        let err = remote.get_metadata("1").unwrap_err();
        assert_eq!(err.status, 503);
        assert_eq!(err.operation, "get metadata");

        remote.clear_failures();
        assert!(remote.get_metadata("1").unwrap().is_none());
        assert_eq!(remote.calls(), vec![RemoteOp::Get, RemoteOp::Get]);
        assert_eq!(remote.call_count(RemoteOp::Lock), 0);
    }

    #[test]
    fn test_file_index() {
        let index = MemoryFileIndex::new();
        index.add_folder(1, None, true);
        index.add_folder(2, Some(1), true);
        index.add_folder(3, None, false);

        assert!(!index.has_encrypted_parent(1));
        assert!(index.has_encrypted_parent(2));
        assert_eq!(index.parent_of(2), Some(1));
        assert_eq!(index.local_id(2), "2");

        assert_eq!(index.e2e_counter(2), None);
        index.set_e2e_counter(2, 9);
        assert_eq!(index.e2e_counter(2), Some(9));
    }
}
