//! # E2EE Metadata
//!
//! Encrypted folder metadata for an end-to-end encrypted sync client.
//!
//! ## Features
//!
//! - **Key hierarchy**: One metadata key per top-most encrypted folder,
//!   wrapped for every sharee and rotated whenever the sharee set changes
//! - **Subfolders**: Nested folders are encrypted under their top-most
//!   ancestor's key and carry no users of their own
//! - **Verification**: Rollback counter, CMS signatures and key checksums
//! - **Filedrop**: Files deposited by write-only collaborators are merged and
//!   drained exactly once
//! - **Migration**: Legacy 1.x documents are rebuilt in the current format
//!
//! ## Example
//!
//! ```rust,ignore
//! use e2ee_metadata::{E2eeEngine, EngineConfig, MemoryFileIndex, MemoryRemote};
//!
//! let index = MemoryFileIndex::new();
//! index.add_folder(1, None, true);
//!
//! let engine = E2eeEngine::new(EngineConfig::default(), "alice", key_pair, MemoryRemote::new(), index);
//!
//! // Fetch or create the folder's metadata
//! let (exists, mut document) = engine.retrieve_metadata(1)?;
//!
//! // Mutate it and upload under a folder lock
//! document.add_file("3f9a…", file)?;
//! engine.commit(1, &document, exists)?;
//! ```

pub mod codec;
pub mod config;
mod document;
pub mod engine;
pub mod error;
pub mod filedrop;
pub mod key_hierarchy;
pub mod legacy;
pub mod memory;
pub mod migration;
pub mod remote;
pub mod types;
pub mod verify;

pub use codec::E2eVersion;
pub use config::{EngineConfig, SignaturePolicy, METADATA_VERSION};
pub use engine::{DecryptOutcome, E2eeEngine};
pub use error::{MetadataError, RemoteError, Result};
pub use memory::{MemoryFileIndex, MemoryRemote, RemoteOp};
pub use remote::{AncestorResolver, FileStore, MetadataRemote, MetadataResponse};
pub use types::*;
