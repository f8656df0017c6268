//! Core directory-virtualization layer of the veilfs encrypting overlay.
//!
//! Logical folder hierarchies are decoupled from physical layout: every
//! folder is anchored by a random directory identifier stored in a small
//! marker artifact inside its parent, and the folder's contents live in a
//! flat, sharded physical directory derived from that identifier alone.
//! Renaming or moving a folder relocates one marker and leaves the contents
//! in place, so moves cost the same for an empty folder and a terabyte tree.
//!
//! # Layers
//!
//! - [`storage`]: byte-level physical backend with per-entry timeout-bounded
//!   locking ([`storage::LocalStorage`] is the on-disk implementation).
//! - [`fs`]: the node hierarchy ([`fs::FolderNode`], [`fs::FileNode`]),
//!   directory identifiers, the hash-and-shard path mapper, and AES-SIV
//!   filename encryption.
//! - [`error`]: one import point for every layer's error type.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use veilfs_core::fs::{FolderCreateMode, FolderNode, FsContext, SivFilenameCipher};
//! use veilfs_core::storage::LocalStorage;
//!
//! # fn main() -> veilfs_core::fs::FsResult<()> {
//! let storage = Arc::new(LocalStorage::new("/mnt/vault"));
//! let cipher = Arc::new(SivFilenameCipher::new([0u8; 64]));
//! let root = FolderNode::root(Arc::new(FsContext::new(storage, cipher)));
//!
//! let docs = root.folder("documents");
//! docs.create(FolderCreateMode::IncludingParents)?;
//!
//! // Constant-time rename: only the marker moves.
//! docs.move_to(&root.folder("archive"))?;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod fs;
pub mod storage;

pub use error::{FsError, FsResult};
pub use fs::{ChildNode, FileNode, FolderCreateMode, FolderNode, FsContext, Node};
pub use storage::{LocalStorage, Storage};
