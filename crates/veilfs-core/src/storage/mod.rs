//! Physical storage abstraction consumed by the node hierarchy.
//!
//! The overlay core never touches bytes directly; it goes through a
//! [`Storage`] implementation that provides existence checks, timestamps,
//! lazy child listing, and timeout-bounded scoped read/write handles. Handles
//! support buffered byte transfer and an atomic [`WriteHandle::move_to`]
//! between two locations of the same backend.
//!
//! All paths handed to a `Storage` are relative to its root.

pub mod local;

use std::any::Any;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use thiserror::Error;

pub use local::LocalStorage;

/// Errors surfaced by a storage backend.
#[derive(Error, Debug)]
pub enum StorageError {
    /// A bounded wait for a lock on a physical artifact expired.
    ///
    /// Never retried by this crate; callers decide whether to try again.
    #[error("timed out after {waited:?} waiting for a lock on {}", path.display())]
    LockTimeout { path: PathBuf, waited: Duration },

    /// The requested entry does not exist.
    #[error("no such entry: {}", .0.display())]
    NotFound(PathBuf),

    /// A handle move was attempted onto a handle of a different backend.
    #[error("cannot move a handle onto a different storage backend")]
    ForeignBackend,

    /// Any other IO failure from the backend.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Scoped, lock-holding read handle. The lock is released on drop.
pub trait ReadHandle: Read + std::fmt::Debug {}

/// Scoped, lock-holding write handle. The lock is released on drop.
///
/// Opening a writable handle does not create or truncate the entry; that
/// happens on first write. This allows a handle to be used purely as a lock,
/// e.g. while relocating or removing the entry underneath it.
pub trait WriteHandle: Write + std::fmt::Debug {
    /// Atomically relocate this handle's entry to the destination handle's
    /// location. Both locks stay held until the handles are dropped.
    fn move_to(&mut self, dst: &mut dyn WriteHandle) -> StorageResult<()>;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Lazy sequence of child entry names produced by [`Storage::entries`].
pub type Entries = Box<dyn Iterator<Item = StorageResult<String>> + Send>;

/// Byte-level physical storage with per-entry timeout-bounded locking.
pub trait Storage: Send + Sync {
    /// Whether an entry (file or folder) exists at `path`.
    fn exists(&self, path: &Path) -> bool;

    /// Last modification time of the entry at `path`.
    fn last_modified(&self, path: &Path) -> StorageResult<SystemTime>;

    /// Open a read handle, waiting at most `timeout` for the entry's lock.
    fn open_readable(&self, path: &Path, timeout: Duration)
        -> StorageResult<Box<dyn ReadHandle>>;

    /// Open a write handle, waiting at most `timeout` for the entry's lock.
    fn open_writable(&self, path: &Path, timeout: Duration)
        -> StorageResult<Box<dyn WriteHandle>>;

    /// Lazily list the names of the entries in the folder at `path`.
    ///
    /// Each call re-reads the folder; no listing is cached.
    fn entries(&self, path: &Path) -> StorageResult<Entries>;

    /// Create the folder at `path`, including missing parent containers.
    fn create_dir_all(&self, path: &Path) -> StorageResult<()>;

    /// Remove the file at `path`.
    fn remove_file(&self, path: &Path) -> StorageResult<()>;

    /// Remove the folder at `path` and everything beneath it.
    fn remove_dir_all(&self, path: &Path) -> StorageResult<()>;
}
