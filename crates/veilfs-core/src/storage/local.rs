//! Local-disk storage backend.
//!
//! Wraps `std::fs` with an in-process per-path lock table so that handle
//! acquisition is timeout-bounded as the [`Storage`](super::Storage) contract
//! requires. Locks are advisory within this process only; separate processes
//! mutating the same tree are not coordinated.

use dashmap::DashMap;
use parking_lot::lock_api::{ArcRwLockReadGuard, ArcRwLockWriteGuard};
use parking_lot::{RawRwLock, RwLock};
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use super::{Entries, ReadHandle, Storage, StorageError, StorageResult, WriteHandle};

/// [`Storage`] over a local directory tree.
#[derive(Debug)]
pub struct LocalStorage {
    root: PathBuf,
    locks: DashMap<PathBuf, Arc<RwLock<()>>>,
}

impl LocalStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            locks: DashMap::new(),
        }
    }

    /// Root directory this storage is anchored at.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn abs(&self, path: &Path) -> PathBuf {
        self.root.join(path)
    }

    fn lock_for(&self, path: &Path) -> Arc<RwLock<()>> {
        self.locks
            .entry(path.to_path_buf())
            .or_insert_with(|| Arc::new(RwLock::new(())))
            .clone()
    }

    fn map_not_found(err: io::Error, path: &Path) -> StorageError {
        if err.kind() == io::ErrorKind::NotFound {
            StorageError::NotFound(path.to_path_buf())
        } else {
            StorageError::Io(err)
        }
    }

    /// Drop lock entries no operation currently holds.
    ///
    /// The lock table grows with every distinct path touched; call this
    /// periodically on long-lived instances.
    pub fn cleanup_unused_locks(&self) {
        self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
    }

    /// Number of cached path locks.
    pub fn lock_count(&self) -> usize {
        self.locks.len()
    }
}

impl Storage for LocalStorage {
    fn exists(&self, path: &Path) -> bool {
        self.abs(path).exists()
    }

    fn last_modified(&self, path: &Path) -> StorageResult<SystemTime> {
        let abs = self.abs(path);
        let meta = std::fs::metadata(&abs).map_err(|e| Self::map_not_found(e, path))?;
        meta.modified().map_err(StorageError::Io)
    }

    fn open_readable(
        &self,
        path: &Path,
        timeout: Duration,
    ) -> StorageResult<Box<dyn ReadHandle>> {
        let lock = self.lock_for(path);
        let guard = lock
            .try_read_arc_for(timeout)
            .ok_or_else(|| StorageError::LockTimeout {
                path: path.to_path_buf(),
                waited: timeout,
            })?;
        let file = File::open(self.abs(path)).map_err(|e| Self::map_not_found(e, path))?;
        Ok(Box::new(LocalReadHandle {
            file,
            _guard: guard,
        }))
    }

    fn open_writable(
        &self,
        path: &Path,
        timeout: Duration,
    ) -> StorageResult<Box<dyn WriteHandle>> {
        let lock = self.lock_for(path);
        let guard = lock
            .try_write_arc_for(timeout)
            .ok_or_else(|| StorageError::LockTimeout {
                path: path.to_path_buf(),
                waited: timeout,
            })?;
        Ok(Box::new(LocalWriteHandle {
            abs: self.abs(path),
            file: None,
            _guard: guard,
        }))
    }

    fn entries(&self, path: &Path) -> StorageResult<Entries> {
        let read_dir =
            std::fs::read_dir(self.abs(path)).map_err(|e| Self::map_not_found(e, path))?;
        Ok(Box::new(read_dir.map(|entry| {
            entry
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .map_err(StorageError::Io)
        })))
    }

    fn create_dir_all(&self, path: &Path) -> StorageResult<()> {
        std::fs::create_dir_all(self.abs(path)).map_err(StorageError::Io)
    }

    fn remove_file(&self, path: &Path) -> StorageResult<()> {
        std::fs::remove_file(self.abs(path)).map_err(|e| Self::map_not_found(e, path))
    }

    fn remove_dir_all(&self, path: &Path) -> StorageResult<()> {
        std::fs::remove_dir_all(self.abs(path)).map_err(|e| Self::map_not_found(e, path))
    }
}

#[derive(Debug)]
struct LocalReadHandle {
    file: File,
    _guard: ArcRwLockReadGuard<RawRwLock, ()>,
}

impl Read for LocalReadHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }
}

impl ReadHandle for LocalReadHandle {}

#[derive(Debug)]
struct LocalWriteHandle {
    abs: PathBuf,
    /// Opened (with truncation) on first write; a handle that is never
    /// written to is a pure lock.
    file: Option<File>,
    _guard: ArcRwLockWriteGuard<RawRwLock, ()>,
}

impl LocalWriteHandle {
    fn backing_file(&mut self) -> io::Result<&mut File> {
        match self.file {
            Some(ref mut f) => Ok(f),
            None => {
                let f = OpenOptions::new()
                    .write(true)
                    .create(true)
                    .truncate(true)
                    .open(&self.abs)?;
                Ok(self.file.insert(f))
            }
        }
    }
}

impl Write for LocalWriteHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.backing_file()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.file {
            Some(ref mut f) => f.flush(),
            None => Ok(()),
        }
    }
}

impl WriteHandle for LocalWriteHandle {
    fn move_to(&mut self, dst: &mut dyn WriteHandle) -> StorageResult<()> {
        let Some(dst) = dst.as_any_mut().downcast_mut::<LocalWriteHandle>() else {
            return Err(StorageError::ForeignBackend);
        };
        // Close any open descriptors before the rename.
        self.file = None;
        dst.file = None;
        std::fs::rename(&self.abs, &dst.abs)
            .map_err(|e| LocalStorage::map_not_found(e, &self.abs))
    }

    fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
        self
    }
}
