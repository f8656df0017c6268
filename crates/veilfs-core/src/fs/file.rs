//! The file variant of the node hierarchy.
//!
//! A file's encrypted payload lives as a single entry inside its parent
//! folder's mapped physical directory, named by the encrypted segment plus
//! the reserved [`FILE_SUFFIX`]. Content encryption itself is outside this
//! core; files here move bytes opaquely through storage handles.

use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::debug;

use crate::fs::folder::{FolderNode, FsResult};
use crate::fs::node::{FsContext, Node};
use crate::storage::StorageError;

/// Reserved suffix marking file entries on physical storage.
pub const FILE_SUFFIX: &str = ".file";

/// Logical file node.
#[derive(Debug, Clone)]
pub struct FileNode {
    pub(crate) ctx: Arc<FsContext>,
    pub(crate) parent: Arc<FolderNode>,
    pub(crate) name: String,
}

impl FileNode {
    pub(crate) fn new(ctx: Arc<FsContext>, parent: Arc<FolderNode>, name: String) -> Self {
        Self { ctx, parent, name }
    }

    /// Logical path of this file, for diagnostics.
    pub fn logical_path(&self) -> String {
        format!("{}{}", self.parent.logical_path(), self.name)
    }

    /// Physical location of the encrypted payload.
    pub fn physical_path(&self) -> FsResult<PathBuf> {
        Ok(self.parent.physical_path()?.join(self.encrypted_name()?))
    }

    /// Copy this file's bytes to `target`, materializing the target's parent
    /// container as needed.
    pub fn copy_to(&self, target: &FileNode) -> FsResult<()> {
        self.ctx
            .storage
            .create_dir_all(&target.parent.physical_path()?)?;

        let src = self.physical_path()?;
        let dst = target.physical_path()?;
        let mut reader = self.ctx.storage.open_readable(&src, self.ctx.lock_timeout)?;
        let mut writer = self.ctx.storage.open_writable(&dst, self.ctx.lock_timeout)?;
        io::copy(&mut reader, &mut writer).map_err(StorageError::Io)?;
        writer.flush().map_err(StorageError::Io)?;

        debug!(source = %self.logical_path(), target = %target.logical_path(), "copied file");
        Ok(())
    }

    /// Relocate this file's physical entry to `target` under write locks on
    /// both locations.
    pub fn move_to(&self, target: &FileNode) -> FsResult<()> {
        self.ctx
            .storage
            .create_dir_all(&target.parent.physical_path()?)?;

        let src = self.physical_path()?;
        let dst = target.physical_path()?;
        {
            let mut src_handle = self.ctx.storage.open_writable(&src, self.ctx.lock_timeout)?;
            let mut dst_handle = self.ctx.storage.open_writable(&dst, self.ctx.lock_timeout)?;
            src_handle.move_to(&mut *dst_handle)?;
        }

        debug!(source = %self.logical_path(), target = %target.logical_path(), "moved file");
        Ok(())
    }

    /// Remove this file's physical entry. No-op if the file is absent.
    pub fn delete(&self) -> FsResult<()> {
        let path = self.physical_path()?;
        if !self.ctx.storage.exists(&path) {
            return Ok(());
        }
        {
            let _lock = self.ctx.storage.open_writable(&path, self.ctx.lock_timeout)?;
            self.ctx.storage.remove_file(&path)?;
        }
        debug!(file = %self.logical_path(), "deleted file");
        Ok(())
    }
}

impl Node for FileNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn parent(&self) -> Option<&Arc<FolderNode>> {
        Some(&self.parent)
    }

    fn encrypted_name(&self) -> FsResult<String> {
        let ciphertext = self.ctx.cipher.encrypt_segment(&self.name)?;
        Ok(format!("{ciphertext}{FILE_SUFFIX}"))
    }

    fn exists(&self) -> FsResult<bool> {
        Ok(self.ctx.storage.exists(&self.physical_path()?))
    }

    fn last_modified(&self) -> FsResult<SystemTime> {
        Ok(self.ctx.storage.last_modified(&self.physical_path()?)?)
    }
}
