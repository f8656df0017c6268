//! The folder variant of the node hierarchy: listing, creation, copy, move,
//! and deletion with hierarchy-safety checks.
//!
//! A folder's contents live in a physical directory derived solely from its
//! directory identifier (see [`mapper`](crate::fs::mapper)); the folder's
//! presence in its logical parent is recorded by a marker artifact whose
//! entire byte content is that identifier. Moving a folder relocates the
//! marker, not the data: the identifier bytes travel unchanged, so the target
//! maps to the same physical directory and the whole encrypted subtree
//! transfers in constant time regardless of its size.

use std::io::{Read, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use thiserror::Error;
use tracing::{debug, warn};

use crate::fs::dir_id::{DirId, DirIdCell, MAX_MARKER_LEN};
use crate::fs::file::{FileNode, FILE_SUFFIX};
use crate::fs::name::NameError;
use crate::fs::node::{ChildNode, FsContext, Node};
use crate::storage::StorageError;

/// Reserved suffix marking folder marker artifacts on physical storage.
pub const FOLDER_SUFFIX: &str = ".dir";

/// How `create` treats missing ancestors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FolderCreateMode {
    /// Fail with [`FsError::ParentMissing`] if the immediate parent is not
    /// materialized.
    FailIfParentMissing,
    /// Recursively materialize missing ancestors first.
    IncludingParents,
}

/// Errors surfaced by node hierarchy operations.
#[derive(Error, Debug)]
pub enum FsError {
    /// A bounded wait for a physical artifact lock expired.
    #[error("timed out after {waited:?} waiting for a lock on {}", path.display())]
    LockTimeout { path: PathBuf, waited: Duration },

    /// Create was asked to fail on missing parents and the parent is absent.
    #[error("cannot create {folder}: parent {parent} does not exist")]
    ParentMissing { folder: String, parent: String },

    /// The operation would nest a folder inside itself or its descendant.
    #[error("folders contain one another (source: {source_path}, target: {target_path})")]
    HierarchyViolation {
        source_path: String,
        target_path: String,
    },

    /// Move attempted between nodes of different kinds.
    #[error("cannot move a {source_kind} node onto a {target_kind} node")]
    UnsupportedCrossKindMove {
        source_kind: &'static str,
        target_kind: &'static str,
    },

    /// A marker artifact holds bytes that cannot be an identifier.
    #[error("marker at {} is corrupt: {reason}", path.display())]
    MarkerCorrupt { path: PathBuf, reason: String },

    /// Failure from the physical storage layer.
    #[error("storage error: {0}")]
    Storage(StorageError),

    /// Failure from the filename cipher.
    #[error("name error: {0}")]
    Name(#[from] NameError),
}

impl From<StorageError> for FsError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::LockTimeout { path, waited } => FsError::LockTimeout { path, waited },
            other => FsError::Storage(other),
        }
    }
}

pub type FsResult<T> = Result<T, FsError>;

/// Logical folder node.
///
/// Nodes form a tree in which every node owns a single immutable reference to
/// its logical parent; parents never reference children, so there is no
/// cyclic object graph and containment checks are a bounded upward walk.
#[derive(Debug)]
pub struct FolderNode {
    ctx: Arc<FsContext>,
    parent: Option<Arc<FolderNode>>,
    name: String,
    dir_id: DirIdCell,
}

impl FolderNode {
    /// Root folder of an overlay tree. The root has no marker artifact and
    /// uses the fixed empty identifier.
    pub fn root(ctx: Arc<FsContext>) -> Arc<Self> {
        Arc::new(Self {
            ctx,
            parent: None,
            name: String::new(),
            dir_id: DirIdCell::preset(DirId::root()),
        })
    }

    /// Child folder node with the given logical name. Purely in-memory; the
    /// folder may or may not be materialized on storage.
    pub fn folder(self: &Arc<Self>, name: impl Into<String>) -> Arc<FolderNode> {
        Arc::new(FolderNode {
            ctx: Arc::clone(&self.ctx),
            parent: Some(Arc::clone(self)),
            name: name.into(),
            dir_id: DirIdCell::new(),
        })
    }

    /// Child file node with the given logical name.
    pub fn file(self: &Arc<Self>, name: impl Into<String>) -> FileNode {
        FileNode::new(Arc::clone(&self.ctx), Arc::clone(self), name.into())
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Logical path of this folder, for diagnostics: `/a/b/`.
    pub fn logical_path(&self) -> String {
        match &self.parent {
            None => "/".to_string(),
            Some(parent) => format!("{}{}/", parent.logical_path(), self.name),
        }
    }

    /// Resolve this folder's directory identifier, minting one if neither the
    /// in-memory cache nor a marker artifact holds a value.
    ///
    /// The mint alone does not persist anything; persistence happens when the
    /// folder is materialized by [`create`](Self::create). Concurrent callers
    /// converge on a single committed identifier: the first install wins and
    /// losers adopt the winner's value.
    pub fn dir_id(&self) -> FsResult<DirId> {
        if let Some(id) = self.dir_id.get() {
            return Ok(id);
        }
        let Some(parent) = &self.parent else {
            return Ok(self.dir_id.install(DirId::root()));
        };

        let marker = self.marker_path(parent)?;
        let id = if self.ctx.storage.exists(&marker) {
            self.read_marker(&marker)?
        } else {
            DirId::mint()
        };
        Ok(self.dir_id.install(id))
    }

    /// Physical directory holding this folder's contents, derived exclusively
    /// from the directory identifier.
    pub fn physical_path(&self) -> FsResult<PathBuf> {
        Ok(self.ctx.mapper.folder_path(&self.dir_id()?))
    }

    fn marker_path(&self, parent: &Arc<FolderNode>) -> FsResult<PathBuf> {
        Ok(parent.physical_path()?.join(self.encrypted_name()?))
    }

    fn read_marker(&self, marker: &std::path::Path) -> FsResult<DirId> {
        let handle = self
            .ctx
            .storage
            .open_readable(marker, self.ctx.lock_timeout)?;
        let mut buf = Vec::with_capacity(MAX_MARKER_LEN);
        handle
            .take(MAX_MARKER_LEN as u64)
            .read_to_end(&mut buf)
            .map_err(StorageError::Io)?;
        if buf.is_empty() {
            return Err(FsError::MarkerCorrupt {
                path: marker.to_path_buf(),
                reason: "marker is empty".to_string(),
            });
        }
        let text = String::from_utf8(buf).map_err(|e| FsError::MarkerCorrupt {
            path: marker.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(DirId::from_raw(text))
    }

    /// Enumerate this folder's children as a lazy, restartable sequence.
    ///
    /// Every call re-reads the physical directory; nothing is cached. Entries
    /// whose name cannot be decrypted are skipped with a warning, matching
    /// the behavior of a listing over a partially foreign directory.
    pub fn children(self: &Arc<Self>) -> FsResult<impl Iterator<Item = FsResult<ChildNode>>> {
        let physical = self.physical_path()?;
        let entries = if self.ctx.storage.exists(&physical) {
            Some(self.ctx.storage.entries(&physical)?)
        } else {
            None
        };

        let this = Arc::clone(self);
        Ok(entries
            .into_iter()
            .flatten()
            .filter_map(move |entry| match entry {
                Ok(name) => this.child_from_entry(&name).map(Ok),
                Err(err) => Some(Err(err.into())),
            }))
    }

    /// Child folders only.
    pub fn folders(
        self: &Arc<Self>,
    ) -> FsResult<impl Iterator<Item = FsResult<Arc<FolderNode>>>> {
        Ok(self.children()?.filter_map(|child| match child {
            Ok(ChildNode::Folder(folder)) => Some(Ok(folder)),
            Ok(ChildNode::File(_)) => None,
            Err(err) => Some(Err(err)),
        }))
    }

    /// Child files only.
    pub fn files(self: &Arc<Self>) -> FsResult<impl Iterator<Item = FsResult<FileNode>>> {
        Ok(self.children()?.filter_map(|child| match child {
            Ok(ChildNode::File(file)) => Some(Ok(file)),
            Ok(ChildNode::Folder(_)) => None,
            Err(err) => Some(Err(err)),
        }))
    }

    fn child_from_entry(self: &Arc<Self>, entry: &str) -> Option<ChildNode> {
        if let Some(ciphertext) = entry.strip_suffix(FOLDER_SUFFIX) {
            match self.ctx.cipher.decrypt_segment(ciphertext) {
                Ok(name) => Some(ChildNode::Folder(self.folder(name))),
                Err(err) => {
                    warn!(parent = %self.logical_path(), entry, %err, "skipping undecryptable folder entry");
                    None
                }
            }
        } else if let Some(ciphertext) = entry.strip_suffix(FILE_SUFFIX) {
            match self.ctx.cipher.decrypt_segment(ciphertext) {
                Ok(name) => Some(ChildNode::File(self.file(name))),
                Err(err) => {
                    warn!(parent = %self.logical_path(), entry, %err, "skipping undecryptable file entry");
                    None
                }
            }
        } else {
            None
        }
    }

    /// Materialize this folder on physical storage.
    ///
    /// A no-op when the marker artifact already exists. Otherwise resolves
    /// (or mints) the directory identifier, persists it to the marker under a
    /// bounded write lock, and ensures the mapped physical directory exists,
    /// recursively creating its shard container.
    pub fn create(self: &Arc<Self>, mode: FolderCreateMode) -> FsResult<()> {
        let Some(parent) = self.parent.clone() else {
            // Root: no marker, just the mapped physical directory.
            let physical = self.physical_path()?;
            self.ctx.storage.create_dir_all(&physical)?;
            return Ok(());
        };

        let marker = self.marker_path(&parent)?;
        if self.ctx.storage.exists(&marker) {
            return Ok(());
        }

        if !parent.exists()? {
            match mode {
                FolderCreateMode::FailIfParentMissing => {
                    return Err(FsError::ParentMissing {
                        folder: self.logical_path(),
                        parent: parent.logical_path(),
                    });
                }
                FolderCreateMode::IncludingParents => parent.create(mode)?,
            }
        }

        let id = self.dir_id()?;
        self.ctx.storage.create_dir_all(&parent.physical_path()?)?;
        {
            let mut writer = self
                .ctx
                .storage
                .open_writable(&marker, self.ctx.lock_timeout)?;
            writer.write_all(id.as_bytes()).map_err(StorageError::Io)?;
            writer.flush().map_err(StorageError::Io)?;
        }
        self.ctx.storage.create_dir_all(&self.physical_path()?)?;

        debug!(folder = %self.logical_path(), dir_id = %id, "materialized folder");
        Ok(())
    }

    /// Recursively copy this folder and its contents into `target`.
    ///
    /// Fails with [`FsError::HierarchyViolation`] if `target` is this folder
    /// or one of its descendants; nothing is touched in that case.
    pub fn copy_to(self: &Arc<Self>, target: &Arc<FolderNode>) -> FsResult<()> {
        if self.structurally_equals(target) || self.contains(target) {
            return Err(FsError::HierarchyViolation {
                source_path: self.logical_path(),
                target_path: target.logical_path(),
            });
        }

        target.create(FolderCreateMode::IncludingParents)?;
        for child in self.children()? {
            match child? {
                ChildNode::File(file) => {
                    let dst = target.file(file.name().to_string());
                    file.copy_to(&dst)?;
                }
                ChildNode::Folder(folder) => {
                    let dst = target.folder(folder.name().to_string());
                    folder.copy_to(&dst)?;
                }
            }
        }

        debug!(source = %self.logical_path(), target = %target.logical_path(), "copied folder");
        Ok(())
    }

    /// Move this folder onto `target` by relocating the marker artifact.
    ///
    /// The identifier bytes travel unchanged, so `target` afterwards maps to
    /// exactly the physical directory this folder used to map to; the whole
    /// subtree transfers in constant time. Fails with
    /// [`FsError::HierarchyViolation`] if either folder contains the other;
    /// nothing is touched in that case. After a successful move the source's
    /// cached identifier is retired and a fresh one is minted on the next
    /// materialization at the old logical path.
    pub fn move_to(self: &Arc<Self>, target: &Arc<FolderNode>) -> FsResult<()> {
        if self.structurally_equals(target) || self.contains(target) || target.contains(self) {
            return Err(FsError::HierarchyViolation {
                source_path: self.logical_path(),
                target_path: target.logical_path(),
            });
        }
        // The root contains every other folder, so reaching this point
        // guarantees both nodes have parents.
        let (Some(src_parent), Some(dst_parent)) = (&self.parent, &target.parent) else {
            return Err(FsError::HierarchyViolation {
                source_path: self.logical_path(),
                target_path: target.logical_path(),
            });
        };

        let dst_container = dst_parent.physical_path()?;
        self.ctx.storage.create_dir_all(&dst_container)?;

        let src_marker = self.marker_path(src_parent)?;
        let dst_marker = dst_container.join(target.encrypted_name()?);
        {
            let mut src = self
                .ctx
                .storage
                .open_writable(&src_marker, self.ctx.lock_timeout)?;
            let mut dst = self
                .ctx
                .storage
                .open_writable(&dst_marker, self.ctx.lock_timeout)?;
            src.move_to(&mut *dst)?;
        }

        // The identifier now belongs to the target's marker. Retire the
        // source's cache, and clear the target's so a pre-move resolution
        // cannot shadow the transferred value.
        self.dir_id.clear();
        target.dir_id.clear();

        debug!(source = %self.logical_path(), target = %target.logical_path(), "moved folder");
        Ok(())
    }

    /// Remove this folder and its entire subtree from physical storage.
    ///
    /// A no-op when the folder is absent. Child folders are deleted
    /// recursively (retiring their markers and data directories), child
    /// files are removed, then this folder's mapped directory and marker are
    /// removed, the marker under a bounded write lock. Deleting the root
    /// empties it but keeps its mapped directory.
    pub fn delete(self: &Arc<Self>) -> FsResult<()> {
        if !self.exists()? {
            return Ok(());
        }

        // Collect up front: the listing re-reads a directory we are about to
        // mutate entry by entry.
        let children: Vec<ChildNode> = self.children()?.collect::<FsResult<_>>()?;
        for child in children {
            match child {
                ChildNode::Folder(folder) => folder.delete()?,
                ChildNode::File(file) => file.delete()?,
            }
        }

        let Some(parent) = &self.parent else {
            return Ok(());
        };

        let physical = self.physical_path()?;
        if self.ctx.storage.exists(&physical) {
            self.ctx.storage.remove_dir_all(&physical)?;
        }

        let marker = self.marker_path(parent)?;
        {
            let _lock = self
                .ctx
                .storage
                .open_writable(&marker, self.ctx.lock_timeout)?;
            self.ctx.storage.remove_file(&marker)?;
        }
        self.dir_id.clear();

        debug!(folder = %self.logical_path(), "deleted folder");
        Ok(())
    }

    /// Whether `node` is a strict descendant of this folder, determined by a
    /// bounded upward walk over `node`'s ancestor chain.
    pub fn contains(&self, node: &FolderNode) -> bool {
        let mut current = node.parent.clone();
        while let Some(ancestor) = current {
            if self.structurally_equals(&ancestor) {
                return true;
            }
            current = ancestor.parent.clone();
        }
        false
    }

    /// Structural identity: same name chain up to the root.
    pub fn structurally_equals(&self, other: &FolderNode) -> bool {
        if self.name != other.name {
            return false;
        }
        match (&self.parent, &other.parent) {
            (None, None) => true,
            (Some(a), Some(b)) => a.structurally_equals(b),
            _ => false,
        }
    }
}

impl Node for FolderNode {
    fn name(&self) -> &str {
        &self.name
    }

    fn parent(&self) -> Option<&Arc<FolderNode>> {
        self.parent.as_ref()
    }

    fn encrypted_name(&self) -> FsResult<String> {
        let ciphertext = self.ctx.cipher.encrypt_segment(&self.name)?;
        Ok(format!("{ciphertext}{FOLDER_SUFFIX}"))
    }

    fn exists(&self) -> FsResult<bool> {
        let Some(parent) = &self.parent else {
            return Ok(true);
        };
        let marker = self.marker_path(parent)?;
        Ok(self.ctx.storage.exists(&marker))
    }

    fn last_modified(&self) -> FsResult<SystemTime> {
        let path = match &self.parent {
            None => self.physical_path()?,
            Some(parent) => self.marker_path(parent)?,
        };
        Ok(self.ctx.storage.last_modified(&path)?)
    }
}

impl std::fmt::Display for FolderNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.logical_path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::name::SivFilenameCipher;
    use crate::storage::LocalStorage;
    use tempfile::TempDir;

    fn test_root() -> (TempDir, Arc<FolderNode>) {
        let tmp = TempDir::new().unwrap();
        let storage = Arc::new(LocalStorage::new(tmp.path()));
        let cipher = Arc::new(SivFilenameCipher::new([7u8; 64]));
        let ctx = Arc::new(FsContext::new(storage, cipher));
        (tmp, FolderNode::root(ctx))
    }

    #[test]
    fn root_has_fixed_identifier_and_no_parent() {
        let (_tmp, root) = test_root();
        assert!(root.is_root());
        assert!(root.dir_id().unwrap().is_root());
        assert!(root.exists().unwrap());
        assert_eq!(root.logical_path(), "/");
    }

    #[test]
    fn logical_paths_nest() {
        let (_tmp, root) = test_root();
        let deep = root.folder("a").folder("b").folder("c");
        assert_eq!(deep.logical_path(), "/a/b/c/");
    }

    #[test]
    fn structural_equality_ignores_instances() {
        let (_tmp, root) = test_root();
        let a1 = root.folder("a").folder("b");
        let a2 = root.folder("a").folder("b");
        let other = root.folder("a").folder("c");

        assert!(a1.structurally_equals(&a2));
        assert!(!a1.structurally_equals(&other));
    }

    #[test]
    fn contains_walks_the_ancestor_chain() {
        let (_tmp, root) = test_root();
        let a = root.folder("a");
        let c = a.folder("b").folder("c");

        assert!(root.contains(&c));
        assert!(a.contains(&c));
        assert!(!c.contains(&a));
        // A folder does not contain itself.
        assert!(!a.contains(&a));
    }

    #[test]
    fn children_of_unmaterialized_folder_is_empty() {
        let (_tmp, root) = test_root();
        let ghost = root.folder("ghost");
        assert_eq!(ghost.children().unwrap().count(), 0);
    }

    #[test]
    fn foreign_entries_are_ignored_in_listings() {
        let (tmp, root) = test_root();
        root.create(FolderCreateMode::IncludingParents).unwrap();
        let physical = tmp.path().join(root.physical_path().unwrap());
        std::fs::write(physical.join("stray.tmp"), b"x").unwrap();
        std::fs::write(physical.join("not-base64!!!.dir"), b"x").unwrap();

        assert_eq!(root.children().unwrap().count(), 0);
    }

    #[test]
    fn marker_holds_exactly_the_identifier() {
        let (tmp, root) = test_root();
        let docs = root.folder("docs");
        docs.create(FolderCreateMode::IncludingParents).unwrap();

        let marker = tmp
            .path()
            .join(root.physical_path().unwrap())
            .join(docs.encrypted_name().unwrap());
        let bytes = std::fs::read(marker).unwrap();
        assert_eq!(bytes, docs.dir_id().unwrap().as_bytes());
    }

    #[test]
    fn create_is_idempotent() {
        let (_tmp, root) = test_root();
        let docs = root.folder("docs");
        docs.create(FolderCreateMode::IncludingParents).unwrap();
        let id = docs.dir_id().unwrap();

        docs.create(FolderCreateMode::IncludingParents).unwrap();
        assert_eq!(docs.dir_id().unwrap(), id);
    }

    #[test]
    fn empty_marker_is_reported_corrupt() {
        let (tmp, root) = test_root();
        root.create(FolderCreateMode::IncludingParents).unwrap();
        let docs = root.folder("docs");
        let marker = tmp
            .path()
            .join(root.physical_path().unwrap())
            .join(docs.encrypted_name().unwrap());
        std::fs::write(marker, b"").unwrap();

        let err = docs.dir_id().unwrap_err();
        assert!(matches!(err, FsError::MarkerCorrupt { .. }));
    }

    #[test]
    fn cross_kind_move_is_rejected() {
        let (_tmp, root) = test_root();
        root.create(FolderCreateMode::IncludingParents).unwrap();
        let folder = ChildNode::Folder(root.folder("a"));
        let file = ChildNode::File(root.file("b"));

        let err = folder.move_to(&file).unwrap_err();
        assert!(matches!(err, FsError::UnsupportedCrossKindMove { .. }));
        let err = file.move_to(&folder).unwrap_err();
        assert!(matches!(err, FsError::UnsupportedCrossKindMove { .. }));
    }
}
