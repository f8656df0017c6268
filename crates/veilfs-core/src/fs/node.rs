//! Shared node contract and the context that backs every node.
//!
//! Logical nodes come in two disjoint variants, [`FileNode`] and
//! [`FolderNode`], distinguished on physical storage only by their reserved
//! suffix. Both expose the common capability set through [`Node`]; the
//! [`ChildNode`] tagged variant is what directory listings produce and is the
//! surface on which cross-kind operations are rejected at runtime.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::fs::file::FileNode;
use crate::fs::folder::{FolderNode, FsError, FsResult};
use crate::fs::mapper::PathMapper;
use crate::fs::name::FilenameCipher;
use crate::storage::Storage;

/// Bound on every wait for a physical artifact lock.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(1);

/// Shared collaborators for a node tree: the physical storage, the filename
/// cipher, the identifier-to-path mapper, and the lock timeout.
pub struct FsContext {
    pub(crate) storage: Arc<dyn Storage>,
    pub(crate) cipher: Arc<dyn FilenameCipher>,
    pub(crate) mapper: PathMapper,
    pub(crate) lock_timeout: Duration,
}

impl FsContext {
    pub fn new(storage: Arc<dyn Storage>, cipher: Arc<dyn FilenameCipher>) -> Self {
        Self {
            storage,
            cipher,
            mapper: PathMapper::new(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    pub fn with_mapper(mut self, mapper: PathMapper) -> Self {
        self.mapper = mapper;
        self
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn lock_timeout(&self) -> Duration {
        self.lock_timeout
    }
}

impl fmt::Debug for FsContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FsContext")
            .field("lock_timeout", &self.lock_timeout)
            .finish_non_exhaustive()
    }
}

/// Capabilities common to every logical node.
pub trait Node {
    /// Plaintext segment name used by callers.
    fn name(&self) -> &str;

    /// Owning parent folder; `None` only for the root.
    fn parent(&self) -> Option<&Arc<FolderNode>>;

    /// Encrypted on-disk name, reserved suffix included.
    fn encrypted_name(&self) -> FsResult<String>;

    /// Whether the node is materialized on physical storage.
    fn exists(&self) -> FsResult<bool>;

    /// Last modification time of the node's physical artifact.
    fn last_modified(&self) -> FsResult<SystemTime>;
}

/// A typed child produced by listing a folder.
#[derive(Debug, Clone)]
pub enum ChildNode {
    File(FileNode),
    Folder(Arc<FolderNode>),
}

impl ChildNode {
    pub fn name(&self) -> &str {
        match self {
            ChildNode::File(f) => f.name(),
            ChildNode::Folder(d) => d.name(),
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, ChildNode::File(_))
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, ChildNode::Folder(_))
    }

    pub fn as_file(&self) -> Option<&FileNode> {
        match self {
            ChildNode::File(f) => Some(f),
            ChildNode::Folder(_) => None,
        }
    }

    pub fn as_folder(&self) -> Option<&Arc<FolderNode>> {
        match self {
            ChildNode::Folder(d) => Some(d),
            ChildNode::File(_) => None,
        }
    }

    fn kind_name(&self) -> &'static str {
        match self {
            ChildNode::File(_) => "file",
            ChildNode::Folder(_) => "folder",
        }
    }

    /// Move this node onto `target`.
    ///
    /// Only defined between nodes of the same kind; a mismatch fails with
    /// [`FsError::UnsupportedCrossKindMove`] before anything is touched.
    pub fn move_to(&self, target: &ChildNode) -> FsResult<()> {
        match (self, target) {
            (ChildNode::Folder(src), ChildNode::Folder(dst)) => src.move_to(dst),
            (ChildNode::File(src), ChildNode::File(dst)) => src.move_to(dst),
            (src, dst) => Err(FsError::UnsupportedCrossKindMove {
                source_kind: src.kind_name(),
                target_kind: dst.kind_name(),
            }),
        }
    }
}
