//! Logical filesystem layer: the node hierarchy, directory identifiers, the
//! identifier-to-path mapper, and filename encryption.

pub mod dir_id;
pub mod file;
pub mod folder;
pub mod mapper;
pub mod name;
pub mod node;

pub use dir_id::{DirId, DirIdCell, MAX_MARKER_LEN};
pub use file::{FileNode, FILE_SUFFIX};
pub use folder::{FolderCreateMode, FolderNode, FsError, FsResult, FOLDER_SUFFIX};
pub use mapper::{PathMapper, DATA_DIR_NAME, SHARD_PREFIX_LEN};
pub use name::{FilenameCipher, NameContext, NameError, SivFilenameCipher};
pub use node::{ChildNode, FsContext, Node, DEFAULT_LOCK_TIMEOUT};
