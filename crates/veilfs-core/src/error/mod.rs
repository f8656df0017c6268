//! Unified re-exports of the error types each layer defines next to its code.

pub use crate::fs::folder::{FsError, FsResult};
pub use crate::fs::name::{NameContext, NameError};
pub use crate::storage::{StorageError, StorageResult};
