//! Deterministic mapping from a directory identifier to a sharded physical
//! folder path.
//!
//! The identifier's raw bytes are hashed with SHA-1, the digest is encoded as
//! uppercase Base32 (case-insensitive, filesystem-safe), and the encoded
//! string is split into a 2-character container segment and a 30-character
//! leaf segment under the fixed data root `d/`. Sharding bounds the number of
//! entries in any single physical directory level.
//!
//! The identifier is hashed as-is; no encryption step is applied before
//! hashing. Identifiers are uniformly random values independent of logical
//! names and structure, so the sharded layout exposes nothing beyond the
//! existence of folders (see DESIGN.md for the recorded decision).

use data_encoding::BASE32;
use ring::digest;
use std::path::{Path, PathBuf};

use super::dir_id::DirId;

/// Name of the data root folder all mapped paths live under.
pub const DATA_DIR_NAME: &str = "d";

/// Length of the container (shard prefix) segment.
pub const SHARD_PREFIX_LEN: usize = 2;

/// Hash-and-shard mapper from [`DirId`] to physical folder path.
#[derive(Debug, Clone)]
pub struct PathMapper {
    data_root: PathBuf,
}

impl Default for PathMapper {
    fn default() -> Self {
        Self::new()
    }
}

impl PathMapper {
    /// Mapper rooted at the conventional data root `d/`.
    pub fn new() -> Self {
        Self {
            data_root: PathBuf::from(DATA_DIR_NAME),
        }
    }

    /// Mapper rooted at a custom data root (storage-relative).
    pub fn with_data_root(data_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
        }
    }

    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    /// Physical folder path for `id`: `<data-root>/<prefix>/<remainder>`.
    ///
    /// Stable for a given identifier; independent of logical names and of
    /// where in the hierarchy the folder sits.
    pub fn folder_path(&self, id: &DirId) -> PathBuf {
        let hash = digest::digest(&digest::SHA1_FOR_LEGACY_USE_ONLY, id.as_bytes());
        let encoded = BASE32.encode(hash.as_ref());
        let (prefix, remainder) = encoded.split_at(SHARD_PREFIX_LEN);
        self.data_root.join(prefix).join(remainder)
    }
}
