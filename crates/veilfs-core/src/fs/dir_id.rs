//! Directory identifiers and their per-node resolution cell.
//!
//! Every folder is anchored to physical storage by an opaque, high-entropy
//! identifier minted once at first use and persisted as the folder's marker
//! artifact. The identifier - not the logical name or the ancestor chain -
//! determines where the folder's contents live, which is what makes renames
//! and moves constant-size metadata updates.

use parking_lot::Mutex;
use rand::RngCore;
use std::fmt;

/// Maximum number of bytes read from a marker artifact.
///
/// Markers hold the raw identifier bytes with no header or length prefix;
/// 64 bytes comfortably covers a textual 128-bit identifier.
pub const MAX_MARKER_LEN: usize = 64;

/// Opaque identifier anchoring a folder's physical storage location.
///
/// The root directory uses the fixed empty identifier and owns no marker
/// artifact; every other folder gets a random identifier on first use.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DirId(String);

impl DirId {
    /// The root directory (empty identifier).
    #[inline]
    pub fn root() -> Self {
        DirId(String::new())
    }

    /// Wrap raw identifier bytes read from a marker artifact.
    #[inline]
    pub fn from_raw(id: impl Into<String>) -> Self {
        DirId(id.into())
    }

    /// Mint a fresh identifier: 128 bits from the thread-local CSPRNG,
    /// hex-formatted to a fixed 32 characters.
    pub fn mint() -> Self {
        let mut bytes = [0u8; 16];
        rand::rng().fill_bytes(&mut bytes);
        DirId(hex::encode(bytes))
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl AsRef<str> for DirId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DirId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            write!(f, "<root>")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Atomically-settable optional identifier with first-writer-wins install.
///
/// Backs the lazy get-or-create resolution of a folder node's identifier:
/// concurrent resolvers may each compute a candidate, but only the first
/// install commits; losers observe and adopt the winner's value. A completed
/// move clears the cell, retiring the identifier for this node instance.
#[derive(Debug, Default)]
pub struct DirIdCell {
    slot: Mutex<Option<DirId>>,
}

impl DirIdCell {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cell pre-seeded with a known identifier (used for the root).
    pub fn preset(id: DirId) -> Self {
        Self {
            slot: Mutex::new(Some(id)),
        }
    }

    /// Currently committed identifier, if any.
    pub fn get(&self) -> Option<DirId> {
        self.slot.lock().clone()
    }

    /// Commit `candidate` unless a value is already present; returns the
    /// committed value either way.
    pub fn install(&self, candidate: DirId) -> DirId {
        let mut slot = self.slot.lock();
        match &*slot {
            Some(existing) => existing.clone(),
            None => {
                *slot = Some(candidate.clone());
                candidate
            }
        }
    }

    /// Retire the cached identifier. The next resolution re-reads the marker
    /// or mints anew.
    pub fn clear(&self) {
        *self.slot.lock() = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn minted_ids_are_fixed_width_and_unique() {
        let a = DirId::mint();
        let b = DirId::mint();
        assert_eq!(a.as_str().len(), 32);
        assert_eq!(b.as_str().len(), 32);
        assert_ne!(a, b);
        assert!(!a.is_root());
    }

    #[test]
    fn root_id_is_empty() {
        let root = DirId::root();
        assert!(root.is_root());
        assert_eq!(root.as_str(), "");
        assert_eq!(root.to_string(), "<root>");
    }

    #[test]
    fn first_install_wins() {
        let cell = DirIdCell::new();
        let first = DirId::from_raw("first");
        let second = DirId::from_raw("second");

        assert_eq!(cell.install(first.clone()), first);
        assert_eq!(cell.install(second), first);
        assert_eq!(cell.get(), Some(first));
    }

    #[test]
    fn clear_retires_the_value() {
        let cell = DirIdCell::preset(DirId::from_raw("old"));
        cell.clear();
        assert_eq!(cell.get(), None);

        let fresh = DirId::from_raw("new");
        assert_eq!(cell.install(fresh.clone()), fresh);
    }

    #[test]
    fn concurrent_installs_converge() {
        let cell = Arc::new(DirIdCell::new());
        let mut handles = Vec::new();

        for _ in 0..16 {
            let cell = Arc::clone(&cell);
            handles.push(thread::spawn(move || cell.install(DirId::mint())));
        }

        let winners: Vec<DirId> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let committed = cell.get().unwrap();
        assert!(winners.iter().all(|w| *w == committed));
    }
}
