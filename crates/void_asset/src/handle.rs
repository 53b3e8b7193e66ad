//! Asset addressing and usage reporting

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use parking_lot::RwLock;

use void_core::Uuid;

/// Shared payload handed out by the manager. Loaders write through the lock.
pub type SharedAsset<T> = Arc<RwLock<T>>;

/// Lifecycle of a record's payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StreamState {
    #[default]
    Unloaded,
    Loading,
    Loaded,
}

/// Address of an asset: a path (absolute or relative to an asset root) or
/// a registry id
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum AssetHandle {
    Path(PathBuf),
    Id(Uuid),
}

impl AssetHandle {
    pub fn path(path: impl Into<PathBuf>) -> Self {
        AssetHandle::Path(path.into())
    }

    pub fn id(id: Uuid) -> Self {
        AssetHandle::Id(id)
    }
}

impl fmt::Debug for AssetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetHandle::Path(path) => write!(f, "AssetHandle({})", path.display()),
            AssetHandle::Id(id) => write!(f, "AssetHandle({})", id),
        }
    }
}

impl fmt::Display for AssetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetHandle::Path(path) => write!(f, "{}", path.display()),
            AssetHandle::Id(id) => write!(f, "{}", id),
        }
    }
}

impl From<&str> for AssetHandle {
    fn from(path: &str) -> Self {
        AssetHandle::Path(PathBuf::from(path))
    }
}

impl From<String> for AssetHandle {
    fn from(path: String) -> Self {
        AssetHandle::Path(PathBuf::from(path))
    }
}

impl From<&Path> for AssetHandle {
    fn from(path: &Path) -> Self {
        AssetHandle::Path(path.to_path_buf())
    }
}

impl From<PathBuf> for AssetHandle {
    fn from(path: PathBuf) -> Self {
        AssetHandle::Path(path)
    }
}

impl From<Uuid> for AssetHandle {
    fn from(id: Uuid) -> Self {
        AssetHandle::Id(id)
    }
}

impl From<&AssetHandle> for AssetHandle {
    fn from(handle: &AssetHandle) -> Self {
        handle.clone()
    }
}

/// Snapshot of a record's bookkeeping
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssetUsage {
    pub ref_count: u32,
    pub is_pinned: bool,
    pub stream_state: StreamState,
    pub last_access: Instant,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_conversions() {
        assert_eq!(AssetHandle::from("a.png"), AssetHandle::Path(PathBuf::from("a.png")));
        let id = Uuid::from_u32(0x2f);
        assert_eq!(AssetHandle::from(id), AssetHandle::Id(id));
        assert_eq!(AssetHandle::from(id).to_string(), "00000000-0000-0000-0000-00000000002f");
    }

    #[test]
    fn test_default_stream_state() {
        assert_eq!(StreamState::default(), StreamState::Unloaded);
    }
}
