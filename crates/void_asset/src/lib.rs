//! # void_asset - Asset Manager
//!
//! Shared, reference-counted asset payloads with:
//! - Path and id addressing (stable ids from `.meta` sidecars)
//! - One store per payload type
//! - Pluggable per-type loaders, including a bus loader posting
//!   [`LoadAssetRequest`] for loader plugins
//! - Pinning, streaming out, reload and clean-up of unused records
//!
//! ## Example
//!
//! ```ignore
//! use void_asset::prelude::*;
//!
//! let assets = AssetManager::new(vec!["assets".into()]);
//! assets.register_loader::<Texture, _>(bus_loader(dispatcher));
//!
//! let texture = assets.request::<Texture>("textures/player.png")?;
//! // ... once the loader plugin answered
//! assert_eq!(assets.usage::<Texture>("textures/player.png").unwrap().stream_state, StreamState::Loaded);
//! ```

pub mod handle;
pub mod loader;
pub mod manager;
pub mod registry;
pub mod storage;

pub use handle::{AssetHandle, AssetUsage, SharedAsset, StreamState};
pub use loader::{bus_loader, AssetPromise, LoadAssetRequest, LoaderFn, LoaderRegistry};
pub use manager::{Asset, AssetManager};
pub use registry::{normalize_path, AssetRegistry, AssetRegistryEntry};
pub use storage::{AssetRecord, AssetStore, ErasedStore};

/// Prelude - commonly used types
pub mod prelude {
    pub use crate::handle::{AssetHandle, AssetUsage, SharedAsset, StreamState};
    pub use crate::loader::{bus_loader, AssetPromise, LoadAssetRequest};
    pub use crate::manager::{Asset, AssetManager};
}
