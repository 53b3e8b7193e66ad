//! Asset manager
//!
//! Type-indexed cache of shared payloads addressed by path or id. Records are
//! reference counted; payloads are streamed in through the loader registered
//! for their type and evicted when released, streamed out or cleaned.
//!
//! Every public method takes the manager lock for its whole duration.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use parking_lot::{Mutex, RwLock};

use void_core::{EngineResult, Uuid};

use crate::handle::{AssetHandle, AssetUsage, SharedAsset, StreamState};
use crate::loader::{AssetPromise, LoaderRegistry};
use crate::registry::{AssetRegistry, AssetRegistryEntry};
use crate::storage::{AssetRecord, AssetStore, ErasedStore};

/// Bound for payload types
pub trait Asset: Default + Send + Sync + 'static {}

impl<T: Default + Send + Sync + 'static> Asset for T {}

struct ManagerState {
    registry: AssetRegistry,
    stores: HashMap<TypeId, Box<dyn ErasedStore>>,
}

impl ManagerState {
    fn store_mut<T: Asset>(&mut self) -> &mut AssetStore<T> {
        let store = self
            .stores
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::new(AssetStore::<T>::new()));
        match store.as_any_mut().downcast_mut::<AssetStore<T>>() {
            Some(store) => store,
            None => unreachable!("store registered under the wrong type id"),
        }
    }

    fn existing_record<T: Asset>(&mut self, handle: &AssetHandle) -> Option<&mut AssetRecord<T>> {
        let path_key = self.registry.lookup(handle)?.path_key;
        self.stores
            .get_mut(&TypeId::of::<T>())?
            .as_any_mut()
            .downcast_mut::<AssetStore<T>>()?
            .get_mut(&path_key)
    }
}

/// Shared asset cache
pub struct AssetManager {
    state: Mutex<ManagerState>,
    loaders: RwLock<LoaderRegistry>,
}

impl AssetManager {
    /// Manager resolving relative paths against `roots` in order
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self {
            state: Mutex::new(ManagerState {
                registry: AssetRegistry::new(roots),
                stores: HashMap::new(),
            }),
            loaders: RwLock::new(LoaderRegistry::new()),
        }
    }

    pub fn roots(&self) -> Vec<PathBuf> {
        self.state.lock().registry.roots().to_vec()
    }

    /// Register or replace the loader for `T`
    pub fn register_loader<T, F>(&self, loader: F)
    where
        T: Asset,
        F: Fn(&Path) -> AssetPromise<T> + Send + Sync + 'static,
    {
        self.loaders.write().register::<T, F>(loader);
    }

    pub fn has_loader<T: Asset>(&self) -> bool {
        self.loaders.read().contains::<T>()
    }

    /// Registry id of the asset at `path`, registering it if unseen
    pub fn asset_id(&self, path: impl AsRef<Path>) -> Uuid {
        self.state.lock().registry.register_path(path.as_ref()).id
    }

    /// Registry entry for `handle`, if known
    pub fn entry(&self, handle: impl Into<AssetHandle>) -> Option<AssetRegistryEntry> {
        self.state.lock().registry.lookup(&handle.into()).cloned()
    }

    /// Register every asset with a sidecar under the roots. Returns how many
    /// were new.
    pub fn discover(&self) -> usize {
        let found = self.state.lock().registry.discover();
        log::debug!("Discovered {} assets", found);
        found
    }

    /// Take a reference to the asset, starting a load if it has no payload
    pub fn request<T: Asset>(&self, handle: impl Into<AssetHandle>) -> EngineResult<SharedAsset<T>> {
        let handle = handle.into();
        let mut state = self.state.lock();
        let entry = state.registry.resolve(&handle)?;

        let record = state.store_mut::<T>().get_or_insert(&entry);
        record.update_stream_state();
        record.ref_count += 1;
        record.touch();

        match record.payload.clone() {
            Some(payload) => Ok(payload),
            None => Ok(self.start_load(record, &entry.resolved_path)),
        }
    }

    /// Shortcut for an id address
    pub fn request_by_id<T: Asset>(&self, id: Uuid) -> EngineResult<SharedAsset<T>> {
        self.request::<T>(AssetHandle::Id(id))
    }

    /// Current payload without taking a reference or starting a load
    pub fn get<T: Asset>(&self, handle: impl Into<AssetHandle>) -> Option<SharedAsset<T>> {
        let handle = handle.into();
        let mut state = self.state.lock();
        let record = state.existing_record::<T>(&handle)?;
        record.update_stream_state();
        record.touch();
        record.payload.clone()
    }

    pub fn get_by_id<T: Asset>(&self, id: Uuid) -> Option<SharedAsset<T>> {
        self.get::<T>(AssetHandle::Id(id))
    }

    /// Start loading without touching the reference count
    pub fn stream_in<T: Asset>(&self, handle: impl Into<AssetHandle>) -> EngineResult<SharedAsset<T>> {
        let handle = handle.into();
        let mut state = self.state.lock();
        let entry = state.registry.resolve(&handle)?;

        let record = state.store_mut::<T>().get_or_insert(&entry);
        record.update_stream_state();
        record.touch();

        match record.payload.clone() {
            Some(payload) => Ok(payload),
            None => Ok(self.start_load(record, &entry.resolved_path)),
        }
    }

    /// Drop the payload. Without `force`, referenced or pinned records are
    /// left alone. Returns whether anything changed.
    pub fn stream_out<T: Asset>(&self, handle: impl Into<AssetHandle>, force: bool) -> bool {
        let handle = handle.into();
        let mut state = self.state.lock();
        let Some(record) = state.existing_record::<T>(&handle) else {
            return false;
        };
        record.update_stream_state();

        if !force && !record.is_evictable() {
            return false;
        }
        if record.payload.is_none() && record.stream_state == StreamState::Unloaded {
            return false;
        }
        record.evict();
        true
    }

    /// Give back one reference. The payload is evicted when the count reaches
    /// zero on an unpinned record. Returns false when nothing was held.
    pub fn release<T: Asset>(&self, handle: impl Into<AssetHandle>) -> bool {
        let handle = handle.into();
        let mut state = self.state.lock();
        let Some(record) = state.existing_record::<T>(&handle) else {
            log::warn!("Released unknown asset {}", handle);
            return false;
        };
        record.update_stream_state();

        if record.ref_count == 0 {
            log::warn!("Released asset '{}' with no references", record.normalized_path);
            return false;
        }
        record.ref_count -= 1;
        if record.is_evictable() {
            record.evict();
        }
        true
    }

    /// Pinned records are never evicted implicitly. Returns false for
    /// unknown records.
    pub fn set_pinned<T: Asset>(&self, handle: impl Into<AssetHandle>, pinned: bool) -> bool {
        let handle = handle.into();
        let mut state = self.state.lock();
        match state.existing_record::<T>(&handle) {
            Some(record) => {
                record.is_pinned = pinned;
                true
            }
            None => false,
        }
    }

    /// Restart loading with a fresh payload. Holders of the previous payload
    /// keep it until they request again.
    pub fn reload<T: Asset>(&self, handle: impl Into<AssetHandle>) -> EngineResult<SharedAsset<T>> {
        let handle = handle.into();
        let mut state = self.state.lock();
        let entry = state.registry.resolve(&handle)?;

        let record = state.store_mut::<T>().get_or_insert(&entry);
        record.touch();
        Ok(self.start_load(record, &entry.resolved_path))
    }

    /// Evict every unreferenced, unpinned record of every type. Returns the
    /// number of payloads dropped.
    pub fn clean(&self) -> usize {
        let mut state = self.state.lock();
        let evicted: usize = state.stores.values_mut().map(|store| store.clean()).sum();
        if evicted > 0 {
            log::debug!("Evicted {} unused assets", evicted);
        }
        evicted
    }

    pub fn usage<T: Asset>(&self, handle: impl Into<AssetHandle>) -> Option<AssetUsage> {
        let handle = handle.into();
        let mut state = self.state.lock();
        let record = state.existing_record::<T>(&handle)?;
        record.update_stream_state();
        Some(record.usage())
    }

    pub fn usage_by_id<T: Asset>(&self, id: Uuid) -> Option<AssetUsage> {
        self.usage::<T>(AssetHandle::Id(id))
    }

    /// Number of records across every type
    pub fn record_count(&self) -> usize {
        self.state.lock().stores.values().map(|store| store.len()).sum()
    }

    fn start_load<T: Asset>(&self, record: &mut AssetRecord<T>, path: &Path) -> SharedAsset<T> {
        let loader = self.loaders.read().get::<T>();
        let loaded = match loader {
            Some(loader) => loader(path),
            None => {
                log::warn!(
                    "No loader for {} ('{}')",
                    std::any::type_name::<T>(),
                    record.normalized_path
                );
                AssetPromise::failed("No loader")
            }
        };

        record.payload = Some(Arc::clone(&loaded.asset));
        record.pending_load = Some(loaded.promise);
        record.stream_state = StreamState::Loading;
        record.update_stream_state();
        loaded.asset
    }
}

impl Default for AssetManager {
    fn default() -> Self {
        Self::new(vec![PathBuf::from("assets")])
    }
}

impl fmt::Debug for AssetManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssetManager")
            .field("records", &self.record_count())
            .field("loaders", &self.loaders.read().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Texture {
        width: u32,
    }

    fn manager_with_instant_loader() -> AssetManager {
        let manager = AssetManager::new(vec![PathBuf::from("assets")]);
        manager.register_loader::<Texture, _>(|_| AssetPromise::ready(Texture { width: 64 }));
        manager
    }

    #[test]
    fn test_request_counts_references() {
        let manager = manager_with_instant_loader();
        let first = manager.request::<Texture>("a.png").unwrap();
        let second = manager.request::<Texture>("a.png").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.read().width, 64);

        let usage = manager.usage::<Texture>("a.png").unwrap();
        assert_eq!(usage.ref_count, 2);
        assert_eq!(usage.stream_state, StreamState::Loaded);
    }

    #[test]
    fn test_get_never_loads() {
        let manager = manager_with_instant_loader();
        assert!(manager.get::<Texture>("never.png").is_none());
        assert!(manager.usage::<Texture>("never.png").is_none());

        manager.request::<Texture>("b.png").unwrap();
        assert!(manager.get::<Texture>("b.png").is_some());
        assert_eq!(manager.usage::<Texture>("b.png").unwrap().ref_count, 1);
    }

    #[test]
    fn test_no_loader_yields_default_payload() {
        let manager = AssetManager::default();
        let asset = manager.request::<Texture>("c.png").unwrap();
        assert_eq!(asset.read().width, 0);
        let usage = manager.usage::<Texture>("c.png").unwrap();
        assert_eq!(usage.stream_state, StreamState::Unloaded);
        assert!(manager.get::<Texture>("c.png").is_none());
    }

    #[test]
    fn test_types_are_separate() {
        let manager = manager_with_instant_loader();
        manager.request::<Texture>("d.png").unwrap();
        assert!(manager.usage::<String>("d.png").is_none());
        assert_eq!(manager.record_count(), 1);
    }

    #[test]
    fn test_pinned_survives_release() {
        let manager = manager_with_instant_loader();
        let first = manager.request::<Texture>("e.png").unwrap();
        assert!(manager.set_pinned::<Texture>("e.png", true));
        assert!(manager.release::<Texture>("e.png"));

        let again = manager.request::<Texture>("e.png").unwrap();
        assert!(Arc::ptr_eq(&first, &again));
    }

    #[test]
    fn test_evicted_record_gets_new_payload() {
        let manager = manager_with_instant_loader();
        let first = manager.request::<Texture>("f.png").unwrap();
        assert!(manager.release::<Texture>("f.png"));
        assert!(!manager.release::<Texture>("f.png"));

        let again = manager.request::<Texture>("f.png").unwrap();
        assert!(!Arc::ptr_eq(&first, &again));
    }

    #[test]
    fn test_reload_replaces_payload() {
        let manager = manager_with_instant_loader();
        let first = manager.request::<Texture>("g.png").unwrap();
        let reloaded = manager.reload::<Texture>("g.png").unwrap();
        assert!(!Arc::ptr_eq(&first, &reloaded));
        let current = manager.get::<Texture>("g.png").unwrap();
        assert!(Arc::ptr_eq(&current, &reloaded));
        assert_eq!(manager.usage::<Texture>("g.png").unwrap().ref_count, 1);
    }

    #[test]
    fn test_unknown_id_is_not_found() {
        let manager = manager_with_instant_loader();
        let err = manager.request_by_id::<Texture>(Uuid::from_u32(99)).unwrap_err();
        assert_eq!(err.kind(), void_core::ErrorKind::NotFound);
        assert!(manager.get_by_id::<Texture>(Uuid::from_u32(99)).is_none());
    }
}
