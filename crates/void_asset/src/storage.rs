//! Per-type asset stores
//!
//! One [`AssetStore`] exists per payload type, holding a record per path key.
//! The manager keeps them type-erased behind [`ErasedStore`].

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use void_async::Promise;
use void_core::Uuid;

use crate::handle::{AssetUsage, SharedAsset, StreamState};
use crate::registry::AssetRegistryEntry;

/// Bookkeeping for one asset of type `T`
pub struct AssetRecord<T> {
    pub payload: Option<SharedAsset<T>>,
    pub normalized_path: String,
    pub path_key: Uuid,
    pub id: Uuid,
    pub ref_count: u32,
    pub is_pinned: bool,
    pub stream_state: StreamState,
    pub last_access: Instant,
    pub pending_load: Option<Promise<()>>,
}

impl<T> AssetRecord<T> {
    pub fn new(entry: &AssetRegistryEntry) -> Self {
        Self {
            payload: None,
            normalized_path: entry.normalized_path.clone(),
            path_key: entry.path_key,
            id: entry.id,
            ref_count: 0,
            is_pinned: false,
            stream_state: StreamState::Unloaded,
            last_access: Instant::now(),
            pending_load: None,
        }
    }

    /// Fold a finished load into the record
    pub fn update_stream_state(&mut self) {
        if self.stream_state != StreamState::Loading {
            return;
        }
        let Some(result) = self.pending_load.as_ref().and_then(Promise::resolve) else {
            return;
        };

        self.pending_load = None;
        if result.succeeded() && self.payload.is_some() {
            self.stream_state = StreamState::Loaded;
        } else {
            log::error!("Failed to load asset '{}': {}", self.normalized_path, result.report());
            self.payload = None;
            self.stream_state = StreamState::Unloaded;
        }
    }

    /// Drop the payload. Pending loads are abandoned.
    pub fn evict(&mut self) {
        self.payload = None;
        self.pending_load = None;
        self.stream_state = StreamState::Unloaded;
    }

    pub fn is_evictable(&self) -> bool {
        self.ref_count == 0 && !self.is_pinned
    }

    pub fn touch(&mut self) {
        self.last_access = Instant::now();
    }

    pub fn usage(&self) -> AssetUsage {
        AssetUsage {
            ref_count: self.ref_count,
            is_pinned: self.is_pinned,
            stream_state: self.stream_state,
            last_access: self.last_access,
        }
    }

    /// Same payload allocation as `other`
    pub fn holds(&self, other: &SharedAsset<T>) -> bool {
        self.payload
            .as_ref()
            .map(|payload| Arc::ptr_eq(payload, other))
            .unwrap_or(false)
    }
}

/// Records of one payload type keyed by path key
pub struct AssetStore<T> {
    records: HashMap<Uuid, AssetRecord<T>>,
}

impl<T> AssetStore<T> {
    pub fn new() -> Self {
        Self {
            records: HashMap::new(),
        }
    }

    pub fn get(&self, path_key: &Uuid) -> Option<&AssetRecord<T>> {
        self.records.get(path_key)
    }

    pub fn get_mut(&mut self, path_key: &Uuid) -> Option<&mut AssetRecord<T>> {
        self.records.get_mut(path_key)
    }

    pub fn get_or_insert(&mut self, entry: &AssetRegistryEntry) -> &mut AssetRecord<T> {
        self.records
            .entry(entry.path_key)
            .or_insert_with(|| AssetRecord::new(entry))
    }
}

impl<T> Default for AssetStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Type-erased view of an [`AssetStore`]
pub trait ErasedStore: Send {
    /// Evict every unreferenced, unpinned record. Returns how many payloads dropped.
    fn clean(&mut self) -> usize;

    fn len(&self) -> usize;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Send + Sync + 'static> ErasedStore for AssetStore<T> {
    fn clean(&mut self) -> usize {
        let mut evicted = 0;
        for record in self.records.values_mut() {
            record.update_stream_state();
            if record.is_evictable() && (record.payload.is_some() || record.pending_load.is_some()) {
                record.evict();
                evicted += 1;
            }
        }
        evicted
    }

    fn len(&self) -> usize {
        self.records.len()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
