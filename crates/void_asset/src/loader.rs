//! Asset loaders
//!
//! A loader is registered per payload type. It receives the resolved path and
//! returns the shared payload together with a promise that completes once the
//! payload was written. Loaders run while the manager lock is held, so they
//! must hand the work off (post a message, queue a lane task) and return.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use parking_lot::RwLock;

use void_async::Promise;
use void_event::{Message, MessageDispatcher, MessageHeader, MessageKind};

use crate::handle::SharedAsset;

/// What a loader hands back
pub struct AssetPromise<T> {
    pub asset: SharedAsset<T>,
    pub promise: Promise<()>,
}

impl<T: Default> AssetPromise<T> {
    /// A default payload with a failed promise
    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            asset: Arc::new(RwLock::new(T::default())),
            promise: Promise::failed(reason),
        }
    }

    /// An already complete payload
    pub fn ready(value: T) -> Self {
        Self {
            asset: Arc::new(RwLock::new(value)),
            promise: Promise::fulfilled(()),
        }
    }
}

/// Loader callable for payload type `T`
pub type LoaderFn<T> = Arc<dyn Fn(&Path) -> AssetPromise<T> + Send + Sync>;

/// Loaders keyed by payload type
#[derive(Default)]
pub struct LoaderRegistry {
    loaders: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl LoaderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace the loader for `T`
    pub fn register<T, F>(&mut self, loader: F)
    where
        T: Send + Sync + 'static,
        F: Fn(&Path) -> AssetPromise<T> + Send + Sync + 'static,
    {
        let loader: LoaderFn<T> = Arc::new(loader);
        if self.loaders.insert(TypeId::of::<T>(), Box::new(loader)).is_some() {
            log::debug!("Replaced loader for {}", std::any::type_name::<T>());
        }
    }

    pub fn get<T: Send + Sync + 'static>(&self) -> Option<LoaderFn<T>> {
        self.loaders
            .get(&TypeId::of::<T>())
            .and_then(|loader| loader.downcast_ref::<LoaderFn<T>>())
            .cloned()
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.loaders.contains_key(&TypeId::of::<T>())
    }

    pub fn remove<T: 'static>(&mut self) -> bool {
        self.loaders.remove(&TypeId::of::<T>()).is_some()
    }

    pub fn len(&self) -> usize {
        self.loaders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loaders.is_empty()
    }
}

/// Asks loader plugins to fill `asset` from `path`.
///
/// Handlers write through `asset` and mark the request handled (or failed).
/// There is no deadline by default since decoding may take many ticks.
pub struct LoadAssetRequest<T> {
    pub header: MessageHeader,
    pub path: PathBuf,
    pub asset: SharedAsset<T>,
}

impl<T> LoadAssetRequest<T> {
    pub fn new(path: impl Into<PathBuf>, asset: SharedAsset<T>) -> Self {
        let mut header = MessageHeader::request();
        header.set_timeout(None);
        Self {
            header,
            path: path.into(),
            asset,
        }
    }
}

impl<T: Send + Sync + 'static> Message for LoadAssetRequest<T> {
    fn header(&self) -> &MessageHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut MessageHeader {
        &mut self.header
    }

    fn kind(&self) -> MessageKind {
        MessageKind::Request
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn into_any(self: Box<Self>) -> Box<dyn Any + Send> {
        self
    }
}

/// Loader that posts a [`LoadAssetRequest<T>`] on `dispatcher`
pub fn bus_loader<T>(dispatcher: Arc<dyn MessageDispatcher>) -> impl Fn(&Path) -> AssetPromise<T> + Send + Sync
where
    T: Default + Send + Sync + 'static,
{
    move |path: &Path| {
        let asset: SharedAsset<T> = Arc::new(RwLock::new(T::default()));
        let promise = dispatcher.post(LoadAssetRequest::new(path, Arc::clone(&asset)));
        AssetPromise { asset, promise }
    }
}
