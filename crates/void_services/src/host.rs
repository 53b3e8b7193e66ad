//! Host context
//!
//! The [`Host`] owns everything plugins share: configuration, the message
//! coordinator, the asset manager, worker lanes, input schemes and the
//! typed service registry. Plugins receive a [`HostHandle`] on attach and
//! keep only a weak reference to it.

use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use void_async::{Promise, ThreadManager};
use void_asset::AssetManager;
use void_core::{DeltaTime, Outcome};
use void_event::{Message, MessageCoordinator, MessageDispatcher};
use void_input::InputManager;

use crate::config::HostConfig;
use crate::error::ServiceResult;
use crate::registry::ServiceRegistry;

/// Shared host reference handed to plugins
pub type HostHandle = Arc<Host>;

/// Services exposed to plugins
pub struct Host {
    config: HostConfig,
    coordinator: Arc<MessageCoordinator>,
    assets: Arc<AssetManager>,
    threads: Arc<ThreadManager>,
    input: Mutex<InputManager>,
    services: RwLock<ServiceRegistry>,
}

impl Host {
    /// Build a host. Invalid configuration is fatal here.
    pub fn new(config: HostConfig) -> ServiceResult<HostHandle> {
        config.validate()?;

        let roots = config
            .asset_roots
            .iter()
            .map(|root| config.resolve(root))
            .collect();

        log::info!(
            "Host created (fixed step {}s, {} sub-steps max)",
            config.fixed_time_step,
            config.max_sub_steps
        );

        Ok(Arc::new(Self {
            assets: Arc::new(AssetManager::new(roots)),
            coordinator: Arc::new(MessageCoordinator::new()),
            threads: Arc::new(ThreadManager::new()),
            input: Mutex::new(InputManager::new()),
            services: RwLock::new(ServiceRegistry::new()),
            config,
        }))
    }

    pub fn config(&self) -> &HostConfig {
        &self.config
    }

    pub fn coordinator(&self) -> &Arc<MessageCoordinator> {
        &self.coordinator
    }

    /// The coordinator as a trait object
    pub fn dispatcher(&self) -> Arc<dyn MessageDispatcher> {
        self.coordinator.clone()
    }

    pub fn assets(&self) -> &Arc<AssetManager> {
        &self.assets
    }

    pub fn threads(&self) -> &Arc<ThreadManager> {
        &self.threads
    }

    /// Input schemes. The lock is not reentrant: do not hold the guard
    /// across a call that may lock it again.
    pub fn input(&self) -> MutexGuard<'_, InputManager> {
        self.input.lock()
    }

    /// Refresh the active input schemes. Device requests and action
    /// callbacks run with the input lock released, so both may call
    /// [`Host::input`].
    pub fn update_input(&self, delta_time: &DeltaTime) {
        let query = {
            let input = self.input.lock();
            match input.pending_query() {
                Some(query) => query,
                None => return,
            }
        };
        let snapshot = query.run(&*self.coordinator);
        let pending = self.input.lock().apply_snapshot_deferred(delta_time, &snapshot);
        pending.fire();
    }

    pub fn services(&self) -> RwLockReadGuard<'_, ServiceRegistry> {
        self.services.read()
    }

    pub fn services_mut(&self) -> RwLockWriteGuard<'_, ServiceRegistry> {
        self.services.write()
    }

    /// Publish a service for other plugins
    pub fn register_service<T: Send + Sync + 'static>(&self, service: T) -> ServiceResult<Arc<T>> {
        self.services.write().register(service)
    }

    pub fn service<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.services.read().get::<T>()
    }

    /// Dispatch on the calling thread
    pub fn send(&self, message: &mut dyn Message) -> Outcome {
        self.coordinator.send(message)
    }

    /// Queue for the next tick
    pub fn post<M: Message>(&self, message: M) -> Promise<()> {
        self.coordinator.post(message)
    }

    /// Stop worker lanes and drop services. Handlers stay registered until
    /// their owners detach.
    pub fn shutdown(&self) {
        self.threads.stop_all();
        self.services.write().clear();
        log::info!("Host shut down");
    }
}

impl std::fmt::Debug for Host {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Host")
            .field("config", &self.config)
            .field("handlers", &self.coordinator.handler_count())
            .field("lanes", &self.threads.lane_count())
            .finish()
    }
}
