//! Registry of named lanes

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use parking_lot::RwLock;

use void_core::{EngineError, EngineResult};

use crate::lane::{panic_message, ThreadLane};
use crate::promise::Promise;

/// Owns every named [`ThreadLane`]
#[derive(Default)]
pub struct ThreadManager {
    lanes: RwLock<HashMap<String, Arc<ThreadLane>>>,
}

impl ThreadManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a lane. Returns false if the name is taken.
    pub fn try_create_lane(&self, name: &str) -> EngineResult<bool> {
        if name.is_empty() {
            return Err(EngineError::invalid_argument("lane name must not be empty"));
        }

        let mut lanes = self.lanes.write();
        if lanes.contains_key(name) {
            return Ok(false);
        }
        let lane = ThreadLane::spawn(name)?;
        lanes.insert(name.to_string(), Arc::new(lane));
        log::debug!("Created lane '{}'", name);
        Ok(true)
    }

    pub fn has_lane(&self, name: &str) -> bool {
        self.lanes.read().contains_key(name)
    }

    pub fn lane_count(&self) -> usize {
        self.lanes.read().len()
    }

    /// Names of every lane, sorted
    pub fn lane_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lanes.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Queue a fire-and-forget task on `name`
    pub fn post<F>(&self, name: &str, task: F) -> EngineResult<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.lane(name)?.post(Box::new(task))
    }

    /// Queue `f` on `name` and return a promise for its value.
    /// A panicking task fails the promise with the panic text.
    pub fn post_with_future<F, R>(&self, name: &str, f: F) -> EngineResult<Promise<R>>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + Sync + 'static,
    {
        let promise = Promise::new();
        let producer = promise.clone();
        self.lane(name)?.post(Box::new(move || {
            match panic::catch_unwind(AssertUnwindSafe(f)) {
                Ok(value) => {
                    producer.fulfill(value);
                }
                Err(payload) => {
                    producer.fail(panic_message(payload.as_ref()));
                }
            }
        }))?;
        Ok(promise)
    }

    /// Stop one lane, letting its queue drain
    pub fn stop_lane(&self, name: &str) -> EngineResult<()> {
        let lane = self
            .lanes
            .write()
            .remove(name)
            .ok_or_else(|| EngineError::not_found(format!("lane '{}'", name)))?;
        lane.stop();
        log::debug!("Stopped lane '{}'", name);
        Ok(())
    }

    /// Stop every lane. All lanes are closed first so they drain in parallel.
    pub fn stop_all(&self) {
        let lanes: Vec<Arc<ThreadLane>> = self.lanes.write().drain().map(|(_, lane)| lane).collect();
        for lane in &lanes {
            lane.close();
        }
        for lane in &lanes {
            lane.join();
        }
        if !lanes.is_empty() {
            log::debug!("Stopped {} lanes", lanes.len());
        }
    }

    fn lane(&self, name: &str) -> EngineResult<Arc<ThreadLane>> {
        self.lanes
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::not_found(format!("lane '{}'", name)))
    }
}

impl Drop for ThreadManager {
    fn drop(&mut self) {
        if thread::panicking() {
            // Lanes still close and join through their own Drop
            self.lanes.get_mut().clear();
            return;
        }
        self.stop_all();
    }
}

impl std::fmt::Debug for ThreadManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadManager")
            .field("lanes", &self.lane_names())
            .finish()
    }
}
