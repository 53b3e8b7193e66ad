//! Named worker thread with a FIFO task queue

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle};
use crossbeam_channel::{unbounded, Sender};
use parking_lot::Mutex;

use void_core::{EngineError, EngineResult};

/// Boxed unit of work run on a lane
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// A dedicated worker thread. Tasks run one at a time in posting order.
pub struct ThreadLane {
    name: String,
    sender: Mutex<Option<Sender<Task>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl ThreadLane {
    /// Spawn the worker thread
    pub fn spawn(name: impl Into<String>) -> EngineResult<Self> {
        let name = name.into();
        let (sender, receiver) = unbounded::<Task>();

        let lane_name = name.clone();
        let worker = thread::Builder::new()
            .name(format!("void-lane-{}", name))
            .spawn(move || {
                for task in receiver.iter() {
                    if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task)) {
                        log::error!(
                            "Task on lane '{}' panicked: {}",
                            lane_name,
                            panic_message(payload.as_ref())
                        );
                    }
                }
                log::debug!("Lane '{}' drained", lane_name);
            })
            .map_err(|e| EngineError::load_failure(format!("cannot spawn lane '{}': {}", name, e)))?;

        Ok(Self {
            name,
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the lane still accepts tasks
    pub fn is_running(&self) -> bool {
        self.sender.lock().is_some()
    }

    /// Append a task. Fails once the lane is stopped.
    pub fn post(&self, task: Task) -> EngineResult<()> {
        let sender = self.sender.lock();
        match sender.as_ref() {
            Some(sender) => sender
                .send(task)
                .map_err(|_| EngineError::not_found(format!("lane '{}' is stopped", self.name))),
            None => Err(EngineError::not_found(format!("lane '{}' is stopped", self.name))),
        }
    }

    /// Stop accepting tasks. Queued tasks still run.
    pub fn close(&self) {
        self.sender.lock().take();
    }

    /// Wait for the worker to finish its queue
    pub fn join(&self) {
        let handle = self.worker.lock().take();
        if let Some(handle) = handle {
            if handle.thread().id() == thread::current().id() {
                log::warn!("Lane '{}' cannot join itself", self.name);
                return;
            }
            if handle.join().is_err() {
                log::error!("Lane '{}' worker terminated abnormally", self.name);
            }
        }
    }

    /// Close then join
    pub fn stop(&self) {
        self.close();
        self.join();
    }
}

impl Drop for ThreadLane {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for ThreadLane {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ThreadLane")
            .field("name", &self.name)
            .field("running", &self.is_running())
            .finish()
    }
}

/// Text carried by a panic payload
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        String::from("unknown panic")
    }
}
