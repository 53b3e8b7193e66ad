//! # Void Async
//!
//! Completion values and worker lanes for the Void engine runtime.
//!
//! - [`Promise`]: single-shot shared completion with blocking waits and callbacks
//! - [`ThreadLane`]: a dedicated worker thread with a FIFO queue
//! - [`ThreadManager`]: named lanes, fire-and-forget and packaged tasks

pub mod lane;
pub mod manager;
pub mod promise;

pub use lane::{Task, ThreadLane};
pub use manager::ThreadManager;
pub use promise::Promise;

/// Prelude
pub mod prelude {
    pub use crate::lane::ThreadLane;
    pub use crate::manager::ThreadManager;
    pub use crate::promise::Promise;
}
