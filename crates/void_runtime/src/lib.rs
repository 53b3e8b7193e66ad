//! # Void Runtime
//!
//! The engine host process: boots the [`Host`](void_services::Host), loads
//! plugins in dependency order and drives them frame by frame.
//!
//! ## Usage
//!
//! ```ignore
//! let mut app = Application::new(HostConfig::load()?, StaticPluginRegistry::new())?;
//! app.load_plugins()?;
//! app.run()?;
//! ```

pub mod application;
pub mod error;
pub mod logging;
pub mod scheduler;

pub use application::Application;
pub use error::{RuntimeError, RuntimeResult, EXIT_LOAD_FAILURE, EXIT_NORMAL, EXIT_PANIC};
pub use scheduler::FrameScheduler;

pub mod prelude {
    pub use crate::application::Application;
    pub use crate::error::{RuntimeError, RuntimeResult};
    pub use crate::scheduler::FrameScheduler;
    pub use void_plugin::prelude::*;
    pub use void_services::HostConfig;
}
