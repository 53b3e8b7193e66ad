//! # Void Services
//!
//! The host side of the plugin boundary.
//!
//! Provides what plugins share:
//! - [`HostConfig`]: process-wide settings from `void.toml` and `VOID_*` overrides
//! - [`Host`]: message coordinator, asset manager, worker lanes and input
//! - [`ServiceRegistry`]: typed services plugins publish for each other
//!
//! ## Usage
//!
//! ```ignore
//! let host = Host::new(HostConfig::load()?)?;
//!
//! // A plugin publishes a service on attach
//! host.register_service(PhysicsWorld::new())?;
//!
//! // Another one looks it up
//! if let Some(physics) = host.service::<PhysicsWorld>() {
//!     physics.step(dt);
//! }
//! ```

pub mod config;
pub mod error;
pub mod host;
pub mod registry;

pub use config::{HostConfig, CONFIG_FILE_NAME};
pub use error::{ServiceError, ServiceResult};
pub use host::{Host, HostHandle};
pub use registry::ServiceRegistry;
