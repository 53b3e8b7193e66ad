//! # void_plugin - Plugin System
//!
//! Everything that runs inside the engine arrives as a plugin:
//! - **Manifests**: JSON `.meta` files discovered under the plugin directory
//! - **Ordering**: dependencies by name or type tag, loggers and loaders first
//! - **Loading**: shared libraries exporting `create_<name>` / `destroy_<name>`,
//!   or factories registered for statically linked plugins
//! - **Lifecycle**: attach once, update every tick, detach once
//!
//! ## Example
//!
//! ```ignore
//! use void_plugin::prelude::*;
//!
//! let mut statics = StaticPluginRegistry::new();
//! statics.register_default::<ConsoleLogger>("console_logger");
//!
//! let loader = PluginLoader::new(statics);
//! let outcome = loader.load_plugins(&config.plugin_directory, &[], &config.working_directory, &host);
//! // ... run ...
//! loader.unload_plugins(outcome.loaded);
//! ```

pub mod error;
pub mod library;
pub mod loader;
pub mod meta;
pub mod order;
pub mod plugin;
pub mod registry;

pub use error::{PluginError, PluginFailure, PluginResult};
pub use library::PluginLibrary;
pub use loader::{LoadOutcome, LoadedPlugin, PluginLoader};
pub use meta::{discover_plugins, parse_plugin_meta, read_plugin_meta, Discovery, PluginLinkage, PluginMeta};
pub use order::{resolve_load_order, select_requested, LoadOrder};
pub use plugin::{CreatePluginFn, DestroyPluginFn, HostLink, Plugin, PluginBox, PluginInstance, NOT_ATTACHED_REPORT};
pub use registry::{PluginFactory, PluginInfo, PluginRegistry, StaticPluginRegistry};

/// Prelude
pub mod prelude {
    pub use crate::error::{PluginError, PluginResult};
    pub use crate::loader::{LoadOutcome, LoadedPlugin, PluginLoader};
    pub use crate::meta::{PluginLinkage, PluginMeta};
    pub use crate::plugin::{HostLink, Plugin};
    pub use crate::registry::StaticPluginRegistry;
    pub use void_services::HostHandle;
}
