//! Plugin loader
//!
//! Discovers manifests, orders them by dependency, builds each plugin
//! (from a module or a static factory), registers it and attaches it to the
//! host. Unloading runs the same steps backwards.

use std::path::Path;

use void_core::DeltaTime;
use void_event::Message;
use void_services::HostHandle;

use crate::error::{PluginError, PluginFailure, PluginResult};
use crate::library::PluginLibrary;
use crate::meta::{discover_plugins, Discovery, PluginMeta};
use crate::order::{resolve_load_order, select_requested, LoadOrder};
use crate::plugin::PluginInstance;
use crate::registry::{PluginRegistry, StaticPluginRegistry};

/// A plugin that loaded and attached
///
/// Field order matters: the instance drops before the module that holds
/// its code.
pub struct LoadedPlugin {
    meta: PluginMeta,
    instance: PluginInstance,
    library: Option<PluginLibrary>,
}

impl LoadedPlugin {
    pub fn meta(&self) -> &PluginMeta {
        &self.meta
    }

    pub fn name(&self) -> &str {
        &self.meta.name
    }

    pub fn is_dynamic(&self) -> bool {
        self.library.is_some()
    }

    pub fn is_attached(&self) -> bool {
        self.instance.is_attached()
    }

    pub fn instance_mut(&mut self) -> &mut PluginInstance {
        &mut self.instance
    }

    pub fn update(&mut self, dt: &DeltaTime) {
        self.instance.update(dt);
    }

    pub fn fixed_update(&mut self, dt: &DeltaTime) {
        self.instance.fixed_update(dt);
    }

    /// Deliver a message to this plugin only
    pub fn receive_message(&mut self, message: &mut dyn Message) {
        self.instance.receive_message(message);
    }

    /// Detach if still attached
    pub fn detach(&mut self) -> PluginResult<()> {
        if self.instance.is_attached() {
            self.instance.detach()?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for LoadedPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedPlugin")
            .field("meta", &self.meta.to_string())
            .field("attached", &self.is_attached())
            .field("library", &self.library)
            .finish()
    }
}

impl std::fmt::Display for LoadedPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Name={}, Version={}", self.meta.name, self.meta.version)
    }
}

/// What a load produced
#[derive(Debug, Default)]
pub struct LoadOutcome {
    /// Attached plugins in load order
    pub loaded: Vec<LoadedPlugin>,
    pub failures: Vec<PluginFailure>,
}

impl LoadOutcome {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Whether `name` is among the failures
    pub fn failed(&self, name: &str) -> bool {
        self.failures.iter().any(|f| f.name.eq_ignore_ascii_case(name))
    }

    pub fn loaded_names(&self) -> Vec<&str> {
        self.loaded.iter().map(LoadedPlugin::name).collect()
    }
}

/// Loads and unloads plugins for a host
#[derive(Debug, Default)]
pub struct PluginLoader {
    statics: StaticPluginRegistry,
    registry: PluginRegistry,
}

impl PluginLoader {
    pub fn new(statics: StaticPluginRegistry) -> Self {
        Self {
            statics,
            registry: PluginRegistry::new(),
        }
    }

    pub fn statics(&self) -> &StaticPluginRegistry {
        &self.statics
    }

    pub fn statics_mut(&mut self) -> &mut StaticPluginRegistry {
        &mut self.statics
    }

    /// Live plugins
    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    /// Discover manifests under `directory` (relative paths resolve against
    /// `working_directory`), keep the requested ones plus their
    /// dependencies, then load them in order
    pub fn load_plugins(
        &self,
        directory: &Path,
        requested: &[String],
        working_directory: &Path,
        host: &HostHandle,
    ) -> LoadOutcome {
        let directory = if directory.is_absolute() {
            directory.to_path_buf()
        } else {
            working_directory.join(directory)
        };

        log::info!("Loading plugins from {}", directory.display());
        let Discovery { plugins, failures } = discover_plugins(&directory);
        let selected = select_requested(plugins, requested);

        let mut outcome = self.load_metas(selected, host);
        let mut all_failures = failures;
        all_failures.append(&mut outcome.failures);
        outcome.failures = all_failures;
        outcome
    }

    /// Order and load already parsed manifests
    pub fn load_metas(&self, metas: Vec<PluginMeta>, host: &HostHandle) -> LoadOutcome {
        let LoadOrder { ordered, failures } = resolve_load_order(metas);
        let mut outcome = LoadOutcome {
            loaded: Vec::with_capacity(ordered.len()),
            failures,
        };

        // Lowercase names and type tags of plugins that failed while loading
        let mut failed: Vec<(String, String)> = Vec::new();

        for meta in ordered {
            let blocked = meta.dependencies.iter().find_map(|token| {
                let token = token.to_lowercase();
                failed
                    .iter()
                    .find(|(name, tag)| *name == token || *tag == token)
                    .map(|(name, _)| name.clone())
            });
            if let Some(dependency) = blocked {
                let error = PluginError::DependencyFailed {
                    plugin: meta.name.clone(),
                    dependency,
                };
                log::error!("{}", error);
                failed.push((meta.name.to_lowercase(), meta.plugin_type.to_lowercase()));
                outcome.failures.push(PluginFailure::new(meta.name.clone(), error));
                continue;
            }

            match self.load_one(meta.clone(), host) {
                Ok(loaded) => outcome.loaded.push(loaded),
                Err(error) => {
                    log::error!("Plugin {} failed to load: {}", meta, error);
                    failed.push((meta.name.to_lowercase(), meta.plugin_type.to_lowercase()));
                    outcome.failures.push(PluginFailure::new(meta.name, error));
                }
            }
        }

        log::info!(
            "Loaded {} plugin(s), {} failure(s)",
            outcome.loaded.len(),
            outcome.failures.len()
        );
        outcome
    }

    fn load_one(&self, meta: PluginMeta, host: &HostHandle) -> PluginResult<LoadedPlugin> {
        if self.registry.contains(&meta.name) {
            return Err(PluginError::load_error(&meta.manifest_path, format!("{} is already loaded", meta.name)));
        }

        let (instance, library) = if meta.is_static() {
            let plugin = self
                .statics
                .create(&meta.name)
                .ok_or_else(|| PluginError::StaticNotRegistered(meta.name.clone()))?;
            (PluginInstance::owned(meta.name.clone(), plugin), None)
        } else {
            let library = PluginLibrary::open(meta.resolve_module_path())?;
            let instance = library.instantiate(&meta.name)?;
            (instance, Some(library))
        };

        self.registry.register(&meta);
        let mut loaded = LoadedPlugin {
            meta,
            instance,
            library,
        };
        log::info!("Loaded plugin: {}", loaded.meta);

        if let Err(error) = loaded.instance.attach(host) {
            self.registry.unregister(&loaded.meta.name);
            return Err(error);
        }
        Ok(loaded)
    }

    /// Detach and destroy plugins in reverse load order, closing each module
    /// after its instance is gone
    pub fn unload_plugins(&self, loaded: Vec<LoadedPlugin>) {
        for plugin in loaded.into_iter().rev() {
            self.unload_plugin(plugin);
        }
    }

    /// Detach, destroy and unregister one plugin, then close its module
    pub fn unload_plugin(&self, plugin: LoadedPlugin) {
        let LoadedPlugin {
            meta,
            mut instance,
            library,
        } = plugin;

        log::info!("Unloading plugin: {}", meta);
        if instance.is_attached() {
            if let Err(error) = instance.detach() {
                log::warn!("{}", error);
            }
        }
        drop(instance);
        self.registry.unregister(&meta.name);

        if let Some(library) = library {
            if let Err(error) = library.close() {
                log::warn!("{}", error);
            }
        }
    }
}
