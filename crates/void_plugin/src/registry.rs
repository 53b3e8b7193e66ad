//! Plugin registries
//!
//! [`StaticPluginRegistry`] maps names to factories for plugins compiled
//! into the host. [`PluginRegistry`] tracks which plugins are live, in load
//! order, so other code can ask what is running.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use void_core::Version;

use crate::meta::PluginMeta;
use crate::plugin::PluginBox;

/// Builds a fresh static plugin
pub type PluginFactory = Arc<dyn Fn() -> PluginBox + Send + Sync>;

/// Factories for statically linked plugins, keyed by lowercase name
#[derive(Clone, Default)]
pub struct StaticPluginRegistry {
    factories: HashMap<String, PluginFactory>,
}

impl StaticPluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory. Returns false (and keeps the first) when the name
    /// is taken.
    pub fn register<F>(&mut self, name: &str, factory: F) -> bool
    where
        F: Fn() -> PluginBox + Send + Sync + 'static,
    {
        let key = name.to_lowercase();
        if self.factories.contains_key(&key) {
            log::warn!("Static plugin '{}' already registered", name);
            return false;
        }
        self.factories.insert(key, Arc::new(factory));
        true
    }

    /// Register a `Default` plugin type
    pub fn register_default<P>(&mut self, name: &str) -> bool
    where
        P: crate::Plugin + Default + 'static,
    {
        self.register(name, || Box::new(P::default()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(&name.to_lowercase())
    }

    /// Build the plugin registered under `name`
    pub fn create(&self, name: &str) -> Option<PluginBox> {
        self.factories.get(&name.to_lowercase()).map(|factory| factory())
    }

    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }
}

impl std::fmt::Debug for StaticPluginRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<_> = self.factories.keys().collect();
        names.sort();
        f.debug_struct("StaticPluginRegistry").field("plugins", &names).finish()
    }
}

/// Summary of a live plugin
#[derive(Debug, Clone, PartialEq)]
pub struct PluginInfo {
    pub name: String,
    pub version: Version,
    pub plugin_type: String,
    pub is_static: bool,
}

impl From<&PluginMeta> for PluginInfo {
    fn from(meta: &PluginMeta) -> Self {
        Self {
            name: meta.name.clone(),
            version: meta.version,
            plugin_type: meta.plugin_type.clone(),
            is_static: meta.is_static(),
        }
    }
}

/// Live plugins in load order. Cheap to clone; clones share state.
#[derive(Debug, Clone, Default)]
pub struct PluginRegistry {
    plugins: Arc<RwLock<Vec<PluginInfo>>>,
}

impl PluginRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a plugin as live. False when the name is already live.
    pub fn register(&self, meta: &PluginMeta) -> bool {
        let mut plugins = self.plugins.write();
        if plugins.iter().any(|p| p.name.eq_ignore_ascii_case(&meta.name)) {
            return false;
        }
        plugins.push(PluginInfo::from(meta));
        true
    }

    pub fn unregister(&self, name: &str) -> bool {
        let mut plugins = self.plugins.write();
        let before = plugins.len();
        plugins.retain(|p| !p.name.eq_ignore_ascii_case(name));
        plugins.len() != before
    }

    pub fn contains(&self, name: &str) -> bool {
        self.plugins.read().iter().any(|p| p.name.eq_ignore_ascii_case(name))
    }

    pub fn find(&self, name: &str) -> Option<PluginInfo> {
        self.plugins
            .read()
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
            .cloned()
    }

    /// Names in load order
    pub fn names(&self) -> Vec<String> {
        self.plugins.read().iter().map(|p| p.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.plugins.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.read().is_empty()
    }
}
