//! Error types for plugin discovery and loading

use std::path::PathBuf;
use thiserror::Error;
use void_core::{EngineError, ErrorKind};

/// Result type for plugin operations
pub type PluginResult<T> = std::result::Result<T, PluginError>;

/// Errors raised while discovering, ordering, loading or driving plugins
#[derive(Debug, Error)]
pub enum PluginError {
    /// Manifest could not be read
    #[error("Failed to read manifest '{path}': {source}")]
    ManifestIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Manifest is not valid JSON or has the wrong shape
    #[error("Invalid manifest '{path}': {message}")]
    InvalidManifest {
        path: PathBuf,
        message: String,
    },

    /// Two manifests declare the same plugin name
    #[error("Plugin '{name}' declared twice ('{first}' and '{second}')")]
    DuplicateName {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },

    /// A dependency token matches no discovered plugin
    #[error("Plugin '{plugin}' depends on unknown plugin '{dependency}'")]
    MissingDependency {
        plugin: String,
        dependency: String,
    },

    /// A dependency was found but did not load
    #[error("Plugin '{plugin}' skipped because dependency '{dependency}' failed")]
    DependencyFailed {
        plugin: String,
        dependency: String,
    },

    /// Dependency graph contains a cycle
    #[error("Circular plugin dependency between: {}", .0.join(", "))]
    CircularDependency(Vec<String>),

    /// Failed to open a dynamic library
    #[error("Failed to load library '{path}': {message}")]
    LoadError {
        path: PathBuf,
        message: String,
    },

    /// Library does not export a required symbol
    #[error("Symbol '{symbol}' not found in library '{library}'")]
    SymbolNotFound {
        library: String,
        symbol: String,
    },

    /// `create_<name>` returned null
    #[error("Plugin factory for '{0}' returned null")]
    NullInstance(String),

    /// Static plugin named by a manifest has no registered factory
    #[error("Static plugin '{0}' is not registered")]
    StaticNotRegistered(String),

    /// Plugin already attached once
    #[error("Plugin '{0}' is already attached")]
    AlreadyAttached(String),

    /// Plugin never attached or already detached
    #[error("Plugin '{0}' is not attached")]
    NotAttached(String),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl PluginError {
    pub fn load_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::LoadError {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn symbol_not_found(library: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self::SymbolNotFound {
            library: library.into(),
            symbol: symbol.into(),
        }
    }

    pub fn invalid_manifest(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::InvalidManifest {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Classification in the engine taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            PluginError::ManifestIo { source, .. } if source.kind() == std::io::ErrorKind::NotFound => {
                ErrorKind::NotFound
            }
            PluginError::MissingDependency { .. } | PluginError::StaticNotRegistered(_) => ErrorKind::NotFound,
            PluginError::InvalidManifest { .. }
            | PluginError::AlreadyAttached(_)
            | PluginError::NotAttached(_) => ErrorKind::InvalidArgument,
            PluginError::CircularDependency(_) => ErrorKind::CircularDependency,
            PluginError::ManifestIo { .. }
            | PluginError::DuplicateName { .. }
            | PluginError::DependencyFailed { .. }
            | PluginError::LoadError { .. }
            | PluginError::SymbolNotFound { .. }
            | PluginError::NullInstance(_) => ErrorKind::LoadFailure,
            PluginError::Engine(e) => e.kind(),
        }
    }
}

/// A plugin that was dropped from a load, with the reason
#[derive(Debug)]
pub struct PluginFailure {
    pub name: String,
    pub error: PluginError,
}

impl PluginFailure {
    pub fn new(name: impl Into<String>, error: PluginError) -> Self {
        Self {
            name: name.into(),
            error,
        }
    }
}

impl std::fmt::Display for PluginFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.name, self.error)
    }
}
