//! Host configuration
//!
//! # Configuration Sources (in priority order)
//!
//! 1. Environment variables (`VOID_PLUGIN_DIR`, `VOID_ASSET_ROOTS`,
//!    `VOID_LOGS_DIR`, `VOID_PLUGINS`, `VOID_FIXED_STEP`, `VOID_MAX_SUB_STEPS`)
//! 2. `void.toml` in the working directory
//! 3. Defaults
//!
//! # Example Config File
//!
//! ```toml
//! fixed_time_step = 0.02
//! max_sub_steps = 4
//! plugin_directory = "plugins"
//! asset_roots = ["assets", "../shared/assets"]
//! requested_plugins = ["sdl_windowing", "opengl_rendering"]
//! ```

use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ServiceError, ServiceResult};

/// File looked up by [`HostConfig::load`]
pub const CONFIG_FILE_NAME: &str = "void.toml";

/// Process-wide settings supplied at host construction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Seconds per fixed update
    pub fixed_time_step: f32,
    /// Fixed updates allowed per tick
    pub max_sub_steps: u32,
    pub plugin_directory: PathBuf,
    /// Searched in order for relative asset paths
    pub asset_roots: Vec<PathBuf>,
    pub logs_directory: PathBuf,
    pub working_directory: PathBuf,
    /// Plugins to load with their dependencies; empty loads everything discovered
    pub requested_plugins: Vec<String>,
    /// Seconds between unused-asset sweeps
    pub asset_clean_interval_secs: f64,
    /// Upper bound for a frame delta
    pub max_delta_time: f64,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            fixed_time_step: 0.016,
            max_sub_steps: 8,
            plugin_directory: PathBuf::from("plugins"),
            asset_roots: vec![PathBuf::from("assets")],
            logs_directory: PathBuf::from("logs"),
            working_directory: PathBuf::from("."),
            requested_plugins: Vec::new(),
            asset_clean_interval_secs: 30.0,
            max_delta_time: 0.25,
        }
    }
}

impl HostConfig {
    /// Load from `void.toml` in the working directory, then apply
    /// environment overrides
    pub fn load() -> ServiceResult<Self> {
        let path = Path::new(CONFIG_FILE_NAME);
        let mut config = if path.exists() {
            let config = Self::load_from_file(path)?;
            log::info!("Loaded host config from {}", path.display());
            config
        } else {
            Self::default()
        };

        config.apply_overrides(|key| env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Parse a TOML file. Missing keys keep their defaults.
    pub fn load_from_file(path: impl AsRef<Path>) -> ServiceResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Apply `VOID_*` overrides read through `lookup`. Unparsable values are
    /// logged and ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup("VOID_PLUGIN_DIR").filter(|v| !v.is_empty()) {
            self.plugin_directory = PathBuf::from(dir);
        }

        if let Some(roots) = lookup("VOID_ASSET_ROOTS").filter(|v| !v.is_empty()) {
            self.asset_roots = env::split_paths(&roots).collect();
        }

        if let Some(dir) = lookup("VOID_LOGS_DIR").filter(|v| !v.is_empty()) {
            self.logs_directory = PathBuf::from(dir);
        }

        if let Some(plugins) = lookup("VOID_PLUGINS") {
            self.requested_plugins = plugins
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(String::from)
                .collect();
            log::info!("Requested plugins from env: {:?}", self.requested_plugins);
        }

        if let Some(step) = lookup("VOID_FIXED_STEP") {
            match step.parse() {
                Ok(step) => self.fixed_time_step = step,
                Err(_) => log::warn!("Ignoring VOID_FIXED_STEP={}", step),
            }
        }

        if let Some(steps) = lookup("VOID_MAX_SUB_STEPS") {
            match steps.parse() {
                Ok(steps) => self.max_sub_steps = steps,
                Err(_) => log::warn!("Ignoring VOID_MAX_SUB_STEPS={}", steps),
            }
        }
    }

    /// Reject settings the scheduler cannot run with
    pub fn validate(&self) -> ServiceResult<()> {
        if !self.fixed_time_step.is_finite() || self.fixed_time_step <= 0.0 {
            return Err(ServiceError::InvalidConfig(format!(
                "fixed_time_step must be positive, got {}",
                self.fixed_time_step
            )));
        }
        if self.max_sub_steps == 0 {
            return Err(ServiceError::InvalidConfig("max_sub_steps must be at least 1".into()));
        }
        if !self.max_delta_time.is_finite() || self.max_delta_time <= 0.0 {
            return Err(ServiceError::InvalidConfig(format!(
                "max_delta_time must be positive, got {}",
                self.max_delta_time
            )));
        }
        if self.asset_clean_interval_secs.is_nan() || self.asset_clean_interval_secs < 0.0 {
            return Err(ServiceError::InvalidConfig(format!(
                "asset_clean_interval_secs must not be negative, got {}",
                self.asset_clean_interval_secs
            )));
        }
        Ok(())
    }

    /// `path` resolved against the working directory
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.working_directory.join(path)
        }
    }
}
