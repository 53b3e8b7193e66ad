//! Plugin manifests
//!
//! Each plugin ships a JSON manifest (`<name>.meta` or `plugin.meta`) next
//! to its module:
//!
//! ```json
//! {
//!   "name": "opengl_rendering",
//!   "version": "0.3.0",
//!   "description": "OpenGL backend",
//!   "type": "system",
//!   "dependencies": ["sdl_windowing"],
//!   "linkage": "dynamic",
//!   "module": "opengl_rendering.dll"
//! }
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use void_core::Version;

use crate::error::{PluginError, PluginFailure, PluginResult};

/// File name accepted regardless of extension case
pub const MANIFEST_FILE_NAME: &str = "plugin.meta";

/// Subtrees never scanned for manifests
pub const RESOURCES_DIRECTORY: &str = "resources";

/// Type tag applied when a manifest omits `type`
pub const DEFAULT_PLUGIN_TYPE: &str = "user";

/// How a plugin's code reaches the process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PluginLinkage {
    /// Shared library opened at load time
    #[default]
    Dynamic,
    /// Compiled into the host and registered by name
    Static,
}

/// Parsed manifest
#[derive(Debug, Clone, PartialEq)]
pub struct PluginMeta {
    pub name: String,
    pub version: Version,
    pub description: String,
    /// Free-form type tag; see [`PluginMeta::type_rank`]
    pub plugin_type: String,
    /// Names or type tags this plugin needs loaded first
    pub dependencies: Vec<String>,
    pub linkage: PluginLinkage,
    pub manifest_path: PathBuf,
    pub root_directory: PathBuf,
    /// Module as written in the manifest, joined to the root directory
    pub module_path: PathBuf,
}

impl PluginMeta {
    /// A static plugin description, as used by hosts that link plugins in
    pub fn new_static(name: impl Into<String>, plugin_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: Version::new(0, 1, 0),
            description: String::new(),
            plugin_type: plugin_type.into(),
            dependencies: Vec::new(),
            linkage: PluginLinkage::Static,
            manifest_path: PathBuf::new(),
            root_directory: PathBuf::new(),
            module_path: PathBuf::new(),
        }
    }

    pub fn with_dependency(mut self, dependency: impl Into<String>) -> Self {
        self.dependencies.push(dependency.into());
        self
    }

    /// Ordering rank: loggers, then loaders, then systems, then everything else
    pub fn type_rank(&self) -> u8 {
        let tag = self.plugin_type.to_lowercase();
        if tag.contains("logger") {
            0
        } else if tag.contains("loader") {
            1
        } else if tag.contains("system") {
            2
        } else {
            3
        }
    }

    pub fn is_static(&self) -> bool {
        self.linkage == PluginLinkage::Static
    }

    /// Shared library to open for a dynamic plugin
    ///
    /// A directory gets the plugin name appended; a path without an
    /// extension gets the platform library naming.
    pub fn resolve_module_path(&self) -> PathBuf {
        let mut module = if self.module_path.as_os_str().is_empty() {
            self.root_directory.clone()
        } else {
            self.module_path.clone()
        };

        if module.as_os_str().is_empty() || module.is_dir() {
            module.push(&self.name);
        }

        if module.extension().is_none() {
            module = platform_library_path(&module);
        }
        module
    }
}

impl std::fmt::Display for PluginMeta {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} v{}", self.name, self.version)
    }
}

/// `dir/name` → `dir/name.dll`, `dir/libname.so` or `dir/libname.dylib`
fn platform_library_path(module: &Path) -> PathBuf {
    let stem = module
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let file = if stem.starts_with(std::env::consts::DLL_PREFIX) {
        format!("{}{}", stem, std::env::consts::DLL_SUFFIX)
    } else {
        format!("{}{}{}", std::env::consts::DLL_PREFIX, stem, std::env::consts::DLL_SUFFIX)
    };
    module.with_file_name(file)
}

/// Raw manifest as it appears on disk
#[derive(Debug, Deserialize)]
struct RawPluginMeta {
    name: Option<String>,
    version: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(rename = "type", default)]
    plugin_type: Option<String>,
    #[serde(default)]
    dependencies: Vec<String>,
    #[serde(default)]
    linkage: Option<String>,
    #[serde(rename = "static", default)]
    is_static: Option<bool>,
    #[serde(default)]
    module: Option<String>,
}

fn required(value: Option<String>, field: &str, path: &Path) -> PluginResult<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| PluginError::invalid_manifest(path, format!("missing required field '{}'", field)))
}

/// Parse manifest text. `manifest_path` anchors relative module paths.
pub fn parse_plugin_meta(text: &str, manifest_path: &Path) -> PluginResult<PluginMeta> {
    let raw: RawPluginMeta =
        serde_json::from_str(text).map_err(|e| PluginError::invalid_manifest(manifest_path, e.to_string()))?;

    let name = required(raw.name, "name", manifest_path)?;
    let version_text = required(raw.version, "version", manifest_path)?;
    let version = Version::parse(&version_text)
        .map_err(|e| PluginError::invalid_manifest(manifest_path, e.to_string()))?;

    let linkage = match (raw.linkage.as_deref().map(str::trim), raw.is_static) {
        (Some(linkage), _) if linkage.eq_ignore_ascii_case("static") => PluginLinkage::Static,
        (Some(linkage), _) if linkage.eq_ignore_ascii_case("dynamic") => PluginLinkage::Dynamic,
        (Some(other), _) => {
            return Err(PluginError::invalid_manifest(
                manifest_path,
                format!("unknown linkage '{}'", other),
            ))
        }
        (None, Some(true)) => PluginLinkage::Static,
        (None, _) => PluginLinkage::Dynamic,
    };

    let root_directory = manifest_path.parent().map(Path::to_path_buf).unwrap_or_default();

    let module = raw.module.map(|m| m.trim().to_string()).filter(|m| !m.is_empty());
    let module_path = match module {
        Some(module) => {
            let module = PathBuf::from(module);
            if module.is_absolute() {
                module
            } else {
                root_directory.join(module)
            }
        }
        None if linkage == PluginLinkage::Dynamic => {
            return Err(PluginError::invalid_manifest(
                manifest_path,
                "missing required field 'module'",
            ))
        }
        None => root_directory.clone(),
    };

    let plugin_type = raw
        .plugin_type
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| DEFAULT_PLUGIN_TYPE.to_string());

    Ok(PluginMeta {
        name,
        version,
        description: raw.description.map(|d| d.trim().to_string()).unwrap_or_default(),
        plugin_type,
        dependencies: raw
            .dependencies
            .into_iter()
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .collect(),
        linkage,
        manifest_path: manifest_path.to_path_buf(),
        root_directory,
        module_path,
    })
}

/// Read and parse a manifest file
pub fn read_plugin_meta(path: &Path) -> PluginResult<PluginMeta> {
    let text = fs::read_to_string(path).map_err(|source| PluginError::ManifestIo {
        path: path.to_path_buf(),
        source,
    })?;
    parse_plugin_meta(&text, path)
}

fn is_manifest(path: &Path) -> bool {
    let extension = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("meta"))
        .unwrap_or(false);
    let named = path
        .file_name()
        .map(|name| name.to_string_lossy().eq_ignore_ascii_case(MANIFEST_FILE_NAME))
        .unwrap_or(false);
    extension || named
}

fn collect_manifests(directory: &Path, found: &mut Vec<PathBuf>) {
    let entries = match fs::read_dir(directory) {
        Ok(entries) => entries,
        Err(e) => {
            log::warn!("Cannot scan {}: {}", directory.display(), e);
            return;
        }
    };

    let mut paths: Vec<PathBuf> = entries.filter_map(|entry| entry.ok().map(|e| e.path())).collect();
    paths.sort();

    for path in paths {
        if path.is_dir() {
            let skipped = path
                .file_name()
                .map(|name| name.to_string_lossy().eq_ignore_ascii_case(RESOURCES_DIRECTORY))
                .unwrap_or(false);
            if !skipped {
                collect_manifests(&path, found);
            }
        } else if is_manifest(&path) {
            found.push(path);
        }
    }
}

/// Manifests found under a directory plus the ones that were rejected
#[derive(Debug, Default)]
pub struct Discovery {
    pub plugins: Vec<PluginMeta>,
    pub failures: Vec<PluginFailure>,
}

/// Walk `directory` for manifests, skipping `resources` subtrees
///
/// Unreadable manifests and second declarations of a name are reported as
/// failures; the rest are returned in path order.
pub fn discover_plugins(directory: &Path) -> Discovery {
    let mut discovery = Discovery::default();
    if !directory.is_dir() {
        log::warn!("Plugin directory {} does not exist", directory.display());
        return discovery;
    }

    let mut manifests = Vec::new();
    collect_manifests(directory, &mut manifests);

    let mut seen: HashMap<String, PathBuf> = HashMap::new();
    for path in manifests {
        let meta = match read_plugin_meta(&path) {
            Ok(meta) => meta,
            Err(e) => {
                log::error!("Plugin {} is unable to be loaded: {}", path.display(), e);
                let name = path
                    .file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
                    .unwrap_or_default();
                discovery.failures.push(PluginFailure::new(name, e));
                continue;
            }
        };

        let key = meta.name.to_lowercase();
        if let Some(first) = seen.get(&key) {
            let error = PluginError::DuplicateName {
                name: meta.name.clone(),
                first: first.clone(),
                second: path.clone(),
            };
            log::error!("{}", error);
            discovery.failures.push(PluginFailure::new(meta.name, error));
            continue;
        }

        log::debug!("Discovered plugin {} at {}", meta, path.display());
        seen.insert(key, path);
        discovery.plugins.push(meta);
    }

    discovery
}

#[cfg(test)]
mod tests {
    use super::*;
    use void_core::ErrorKind;

    #[test]
    fn test_parse_full_manifest() {
        let text = r#"{
            "name": " opengl_rendering ",
            "version": "0.3.0",
            "description": "OpenGL backend",
            "type": "system",
            "dependencies": ["sdl_windowing", ""],
            "linkage": "dynamic",
            "module": "opengl_rendering.dll",
            "author": "ignored"
        }"#;
        let meta = parse_plugin_meta(text, Path::new("plugins/gl/gl.meta")).unwrap();
        assert_eq!(meta.name, "opengl_rendering");
        assert_eq!(meta.version, Version::new(0, 3, 0));
        assert_eq!(meta.plugin_type, "system");
        assert_eq!(meta.dependencies, vec!["sdl_windowing"]);
        assert_eq!(meta.linkage, PluginLinkage::Dynamic);
        assert_eq!(meta.root_directory, PathBuf::from("plugins/gl"));
        assert_eq!(meta.module_path, PathBuf::from("plugins/gl/opengl_rendering.dll"));
        assert_eq!(meta.resolve_module_path(), meta.module_path);
    }

    #[test]
    fn test_defaults_and_static_flag() {
        let meta = parse_plugin_meta(r#"{"name": "logger", "version": "1", "static": true}"#, Path::new("x/logger.meta"))
            .unwrap();
        assert!(meta.is_static());
        assert_eq!(meta.plugin_type, DEFAULT_PLUGIN_TYPE);
        assert_eq!(meta.type_rank(), 3);

        let meta = parse_plugin_meta(
            r#"{"name": "a", "version": "1.0.0", "linkage": "Static", "type": "asset_loader"}"#,
            Path::new("a.meta"),
        )
        .unwrap();
        assert!(meta.is_static());
        assert_eq!(meta.type_rank(), 1);
    }

    #[test]
    fn test_missing_fields_rejected() {
        let err = parse_plugin_meta(r#"{"version": "1.0.0", "module": "a"}"#, Path::new("a.meta")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(err.to_string().contains("'name'"));

        let err = parse_plugin_meta(r#"{"name": "a", "version": "1.0.0"}"#, Path::new("a.meta")).unwrap_err();
        assert!(err.to_string().contains("'module'"));

        assert!(parse_plugin_meta(r#"{"name": "a", "version": "1.0", "linkage": "weird", "module": "a"}"#, Path::new("a.meta")).is_err());
        assert!(parse_plugin_meta("not json", Path::new("a.meta")).is_err());
    }

    #[test]
    fn test_platform_naming() {
        let meta = parse_plugin_meta(r#"{"name": "physics", "version": "1", "module": "bin/physics"}"#, Path::new("p/physics.meta"))
            .unwrap();
        let resolved = meta.resolve_module_path();
        let file = resolved.file_name().unwrap().to_string_lossy().into_owned();
        assert!(file.ends_with(std::env::consts::DLL_SUFFIX));
        assert!(file.contains("physics"));
        assert_eq!(resolved.parent().unwrap(), Path::new("p/bin"));
    }

    #[test]
    fn test_type_rank_order() {
        let rank = |tag: &str| PluginMeta::new_static("p", tag).type_rank();
        assert!(rank("logger") < rank("loader"));
        assert!(rank("loader") < rank("system"));
        assert!(rank("system") < rank("user"));
        assert_eq!(rank("FileLogger"), 0);
    }
}
