//! Path normalization and the path/id registry
//!
//! Every asset path is normalized lexically to a forward-slash string whose
//! hash is the record's `path_key`. A sibling `<asset>.meta` sidecar may
//! assign a stable id; otherwise the id is the path key.

use std::collections::HashMap;
use std::fs;
use std::path::{Component, Path, PathBuf};

use void_core::{EngineError, EngineResult, Uuid};

use crate::handle::AssetHandle;

/// Sidecar suffix appended to an asset file name
pub const META_EXTENSION: &str = "meta";

/// A known asset location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRegistryEntry {
    pub resolved_path: PathBuf,
    pub normalized_path: String,
    pub path_key: Uuid,
    pub id: Uuid,
}

/// Two-way map of asset paths and ids
#[derive(Debug, Default)]
pub struct AssetRegistry {
    roots: Vec<PathBuf>,
    entries: HashMap<Uuid, AssetRegistryEntry>,
    ids: HashMap<Uuid, Uuid>,
}

impl AssetRegistry {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self {
            roots,
            entries: HashMap::new(),
            ids: HashMap::new(),
        }
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry for `handle`. Paths register on first sight; unknown ids fail.
    pub fn resolve(&mut self, handle: &AssetHandle) -> EngineResult<AssetRegistryEntry> {
        match handle {
            AssetHandle::Path(path) => Ok(self.register_path(path).clone()),
            AssetHandle::Id(id) => self
                .find_id(*id)
                .cloned()
                .ok_or_else(|| EngineError::not_found(format!("asset id {}", id))),
        }
    }

    /// Entry for `handle` without registering anything
    pub fn lookup(&self, handle: &AssetHandle) -> Option<&AssetRegistryEntry> {
        match handle {
            AssetHandle::Path(path) => {
                let resolved = self.resolve_path(path);
                let key = Uuid::from_name(&normalize_path(&resolved));
                self.entries.get(&key)
            }
            AssetHandle::Id(id) => self.find_id(*id),
        }
    }

    /// Register `path` (idempotent) and return its entry
    pub fn register_path(&mut self, path: &Path) -> &AssetRegistryEntry {
        let resolved_path = self.resolve_path(path);
        let normalized_path = normalize_path(&resolved_path);
        let path_key = Uuid::from_name(&normalized_path);

        if !self.entries.contains_key(&path_key) {
            let mut id = read_sidecar_id(&resolved_path).unwrap_or(path_key);
            if let Some(existing) = self.ids.get(&id) {
                if *existing != path_key {
                    log::warn!(
                        "Asset id {} of '{}' already belongs to another asset; using its path key",
                        id,
                        normalized_path
                    );
                    id = path_key;
                }
            }
            self.ids.insert(id, path_key);
            self.ids.entry(path_key).or_insert(path_key);
            self.entries.insert(
                path_key,
                AssetRegistryEntry {
                    resolved_path,
                    normalized_path,
                    path_key,
                    id,
                },
            );
        }

        &self.entries[&path_key]
    }

    /// Register every asset that has a sidecar under the roots
    pub fn discover(&mut self) -> usize {
        let mut found = Vec::new();
        for root in self.roots.clone() {
            if let Err(e) = collect_sidecars(&root, &mut found) {
                log::warn!("Failed to scan asset root {:?}: {}", root, e);
            }
        }

        let before = self.entries.len();
        for asset in found {
            self.register_path(&asset);
        }
        self.entries.len() - before
    }

    fn find_id(&self, id: Uuid) -> Option<&AssetRegistryEntry> {
        self.ids.get(&id).and_then(|key| self.entries.get(key))
    }

    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            return path.to_path_buf();
        }
        for root in &self.roots {
            let candidate = root.join(path);
            if candidate.exists() {
                return candidate;
            }
        }
        match self.roots.first() {
            Some(root) => root.join(path),
            None => path.to_path_buf(),
        }
    }
}

/// Lexically normal, forward-slash form; lowercased where the filesystem
/// ignores case
pub fn normalize_path(path: &Path) -> String {
    let mut parts: Vec<String> = Vec::new();
    let mut prefix = String::new();

    for component in path.components() {
        match component {
            Component::Prefix(p) => prefix = p.as_os_str().to_string_lossy().into_owned(),
            Component::RootDir => prefix.push('/'),
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(parts.last(), Some(last) if last != "..") {
                    parts.pop();
                } else if prefix.is_empty() {
                    parts.push("..".to_string());
                }
            }
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
        }
    }

    let mut normalized = prefix.replace('\\', "/");
    normalized.push_str(&parts.join("/"));
    if cfg!(any(windows, target_os = "macos")) {
        normalized = normalized.to_lowercase();
    }
    normalized
}

/// `<asset>.meta`
pub fn sidecar_path(asset: &Path) -> PathBuf {
    let mut sidecar = asset.as_os_str().to_owned();
    sidecar.push(".");
    sidecar.push(META_EXTENSION);
    PathBuf::from(sidecar)
}

/// Id declared by the sidecar of `asset`, if any
pub fn read_sidecar_id(asset: &Path) -> Option<Uuid> {
    let text = fs::read_to_string(sidecar_path(asset)).ok()?;
    parse_sidecar_id(&text)
}

/// Parse a sidecar body. JSON `{"id": ...}` bodies accept a hex u32 or a
/// hyphenated uuid; otherwise the first hex token is read as a u32.
/// Zero and unparsable ids yield `None`.
pub fn parse_sidecar_id(text: &str) -> Option<Uuid> {
    if let Ok(serde_json::Value::Object(fields)) = serde_json::from_str::<serde_json::Value>(text) {
        let id = match fields.get("id")? {
            serde_json::Value::String(id) => parse_id_text(id),
            serde_json::Value::Number(number) => number
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .map(Uuid::from_u32),
            _ => None,
        };
        return id.filter(Uuid::is_valid);
    }

    // Plain text: the first whitespace-delimited token that is an id on its own
    text.split_whitespace()
        .find_map(|token| {
            let digits = token
                .strip_prefix("0x")
                .or_else(|| token.strip_prefix("0X"))
                .unwrap_or(token);
            let is_id = !digits.is_empty()
                && digits.chars().all(|c| c.is_ascii_hexdigit() || c == '-');
            if is_id { parse_id_text(token) } else { None }
        })
        .filter(Uuid::is_valid)
}

fn parse_id_text(text: &str) -> Option<Uuid> {
    let text = text.trim();
    if text.contains('-') {
        return text.parse().ok();
    }
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    u32::from_str_radix(digits, 16).ok().map(Uuid::from_u32)
}

fn collect_sidecars(dir: &Path, found: &mut Vec<PathBuf>) -> std::io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            collect_sidecars(&path, found)?;
        } else if path.extension().map(|ext| ext == META_EXTENSION).unwrap_or(false) {
            found.push(path.with_extension(""));
        }
    }
    Ok(())
}
