//! Dependency resolution and load ordering
//!
//! Dependency tokens name either a plugin or a type tag, compared without
//! case. Ordering is a topological sort; among plugins that are ready at the
//! same time loggers go first, then loaders, then systems, then the rest,
//! each group sorted by name.

use std::cmp::Reverse;
use std::collections::{BTreeSet, BinaryHeap, HashMap, HashSet, VecDeque};

use crate::error::{PluginError, PluginFailure};
use crate::meta::PluginMeta;

/// Result of ordering a set of manifests
#[derive(Debug, Default)]
pub struct LoadOrder {
    /// Plugins in load order; every dependency precedes its dependants
    pub ordered: Vec<PluginMeta>,
    /// Plugins excluded from the order
    pub failures: Vec<PluginFailure>,
}

struct Lookup {
    by_name: HashMap<String, usize>,
    by_type: HashMap<String, Vec<usize>>,
}

impl Lookup {
    fn new(metas: &[PluginMeta]) -> Self {
        let mut by_name = HashMap::new();
        let mut by_type: HashMap<String, Vec<usize>> = HashMap::new();
        for (index, meta) in metas.iter().enumerate() {
            by_name.entry(meta.name.to_lowercase()).or_insert(index);
            if !meta.plugin_type.is_empty() {
                by_type.entry(meta.plugin_type.to_lowercase()).or_default().push(index);
            }
        }
        Self { by_name, by_type }
    }

    /// Plugins a token refers to, excluding `skip`
    fn matches(&self, token: &str, skip: Option<usize>) -> Vec<usize> {
        let needle = token.trim().to_lowercase();
        let mut found = Vec::new();
        if needle.is_empty() {
            return found;
        }
        if let Some(&index) = self.by_name.get(&needle) {
            if Some(index) != skip {
                found.push(index);
            }
        }
        if let Some(indices) = self.by_type.get(&needle) {
            for &index in indices {
                if Some(index) != skip && !found.contains(&index) {
                    found.push(index);
                }
            }
        }
        found
    }
}

/// Keep the requested plugins and everything they transitively depend on.
/// An empty request keeps everything.
pub fn select_requested(discovered: Vec<PluginMeta>, requested: &[String]) -> Vec<PluginMeta> {
    if requested.is_empty() {
        return discovered;
    }

    let lookup = Lookup::new(&discovered);
    let mut selected = HashSet::new();
    let mut pending = VecDeque::new();

    for token in requested {
        let found = lookup.matches(token, None);
        if found.is_empty() {
            log::warn!("Requested plugin '{}' was not discovered", token);
        }
        for index in found {
            if selected.insert(index) {
                pending.push_back(index);
            }
        }
    }

    while let Some(index) = pending.pop_front() {
        for token in &discovered[index].dependencies {
            for dependency in lookup.matches(token, Some(index)) {
                if selected.insert(dependency) {
                    pending.push_back(dependency);
                }
            }
        }
    }

    discovered
        .into_iter()
        .enumerate()
        .filter(|(index, _)| selected.contains(index))
        .map(|(_, meta)| meta)
        .collect()
}

/// Order `metas` so dependencies load first
///
/// Plugins with an unknown dependency, or depending on a plugin that was
/// excluded, are reported and skipped. Plugins caught in a cycle fail with
/// [`PluginError::CircularDependency`]; the rest still load.
pub fn resolve_load_order(metas: Vec<PluginMeta>) -> LoadOrder {
    let count = metas.len();
    let lookup = Lookup::new(&metas);
    let mut failures: Vec<Option<PluginError>> = (0..count).map(|_| None).collect();

    // Resolve tokens to indices
    let mut dependencies: Vec<Vec<usize>> = vec![Vec::new(); count];
    for (index, meta) in metas.iter().enumerate() {
        for token in &meta.dependencies {
            let found = lookup.matches(token, Some(index));
            if found.is_empty() {
                failures[index] = Some(PluginError::MissingDependency {
                    plugin: meta.name.clone(),
                    dependency: token.clone(),
                });
                break;
            }
            for dependency in found {
                if !dependencies[index].contains(&dependency) {
                    dependencies[index].push(dependency);
                }
            }
        }
    }

    // Anything depending on an excluded plugin is excluded too
    loop {
        let mut changed = false;
        for index in 0..count {
            if failures[index].is_some() {
                continue;
            }
            let failed = dependencies[index].iter().copied().find(|&d| failures[d].is_some());
            if let Some(dependency) = failed {
                failures[index] = Some(PluginError::DependencyFailed {
                    plugin: metas[index].name.clone(),
                    dependency: metas[dependency].name.clone(),
                });
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    // Kahn's algorithm over the surviving plugins
    let mut indegree = vec![0usize; count];
    let mut dependants: Vec<Vec<usize>> = vec![Vec::new(); count];
    for index in (0..count).filter(|&i| failures[i].is_none()) {
        for &dependency in &dependencies[index] {
            dependants[dependency].push(index);
            indegree[index] += 1;
        }
    }

    let key = |index: usize| Reverse((metas[index].type_rank(), metas[index].name.to_lowercase(), index));
    let mut ready: BinaryHeap<_> = (0..count)
        .filter(|&i| failures[i].is_none() && indegree[i] == 0)
        .map(key)
        .collect();

    let mut placed = vec![false; count];
    let mut order = Vec::with_capacity(count);
    while let Some(Reverse((_, _, index))) = ready.pop() {
        placed[index] = true;
        order.push(index);
        for &dependant in &dependants[index] {
            indegree[dependant] -= 1;
            if indegree[dependant] == 0 {
                ready.push(key(dependant));
            }
        }
    }

    let blocked: Vec<usize> = (0..count).filter(|&i| failures[i].is_none() && !placed[i]).collect();
    if !blocked.is_empty() {
        mark_cycles(&metas, &dependencies, &blocked, &mut failures);
    }

    let mut result = LoadOrder::default();
    let mut metas: Vec<Option<PluginMeta>> = metas.into_iter().map(Some).collect();
    for index in order {
        if let Some(meta) = metas[index].take() {
            result.ordered.push(meta);
        }
    }
    for (index, failure) in failures.into_iter().enumerate() {
        if let (Some(error), Some(meta)) = (failure, metas[index].take()) {
            log::error!("Plugin {} will not load: {}", meta.name, error);
            result.failures.push(PluginFailure::new(meta.name, error));
        }
    }
    result
}

/// Split the plugins Kahn could not place into cycle members and plugins
/// that merely wait on a cycle
fn mark_cycles(
    metas: &[PluginMeta],
    dependencies: &[Vec<usize>],
    blocked: &[usize],
    failures: &mut [Option<PluginError>],
) {
    let blocked_set: HashSet<usize> = blocked.iter().copied().collect();

    // Peel off plugins no blocked plugin depends on; what remains lies on a cycle
    let mut remaining: BTreeSet<usize> = blocked_set.iter().copied().collect();
    let mut dependant_count: HashMap<usize, usize> = blocked.iter().map(|&i| (i, 0)).collect();
    for &index in blocked {
        for dependency in &dependencies[index] {
            if let Some(count) = dependant_count.get_mut(dependency) {
                *count += 1;
            }
        }
    }

    let mut peel: VecDeque<usize> = blocked.iter().copied().filter(|i| dependant_count[i] == 0).collect();
    let mut waiting = Vec::new();
    while let Some(index) = peel.pop_front() {
        remaining.remove(&index);
        waiting.push(index);
        for dependency in &dependencies[index] {
            if let Some(count) = dependant_count.get_mut(dependency) {
                *count -= 1;
                if *count == 0 {
                    peel.push_back(*dependency);
                }
            }
        }
    }

    let mut names: Vec<String> = remaining.iter().map(|&i| metas[i].name.clone()).collect();
    names.sort();
    for &index in &remaining {
        failures[index] = Some(PluginError::CircularDependency(names.clone()));
    }

    for index in waiting {
        let dependency = dependencies[index]
            .iter()
            .copied()
            .find(|d| blocked_set.contains(d))
            .map(|d| metas[d].name.clone())
            .unwrap_or_default();
        failures[index] = Some(PluginError::DependencyFailed {
            plugin: metas[index].name.clone(),
            dependency,
        });
    }
}
