//! Loading plugins from manifests on disk

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use void_core::{ErrorKind, Uuid};
use void_event::messages::FrameEndEvent;
use void_plugin::prelude::*;
use void_plugin::PluginError;
use void_services::{Host, HostConfig};

type Journal = Arc<Mutex<Vec<String>>>;

/// Records lifecycle calls into a shared journal
struct Recorder {
    name: String,
    journal: Journal,
}

impl Plugin for Recorder {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_attach(&mut self, _host: &HostHandle) {
        self.journal.lock().push(format!("attach {}", self.name));
    }

    fn on_detach(&mut self) {
        self.journal.lock().push(format!("detach {}", self.name));
    }
}

fn write_manifest(dir: &Path, file: &str, body: &str) {
    let path = dir.join(file);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, body).unwrap();
}

fn static_manifest(name: &str, plugin_type: &str, dependencies: &[&str]) -> String {
    let deps: Vec<String> = dependencies.iter().map(|d| format!("\"{}\"", d)).collect();
    format!(
        r#"{{ "name": "{}", "version": "1.0.0", "type": "{}", "dependencies": [{}], "linkage": "static" }}"#,
        name,
        plugin_type,
        deps.join(", ")
    )
}

fn recorders(names: &[&str], journal: &Journal) -> StaticPluginRegistry {
    let mut statics = StaticPluginRegistry::new();
    for name in names {
        let name = name.to_string();
        let journal = journal.clone();
        statics.register(&name.clone(), move || {
            Box::new(Recorder {
                name: name.clone(),
                journal: journal.clone(),
            })
        });
    }
    statics
}

fn host() -> HostHandle {
    Host::new(HostConfig::default()).unwrap()
}

#[test]
fn test_load_order_follows_dependencies_and_type() {
    let dir = tempfile::tempdir().unwrap();
    write_manifest(dir.path(), "a/A.meta", &static_manifest("A", "system", &["B"]));
    write_manifest(dir.path(), "b/B.meta", &static_manifest("B", "loader", &[]));
    write_manifest(dir.path(), "c/plugin.meta", &static_manifest("C", "user", &["A"]));

    let journal = Journal::default();
    let loader = PluginLoader::new(recorders(&["A", "B", "C"], &journal));
    let host = host();

    let outcome = loader.load_plugins(dir.path(), &[], Path::new("."), &host);
    assert!(outcome.is_complete(), "{:?}", outcome.failures);
    assert_eq!(outcome.loaded_names(), vec!["B", "A", "C"]);
    assert_eq!(*journal.lock(), vec!["attach B", "attach A", "attach C"]);
    assert_eq!(loader.registry().names(), vec!["B", "A", "C"]);

    journal.lock().clear();
    loader.unload_plugins(outcome.loaded);
    assert_eq!(*journal.lock(), vec!["detach C", "detach A", "detach B"]);
    assert!(loader.registry().is_empty());
}

#[test]
fn test_relative_directory_resolves_against_working_directory() {
    let dir = tempfile::tempdir().unwrap();
    write_manifest(dir.path(), "plugins/solo.meta", &static_manifest("solo", "user", &[]));

    let journal = Journal::default();
    let loader = PluginLoader::new(recorders(&["solo"], &journal));
    let outcome = loader.load_plugins(Path::new("plugins"), &[], dir.path(), &host());
    assert_eq!(outcome.loaded_names(), vec!["solo"]);
}

#[test]
fn test_resources_are_skipped_and_duplicates_rejected() {
    let dir = tempfile::tempdir().unwrap();
    write_manifest(dir.path(), "core/core.meta", &static_manifest("core", "system", &[]));
    write_manifest(dir.path(), "core/resources/nested.meta", "this is not json");
    write_manifest(dir.path(), "z_copy/core.meta", &static_manifest("core", "system", &[]));

    let journal = Journal::default();
    let loader = PluginLoader::new(recorders(&["core"], &journal));
    let outcome = loader.load_plugins(dir.path(), &[], Path::new("."), &host());

    assert_eq!(outcome.loaded_names(), vec!["core"]);
    assert_eq!(outcome.failures.len(), 1);
    assert!(matches!(outcome.failures[0].error, PluginError::DuplicateName { .. }));
    assert_eq!(outcome.failures[0].error.kind(), ErrorKind::LoadFailure);
}

#[test]
fn test_failed_module_skips_its_dependants() {
    let dir = tempfile::tempdir().unwrap();
    write_manifest(
        dir.path(),
        "renderer/renderer.meta",
        r#"{ "name": "renderer", "version": "0.3.0", "type": "system", "linkage": "dynamic", "module": "missing_renderer" }"#,
    );
    write_manifest(dir.path(), "hud/hud.meta", &static_manifest("hud", "user", &["renderer"]));
    write_manifest(dir.path(), "audio/audio.meta", &static_manifest("audio", "system", &[]));

    let journal = Journal::default();
    let loader = PluginLoader::new(recorders(&["hud", "audio"], &journal));
    let outcome = loader.load_plugins(dir.path(), &[], Path::new("."), &host());

    assert_eq!(outcome.loaded_names(), vec!["audio"]);
    assert!(outcome.failed("renderer"));
    assert!(outcome.failed("hud"));

    let renderer = outcome.failures.iter().find(|f| f.name == "renderer").unwrap();
    assert_eq!(renderer.error.kind(), ErrorKind::LoadFailure);
    let hud = outcome.failures.iter().find(|f| f.name == "hud").unwrap();
    assert!(matches!(hud.error, PluginError::DependencyFailed { .. }));
    assert_eq!(*journal.lock(), vec!["attach audio"]);
}

#[test]
fn test_requested_plugins_pull_in_dependencies() {
    let dir = tempfile::tempdir().unwrap();
    write_manifest(dir.path(), "log.meta", &static_manifest("file_log", "logger", &[]));
    write_manifest(dir.path(), "window.meta", &static_manifest("window", "system", &["logger"]));
    write_manifest(dir.path(), "game.meta", &static_manifest("game", "user", &["window"]));
    write_manifest(dir.path(), "editor.meta", &static_manifest("editor", "user", &[]));

    let journal = Journal::default();
    let loader = PluginLoader::new(recorders(&["file_log", "window", "game", "editor"], &journal));
    let outcome = loader.load_plugins(dir.path(), &["game".to_string()], Path::new("."), &host());

    assert_eq!(outcome.loaded_names(), vec!["file_log", "window", "game"]);
    assert!(!loader.registry().contains("editor"));
}

#[test]
fn test_unregistered_static_plugin_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    write_manifest(dir.path(), "ghost.meta", &static_manifest("ghost", "user", &[]));

    let loader = PluginLoader::default();
    let outcome = loader.load_plugins(dir.path(), &[], Path::new("."), &host());
    assert!(outcome.loaded.is_empty());
    assert_eq!(outcome.failures[0].error.kind(), ErrorKind::NotFound);
}

#[test]
fn test_cycles_are_excluded() {
    let journal = Journal::default();
    let loader = PluginLoader::new(recorders(&["ping", "pong", "solo"], &journal));
    let metas = vec![
        PluginMeta::new_static("ping", "user").with_dependency("pong"),
        PluginMeta::new_static("pong", "user").with_dependency("ping"),
        PluginMeta::new_static("solo", "user"),
    ];

    let outcome = loader.load_metas(metas, &host());
    assert_eq!(outcome.loaded_names(), vec!["solo"]);
    assert_eq!(outcome.failures.len(), 2);
    assert!(outcome
        .failures
        .iter()
        .all(|f| f.error.kind() == ErrorKind::CircularDependency));
}

/// Listens for frame ends on the bus
#[derive(Default)]
struct FrameCounter {
    frames: Arc<AtomicU32>,
    token: Option<(HostLink, Uuid)>,
}

impl Plugin for FrameCounter {
    fn name(&self) -> &str {
        "frame_counter"
    }

    fn on_attach(&mut self, host: &HostHandle) {
        let frames = self.frames.clone();
        let token = host.coordinator().add_typed_handler::<FrameEndEvent, _>(move |_| {
            frames.fetch_add(1, Ordering::SeqCst);
        });
        let mut link = HostLink::new();
        link.attach(host);
        self.token = Some((link, token));
    }

    fn on_detach(&mut self) {
        if let Some((link, token)) = self.token.take() {
            if let Some(host) = link.host() {
                host.coordinator().remove_handler(token);
            }
        }
    }
}

/// Emits a frame end as soon as it is attached
#[derive(Default)]
struct FrameSource {
    link: HostLink,
}

impl Plugin for FrameSource {
    fn name(&self) -> &str {
        "frame_source"
    }

    fn on_attach(&mut self, host: &HostHandle) {
        self.link.attach(host);
        let outcome = self.link.send_message(&mut FrameEndEvent::new(0));
        assert!(outcome.succeeded());
    }

    fn on_detach(&mut self) {
        self.link.detach();
    }
}

#[test]
fn test_plugins_talk_through_the_bus() {
    let frames = Arc::new(AtomicU32::new(0));
    let mut statics = StaticPluginRegistry::new();
    let counter_frames = frames.clone();
    statics.register("frame_counter", move || {
        Box::new(FrameCounter {
            frames: counter_frames.clone(),
            token: None,
        })
    });
    statics.register_default::<FrameSource>("frame_source");

    let host = host();
    let loader = PluginLoader::new(statics);
    let metas = vec![
        PluginMeta::new_static("frame_source", "user").with_dependency("frame_counter"),
        PluginMeta::new_static("frame_counter", "system"),
    ];
    let outcome = loader.load_metas(metas, &host);
    assert_eq!(outcome.loaded_names(), vec!["frame_counter", "frame_source"]);
    assert_eq!(frames.load(Ordering::SeqCst), 1);

    loader.unload_plugins(outcome.loaded);
    assert_eq!(host.coordinator().handler_count(), 0);
}
