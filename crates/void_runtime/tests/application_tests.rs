//! Main loop scenarios driven through static plugins

use std::fs;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use void_asset::prelude::*;
use void_core::{DeltaTime, ErrorKind};
use void_event::messages::{FrameEndEvent, LogLevel, LogMessageCommand, QuitApplicationCommand};
use void_event::{Message, MessageState};
use void_runtime::prelude::*;
use void_runtime::{EXIT_LOAD_FAILURE, EXIT_PANIC};

type Journal = Arc<Mutex<Vec<String>>>;

/// Journals every callback. Optionally posts a quit or panics on a given
/// update.
struct Probe {
    name: String,
    journal: Journal,
    link: HostLink,
    updates: u32,
    quit_on: Option<u32>,
    panic_on: Option<u32>,
}

impl Plugin for Probe {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_attach(&mut self, host: &HostHandle) {
        self.link.attach(host);
        self.journal.lock().push(format!("attach {}", self.name));
    }

    fn on_detach(&mut self) {
        self.link.detach();
        self.journal.lock().push(format!("detach {}", self.name));
    }

    fn on_update(&mut self, _dt: &DeltaTime) {
        self.updates += 1;
        self.journal.lock().push(format!("update {}", self.name));

        if self.panic_on == Some(self.updates) {
            panic!("{} gave up", self.name);
        }
        if self.quit_on == Some(self.updates) {
            self.link.post_message(QuitApplicationCommand::new());
        }
    }

    fn on_fixed_update(&mut self, dt: &DeltaTime) {
        assert!(dt.seconds > 0.0);
        self.journal.lock().push(format!("fixed {}", self.name));
    }

    fn on_receive_message(&mut self, message: &mut dyn Message) {
        self.journal.lock().push(format!("message {}", self.name));
        message.header_mut().mark_handled();
    }
}

fn register_probe(
    statics: &mut StaticPluginRegistry,
    name: &str,
    journal: &Journal,
    quit_on: Option<u32>,
    panic_on: Option<u32>,
) {
    let name = name.to_string();
    let journal = journal.clone();
    statics.register(&name.clone(), move || {
        Box::new(Probe {
            name: name.clone(),
            journal: journal.clone(),
            link: HostLink::new(),
            updates: 0,
            quit_on,
            panic_on,
        })
    });
}

fn config(fixed_time_step: f32, max_sub_steps: u32) -> HostConfig {
    HostConfig {
        fixed_time_step,
        max_sub_steps,
        ..HostConfig::default()
    }
}

#[test]
fn test_tick_runs_updates_then_fixed_steps_then_frame_end() {
    let journal = Journal::default();
    let mut statics = StaticPluginRegistry::new();
    register_probe(&mut statics, "physics", &journal, None, None);
    register_probe(&mut statics, "game", &journal, None, None);

    let mut app = Application::new(config(0.02, 8), statics).unwrap();
    let frames = journal.clone();
    app.host()
        .coordinator()
        .add_typed_handler::<FrameEndEvent, _>(move |event| {
            frames.lock().push(format!("frame {}", event.frame));
        });

    app.load_metas(vec![
        PluginMeta::new_static("game", "user").with_dependency("physics"),
        PluginMeta::new_static("physics", "system"),
    ])
    .unwrap();
    assert_eq!(app.plugin_names(), vec!["physics", "game"]);

    journal.lock().clear();
    let steps = app.tick_with(DeltaTime::from_seconds(0.04));
    assert_eq!(steps, 2);
    assert_eq!(
        *journal.lock(),
        vec![
            "update physics",
            "update game",
            "fixed physics",
            "fixed game",
            "fixed physics",
            "fixed game",
            "frame 0",
        ]
    );
    assert_eq!(app.frame(), 1);
}

#[test]
fn test_frame_delta_is_clamped() {
    let mut cfg = config(0.02, 20);
    cfg.max_delta_time = 0.1;
    let mut app = Application::new(cfg, StaticPluginRegistry::new()).unwrap();

    assert_eq!(app.tick_with(DeltaTime::from_seconds(1.0)), 5);
    assert!(app.scheduler().accumulator() < 0.02);
}

#[test]
fn test_posted_quit_ends_the_loop_cleanly() {
    let journal = Journal::default();
    let mut statics = StaticPluginRegistry::new();
    register_probe(&mut statics, "core", &journal, None, None);
    register_probe(&mut statics, "game", &journal, Some(2), None);

    let mut app = Application::new(HostConfig::default(), statics).unwrap();
    app.load_metas(vec![
        PluginMeta::new_static("core", "system"),
        PluginMeta::new_static("game", "user").with_dependency("core"),
    ])
    .unwrap();

    app.run().unwrap();

    assert!(app.quit_requested());
    assert!(app.frame() >= 3);
    assert!(app.plugins().is_empty());
    assert!(app.loader().registry().is_empty());

    let journal = journal.lock();
    let tail = &journal[journal.len() - 2..];
    assert_eq!(tail, ["detach game", "detach core"]);
}

#[test]
fn test_panic_in_update_detaches_in_reverse_and_exits_with_two() {
    let journal = Journal::default();
    let mut statics = StaticPluginRegistry::new();
    register_probe(&mut statics, "logger", &journal, None, None);
    register_probe(&mut statics, "renderer", &journal, None, None);
    register_probe(&mut statics, "game", &journal, None, Some(3));

    let mut app = Application::new(HostConfig::default(), statics).unwrap();
    app.load_metas(vec![
        PluginMeta::new_static("logger", "logger"),
        PluginMeta::new_static("renderer", "system"),
        PluginMeta::new_static("game", "user"),
    ])
    .unwrap();

    let err = app.run().unwrap_err();
    assert!(matches!(err, RuntimeError::Panicked { frame: 2, .. }));
    assert!(err.to_string().contains("game gave up"));
    assert_eq!(err.exit_code(), EXIT_PANIC);
    assert_eq!(err.kind(), ErrorKind::Unhandled);

    let journal = journal.lock();
    let tail = &journal[journal.len() - 3..];
    assert_eq!(tail, ["detach game", "detach renderer", "detach logger"]);
    assert!(app.plugins().is_empty());
}

#[test]
fn test_missing_required_plugin_exits_with_one() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("audio.meta"),
        r#"{ "name": "audio", "version": "1.0.0", "type": "system", "linkage": "static" }"#,
    )
    .unwrap();

    let journal = Journal::default();
    let mut statics = StaticPluginRegistry::new();
    register_probe(&mut statics, "audio", &journal, None, None);

    let cfg = HostConfig {
        plugin_directory: dir.path().to_path_buf(),
        requested_plugins: vec!["audio".to_string(), "ghost".to_string()],
        ..HostConfig::default()
    };
    let mut app = Application::new(cfg, statics).unwrap();

    let err = app.load_plugins().unwrap_err();
    match &err {
        RuntimeError::RequiredPluginFailed(names) => assert_eq!(names, &vec!["ghost".to_string()]),
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(err.exit_code(), EXIT_LOAD_FAILURE);
    assert_eq!(app.plugin_names(), vec!["audio"]);
}

#[test]
fn test_optional_failures_are_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("broken.meta"),
        r#"{ "name": "broken", "version": "1.0.0", "linkage": "static" }"#,
    )
    .unwrap();

    let cfg = HostConfig {
        plugin_directory: dir.path().to_path_buf(),
        ..HostConfig::default()
    };
    let mut app = Application::new(cfg, StaticPluginRegistry::new()).unwrap();
    app.load_plugins().unwrap();
    assert!(app.plugins().is_empty());
}

#[test]
fn test_invalid_config_is_a_load_failure() {
    let err = Application::new(config(0.0, 8), StaticPluginRegistry::new()).unwrap_err();
    assert_eq!(err.exit_code(), EXIT_LOAD_FAILURE);
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
}

#[test]
fn test_log_commands_are_handled_by_the_host() {
    let app = Application::new(HostConfig::default(), StaticPluginRegistry::new()).unwrap();
    let mut command = LogMessageCommand::new(LogLevel::Warning, "texture missing", file!(), line!());
    assert!(app.host().send(&mut command).succeeded());
    assert_eq!(command.header.state(), MessageState::Handled);
}

#[test]
fn test_direct_messages_reach_one_plugin() {
    let journal = Journal::default();
    let mut statics = StaticPluginRegistry::new();
    register_probe(&mut statics, "a", &journal, None, None);
    register_probe(&mut statics, "b", &journal, None, None);

    let mut app = Application::new(HostConfig::default(), statics).unwrap();
    app.load_metas(vec![PluginMeta::new_static("a", "user"), PluginMeta::new_static("b", "user")])
        .unwrap();
    journal.lock().clear();

    let mut event = FrameEndEvent::new(7);
    assert!(app.send_to_plugin("B", &mut event));
    assert!(!app.send_to_plugin("c", &mut event));
    assert_eq!(*journal.lock(), vec!["message b"]);
}

#[derive(Default)]
struct Mesh {
    vertices: usize,
}

#[test]
fn test_unused_assets_are_swept_on_the_clean_interval() {
    let mut cfg = config(0.02, 8);
    cfg.asset_clean_interval_secs = 0.09;
    let mut app = Application::new(cfg, StaticPluginRegistry::new()).unwrap();

    let assets = app.host().assets().clone();
    assets.register_loader::<Mesh, _>(|_: &Path| AssetPromise::ready(Mesh { vertices: 3 }));
    let mesh = assets.stream_in::<Mesh>("cube.mesh").unwrap();
    assert_eq!(mesh.read().vertices, 3);

    app.tick_with(DeltaTime::from_seconds(0.05));
    assert_eq!(assets.usage::<Mesh>("cube.mesh").unwrap().stream_state, StreamState::Loaded);

    app.tick_with(DeltaTime::from_seconds(0.05));
    assert_eq!(assets.usage::<Mesh>("cube.mesh").unwrap().stream_state, StreamState::Unloaded);
}
