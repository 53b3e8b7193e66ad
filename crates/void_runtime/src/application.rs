//! Host application
//!
//! Owns the host, the loaded plugins and the frame scheduler, and runs the
//! main loop until a [`QuitApplicationCommand`] arrives.
//!
//! Each tick, in order:
//! 1. measure the frame delta (clamped to `max_delta_time`)
//! 2. sample input and update the active input schemes
//! 3. drain posted messages
//! 4. `on_update` on every plugin, in load order
//! 5. `on_fixed_update` for each whole fixed step
//! 6. send a [`FrameEndEvent`]
//! 7. sweep unused assets when the clean interval has elapsed

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use void_core::{DeltaTime, DeltaTimer, Uuid};
use void_event::messages::{FrameEndEvent, LogMessageCommand, QuitApplicationCommand};
use void_event::Message;
use void_plugin::{LoadOutcome, LoadedPlugin, PluginLoader, PluginMeta, StaticPluginRegistry};
use void_services::{Host, HostConfig, HostHandle};

use crate::error::{RuntimeError, RuntimeResult};
use crate::scheduler::FrameScheduler;

/// The engine host process
pub struct Application {
    host: HostHandle,
    loader: PluginLoader,
    plugins: Vec<LoadedPlugin>,
    scheduler: FrameScheduler,
    timer: DeltaTimer,
    quit: Arc<AtomicBool>,
    handlers: Vec<Uuid>,
    frame: u64,
    since_clean: f64,
}

impl Application {
    /// Build the host and install the built-in message handlers. Invalid
    /// configuration is fatal.
    pub fn new(config: HostConfig, statics: StaticPluginRegistry) -> RuntimeResult<Self> {
        let scheduler = FrameScheduler::new(f64::from(config.fixed_time_step), config.max_sub_steps);
        let host = Host::new(config)?;
        let quit = Arc::new(AtomicBool::new(false));

        let flag = quit.clone();
        let on_quit = host
            .coordinator()
            .add_typed_handler::<QuitApplicationCommand, _>(move |command| {
                log::info!("Quit requested");
                flag.store(true, Ordering::SeqCst);
                command.header.mark_handled();
            });

        let on_log = host
            .coordinator()
            .add_typed_handler::<LogMessageCommand, _>(|command| {
                log::log!(
                    target: "void::plugin",
                    command.level.as_log_level(),
                    "{} ({}:{})",
                    command.message,
                    command.file,
                    command.line
                );
                command.header.mark_handled();
            });

        Ok(Self {
            host,
            loader: PluginLoader::new(statics),
            plugins: Vec::new(),
            scheduler,
            timer: DeltaTimer::new(),
            quit,
            handlers: vec![on_quit, on_log],
            frame: 0,
            since_clean: 0.0,
        })
    }

    pub fn host(&self) -> &HostHandle {
        &self.host
    }

    pub fn loader(&self) -> &PluginLoader {
        &self.loader
    }

    /// Attached plugins in load order
    pub fn plugins(&self) -> &[LoadedPlugin] {
        &self.plugins
    }

    pub fn plugin_names(&self) -> Vec<&str> {
        self.plugins.iter().map(LoadedPlugin::name).collect()
    }

    pub fn scheduler(&self) -> &FrameScheduler {
        &self.scheduler
    }

    /// Ticks completed so far
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Flag that stops [`run`](Self::run) after the current tick; safe to
    /// set from signal handlers
    pub fn quit_flag(&self) -> Arc<AtomicBool> {
        self.quit.clone()
    }

    pub fn quit_requested(&self) -> bool {
        self.quit.load(Ordering::SeqCst)
    }

    pub fn request_quit(&self) {
        self.quit.store(true, Ordering::SeqCst);
    }

    /// Load plugins from the configured directory
    ///
    /// A requested plugin that is not running afterwards is fatal; other
    /// failures are logged and skipped.
    pub fn load_plugins(&mut self) -> RuntimeResult<()> {
        let config = self.host.config();
        let outcome = self.loader.load_plugins(
            &config.plugin_directory,
            &config.requested_plugins,
            &config.working_directory,
            &self.host,
        );
        self.accept(outcome)
    }

    /// Load plugins from manifests already in memory
    pub fn load_metas(&mut self, metas: Vec<PluginMeta>) -> RuntimeResult<()> {
        let outcome = self.loader.load_metas(metas, &self.host);
        self.accept(outcome)
    }

    fn accept(&mut self, outcome: LoadOutcome) -> RuntimeResult<()> {
        self.plugins.extend(outcome.loaded);

        // A request is met by a live plugin with that name or type tag
        let unmet: Vec<String> = self
            .host
            .config()
            .requested_plugins
            .iter()
            .filter(|token| {
                !self.plugins.iter().any(|p| {
                    p.name().eq_ignore_ascii_case(token) || p.meta().plugin_type.eq_ignore_ascii_case(token)
                })
            })
            .cloned()
            .collect();

        if unmet.is_empty() {
            Ok(())
        } else {
            Err(RuntimeError::RequiredPluginFailed(unmet))
        }
    }

    /// Deliver a message to one plugin. False when no plugin has that name.
    pub fn send_to_plugin(&mut self, name: &str, message: &mut dyn Message) -> bool {
        match self.plugins.iter_mut().find(|p| p.name().eq_ignore_ascii_case(name)) {
            Some(plugin) => {
                plugin.receive_message(message);
                true
            }
            None => false,
        }
    }

    /// One tick measured against the steady clock
    pub fn tick(&mut self) -> u32 {
        let dt = self.timer.tick();
        self.tick_with(dt)
    }

    /// One tick with an explicit frame delta. Returns the number of fixed
    /// steps taken.
    pub fn tick_with(&mut self, dt: DeltaTime) -> u32 {
        let config = self.host.config();
        let dt = dt.clamped(config.max_delta_time);
        let clean_interval = config.asset_clean_interval_secs;

        self.host.update_input(&dt);

        self.host.coordinator().process();

        for plugin in self.plugins.iter_mut() {
            plugin.update(&dt);
        }

        let steps = self.scheduler.advance(&dt, &mut self.plugins);

        let mut frame_end = FrameEndEvent::new(self.frame);
        self.host.send(&mut frame_end);
        self.frame += 1;

        self.since_clean += dt.seconds;
        if clean_interval > 0.0 && self.since_clean >= clean_interval {
            self.since_clean = 0.0;
            self.host.assets().clean();
        }

        steps
    }

    /// Tick until quit is requested
    ///
    /// A panic inside a tick detaches every plugin in reverse order and is
    /// returned as [`RuntimeError::Panicked`].
    pub fn run(&mut self) -> RuntimeResult<()> {
        log::info!("Entering main loop with {} plugin(s)", self.plugins.len());
        self.timer.reset();

        while !self.quit_requested() {
            let ticked = panic::catch_unwind(AssertUnwindSafe(|| {
                self.tick();
            }));

            if let Err(payload) = ticked {
                let message = panic_message(payload.as_ref());
                log::error!("Unhandled panic in frame {}: {}", self.frame, message);
                let frame = self.frame;
                self.shutdown();
                return Err(RuntimeError::Panicked { frame, message });
            }
        }

        log::info!("Leaving main loop after {} frame(s)", self.frame);
        self.shutdown();
        Ok(())
    }

    /// Detach and unload plugins in reverse order, then stop host services.
    /// Safe to call more than once.
    pub fn shutdown(&mut self) {
        while let Some(plugin) = self.plugins.pop() {
            let name = plugin.name().to_string();
            let loader = &self.loader;
            if panic::catch_unwind(AssertUnwindSafe(|| loader.unload_plugin(plugin))).is_err() {
                log::error!("Plugin {} panicked while unloading", name);
            }
        }

        for token in self.handlers.drain(..) {
            self.host.coordinator().remove_handler(token);
        }
        self.host.shutdown();
    }
}

impl Drop for Application {
    fn drop(&mut self) {
        if !self.plugins.is_empty() || !self.handlers.is_empty() {
            self.shutdown();
        }
    }
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("plugins", &self.plugin_names())
            .field("frame", &self.frame)
            .field("scheduler", &self.scheduler)
            .finish()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        text.to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic".to_string()
    }
}
