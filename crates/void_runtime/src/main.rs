//! Void host process
//!
//! Run with: cargo run -p void_runtime -- [path/to/void.toml]
//!
//! Exit codes: 0 on a clean quit, 1 when startup fails, 2 when a frame
//! panics.

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::Ordering;

use void_plugin::StaticPluginRegistry;
use void_runtime::{logging, Application, RuntimeError, RuntimeResult, EXIT_NORMAL};
use void_services::{HostConfig, ServiceResult};

fn main() -> ExitCode {
    let config = load_config();
    logging::init(config.as_ref().ok());

    log::info!("Void host v{}", env!("CARGO_PKG_VERSION"));

    std::panic::set_hook(Box::new(|panic_info| {
        log::error!("PANIC: {}", panic_info);
    }));

    let code = match config.map_err(RuntimeError::from).and_then(run) {
        Ok(()) => EXIT_NORMAL,
        Err(e) => {
            log::error!("{}", e);
            e.exit_code()
        }
    };
    ExitCode::from(code as u8)
}

fn run(config: HostConfig) -> RuntimeResult<()> {
    log::info!(
        "Fixed step {}s, up to {} sub-steps, plugins from {}",
        config.fixed_time_step,
        config.max_sub_steps,
        config.plugin_directory.display()
    );

    let mut app = Application::new(config, StaticPluginRegistry::new())?;

    let quit = app.quit_flag();
    if let Err(e) = ctrlc::set_handler(move || {
        log::info!("Received Ctrl+C, shutting down...");
        quit.store(true, Ordering::SeqCst);
    }) {
        log::warn!("Failed to set Ctrl+C handler: {}", e);
    }

    app.load_plugins()?;
    app.run()
}

/// First positional argument names a config file; otherwise `void.toml` in
/// the working directory
fn load_config() -> ServiceResult<HostConfig> {
    match env::args().skip(1).find(|arg| !arg.starts_with("--")) {
        Some(path) => {
            let path = PathBuf::from(path);
            let mut config = HostConfig::load_from_file(&path)?;
            config.apply_overrides(|key| env::var(key).ok());
            config.validate()?;
            Ok(config)
        }
        None => HostConfig::load(),
    }
}
