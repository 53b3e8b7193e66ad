//! Log output for the host binary
//!
//! Records go to stderr and to `void.log` under the configured logs
//! directory.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::PathBuf;

use void_services::HostConfig;

pub const LOG_FILE_NAME: &str = "void.log";

pub fn log_file_path(config: &HostConfig) -> PathBuf {
    config.resolve(&config.logs_directory).join(LOG_FILE_NAME)
}

/// Create the logs directory if needed and start a fresh log file
pub fn open_log_file(config: &HostConfig) -> io::Result<File> {
    let path = log_file_path(config);
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    File::create(path)
}

/// Copies everything written to stderr and to a log file
pub struct TeeWriter<W: Write> {
    file: W,
}

impl<W: Write> TeeWriter<W> {
    pub fn new(file: W) -> Self {
        Self { file }
    }
}

impl<W: Write> Write for TeeWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        self.file.flush()
    }
}

/// Install the process logger. Without a usable log file it logs to stderr
/// only.
pub fn init(config: Option<&HostConfig>) {
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));

    let mut file_error = None;
    if let Some(config) = config {
        match open_log_file(config) {
            Ok(file) => {
                builder.target(env_logger::Target::Pipe(Box::new(TeeWriter::new(file))));
            }
            Err(e) => file_error = Some((log_file_path(config), e)),
        }
    }
    builder.init();

    match (config, file_error) {
        (_, Some((path, e))) => log::warn!("Cannot write log file {}: {}", path.display(), e),
        (Some(config), None) => log::info!("Logging to {}", log_file_path(config).display()),
        (None, None) => {}
    }
}
