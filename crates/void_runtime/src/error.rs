//! Runtime errors and process exit codes

use thiserror::Error;
use void_core::ErrorKind;
use void_services::ServiceError;

/// Clean shutdown
pub const EXIT_NORMAL: i32 = 0;
/// Startup failed: bad configuration or a required plugin did not load
pub const EXIT_LOAD_FAILURE: i32 = 1;
/// A panic escaped a tick
pub const EXIT_PANIC: i32 = 2;

/// Errors that end the host process
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("Host setup failed: {0}")]
    Host(#[from] ServiceError),

    /// Explicitly requested plugins that failed to load
    #[error("Required plugin(s) failed to load: {}", .0.join(", "))]
    RequiredPluginFailed(Vec<String>),

    /// Panic caught while ticking
    #[error("Panic in frame {frame}: {message}")]
    Panicked { frame: u64, message: String },
}

impl RuntimeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RuntimeError::Host(e) => e.kind(),
            RuntimeError::RequiredPluginFailed(_) => ErrorKind::LoadFailure,
            RuntimeError::Panicked { .. } => ErrorKind::Unhandled,
        }
    }

    /// Process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            RuntimeError::Host(_) | RuntimeError::RequiredPluginFailed(_) => EXIT_LOAD_FAILURE,
            RuntimeError::Panicked { .. } => EXIT_PANIC,
        }
    }
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;
