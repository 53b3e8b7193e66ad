//! Error types for the core library

use std::fmt;
use thiserror::Error;

/// Broad classification shared by every error in the runtime.
///
/// Crate-specific error enums map onto one of these through their `kind()`
/// accessor so callers can react without matching every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Asset path absent, plugin name missing, stale handler token
    NotFound,
    /// Empty report, empty lane name, bad configuration value
    InvalidArgument,
    /// A posted message outlived its deadline
    Timeout,
    /// A cancellation token fired
    Cancelled,
    /// A message reached every handler and stayed pending
    Unhandled,
    /// The plugin dependency graph has a cycle
    CircularDependency,
    /// Library missing, symbol missing or factory returned null
    LoadFailure,
    /// Typed payload access on the wrong type or an empty slot
    BadCast,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::NotFound => "not found",
            ErrorKind::InvalidArgument => "invalid argument",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Unhandled => "unhandled",
            ErrorKind::CircularDependency => "circular dependency",
            ErrorKind::LoadFailure => "load failure",
            ErrorKind::BadCast => "bad cast",
        };
        f.write_str(name)
    }
}

/// The core error type
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Unhandled: {0}")]
    Unhandled(String),

    #[error("Circular dependency between: {}", .0.join(", "))]
    CircularDependency(Vec<String>),

    #[error("Load failure: {0}")]
    LoadFailure(String),

    #[error("Bad cast: expected {expected}")]
    BadCast { expected: &'static str },
}

impl EngineError {
    /// Create a not found error
    pub fn not_found(what: impl Into<String>) -> Self {
        EngineError::NotFound(what.into())
    }

    /// Create an invalid argument error
    pub fn invalid_argument(what: impl Into<String>) -> Self {
        EngineError::InvalidArgument(what.into())
    }

    /// Create a load failure error
    pub fn load_failure(what: impl Into<String>) -> Self {
        EngineError::LoadFailure(what.into())
    }

    /// Create a bad cast error for the requested type
    pub fn bad_cast<T: ?Sized>() -> Self {
        EngineError::BadCast {
            expected: std::any::type_name::<T>(),
        }
    }

    /// Classification of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::NotFound(_) => ErrorKind::NotFound,
            EngineError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            EngineError::Timeout(_) => ErrorKind::Timeout,
            EngineError::Cancelled(_) => ErrorKind::Cancelled,
            EngineError::Unhandled(_) => ErrorKind::Unhandled,
            EngineError::CircularDependency(_) => ErrorKind::CircularDependency,
            EngineError::LoadFailure(_) => ErrorKind::LoadFailure,
            EngineError::BadCast { .. } => ErrorKind::BadCast,
        }
    }
}

/// Result type alias
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kind_mapping() {
        assert_eq!(EngineError::not_found("a.png").kind(), ErrorKind::NotFound);
        assert_eq!(EngineError::bad_cast::<u32>().kind(), ErrorKind::BadCast);
        assert_eq!(
            EngineError::CircularDependency(vec!["a".into()]).kind(),
            ErrorKind::CircularDependency
        );
    }

    #[test]
    fn test_error_display() {
        let err = EngineError::CircularDependency(vec!["a".into(), "b".into()]);
        assert_eq!(err.to_string(), "Circular dependency between: a, b");

        let err = EngineError::bad_cast::<u32>();
        assert_eq!(err.to_string(), "Bad cast: expected u32");
    }
}
