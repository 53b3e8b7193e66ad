//! Service layer errors

use thiserror::Error;
use void_core::{EngineError, ErrorKind};

/// Service errors
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Service not found: {0}")]
    NotFound(String),

    #[error("Service already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::NotFound(_) => ErrorKind::NotFound,
            ServiceError::AlreadyExists(_) | ServiceError::InvalidConfig(_) | ServiceError::Parse(_) => {
                ErrorKind::InvalidArgument
            }
            ServiceError::Io(e) if e.kind() == std::io::ErrorKind::NotFound => ErrorKind::NotFound,
            ServiceError::Io(_) => ErrorKind::LoadFailure,
            ServiceError::Engine(e) => e.kind(),
        }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
