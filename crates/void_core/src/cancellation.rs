//! Cooperative cancellation
//!
//! A [`CancellationSource`] owns a flag; [`CancellationToken`]s observe it.
//! The flag lives as long as its longest holder, so tokens keep reporting the
//! last value after the source is gone.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Owner of a cancel flag
#[derive(Debug, Clone, Default)]
pub struct CancellationSource {
    flag: Arc<AtomicBool>,
}

impl CancellationSource {
    /// Create a source that is not cancelled
    pub fn new() -> Self {
        Self::default()
    }

    /// Signal cancellation to every token
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Whether `cancel` was called
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Mint an observer token
    pub fn token(&self) -> CancellationToken {
        CancellationToken {
            flag: Some(Arc::clone(&self.flag)),
        }
    }
}

/// Observer of a [`CancellationSource`]
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Option<Arc<AtomicBool>>,
}

impl CancellationToken {
    /// A token that never reports cancellation
    pub fn none() -> Self {
        Self { flag: None }
    }

    /// Whether the owning source cancelled
    pub fn is_cancelled(&self) -> bool {
        self.flag
            .as_ref()
            .map(|flag| flag.load(Ordering::Acquire))
            .unwrap_or(false)
    }

    /// Whether this token is bound to a source
    pub fn is_bound(&self) -> bool {
        self.flag.is_some()
    }
}
