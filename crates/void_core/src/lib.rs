//! # void_core - Void Engine Core
//!
//! Foundational primitives shared by every other crate of the runtime:
//! - **Ids**: 128-bit [`Uuid`] values with stable name hashing
//! - **Outcomes**: shared success/failure cells observed by producers and consumers
//! - **Cancellation**: cheap cancel flags handed out as tokens
//! - **Time**: frame deltas, durations and tick/deadline timers
//!
//! ## Philosophy
//! "Everything is a Plugin" - the core owns no systems. It only provides the
//! vocabulary the message bus, the plugin loader and the asset manager speak.

pub mod cancellation;
pub mod error;
pub mod id;
pub mod outcome;
pub mod time;
pub mod version;

pub use cancellation::*;
pub use error::*;
pub use id::*;
pub use outcome::*;
pub use time::*;
pub use version::*;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::cancellation::{CancellationSource, CancellationToken};
    pub use crate::error::{EngineError, EngineResult, ErrorKind};
    pub use crate::id::Uuid;
    pub use crate::outcome::{Outcome, OutcomeStatus, PayloadOutcome};
    pub use crate::time::{DeltaTime, DeltaTimer, TimeSpan, Timer};
    pub use crate::version::Version;
}
