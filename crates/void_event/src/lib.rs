//! # void_event - Message Bus
//!
//! Typed messages delivered through a central [`MessageCoordinator`]:
//! - Synchronous `send` with registration-ordered handlers
//! - Queued `post` drained once per tick with delays, deadlines and cancellation
//! - Request/response with typed response slots
//! - A thread-local ambient dispatcher for code without a host reference

pub mod coordinator;
pub mod dispatcher;
pub mod message;
pub mod messages;

pub use coordinator::{MessageCoordinator, MessageHandler};
pub use dispatcher::{current_dispatcher, Completion, DispatcherScope, MessageDispatcher};
pub use message::{
    Message, MessageCallbacks, MessageDelay, MessageHeader, MessageKind, MessageState,
    NotHandledBehavior, OutcomeCallback, ProcessedCallback, Request, DEFAULT_REQUEST_TIMEOUT,
};

/// Prelude
pub mod prelude {
    pub use crate::coordinator::MessageCoordinator;
    pub use crate::dispatcher::{current_dispatcher, DispatcherScope, MessageDispatcher};
    pub use crate::message::{
        Message, MessageDelay, MessageHeader, MessageKind, MessageState, NotHandledBehavior,
        Request,
    };
    pub use crate::messages::*;
}
