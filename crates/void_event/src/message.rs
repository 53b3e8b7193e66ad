//! Message model
//!
//! Every message embeds a [`MessageHeader`] carrying its lifecycle state, the
//! shared [`Outcome`], an optional cancellation token and the queue options
//! (timeout, delay). Concrete message types implement [`Message`], usually
//! through [`event!`](crate::event), [`command!`](crate::command) or
//! [`request!`](crate::request).

use std::any::Any;
use std::fmt;

use void_core::{CancellationToken, Outcome, TimeSpan, Uuid, CANCELLED_REPORT, TIMEOUT_REPORT};

/// Lifecycle of a message. Every state but `Pending` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageState {
    Pending,
    Handled,
    Cancelled,
    Error,
}

impl MessageState {
    pub fn is_terminal(self) -> bool {
        self != MessageState::Pending
    }
}

/// What to do when no handler resolved a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NotHandledBehavior {
    /// Succeed quietly
    Silent,
    /// Succeed, logging one warning per message type
    Warn,
    /// Fail with "No handler for <type>", logging the first failure per
    /// message type at error level
    Error,
}

/// Variant family of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// Broadcast, any number of observers
    Event,
    /// Imperative, one handler expected to resolve it
    Command,
    /// Command with a typed response slot
    Request,
}

/// Delay applied to a posted message before its first dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageDelay {
    /// Dispatch after this many `process` calls have passed
    Ticks(u32),
    /// Dispatch once this much time elapsed since the post
    Time(TimeSpan),
}

/// Default deadline for posted requests
pub const DEFAULT_REQUEST_TIMEOUT: TimeSpan = TimeSpan::from_secs(1);

pub type OutcomeCallback = Box<dyn FnOnce(&Outcome) + Send>;
pub type ProcessedCallback = Box<dyn FnOnce(MessageState, &Outcome) + Send>;

/// Callbacks fired when a message reaches its final state
#[derive(Default)]
pub struct MessageCallbacks {
    pub on_handled: Option<OutcomeCallback>,
    pub on_cancelled: Option<OutcomeCallback>,
    pub on_failure: Option<OutcomeCallback>,
    pub on_timeout: Option<OutcomeCallback>,
    /// Always fired last, whatever the final state
    pub on_processed: Option<ProcessedCallback>,
}

impl MessageCallbacks {
    pub(crate) fn fire(&mut self, state: MessageState, timed_out: bool, outcome: &Outcome) {
        let specific = match state {
            MessageState::Handled => self.on_handled.take(),
            MessageState::Cancelled => self.on_cancelled.take(),
            MessageState::Error if timed_out => self.on_timeout.take(),
            MessageState::Error => self.on_failure.take(),
            MessageState::Pending => None,
        };
        if let Some(callback) = specific {
            callback(outcome);
        }
        if let Some(callback) = self.on_processed.take() {
            callback(state, outcome);
        }
    }
}

impl fmt::Debug for MessageCallbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageCallbacks")
            .field("on_handled", &self.on_handled.is_some())
            .field("on_cancelled", &self.on_cancelled.is_some())
            .field("on_failure", &self.on_failure.is_some())
            .field("on_timeout", &self.on_timeout.is_some())
            .field("on_processed", &self.on_processed.is_some())
            .finish()
    }
}

/// State shared by every message
#[derive(Debug)]
pub struct MessageHeader {
    id: Uuid,
    state: MessageState,
    outcome: Outcome,
    cancellation_token: Option<CancellationToken>,
    not_handled_behavior: NotHandledBehavior,
    timeout: Option<TimeSpan>,
    delay: Option<MessageDelay>,
    callbacks: MessageCallbacks,
    deferred: bool,
    timed_out: bool,
}

impl MessageHeader {
    /// Header with the defaults for `kind`
    pub fn new(kind: MessageKind) -> Self {
        let (not_handled_behavior, timeout) = match kind {
            MessageKind::Event => (NotHandledBehavior::Silent, None),
            MessageKind::Command => (NotHandledBehavior::Warn, None),
            MessageKind::Request => (NotHandledBehavior::Error, Some(DEFAULT_REQUEST_TIMEOUT)),
        };
        Self {
            id: Uuid::generate(),
            state: MessageState::Pending,
            outcome: Outcome::new(),
            cancellation_token: None,
            not_handled_behavior,
            timeout,
            delay: None,
            callbacks: MessageCallbacks::default(),
            deferred: false,
            timed_out: false,
        }
    }

    pub fn event() -> Self {
        Self::new(MessageKind::Event)
    }

    pub fn command() -> Self {
        Self::new(MessageKind::Command)
    }

    pub fn request() -> Self {
        Self::new(MessageKind::Request)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> MessageState {
        self.state
    }

    /// Shared outcome; clones observe the final resolution
    pub fn outcome(&self) -> &Outcome {
        &self.outcome
    }

    pub fn cancellation_token(&self) -> Option<&CancellationToken> {
        self.cancellation_token.as_ref()
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.cancellation_token
            .as_ref()
            .map(CancellationToken::is_cancelled)
            .unwrap_or(false)
    }

    pub fn not_handled_behavior(&self) -> NotHandledBehavior {
        self.not_handled_behavior
    }

    pub fn timeout(&self) -> Option<TimeSpan> {
        self.timeout
    }

    pub fn delay(&self) -> Option<MessageDelay> {
        self.delay
    }

    pub fn callbacks_mut(&mut self) -> &mut MessageCallbacks {
        &mut self.callbacks
    }

    pub fn set_cancellation_token(&mut self, token: CancellationToken) {
        self.cancellation_token = Some(token);
    }

    pub fn set_not_handled_behavior(&mut self, behavior: NotHandledBehavior) {
        self.not_handled_behavior = behavior;
    }

    /// Deadline measured from the post. `None` or a zero span disables it.
    pub fn set_timeout(&mut self, timeout: Option<TimeSpan>) {
        self.timeout = timeout.filter(|span| !span.is_zero());
    }

    pub fn set_delay(&mut self, delay: Option<MessageDelay>) {
        self.delay = delay;
    }

    /// Resolve as handled. Ignored once the message is terminal.
    pub fn mark_handled(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        self.state = MessageState::Handled;
        self.deferred = false;
        self.outcome.flag_success("");
    }

    /// Resolve as failed. Ignored once the message is terminal.
    pub fn mark_error(&mut self, report: impl Into<String>) {
        if self.state.is_terminal() {
            return;
        }
        let mut report = report.into();
        if report.is_empty() {
            report.push_str("Message processing failed.");
        }
        self.fail(MessageState::Error, report);
    }

    /// Keep the message pending after this dispatch. A deferred posted
    /// message stays at the head of the queue until a later dispatch
    /// resolves it.
    pub fn defer(&mut self) {
        if !self.state.is_terminal() {
            self.deferred = true;
        }
    }

    pub fn is_deferred(&self) -> bool {
        self.deferred
    }

    pub(crate) fn clear_deferred(&mut self) {
        self.deferred = false;
    }

    pub(crate) fn mark_cancelled(&mut self) {
        if !self.state.is_terminal() {
            self.fail(MessageState::Cancelled, CANCELLED_REPORT.to_string());
        }
    }

    pub(crate) fn mark_timed_out(&mut self) {
        if !self.state.is_terminal() {
            self.timed_out = true;
            self.fail(MessageState::Error, TIMEOUT_REPORT.to_string());
        }
    }

    pub(crate) fn fire_callbacks(&mut self) {
        let outcome = self.outcome.clone();
        self.callbacks.fire(self.state, self.timed_out, &outcome);
    }

    fn fail(&mut self, state: MessageState, report: String) {
        self.state = state;
        self.deferred = false;
        // Report is never empty here
        let _ = self.outcome.flag_failure(report);
    }
}

/// A value dispatched through the coordinator
pub trait Message: Any + Send {
    fn header(&self) -> &MessageHeader;
    fn header_mut(&mut self) -> &mut MessageHeader;
    fn kind(&self) -> MessageKind;
    fn type_name(&self) -> &'static str;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn into_any(self: Box<Self>) -> Box<dyn Any + Send>;
}

impl dyn Message {
    pub fn is<T: Message>(&self) -> bool {
        self.as_any().is::<T>()
    }

    pub fn downcast_ref<T: Message>(&self) -> Option<&T> {
        self.as_any().downcast_ref::<T>()
    }

    pub fn downcast_mut<T: Message>(&mut self) -> Option<&mut T> {
        self.as_any_mut().downcast_mut::<T>()
    }

    pub fn state(&self) -> MessageState {
        self.header().state()
    }
}

impl fmt::Debug for dyn Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct(self.type_name())
            .field("id", &self.header().id())
            .field("state", &self.header().state())
            .finish()
    }
}

/// A message with a typed response slot
pub trait Request: Message + Sized {
    type Response: Send + 'static;

    /// Borrow the response written by a handler
    fn response(&self) -> Option<&Self::Response>;

    /// Write the response; handlers usually follow with `mark_handled`
    fn set_response(&mut self, response: Self::Response);

    /// Move the response out
    fn take_response(&mut self) -> Option<Self::Response>;
}

/// Implements [`Message`] for a struct with a `header: MessageHeader` field
#[macro_export]
macro_rules! impl_message {
    ($ty:ty, $kind:expr) => {
        impl $crate::Message for $ty {
            fn header(&self) -> &$crate::MessageHeader {
                &self.header
            }

            fn header_mut(&mut self) -> &mut $crate::MessageHeader {
                &mut self.header
            }

            fn kind(&self) -> $crate::MessageKind {
                $kind
            }

            fn type_name(&self) -> &'static str {
                ::std::any::type_name::<$ty>()
            }

            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }

            fn as_any_mut(&mut self) -> &mut dyn ::std::any::Any {
                self
            }

            fn into_any(self: Box<Self>) -> Box<dyn ::std::any::Any + Send> {
                self
            }
        }
    };
}

/// Declare an event type
#[macro_export]
macro_rules! event {
    ($ty:ty) => {
        $crate::impl_message!($ty, $crate::MessageKind::Event);
    };
}

/// Declare a command type
#[macro_export]
macro_rules! command {
    ($ty:ty) => {
        $crate::impl_message!($ty, $crate::MessageKind::Command);
    };
}

/// Declare a request type whose `response: Option<$response>` field is the slot
#[macro_export]
macro_rules! request {
    ($ty:ty => $response:ty) => {
        $crate::impl_message!($ty, $crate::MessageKind::Request);

        impl $crate::Request for $ty {
            type Response = $response;

            fn response(&self) -> Option<&$response> {
                self.response.as_ref()
            }

            fn set_response(&mut self, response: $response) {
                self.response = Some(response);
            }

            fn take_response(&mut self) -> Option<$response> {
                self.response.take()
            }
        }
    };
}
