//! Message coordinator
//!
//! Handler registry, synchronous dispatch and the deferred queue drained once
//! per tick. Handlers run in registration order on the dispatching thread;
//! `post` may be called from any thread.

use std::any::Any;
use std::collections::{HashSet, VecDeque};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, OnceLock};
use std::time::Instant;
use parking_lot::{Mutex, RwLock};

use void_async::Promise;
use void_core::{Outcome, PayloadOutcome, Timer, Uuid, NO_HANDLER_REPORT};

use crate::dispatcher::{Completion, MessageDispatcher};
use crate::message::{Message, MessageDelay, MessageState, NotHandledBehavior, Request};

/// Handler callable
pub type MessageHandler = Arc<dyn Fn(&mut dyn Message) + Send + Sync>;

/// A posted message waiting for the next drain
struct QueuedMessage {
    message: Box<dyn Message>,
    delay: Timer,
    deadline: Option<Instant>,
    complete: Completion,
}

impl QueuedMessage {
    fn new(message: Box<dyn Message>, complete: Completion) -> Self {
        let now = Instant::now();
        let header = message.header();

        let delay = match header.delay() {
            Some(MessageDelay::Ticks(ticks)) => Timer::for_ticks(ticks).unwrap_or_default(),
            Some(MessageDelay::Time(span)) => Timer::for_time_span(span, now),
            None => Timer::immediate(),
        };
        // A deadline past what `Instant` can hold never expires
        let deadline = header.timeout().and_then(|span| now.checked_add(span.to_duration()));

        Self {
            message,
            delay,
            deadline,
            complete,
        }
    }

    fn finish(mut self) {
        self.message.header_mut().fire_callbacks();
        (self.complete)(self.message);
    }
}

fn warned_types() -> &'static Mutex<HashSet<&'static str>> {
    static WARNED: OnceLock<Mutex<HashSet<&'static str>>> = OnceLock::new();
    WARNED.get_or_init(|| Mutex::new(HashSet::new()))
}

/// Types whose missing handler was already logged at error level
fn errored_types() -> &'static Mutex<HashSet<&'static str>> {
    static ERRORED: OnceLock<Mutex<HashSet<&'static str>>> = OnceLock::new();
    ERRORED.get_or_init(|| Mutex::new(HashSet::new()))
}

/// Central message bus
#[derive(Default)]
pub struct MessageCoordinator {
    handlers: RwLock<Vec<(Uuid, MessageHandler)>>,
    queue: Mutex<VecDeque<QueuedMessage>>,
}

impl MessageCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler seeing every message. Returns its removal token.
    pub fn add_handler<F>(&self, handler: F) -> Uuid
    where
        F: Fn(&mut dyn Message) + Send + Sync + 'static,
    {
        let token = Uuid::generate();
        self.handlers.write().push((token, Arc::new(handler)));
        token
    }

    /// Register a handler only called for messages of type `M`
    pub fn add_typed_handler<M, F>(&self, handler: F) -> Uuid
    where
        M: Message,
        F: Fn(&mut M) + Send + Sync + 'static,
    {
        self.add_handler(move |message: &mut dyn Message| {
            if let Some(message) = message.downcast_mut::<M>() {
                handler(message);
            }
        })
    }

    /// Remove a handler. False when the token is stale.
    pub fn remove_handler(&self, token: Uuid) -> bool {
        let mut handlers = self.handlers.write();
        let before = handlers.len();
        handlers.retain(|(id, _)| *id != token);
        let removed = handlers.len() != before;
        if !removed {
            log::debug!("No handler registered for token {}", token);
        }
        removed
    }

    /// Drop every handler and every queued message
    pub fn clear(&self) {
        self.handlers.write().clear();
        self.queue.lock().clear();
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.read().len()
    }

    /// Messages waiting for a drain
    pub fn pending_count(&self) -> usize {
        self.queue.lock().len()
    }

    /// Dispatch synchronously and return the shared outcome
    pub fn send(&self, message: &mut dyn Message) -> Outcome {
        if self.dispatch(message) {
            message.header_mut().fire_callbacks();
        }
        message.header().outcome().clone()
    }

    /// Send a request and move its response out
    pub fn request<R: Request>(&self, request: R) -> PayloadOutcome<R::Response> {
        self.as_dispatcher().request(request)
    }

    /// Queue a message; see [`MessageCoordinator::process`]
    pub fn post<M: Message>(&self, message: M) -> Promise<()> {
        self.as_dispatcher().post(message)
    }

    /// Queue a request; the promise carries the response
    pub fn post_request<R>(&self, request: R) -> Promise<R::Response>
    where
        R: Request,
        R::Response: Sync,
    {
        self.as_dispatcher().post_request(request)
    }

    /// Drain the queue once. Returns how many messages reached a final state.
    ///
    /// Per entry in FIFO order: a cancelled token resolves it as Cancelled, a
    /// passed deadline as a timeout, an unexpired delay requeues it, anything
    /// else is dispatched. A deferred entry keeps its place and every later
    /// entry waits behind it. Messages posted while draining run next time.
    pub fn process(&self) -> usize {
        let batch = std::mem::take(&mut *self.queue.lock());
        if batch.is_empty() {
            return 0;
        }

        let now = Instant::now();
        let mut retained = VecDeque::new();
        let mut stalled = false;
        let mut resolved = 0;

        for mut entry in batch {
            let header = entry.message.header_mut();

            if header.is_cancel_requested() {
                header.mark_cancelled();
                resolved += 1;
                entry.finish();
                continue;
            }

            if entry.deadline.map(|deadline| now >= deadline).unwrap_or(false) {
                header.mark_timed_out();
                log::warn!(
                    "{} timed out: {}",
                    entry.message.type_name(),
                    entry.message.header().outcome().report()
                );
                resolved += 1;
                entry.finish();
                continue;
            }

            if stalled {
                retained.push_back(entry);
                continue;
            }

            if !entry.delay.is_time_up(now) {
                entry.delay.tick();
                retained.push_back(entry);
                continue;
            }

            if self.dispatch(entry.message.as_mut()) {
                resolved += 1;
                entry.finish();
            } else {
                stalled = true;
                retained.push_back(entry);
            }
        }

        if !retained.is_empty() {
            let mut queue = self.queue.lock();
            let posted_meanwhile = std::mem::replace(&mut *queue, retained);
            queue.extend(posted_meanwhile);
        }

        resolved
    }

    /// Run the handlers over `message`. True when the message is resolved,
    /// false when a handler deferred it.
    fn dispatch(&self, message: &mut dyn Message) -> bool {
        if message.header().state().is_terminal() {
            return true;
        }
        if message.header().is_cancel_requested() {
            message.header_mut().mark_cancelled();
            return true;
        }

        message.header_mut().clear_deferred();
        let handlers: Vec<MessageHandler> = self
            .handlers
            .read()
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();

        for handler in handlers {
            let result = panic::catch_unwind(AssertUnwindSafe(|| handler(&mut *message)));
            if let Err(payload) = result {
                let report = format!(
                    "Handler panicked while dispatching {}: {}",
                    message.type_name(),
                    panic_text(payload.as_ref())
                );
                message.header_mut().mark_error(report);
            }
            if message.header().state().is_terminal() {
                break;
            }
        }

        let header = message.header();
        match header.state() {
            MessageState::Error => {
                log::error!("{} failed: {}", message.type_name(), header.outcome().report());
                true
            }
            MessageState::Pending if header.is_deferred() => false,
            MessageState::Pending => {
                self.resolve_unhandled(message);
                true
            }
            _ => true,
        }
    }

    fn resolve_unhandled(&self, message: &mut dyn Message) {
        let type_name = message.type_name();
        match message.header().not_handled_behavior() {
            NotHandledBehavior::Silent => {}
            NotHandledBehavior::Warn => {
                if warned_types().lock().insert(type_name) {
                    log::warn!("No handler for {}", type_name);
                }
            }
            NotHandledBehavior::Error => {
                let report = format!("{} {}", NO_HANDLER_REPORT, type_name);
                if errored_types().lock().insert(type_name) {
                    log::error!("{}", report);
                } else {
                    log::debug!("{}", report);
                }
                message.header_mut().mark_error(report);
            }
        }
    }

    fn as_dispatcher(&self) -> &dyn MessageDispatcher {
        self
    }
}

impl MessageDispatcher for MessageCoordinator {
    fn send(&self, message: &mut dyn Message) -> Outcome {
        MessageCoordinator::send(self, message)
    }

    fn post_boxed(&self, message: Box<dyn Message>, complete: Completion) {
        self.queue.lock().push_back(QueuedMessage::new(message, complete));
    }
}

impl fmt::Debug for MessageCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageCoordinator")
            .field("handlers", &self.handler_count())
            .field("pending", &self.pending_count())
            .finish()
    }
}

fn panic_text(payload: &(dyn Any + Send)) -> String {
    if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        String::from("unknown panic")
    }
}
