//! Dispatcher abstraction and the thread-local ambient dispatcher

use std::cell::RefCell;
use std::sync::Arc;

use void_async::Promise;
use void_core::{Outcome, PayloadOutcome};

use crate::message::{Message, Request};

/// Runs once a posted message reached its final state
pub type Completion = Box<dyn FnOnce(Box<dyn Message>) + Send>;

/// Something that can deliver messages
pub trait MessageDispatcher: Send + Sync {
    /// Dispatch synchronously on the calling thread
    fn send(&self, message: &mut dyn Message) -> Outcome;

    /// Queue for the next drain; `complete` receives the message once resolved
    fn post_boxed(&self, message: Box<dyn Message>, complete: Completion);
}

impl dyn MessageDispatcher + '_ {
    /// Queue a message. The promise resolves with the message outcome.
    pub fn post<M: Message>(&self, message: M) -> Promise<()> {
        let promise = Promise::new();
        let producer = promise.clone();
        self.post_boxed(
            Box::new(message),
            Box::new(move |message| {
                let outcome = message.header().outcome();
                if outcome.succeeded() {
                    producer.fulfill(());
                } else {
                    producer.fail(outcome.report());
                }
            }),
        );
        promise
    }

    /// Queue a request. The promise resolves with its response.
    pub fn post_request<R>(&self, request: R) -> Promise<R::Response>
    where
        R: Request,
        R::Response: Sync,
    {
        let promise = Promise::new();
        let producer = promise.clone();
        self.post_boxed(
            Box::new(request),
            Box::new(move |message| {
                let outcome = message.header().outcome().clone();
                if !outcome.succeeded() {
                    producer.fail(outcome.report());
                    return;
                }
                let type_name = message.type_name();
                match message.into_any().downcast::<R>() {
                    Ok(mut request) => match request.take_response() {
                        Some(response) => {
                            producer.fulfill(response);
                        }
                        None => {
                            producer.fail(format!("{} resolved without a response", type_name));
                        }
                    },
                    Err(_) => {
                        producer.fail(format!("{} changed type in flight", type_name));
                    }
                }
            }),
        );
        promise
    }

    /// Send a request and move its response out
    pub fn request<R: Request>(&self, mut request: R) -> PayloadOutcome<R::Response> {
        let outcome = self.send(&mut request);
        let response = if outcome.succeeded() {
            request.take_response()
        } else {
            None
        };
        PayloadOutcome::from_outcome(outcome, response)
    }
}

thread_local! {
    static CURRENT: RefCell<Option<Arc<dyn MessageDispatcher>>> = const { RefCell::new(None) };
}

/// The dispatcher installed on this thread, if any
pub fn current_dispatcher() -> Option<Arc<dyn MessageDispatcher>> {
    CURRENT.with(|current| current.borrow().clone())
}

/// Installs a dispatcher as this thread's ambient dispatcher until dropped.
/// Scopes nest; dropping restores the previous dispatcher.
pub struct DispatcherScope {
    previous: Option<Arc<dyn MessageDispatcher>>,
}

impl DispatcherScope {
    pub fn new(dispatcher: Arc<dyn MessageDispatcher>) -> Self {
        let previous = CURRENT.with(|current| current.borrow_mut().replace(dispatcher));
        Self { previous }
    }
}

impl Drop for DispatcherScope {
    fn drop(&mut self) {
        let previous = self.previous.take();
        CURRENT.with(|current| *current.borrow_mut() = previous);
    }
}
