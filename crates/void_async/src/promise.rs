//! Single-shot shared completion value
//!
//! A [`Promise`] is resolved once, by whoever holds a clone of it, and
//! observed by any number of waiters. Resolution callbacks run on the thread
//! that resolved the promise.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use parking_lot::{Condvar, Mutex};

use void_core::{Outcome, PayloadOutcome};

type ReadyCallback<T> = Box<dyn FnOnce(&T) + Send>;
type FailureCallback = Box<dyn FnOnce(&Outcome) + Send>;

enum Resolution<T> {
    Fulfilled(T),
    Failed(Outcome),
}

struct PromiseState<T> {
    resolution: Option<Arc<Resolution<T>>>,
    on_ready: Vec<ReadyCallback<T>>,
    on_failure: Vec<FailureCallback>,
}

struct PromiseShared<T> {
    state: Mutex<PromiseState<T>>,
    ready: Condvar,
}

/// Single-shot completion shared between a producer and its consumers
pub struct Promise<T> {
    shared: Arc<PromiseShared<T>>,
}

impl<T> Promise<T> {
    /// An unresolved promise
    pub fn new() -> Self {
        Self {
            shared: Arc::new(PromiseShared {
                state: Mutex::new(PromiseState {
                    resolution: None,
                    on_ready: Vec::new(),
                    on_failure: Vec::new(),
                }),
                ready: Condvar::new(),
            }),
        }
    }

    /// A promise already fulfilled with `value`
    pub fn fulfilled(value: T) -> Self {
        let promise = Self::new();
        promise.fulfill(value);
        promise
    }

    /// A promise already failed with `reason`
    pub fn failed(reason: impl Into<String>) -> Self {
        let promise = Self::new();
        promise.fail(reason);
        promise
    }

    /// Store a success value. Returns false if already resolved.
    pub fn fulfill(&self, value: T) -> bool {
        let resolution = Arc::new(Resolution::Fulfilled(value));
        let callbacks = {
            let mut state = self.shared.state.lock();
            if state.resolution.is_some() {
                return false;
            }
            state.resolution = Some(Arc::clone(&resolution));
            state.on_failure.clear();
            std::mem::take(&mut state.on_ready)
        };
        self.shared.ready.notify_all();

        if let Resolution::Fulfilled(value) = resolution.as_ref() {
            for callback in callbacks {
                callback(value);
            }
        }
        true
    }

    /// Store a failure. Returns false if already resolved.
    pub fn fail(&self, reason: impl Into<String>) -> bool {
        let mut reason = reason.into();
        if reason.is_empty() {
            reason.push_str("Promise failed.");
        }
        let outcome = Outcome::failure(reason);

        let callbacks = {
            let mut state = self.shared.state.lock();
            if state.resolution.is_some() {
                return false;
            }
            state.resolution = Some(Arc::new(Resolution::Failed(outcome.clone())));
            state.on_ready.clear();
            std::mem::take(&mut state.on_failure)
        };
        self.shared.ready.notify_all();

        for callback in callbacks {
            callback(&outcome);
        }
        true
    }

    /// Whether the promise was fulfilled or failed
    pub fn is_ready(&self) -> bool {
        self.shared.state.lock().resolution.is_some()
    }

    /// Run `callback` with the value once fulfilled (immediately if it already is)
    pub fn on_ready(&self, callback: impl FnOnce(&T) + Send + 'static) {
        let resolution = {
            let mut state = self.shared.state.lock();
            match state.resolution.as_ref() {
                Some(resolution) => Arc::clone(resolution),
                None => {
                    state.on_ready.push(Box::new(callback));
                    return;
                }
            }
        };
        if let Resolution::Fulfilled(value) = resolution.as_ref() {
            callback(value);
        }
    }

    /// Run `callback` with the failure once failed (immediately if it already is)
    pub fn on_failure(&self, callback: impl FnOnce(&Outcome) + Send + 'static) {
        let outcome = {
            let mut state = self.shared.state.lock();
            match state.resolution.as_deref() {
                Some(Resolution::Failed(outcome)) => outcome.clone(),
                Some(Resolution::Fulfilled(_)) => return,
                None => {
                    state.on_failure.push(Box::new(callback));
                    return;
                }
            }
        };
        callback(&outcome);
    }
}

impl<T: Clone> Promise<T> {
    /// Block until resolved
    pub fn wait(&self) -> PayloadOutcome<T> {
        let mut state = self.shared.state.lock();
        while state.resolution.is_none() {
            self.shared.ready.wait(&mut state);
        }
        Self::snapshot(state.resolution.as_deref())
    }

    /// Block until resolved or `timeout` elapses. A timed-out wait returns an
    /// empty result and leaves the promise unresolved.
    pub fn wait_timeout(&self, timeout: Duration) -> PayloadOutcome<T> {
        let mut state = self.shared.state.lock();
        if state.resolution.is_none() {
            self.shared
                .ready
                .wait_while_for(&mut state, |state| state.resolution.is_none(), timeout);
        }
        if state.resolution.is_none() {
            return PayloadOutcome::new();
        }
        Self::snapshot(state.resolution.as_deref())
    }

    /// Non-blocking read of the resolution
    pub fn resolve(&self) -> Option<PayloadOutcome<T>> {
        let state = self.shared.state.lock();
        state.resolution.as_ref()?;
        Some(Self::snapshot(state.resolution.as_deref()))
    }

    fn snapshot(resolution: Option<&Resolution<T>>) -> PayloadOutcome<T> {
        match resolution {
            Some(Resolution::Fulfilled(value)) => PayloadOutcome::with_payload(value.clone()),
            Some(Resolution::Failed(outcome)) => PayloadOutcome::from_outcome(outcome.clone(), None),
            None => PayloadOutcome::new(),
        }
    }
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> Default for Promise<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Promise<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("ready", &self.is_ready())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::thread;

    #[test]
    fn test_fulfill_once() {
        let promise = Promise::new();
        assert!(!promise.is_ready());
        assert!(promise.resolve().is_none());
        assert!(promise.fulfill(5));
        assert!(!promise.fulfill(6));
        assert!(!promise.fail("too late"));

        let result = promise.wait();
        assert!(result.succeeded());
        assert_eq!(*result.payload().unwrap(), 5);
    }

    #[test]
    fn test_fail_carries_reason() {
        let promise: Promise<u32> = Promise::new();
        assert!(promise.fail("No loader"));
        let result = promise.resolve().unwrap();
        assert!(!result.succeeded());
        assert!(!result.has_payload());
        assert_eq!(result.report(), "No loader");
    }

    #[test]
    fn test_wait_timeout_leaves_unresolved() {
        let promise: Promise<u32> = Promise::new();
        let result = promise.wait_timeout(Duration::from_millis(5));
        assert!(!result.has_payload());
        assert!(!promise.is_ready());
    }

    #[test]
    fn test_wait_across_threads() {
        let promise = Promise::new();
        let producer = promise.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(5));
            producer.fulfill(String::from("done"));
        });
        let result = promise.wait();
        handle.join().unwrap();
        assert_eq!(result.payload().unwrap(), "done");
    }

    #[test]
    fn test_callbacks_fire_exactly_once() {
        let ready = Arc::new(AtomicU32::new(0));
        let failed = Arc::new(AtomicU32::new(0));

        let promise = Promise::new();
        let r = ready.clone();
        promise.on_ready(move |value: &u32| {
            r.fetch_add(*value, Ordering::SeqCst);
        });
        let f = failed.clone();
        promise.on_failure(move |_| {
            f.fetch_add(1, Ordering::SeqCst);
        });

        promise.fulfill(3);
        promise.fulfill(4);
        promise.fail("ignored");
        assert_eq!(ready.load(Ordering::SeqCst), 3);
        assert_eq!(failed.load(Ordering::SeqCst), 0);

        // Registered after resolution: runs immediately
        let r = ready.clone();
        promise.on_ready(move |value: &u32| {
            r.fetch_add(*value, Ordering::SeqCst);
        });
        assert_eq!(ready.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn test_failure_callback_receives_outcome() {
        let promise: Promise<()> = Promise::new();
        let seen = Arc::new(Mutex::new(String::new()));
        let s = seen.clone();
        promise.on_failure(move |outcome| {
            *s.lock() = outcome.report();
        });
        promise.fail("Timeout");
        assert_eq!(&*seen.lock(), "Timeout");
    }
}
