//! Shared success/failure cells
//!
//! An [`Outcome`] is handed to both the producer and the consumer of some
//! operation. Clones share the same state, so a handler flagging a message
//! failed is observed by whoever holds the message's outcome, including the
//! future returned by a post.

use std::fmt;
use std::sync::Arc;
use parking_lot::RwLock;

use crate::error::{EngineError, EngineResult};

/// Report of an outcome failed by cancellation
pub const CANCELLED_REPORT: &str = "Cancelled";
/// Report of an outcome failed by an expired deadline
pub const TIMEOUT_REPORT: &str = "Timeout";
/// Prefix of the report when no handler resolved a message
pub const NO_HANDLER_REPORT: &str = "No handler for";

/// Success or failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutcomeStatus {
    Success,
    Failure,
}

#[derive(Debug)]
struct OutcomeState {
    status: OutcomeStatus,
    report: String,
}

/// Shared-state success/failure with a textual report
#[derive(Clone)]
pub struct Outcome {
    state: Arc<RwLock<OutcomeState>>,
}

impl Outcome {
    /// A fresh successful outcome with an empty report
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(OutcomeState {
                status: OutcomeStatus::Success,
                report: String::new(),
            })),
        }
    }

    /// A fresh failed outcome
    pub fn failure(report: impl Into<String>) -> Self {
        let outcome = Self::new();
        let mut report = report.into();
        if report.is_empty() {
            report.push_str("Operation failed.");
        }
        let mut state = outcome.state.write();
        state.status = OutcomeStatus::Failure;
        state.report = report;
        drop(state);
        outcome
    }

    /// Mark as succeeded. Ignored once the outcome failed with a report.
    pub fn flag_success(&self, report: impl Into<String>) {
        let mut state = self.state.write();
        if state.status == OutcomeStatus::Failure && !state.report.is_empty() {
            return;
        }
        state.status = OutcomeStatus::Success;
        state.report = report.into();
    }

    /// Mark as failed. The report must not be empty.
    pub fn flag_failure(&self, report: impl Into<String>) -> EngineResult<()> {
        let report = report.into();
        if report.is_empty() {
            return Err(EngineError::invalid_argument("failure report must not be empty"));
        }
        let mut state = self.state.write();
        state.status = OutcomeStatus::Failure;
        state.report = report;
        Ok(())
    }

    /// Current status
    pub fn status(&self) -> OutcomeStatus {
        self.state.read().status
    }

    /// True when the status is success
    pub fn succeeded(&self) -> bool {
        self.status() == OutcomeStatus::Success
    }

    /// Copy of the current report
    pub fn report(&self) -> String {
        self.state.read().report.clone()
    }

    /// Whether two handles observe the same state
    pub fn shares_state_with(&self, other: &Outcome) -> bool {
        Arc::ptr_eq(&self.state, &other.state)
    }

    /// Convert into a core result
    ///
    /// Cancellation, timeout and missing-handler reports keep their kinds.
    /// Any other failure comes back as `LoadFailure`.
    pub fn into_result(self) -> EngineResult<()> {
        if self.succeeded() {
            return Ok(());
        }
        let report = self.report();
        Err(match report.as_str() {
            CANCELLED_REPORT => EngineError::Cancelled(report),
            TIMEOUT_REPORT => EngineError::Timeout(report),
            text if text.starts_with(NO_HANDLER_REPORT) => EngineError::Unhandled(report),
            _ => EngineError::LoadFailure(report),
        })
    }
}

impl Default for Outcome {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("Outcome")
            .field("status", &state.status)
            .field("report", &state.report)
            .finish()
    }
}

impl From<&Outcome> for bool {
    fn from(outcome: &Outcome) -> bool {
        outcome.succeeded()
    }
}

/// An [`Outcome`] carrying an optional owned value
pub struct PayloadOutcome<T> {
    outcome: Outcome,
    payload: Option<T>,
}

impl<T> PayloadOutcome<T> {
    /// An empty, successful outcome with no payload
    pub fn new() -> Self {
        Self {
            outcome: Outcome::new(),
            payload: None,
        }
    }

    /// Successful outcome with a payload
    pub fn with_payload(value: T) -> Self {
        Self {
            outcome: Outcome::new(),
            payload: Some(value),
        }
    }

    /// Failed outcome without payload
    pub fn failure(report: impl Into<String>) -> Self {
        Self {
            outcome: Outcome::failure(report),
            payload: None,
        }
    }

    /// Wrap an existing outcome
    pub fn from_outcome(outcome: Outcome, payload: Option<T>) -> Self {
        Self { outcome, payload }
    }

    /// Store a value
    pub fn set_payload(&mut self, value: T) {
        self.payload = Some(value);
    }

    /// Whether a value was set
    pub fn has_payload(&self) -> bool {
        self.payload.is_some()
    }

    /// Borrow the value
    pub fn payload(&self) -> EngineResult<&T> {
        self.payload.as_ref().ok_or_else(EngineError::bad_cast::<T>)
    }

    /// Move the value out
    pub fn take_payload(&mut self) -> EngineResult<T> {
        self.payload.take().ok_or_else(EngineError::bad_cast::<T>)
    }

    /// Consume into the value
    pub fn into_payload(self) -> Option<T> {
        self.payload
    }

    /// The underlying outcome
    pub fn outcome(&self) -> &Outcome {
        &self.outcome
    }

    /// True when the status is success
    pub fn succeeded(&self) -> bool {
        self.outcome.succeeded()
    }

    /// Copy of the report
    pub fn report(&self) -> String {
        self.outcome.report()
    }

    /// See [`Outcome::flag_success`]
    pub fn flag_success(&self, report: impl Into<String>) {
        self.outcome.flag_success(report);
    }

    /// See [`Outcome::flag_failure`]
    pub fn flag_failure(&self, report: impl Into<String>) -> EngineResult<()> {
        self.outcome.flag_failure(report)
    }
}

impl<T> Default for PayloadOutcome<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Clone for PayloadOutcome<T> {
    fn clone(&self) -> Self {
        Self {
            outcome: self.outcome.clone(),
            payload: self.payload.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for PayloadOutcome<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PayloadOutcome")
            .field("outcome", &self.outcome)
            .field("payload", &self.payload)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_clones_share_state() {
        let producer = Outcome::new();
        let consumer = producer.clone();
        producer.flag_failure("disk on fire").unwrap();
        assert!(!consumer.succeeded());
        assert_eq!(consumer.report(), "disk on fire");
        assert!(producer.shares_state_with(&consumer));
    }

    #[test]
    fn test_empty_failure_report_rejected() {
        let outcome = Outcome::new();
        let err = outcome.flag_failure("").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
        assert!(outcome.succeeded());
    }

    #[test]
    fn test_failure_is_monotonic() {
        let outcome = Outcome::new();
        outcome.flag_failure("Timeout").unwrap();
        outcome.flag_success("late success");
        assert!(!outcome.succeeded());
        assert_eq!(outcome.report(), "Timeout");
        assert!(!bool::from(&outcome));
    }

    #[test]
    fn test_into_result_keeps_failure_kind() {
        let kind_of = |report: &str| {
            let outcome = Outcome::new();
            outcome.flag_failure(report).unwrap();
            outcome.into_result().unwrap_err().kind()
        };
        assert_eq!(kind_of(TIMEOUT_REPORT), ErrorKind::Timeout);
        assert_eq!(kind_of(CANCELLED_REPORT), ErrorKind::Cancelled);
        assert_eq!(kind_of("No handler for app::Ping"), ErrorKind::Unhandled);
        assert_eq!(kind_of("decoder rejected header"), ErrorKind::LoadFailure);
        assert!(Outcome::new().into_result().is_ok());
    }

    #[test]
    fn test_payload_access() {
        let mut result: PayloadOutcome<u32> = PayloadOutcome::new();
        assert!(!result.has_payload());
        assert_eq!(result.payload().unwrap_err().kind(), ErrorKind::BadCast);

        result.set_payload(7);
        assert!(result.has_payload());
        assert_eq!(*result.payload().unwrap(), 7);
        assert_eq!(result.take_payload().unwrap(), 7);
        assert!(!result.has_payload());
    }
}
