//! Time primitives
//!
//! - [`DeltaTime`] / [`DeltaTimer`]: per-frame steady-clock intervals
//! - [`TimeSpan`]: value-type durations with named fields
//! - [`Timer`]: tick-count or deadline scheduler with cancellation

use std::fmt;
use std::time::{Duration, Instant};

use crate::cancellation::{CancellationSource, CancellationToken};
use crate::error::{EngineError, EngineResult};

/// Interval between two frames
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DeltaTime {
    pub seconds: f64,
    pub milliseconds: f64,
}

impl DeltaTime {
    /// Build from seconds
    pub fn from_seconds(seconds: f64) -> Self {
        Self {
            seconds,
            milliseconds: seconds * 1000.0,
        }
    }

    /// Build from a duration
    pub fn from_duration(duration: Duration) -> Self {
        Self::from_seconds(duration.as_secs_f64())
    }

    /// Clamp to at most `max_seconds`
    pub fn clamped(self, max_seconds: f64) -> Self {
        if self.seconds > max_seconds {
            Self::from_seconds(max_seconds)
        } else {
            self
        }
    }
}

/// Produces [`DeltaTime`]s from the steady clock
#[derive(Debug, Clone)]
pub struct DeltaTimer {
    last: Instant,
}

impl DeltaTimer {
    pub fn new() -> Self {
        Self { last: Instant::now() }
    }

    /// Interval since the previous call (or construction); resets the reference point
    pub fn tick(&mut self) -> DeltaTime {
        let now = Instant::now();
        let delta = now.saturating_duration_since(self.last);
        self.last = now;
        DeltaTime::from_duration(delta)
    }

    /// Reset the reference point without producing a delta
    pub fn reset(&mut self) {
        self.last = Instant::now();
    }
}

impl Default for DeltaTimer {
    fn default() -> Self {
        Self::new()
    }
}

/// Duration expressed as named fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TimeSpan {
    pub milliseconds: u64,
    pub seconds: u64,
    pub minutes: u64,
    pub hours: u64,
    pub days: u64,
}

impl TimeSpan {
    pub const ZERO: TimeSpan = TimeSpan {
        milliseconds: 0,
        seconds: 0,
        minutes: 0,
        hours: 0,
        days: 0,
    };

    pub const fn from_millis(milliseconds: u64) -> Self {
        Self { milliseconds, ..Self::ZERO }
    }

    pub const fn from_secs(seconds: u64) -> Self {
        Self { seconds, ..Self::ZERO }
    }

    pub const fn from_mins(minutes: u64) -> Self {
        Self { minutes, ..Self::ZERO }
    }

    /// Normalize every field into one duration. Saturates at
    /// [`Duration::MAX`].
    pub fn to_duration(&self) -> Duration {
        let seconds = self
            .seconds
            .saturating_add(self.minutes.saturating_mul(60))
            .saturating_add(self.hours.saturating_mul(60 * 60))
            .saturating_add(self.days.saturating_mul(60 * 60 * 24));
        Duration::from_secs(seconds).saturating_add(Duration::from_millis(self.milliseconds))
    }

    /// True when every field is zero
    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }
}

impl From<Duration> for TimeSpan {
    fn from(duration: Duration) -> Self {
        Self::from_millis(duration.as_millis() as u64)
    }
}

impl fmt::Display for TimeSpan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.to_duration().as_millis())
    }
}

type TickCallback = Box<dyn FnMut(u32) + Send>;
type SignalCallback = Box<dyn FnMut() + Send>;

#[derive(Debug, Clone, Copy)]
enum TimerMode {
    /// Already up; used for undelayed work
    Immediate,
    Ticks { total: u32, remaining: u32 },
    /// `None` when the deadline lies beyond what `Instant` can represent
    Time { span: Duration, deadline: Option<Instant> },
}

/// Tick-count or deadline timer
pub struct Timer {
    mode: TimerMode,
    source: CancellationSource,
    time_up_signaled: bool,
    cancel_signaled: bool,
    on_tick: Option<TickCallback>,
    on_time_up: Option<SignalCallback>,
    on_cancel: Option<SignalCallback>,
}

impl Timer {
    /// A timer that is already up
    pub fn immediate() -> Self {
        Self::with_mode(TimerMode::Immediate)
    }

    /// Up after `ticks` calls to [`Timer::tick`]
    pub fn for_ticks(ticks: u32) -> EngineResult<Self> {
        if ticks == 0 {
            return Err(EngineError::invalid_argument("tick timer needs a positive count"));
        }
        Ok(Self::with_mode(TimerMode::Ticks {
            total: ticks,
            remaining: ticks,
        }))
    }

    /// Up once `now >= start + span`. A span too large to add to `start`
    /// never comes up.
    pub fn for_time_span(span: TimeSpan, start: Instant) -> Self {
        let span = span.to_duration();
        Self::with_mode(TimerMode::Time {
            span,
            deadline: start.checked_add(span),
        })
    }

    fn with_mode(mode: TimerMode) -> Self {
        Self {
            mode,
            source: CancellationSource::new(),
            time_up_signaled: false,
            cancel_signaled: false,
            on_tick: None,
            on_time_up: None,
            on_cancel: None,
        }
    }

    /// Called with the remaining count after each tick
    pub fn on_tick(&mut self, callback: impl FnMut(u32) + Send + 'static) {
        self.on_tick = Some(Box::new(callback));
    }

    /// Called once when the timer comes up
    pub fn on_time_up(&mut self, callback: impl FnMut() + Send + 'static) {
        self.on_time_up = Some(Box::new(callback));
    }

    /// Called once when the timer is cancelled
    pub fn on_cancel(&mut self, callback: impl FnMut() + Send + 'static) {
        self.on_cancel = Some(Box::new(callback));
    }

    /// Decrement a tick timer; true when the remaining count reaches zero
    pub fn tick(&mut self) -> bool {
        if self.observe_cancel() {
            return false;
        }
        let remaining = match &mut self.mode {
            TimerMode::Ticks { remaining, .. } if *remaining > 0 => {
                *remaining -= 1;
                *remaining
            }
            _ => return false,
        };
        if let Some(callback) = self.on_tick.as_mut() {
            callback(remaining);
        }
        if remaining == 0 {
            self.mark_time_up();
            return true;
        }
        false
    }

    /// Whether the timer is up at `now`. Cancelled timers are never up.
    pub fn is_time_up(&mut self, now: Instant) -> bool {
        if self.observe_cancel() {
            return false;
        }
        let up = match self.mode {
            TimerMode::Immediate => true,
            TimerMode::Ticks { remaining, .. } => remaining == 0,
            TimerMode::Time { deadline, .. } => deadline.map_or(false, |deadline| now >= deadline),
        };
        if up {
            self.mark_time_up();
        }
        up
    }

    /// Remaining ticks for a tick timer
    pub fn remaining_ticks(&self) -> Option<u32> {
        match self.mode {
            TimerMode::Ticks { remaining, .. } => Some(remaining),
            _ => None,
        }
    }

    /// Deadline for a time timer
    pub fn deadline(&self) -> Option<Instant> {
        match self.mode {
            TimerMode::Time { deadline, .. } => deadline,
            _ => None,
        }
    }

    /// Cancel; fires the cancel callback exactly once
    pub fn cancel(&mut self) {
        self.source.cancel();
        self.observe_cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.source.is_cancelled()
    }

    /// Token observing this timer's cancellation
    pub fn token(&self) -> CancellationToken {
        self.source.token()
    }

    /// Restore the count or deadline and issue a fresh cancellation source
    pub fn reset(&mut self) {
        self.mode = match self.mode {
            TimerMode::Immediate => TimerMode::Immediate,
            TimerMode::Ticks { total, .. } => TimerMode::Ticks {
                total,
                remaining: total,
            },
            TimerMode::Time { span, .. } => TimerMode::Time {
                span,
                deadline: Instant::now().checked_add(span),
            },
        };
        self.source = CancellationSource::new();
        self.time_up_signaled = false;
        self.cancel_signaled = false;
    }

    fn mark_time_up(&mut self) {
        if self.time_up_signaled {
            return;
        }
        self.time_up_signaled = true;
        if let Some(callback) = self.on_time_up.as_mut() {
            callback();
        }
    }

    fn observe_cancel(&mut self) -> bool {
        if !self.source.is_cancelled() {
            return false;
        }
        if !self.cancel_signaled {
            self.cancel_signaled = true;
            if let Some(callback) = self.on_cancel.as_mut() {
                callback();
            }
        }
        true
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::immediate()
    }
}

impl fmt::Debug for Timer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Timer")
            .field("mode", &self.mode)
            .field("cancelled", &self.is_cancelled())
            .field("time_up_signaled", &self.time_up_signaled)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_time_span_normalizes() {
        let span = TimeSpan {
            milliseconds: 500,
            seconds: 1,
            minutes: 1,
            hours: 0,
            days: 0,
        };
        assert_eq!(span.to_duration(), Duration::from_millis(61_500));
        assert!(TimeSpan::default().is_zero());
        assert!(!span.is_zero());
    }

    #[test]
    fn test_delta_timer_ticks_forward() {
        let mut timer = DeltaTimer::new();
        std::thread::sleep(Duration::from_millis(2));
        let dt = timer.tick();
        assert!(dt.seconds > 0.0);
        assert!((dt.milliseconds - dt.seconds * 1000.0).abs() < 1e-9);
    }

    #[test]
    fn test_tick_timer_fires_time_up_once() {
        let fired = Arc::new(AtomicU32::new(0));
        let mut timer = Timer::for_ticks(3).unwrap();
        let counter = fired.clone();
        timer.on_time_up(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(!timer.tick());
        assert!(!timer.tick());
        assert!(timer.tick());
        assert!(!timer.tick());
        assert!(timer.is_time_up(Instant::now()));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_zero_ticks_rejected() {
        assert!(Timer::for_ticks(0).is_err());
    }

    #[test]
    fn test_deadline_timer() {
        let start = Instant::now();
        let mut timer = Timer::for_time_span(TimeSpan::from_millis(10), start);
        assert!(!timer.is_time_up(start));
        assert!(timer.is_time_up(start + Duration::from_millis(10)));
    }

    #[test]
    fn test_huge_spans_saturate() {
        let span = TimeSpan {
            days: u64::MAX,
            hours: u64::MAX,
            ..TimeSpan::ZERO
        };
        assert_eq!(span.to_duration(), Duration::MAX);

        let start = Instant::now();
        let mut timer = Timer::for_time_span(TimeSpan::from_secs(u64::MAX / 2), start);
        assert_eq!(timer.deadline(), None);
        assert!(!timer.is_time_up(start + Duration::from_secs(60 * 60)));
        timer.reset();
        assert!(!timer.is_time_up(Instant::now()));
    }

    #[test]
    fn test_cancel_fires_once_and_blocks_time_up() {
        let cancels = Arc::new(AtomicU32::new(0));
        let ups = Arc::new(AtomicU32::new(0));
        let mut timer = Timer::for_ticks(1).unwrap();
        let c = cancels.clone();
        timer.on_cancel(move || {
            c.fetch_add(1, Ordering::SeqCst);
        });
        let u = ups.clone();
        timer.on_time_up(move || {
            u.fetch_add(1, Ordering::SeqCst);
        });

        let token = timer.token();
        timer.cancel();
        timer.cancel();
        assert!(token.is_cancelled());
        assert!(!timer.tick());
        assert!(!timer.is_time_up(Instant::now()));
        assert_eq!(cancels.load(Ordering::SeqCst), 1);
        assert_eq!(ups.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_reset_issues_fresh_source() {
        let mut timer = Timer::for_ticks(2).unwrap();
        let old_token = timer.token();
        timer.cancel();
        timer.reset();
        assert!(old_token.is_cancelled());
        assert!(!timer.is_cancelled());
        assert_eq!(timer.remaining_ticks(), Some(2));
        assert!(!timer.tick());
        assert!(timer.tick());
    }

    #[test]
    fn test_on_tick_reports_remaining() {
        let last = Arc::new(AtomicU32::new(99));
        let mut timer = Timer::for_ticks(2).unwrap();
        let l = last.clone();
        timer.on_tick(move |remaining| l.store(remaining, Ordering::SeqCst));
        timer.tick();
        assert_eq!(last.load(Ordering::SeqCst), 1);
        timer.tick();
        assert_eq!(last.load(Ordering::SeqCst), 0);
    }
}
