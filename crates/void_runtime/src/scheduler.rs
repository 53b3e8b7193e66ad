//! Fixed-step accumulator
//!
//! Variable frame deltas feed an accumulator that is drained in whole fixed
//! steps, at most `max_sub_steps` per tick. Whatever the cap leaves behind is
//! clamped to `fixed_step * max_sub_steps` so a slow frame cannot snowball.

use void_core::DeltaTime;
use void_plugin::LoadedPlugin;

/// Tolerance for accumulated rounding when comparing against the step
const STEP_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone)]
pub struct FrameScheduler {
    fixed_step: f64,
    max_sub_steps: u32,
    accumulator: f64,
}

impl FrameScheduler {
    pub fn new(fixed_step: f64, max_sub_steps: u32) -> Self {
        Self {
            fixed_step,
            max_sub_steps,
            accumulator: 0.0,
        }
    }

    pub fn fixed_step(&self) -> f64 {
        self.fixed_step
    }

    pub fn max_sub_steps(&self) -> u32 {
        self.max_sub_steps
    }

    /// Time carried into the next tick
    pub fn accumulator(&self) -> f64 {
        self.accumulator
    }

    pub fn reset(&mut self) {
        self.accumulator = 0.0;
    }

    /// Run fixed updates on every plugin, in order, for each whole step in
    /// the accumulator. Returns the number of steps taken.
    pub fn advance(&mut self, dt: &DeltaTime, plugins: &mut [LoadedPlugin]) -> u32 {
        self.advance_with(dt, |step| {
            for plugin in plugins.iter_mut() {
                plugin.fixed_update(step);
            }
        })
    }

    /// Like [`advance`](Self::advance) with a custom step callback
    pub fn advance_with(&mut self, dt: &DeltaTime, mut on_step: impl FnMut(&DeltaTime)) -> u32 {
        self.accumulator += dt.seconds.max(0.0);

        let step = DeltaTime::from_seconds(self.fixed_step);
        let mut steps = 0;
        while self.accumulator + STEP_EPSILON >= self.fixed_step && steps < self.max_sub_steps {
            on_step(&step);
            self.accumulator = (self.accumulator - self.fixed_step).max(0.0);
            steps += 1;
        }

        let cap = self.fixed_step * f64::from(self.max_sub_steps);
        if self.accumulator > cap {
            log::trace!("Fixed-step backlog {:.4}s clamped to {:.4}s", self.accumulator, cap);
            self.accumulator = cap;
        }
        steps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(scheduler: &mut FrameScheduler, dt: f64, ticks: usize) -> Vec<u32> {
        let dt = DeltaTime::from_seconds(dt);
        (0..ticks).map(|_| scheduler.advance_with(&dt, |_| {})).collect()
    }

    #[test]
    fn test_even_frames() {
        let mut scheduler = FrameScheduler::new(0.02, 4);
        let dt = DeltaTime::from_seconds(0.04);
        for _ in 0..5 {
            assert_eq!(scheduler.advance_with(&dt, |_| {}), 2);
            assert!(scheduler.accumulator() <= 0.08);
        }
    }

    #[test]
    fn test_remainder_carries_over() {
        let mut scheduler = FrameScheduler::new(0.02, 4);
        assert_eq!(run(&mut scheduler, 0.05, 5), vec![2, 3, 2, 3, 2]);
        assert!(scheduler.accumulator() <= 0.08);
    }

    #[test]
    fn test_backlog_is_capped() {
        let mut scheduler = FrameScheduler::new(0.02, 4);
        assert_eq!(run(&mut scheduler, 0.25, 1), vec![4]);
        assert!((scheduler.accumulator() - 0.08).abs() < 1e-12);
        // Backlog drains at the cap, never above it
        assert_eq!(run(&mut scheduler, 0.0, 2), vec![4, 0]);
    }

    #[test]
    fn test_step_delta_is_fixed() {
        let mut scheduler = FrameScheduler::new(0.016, 8);
        let mut seen = Vec::new();
        scheduler.advance_with(&DeltaTime::from_seconds(0.033), |step| seen.push(step.seconds));
        assert_eq!(seen, vec![0.016, 0.016]);
    }

    #[test]
    fn test_short_frames_accumulate() {
        let mut scheduler = FrameScheduler::new(0.02, 4);
        assert_eq!(run(&mut scheduler, 0.008, 5), vec![0, 0, 1, 0, 1]);
    }
}
