//! Single-axis motion bookkeeping and the hand-off to the step pulse generator.

use crate::{Direction, DistanceMode};

/// A batch of step pulses for the pulse generator.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StepJob {
    /// Number of pulses, always positive.
    pub count: u32,
    /// Pulse rate in Hz.
    pub rate_hz: f32,
    pub direction: Direction,
    /// Whether each pulse also advances the desired position (planned moves) or only the
    /// commanded one (direct stepping).
    pub track_desired: bool,
}

/// Background pulse generator.
///
/// Implementations return immediately and later issue `job.count` calls to
/// [`StepperMotor::step`](crate::StepperMotor::step) at `job.rate_hz`.
pub trait StepScheduler {
    fn schedule(&mut self, job: StepJob);
}

/// Distance mode and the rates remembered between motion commands.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Planner {
    distance_mode: DistanceMode,
    last_feed_rate: f32,
    last_step_rate: f32,
}

impl Default for Planner {
    fn default() -> Self {
        Self::new()
    }
}

impl Planner {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            distance_mode: DistanceMode::Absolute,
            last_feed_rate: 0.0,
            last_step_rate: 0.0,
        }
    }

    #[must_use]
    pub const fn distance_mode(&self) -> DistanceMode {
        self.distance_mode
    }

    pub const fn set_distance_mode(&mut self, mode: DistanceMode) {
        self.distance_mode = mode;
    }

    /// Returns `rate` if it is positive, otherwise the previous feed rate. The result is
    /// remembered for the next move.
    pub fn feed_rate(&mut self, rate: Option<f32>) -> f32 {
        if let Some(rate) = rate.filter(|rate| *rate > 0.0) {
            self.last_feed_rate = rate;
        }
        self.last_feed_rate
    }

    /// Same as [`Planner::feed_rate`] for direct step rates.
    pub fn step_rate(&mut self, rate: Option<f32>) -> f32 {
        if let Some(rate) = rate.filter(|rate| *rate > 0.0) {
            self.last_step_rate = rate;
        }
        self.last_step_rate
    }

    #[must_use]
    pub const fn last_feed_rate(&self) -> f32 {
        self.last_feed_rate
    }

    #[must_use]
    pub const fn last_step_rate(&self) -> f32 {
        self.last_step_rate
    }

    /// Steps still to travel for a move to `target` microsteps, given the desired position.
    #[must_use]
    pub const fn travel(&self, target: i32, desired_step: i32) -> i32 {
        match self.distance_mode {
            DistanceMode::Absolute => target.saturating_sub(desired_step),
            DistanceMode::Incremental => target,
        }
    }
}

impl StepJob {
    /// Splits a signed step count into magnitude and direction.
    #[must_use]
    pub const fn from_signed(count: i32, rate_hz: f32, track_desired: bool) -> Self {
        Self {
            count: count.unsigned_abs(),
            rate_hz,
            direction: Direction::of(count),
            track_desired,
        }
    }
}
