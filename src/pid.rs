//! Position loop.

use crate::{
    DEFAULT_D, DEFAULT_I, DEFAULT_MAX_I, DEFAULT_P, DEFAULT_PID_STEP_MAX, DEFAULT_PID_STEP_MIN,
};

/// Discrete PID controller, advanced one iteration per [`Pid::compute`] call.
///
/// The integral term is bounded by `±max_i`, the output by `[output_min, output_max]`.
/// The derivative acts on the measurement, so setpoint jumps do not kick the output.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Pid {
    kp: f32,
    ki: f32,
    kd: f32,
    max_i: f32,
    output_min: f32,
    output_max: f32,
    setpoint: f32,
    iterm: f32,
    last_input: Option<f32>,
    last_output: f32,
}

impl Default for Pid {
    fn default() -> Self {
        Self::new(DEFAULT_P, DEFAULT_I, DEFAULT_D)
    }
}

impl Pid {
    #[must_use]
    pub const fn new(kp: f32, ki: f32, kd: f32) -> Self {
        Self {
            kp,
            ki,
            kd,
            max_i: DEFAULT_MAX_I,
            output_min: DEFAULT_PID_STEP_MIN,
            output_max: DEFAULT_PID_STEP_MAX,
            setpoint: 0.0,
            iterm: 0.0,
            last_input: None,
            last_output: 0.0,
        }
    }

    #[must_use]
    pub const fn p(&self) -> f32 {
        self.kp
    }

    #[must_use]
    pub const fn i(&self) -> f32 {
        self.ki
    }

    #[must_use]
    pub const fn d(&self) -> f32 {
        self.kd
    }

    #[must_use]
    pub const fn max_i(&self) -> f32 {
        self.max_i
    }

    pub const fn set_p(&mut self, kp: f32) {
        self.kp = kp;
    }

    pub const fn set_i(&mut self, ki: f32) {
        self.ki = ki;
    }

    pub const fn set_d(&mut self, kd: f32) {
        self.kd = kd;
    }

    /// Sets the windup bound; the sign is ignored, non-finite bounds are rejected.
    pub fn set_max_i(&mut self, max_i: f32) {
        if !max_i.is_finite() {
            return;
        }
        self.max_i = libm::fabsf(max_i);
        self.iterm = self.iterm.clamp(-self.max_i, self.max_i);
    }

    /// Ignored unless `min < max`.
    pub fn set_output_limits(&mut self, min: f32, max: f32) {
        if min.is_nan() || max.is_nan() || min >= max {
            return;
        }
        self.output_min = min;
        self.output_max = max;
        self.last_output = self.last_output.clamp(min, max);
    }

    #[must_use]
    pub const fn output_limits(&self) -> (f32, f32) {
        (self.output_min, self.output_max)
    }

    #[must_use]
    pub const fn setpoint(&self) -> f32 {
        self.setpoint
    }

    pub const fn set_setpoint(&mut self, setpoint: f32) {
        self.setpoint = setpoint;
    }

    #[must_use]
    pub const fn last_output(&self) -> f32 {
        self.last_output
    }

    /// Clears the accumulated state.
    pub const fn reset(&mut self) {
        self.iterm = 0.0;
        self.last_input = None;
        self.last_output = 0.0;
    }

    /// Runs one iteration on the measured `input` and returns the bounded output.
    pub fn compute(&mut self, input: f32) -> f32 {
        let error = self.setpoint - input;

        self.iterm = (self.iterm + self.ki * error).clamp(-self.max_i, self.max_i);
        let d_input = self.last_input.map_or(0.0, |last| input - last);

        let output = (self.kp * error + self.iterm - self.kd * d_input)
            .clamp(self.output_min, self.output_max);

        self.last_input = Some(input);
        self.last_output = output;
        output
    }
}
