//! Motor state machine, angle/step bookkeeping and coil commutation.

use libm::roundf;

use crate::coil::{CoilOutput, current_to_pwm};
use crate::helpers::{EncoderValue, angle_to_steps, normalize_degrees, speed_to_hz};
use crate::{
    CoilState, CurrentPolicy, DEFAULT_FULL_STEP_ANGLE, DEFAULT_MICROSTEP_DIVISOR,
    DEFAULT_MICROSTEP_MULTIPLIER, Error, MAX_MICROSTEP_DIVISOR, MotorState, StepSource,
};

type Result<T> = core::result::Result<T, Error>;

/// Full step angles (degrees) the engine accepts.
pub const FULL_STEP_ANGLES: [f32; 2] = [1.8, 0.9];

/// Magnetic shaft encoder.
pub trait Encoder {
    /// Multi-turn shaft position.
    fn read(&mut self) -> EncoderValue;

    /// Angular velocity in degrees per second.
    fn speed(&mut self) -> f32;

    /// Angular acceleration in degrees per second squared.
    fn acceleration(&mut self) -> f32;

    /// Re-zeroes the encoder against the current rotor position.
    fn calibrate(&mut self);

    /// Multi-turn shaft angle in degrees.
    fn absolute_angle(&mut self) -> f32 {
        self.read().to_degrees()
    }

    /// Filtered multi-turn angle, used for tuning telemetry.
    fn absolute_angle_avg(&mut self) -> f32 {
        self.absolute_angle()
    }
}

/// Step geometry and current settings of the motor.
///
/// `microstep_angle` is derived and recomputed on every change of its inputs.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct MotorConfig {
    full_step_angle: f32,
    microstep_divisor: u16,
    microstep_angle: f32,
    microstep_multiplier: f32,
    microstep_locked: bool,
    /// Invert the DIR input.
    pub reversed: bool,
    /// Invert the EN input.
    pub enable_inverted: bool,
    pub current: CurrentPolicy,
}

impl Default for MotorConfig {
    fn default() -> Self {
        Self {
            full_step_angle: DEFAULT_FULL_STEP_ANGLE,
            microstep_divisor: DEFAULT_MICROSTEP_DIVISOR,
            microstep_angle: DEFAULT_FULL_STEP_ANGLE / f32::from(DEFAULT_MICROSTEP_DIVISOR),
            microstep_multiplier: DEFAULT_MICROSTEP_MULTIPLIER,
            microstep_locked: false,
            reversed: false,
            enable_inverted: false,
            current: CurrentPolicy::default(),
        }
    }
}

impl MotorConfig {
    #[must_use]
    pub const fn full_step_angle(&self) -> f32 {
        self.full_step_angle
    }

    /// Sets the full step angle.
    ///
    /// # Errors
    /// Returns `Error::InvalidValue` unless `angle` is 1.8 or 0.9.
    pub fn set_full_step_angle(&mut self, angle: f32) -> Result<()> {
        if !FULL_STEP_ANGLES.contains(&angle) {
            return Err(Error::InvalidValue);
        }
        self.full_step_angle = angle;
        self.update_microstep_angle();
        Ok(())
    }

    #[must_use]
    pub const fn microstepping(&self) -> u16 {
        self.microstep_divisor
    }

    /// Sets the microstep divisor. With `lock` set, later dip switch reads are ignored.
    ///
    /// # Errors
    /// Returns `Error::InvalidValue` unless `divisor` is a power of two up to
    /// `MAX_MICROSTEP_DIVISOR`.
    pub fn set_microstepping(&mut self, divisor: u16, lock: bool) -> Result<()> {
        if !divisor.is_power_of_two() || divisor > MAX_MICROSTEP_DIVISOR {
            return Err(Error::InvalidValue);
        }
        self.microstep_divisor = divisor;
        self.microstep_locked |= lock;
        self.update_microstep_angle();
        Ok(())
    }

    /// Applies a divisor read from the dip switches unless one was set explicitly.
    ///
    /// # Errors
    /// See [`MotorConfig::set_microstepping`].
    pub fn set_microstepping_from_dips(&mut self, divisor: u16) -> Result<()> {
        if self.microstep_locked {
            return Ok(());
        }
        self.set_microstepping(divisor, false)
    }

    #[must_use]
    pub const fn microstep_locked(&self) -> bool {
        self.microstep_locked
    }

    #[must_use]
    pub const fn microstep_angle(&self) -> f32 {
        self.microstep_angle
    }

    #[must_use]
    pub fn microsteps_per_rotation(&self) -> i32 {
        angle_to_steps(360.0, self.microstep_angle)
    }

    #[must_use]
    pub const fn microstep_multiplier(&self) -> f32 {
        self.microstep_multiplier
    }

    /// # Errors
    /// Returns `Error::InvalidValue` for negative or non-finite multipliers.
    pub fn set_microstep_multiplier(&mut self, multiplier: f32) -> Result<()> {
        if !multiplier.is_finite() || multiplier < 0.0 {
            return Err(Error::InvalidValue);
        }
        self.microstep_multiplier = multiplier;
        Ok(())
    }

    fn update_microstep_angle(&mut self) {
        self.microstep_angle = self.full_step_angle / f32::from(self.microstep_divisor);
    }
}

/// Stepper drive engine for one motor.
#[derive(Debug)]
pub struct StepperMotor<A, B, E> {
    coil_a: A,
    coil_b: B,
    encoder: E,
    config: MotorConfig,
    state: MotorState,
    current_angle: f32,
    desired_angle: f32,
    current_step: i32,
    desired_step: i32,
}

impl<A, B, E> StepperMotor<A, B, E>
where
    A: CoilOutput,
    B: CoilOutput,
    E: Encoder,
{
    /// Creates a motor in [`MotorState::NotSet`] with its coils untouched.
    pub fn new(coil_a: A, coil_b: B, encoder: E, config: MotorConfig) -> Self {
        Self {
            coil_a,
            coil_b,
            encoder,
            config,
            state: MotorState::NotSet,
            current_angle: 0.0,
            desired_angle: 0.0,
            current_step: 0,
            desired_step: 0,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &MotorConfig {
        &self.config
    }

    pub const fn config_mut(&mut self) -> &mut MotorConfig {
        &mut self.config
    }

    pub const fn encoder_mut(&mut self) -> &mut E {
        &mut self.encoder
    }

    #[must_use]
    pub const fn coils(&self) -> (&A, &B) {
        (&self.coil_a, &self.coil_b)
    }

    #[must_use]
    pub const fn state(&self) -> MotorState {
        self.state
    }

    /// Moves the enable state machine.
    ///
    /// Forced transitions always apply. Unforced ones only leave plain `Enabled` or
    /// `Disabled`, so an operator override is never undone by automatic logic.
    /// `NotSet` cannot be re-entered.
    ///
    /// # Errors
    /// Returns `Error::Pin` if the coils cannot be written.
    pub fn set_state(&mut self, target: MotorState, force: bool) -> Result<()> {
        if target == self.state || target == MotorState::NotSet {
            return Ok(());
        }
        if !force && !matches!(self.state, MotorState::Enabled | MotorState::Disabled) {
            debug!("state change to {} ignored while {}", target, self.state);
            return Ok(());
        }

        match target {
            MotorState::Enabled | MotorState::ForcedEnabled => self.hold_position()?,
            MotorState::NotSet
            | MotorState::Disabled
            | MotorState::ForcedDisabled
            | MotorState::Overtemp => self.idle_coils()?,
        }
        info!("motor state {} -> {}", self.state, target);
        self.state = target;
        Ok(())
    }

    /// Follows the EN input. The level is mapped through `enable_inverted` and applied as an
    /// unforced transition, so a motor forced on or off by command keeps its state.
    ///
    /// # Errors
    /// Returns `Error::Pin` if the coils cannot be written.
    pub fn enable_pin_changed(&mut self, level: bool) -> Result<()> {
        let target = if level == self.config.enable_inverted {
            MotorState::Disabled
        } else {
            MotorState::Enabled
        };
        self.set_state(target, false)
    }

    /// Re-anchors the commanded position on the measured shaft and energizes it there.
    fn hold_position(&mut self) -> Result<()> {
        let angle = self.encoder.absolute_angle();
        self.current_angle = angle;
        self.current_step = angle_to_steps(angle, self.config.microstep_angle);
        self.drive_coils_angle(angle)
    }

    fn idle_coils(&mut self) -> Result<()> {
        self.coil_a.apply(CoilState::Coast, 0)?;
        self.coil_b.apply(CoilState::Coast, 0)
    }

    /// Advances the commanded position by one pulse.
    ///
    /// The increment is one microstep, scaled by the multiplier if `use_multiplier` is set.
    /// `update_desired` also moves the desired position (external commands), plain pulses from
    /// the STEP input leave it alone. Coils are only driven while the motor is enabled.
    ///
    /// # Errors
    /// Returns `Error::Pin` if the coils cannot be written.
    pub fn step(&mut self, source: StepSource, use_multiplier: bool, update_desired: bool) -> Result<()> {
        let mut angle_change = self.config.microstep_angle;
        let mut step_change = 1;
        if use_multiplier {
            angle_change *= self.config.microstep_multiplier;
            #[allow(clippy::cast_possible_truncation)]
            {
                step_change = roundf(self.config.microstep_multiplier) as i32;
            }
        }

        match source {
            StepSource::Pin(high) => {
                if high == self.config.reversed {
                    angle_change = -angle_change;
                }
            }
            StepSource::Clockwise => angle_change = -angle_change,
            StepSource::CounterClockwise => {}
        }
        let step_change = if angle_change < 0.0 { -step_change } else { step_change };

        if update_desired {
            self.desired_angle += angle_change;
            self.desired_step = self.desired_step.wrapping_add(step_change);
        }
        self.current_angle += angle_change;
        self.current_step = self.current_step.wrapping_add(step_change);

        if self.state.is_enabled() {
            self.drive_coils(self.current_step)?;
        }
        Ok(())
    }

    /// Energizes both phases for microstep `steps`, wrapping every electrical cycle.
    ///
    /// # Errors
    /// Returns `Error::Pin` if the coils cannot be written.
    pub fn drive_coils(&mut self, steps: i32) -> Result<()> {
        let divisor = i32::from(self.config.microstep_divisor);
        let phase = steps.rem_euclid(4 * divisor);
        let scale = i32::from(MAX_MICROSTEP_DIVISOR) / divisor;
        #[allow(clippy::cast_sign_loss)]
        let index = (phase * scale) as usize;

        let accel = if self.config.current.is_dynamic() {
            self.encoder.acceleration()
        } else {
            0.0
        };
        let (a, b) = self.config.current.phase_targets(index, accel);
        trace!("drive step {} index {} -> A {} B {}", steps, index, a, b);

        apply_phase(&mut self.coil_a, a)?;
        apply_phase(&mut self.coil_b, b)
    }

    /// Holds the rotor at `angle` degrees, snapped to the nearest microstep.
    ///
    /// # Errors
    /// Returns `Error::Pin` if the coils cannot be written.
    pub fn drive_coils_angle(&mut self, angle: f32) -> Result<()> {
        let microsteps = normalize_degrees(angle) / self.config.full_step_angle
            * f32::from(self.config.microstep_divisor);
        #[allow(clippy::cast_possible_truncation)]
        let index = roundf(microsteps) as i32;
        self.drive_coils(index)
    }

    #[must_use]
    pub const fn current_angle(&self) -> f32 {
        self.current_angle
    }

    #[must_use]
    pub const fn desired_angle(&self) -> f32 {
        self.desired_angle
    }

    pub const fn set_desired_angle(&mut self, angle: f32) {
        self.desired_angle = angle;
    }

    #[must_use]
    pub const fn current_step(&self) -> i32 {
        self.current_step
    }

    #[must_use]
    pub const fn desired_step(&self) -> i32 {
        self.desired_step
    }

    pub const fn set_desired_step(&mut self, step: i32) {
        self.desired_step = step;
    }

    /// Measured minus desired angle, in degrees.
    pub fn angle_error(&mut self) -> f32 {
        self.encoder.absolute_angle() - self.desired_angle
    }

    /// [`StepperMotor::angle_error`] in microsteps.
    pub fn step_error(&mut self) -> i32 {
        let error = self.angle_error();
        angle_to_steps(error, self.config.microstep_angle)
    }

    /// Shaft speed from the encoder, in revolutions per minute.
    pub fn encoder_rpm(&mut self) -> f32 {
        self.encoder.speed() / 6.0
    }

    /// Step rate that turns the shaft at `degrees_per_second`.
    #[must_use]
    pub fn speed_to_hz(&self, degrees_per_second: f32) -> f32 {
        speed_to_hz(degrees_per_second, self.config.microstep_angle)
    }
}

fn apply_phase<C: CoilOutput>(coil: &mut C, target: i32) -> Result<()> {
    match target {
        t if t > 0 => coil.apply(CoilState::Forward, current_to_pwm(t)),
        t if t < 0 => coil.apply(CoilState::Backward, current_to_pwm(t)),
        _ => coil.apply(CoilState::Brake, 0),
    }
}
