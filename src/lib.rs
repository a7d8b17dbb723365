//! A `no_std` closed-loop stepper drive engine for **MKS SERVO42** boards.
//!
//! The crate turns the board's ASCII motion/configuration protocol into sine-commutated
//! two-phase coil excitation, tracks position through the step input counter and the
//! magnetic encoder, and closes a PID loop around the position error.
//!
//! Hardware is reached only through traits (`embedded-hal` pins for the H-bridges, plus the
//! [`Encoder`], [`PulseCounter`], [`StepScheduler`], [`ParameterStore`], [`MessageBus`] and
//! [`Console`] seams), so the whole engine runs on a host in tests.
//!
//! ```rust,ignore
//! let mut fw = Firmware::new(motor, Settings::default());
//! let reply = fw.execute("M350 V16", &mut services);
//! assert_eq!(reply, Reply::Feedback(Feedback::Ok));
//! ```

#![cfg_attr(not(test), no_std)]

#[macro_use]
mod fmt;

pub mod coil;
pub mod counter;
pub mod current;
pub mod direction;
pub mod enums;
mod errors;
pub mod firmware;
pub mod helpers;
pub mod motor;
pub mod parser;
pub mod pid;
pub mod planner;
pub mod response;
pub mod settings;
pub mod sine;

pub use coil::{CoilOutput, HBridge, current_to_pwm};
pub use counter::{OverflowOffset, PulseCounter, StepCounter};
pub use current::CurrentPolicy;
pub use direction::{Direction, StepSource};
pub use enums::{Axis, BusId, CoilState, DistanceMode, MotorState};
pub use errors::Error;
pub use firmware::{Console, Firmware, MessageBus, Services, dip_microstepping};
pub use helpers::{EncoderValue, angle_to_steps, encoder_val_to_degrees, normalize_degrees};
pub use motor::{Encoder, MotorConfig, StepperMotor};
pub use parser::{Command, Family, parse_string, parse_value};
pub use pid::Pid;
pub use planner::{Planner, StepJob, StepScheduler};
pub use response::{Feedback, InvalidFeedback, Reply};
pub use settings::{ParameterStore, Settings};

/// Firmware version reported by `M115`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Largest microstep divisor the commutation table resolves.
pub const MAX_MICROSTEP_DIVISOR: u16 = 32;
/// Microstep divisor used until one is configured.
pub const DEFAULT_MICROSTEP_DIVISOR: u16 = 16;
/// Full step angle (degrees) of the stock 1.8° motor.
pub const DEFAULT_FULL_STEP_ANGLE: f32 = 1.8;
/// Extra microsteps applied per step pulse.
pub const DEFAULT_MICROSTEP_MULTIPLIER: f32 = 1.0;

/// Board RMS current ceiling in mA.
pub const MAX_RMS_BOARD_CURRENT: u16 = 2500;
/// Board peak current ceiling in mA.
pub const MAX_PEAK_BOARD_CURRENT: u16 = 3300;
/// RMS current (mA) used until one is configured.
pub const DEFAULT_RMS_CURRENT: u16 = 1000;

/// Current sense resistor, in hundredths of an ohm.
pub const CURRENT_SENSE_RESISTOR: u32 = 50;
/// Reference voltage seen by the current chopper, in millivolts.
pub const BOARD_VOLTAGE: u32 = 3300;
/// Highest duty value written to a coil PWM channel.
pub const PWM_MAX_DUTY_CYCLE: u16 = 4095;

/// Period of the hardware step counter.
pub const COUNTER_PERIOD: i32 = 0x1_0000;

/// Default proportional gain of the position loop.
pub const DEFAULT_P: f32 = 1.0;
/// Default integral gain of the position loop.
pub const DEFAULT_I: f32 = 0.0;
/// Default derivative gain of the position loop.
pub const DEFAULT_D: f32 = 0.0;
/// Default anti-windup bound on the integral term.
pub const DEFAULT_MAX_I: f32 = 10.0;
/// Correction bounds of the position loop, in microsteps per tick.
pub const DEFAULT_PID_STEP_MIN: f32 = -32.0;
/// See [`DEFAULT_PID_STEP_MIN`].
pub const DEFAULT_PID_STEP_MAX: f32 = 32.0;
