//! H-bridge outputs for the two motor phases.

use embedded_hal::PwmPin;
use embedded_hal::digital::v2::OutputPin;

use crate::{BOARD_VOLTAGE, CURRENT_SENSE_RESISTOR, CoilState, Error, PWM_MAX_DUTY_CYCLE};

type Result<T> = core::result::Result<T, Error>;

/// One motor phase as seen by the drive engine.
pub trait CoilOutput {
    /// Puts the bridge into `state` and sets the chopper duty.
    ///
    /// # Errors
    /// Returns `Error::Pin` if an output refuses the write.
    fn apply(&mut self, state: CoilState, duty: u16) -> Result<()>;
}

/// Converts a coil current (mA, sign ignored) into a PWM duty in `0..=PWM_MAX_DUTY_CYCLE`.
#[must_use]
pub fn current_to_pwm(milliamps: i32) -> u16 {
    let duty = (u64::from(PWM_MAX_DUTY_CYCLE)
        * u64::from(CURRENT_SENSE_RESISTOR)
        * u64::from(milliamps.unsigned_abs()))
        / (u64::from(BOARD_VOLTAGE) * 100);
    u16::try_from(duty).map_or(PWM_MAX_DUTY_CYCLE, |duty| duty.min(PWM_MAX_DUTY_CYCLE))
}

/// Two direction pins and a current-setting PWM channel.
///
/// Direction pins are only rewritten when the bridge state changes; the duty is written
/// on every call.
#[derive(Debug)]
pub struct HBridge<D1, D2, P> {
    dir1: D1,
    dir2: D2,
    pwm: P,
    previous: CoilState,
}

impl<D1, D2, P> HBridge<D1, D2, P>
where
    D1: OutputPin,
    D2: OutputPin,
    P: PwmPin<Duty = u16>,
{
    /// Takes ownership of the outputs and enables the PWM channel at zero duty.
    pub fn new(dir1: D1, dir2: D2, mut pwm: P) -> Self {
        pwm.set_duty(0);
        pwm.enable();
        Self {
            dir1,
            dir2,
            pwm,
            previous: CoilState::NotSet,
        }
    }

    /// Last state written to the direction pins.
    #[must_use]
    pub const fn state(&self) -> CoilState {
        self.previous
    }

    /// Returns the owned outputs.
    pub fn release(self) -> (D1, D2, P) {
        (self.dir1, self.dir2, self.pwm)
    }

    fn write_pins(&mut self, (first, second): (bool, bool)) -> Result<()> {
        set_level(&mut self.dir1, first)?;
        set_level(&mut self.dir2, second)
    }
}

fn set_level<O: OutputPin>(pin: &mut O, high: bool) -> Result<()> {
    if high {
        pin.set_high().map_err(|_| Error::Pin)
    } else {
        pin.set_low().map_err(|_| Error::Pin)
    }
}

impl<D1, D2, P> CoilOutput for HBridge<D1, D2, P>
where
    D1: OutputPin,
    D2: OutputPin,
    P: PwmPin<Duty = u16>,
{
    fn apply(&mut self, state: CoilState, duty: u16) -> Result<()> {
        if state != self.previous {
            // No current while the bridge switches over.
            self.pwm.set_duty(0);
            if let Some(levels) = state.pin_levels() {
                self.write_pins(levels)?;
            }
            self.previous = state;
        }
        self.pwm.set_duty(duty.min(PWM_MAX_DUTY_CYCLE));
        Ok(())
    }
}
