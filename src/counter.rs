//! Reconciliation of the hardware step counter with the steps already handled.
//!
//! The STEP input clocks a 16-bit timer. Its update interrupt only has to call
//! [`OverflowOffset::record`]; everything else runs in the foreground.

use core::sync::atomic::{AtomicI32, Ordering};

use crate::motor::{Encoder, StepperMotor};
use crate::{COUNTER_PERIOD, CoilOutput, Direction, Error, StepSource};

/// Raw hardware step counter.
pub trait PulseCounter {
    fn count(&self) -> u16;
    fn set_count(&mut self, value: u16);
}

/// Signed wrap offset of the hardware counter, shared with the overflow interrupt.
#[derive(Debug, Default)]
pub struct OverflowOffset(AtomicI32);

impl OverflowOffset {
    #[must_use]
    pub const fn new() -> Self {
        Self(AtomicI32::new(0))
    }

    /// Records one counter wrap. Safe to call from an interrupt handler.
    pub fn record(&self, direction: Direction) {
        let previous = self
            .0
            .fetch_add(direction.sign().wrapping_mul(COUNTER_PERIOD), Ordering::AcqRel);
        trace!("step counter wrapped {}, offset was {}", direction, previous);
    }

    #[must_use]
    pub fn get(&self) -> i32 {
        self.0.load(Ordering::Acquire)
    }

    fn set(&self, offset: i32) {
        self.0.store(offset, Ordering::Release);
    }
}

/// Hardware step count and the part of it already folded into [`StepperMotor::step`] calls.
#[derive(Debug)]
pub struct StepCounter<'a, C> {
    counter: C,
    overflow: &'a OverflowOffset,
    handled: i32,
}

impl<'a, C: PulseCounter> StepCounter<'a, C> {
    pub const fn new(counter: C, overflow: &'a OverflowOffset) -> Self {
        Self {
            counter,
            overflow,
            handled: 0,
        }
    }

    /// Total pulses seen by the hardware, overflow corrected.
    #[must_use]
    pub fn hardware_count(&self) -> i32 {
        loop {
            let offset = self.overflow.get();
            let raw = self.counter.count();
            // An overflow between the two reads would pair a wrapped raw value with a stale offset.
            if self.overflow.get() == offset {
                return i32::from(raw).wrapping_add(offset);
            }
        }
    }

    /// Loads the hardware counter so that [`StepCounter::hardware_count`] reads `value`.
    pub fn set_hardware_count(&mut self, value: i32) {
        let raw = value.rem_euclid(COUNTER_PERIOD);
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let low = raw as u16;
        self.counter.set_count(low);
        self.overflow.set(value.wrapping_sub(raw));
    }

    #[must_use]
    pub const fn handled_count(&self) -> i32 {
        self.handled
    }

    pub const fn set_handled_count(&mut self, value: i32) {
        self.handled = value;
    }

    /// Pulses seen by the hardware but not yet stepped. Negative when the handled count is ahead.
    #[must_use]
    pub fn unhandled_count(&self) -> i32 {
        self.hardware_count().wrapping_sub(self.handled)
    }

    /// Steps `motor` through the pending backlog and returns how many pulses were folded in.
    ///
    /// # Errors
    /// Returns `Error::Pin` if the coils cannot be written; the pulses stepped so far stay handled.
    pub fn catch_up<A, B, E>(
        &mut self,
        motor: &mut StepperMotor<A, B, E>,
        update_desired: bool,
    ) -> Result<i32, Error>
    where
        A: CoilOutput,
        B: CoilOutput,
        E: Encoder,
    {
        let backlog = self.unhandled_count();
        let direction = Direction::of(backlog);
        for _ in 0..backlog.unsigned_abs() {
            motor.step(
                StepSource::Pin(direction == Direction::Positive),
                true,
                update_desired,
            )?;
            self.handled = self.handled.wrapping_add(direction.sign());
        }
        if backlog != 0 {
            trace!("folded {} step pulses", backlog);
        }
        Ok(backlog)
    }

    pub fn release(self) -> C {
        self.counter
    }
}
