use libm::{fabsf, roundf};

/// Total resolution of the 16-bit encoder.
pub const ENCODER_RESOLUTION: f32 = 65536.0;

/// Absolute encoder reading including multi-turn carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EncoderValue {
    /// Number of full rotations (positive or negative).
    pub carry: i32,
    /// 16-bit absolute position within the current turn.
    pub value: u16,
}

impl EncoderValue {
    /// Converts the full multi-turn encoder value to total degrees.
    #[must_use]
    pub fn to_degrees(self) -> f32 {
        (self.carry as f32 * 360.0) + encoder_val_to_degrees(self.value)
    }
}

/// Converts a 16-bit encoder value to degrees (0-360).
#[must_use]
pub fn encoder_val_to_degrees(val: u16) -> f32 {
    (f32::from(val) / ENCODER_RESOLUTION) * 360.0
}

/// Signed number of microsteps closest to `angle` degrees.
#[must_use]
pub fn angle_to_steps(angle: f32, microstep_angle: f32) -> i32 {
    if microstep_angle <= 0.0 {
        return 0;
    }
    #[allow(clippy::cast_possible_truncation)]
    {
        roundf(angle / microstep_angle) as i32
    }
}

/// Step rate (Hz) that turns the shaft at `degrees_per_second`.
#[must_use]
pub fn speed_to_hz(degrees_per_second: f32, microstep_angle: f32) -> f32 {
    if microstep_angle <= 0.0 {
        return 0.0;
    }
    degrees_per_second / microstep_angle
}

/// Folds any angle into `[0, 360)`.
#[must_use]
pub fn normalize_degrees(angle: f32) -> f32 {
    let folded = libm::fmodf(angle, 360.0);
    if folded < 0.0 { folded + 360.0 } else { folded }
}

/// Rounds and saturates to the `u16` range.
#[must_use]
pub(crate) fn round_u16(value: f32) -> u16 {
    let rounded = roundf(fabsf(value));
    if rounded >= f32::from(u16::MAX) {
        u16::MAX
    } else {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        {
            rounded as u16
        }
    }
}
