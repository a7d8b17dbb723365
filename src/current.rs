//! Phase current allocation.

use libm::fabsf;

use crate::helpers::round_u16;
use crate::sine::{SINE_MAX, fast_cos, fast_sin};
use crate::{DEFAULT_RMS_CURRENT, MAX_PEAK_BOARD_CURRENT, MAX_RMS_BOARD_CURRENT};

/// Peak / RMS ratio of a sinusoidal drive.
const PEAK_PER_RMS: f32 = 1.414;
/// RMS / peak ratio of a sinusoidal drive.
const RMS_PER_PEAK: f32 = 0.707;

/// How the coil current magnitude is chosen.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CurrentPolicy {
    /// Constant current. `peak` tracks `rms * √2`, whichever was set last wins.
    Static { rms: u16, peak: u16 },
    /// Current grows with angular acceleration on top of an idle floor.
    Dynamic { accel: u16, idle: u16, max: u16 },
}

impl Default for CurrentPolicy {
    fn default() -> Self {
        Self::with_rms(DEFAULT_RMS_CURRENT)
    }
}

impl CurrentPolicy {
    /// Static policy holding `rms` milliamps.
    #[must_use]
    pub fn with_rms(rms: u16) -> Self {
        let mut policy = Self::Static { rms: 0, peak: 0 };
        policy.set_rms_current(rms);
        policy
    }

    #[must_use]
    pub const fn is_dynamic(&self) -> bool {
        matches!(self, Self::Dynamic { .. })
    }

    /// Sets the RMS current and derives the peak. Switches a dynamic policy to static.
    pub fn set_rms_current(&mut self, rms: u16) {
        let peak = round_u16(f32::from(rms) * PEAK_PER_RMS).min(MAX_PEAK_BOARD_CURRENT);
        *self = Self::Static {
            rms: rms.min(MAX_RMS_BOARD_CURRENT),
            peak,
        };
    }

    /// Sets the peak current and derives the RMS. Switches a dynamic policy to static.
    pub fn set_peak_current(&mut self, peak: u16) {
        let rms = round_u16(f32::from(peak) * RMS_PER_PEAK).min(MAX_RMS_BOARD_CURRENT);
        *self = Self::Static {
            rms,
            peak: peak.min(MAX_PEAK_BOARD_CURRENT),
        };
    }

    /// RMS current of a static policy.
    #[must_use]
    pub const fn rms_current(&self) -> Option<u16> {
        match *self {
            Self::Static { rms, .. } => Some(rms),
            Self::Dynamic { .. } => None,
        }
    }

    /// Peak current of a static policy.
    #[must_use]
    pub const fn peak_current(&self) -> Option<u16> {
        match *self {
            Self::Static { peak, .. } => Some(peak),
            Self::Dynamic { .. } => None,
        }
    }

    /// Updates the dynamic factors that are given; a static policy becomes dynamic with
    /// the missing factors at zero and `max` at the board peak.
    pub fn set_dynamic(&mut self, accel: Option<u16>, idle: Option<u16>, max: Option<u16>) {
        let (old_accel, old_idle, old_max) = match *self {
            Self::Dynamic { accel, idle, max } => (accel, idle, max),
            Self::Static { .. } => (0, 0, MAX_PEAK_BOARD_CURRENT),
        };
        *self = Self::Dynamic {
            accel: accel.unwrap_or(old_accel),
            idle: idle.unwrap_or(old_idle),
            max: max.unwrap_or(old_max),
        };
    }

    /// Peak-equivalent current in mA for the given angular acceleration (deg/s²).
    #[must_use]
    pub fn magnitude(&self, angular_accel: f32) -> i32 {
        match *self {
            Self::Static { peak, .. } => i32::from(peak),
            Self::Dynamic { accel, idle, max } => {
                let rms = fabsf(angular_accel) * f32::from(accel) + f32::from(idle);
                let ceiling = max.min(MAX_PEAK_BOARD_CURRENT);
                i32::from(round_u16(rms * PEAK_PER_RMS).min(ceiling))
            }
        }
    }

    /// Signed (phase A, phase B) current targets in mA at commutation `index`.
    #[must_use]
    pub fn phase_targets(&self, index: usize, angular_accel: f32) -> (i32, i32) {
        let magnitude = self.magnitude(angular_accel);
        (
            magnitude * fast_sin(index) / SINE_MAX,
            magnitude * fast_cos(index) / SINE_MAX,
        )
    }
}
