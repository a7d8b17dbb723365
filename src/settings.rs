//! Persisted configuration.

use crate::{Axis, BusId, DEFAULT_D, DEFAULT_I, DEFAULT_MAX_I, DEFAULT_P, Error, MotorConfig};

/// Everything `M500` stores and `M501` restores.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Settings {
    pub motor: MotorConfig,
    pub p: f32,
    pub i: f32,
    pub d: f32,
    pub max_i: f32,
    pub bus_id: BusId,
    /// Dip switches were fitted the wrong way round.
    pub dip_inverted: bool,
    pub axis: Axis,
    /// Linear axes only; `None` until calibrated.
    pub steps_per_mm: Option<f32>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            motor: MotorConfig::default(),
            p: DEFAULT_P,
            i: DEFAULT_I,
            d: DEFAULT_D,
            max_i: DEFAULT_MAX_I,
            bus_id: BusId::default(),
            dip_inverted: false,
            axis: Axis::A,
            steps_per_mm: None,
        }
    }
}

/// Non-volatile storage for [`Settings`].
pub trait ParameterStore {
    /// # Errors
    /// Returns `Error::Storage` if the write fails.
    fn save(&mut self, settings: &Settings) -> Result<(), Error>;

    /// # Errors
    /// Returns `Error::Storage` if nothing valid has been saved.
    fn load(&mut self) -> Result<Settings, Error>;

    /// Erases the stored settings and restarts the board.
    fn wipe(&mut self) -> !;
}
