use core::str::FromStr;

/// Enable state of the motor.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MotorState {
    /// Power-on state, left on the first transition and never entered again.
    NotSet,
    Enabled,
    Disabled,
    /// Operator override (`M17`), survives automatic enable/disable.
    ForcedEnabled,
    /// Operator override (`M18`/`M84`), survives automatic enable/disable.
    ForcedDisabled,
    Overtemp,
}

impl MotorState {
    /// States in which the coils are driven.
    #[must_use]
    pub const fn is_enabled(self) -> bool {
        matches!(self, Self::Enabled | Self::ForcedEnabled)
    }
}

/// Output state of one H-bridge.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CoilState {
    NotSet,
    Forward,
    Backward,
    Brake,
    Coast,
}

impl CoilState {
    /// Levels of the two direction pins, `None` for [`CoilState::NotSet`].
    #[must_use]
    pub const fn pin_levels(self) -> Option<(bool, bool)> {
        match self {
            Self::NotSet => None,
            Self::Forward => Some((true, false)),
            Self::Backward => Some((false, true)),
            Self::Brake => Some((true, true)),
            Self::Coast => Some((false, false)),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DistanceMode {
    Absolute,
    Incremental,
}

/// Axis letter a `G0` move is addressed to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Axis {
    X,
    Y,
    Z,
    A,
    B,
    C,
}

impl Axis {
    #[must_use]
    pub const fn letter(self) -> char {
        match self {
            Self::X => 'X',
            Self::Y => 'Y',
            Self::Z => 'Z',
            Self::A => 'A',
            Self::B => 'B',
            Self::C => 'C',
        }
    }

    /// Rotary axes take distances in degrees, linear ones in millimetres.
    #[must_use]
    pub const fn is_rotary(self) -> bool {
        matches!(self, Self::A | Self::B | Self::C)
    }
}

/// Board identifier on the CAN bus.
///
/// Each of the X, Y, Z and E axes owns five consecutive ids, so `X` is 1, `X5` is 5,
/// `Y` is 6 and `E5` is 20.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusId(u16);

/// Boards per axis letter.
const IDS_PER_AXIS: u16 = 5;

impl BusId {
    pub const X: Self = Self(1);

    /// Wraps a numeric id; zero is the broadcast address and is rejected.
    #[must_use]
    pub const fn new(id: u16) -> Option<Self> {
        if id == 0 { None } else { Some(Self(id)) }
    }

    #[must_use]
    pub const fn get(self) -> u16 {
        self.0
    }

    /// Resolves an axis name such as `X`, `y2` or `E5`.
    #[must_use]
    pub fn from_axis_name(name: &str) -> Option<Self> {
        let mut chars = name.chars();
        let base = match chars.next()?.to_ascii_uppercase() {
            'X' => 0,
            'Y' => 1,
            'Z' => 2,
            'E' => 3,
            _ => return None,
        };
        let index = match chars.as_str() {
            "" => 1,
            rest => rest.parse::<u16>().ok()?,
        };
        if !(1..=IDS_PER_AXIS).contains(&index) {
            return None;
        }
        Some(Self(base * IDS_PER_AXIS + index))
    }
}

impl Default for BusId {
    fn default() -> Self {
        Self::X
    }
}

impl FromStr for BusId {
    type Err = crate::Error;

    /// Accepts a numeric id or an axis name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s.parse::<u16>() {
            Ok(id) => Self::new(id).ok_or(crate::Error::InvalidValue),
            Err(_) => Self::from_axis_name(s).ok_or(crate::Error::InvalidValue),
        }
    }
}
