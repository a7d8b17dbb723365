/// Signed sense of a step. Positive steps turn the shaft counter-clockwise.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Direction {
    Positive,
    Negative,
}

impl Direction {
    #[must_use]
    pub const fn sign(self) -> i32 {
        match self {
            Self::Positive => 1,
            Self::Negative => -1,
        }
    }

    #[must_use]
    pub const fn reversed(self) -> Self {
        match self {
            Self::Positive => Self::Negative,
            Self::Negative => Self::Positive,
        }
    }

    /// Direction carrying the sign of `value`; zero counts as positive.
    #[must_use]
    pub const fn of(value: i32) -> Self {
        if value < 0 { Self::Negative } else { Self::Positive }
    }
}

/// Where [`StepperMotor::step`](crate::StepperMotor::step) takes its direction from.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StepSource {
    /// Level of the DIR input pin, sampled by the caller. High is positive.
    Pin(bool),
    Clockwise,
    CounterClockwise,
}

impl From<Direction> for StepSource {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Positive => Self::CounterClockwise,
            Direction::Negative => Self::Clockwise,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_values() {
        assert_eq!(Direction::Positive.sign(), 1);
        assert_eq!(Direction::Negative.sign(), -1);
        assert_eq!(Direction::Positive.reversed(), Direction::Negative);
    }

    #[test]
    fn test_direction_of_sign() {
        assert_eq!(Direction::of(-3), Direction::Negative);
        assert_eq!(Direction::of(0), Direction::Positive);
        assert_eq!(StepSource::from(Direction::Negative), StepSource::Clockwise);
    }
}
