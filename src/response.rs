use core::convert::TryFrom;
use core::fmt::{self, Write};

use heapless::String;

use crate::Error;

/// Capacity of a text reply.
pub const REPLY_CAPACITY: usize = 96;

/// Error returned when a reply line is not one of the fixed feedback strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidFeedback;

/// Fixed status reply of the command protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Feedback {
    /// Command accepted, nothing to report.
    Ok,
    /// A required parameter is missing or cannot be parsed.
    NoValue,
    /// The numeric code is not a known command.
    CmdNotAvailable,
    /// The line is neither an `M` nor a `G` command.
    NoCmdSpecified,
    /// A linear move was requested before steps/mm was calibrated.
    StepsPerMmNotSet,
    /// A quoted string parameter is malformed.
    InvalidString,
    /// A bus command was sent to a board without a bus.
    CanNotEnabled,
}

impl Feedback {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::NoValue => "Error: no value",
            Self::CmdNotAvailable => "Error: command not available",
            Self::NoCmdSpecified => "Error: no command specified",
            Self::StepsPerMmNotSet => "Error: steps per mm not set",
            Self::InvalidString => "Error: invalid string",
            Self::CanNotEnabled => "Error: CAN not enabled",
        }
    }

    #[must_use]
    pub const fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }
}

impl TryFrom<&str> for Feedback {
    type Error = InvalidFeedback;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim() {
            "ok" => Ok(Self::Ok),
            "Error: no value" => Ok(Self::NoValue),
            "Error: command not available" => Ok(Self::CmdNotAvailable),
            "Error: no command specified" => Ok(Self::NoCmdSpecified),
            "Error: steps per mm not set" => Ok(Self::StepsPerMmNotSet),
            "Error: invalid string" => Ok(Self::InvalidString),
            "Error: CAN not enabled" => Ok(Self::CanNotEnabled),
            _ => Err(InvalidFeedback),
        }
    }
}

impl From<Error> for Feedback {
    fn from(err: Error) -> Self {
        match err {
            Error::InvalidString => Self::InvalidString,
            Error::InvalidValue | Error::MissingParameter | Error::Pin | Error::Storage => {
                Self::NoValue
            }
        }
    }
}

/// Reply to one protocol line: either a status or the text of a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Feedback(Feedback),
    Text(String<REPLY_CAPACITY>),
}

impl Reply {
    /// Formats a query result. Output beyond [`REPLY_CAPACITY`] is dropped.
    #[must_use]
    pub fn text(args: fmt::Arguments<'_>) -> Self {
        let mut text = String::new();
        text.write_fmt(args).unwrap_or_default();
        Self::Text(text)
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Feedback(feedback) => feedback.as_str(),
            Self::Text(text) => text.as_str(),
        }
    }
}

impl From<Feedback> for Reply {
    fn from(feedback: Feedback) -> Self {
        Self::Feedback(feedback)
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_feedback_try_from_ok() {
        let feedback = Feedback::try_from("ok").unwrap();
        assert_eq!(feedback, Feedback::Ok);
        assert!(feedback.is_ok());
    }

    #[test]
    fn test_feedback_strings_are_distinct_and_parse_back() {
        let all = [
            Feedback::Ok,
            Feedback::NoValue,
            Feedback::CmdNotAvailable,
            Feedback::NoCmdSpecified,
            Feedback::StepsPerMmNotSet,
            Feedback::InvalidString,
            Feedback::CanNotEnabled,
        ];
        for feedback in all {
            assert_eq!(Feedback::try_from(feedback.as_str()), Ok(feedback));
        }
    }

    #[test]
    fn test_feedback_try_from_invalid() {
        let result = Feedback::try_from("16");
        assert_eq!(result.unwrap_err(), InvalidFeedback);
    }

    #[test]
    fn test_error_maps_to_feedback() {
        assert_eq!(Feedback::from(Error::InvalidString), Feedback::InvalidString);
        assert_eq!(Feedback::from(Error::MissingParameter), Feedback::NoValue);
    }

    #[test]
    fn test_reply_text() {
        let reply = Reply::text(format_args!("{}", 1.8_f32));
        assert_eq!(reply.as_str(), "1.8");
        assert_eq!(Reply::from(Feedback::Ok).as_str(), "ok");
    }
}
