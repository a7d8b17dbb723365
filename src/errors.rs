#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    InvalidValue,
    MissingParameter,
    InvalidString,
    Pin,
    Storage,
}

impl Error {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidValue => "Invalid value",
            Self::MissingParameter => "Missing parameter",
            Self::InvalidString => "Unterminated quoted string",
            Self::Pin => "Output pin write failed",
            Self::Storage => "Parameter storage failed",
        }
    }
}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
