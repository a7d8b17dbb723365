//! Tokenizer for the ASCII command protocol.
//!
//! Lines look like `M350 V16`, `G6 D1 R1000 S100` or `M116 S1 M"hello"`: a command letter and
//! number followed by letter-coded parameters. Letters are case-insensitive and a missing
//! letter is `None`, never a magic number.

use crate::{Error, Feedback};

/// Byte index of the first `letter` (either case) outside double quotes.
fn find_letter(line: &str, letter: char) -> Option<usize> {
    let mut quoted = false;
    line.char_indices().find_map(|(idx, c)| {
        if c == '"' {
            quoted = !quoted;
            None
        } else if !quoted && c.eq_ignore_ascii_case(&letter) {
            Some(idx)
        } else {
            None
        }
    })
}

/// Raw text of parameter `letter`.
///
/// The value runs from just after the letter to the next space or the end of the line. A
/// letter followed directly by a space takes the next token instead (`S 100` reads `100`),
/// and a bare letter at the end of the line reads as an empty value.
#[must_use]
pub fn parse_value(line: &str, letter: char) -> Option<&str> {
    let start = find_letter(line, letter)? + letter.len_utf8();
    let rest = &line[start..];

    let value = match rest.strip_prefix(' ') {
        Some(next) => next.split(' ').next().unwrap_or_default(),
        None => rest.split(' ').next().unwrap_or_default(),
    };
    Some(value)
}

/// Text between the first pair of double quotes after `letter`.
///
/// # Errors
/// Returns `Error::MissingParameter` if `letter` is absent and `Error::InvalidString` if either
/// quote is missing.
pub fn parse_string(line: &str, letter: char) -> Result<&str, Error> {
    let start = find_letter(line, letter).ok_or(Error::MissingParameter)? + letter.len_utf8();
    let rest = &line[start..];

    let open = rest.find('"').ok_or(Error::InvalidString)?;
    let quoted = &rest[open + 1..];
    let close = quoted.find('"').ok_or(Error::InvalidString)?;
    Ok(&quoted[..close])
}

/// Command letter of a protocol line.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Family {
    /// Configuration and status.
    M,
    /// Motion.
    G,
}

/// Parsed view of one protocol line.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Command<'a> {
    family: Family,
    code: u16,
    args: &'a str,
}

impl<'a> Command<'a> {
    /// Splits `line` into command letter, number and parameters.
    ///
    /// # Errors
    /// `Feedback::NoCmdSpecified` if the line does not start with `M` or `G`,
    /// `Feedback::CmdNotAvailable` if the command number is missing or malformed.
    pub fn parse(line: &'a str) -> Result<Self, Feedback> {
        let line = line.trim();
        let mut chars = line.chars();
        let family = match chars.next().map(|c| c.to_ascii_uppercase()) {
            Some('M') => Family::M,
            Some('G') => Family::G,
            _ => return Err(Feedback::NoCmdSpecified),
        };

        let rest = chars.as_str();
        let digits = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        let (number, args) = rest.split_at(digits);
        let code = number.parse::<u16>().map_err(|_| Feedback::CmdNotAvailable)?;

        Ok(Self {
            family,
            code,
            args: args.trim(),
        })
    }

    #[must_use]
    pub const fn family(&self) -> Family {
        self.family
    }

    #[must_use]
    pub const fn code(&self) -> u16 {
        self.code
    }

    /// Everything after the command number.
    #[must_use]
    pub const fn args(&self) -> &'a str {
        self.args
    }

    #[must_use]
    pub fn has(&self, letter: char) -> bool {
        find_letter(self.args, letter).is_some()
    }

    #[must_use]
    pub fn value(&self, letter: char) -> Option<&'a str> {
        parse_value(self.args, letter)
    }

    /// Parameter as a float; `None` when absent or unparsable.
    #[must_use]
    pub fn float(&self, letter: char) -> Option<f32> {
        self.value(letter)?.trim().parse().ok()
    }

    /// Parameter as an integer; `None` when absent or unparsable.
    #[must_use]
    pub fn int(&self, letter: char) -> Option<i32> {
        self.value(letter)?.trim().parse().ok()
    }

    /// Quoted parameter.
    ///
    /// # Errors
    /// See [`parse_string`].
    pub fn string(&self, letter: char) -> Result<&'a str, Error> {
        parse_string(self.args, letter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value("M350 V16", 'V'), Some("16"));
        assert_eq!(parse_value("M350 v16", 'V'), Some("16"));
        assert_eq!(parse_value("m350 V16", 'v'), Some("16"));
        assert_eq!(parse_value("M350", 'V'), None);
        assert_eq!(parse_value("G6 D1 R1000 S100", 'R'), Some("1000"));
        assert_eq!(parse_value("G6 D1 R1000 S100", 'S'), Some("100"));
    }

    #[test]
    fn test_parse_value_space_after_letter() {
        assert_eq!(parse_value("M352 S 1", 'S'), Some("1"));
        assert_eq!(parse_value("M352 S 1 V2", 'S'), Some("1"));
        assert_eq!(parse_value("M352 S", 'S'), Some(""));
    }

    #[test]
    fn test_parse_value_skips_quoted_text() {
        assert_eq!(parse_value("M116 M\"Set\" S4", 'S'), Some("4"));
    }

    #[test]
    fn test_parse_string() {
        assert_eq!(parse_string("M116 S1 M\"hello\"", 'M'), Ok("hello"));
        assert_eq!(parse_string("S1 m\"two words\"", 'M'), Ok("two words"));
        assert_eq!(parse_string("S1 M\"\"", 'M'), Ok(""));
    }

    #[test]
    fn test_parse_string_errors() {
        assert_eq!(parse_string("S1 M\"hello", 'M'), Err(Error::InvalidString));
        assert_eq!(parse_string("S1 Mhello", 'M'), Err(Error::InvalidString));
        assert_eq!(parse_string("S1", 'M'), Err(Error::MissingParameter));
    }

    #[test]
    fn test_command_parse() {
        let cmd = Command::parse("  m907 R750 ").unwrap_or_else(|_| unreachable!());
        assert_eq!(cmd.family(), Family::M);
        assert_eq!(cmd.code(), 907);
        assert_eq!(cmd.int('R'), Some(750));
        assert_eq!(cmd.int('P'), None);

        let cmd = Command::parse("G0 X-12.5 F300").unwrap_or_else(|_| unreachable!());
        assert_eq!(cmd.family(), Family::G);
        assert_eq!(cmd.float('X'), Some(-12.5));
        assert_eq!(cmd.float('F'), Some(300.0));
    }

    #[test]
    fn test_command_parameters_skip_command_letter() {
        let cmd = Command::parse("M907 A1 I2 M3").unwrap_or_else(|_| unreachable!());
        assert_eq!(cmd.int('M'), Some(3));
        assert!(cmd.has('A'));
        assert!(!cmd.has('R'));
    }

    #[test]
    fn test_command_parse_errors() {
        assert_eq!(Command::parse(""), Err(Feedback::NoCmdSpecified));
        assert_eq!(Command::parse("X10"), Err(Feedback::NoCmdSpecified));
        assert_eq!(Command::parse("M"), Err(Feedback::CmdNotAvailable));
        assert_eq!(Command::parse("Mabc V1"), Err(Feedback::CmdNotAvailable));
        assert_eq!(Command::parse("M+1"), Err(Feedback::CmdNotAvailable));
    }

    #[test]
    fn test_command_code_ends_at_first_non_digit() {
        let cmd = Command::parse("M350V16").unwrap_or_else(|_| unreachable!());
        assert_eq!(cmd.code(), 350);
        assert_eq!(cmd.args(), "V16");
        assert_eq!(cmd.int('V'), Some(16));

        let cmd = Command::parse("g6D1 R100").unwrap_or_else(|_| unreachable!());
        assert_eq!(cmd.family(), Family::G);
        assert_eq!(cmd.code(), 6);
        assert_eq!(cmd.int('D'), Some(1));
        assert_eq!(cmd.int('R'), Some(100));
    }

    #[test]
    fn test_unparsable_numbers_are_absent() {
        let cmd = Command::parse("M350 Vx").unwrap_or_else(|_| unreachable!());
        assert_eq!(cmd.int('V'), None);
        assert_eq!(cmd.value('V'), Some("x"));
    }
}
