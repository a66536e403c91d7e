use memchr::memrchr;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::utils::constants::FIELD_SEPARATOR;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("missing ';' separator")]
    MissingSeparator,

    #[error("value {0:?} does not match the -?D[D].D format")]
    InvalidValue(String),
}

/// What to do with a line that does not match the record format.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum MalformedPolicy {
    /// Fixed-offset fast path with no validation.
    #[default]
    Trust,
    /// Validate each line, drop and count malformed ones.
    Skip,
    /// Validate each line, fail the run on the first malformed one.
    Abort,
}

/// Split a `<station>;<value>` line into the station bytes and the value
/// scaled by 10.
///
/// The value is decoded from fixed offsets at the end of the line, which
/// only works for `-?D.D` and `-?DD.D`. Anything else yields a wrong
/// station or value.
///
/// # Panics
///
/// Panics if the line is too short for the offsets it inspects (fewer than
/// four bytes, or four bytes with no separator in front of the value).
#[inline]
pub fn cut(line: &[u8]) -> (&[u8], i32) {
    let end = line.len();
    let tenths = digit(line[end - 1]);
    let ones = digit(line[end - 3]); // line[end - 2] is '.'

    match line[end - 4] {
        b';' => (&line[..end - 4], ones * 10 + tenths),
        b'-' => (&line[..end - 5], -(ones * 10 + tenths)),
        tens => {
            let value = digit(tens) * 100 + ones * 10 + tenths;
            if line[end - 5] == FIELD_SEPARATOR {
                (&line[..end - 5], value)
            } else {
                (&line[..end - 6], -value)
            }
        }
    }
}

#[inline(always)]
fn digit(byte: u8) -> i32 {
    i32::from(byte.wrapping_sub(b'0'))
}

/// Validating counterpart of [`cut`].
///
/// The station is everything before the last `;`, the value must be an
/// optional `-`, one or two digits, `.` and exactly one digit.
pub fn parse_checked(line: &[u8]) -> Result<(&[u8], i32), ParseError> {
    let separator = memrchr(FIELD_SEPARATOR, line).ok_or(ParseError::MissingSeparator)?;

    let value = &line[separator + 1..];
    if !is_fixed_format(value) {
        return Err(ParseError::InvalidValue(
            String::from_utf8_lossy(value).into_owned(),
        ));
    }

    Ok(cut(line))
}

fn is_fixed_format(value: &[u8]) -> bool {
    let unsigned = value.strip_prefix(b"-").unwrap_or(value);
    match unsigned {
        [a, b'.', c] => a.is_ascii_digit() && c.is_ascii_digit(),
        [a, b, b'.', c] => a.is_ascii_digit() && b.is_ascii_digit() && c.is_ascii_digit(),
        _ => false,
    }
}

/// Applies a [`MalformedPolicy`] on top of the two parsing functions.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineParser {
    policy: MalformedPolicy,
}

impl LineParser {
    pub fn new(policy: MalformedPolicy) -> Self {
        Self { policy }
    }

    /// Parse one line. `Ok(None)` means the line was malformed and the
    /// policy says to skip it.
    #[inline]
    pub fn parse<'a>(&self, line: &'a [u8]) -> Result<Option<(&'a [u8], i32)>, ParseError> {
        match self.policy {
            MalformedPolicy::Trust => Ok(Some(cut(line))),
            MalformedPolicy::Skip => Ok(parse_checked(line).ok()),
            MalformedPolicy::Abort => parse_checked(line).map(Some),
        }
    }
}
