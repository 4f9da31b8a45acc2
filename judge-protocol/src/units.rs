//! Duration and memory-size parsing, per spec §4.F:
//!
//! ```text
//! duration: ^([0-9]+(\.[0-9]*)?)(m|u|n)?s?$        unit -> 1e6, 1e3, 1 ns; absent -> 1e9
//! memory:   ^([0-9]+(\.[0-9]*)?)(k|m|g)?b?$        unit -> 1024, 1048576, 1073741824; absent -> 1
//! ```

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// A malformed duration/memory string, bundle descriptor field, or archive
/// member reference. Surfaced to the caller as [`Verdict::SystemError`](crate::Verdict::SystemError).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatError {
    pub input: String,
    pub message: String,
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.message, self.input)
    }
}

impl std::error::Error for FormatError {}

impl FormatError {
    fn new(input: &str, message: &str) -> Self {
        Self {
            input: input.to_string(),
            message: message.to_string(),
        }
    }
}

/// Parse a duration string (e.g. `"1.5ms"`, `"10us"`, `"2s"`, `"500"`) into
/// nanoseconds.
pub fn parse_time_ns(input: &str) -> Result<u64, FormatError> {
    let (number, unit) = split_number_and_suffix(input, &['m', 'u', 'n'])
        .ok_or_else(|| FormatError::new(input, "error parsing time"))?;
    let value: f64 = number
        .parse()
        .map_err(|_| FormatError::new(input, "error parsing time"))?;
    let multiplier: f64 = match unit {
        "" => 1_000_000_000.0,
        "m" => 1_000_000.0,
        "u" => 1_000.0,
        "n" => 1.0,
        _ => return Err(FormatError::new(input, "error parsing time")),
    };
    Ok((value * multiplier) as u64)
}

/// Parse a memory-size string (e.g. `"256m"`, `"1g"`, `"512k"`) into bytes.
pub fn parse_memory_bytes(input: &str) -> Result<u64, FormatError> {
    let (number, unit) = split_number_and_suffix(input, &['k', 'm', 'g'])
        .ok_or_else(|| FormatError::new(input, "error parsing memory"))?;
    let value: f64 = number
        .parse()
        .map_err(|_| FormatError::new(input, "error parsing memory"))?;
    let multiplier: f64 = match unit {
        "" => 1.0,
        "k" => 1024.0,
        "m" => 1_048_576.0,
        "g" => 1_073_741_824.0,
        _ => return Err(FormatError::new(input, "error parsing memory")),
    };
    Ok((value * multiplier) as u64)
}

/// Splits `"1.5ms"` into `("1.5", "m")`, tolerating a trailing bare `s`/`b`
/// unit-of-measure suffix and an absent unit letter. Returns `None` if the
/// numeric prefix is empty or non-numeric-looking.
fn split_number_and_suffix<'a>(input: &'a str, unit_letters: &[char]) -> Option<(&'a str, &'a str)> {
    let trimmed = input.trim();
    let trimmed = trimmed.strip_suffix(['s', 'b']).unwrap_or(trimmed);
    let mut split_at = trimmed.len();
    for (i, c) in trimmed.char_indices() {
        if c.is_ascii_digit() || c == '.' {
            split_at = i + c.len_utf8();
        } else {
            break;
        }
    }
    let (number, rest) = trimmed.split_at(split_at);
    if number.is_empty() {
        return None;
    }
    if rest.is_empty() {
        return Some((number, ""));
    }
    if rest.len() == 1 && unit_letters.contains(&rest.chars().next()?) {
        return Some((number, rest));
    }
    None
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]
    use super::*;

    #[test]
    fn parses_time_round_trip() {
        assert_eq!(parse_time_ns("1.5ms").unwrap(), 1_500_000);
        assert_eq!(parse_time_ns("1s").unwrap(), 1_000_000_000);
        assert_eq!(parse_time_ns("10us").unwrap(), 10_000);
        assert_eq!(parse_time_ns("1ns").unwrap(), 1);
        assert_eq!(parse_time_ns("2").unwrap(), 2_000_000_000);
    }

    #[test]
    fn parses_memory_round_trip() {
        assert_eq!(parse_memory_bytes("2g").unwrap(), 2_147_483_648);
        assert_eq!(parse_memory_bytes("256m").unwrap(), 268_435_456);
        assert_eq!(parse_memory_bytes("512k").unwrap(), 524_288);
        assert_eq!(parse_memory_bytes("128").unwrap(), 128);
    }

    #[test]
    fn rejects_malformed_strings() {
        assert!(parse_time_ns("abc").is_err());
        assert!(parse_memory_bytes("12x").is_err());
        assert!(parse_time_ns("").is_err());
    }
}
