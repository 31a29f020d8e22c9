//! Human-readable byte sizes
//!
//! Parses the Kubernetes quantity forms used for storage and memory
//! (`"10Gi"`, `"500M"`, `"1.5Gi"`, `"1048576"`) into an exact byte count, and
//! formats byte counts back using the largest binary suffix that divides them
//! exactly, so formatting never loses precision.

use thiserror::Error;

/// Binary suffixes, largest first, as (suffix, power of two)
const BINARY_UNITS: [(&str, u32); 6] = [
    ("Ei", 60),
    ("Pi", 50),
    ("Ti", 40),
    ("Gi", 30),
    ("Mi", 20),
    ("Ki", 10),
];

/// Error returned for a malformed or unrepresentable size string
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid size '{input}': {reason}")]
pub struct ParseError {
    /// The rejected input
    pub input: String,
    /// Why it was rejected
    pub reason: String,
}

impl ParseError {
    fn new(input: &str, reason: impl Into<String>) -> Self {
        Self {
            input: input.to_string(),
            reason: reason.into(),
        }
    }
}

/// How a value that is not a whole number of bytes is handled
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Rounding {
    /// Reject it
    Exact,
    /// Round up to the next byte, as Kubernetes does for memory
    Up,
}

/// Largest decimal exponent accepted in `1e<n>` form
const MAX_EXPONENT: i32 = 18;

/// Suffix scale as (numerator, denominator)
fn multiplier(suffix: &str, rounding: Rounding) -> Option<(u128, u128)> {
    if let Some((_, shift)) = BINARY_UNITS.iter().find(|(s, _)| *s == suffix) {
        return Some((1u128 << shift, 1));
    }
    let exponent = match suffix {
        "" => 0,
        "k" => 3,
        "M" => 6,
        "G" => 9,
        "T" => 12,
        "P" => 15,
        "E" => 18,
        "m" if rounding == Rounding::Up => -3,
        _ if rounding == Rounding::Up => decimal_exponent(suffix)?,
        _ => return None,
    };
    Some(if exponent >= 0 {
        (10u128.pow(exponent as u32), 1)
    } else {
        (1, 10u128.pow(exponent.unsigned_abs()))
    })
}

/// Exponent of a `e3` / `E-2` style suffix
fn decimal_exponent(suffix: &str) -> Option<i32> {
    let digits = suffix.strip_prefix(&['e', 'E'][..])?;
    let unsigned = digits.strip_prefix(&['+', '-'][..]).unwrap_or(digits);
    if unsigned.is_empty() || !unsigned.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let exponent: i32 = digits.parse().ok()?;
    (exponent.abs() <= MAX_EXPONENT).then_some(exponent)
}

/// Parse a human-readable size into bytes.
///
/// Fractions are accepted only when they resolve to a whole number of bytes
/// (`"1.5Ki"` is 1536, `"0.5"` is rejected).
pub fn parse(input: &str) -> Result<u64, ParseError> {
    parse_with(input, Rounding::Exact)
}

/// Parse a container memory quantity into bytes.
///
/// Accepts everything [`parse`] does plus the milli suffix (`"100m"`) and
/// exponent forms (`"1e9"`). Fractional bytes round up, so `"1.3Gi"` is
/// 1395864372.
pub fn parse_memory(input: &str) -> Result<u64, ParseError> {
    parse_with(input, Rounding::Up)
}

fn parse_with(input: &str, rounding: Rounding) -> Result<u64, ParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ParseError::new(input, "empty size"));
    }

    let split = trimmed
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(trimmed.len());
    let (number, suffix) = trimmed.split_at(split);

    let (mult, divisor) = multiplier(suffix, rounding)
        .ok_or_else(|| ParseError::new(input, format!("unknown suffix '{}'", suffix)))?;

    let (whole, fraction) = match number.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (number, ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return Err(ParseError::new(input, "missing number"));
    }
    if fraction.contains('.') {
        return Err(ParseError::new(input, "more than one decimal point"));
    }
    // 10^18 fraction scale times a 10^18 divisor still fits in u128
    if fraction.len() > 18 {
        return Err(ParseError::new(input, "too many fractional digits"));
    }

    let overflow = || ParseError::new(input, "size does not fit in 64 bits");

    // The number is `digits / 10^fraction.len()`, scaled by `mult / divisor`
    let digits = format!("{}{}", whole, fraction);
    let digits = digits.parse::<u128>().map_err(|_| overflow())?;
    let numerator = digits.checked_mul(mult).ok_or_else(overflow)?;
    let denominator = 10u128.pow(fraction.len() as u32) * divisor;

    let bytes = match rounding {
        Rounding::Exact if numerator % denominator != 0 => {
            return Err(ParseError::new(input, "not a whole number of bytes"))
        }
        Rounding::Exact => numerator / denominator,
        Rounding::Up => numerator.div_ceil(denominator),
    };

    u64::try_from(bytes).map_err(|_| overflow())
}

/// Format bytes with the largest binary suffix that represents them exactly.
pub fn format(bytes: u64) -> String {
    for (suffix, shift) in BINARY_UNITS {
        if bytes != 0 && bytes % (1u64 << shift) == 0 {
            return format!("{}{}", bytes >> shift, suffix);
        }
    }
    bytes.to_string()
}
