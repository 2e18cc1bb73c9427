//! Numeric literals
//!
//! Rainlang values are unsigned 256-bit integers written in hex (`0x1f`),
//! binary (`0b101`), decimal (`42`) or exponent form (`1e18`, `1.5e18`), plus
//! the sentinels `max-uint256` and `infinity`.

use num_bigint::BigUint;
use num_traits::{One, Zero};
use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

/// Largest representable value, `2^256 - 1`
pub static MAX_UINT256: LazyLock<BigUint> =
    LazyLock::new(|| (BigUint::one() << 256u32) - BigUint::one());

static HEX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^0x[0-9a-fA-F]+$").unwrap());
static BINARY: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^0b[01]+$").unwrap());
static DECIMAL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9]+$").unwrap());
static EXPONENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9]+)(?:\.([0-9]+))?e([0-9]+)$").unwrap());

/// Sentinel words standing for [`MAX_UINT256`]
pub const SENTINELS: [&str; 3] = ["max-uint256", "max_uint256", "infinity"];

/// Errors raised while reading a numeric literal
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LiteralError {
    /// Word is not written in any numeric form
    #[error("'{0}' is not a numeric literal")]
    NotNumeric(String),

    /// Value exceeds max-uint256
    #[error("value '{0}' is out of range (exceeds max-uint256)")]
    OutOfRange(String),

    /// Exponent form does not describe an integer
    #[error("value '{0}' is not an integer")]
    Fractional(String),
}

/// Whether the word is written in a numeric form (regardless of range)
pub fn is_numeric_word(word: &str) -> bool {
    HEX.is_match(word) || BINARY.is_match(word) || DECIMAL.is_match(word) || EXPONENT.is_match(word)
}

/// Whether the word is a max-uint256 sentinel
pub fn is_sentinel(word: &str) -> bool {
    SENTINELS.iter().any(|s| s.eq_ignore_ascii_case(word))
}

/// Parse a numeric literal or sentinel into its value.
pub fn parse_literal(word: &str) -> Result<BigUint, LiteralError> {
    if is_sentinel(word) {
        return Ok(MAX_UINT256.clone());
    }

    let value = if HEX.is_match(word) {
        parse_radix(&word[2..], 16)
    } else if BINARY.is_match(word) {
        parse_radix(&word[2..], 2)
    } else if DECIMAL.is_match(word) {
        parse_radix(word, 10)
    } else if let Some(caps) = EXPONENT.captures(word) {
        parse_exponent(
            word,
            &caps[1],
            caps.get(2).map_or("", |m| m.as_str()),
            &caps[3],
        )?
    } else {
        return Err(LiteralError::NotNumeric(word.to_string()));
    };

    if value > *MAX_UINT256 {
        return Err(LiteralError::OutOfRange(word.to_string()));
    }
    Ok(value)
}

fn parse_radix(digits: &str, radix: u32) -> BigUint {
    // Digits are pre-validated by the patterns above.
    BigUint::parse_bytes(digits.as_bytes(), radix).unwrap_or_default()
}

fn parse_exponent(
    word: &str,
    integer: &str,
    fraction: &str,
    exponent: &str,
) -> Result<BigUint, LiteralError> {
    let fraction = fraction.trim_end_matches('0');
    let mantissa = parse_radix(&format!("{}{}", integer, fraction), 10);
    if mantissa.is_zero() {
        return Ok(mantissa);
    }

    let exponent: u32 = exponent
        .parse()
        .map_err(|_| LiteralError::OutOfRange(word.to_string()))?;
    let shift = exponent
        .checked_sub(fraction.len() as u32)
        .ok_or_else(|| LiteralError::Fractional(word.to_string()))?;
    // 10^78 already exceeds max-uint256.
    if shift > 78 {
        return Err(LiteralError::OutOfRange(word.to_string()));
    }
    Ok(mantissa * BigUint::from(10u32).pow(shift))
}

/// Render a value in canonical decimal form
pub fn to_decimal(value: &BigUint) -> String {
    value.to_str_radix(10)
}
