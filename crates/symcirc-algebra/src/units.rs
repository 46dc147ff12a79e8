//! Exact engineering-unit parsing.
//!
//! Element values such as `4.7k` or `10MEG` are converted to exact rationals
//! rather than floats, so `1/3k` stays `1/3000` throughout a symbolic solve.

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, Zero};

/// Parse a SPICE-style value with optional SI suffix into an exact rational.
///
/// Supported suffixes (case-insensitive):
/// - T (tera, 1e12)
/// - G (giga, 1e9)
/// - MEG or X (mega, 1e6)
/// - K (kilo, 1e3)
/// - M (milli, 1e-3)
/// - MIL (25.4e-6)
/// - U (micro, 1e-6)
/// - N (nano, 1e-9)
/// - P (pico, 1e-12)
/// - F (femto, 1e-15)
/// - A (atto, 1e-18)
pub fn parse_value(s: &str) -> Option<BigRational> {
    let s = s.trim();
    let num_end = numeric_prefix_len(s);
    if num_end == 0 {
        return None;
    }
    let (num_str, suffix) = s.split_at(num_end);
    let value = parse_decimal(num_str)?;
    let multiplier = suffix_multiplier(suffix)?;
    Some(value * multiplier)
}

/// Multiplier for a SPICE suffix, `None` if the suffix is unknown.
pub fn suffix_multiplier(suffix: &str) -> Option<BigRational> {
    let multiplier = match suffix.to_uppercase().as_str() {
        "" => BigRational::one(),
        "T" => pow10(12),
        "G" => pow10(9),
        "MEG" | "X" => pow10(6),
        "K" => pow10(3),
        "M" => pow10(-3),
        "MIL" => BigRational::from_integer(254.into()) * pow10(-7),
        "U" => pow10(-6),
        "N" => pow10(-9),
        "P" => pow10(-12),
        "F" => pow10(-15),
        "A" => pow10(-18),
        _ => return None,
    };
    Some(multiplier)
}

/// Length of the leading `[+-]digits[.digits][e[+-]digits]` part of `s`.
///
/// An `e` is only consumed when digits follow it, so `1meg` is not mistaken
/// for an exponent.
pub fn numeric_prefix_len(s: &str) -> usize {
    let bytes = s.as_bytes();
    let mut pos = 0;
    if pos < bytes.len() && (bytes[pos] == b'+' || bytes[pos] == b'-') {
        pos += 1;
    }
    let digits_start = pos;
    while pos < bytes.len() && bytes[pos].is_ascii_digit() {
        pos += 1;
    }
    if pos < bytes.len() && bytes[pos] == b'.' {
        pos += 1;
        while pos < bytes.len() && bytes[pos].is_ascii_digit() {
            pos += 1;
        }
    }
    if pos == digits_start || (pos == digits_start + 1 && bytes[digits_start] == b'.') {
        return 0;
    }
    if pos < bytes.len() && (bytes[pos] == b'e' || bytes[pos] == b'E') {
        let mut exp = pos + 1;
        if exp < bytes.len() && (bytes[exp] == b'+' || bytes[exp] == b'-') {
            exp += 1;
        }
        let exp_digits = exp;
        while exp < bytes.len() && bytes[exp].is_ascii_digit() {
            exp += 1;
        }
        if exp > exp_digits {
            pos = exp;
        }
    }
    pos
}

/// Largest decimal exponent accepted by [`parse_decimal`].
pub const MAX_EXPONENT: i32 = 400;

/// Parse a plain decimal literal (`-1.25e-3`) exactly. Exponents beyond
/// ±[`MAX_EXPONENT`] are rejected.
pub fn parse_decimal(s: &str) -> Option<BigRational> {
    if s.is_empty() || numeric_prefix_len(s) != s.len() {
        return None;
    }
    let (negative, rest) = match s.as_bytes()[0] {
        b'-' => (true, &s[1..]),
        b'+' => (false, &s[1..]),
        _ => (false, s),
    };
    let (mantissa, exponent) = match rest.find(|c: char| c == 'e' || c == 'E') {
        Some(idx) => (&rest[..idx], rest[idx + 1..].parse::<i32>().ok()?),
        None => (rest, 0),
    };
    if exponent.unsigned_abs() > MAX_EXPONENT.unsigned_abs() {
        return None;
    }
    let (int_part, frac_part) = match mantissa.find('.') {
        Some(idx) => (&mantissa[..idx], &mantissa[idx + 1..]),
        None => (mantissa, ""),
    };
    let digits = format!("{}{}", int_part, frac_part);
    let digits: BigInt = if digits.is_empty() {
        BigInt::zero()
    } else {
        digits.parse().ok()?
    };
    let scale = exponent.checked_sub(i32::try_from(frac_part.len()).ok()?)?;
    let value = BigRational::from_integer(digits) * pow10(scale);
    Some(if negative { -value } else { value })
}

fn pow10(exp: i32) -> BigRational {
    let base = BigInt::from(10).pow(exp.unsigned_abs());
    if exp >= 0 {
        BigRational::from_integer(base)
    } else {
        BigRational::new(BigInt::one(), base)
    }
}
