// Convert wire decimal strings into integer ticks/lots at a fixed precision.
// Parsing is exact: input with more significant digits than the precision is
// rejected instead of truncated, so equal strings always map to equal integers.

use crate::engine::types::{Price, Size};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormaliseError {
    #[error("empty number")]
    Empty,
    #[error("invalid decimal `{0}`")]
    Invalid(String),
    #[error("`{value}` exceeds precision of {decimals} decimals")]
    PrecisionExceeded { value: String, decimals: u32 },
    #[error("`{0}` overflows fixed-point range")]
    Overflow(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Normaliser {
    pub price_decimals: u32, // e.g. 4 => 1 tick = 0.0001
    pub size_decimals: u32,  // e.g. 6 => 1 lot = 0.000001
}

impl Normaliser {
    pub fn new(price_decimals: u32, size_decimals: u32) -> Self {
        Self { price_decimals, size_decimals }
    }

    pub fn price_to_ticks(&self, s: &str) -> Result<Price, NormaliseError> {
        let ticks = parse_scaled(s, self.price_decimals)?;
        Price::try_from(ticks).map_err(|_| NormaliseError::Overflow(s.to_string()))
    }

    pub fn size_to_lots(&self, s: &str) -> Result<Size, NormaliseError> {
        parse_scaled(s, self.size_decimals)
    }
}

fn parse_scaled(s: &str, decimals: u32) -> Result<u64, NormaliseError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(NormaliseError::Empty);
    }

    let (integer_part, decimal_part) = s.split_once('.').unwrap_or((s, ""));
    let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
    if (integer_part.is_empty() && decimal_part.is_empty())
        || !all_digits(integer_part)
        || !all_digits(decimal_part)
    {
        return Err(NormaliseError::Invalid(s.to_string()));
    }

    // Trailing zeros carry no precision ("0.5000" at 2 decimals is fine)
    let significant = decimal_part.trim_end_matches('0');
    if significant.len() > decimals as usize {
        return Err(NormaliseError::PrecisionExceeded { value: s.to_string(), decimals });
    }

    let overflow = || NormaliseError::Overflow(s.to_string());
    let scale = 10u64.checked_pow(decimals).ok_or_else(overflow)?;

    let integer: u64 = if integer_part.is_empty() {
        0
    } else {
        integer_part.parse().map_err(|_| overflow())?
    };

    let mut fraction: u64 = 0;
    for digit in significant.bytes() {
        fraction = fraction * 10 + u64::from(digit - b'0');
    }
    // Pad the fraction out to the full scale
    let pad = 10u64
        .checked_pow(decimals - significant.len() as u32)
        .ok_or_else(overflow)?;
    fraction *= pad;

    integer
        .checked_mul(scale)
        .and_then(|v| v.checked_add(fraction))
        .ok_or_else(overflow)
}
