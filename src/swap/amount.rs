//! Scaled-integer token amounts
//!
//! Raw on-chain integers stay as `U256` together with the token's decimals
//! and are only turned into `Decimal` at the edge. Sums are exact; mixed
//! decimals never meet in one accumulator.

use alloy::primitives::U256;
use rust_decimal::Decimal;
use std::fmt;

/// Largest scale `Decimal` can represent
const MAX_SCALE: u32 = 28;

/// 10^exp, or None past U256
pub fn pow10(exp: u32) -> Option<U256> {
    U256::from(10u64).checked_pow(U256::from(exp))
}

/// Raw token units plus the decimals that scale them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenAmount {
    raw: U256,
    decimals: u8,
}

impl TokenAmount {
    pub fn new(raw: U256, decimals: u8) -> Self {
        Self { raw, decimals }
    }

    pub fn decimals(&self) -> u8 {
        self.decimals
    }

    /// Exact sum; None on differing decimals or U256 overflow
    pub fn checked_add(&self, other: &TokenAmount) -> Option<TokenAmount> {
        if self.decimals != other.decimals {
            return None;
        }
        self.raw
            .checked_add(other.raw)
            .map(|raw| TokenAmount::new(raw, self.decimals))
    }

    /// Convert to a human-unit `Decimal`.
    ///
    /// Digits beyond 28 decimal places are truncated. Returns None when the
    /// whole part does not fit in a `Decimal` (above ~7.9e28 tokens).
    pub fn to_decimal(&self) -> Option<Decimal> {
        let decimals = self.decimals as u32;
        let (raw, scale) = if decimals > MAX_SCALE {
            let reduced = pow10(decimals - MAX_SCALE).map_or(U256::ZERO, |p| self.raw / p);
            (reduced, MAX_SCALE)
        } else {
            (self.raw, decimals)
        };

        let unit = pow10(scale)?;
        let whole = u128::try_from(raw / unit).ok()?;
        let frac = u128::try_from(raw % unit).ok()?;

        let whole = Decimal::try_from_i128_with_scale(i128::try_from(whole).ok()?, 0).ok()?;
        let frac = Decimal::try_from_i128_with_scale(i128::try_from(frac).ok()?, scale).ok()?;
        whole.checked_add(frac).map(|d| d.normalize())
    }
}

impl fmt::Display for TokenAmount {
    /// Exact decimal rendering (no rounding), e.g. "1.5"
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let digits = self.raw.to_string();
        let decimals = self.decimals as usize;
        if decimals == 0 {
            return write!(f, "{}", digits);
        }
        let padded = if digits.len() <= decimals {
            format!("{}{}", "0".repeat(decimals - digits.len() + 1), digits)
        } else {
            digits
        };
        let (whole, frac) = padded.split_at(padded.len() - decimals);
        let frac = frac.trim_end_matches('0');
        if frac.is_empty() {
            write!(f, "{}", whole)
        } else {
            write!(f, "{}.{}", whole, frac)
        }
    }
}
