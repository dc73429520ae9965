//! Swap event data decoding
//!
//! Event data is a sequence of 32-byte ABI words. Only the non-indexed
//! fields live here, so the layouts are:
//!
//! - V2: amount0In, amount1In, amount0Out, amount1Out (all uint256)
//! - V3: amount0 (int256), amount1 (int256), sqrtPriceX96 (uint160),
//!   liquidity (uint128), tick (int24)
//! - PancakeV3: the V3 words followed by protocolFeesToken0 and
//!   protocolFeesToken1 (uint128, not used for volume)
//!
//! Words are range-checked against their declared ABI type so that a log
//! decoded with the wrong layout is rejected instead of producing garbage.

use crate::error::DecodeError;
use crate::types::PoolVariant;
use alloy::primitives::{I256, U256};

const WORD: usize = 32;

/// Which of a pool's two tokens a value refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolSide {
    Token0,
    Token1,
}

impl PoolSide {
    pub fn other(&self) -> PoolSide {
        match self {
            PoolSide::Token0 => PoolSide::Token1,
            PoolSide::Token1 => PoolSide::Token0,
        }
    }
}

/// Unsigned per-side magnitudes of one swap, in raw token units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapAmounts {
    pub amount0: U256,
    pub amount1: U256,
    /// Pool price after the swap (concentrated-liquidity layouts only)
    pub sqrt_price_x96: Option<U256>,
}

impl SwapAmounts {
    pub fn side(&self, side: PoolSide) -> U256 {
        match side {
            PoolSide::Token0 => self.amount0,
            PoolSide::Token1 => self.amount1,
        }
    }
}

/// A decoded swap with the analyzed token's share picked out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributedSwap {
    /// Magnitude moved of the analyzed token
    pub analyzed: U256,
    pub amounts: SwapAmounts,
}

fn word(data: &[u8], index: usize) -> &[u8] {
    &data[index * WORD..(index + 1) * WORD]
}

fn uint_word(data: &[u8], index: usize) -> U256 {
    U256::from_be_slice(word(data, index))
}

/// Unsigned word that must fit in `bits`
fn bounded_uint(
    data: &[u8],
    index: usize,
    bits: usize,
    variant: PoolVariant,
    field: &'static str,
) -> Result<U256, DecodeError> {
    let value = uint_word(data, index);
    if value.bit_len() > bits {
        return Err(DecodeError::OutOfRange { variant, field });
    }
    Ok(value)
}

/// int24 tick, sign-extended to 32 bytes
fn tick_word(data: &[u8], index: usize, variant: PoolVariant) -> Result<i32, DecodeError> {
    let w = word(data, index);
    let fill = if w[29] & 0x80 != 0 { 0xff } else { 0x00 };
    if !w[..29].iter().all(|b| *b == fill) {
        return Err(DecodeError::OutOfRange { variant, field: "tick" });
    }
    Ok(i32::from_be_bytes([w[28], w[29], w[30], w[31]]))
}

/// Absolute value of a signed int256 word
fn signed_magnitude(data: &[u8], index: usize) -> U256 {
    I256::from_raw(uint_word(data, index)).unsigned_abs()
}

/// Decode the per-side magnitudes of a Swap event's data.
///
/// Trailing bytes beyond the layout are ignored; short data is an error.
pub fn decode_swap(variant: PoolVariant, data: &[u8]) -> Result<SwapAmounts, DecodeError> {
    let expected = variant.data_words() * WORD;
    if data.len() < expected {
        return Err(DecodeError::TooShort {
            variant,
            expected,
            actual: data.len(),
        });
    }

    match variant {
        PoolVariant::V2 => {
            let amount0_in = uint_word(data, 0);
            let amount1_in = uint_word(data, 1);
            let amount0_out = uint_word(data, 2);
            let amount1_out = uint_word(data, 3);

            // Both legs count towards realized volume on their side
            let amount0 = amount0_in
                .checked_add(amount0_out)
                .ok_or(DecodeError::OutOfRange { variant, field: "amount0" })?;
            let amount1 = amount1_in
                .checked_add(amount1_out)
                .ok_or(DecodeError::OutOfRange { variant, field: "amount1" })?;

            Ok(SwapAmounts {
                amount0,
                amount1,
                sqrt_price_x96: None,
            })
        }
        PoolVariant::V3 | PoolVariant::PancakeV3 => {
            let amount0 = signed_magnitude(data, 0);
            let amount1 = signed_magnitude(data, 1);
            let sqrt_price_x96 = bounded_uint(data, 2, 160, variant, "sqrtPriceX96")?;
            bounded_uint(data, 3, 128, variant, "liquidity")?;
            tick_word(data, 4, variant)?;

            if variant == PoolVariant::PancakeV3 {
                bounded_uint(data, 5, 128, variant, "protocolFeesToken0")?;
                bounded_uint(data, 6, 128, variant, "protocolFeesToken1")?;
            }

            Ok(SwapAmounts {
                amount0,
                amount1,
                sqrt_price_x96: Some(sqrt_price_x96),
            })
        }
    }
}

/// Decode and attribute the swap to the analyzed token's side of the pool
pub fn decode_for_side(
    variant: PoolVariant,
    data: &[u8],
    side: PoolSide,
) -> Result<AttributedSwap, DecodeError> {
    let amounts = decode_swap(variant, data)?;
    Ok(AttributedSwap {
        analyzed: amounts.side(side),
        amounts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::swap::amount::{pow10, TokenAmount};
    use rust_decimal_macros::dec;

    fn encode_words(words: &[U256]) -> Vec<u8> {
        words.iter().flat_map(|w| w.to_be_bytes::<32>()).collect()
    }

    fn int_word(value: i64) -> U256 {
        I256::try_from(value).unwrap().into_raw()
    }

    fn units(whole: u64) -> U256 {
        U256::from(whole) * pow10(18).unwrap()
    }

    fn v3_words(amount0: i64, amount1: i64, tick: i64) -> Vec<U256> {
        vec![
            int_word(amount0),
            int_word(amount1),
            U256::from(1u64) << 96,
            U256::from(5_000_000u64),
            int_word(tick),
        ]
    }

    #[test]
    fn test_v2_in_plus_out_per_side() {
        let data = encode_words(&[units(100), U256::ZERO, U256::ZERO, units(95)]);
        let amounts = decode_swap(PoolVariant::V2, &data).unwrap();

        assert_eq!(TokenAmount::new(amounts.amount0, 18).to_decimal(), Some(dec!(100)));
        assert_eq!(TokenAmount::new(amounts.amount1, 18).to_decimal(), Some(dec!(95)));
        assert_eq!(amounts.sqrt_price_x96, None);
    }

    #[test]
    fn test_side_attribution_flips() {
        let data = encode_words(&[units(100), U256::ZERO, U256::ZERO, units(95)]);

        let as_token0 = decode_for_side(PoolVariant::V2, &data, PoolSide::Token0).unwrap();
        let as_token1 = decode_for_side(PoolVariant::V2, &data, PoolSide::Token1).unwrap();

        assert_eq!(as_token0.analyzed, units(100));
        assert_eq!(as_token1.analyzed, units(95));
        assert_eq!(as_token0.amounts, as_token1.amounts);
        assert_eq!(PoolSide::Token0.other(), PoolSide::Token1);
    }

    #[test]
    fn test_v3_signed_amounts_are_magnitudes() {
        let data = encode_words(&v3_words(-2_500, 1_000, -887_272));
        let amounts = decode_swap(PoolVariant::V3, &data).unwrap();

        assert_eq!(amounts.amount0, U256::from(2_500u64));
        assert_eq!(amounts.amount1, U256::from(1_000u64));
        assert_eq!(amounts.sqrt_price_x96, Some(U256::from(1u64) << 96));
    }

    #[test]
    fn test_pancake_ignores_fee_fields() {
        let mut words = v3_words(7, -3, 12);
        words.push(U256::from(11u64));
        words.push(U256::from(13u64));
        let data = encode_words(&words);

        let amounts = decode_swap(PoolVariant::PancakeV3, &data).unwrap();
        assert_eq!(amounts.amount0, U256::from(7u64));
        assert_eq!(amounts.amount1, U256::from(3u64));

        // The plain V3 layout accepts the same data, trailing words ignored
        assert_eq!(decode_swap(PoolVariant::V3, &data).unwrap().amount0, U256::from(7u64));
    }

    #[test]
    fn test_short_data_rejected() {
        let data = encode_words(&v3_words(1, 1, 0));
        assert_eq!(
            decode_swap(PoolVariant::PancakeV3, &data),
            Err(DecodeError::TooShort {
                variant: PoolVariant::PancakeV3,
                expected: 224,
                actual: 160,
            })
        );
        assert!(decode_swap(PoolVariant::V2, &[]).is_err());
    }

    #[test]
    fn test_v2_data_under_v3_layout_is_rejected() {
        // Five V2-style words: the third is a huge uint256, not a uint160
        let data = encode_words(&[
            U256::ZERO,
            units(1),
            U256::MAX,
            U256::ZERO,
            U256::ZERO,
        ]);
        assert_eq!(
            decode_swap(PoolVariant::V3, &data),
            Err(DecodeError::OutOfRange {
                variant: PoolVariant::V3,
                field: "sqrtPriceX96",
            })
        );
    }

    #[test]
    fn test_tick_must_be_sign_extended() {
        let mut words = v3_words(1, 1, 0);
        words[4] = U256::from(1u64) << 30;
        let data = encode_words(&words);
        assert!(matches!(
            decode_swap(PoolVariant::V3, &data),
            Err(DecodeError::OutOfRange { field: "tick", .. })
        ));
    }
}
