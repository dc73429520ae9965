//! Swap decoding
//!
//! Pure functions from raw Swap event data to per-side magnitudes, plus the
//! scaled-integer amount type used for all volume bookkeeping.

pub mod amount;
pub mod decoder;

pub use amount::TokenAmount;
pub use decoder::{decode_for_side, decode_swap, AttributedSwap, PoolSide, SwapAmounts};
