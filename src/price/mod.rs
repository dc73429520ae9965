//! USD price lookups
//!
//! One current spot price is fetched per analysis and applied to every trade
//! in the window. Historical price-at-trade is not attempted: old trades are
//! valued at today's price.

pub mod dexscreener;
pub mod oracle;

use crate::error::PriceError;
use alloy::primitives::Address;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub use dexscreener::DexScreenerSource;
pub use oracle::SpotPriceOracle;

/// Current price plus a rough 24h average
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenPrice {
    pub current: Decimal,
    pub average: Decimal,
}

impl TokenPrice {
    pub const ZERO: TokenPrice = TokenPrice {
        current: Decimal::ZERO,
        average: Decimal::ZERO,
    };

    pub const ONE: TokenPrice = TokenPrice {
        current: Decimal::ONE,
        average: Decimal::ONE,
    };

    /// Average of the current price and the price 24h ago implied by `change_pct`
    pub fn from_change(current: Decimal, change_pct: Option<Decimal>) -> Self {
        let average = change_pct
            .filter(|pct| !pct.is_zero() && current > Decimal::ZERO)
            .and_then(|pct| {
                let factor = Decimal::ONE.checked_add(pct.checked_div(Decimal::ONE_HUNDRED)?)?;
                let start = current.checked_div(factor)?;
                current.checked_add(start)?.checked_div(Decimal::TWO)
            })
            .unwrap_or(current);
        Self { current, average }
    }
}

#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn price(&self, token: Address) -> Result<TokenPrice, PriceError>;
}
