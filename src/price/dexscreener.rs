//! DexScreener search endpoint as a price source.
//! The first pair returned for the token address is taken as its market,
//! except for WFLR, which is priced off its pair against a fixed base token.

use super::{PriceSource, TokenPrice};
use crate::error::PriceError;
use alloy::primitives::{address, Address};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

pub const DEXSCREENER_API: &str = "https://api.dexscreener.io";

/// Wrapped FLR on Flare
pub const WFLR: Address = address!("1d80c49bbbcd1c0911346656b529df9e5c2f783d");

/// Base token of the pair WFLR is quoted in; WFLR's USD price is 1 / priceNative
pub const WFLR_PRICING_BASE: Address = address!("fbda5f676cb37624f28265a144a48b0d6e87d3b6");

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub pairs: Option<Vec<Pair>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pair {
    pub price_usd: Option<String>,
    #[serde(default)]
    pub price_native: Option<String>,
    #[serde(default)]
    pub base_token: Option<PairToken>,
    #[serde(default)]
    pub quote_token: Option<PairToken>,
    #[serde(default)]
    pub price_change: Option<PriceChange>,
}

/// Kept as text: search results span non-EVM chains too
#[derive(Debug, Deserialize)]
pub struct PairToken {
    pub address: String,
}

impl PairToken {
    fn is(&self, token: Address) -> bool {
        self.address.parse::<Address>().is_ok_and(|a| a == token)
    }
}

impl Pair {
    fn h24_change(&self) -> Option<Decimal> {
        self.price_change
            .as_ref()
            .and_then(|c| c.h24)
            .and_then(|h24| Decimal::try_from(h24).ok())
    }

    fn trades(&self, base: Address, quote: Address) -> bool {
        self.base_token.as_ref().is_some_and(|t| t.is(base))
            && self.quote_token.as_ref().is_some_and(|t| t.is(quote))
    }
}

#[derive(Debug, Deserialize)]
pub struct PriceChange {
    pub h24: Option<f64>,
}

/// Price from a search response: the first pair, or for WFLR its reference pair
pub fn price_from_search(token: Address, response: &SearchResponse) -> Result<TokenPrice, PriceError> {
    let pairs = response
        .pairs
        .as_deref()
        .filter(|pairs| !pairs.is_empty())
        .ok_or_else(|| PriceError::NoPairs(format!("{:?}", token)))?;

    if token == WFLR {
        return wflr_price(pairs);
    }

    let pair = &pairs[0];
    let raw = pair.price_usd.as_deref().unwrap_or("");
    let current = Decimal::from_str(raw).map_err(|_| PriceError::Invalid(raw.to_string()))?;
    Ok(TokenPrice::from_change(current, pair.h24_change()))
}

fn wflr_price(pairs: &[Pair]) -> Result<TokenPrice, PriceError> {
    let pair = pairs
        .iter()
        .find(|pair| pair.trades(WFLR_PRICING_BASE, WFLR))
        .ok_or_else(|| PriceError::NoPairs(format!("{:?}/{:?}", WFLR_PRICING_BASE, WFLR)))?;

    let raw = pair.price_native.as_deref().unwrap_or("");
    let current = Decimal::from_str(raw)
        .ok()
        .and_then(|native| Decimal::ONE.checked_div(native))
        .ok_or_else(|| PriceError::Invalid(raw.to_string()))?;
    Ok(TokenPrice::from_change(current, pair.h24_change()))
}

pub struct DexScreenerSource {
    client: reqwest::Client,
    base_url: String,
}

impl DexScreenerSource {
    pub fn new(timeout: Duration) -> Result<Self, PriceError> {
        Ok(Self {
            client: reqwest::Client::builder().timeout(timeout).build()?,
            base_url: DEXSCREENER_API.to_string(),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl PriceSource for DexScreenerSource {
    async fn price(&self, token: Address) -> Result<TokenPrice, PriceError> {
        let url = format!("{}/latest/dex/search?q={:?}", self.base_url, token);
        let response: SearchResponse = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let price = price_from_search(token, &response)?;
        debug!("DexScreener price for {:?}: {}", token, price.current);
        Ok(price)
    }
}
