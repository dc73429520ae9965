//! Cached spot prices
//!
//! Key features:
//! - Stablecoin handling (any symbol containing USD, plus DAI = $1)
//! - Per-address caching with a TTL
//! - Source failures are returned to the caller, never cached

use super::{PriceSource, TokenPrice};
use crate::error::PriceError;
use alloy::primitives::Address;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::debug;

/// Pegged to $1 without a lookup (in addition to any *USD* symbol)
const STABLECOINS: &[&str] = &["DAI"];

pub fn is_stablecoin(symbol: &str) -> bool {
    let symbol = symbol.to_uppercase();
    symbol.contains("USD") || STABLECOINS.contains(&symbol.as_str())
}

pub struct SpotPriceOracle {
    source: Arc<dyn PriceSource>,
    cache: RwLock<HashMap<Address, (TokenPrice, Instant)>>,
    cache_ttl: Duration,
}

impl SpotPriceOracle {
    pub fn new(source: Arc<dyn PriceSource>) -> Self {
        Self {
            source,
            cache: RwLock::new(HashMap::new()),
            cache_ttl: Duration::from_secs(60),
        }
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    fn cached(&self, token: Address) -> Option<TokenPrice> {
        let cache = self.cache.read().ok()?;
        cache
            .get(&token)
            .filter(|(_, at)| at.elapsed() <= self.cache_ttl)
            .map(|(price, _)| *price)
    }

    /// USD price of one whole token
    pub async fn spot_price(&self, token: Address, symbol: &str) -> Result<TokenPrice, PriceError> {
        if is_stablecoin(symbol) {
            return Ok(TokenPrice::ONE);
        }
        if let Some(price) = self.cached(token) {
            debug!("Cached price for {}: {}", symbol, price.current);
            return Ok(price);
        }

        let price = self.source.price(token).await?;
        if let Ok(mut cache) = self.cache.write() {
            cache.insert(token, (price, Instant::now()));
        }
        Ok(price)
    }
}
