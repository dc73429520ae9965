//! Single-pool trade listing with per-trade exchange ratios

use super::TradeAggregator;
use crate::chain::read_composition;
use crate::error::ChainError;
use crate::swap::{decode_swap, SwapAmounts, TokenAmount};
use crate::types::{BlockRange, PoolData, PoolRef, PoolTrade, PoolVariant};
use alloy::primitives::U256;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};

/// 2^96 as f64
const Q96: f64 = 79_228_162_514_264_337_593_543_950_336.0;

/// `numerator / denominator`, zero when the divisor is zero
fn ratio(numerator: Decimal, denominator: Decimal) -> Decimal {
    numerator.checked_div(denominator).unwrap_or(Decimal::ZERO)
}

/// token0-per-token1 and token1-per-token0 at the pool price after the swap.
///
/// price = (sqrtPriceX96 / 2^96)^2 is token1 per token0 in raw units, so
/// ratio0 = 10^(dec1 - dec0) / price.
pub fn concentrated_ratios(sqrt_price_x96: U256, decimals0: u8, decimals1: u8) -> (Decimal, Decimal) {
    let sqrt_price = sqrt_price_x96.to_string().parse::<f64>().unwrap_or(0.0) / Q96;
    let price = sqrt_price * sqrt_price;
    if price <= 0.0 || !price.is_finite() {
        return (Decimal::ZERO, Decimal::ZERO);
    }

    let scale = 10f64.powi(decimals1 as i32 - decimals0 as i32);
    let ratio0 = scale / price;
    let ratio1 = 1.0 / ratio0;
    (
        Decimal::try_from(ratio0).unwrap_or(Decimal::ZERO),
        Decimal::try_from(ratio1).unwrap_or(Decimal::ZERO),
    )
}

fn pool_trade_ratios(
    variant: PoolVariant,
    amounts: &SwapAmounts,
    amount0: Decimal,
    amount1: Decimal,
    decimals0: u8,
    decimals1: u8,
) -> (Decimal, Decimal) {
    match amounts.sqrt_price_x96 {
        Some(sqrt_price) if variant.is_concentrated() => concentrated_ratios(sqrt_price, decimals0, decimals1),
        _ => (ratio(amount0, amount1), ratio(amount1, amount0)),
    }
}

impl TradeAggregator {
    /// Every swap of one pool in `range`, one entry per transaction.
    ///
    /// Fails only if the pool's tokens or decimals cannot be read; log and
    /// symbol problems leave `complete` false instead.
    pub async fn pool_data(&self, pool: PoolRef, range: BlockRange) -> Result<PoolData, ChainError> {
        let composition = read_composition(self.reader.as_ref(), pool.address).await?;

        let (symbol0, symbol1) = tokio::join!(
            self.reader.symbol(composition.token0),
            self.reader.symbol(composition.token1)
        );
        let mut complete = true;
        let mut symbol_or_blank = |result: Result<String, ChainError>| {
            result.unwrap_or_else(|e| {
                warn!("Symbol read failed: {}", e);
                complete = false;
                String::new()
            })
        };
        let token0_symbol = symbol_or_blank(symbol0);
        let token1_symbol = symbol_or_blank(symbol1);

        let batch = self
            .logs
            .fetch_logs_deduped(&self.chain.indexer_url, pool.address, pool.variant.swap_topic(), range)
            .await;
        complete &= batch.complete;

        let mut pool_trades = Vec::with_capacity(batch.entries.len());
        for entry in batch.entries {
            let Some(data) = entry.data.as_ref() else {
                continue;
            };
            let amounts = match decode_swap(pool.variant, data) {
                Ok(a) => a,
                Err(e) => {
                    debug!("Skipping log in block {}: {}", entry.block_number, e);
                    continue;
                }
            };

            let amount0 = TokenAmount::new(amounts.amount0, composition.decimals0)
                .to_decimal()
                .unwrap_or(Decimal::ZERO);
            let amount1 = TokenAmount::new(amounts.amount1, composition.decimals1)
                .to_decimal()
                .unwrap_or(Decimal::ZERO);
            let (ratio0, ratio1) = pool_trade_ratios(
                pool.variant,
                &amounts,
                amount0,
                amount1,
                composition.decimals0,
                composition.decimals1,
            );

            pool_trades.push(PoolTrade {
                block_number: entry.block_number,
                pool_address: pool.address,
                transaction_hash: entry.transaction_hash,
                timestamp: entry.timestamp,
                amount0,
                amount1,
                ratio0,
                ratio1,
            });
        }

        info!(
            "{} pool {:?}: {} trades over {}",
            pool.variant,
            pool.address,
            pool_trades.len(),
            range
        );

        Ok(PoolData {
            token0_address: composition.token0,
            token1_address: composition.token1,
            token0_decimals: composition.decimals0,
            token1_decimals: composition.decimals1,
            token0_symbol,
            token1_symbol,
            pool_address: pool.address,
            pool_type: pool.variant,
            pool_trades,
            complete,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregator::tests::{aggregator, swap_log, units, v2_data, world, TOKEN, USDC, V2_POOL, V3_POOL};
    use alloy::primitives::Address;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    #[test]
    fn test_concentrated_ratios_at_parity() {
        // sqrtPriceX96 = 2^96 means one raw token1 per raw token0
        let (ratio0, ratio1) = concentrated_ratios(U256::from(1u64) << 96, 18, 18);
        assert_eq!(ratio0, Decimal::ONE);
        assert_eq!(ratio1, Decimal::ONE);

        // Same raw price with 18/6 decimals: 1e-12 token0 per token1
        let (ratio0, _) = concentrated_ratios(U256::from(1u64) << 96, 18, 6);
        assert!((ratio0 - dec!(0.000000000001)).abs() < dec!(0.0000000000000001));

        assert_eq!(concentrated_ratios(U256::ZERO, 18, 18), (Decimal::ZERO, Decimal::ZERO));
    }

    #[tokio::test]
    async fn test_pool_data_v2_listing() {
        let (chain, mut indexer) = world();
        // Second log of tx 1 in the same block replaces the first
        indexer.logs.get_mut(&V2_POOL).unwrap().insert(
            1,
            swap_log(110, 1, 1, v2_data(units(50, 18), U256::ZERO, U256::ZERO, units(25, 6))),
        );
        let aggregator = aggregator(chain, Arc::new(indexer), Some(dec!(1)));

        let data = aggregator
            .pool_data(PoolRef::new(V2_POOL, PoolVariant::V2), BlockRange::new(100, 200).unwrap())
            .await
            .unwrap();

        assert_eq!(data.token0_address, TOKEN);
        assert_eq!(data.token1_address, USDC);
        assert_eq!(data.token1_decimals, 6);
        assert_eq!(data.token1_symbol, "USDC");
        assert!(data.complete);

        // tx1 (deduped), tx2; malformed and empty payloads dropped
        assert_eq!(data.pool_trades.len(), 2);
        let first = &data.pool_trades[0];
        assert_eq!(first.amount0, dec!(50));
        assert_eq!(first.amount1, dec!(25));
        assert_eq!(first.ratio0, dec!(2));
        assert_eq!(first.ratio1, dec!(0.5));
    }

    #[tokio::test]
    async fn test_pool_data_v3_uses_sqrt_price() {
        let (chain, indexer) = world();
        let aggregator = aggregator(chain, Arc::new(indexer), Some(dec!(1)));

        let data = aggregator
            .pool_data(PoolRef::new(V3_POOL, PoolVariant::V3), BlockRange::new(100, 200).unwrap())
            .await
            .unwrap();

        assert_eq!(data.pool_trades.len(), 1);
        assert_eq!(data.pool_trades[0].amount1, dec!(5));
        assert_eq!(data.pool_trades[0].ratio0, Decimal::ONE);
    }

    #[tokio::test]
    async fn test_pool_data_unknown_pool_fails() {
        let (chain, indexer) = world();
        let aggregator = aggregator(chain, Arc::new(indexer), Some(dec!(1)));
        let pool = PoolRef::new(Address::repeat_byte(0xee), PoolVariant::V2);
        assert!(aggregator.pool_data(pool, BlockRange::new(1, 2).unwrap()).await.is_err());
    }
}
