//! Trade aggregation across a token's pool set
//!
//! Flow for one analysis:
//! 1. Resolve the time window to a block range (unresolved -> empty result)
//! 2. Fetch one current spot price for the token
//! 3. Per pool, concurrently up to `max_concurrent_pools`:
//!    read composition, fetch swap logs, decode, build trades and volume
//! 4. Merge pool outcomes in a single consumer and total the token's volume
//!
//! Failures past the preconditions never abort the analysis; they clear the
//! `complete` flag on the pool summary and on the result.

pub mod accumulator;
pub mod pool_detail;

pub use accumulator::PoolVolumeAccumulator;

use crate::block_resolver::BlockResolver;
use crate::chain::{read_composition, ChainReader};
use crate::config::AnalysisSettings;
use crate::error::{AnalysisError, ConfigError};
use crate::indexer::{IndexerTransport, LogClient};
use crate::price::{SpotPriceOracle, TokenPrice};
use crate::swap::{decode_for_side, TokenAmount};
use crate::types::{AnalysisResult, BlockRange, Chain, PoolRef, PoolSummary, TokenConfig, Trade};
use futures::stream::{self, StreamExt};
use rust_decimal::Decimal;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct AggregatorOptions {
    pub max_concurrent_pools: usize,
    /// Overall deadline for `analyze`
    pub timeout: Option<Duration>,
}

impl Default for AggregatorOptions {
    fn default() -> Self {
        Self {
            max_concurrent_pools: 4,
            timeout: None,
        }
    }
}

impl From<&AnalysisSettings> for AggregatorOptions {
    fn from(settings: &AnalysisSettings) -> Self {
        Self {
            max_concurrent_pools: settings.max_concurrent_pools.max(1),
            timeout: settings.analysis_timeout(),
        }
    }
}

/// Everything one pool contributed
struct PoolOutcome {
    index: usize,
    summary: PoolSummary,
    trades: Vec<Trade>,
    volume: PoolVolumeAccumulator,
}

pub struct TradeAggregator {
    chain: Chain,
    reader: Arc<dyn ChainReader>,
    logs: LogClient,
    resolver: BlockResolver,
    prices: Arc<SpotPriceOracle>,
    options: AggregatorOptions,
}

impl TradeAggregator {
    pub fn new(
        chain: Chain,
        reader: Arc<dyn ChainReader>,
        indexer: Arc<dyn IndexerTransport>,
        prices: Arc<SpotPriceOracle>,
        options: AggregatorOptions,
    ) -> Self {
        let logs = LogClient::new(indexer);
        let resolver = BlockResolver::new(chain.clone(), reader.clone(), logs.clone());
        Self {
            chain,
            reader,
            logs,
            resolver,
            prices,
            options,
        }
    }

    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    pub fn resolver(&self) -> &BlockResolver {
        &self.resolver
    }

    /// Analyze swap activity of `token` between two unix timestamps (inclusive).
    /// Bounded by the configured timeout, if any.
    pub async fn analyze(
        &self,
        token: &TokenConfig,
        from_ts: u64,
        to_ts: u64,
    ) -> Result<AnalysisResult, AnalysisError> {
        match self.options.timeout {
            Some(timeout) => {
                self.analyze_until(token, from_ts, to_ts, tokio::time::sleep(timeout))
                    .await
            }
            None => {
                self.analyze_until(token, from_ts, to_ts, std::future::pending())
                    .await
            }
        }
    }

    /// `analyze`, stopping early once `cancel` completes.
    ///
    /// `cancel` is raced against window resolution, the price lookup and pool
    /// processing alike. Cancelled before the window resolves, the result is
    /// `AnalysisResult::unresolved()`. Pools finished before cancellation are
    /// kept; either way the result is marked partial.
    pub async fn analyze_until<F>(
        &self,
        token: &TokenConfig,
        from_ts: u64,
        to_ts: u64,
        cancel: F,
    ) -> Result<AnalysisResult, AnalysisError>
    where
        F: Future<Output = ()>,
    {
        self.check_preconditions(token, from_ts, to_ts)?;
        tokio::pin!(cancel);

        let resolved = tokio::select! {
            biased;
            _ = &mut cancel => {
                warn!("Analysis of {} cancelled while resolving {}..{}", token.symbol, from_ts, to_ts);
                return Ok(AnalysisResult::unresolved());
            }
            range = self.resolver.resolve_range(from_ts, to_ts) => range,
        };
        let Some(range) = resolved else {
            warn!(
                "Window {}..{} unresolved on {}, returning empty result",
                from_ts, to_ts, self.chain.name
            );
            return Ok(AnalysisResult::unresolved());
        };
        info!("Analyzing {} on {} over blocks {}", token.symbol, self.chain.name, range);

        let priced = tokio::select! {
            biased;
            _ = &mut cancel => {
                warn!("Analysis of {} cancelled while pricing", token.symbol);
                return Ok(AnalysisResult {
                    block_range: Some(range),
                    ..AnalysisResult::unresolved()
                });
            }
            price = self.prices.spot_price(token.address, &token.symbol) => price,
        };
        let (price, price_ok) = match priced {
            Ok(price) => (price, true),
            Err(e) => {
                warn!("No spot price for {}, valuing at 0: {}", token.symbol, e);
                (TokenPrice::ZERO, false)
            }
        };

        let pools = token.pools();
        let total_pools = pools.len();
        let mut outcomes = stream::iter(pools.into_iter().enumerate())
            .map(|(index, pool)| self.process_pool(index, token, pool, range, price.current))
            .buffer_unordered(self.options.max_concurrent_pools.max(1));

        let mut trades = Vec::new();
        let mut summaries = Vec::with_capacity(total_pools);
        let mut volume = PoolVolumeAccumulator::new();
        let mut cancelled = false;
        let mut totals_ok = true;

        loop {
            tokio::select! {
                biased;
                _ = &mut cancel => {
                    warn!(
                        "Analysis of {} cancelled with {}/{} pools done",
                        token.symbol,
                        summaries.len(),
                        total_pools
                    );
                    cancelled = true;
                    break;
                }
                next = outcomes.next() => match next {
                    Some(outcome) => {
                        trades.extend(outcome.trades);
                        totals_ok &= volume.merge(outcome.volume);
                        summaries.push((outcome.index, outcome.summary));
                    }
                    None => break,
                },
            }
        }

        summaries.sort_by_key(|(index, _)| *index);
        let pools: Vec<PoolSummary> = summaries.into_iter().map(|(_, s)| s).collect();
        trades.sort_by(|a, b| {
            (a.timestamp, a.block_number, a.log_index).cmp(&(b.timestamp, b.block_number, b.log_index))
        });

        let token_volume = volume
            .total(token.address)
            .and_then(|total| total.to_decimal())
            .unwrap_or(Decimal::ZERO);
        let total_volume_usd = token_volume.checked_mul(price.current).unwrap_or(Decimal::ZERO);
        let total_trade_count = pools.iter().map(|p| p.decoded_logs).sum();
        let complete = price_ok && totals_ok && !cancelled && pools.iter().all(|p| p.complete);

        info!(
            "{}: {} trades, volume {} {} (${}) across {} pools{}",
            token.symbol,
            total_trade_count,
            token_volume,
            token.symbol,
            total_volume_usd,
            pools.len(),
            if complete { "" } else { " (partial)" }
        );

        Ok(AnalysisResult {
            trades,
            total_volume_usd,
            total_trade_count,
            spot_price_usd: price.current,
            average_price_usd: price.average,
            block_range: Some(range),
            pools,
            complete,
        })
    }

    fn check_preconditions(&self, token: &TokenConfig, from_ts: u64, to_ts: u64) -> Result<(), AnalysisError> {
        if from_ts > to_ts {
            return Err(AnalysisError::InvalidWindow { from: from_ts, to: to_ts });
        }
        if !token.network.eq_ignore_ascii_case(&self.chain.name) {
            return Err(ConfigError::NetworkMismatch {
                token: token.symbol.clone(),
                configured: token.network.clone(),
                requested: self.chain.name.clone(),
            }
            .into());
        }
        if !token.has_pools() {
            return Err(ConfigError::NoPools(token.symbol.clone()).into());
        }
        Ok(())
    }

    async fn process_pool(
        &self,
        index: usize,
        token: &TokenConfig,
        pool: PoolRef,
        range: BlockRange,
        price: Decimal,
    ) -> PoolOutcome {
        let mut summary = PoolSummary {
            pool: pool.address,
            variant: pool.variant,
            token0: None,
            token1: None,
            decoded_logs: 0,
            skipped_logs: 0,
            complete: false,
        };
        let mut outcome = PoolOutcome {
            index,
            summary: summary.clone(),
            trades: Vec::new(),
            volume: PoolVolumeAccumulator::new(),
        };

        let composition = match read_composition(self.reader.as_ref(), pool.address).await {
            Ok(c) => c,
            Err(e) => {
                warn!("Skipping {} pool {:?}: {}", pool.variant, pool.address, e);
                return outcome;
            }
        };
        summary.token0 = Some(composition.token0);
        summary.token1 = Some(composition.token1);

        let Some(side) = composition.side_of(token.address) else {
            warn!(
                "Skipping {} pool {:?}: holds neither side {}",
                pool.variant, pool.address, token.symbol
            );
            outcome.summary = summary;
            return outcome;
        };
        let decimals = composition.decimals(side);

        let batch = self
            .logs
            .fetch_logs(&self.chain.indexer_url, pool.address, pool.variant.swap_topic(), range)
            .await;
        let mut volume_dropped = false;

        for entry in batch.entries {
            let Some(data) = entry.data.as_ref() else {
                summary.skipped_logs += 1;
                continue;
            };
            let swap = match decode_for_side(pool.variant, data, side) {
                Ok(swap) => swap,
                Err(e) => {
                    debug!("Skipping log in block {} of {:?}: {}", entry.block_number, pool.address, e);
                    summary.skipped_logs += 1;
                    continue;
                }
            };
            let Some(amount) = TokenAmount::new(swap.analyzed, decimals).to_decimal() else {
                warn!("Swap amount out of range in block {} of {:?}", entry.block_number, pool.address);
                summary.skipped_logs += 1;
                continue;
            };

            let added0 = outcome
                .volume
                .add(composition.token0, TokenAmount::new(swap.amounts.amount0, composition.decimals0));
            let added1 = outcome
                .volume
                .add(composition.token1, TokenAmount::new(swap.amounts.amount1, composition.decimals1));
            if !(added0 && added1) {
                volume_dropped = true;
            }

            outcome.trades.push(Trade {
                timestamp: entry.timestamp,
                block_number: entry.block_number,
                log_index: entry.log_index,
                transaction_hash: entry.transaction_hash,
                pool: pool.address,
                variant: pool.variant,
                amount,
                amount_usd: amount.checked_mul(price).unwrap_or(Decimal::ZERO),
            });
            summary.decoded_logs += 1;
        }

        summary.complete = batch.complete && !volume_dropped;
        if volume_dropped {
            warn!("{} pool {:?}: some volume could not be totalled", pool.variant, pool.address);
        }
        if summary.skipped_logs > 0 {
            warn!(
                "{} pool {:?}: {} logs skipped, {} decoded",
                pool.variant, pool.address, summary.skipped_logs, summary.decoded_logs
            );
        }
        debug!("{} pool {:?}: {} trades", pool.variant, pool.address, summary.decoded_logs);

        outcome.summary = summary;
        outcome
    }
}
