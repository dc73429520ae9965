//! Timestamp to block resolution
//!
//! Two strategies, picked per chain:
//!
//! - **Binary search** (default): look up single blocks over `[0, head]` via the
//!   indexer, tracking the closest timestamp seen. An empty or failed lookup is
//!   treated as "too high". Works with irregular block times and gaps.
//! - **Linear estimate**: `head - (head_ts - target) / block_time`, then fetch
//!   a window of headers around the estimate and binary-search those.
//!
//! `None` means unresolved; callers treat it as "no data", not as an error.

use crate::chain::ChainReader;
use crate::indexer::LogClient;
use crate::types::{BlockRange, BlockStamp, Chain, ResolverMode};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct BlockResolver {
    chain: Chain,
    reader: Arc<dyn ChainReader>,
    logs: LogClient,
}

/// Closest-so-far tracker: (|delta|, block number)
#[derive(Debug, Default)]
struct Nearest(Option<(u64, u64)>);

impl Nearest {
    fn offer(&mut self, stamp: BlockStamp, target: u64) {
        let delta = stamp.timestamp.abs_diff(target);
        if self.0.map_or(true, |(best, _)| delta < best) {
            self.0 = Some((delta, stamp.number));
        }
    }

    fn block(&self) -> Option<u64> {
        self.0.map(|(_, number)| number)
    }
}

/// Closest block in a header list sorted by number.
/// An exact timestamp match returns immediately.
pub fn nearest_in(blocks: &[BlockStamp], target: u64) -> Option<u64> {
    let mut nearest = Nearest::default();
    let (mut left, mut right) = (0usize, blocks.len());

    // Half-open [left, right)
    while left < right {
        let mid = left + (right - left) / 2;
        let stamp = blocks[mid];
        nearest.offer(stamp, target);

        if stamp.timestamp < target {
            left = mid + 1;
        } else if stamp.timestamp > target {
            right = mid;
        } else {
            return Some(stamp.number);
        }
    }
    nearest.block()
}

impl BlockResolver {
    pub fn new(chain: Chain, reader: Arc<dyn ChainReader>, logs: LogClient) -> Self {
        Self { chain, reader, logs }
    }

    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    /// Block closest to `target` (unix seconds), or None if nothing could be checked
    pub async fn resolve(&self, target: u64) -> Option<u64> {
        let head = match self.reader.latest_block().await {
            Ok(head) => head,
            Err(e) => {
                warn!("Cannot resolve timestamp {} on {}: {}", target, self.chain.name, e);
                return None;
            }
        };

        let resolved = match (self.chain.resolver, self.chain.block_time) {
            (ResolverMode::LinearEstimate, Some(block_time)) if block_time > 0.0 => {
                self.linear_estimate(head, block_time, target).await
            }
            (ResolverMode::LinearEstimate, _) => {
                warn!("{} has no usable block time, falling back to binary search", self.chain.name);
                self.binary_search(head, target).await
            }
            (ResolverMode::BinarySearch, _) => self.binary_search(head, target).await,
        };

        match resolved {
            Some(block) => info!("Timestamp {} -> block {} on {}", target, block, self.chain.name),
            None => warn!("Timestamp {} unresolved on {}", target, self.chain.name),
        }
        resolved
    }

    /// Resolve both ends of a time window. None if either end is unresolved.
    pub async fn resolve_range(&self, from_ts: u64, to_ts: u64) -> Option<BlockRange> {
        let from_block = self.resolve(from_ts).await?;
        let to_block = self.resolve(to_ts).await?;
        BlockRange::new(from_block, to_block)
    }

    async fn binary_search(&self, head: BlockStamp, target: u64) -> Option<u64> {
        let url = &self.chain.indexer_url;
        let mut nearest = Nearest::default();
        let (mut left, mut right) = (0u64, head.number);
        let mut lookups = 0u32;

        while left <= right {
            let mid = left + (right - left) / 2;
            lookups += 1;

            let lookup = match self.logs.block_at(url, mid).await {
                Ok(found) => found,
                Err(e) => {
                    debug!("Lookup at block {} failed: {}", mid, e);
                    None
                }
            };

            let Some(stamp) = lookup else {
                // Gap or failure: search lower
                if mid == 0 {
                    break;
                }
                right = mid - 1;
                continue;
            };

            debug!("Lookup {} block {} ts {}", lookups, stamp.number, stamp.timestamp);
            nearest.offer(stamp, target);

            if stamp.timestamp == target {
                break;
            } else if stamp.timestamp < target {
                left = mid + 1;
            } else {
                if mid == 0 {
                    break;
                }
                right = mid - 1;
            }
        }

        debug!("Binary search for {} finished after {} lookups", target, lookups);
        nearest.block()
    }

    async fn linear_estimate(&self, head: BlockStamp, block_time: f64, target: u64) -> Option<u64> {
        let elapsed = head.timestamp.saturating_sub(target);
        let behind = (elapsed as f64 / block_time).floor() as u64;
        let estimate = head.number.saturating_sub(behind);

        let window = self.chain.linear_window;
        let range = BlockRange::new(
            estimate.saturating_sub(window),
            estimate.saturating_add(window).min(head.number),
        )?;
        debug!("Linear estimate for {}: block {} (window {})", target, estimate, range);

        let fetched = self.logs.block_window(&self.chain.indexer_url, range).await;
        if !fetched.complete {
            warn!("Block window {} only partially fetched", range);
        }
        nearest_in(&fetched.blocks, target)
    }
}
