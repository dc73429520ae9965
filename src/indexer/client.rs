//! Indexer transport and the paginated log client

use super::types::{QueryRequest, QueryResponse, ResponseData};
use crate::error::IndexerError;
use crate::types::{BlockRange, BlockStamp, RawLogEntry};
use alloy::primitives::{Address, B256};
use async_trait::async_trait;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// One POST round trip to an indexer endpoint
#[async_trait]
pub trait IndexerTransport: Send + Sync {
    async fn query(&self, url: &str, request: &QueryRequest) -> Result<QueryResponse, IndexerError>;
}

/// reqwest transport with per-request timeout and retry with exponential backoff
pub struct HttpIndexer {
    client: reqwest::Client,
    max_retries: u32,
    backoff: Duration,
}

impl HttpIndexer {
    pub fn new(timeout: Duration, max_retries: u32, backoff: Duration) -> Result<Self, IndexerError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            max_retries,
            backoff,
        })
    }

    async fn post_once(&self, url: &str, request: &QueryRequest) -> Result<QueryResponse, IndexerError> {
        let response = self.client.post(url).json(request).send().await?;
        if !response.status().is_success() {
            return Err(IndexerError::Status(response.status().as_u16()));
        }
        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| IndexerError::Decode(e.to_string()))
    }
}

/// Run `call` until it succeeds, retrying up to `max_retries` times.
/// Retry n waits `backoff * 2^(n-1)`. The last error is returned once retries run out.
pub async fn with_retries<T, F, Fut>(
    max_retries: u32,
    backoff: Duration,
    what: &str,
    mut call: F,
) -> Result<T, IndexerError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, IndexerError>>,
{
    let mut attempt = 0;
    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                attempt += 1;
                if attempt > max_retries {
                    return Err(e);
                }
                warn!("Indexer retry {}/{} ({}): {}", attempt, max_retries, what, e);
                sleep(backoff.saturating_mul(2u32.saturating_pow(attempt - 1))).await;
            }
        }
    }
}

#[async_trait]
impl IndexerTransport for HttpIndexer {
    async fn query(&self, url: &str, request: &QueryRequest) -> Result<QueryResponse, IndexerError> {
        let what = format!("from block {}", request.from_block);
        with_retries(self.max_retries, self.backoff, &what, move || self.post_once(url, request)).await
    }
}

/// Logs of one pool over a range, possibly cut short
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogBatch {
    pub entries: Vec<RawLogEntry>,
    /// False when a page failed or the cursor stopped before the range end
    pub complete: bool,
    pub pages: u32,
}

/// Headers returned for a block window
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockWindow {
    /// Sorted by number, unique
    pub blocks: Vec<BlockStamp>,
    pub complete: bool,
}

struct Pages {
    pages: Vec<ResponseData>,
    complete: bool,
    count: u32,
}

/// Cursor-driven reads against one indexer transport
#[derive(Clone)]
pub struct LogClient {
    transport: Arc<dyn IndexerTransport>,
}

impl LogClient {
    pub fn new(transport: Arc<dyn IndexerTransport>) -> Self {
        Self { transport }
    }

    /// Follow `next_block` from `range.from_block` until it passes `range.to_block`.
    ///
    /// Stops early on a page error or a missing or non-advancing cursor and
    /// returns what was gathered, flagged incomplete.
    async fn paginate<F>(&self, url: &str, range: BlockRange, build: F) -> Pages
    where
        F: Fn(u64) -> QueryRequest,
    {
        let mut current = range.from_block;
        let mut pages = Vec::new();
        let mut count = 0u32;

        let complete = loop {
            let request = build(current);
            let response = match self.transport.query(url, &request).await {
                Ok(r) => r,
                Err(e) => {
                    warn!("Indexer page from block {} failed, keeping {} pages: {}", current, count, e);
                    break false;
                }
            };
            count += 1;

            let next = response.next_block;
            if next != Some(current) {
                pages.extend(response.data);
            }

            match next {
                Some(next) if next > range.to_block => break true,
                Some(next) if next > current => {
                    debug!("Page {} done, cursor {} -> {}", count, current, next);
                    current = next;
                }
                other => {
                    warn!(
                        "Indexer cursor stalled at {} (next_block {:?}), stopping before {}",
                        current, other, range.to_block
                    );
                    break false;
                }
            }
        };

        Pages {
            pages,
            complete,
            count,
        }
    }

    /// Swap logs of `pool` within the inclusive `range`, each joined to its block timestamp
    pub async fn fetch_logs(&self, url: &str, pool: Address, topic: B256, range: BlockRange) -> LogBatch {
        let end_exclusive = range.to_block.saturating_add(1);
        let fetched = self
            .paginate(url, range, |from| QueryRequest::pool_logs(pool, topic, from, end_exclusive))
            .await;

        let mut entries = Vec::new();
        let mut dropped = 0usize;
        for page in fetched.pages {
            let timestamps: HashMap<u64, u64> = page
                .blocks
                .iter()
                .filter_map(|b| Some((b.number?, b.timestamp?)))
                .collect();

            for row in page.logs {
                let Some(block_number) = row.block_number.filter(|n| range.contains(*n)) else {
                    dropped += 1;
                    continue;
                };
                entries.push(RawLogEntry {
                    block_number,
                    log_index: row.log_index,
                    transaction_index: row.transaction_index,
                    transaction_hash: row.transaction_hash,
                    data: row.data,
                    address: row.address,
                    topic0: row.topic0,
                    timestamp: timestamps.get(&block_number).copied(),
                });
            }
        }

        if dropped > 0 {
            debug!("Dropped {} logs for {:?} outside {}", dropped, pool, range);
        }
        info!(
            "Fetched {} logs for {:?} over {} in {} pages{}",
            entries.len(),
            pool,
            range,
            fetched.count,
            if fetched.complete { "" } else { " (partial)" }
        );

        LogBatch {
            entries,
            complete: fetched.complete,
            pages: fetched.count,
        }
    }

    /// `fetch_logs`, keeping one entry per transaction hash.
    /// The last log of a transaction wins; it takes the slot of the first.
    pub async fn fetch_logs_deduped(
        &self,
        url: &str,
        pool: Address,
        topic: B256,
        range: BlockRange,
    ) -> LogBatch {
        let mut batch = self.fetch_logs(url, pool, topic, range).await;
        batch.entries = dedup_by_transaction(batch.entries);
        batch
    }

    /// Header of exactly one block; None if the indexer has no such block
    pub async fn block_at(&self, url: &str, number: u64) -> Result<Option<BlockStamp>, IndexerError> {
        let request = QueryRequest::blocks(number, number.saturating_add(1));
        let response = self.transport.query(url, &request).await?;
        Ok(response
            .data
            .iter()
            .flat_map(|page| page.blocks.iter())
            .find_map(|b| {
                Some(BlockStamp {
                    number: b.number?,
                    timestamp: b.timestamp?,
                })
            }))
    }

    /// Headers of the blocks in the inclusive `range`
    pub async fn block_window(&self, url: &str, range: BlockRange) -> BlockWindow {
        let end_exclusive = range.to_block.saturating_add(1);
        let fetched = self
            .paginate(url, range, |from| QueryRequest::blocks(from, end_exclusive))
            .await;

        let mut blocks: Vec<BlockStamp> = fetched
            .pages
            .iter()
            .flat_map(|page| page.blocks.iter())
            .filter_map(|b| {
                Some(BlockStamp {
                    number: b.number?,
                    timestamp: b.timestamp?,
                })
            })
            .filter(|b| range.contains(b.number))
            .collect();
        blocks.sort_by_key(|b| b.number);
        blocks.dedup_by_key(|b| b.number);

        debug!("Block window {}: {} headers", range, blocks.len());
        BlockWindow {
            blocks,
            complete: fetched.complete,
        }
    }
}

/// Collapse entries sharing a transaction hash. Entries without a hash are kept.
pub fn dedup_by_transaction(entries: Vec<RawLogEntry>) -> Vec<RawLogEntry> {
    let mut slots: HashMap<B256, usize> = HashMap::new();
    let mut out: Vec<RawLogEntry> = Vec::with_capacity(entries.len());
    for entry in entries {
        match entry.transaction_hash {
            Some(hash) => match slots.get(&hash) {
                Some(&slot) => out[slot] = entry,
                None => {
                    slots.insert(hash, out.len());
                    out.push(entry);
                }
            },
            None => out.push(entry),
        }
    }
    out
}
