//! In-memory indexers for tests

use super::client::IndexerTransport;
use super::types::{BlockRow, LogRow, QueryRequest, QueryResponse, ResponseData};
use crate::error::IndexerError;
use alloy::primitives::Address;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Mutex;

/// Replays a fixed sequence of responses, one per request
pub struct ScriptedIndexer {
    responses: Mutex<VecDeque<Result<QueryResponse, IndexerError>>>,
    requests: Mutex<Vec<QueryRequest>>,
}

impl ScriptedIndexer {
    pub fn new(responses: Vec<Result<QueryResponse, IndexerError>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<QueryRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl IndexerTransport for ScriptedIndexer {
    async fn query(&self, _url: &str, request: &QueryRequest) -> Result<QueryResponse, IndexerError> {
        self.requests.lock().unwrap().push(request.clone());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(IndexerError::Decode("script exhausted".into())))
    }
}

/// A small chain: block timestamps, per-pool logs, and blocks whose lookups fail.
/// Every query is answered in a single page.
#[derive(Default)]
pub struct MemoryIndexer {
    pub blocks: BTreeMap<u64, u64>,
    pub logs: HashMap<Address, Vec<LogRow>>,
    pub failing: HashSet<u64>,
    requests: Mutex<Vec<QueryRequest>>,
}

impl MemoryIndexer {
    /// Blocks `0..count` spaced `block_time` seconds apart from `genesis`
    pub fn regular(count: u64, genesis: u64, block_time: u64) -> Self {
        Self {
            blocks: (0..count).map(|n| (n, genesis + n * block_time)).collect(),
            ..Default::default()
        }
    }

    pub fn requests(&self) -> Vec<QueryRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn log_requests(&self) -> usize {
        self.requests().iter().filter(|r| r.pool().is_some()).count()
    }

    fn block_row(&self, number: u64) -> Option<BlockRow> {
        self.blocks.get(&number).map(|ts| BlockRow {
            number: Some(number),
            timestamp: Some(*ts),
        })
    }
}

#[async_trait]
impl IndexerTransport for MemoryIndexer {
    async fn query(&self, _url: &str, request: &QueryRequest) -> Result<QueryResponse, IndexerError> {
        self.requests.lock().unwrap().push(request.clone());
        let from = request.from_block;
        let to = request.to_block.unwrap_or(from + 1);

        let data = match request.pool() {
            Some(pool) => {
                let logs: Vec<LogRow> = self
                    .logs
                    .get(&pool)
                    .map(|rows| {
                        rows.iter()
                            .filter(|r| r.block_number.is_some_and(|n| n >= from && n < to))
                            .cloned()
                            .collect()
                    })
                    .unwrap_or_default();
                let mut numbers: Vec<u64> = logs.iter().filter_map(|r| r.block_number).collect();
                numbers.dedup();
                let blocks = numbers.into_iter().filter_map(|n| self.block_row(n)).collect();
                ResponseData { logs, blocks }
            }
            None => {
                if self.failing.contains(&from) {
                    return Err(IndexerError::Status(503));
                }
                let blocks = self
                    .blocks
                    .range(from..to)
                    .filter_map(|(n, _)| self.block_row(*n))
                    .collect();
                ResponseData {
                    logs: Vec::new(),
                    blocks,
                }
            }
        };

        Ok(QueryResponse {
            data: vec![data],
            next_block: Some(to),
        })
    }
}
