//! Log indexer access
//!
//! Historical logs and block headers come from a range-query indexer
//! (one POST endpoint per chain) rather than from `eth_getLogs` on the RPC
//! node. `LogClient` owns the pagination rules; the transport underneath is
//! a trait so tests can script responses.

pub mod client;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{dedup_by_transaction, BlockWindow, HttpIndexer, IndexerTransport, LogBatch, LogClient};
pub use types::{QueryRequest, QueryResponse};
