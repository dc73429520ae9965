//! On-chain liquidity analytics
//!
//! Reconstructs swap activity for a token across its configured AMM pools
//! (Uniswap V2 style, V3 style and PancakeSwap V3) over a time window, and
//! values it in USD at the current spot price. Also detects DSF strategy
//! orders from their compressed metadata and extracts their parameters.
//!
//! Components, leaves first:
//! - `block_resolver`: timestamp -> block
//! - `indexer`: paginated log and header reads from the log indexer
//! - `swap`: Swap event decoding and scaled-integer amounts
//! - `aggregator`: per-pool processing and token totals
//! - `strategy`: metadata envelope and DSF parameter scans

pub mod aggregator;
pub mod block_resolver;
pub mod chain;
pub mod config;
pub mod contracts;
pub mod error;
pub mod indexer;
pub mod logging;
pub mod price;
pub mod strategy;
pub mod swap;
pub mod types;

// Re-export commonly used types
pub use aggregator::{AggregatorOptions, PoolVolumeAccumulator, TradeAggregator};
pub use block_resolver::BlockResolver;
pub use chain::{connect_http, ChainReader, RpcChainReader};
pub use config::Settings;
pub use error::{AnalysisError, ChainError, ConfigError, DecodeError, IndexerError, MetaError, PriceError};
pub use indexer::{HttpIndexer, IndexerTransport, LogClient};
pub use price::{DexScreenerSource, PriceSource, SpotPriceOracle, TokenPrice};
pub use strategy::{classify, extract_parameters, StrategyParameters};
pub use swap::{decode_swap, PoolSide, TokenAmount};
pub use types::{
    AnalysisResult, BlockRange, Chain, PoolData, PoolRef, PoolTrade, PoolVariant, TokenConfig, Trade,
};
