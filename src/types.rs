//! Core data structures shared by the resolver, log client, decoder and aggregator.
//!
//! Everything here is request-scoped: built fresh for one analysis and dropped
//! afterwards. Addresses are `alloy` byte addresses, so comparisons are
//! case-insensitive by construction.

use alloy::primitives::{b256, Address, B256};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// keccak256("Swap(address,uint256,uint256,uint256,uint256,address)")
pub const V2_SWAP_TOPIC: B256 =
    b256!("d78ad95fa46c994b6551d0da85fc275fe613ce37657fb8d5e3d130840159d822");

/// keccak256("Swap(address,address,int256,int256,uint160,uint128,int24)")
pub const V3_SWAP_TOPIC: B256 =
    b256!("c42079f94a6350d7e6235f29174924f928cc2ac818eb64fed8004e115fbcca67");

/// keccak256("Swap(address,address,int256,int256,uint160,uint128,int24,uint128,uint128)")
pub const PANCAKE_V3_SWAP_TOPIC: B256 =
    b256!("19b47279256b2a23a1665c810c8d55a1758940ee09377d4f8d26497a3577dc83");

/// Swap-event layouts we know how to decode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PoolVariant {
    /// Constant product (Uniswap V2 and forks)
    #[serde(rename = "v2")]
    V2,
    /// Concentrated liquidity (Uniswap V3 and forks)
    #[serde(rename = "v3")]
    V3,
    /// PancakeSwap V3: V3 layout plus two trailing fee fields
    #[serde(rename = "pancake-v3")]
    PancakeV3,
}

impl PoolVariant {
    pub const ALL: [PoolVariant; 3] = [PoolVariant::V2, PoolVariant::V3, PoolVariant::PancakeV3];

    /// Topic0 of this variant's Swap event
    pub fn swap_topic(&self) -> B256 {
        match self {
            PoolVariant::V2 => V2_SWAP_TOPIC,
            PoolVariant::V3 => V3_SWAP_TOPIC,
            PoolVariant::PancakeV3 => PANCAKE_V3_SWAP_TOPIC,
        }
    }

    /// Number of 32-byte words in the non-indexed event data
    pub fn data_words(&self) -> usize {
        match self {
            PoolVariant::V2 => 4,
            PoolVariant::V3 => 5,
            PoolVariant::PancakeV3 => 7,
        }
    }

    pub fn is_concentrated(&self) -> bool {
        matches!(self, PoolVariant::V3 | PoolVariant::PancakeV3)
    }
}

impl fmt::Display for PoolVariant {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PoolVariant::V2 => write!(f, "v2"),
            PoolVariant::V3 => write!(f, "v3"),
            PoolVariant::PancakeV3 => write!(f, "pancake-v3"),
        }
    }
}

impl FromStr for PoolVariant {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "v2" => Ok(PoolVariant::V2),
            "v3" => Ok(PoolVariant::V3),
            "pancake-v3" | "pancakev3" | "pancakeswapv3" => Ok(PoolVariant::PancakeV3),
            other => Err(format!("unknown pool variant '{}'", other)),
        }
    }
}

/// A pool contract and the layout of its Swap event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PoolRef {
    pub address: Address,
    pub variant: PoolVariant,
}

impl PoolRef {
    pub fn new(address: Address, variant: PoolVariant) -> Self {
        Self { address, variant }
    }
}

/// Static reference data for one analyzable token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenConfig {
    pub symbol: String,
    pub decimals: u8,
    pub network: String,
    pub address: Address,
    #[serde(default)]
    pub pools_v2: Vec<Address>,
    #[serde(default)]
    pub pools_v3: Vec<Address>,
    #[serde(default)]
    pub pools_pancake_v3: Vec<Address>,
}

impl TokenConfig {
    /// All configured pools, tagged with their variant.
    /// Duplicate entries within a variant list are dropped.
    pub fn pools(&self) -> Vec<PoolRef> {
        let mut pools: Vec<PoolRef> = Vec::new();
        let lists = [
            (PoolVariant::V2, &self.pools_v2),
            (PoolVariant::V3, &self.pools_v3),
            (PoolVariant::PancakeV3, &self.pools_pancake_v3),
        ];
        for (variant, addresses) in lists {
            for address in addresses {
                let pool = PoolRef::new(*address, variant);
                if !pools.contains(&pool) {
                    pools.push(pool);
                }
            }
        }
        pools
    }

    pub fn has_pools(&self) -> bool {
        !(self.pools_v2.is_empty() && self.pools_v3.is_empty() && self.pools_pancake_v3.is_empty())
    }
}

/// How timestamps are mapped to blocks on a chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolverMode {
    /// Look up single blocks over [0, head]; works with irregular block times
    #[default]
    BinarySearch,
    /// Estimate from the nominal block time, then search a window around it
    LinearEstimate,
}

/// Immutable per-chain settings for one analysis
#[derive(Debug, Clone, PartialEq)]
pub struct Chain {
    pub name: String,
    pub chain_id: u64,
    pub rpc_urls: Vec<String>,
    /// Nominal seconds per block (search hint only)
    pub block_time: Option<f64>,
    /// Full query endpoint of the log indexer
    pub indexer_url: String,
    pub resolver: ResolverMode,
    /// Blocks on each side of the linear estimate to fetch
    pub linear_window: u64,
}

/// Inclusive block interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRange {
    pub from_block: u64,
    pub to_block: u64,
}

impl BlockRange {
    /// Returns None unless from_block <= to_block
    pub fn new(from_block: u64, to_block: u64) -> Option<Self> {
        (from_block <= to_block).then_some(Self { from_block, to_block })
    }

    pub fn contains(&self, block: u64) -> bool {
        block >= self.from_block && block <= self.to_block
    }

    pub fn block_count(&self) -> u64 {
        self.to_block - self.from_block + 1
    }
}

impl fmt::Display for BlockRange {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}..={}", self.from_block, self.to_block)
    }
}

/// A block number with its header timestamp (unix seconds)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockStamp {
    pub number: u64,
    pub timestamp: u64,
}

/// One indexer log joined with its block timestamp
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawLogEntry {
    pub block_number: u64,
    pub log_index: Option<u64>,
    pub transaction_index: Option<u64>,
    pub transaction_hash: Option<B256>,
    pub data: Option<alloy::primitives::Bytes>,
    pub address: Option<Address>,
    pub topic0: Option<B256>,
    /// None when the page carried no block row for this log
    pub timestamp: Option<u64>,
}

/// A decoded swap, expressed in the analyzed token's units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub timestamp: Option<u64>,
    pub block_number: u64,
    pub log_index: Option<u64>,
    pub transaction_hash: Option<B256>,
    pub pool: Address,
    pub variant: PoolVariant,
    /// Magnitude moved of the analyzed token
    pub amount: Decimal,
    /// amount x spot price at analysis time (not at trade time)
    pub amount_usd: Decimal,
}

/// Per-pool bookkeeping reported alongside the totals
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolSummary {
    pub pool: Address,
    pub variant: PoolVariant,
    pub token0: Option<Address>,
    pub token1: Option<Address>,
    pub decoded_logs: u64,
    pub skipped_logs: u64,
    /// False when composition reads failed or pagination stopped early
    pub complete: bool,
}

/// Output of `TradeAggregator::analyze`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub trades: Vec<Trade>,
    pub total_volume_usd: Decimal,
    pub total_trade_count: u64,
    /// One current price for the whole window; historical prices are not looked up
    pub spot_price_usd: Decimal,
    /// Rough 24h average from the source's 24h change, for comparison with the spot price
    pub average_price_usd: Decimal,
    pub block_range: Option<BlockRange>,
    pub pools: Vec<PoolSummary>,
    /// False when any fetch, read or price lookup failed along the way
    pub complete: bool,
}

impl AnalysisResult {
    /// Result for a window that could not be mapped to blocks.
    /// No logs were fetched, so the zero totals are not authoritative.
    pub fn unresolved() -> Self {
        Self {
            trades: Vec::new(),
            total_volume_usd: Decimal::ZERO,
            total_trade_count: 0,
            spot_price_usd: Decimal::ZERO,
            average_price_usd: Decimal::ZERO,
            block_range: None,
            pools: Vec::new(),
            complete: false,
        }
    }
}

/// One swap in a single-pool listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolTrade {
    pub block_number: u64,
    pub pool_address: Address,
    pub transaction_hash: Option<B256>,
    pub timestamp: Option<u64>,
    pub amount0: Decimal,
    pub amount1: Decimal,
    /// token0 per token1
    pub ratio0: Decimal,
    /// token1 per token0
    pub ratio1: Decimal,
}

/// Detailed trade listing for one pool over a block range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolData {
    pub token0_address: Address,
    pub token1_address: Address,
    pub token0_decimals: u8,
    pub token1_decimals: u8,
    pub token0_symbol: String,
    pub token1_symbol: String,
    pub pool_address: Address,
    pub pool_type: PoolVariant,
    pub pool_trades: Vec<PoolTrade>,
    pub complete: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{address, keccak256};

    #[test]
    fn test_swap_topics_match_event_signatures() {
        assert_eq!(
            keccak256(b"Swap(address,uint256,uint256,uint256,uint256,address)"),
            V2_SWAP_TOPIC
        );
        assert_eq!(
            keccak256(b"Swap(address,address,int256,int256,uint160,uint128,int24)"),
            V3_SWAP_TOPIC
        );
        assert_eq!(
            keccak256(b"Swap(address,address,int256,int256,uint160,uint128,int24,uint128,uint128)"),
            PANCAKE_V3_SWAP_TOPIC
        );
    }

    #[test]
    fn test_variant_parse_and_display() {
        for variant in PoolVariant::ALL {
            assert_eq!(variant.to_string().parse::<PoolVariant>().unwrap(), variant);
        }
        assert!("v4".parse::<PoolVariant>().is_err());
    }

    #[test]
    fn test_token_pools_tagged_and_deduplicated() {
        let pool_a = address!("c84f479bf220e38ba3bd0262049bad47aaa673ee");
        let pool_b = address!("9b08288c3be4f62bbf8d1c20ac9c5e6f9467d8b7");
        let token = TokenConfig {
            symbol: "WPOL".to_string(),
            decimals: 18,
            network: "polygon".to_string(),
            address: address!("0d500b1d8e8ef31e21c99d1db9a6444d3adf1270"),
            pools_v2: vec![pool_a, pool_a],
            pools_v3: vec![pool_b],
            pools_pancake_v3: vec![],
        };

        let pools = token.pools();
        assert_eq!(pools.len(), 2);
        assert_eq!(pools[0], PoolRef::new(pool_a, PoolVariant::V2));
        assert_eq!(pools[1], PoolRef::new(pool_b, PoolVariant::V3));
        assert!(token.has_pools());
    }

    #[test]
    fn test_block_range_invariant() {
        assert!(BlockRange::new(10, 9).is_none());
        let range = BlockRange::new(10, 10).unwrap();
        assert_eq!(range.block_count(), 1);
        assert!(range.contains(10));
        assert!(!range.contains(11));
    }
}
