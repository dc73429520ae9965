//! Chain RPC reads
//!
//! The analytics only ever need a handful of view calls: the head block,
//! a pool's token0/token1, and each token's decimals and symbol. They sit
//! behind `ChainReader` so the resolver and aggregator can be driven by
//! in-memory fakes in tests.

use crate::contracts::{IUniswapV2Pair, IERC20};
use crate::error::ChainError;
use crate::swap::PoolSide;
use crate::types::BlockStamp;
use alloy::primitives::Address;
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::BlockNumberOrTag;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::{debug, warn};

#[async_trait]
pub trait ChainReader: Send + Sync {
    async fn latest_block(&self) -> Result<BlockStamp, ChainError>;
    async fn token0(&self, pool: Address) -> Result<Address, ChainError>;
    async fn token1(&self, pool: Address) -> Result<Address, ChainError>;
    async fn decimals(&self, token: Address) -> Result<u8, ChainError>;
    async fn symbol(&self, token: Address) -> Result<String, ChainError>;
}

/// The two tokens of a pool and their on-chain decimals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolComposition {
    pub token0: Address,
    pub token1: Address,
    pub decimals0: u8,
    pub decimals1: u8,
}

impl PoolComposition {
    /// Which side of the pool holds `token`, if either
    pub fn side_of(&self, token: Address) -> Option<PoolSide> {
        if token == self.token0 {
            Some(PoolSide::Token0)
        } else if token == self.token1 {
            Some(PoolSide::Token1)
        } else {
            None
        }
    }

    pub fn decimals(&self, side: PoolSide) -> u8 {
        match side {
            PoolSide::Token0 => self.decimals0,
            PoolSide::Token1 => self.decimals1,
        }
    }
}

/// Read token0/token1 and both decimals for a pool.
/// The token reads run concurrently, then the decimals reads.
pub async fn read_composition(
    reader: &dyn ChainReader,
    pool: Address,
) -> Result<PoolComposition, ChainError> {
    let (token0, token1) = tokio::join!(reader.token0(pool), reader.token1(pool));
    let (token0, token1) = (token0?, token1?);

    let (decimals0, decimals1) = tokio::join!(reader.decimals(token0), reader.decimals(token1));

    Ok(PoolComposition {
        token0,
        token1,
        decimals0: decimals0?,
        decimals1: decimals1?,
    })
}

/// `ChainReader` over an alloy provider. Decimals are cached per token
/// since the same quote tokens show up in most pools.
pub struct RpcChainReader<P> {
    provider: P,
    decimals_cache: RwLock<HashMap<Address, u8>>,
}

/// Connect to the first usable HTTP endpoint in `urls`
pub fn connect_http(urls: &[String]) -> Result<RpcChainReader<impl Provider>, ChainError> {
    let url = urls
        .iter()
        .find_map(|raw| match raw.parse() {
            Ok(url) => Some(url),
            Err(_) => {
                warn!("Skipping invalid RPC URL '{}'", raw);
                None
            }
        })
        .ok_or_else(|| ChainError::InvalidUrl(urls.join(",")))?;

    let provider = ProviderBuilder::new().connect_http(url);
    Ok(RpcChainReader::new(provider))
}

impl<P: Provider> RpcChainReader<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            decimals_cache: RwLock::new(HashMap::new()),
        }
    }

    fn cached_decimals(&self, token: Address) -> Option<u8> {
        self.decimals_cache
            .read()
            .ok()
            .and_then(|cache| cache.get(&token).copied())
    }
}

fn call_error(method: &'static str, target: Address, err: impl std::fmt::Display) -> ChainError {
    ChainError::Call {
        method,
        target: format!("{:?}", target),
        message: err.to_string(),
    }
}

#[async_trait]
impl<P: Provider + 'static> ChainReader for RpcChainReader<P> {
    async fn latest_block(&self) -> Result<BlockStamp, ChainError> {
        let block = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Latest)
            .await
            .map_err(|e| call_error("eth_getBlockByNumber", Address::ZERO, e))?
            .ok_or(ChainError::NoHead)?;

        Ok(BlockStamp {
            number: block.header.number,
            timestamp: block.header.timestamp,
        })
    }

    async fn token0(&self, pool: Address) -> Result<Address, ChainError> {
        IUniswapV2Pair::new(pool, &self.provider)
            .token0()
            .call()
            .await
            .map_err(|e| call_error("token0", pool, e))
    }

    async fn token1(&self, pool: Address) -> Result<Address, ChainError> {
        IUniswapV2Pair::new(pool, &self.provider)
            .token1()
            .call()
            .await
            .map_err(|e| call_error("token1", pool, e))
    }

    async fn decimals(&self, token: Address) -> Result<u8, ChainError> {
        if let Some(d) = self.cached_decimals(token) {
            return Ok(d);
        }

        let d = IERC20::new(token, &self.provider)
            .decimals()
            .call()
            .await
            .map_err(|e| call_error("decimals", token, e))?;

        if let Ok(mut cache) = self.decimals_cache.write() {
            cache.insert(token, d);
        }
        debug!("Decimals for {:?}: {}", token, d);
        Ok(d)
    }

    async fn symbol(&self, token: Address) -> Result<String, ChainError> {
        IERC20::new(token, &self.provider)
            .symbol()
            .call()
            .await
            .map_err(|e| call_error("symbol", token, e))
    }
}
