//! Contract Definitions
//!
//! Read-only Solidity interfaces used to resolve pool composition,
//! defined using alloy's `sol!` macro.
//!
//! Each interface is annotated with `#[sol(rpc)]` to generate contract
//! instance types that can make RPC calls via any alloy Provider. The Swap
//! events are declared alongside so their topic hashes can be checked
//! against the constants the indexer filters on.

use alloy::sol;

// ── ERC20 ─────────────────────────────────────────────────────────────

sol! {
    #[sol(rpc)]
    interface IERC20 {
        function decimals() external view returns (uint8);
        function symbol() external view returns (string);
    }
}

// ── Uniswap V2 ───────────────────────────────────────────────────────

sol! {
    #[sol(rpc)]
    interface IUniswapV2Pair {
        event Swap(address indexed sender, uint256 amount0In, uint256 amount1In, uint256 amount0Out, uint256 amount1Out, address indexed to);

        function token0() external view returns (address);
        function token1() external view returns (address);
    }
}

// ── Uniswap V3 ───────────────────────────────────────────────────────

sol! {
    #[sol(rpc)]
    interface IUniswapV3Pool {
        event Swap(address indexed sender, address indexed recipient, int256 amount0, int256 amount1, uint160 sqrtPriceX96, uint128 liquidity, int24 tick);

        function token0() external view returns (address);
        function token1() external view returns (address);
    }
}

// ── PancakeSwap V3 ───────────────────────────────────────────────────

sol! {
    #[sol(rpc)]
    interface IPancakeV3Pool {
        event Swap(address indexed sender, address indexed recipient, int256 amount0, int256 amount1, uint160 sqrtPriceX96, uint128 liquidity, int24 tick, uint128 protocolFeesToken0, uint128 protocolFeesToken1);

        function token0() external view returns (address);
        function token1() external view returns (address);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PoolVariant;
    use alloy::sol_types::SolEvent;

    #[test]
    fn test_event_signatures_match_variant_topics() {
        assert_eq!(IUniswapV2Pair::Swap::SIGNATURE_HASH, PoolVariant::V2.swap_topic());
        assert_eq!(IUniswapV3Pool::Swap::SIGNATURE_HASH, PoolVariant::V3.swap_topic());
        assert_eq!(IPancakeV3Pool::Swap::SIGNATURE_HASH, PoolVariant::PancakeV3.swap_topic());
    }
}
