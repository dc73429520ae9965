//! Per-token running volume totals

use crate::swap::TokenAmount;
use alloy::primitives::Address;
use std::collections::HashMap;
use tracing::warn;

/// Total notional moved per token address, in each token's raw units.
///
/// Each pool fills its own accumulator; the aggregator merges them in one
/// place so no two tasks ever write the same map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoolVolumeAccumulator {
    totals: HashMap<Address, TokenAmount>,
}

impl PoolVolumeAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `amount` to `token`'s total. Returns false (and leaves the total
    /// unchanged) if the decimals disagree with earlier entries or the sum overflows.
    pub fn add(&mut self, token: Address, amount: TokenAmount) -> bool {
        match self.totals.get(&token) {
            None => {
                self.totals.insert(token, amount);
                true
            }
            Some(current) => match current.checked_add(&amount) {
                Some(sum) => {
                    self.totals.insert(token, sum);
                    true
                }
                None => {
                    warn!(
                        "Volume for {:?} not added: {} ({} decimals) onto {} ({} decimals)",
                        token,
                        amount,
                        amount.decimals(),
                        current,
                        current.decimals()
                    );
                    false
                }
            },
        }
    }

    /// Fold `other` in. False if any of its totals could not be added.
    pub fn merge(&mut self, other: PoolVolumeAccumulator) -> bool {
        let mut all_added = true;
        for (token, amount) in other.totals {
            all_added &= self.add(token, amount);
        }
        all_added
    }

    pub fn total(&self, token: Address) -> Option<TokenAmount> {
        self.totals.get(&token).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::U256;

    fn amount(raw: u64, decimals: u8) -> TokenAmount {
        TokenAmount::new(U256::from(raw), decimals)
    }

    #[test]
    fn test_add_and_merge() {
        let token_a = Address::repeat_byte(0xaa);
        let token_b = Address::repeat_byte(0xbb);

        let mut first = PoolVolumeAccumulator::new();
        assert!(first.add(token_a, amount(100, 18)));
        assert!(first.add(token_b, amount(5, 6)));

        let mut second = PoolVolumeAccumulator::new();
        second.add(token_a, amount(50, 18));

        assert!(first.merge(second));
        assert_eq!(first.total(token_a), Some(amount(150, 18)));
        assert_eq!(first.total(token_b), Some(amount(5, 6)));
        assert_eq!(first.total(Address::ZERO), None);
    }

    #[test]
    fn test_mismatched_decimals_rejected() {
        let token = Address::repeat_byte(1);
        let mut acc = PoolVolumeAccumulator::new();
        acc.add(token, amount(100, 18));
        assert!(!acc.add(token, amount(1, 6)));
        assert_eq!(acc.total(token), Some(amount(100, 18)));
    }
}
