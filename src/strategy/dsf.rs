//! DSF strategy detection and parameter extraction
//!
//! DSF orders are recognised by their last-trade bookkeeping block in the
//! program source. Parameters are read textually: a literal anchor followed
//! by a number, or a regex capture group. Every field is extracted on its
//! own, so one missing binding never hides the others.

use super::meta::program_source;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::debug;

/// Bookkeeping of the previous trade's time and io ratio
pub const LAST_TRADE_ANCHOR: &str = "\
:set(hash(order-hash() LAST-TRADE-TIME-KEY) now()),
:set(hash(order-hash() LAST-TRADE-IO-KEY) calculated-io);";

pub const MIN_TRADE_AMOUNT_ANCHOR: &str = "min-trade-amount: ";
pub const MAX_TRADE_AMOUNT_ANCHOR: &str = "max-trade-amount: ";
pub const NEXT_TRADE_MULTIPLIER_ANCHOR: &str = "next-trade-multiplier: ";
pub const COST_BASIS_MULTIPLIER_ANCHOR: &str = "cost-basis-multiplier: ";
pub const EPOCHS_ANCHOR: &str = "amount-epochs: ";

/// Leading integer or decimal
static NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^-?\d+(?:\.\d+)?").expect("valid number regex"));

/// `fast-exit: call<'fast-exit>(<buy amount> <sell amount>)`
static FAST_EXIT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"fast-exit:\s*call<'fast-exit>\(\s*(-?\d+(?:\.\d+)?)\s+(-?\d+(?:\.\d+)?)\s*\)")
        .expect("valid fast-exit regex")
});

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyParameters {
    pub min_trade_amount: Option<Decimal>,
    pub max_trade_amount: Option<Decimal>,
    pub next_trade_multiplier: Option<Decimal>,
    pub cost_basis_multiplier: Option<Decimal>,
    pub epochs: Option<Decimal>,
    pub fast_exit_buy_amount: Option<Decimal>,
    pub fast_exit_sell_amount: Option<Decimal>,
}

impl StrategyParameters {
    pub fn is_empty(&self) -> bool {
        *self == StrategyParameters::default()
    }
}

fn normalize(source: &str) -> String {
    source.replace("\r\n", "\n")
}

/// Number right after the first occurrence of `anchor`
fn after_anchor(source: &str, anchor: &str) -> Option<Decimal> {
    let start = source.find(anchor)? + anchor.len();
    let token = NUMBER.find(&source[start..])?;
    Decimal::from_str(token.as_str()).ok()
}

/// Capture group `group` of the first `pattern` match
fn capture(source: &str, pattern: &Regex, group: usize) -> Option<Decimal> {
    let captures = pattern.captures(source)?;
    Decimal::from_str(captures.get(group)?.as_str()).ok()
}

/// True if the program source carries the DSF bookkeeping block
pub fn classify_source(source: &str) -> bool {
    normalize(source).contains(LAST_TRADE_ANCHOR)
}

pub fn extract_from_source(source: &str) -> StrategyParameters {
    let source = normalize(source);
    StrategyParameters {
        min_trade_amount: after_anchor(&source, MIN_TRADE_AMOUNT_ANCHOR),
        max_trade_amount: after_anchor(&source, MAX_TRADE_AMOUNT_ANCHOR),
        next_trade_multiplier: after_anchor(&source, NEXT_TRADE_MULTIPLIER_ANCHOR),
        cost_basis_multiplier: after_anchor(&source, COST_BASIS_MULTIPLIER_ANCHOR),
        epochs: after_anchor(&source, EPOCHS_ANCHOR),
        fast_exit_buy_amount: capture(&source, &FAST_EXIT, 1),
        fast_exit_sell_amount: capture(&source, &FAST_EXIT, 2),
    }
}

/// Whether order metadata encodes a DSF strategy. Undecodable metadata is not.
pub fn classify(meta: &[u8]) -> bool {
    match program_source(meta) {
        Ok(source) => classify_source(&source),
        Err(e) => {
            debug!("Metadata not classifiable: {}", e);
            false
        }
    }
}

/// DSF parameters from order metadata; all fields absent if it cannot be decoded
pub fn extract_parameters(meta: &[u8]) -> StrategyParameters {
    match program_source(meta) {
        Ok(source) => extract_from_source(&source),
        Err(e) => {
            debug!("Metadata has no readable source: {}", e);
            StrategyParameters::default()
        }
    }
}
