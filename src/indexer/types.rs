//! Indexer wire format
//!
//! Request: `{from_block, to_block?, logs: [{address, topics}], field_selection}`.
//! Response: `{data: [{logs, blocks}], next_block}`. `to_block` is exclusive
//! on the wire. Block timestamps come back as hex strings.

use alloy::primitives::{Address, Bytes, B256};
use serde::{de, Deserialize, Deserializer, Serialize};

/// Log fields projected for volume analysis
pub const LOG_FIELDS: &[&str] = &[
    "block_number",
    "log_index",
    "transaction_index",
    "transaction_hash",
    "data",
    "address",
    "topic0",
];

/// Block fields needed to join timestamps
pub const BLOCK_FIELDS: &[&str] = &["number", "timestamp"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryRequest {
    pub from_block: u64,
    /// Exclusive
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_block: Option<u64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub logs: Vec<LogSelection>,
    pub field_selection: FieldSelection,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub include_all_blocks: bool,
}

/// Address + topic filter. An empty selection serializes as `{}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LogSelection {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub address: Vec<Address>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub topics: Vec<Vec<B256>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FieldSelection {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub log: Vec<&'static str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub block: Vec<&'static str>,
}

impl QueryRequest {
    /// Swap logs of one pool, starting at `from_block`
    pub fn pool_logs(pool: Address, topic: B256, from_block: u64, to_block: u64) -> Self {
        Self {
            from_block,
            to_block: Some(to_block),
            logs: vec![LogSelection {
                address: vec![pool],
                topics: vec![vec![topic]],
            }],
            field_selection: FieldSelection {
                log: LOG_FIELDS.to_vec(),
                block: BLOCK_FIELDS.to_vec(),
            },
            include_all_blocks: false,
        }
    }

    /// Headers of every block in `[from_block, to_block)`
    pub fn blocks(from_block: u64, to_block: u64) -> Self {
        Self {
            from_block,
            to_block: Some(to_block),
            logs: vec![LogSelection::default()],
            field_selection: FieldSelection {
                log: Vec::new(),
                block: BLOCK_FIELDS.to_vec(),
            },
            include_all_blocks: true,
        }
    }

    /// Pool address of a log query, if this is one
    pub fn pool(&self) -> Option<Address> {
        self.logs.first().and_then(|sel| sel.address.first().copied())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub data: Vec<ResponseData>,
    #[serde(default)]
    pub next_block: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ResponseData {
    #[serde(default)]
    pub logs: Vec<LogRow>,
    #[serde(default)]
    pub blocks: Vec<BlockRow>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LogRow {
    #[serde(default, deserialize_with = "hex_or_number")]
    pub block_number: Option<u64>,
    #[serde(default, deserialize_with = "hex_or_number")]
    pub log_index: Option<u64>,
    #[serde(default, deserialize_with = "hex_or_number")]
    pub transaction_index: Option<u64>,
    #[serde(default)]
    pub transaction_hash: Option<B256>,
    #[serde(default)]
    pub data: Option<Bytes>,
    #[serde(default)]
    pub address: Option<Address>,
    #[serde(default)]
    pub topic0: Option<B256>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct BlockRow {
    #[serde(default, deserialize_with = "hex_or_number")]
    pub number: Option<u64>,
    #[serde(default, deserialize_with = "hex_or_number")]
    pub timestamp: Option<u64>,
}

/// Parse a base-16 integer with or without `0x`
pub fn parse_hex_u64(raw: &str) -> Result<u64, String> {
    let digits = raw
        .strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .unwrap_or(raw);
    u64::from_str_radix(digits, 16).map_err(|e| format!("invalid hex quantity '{}': {}", raw, e))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Quantity {
    Number(u64),
    Text(String),
}

/// Accepts JSON numbers as-is and strings as hex
fn hex_or_number<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<Quantity>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Quantity::Number(n)) => Ok(Some(n)),
        Some(Quantity::Text(s)) => parse_hex_u64(&s).map(Some).map_err(de::Error::custom),
    }
}
