//! Error types for every component.
//!
//! Only configuration problems are fatal to an analysis; the rest are
//! recovered where they happen and show up as `complete: false` on results.

use crate::types::PoolVariant;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read settings file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse settings: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Network '{0}' is not configured")]
    UnknownNetwork(String),

    #[error("Token '{0}' is not configured")]
    UnknownToken(String),

    #[error("Token '{0}' has no pools configured")]
    NoPools(String),

    #[error("Network '{0}' has no RPC endpoint")]
    NoRpc(String),

    #[error("Network '{network}' uses linear-estimate resolution but has no block_time")]
    MissingBlockTime { network: String },

    #[error("Token '{token}' is configured for network '{configured}', not '{requested}'")]
    NetworkMismatch {
        token: String,
        configured: String,
        requested: String,
    },
}

#[derive(Error, Debug)]
pub enum ChainError {
    #[error("Invalid RPC URL '{0}'")]
    InvalidUrl(String),

    #[error("RPC call {method} on {target} failed: {message}")]
    Call {
        method: &'static str,
        target: String,
        message: String,
    },

    #[error("RPC returned no latest block")]
    NoHead,
}

#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("Indexer request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Indexer responded with status {0}")]
    Status(u16),

    #[error("Malformed indexer response: {0}")]
    Decode(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("{variant} swap data too short: expected {expected} bytes, got {actual}")]
    TooShort {
        variant: PoolVariant,
        expected: usize,
        actual: usize,
    },

    #[error("{variant} swap field '{field}' out of range for its ABI type")]
    OutOfRange {
        variant: PoolVariant,
        field: &'static str,
    },
}

#[derive(Error, Debug)]
pub enum PriceError {
    #[error("Price request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("No trading pairs found for {0}")]
    NoPairs(String),

    #[error("Unparseable price '{0}'")]
    Invalid(String),
}

#[derive(Error, Debug)]
pub enum MetaError {
    #[error("Metadata is not valid hex: {0}")]
    Hex(String),

    #[error("Metadata is empty")]
    Empty,

    #[error("CBOR envelope invalid: {0}")]
    Cbor(String),

    #[error("Envelope carries no payload item")]
    MissingPayload,

    #[error("Payload could not be decompressed: {0}")]
    Inflate(String),

    #[error("Decompressed payload is not UTF-8")]
    Utf8,
}

impl From<minicbor::decode::Error> for MetaError {
    fn from(err: minicbor::decode::Error) -> Self {
        MetaError::Cbor(err.to_string())
    }
}

/// Fatal analysis errors (precondition failures only)
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Invalid analysis window: from {from} is after to {to}")]
    InvalidWindow { from: u64, to: u64 },
}
