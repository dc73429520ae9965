//! Settings loading
//!
//! One TOML file describes the networks, the analyzable tokens with their
//! pool sets, and the analysis tunables. `.env` is read first so RPC
//! endpoints can be overridden per network without editing the file
//! (`ANALYZER_RPC_POLYGON=https://a,https://b`).
//!
//! Resolved values (`Chain`, `TokenConfig`) are handed to the resolver and
//! aggregator explicitly; nothing here is global.

use crate::error::ConfigError;
use crate::types::{Chain, ResolverMode, TokenConfig};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Default settings file, relative to the working directory
pub const DEFAULT_SETTINGS_PATH: &str = "config/settings.toml";

/// Default log-indexer host; the query URL is https://{chain_id}.{host}/query
pub const DEFAULT_INDEXER_HOST: &str = "hypersync.xyz";

/// Prefix of per-network RPC override variables
const RPC_OVERRIDE_PREFIX: &str = "ANALYZER_RPC_";

/// Top-level settings file
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub analysis: AnalysisSettings,
    #[serde(default)]
    pub networks: HashMap<String, NetworkSettings>,
    #[serde(default)]
    pub tokens: HashMap<String, TokenConfig>,
}

/// Per-network settings
#[derive(Debug, Clone, Deserialize)]
pub struct NetworkSettings {
    pub chain_id: u64,
    #[serde(default)]
    pub rpc: Vec<String>,
    pub block_time: Option<f64>,
    #[serde(default = "default_indexer_host")]
    pub indexer_host: String,
    #[serde(default)]
    pub resolver: ResolverMode,
    #[serde(default = "default_linear_window")]
    pub linear_window: u64,
}

/// Analysis tunables
#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisSettings {
    #[serde(default = "default_max_concurrent_pools")]
    pub max_concurrent_pools: usize,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,
    #[serde(default = "default_price_cache_ttl")]
    pub price_cache_ttl_secs: u64,
    /// Overall deadline for one analysis; pools unfinished by then are dropped
    #[serde(default)]
    pub analysis_timeout_secs: Option<u64>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_json: bool,
}

fn default_indexer_host() -> String { DEFAULT_INDEXER_HOST.to_string() }
fn default_linear_window() -> u64 { 1000 }
fn default_max_concurrent_pools() -> usize { 4 }
fn default_request_timeout() -> u64 { 30 }
fn default_max_retries() -> u32 { 3 }
fn default_retry_backoff() -> u64 { 500 }
fn default_price_cache_ttl() -> u64 { 60 }
fn default_log_level() -> String { "info".to_string() }

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            max_concurrent_pools: default_max_concurrent_pools(),
            request_timeout_secs: default_request_timeout(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff(),
            price_cache_ttl_secs: default_price_cache_ttl(),
            analysis_timeout_secs: None,
            log_level: default_log_level(),
            log_json: false,
        }
    }
}

impl AnalysisSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn price_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.price_cache_ttl_secs)
    }

    pub fn analysis_timeout(&self) -> Option<Duration> {
        self.analysis_timeout_secs.map(Duration::from_secs)
    }
}

impl NetworkSettings {
    pub fn indexer_url(&self) -> String {
        format!("https://{}.{}/query", self.chain_id, self.indexer_host)
    }
}

impl Settings {
    /// Parse settings from TOML text
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load settings from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let settings = Self::from_toml(&content)?;
        info!(
            "Loaded settings from {}: {} networks, {} tokens",
            path.display(),
            settings.networks.len(),
            settings.tokens.len()
        );
        Ok(settings)
    }

    /// Load `.env`, then the settings file, then apply RPC overrides from the environment
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        let mut settings = Self::load(path)?;
        settings.apply_rpc_overrides(|key| std::env::var(key).ok());
        Ok(settings)
    }

    /// Replace a network's RPC list with `ANALYZER_RPC_<NETWORK>` when set
    pub fn apply_rpc_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        for (name, network) in self.networks.iter_mut() {
            let key = format!("{}{}", RPC_OVERRIDE_PREFIX, name.to_uppercase());
            if let Some(value) = lookup(&key) {
                let urls: Vec<String> = value
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect();
                if !urls.is_empty() {
                    debug!("RPC override for {}: {} endpoint(s)", name, urls.len());
                    network.rpc = urls;
                }
            }
        }
    }

    /// Resolve a network name into an immutable `Chain`
    pub fn chain(&self, network: &str) -> Result<Chain, ConfigError> {
        let (name, settings) = self
            .networks
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(network))
            .ok_or_else(|| ConfigError::UnknownNetwork(network.to_string()))?;

        if settings.rpc.is_empty() {
            return Err(ConfigError::NoRpc(name.clone()));
        }
        if settings.resolver == ResolverMode::LinearEstimate
            && !settings.block_time.is_some_and(|t| t > 0.0)
        {
            return Err(ConfigError::MissingBlockTime { network: name.clone() });
        }

        Ok(Chain {
            name: name.clone(),
            chain_id: settings.chain_id,
            rpc_urls: settings.rpc.clone(),
            block_time: settings.block_time,
            indexer_url: settings.indexer_url(),
            resolver: settings.resolver,
            linear_window: settings.linear_window,
        })
    }

    /// Look up a token by its table key (case-insensitive)
    pub fn token(&self, key: &str) -> Result<&TokenConfig, ConfigError> {
        self.tokens
            .get(key)
            .or_else(|| self.tokens.get(&key.to_uppercase()))
            .or_else(|| {
                self.tokens
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(key))
                    .map(|(_, t)| t)
            })
            .ok_or_else(|| ConfigError::UnknownToken(key.to_string()))
    }

    /// Token plus the chain it lives on, checked for analysis preconditions
    pub fn analysis_target(
        &self,
        token_key: &str,
        network: Option<&str>,
    ) -> Result<(TokenConfig, Chain), ConfigError> {
        let token = self.token(token_key)?;
        if let Some(requested) = network {
            if !requested.eq_ignore_ascii_case(&token.network) {
                return Err(ConfigError::NetworkMismatch {
                    token: token_key.to_string(),
                    configured: token.network.clone(),
                    requested: requested.to_string(),
                });
            }
        }
        if !token.has_pools() {
            return Err(ConfigError::NoPools(token_key.to_string()));
        }
        let chain = self.chain(&token.network)?;
        Ok((token.clone(), chain))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;
    use std::io::Write;

    const SAMPLE: &str = r#"
[analysis]
max_concurrent_pools = 2
log_level = "debug"

[networks.polygon]
chain_id = 137
rpc = ["https://polygon-rpc.com"]
block_time = 2.1
resolver = "linear-estimate"

[networks.flare]
chain_id = 14
rpc = ["https://flare-api.flare.network/ext/C/rpc"]

[tokens.IOEN]
symbol = "IOEN"
decimals = 18
network = "polygon"
address = "0xd0e9c8f5fae381459cf07ec506c1d2896e8b5df6"
pools_v2 = ["0x316bc12871c807020ef8c1bc7771061c4e7a04ed"]

[tokens.EMPTY]
symbol = "EMPTY"
decimals = 6
network = "flare"
address = "0x0000000000000000000000000000000000000001"
"#;

    #[test]
    fn test_parse_settings() {
        let settings = Settings::from_toml(SAMPLE).unwrap();
        assert_eq!(settings.analysis.max_concurrent_pools, 2);
        assert_eq!(settings.analysis.max_retries, 3); // default
        assert_eq!(settings.networks.len(), 2);

        let token = settings.token("ioen").unwrap();
        assert_eq!(token.address, address!("d0e9c8f5fae381459cf07ec506c1d2896e8b5df6"));
        assert_eq!(token.pools().len(), 1);
    }

    #[test]
    fn test_chain_resolution() {
        let settings = Settings::from_toml(SAMPLE).unwrap();
        let polygon = settings.chain("Polygon").unwrap();
        assert_eq!(polygon.chain_id, 137);
        assert_eq!(polygon.indexer_url, "https://137.hypersync.xyz/query");
        assert_eq!(polygon.resolver, ResolverMode::LinearEstimate);

        let flare = settings.chain("flare").unwrap();
        assert_eq!(flare.resolver, ResolverMode::BinarySearch);
        assert_eq!(flare.block_time, None);

        assert!(matches!(
            settings.chain("solana"),
            Err(ConfigError::UnknownNetwork(_))
        ));
    }

    #[test]
    fn test_linear_mode_requires_block_time() {
        let toml_str = r#"
[networks.base]
chain_id = 8453
rpc = ["https://mainnet.base.org"]
resolver = "linear-estimate"
"#;
        let settings = Settings::from_toml(toml_str).unwrap();
        assert!(matches!(
            settings.chain("base"),
            Err(ConfigError::MissingBlockTime { .. })
        ));
    }

    #[test]
    fn test_analysis_target_preconditions() {
        let settings = Settings::from_toml(SAMPLE).unwrap();
        assert!(settings.analysis_target("IOEN", Some("polygon")).is_ok());
        assert!(matches!(
            settings.analysis_target("IOEN", Some("flare")),
            Err(ConfigError::NetworkMismatch { .. })
        ));
        assert!(matches!(
            settings.analysis_target("EMPTY", None),
            Err(ConfigError::NoPools(_))
        ));
        assert!(matches!(
            settings.analysis_target("NOPE", None),
            Err(ConfigError::UnknownToken(_))
        ));
    }

    #[test]
    fn test_rpc_overrides() {
        let mut settings = Settings::from_toml(SAMPLE).unwrap();
        settings.apply_rpc_overrides(|key| {
            (key == "ANALYZER_RPC_POLYGON").then(|| "https://a, https://b".to_string())
        });
        assert_eq!(settings.networks["polygon"].rpc, vec!["https://a", "https://b"]);
        assert_eq!(settings.networks["flare"].rpc.len(), 1);
    }

    #[test]
    fn test_shipped_settings() {
        let settings = Settings::from_toml(include_str!("../config/settings.toml")).unwrap();
        for (key, token) in &settings.tokens {
            assert!(settings.analysis_target(key, None).is_ok(), "{}", key);
            assert!(token.has_pools());
        }
        assert_eq!(settings.tokens.len(), 26);
        let kima = settings.token("KIMA").unwrap();
        assert_eq!(kima.pools().len(), 2);

        // Repeated v2 entry counted once
        let wpol = settings.token("WPOL").unwrap();
        assert_eq!(wpol.pools_v2.len(), 12);
        assert_eq!(wpol.pools().len(), 11 + 15);

        let wflr = settings.token("WFLR").unwrap();
        assert_eq!(wflr.address, crate::price::dexscreener::WFLR);
        assert_eq!(wflr.pools().len(), 13 + 16);
        assert_eq!(settings.token("cusdx").unwrap().decimals, 6);

        for network in ["ethereum", "flare", "bsc", "polygon", "base", "arbitrum"] {
            assert!(
                settings.tokens.values().any(|t| t.network == network),
                "{}",
                network
            );
        }
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();
        let settings = Settings::load(file.path()).unwrap();
        assert_eq!(settings.tokens.len(), 2);

        assert!(matches!(
            Settings::load("/nonexistent/settings.toml"),
            Err(ConfigError::Io { .. })
        ));
    }
}
