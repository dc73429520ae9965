//! Liquidity analyzer CLI
//!
//! Usage:
//!     liquidity-analyzer analyze --token IOEN --from 1717200000 --to 1717804800
//!     liquidity-analyzer pool --network polygon --address 0x… --variant v2 --from-block N --to-block M
//!     liquidity-analyzer strategy --meta 0xff0a89c674ee7874…
//!     liquidity-analyzer resolve --network polygon --timestamp 1717200000
//!
//! Results are printed to stdout as JSON; logs go to stderr.

use alloy::primitives::Address;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use liquidity_analyzer::config::DEFAULT_SETTINGS_PATH;
use liquidity_analyzer::strategy::{self, decode_hex};
use liquidity_analyzer::{
    connect_http, logging, AggregatorOptions, BlockRange, Chain, DexScreenerSource, HttpIndexer,
    PoolRef, PoolVariant, Settings, SpotPriceOracle, TradeAggregator,
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Parser)]
#[command(name = "liquidity-analyzer", version, about = "On-chain swap volume analytics")]
struct Cli {
    /// Settings file
    #[arg(long, env = "ANALYZER_CONFIG", default_value = DEFAULT_SETTINGS_PATH, global = true)]
    config: PathBuf,

    /// Log level or filter directives (overrides the settings file)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Swap volume of a token over a time window
    Analyze {
        /// Token key from the settings file
        #[arg(long)]
        token: String,
        /// Expected network of the token
        #[arg(long)]
        network: Option<String>,
        /// Window start (unix seconds)
        #[arg(long)]
        from: u64,
        /// Window end (unix seconds, default now)
        #[arg(long)]
        to: Option<u64>,
        /// Give up after this many seconds and return what is done
        #[arg(long)]
        timeout_secs: Option<u64>,
    },
    /// Trade listing for one pool over a block range
    Pool {
        #[arg(long)]
        network: String,
        #[arg(long)]
        address: Address,
        #[arg(long, default_value = "v2")]
        variant: PoolVariant,
        #[arg(long)]
        from_block: u64,
        #[arg(long)]
        to_block: u64,
    },
    /// Detect a DSF order and extract its parameters
    Strategy {
        /// Order metadata as hex
        #[arg(long)]
        meta: String,
    },
    /// Block closest to a timestamp
    Resolve {
        #[arg(long)]
        network: String,
        #[arg(long)]
        timestamp: u64,
    },
}

#[derive(Serialize)]
struct StrategyReport {
    is_dsf: bool,
    parameters: strategy::StrategyParameters,
}

#[derive(Serialize)]
struct ResolveReport {
    network: String,
    timestamp: u64,
    block: Option<u64>,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn build_aggregator(settings: &Settings, chain: Chain, timeout: Option<Duration>) -> Result<TradeAggregator> {
    let analysis = &settings.analysis;
    let reader = connect_http(&chain.rpc_urls).with_context(|| format!("RPC setup for {}", chain.name))?;
    let indexer = HttpIndexer::new(analysis.request_timeout(), analysis.max_retries, analysis.retry_backoff())
        .context("Indexer client setup")?;
    let source = DexScreenerSource::new(analysis.request_timeout()).context("Price client setup")?;
    let oracle = SpotPriceOracle::new(Arc::new(source)).with_cache_ttl(analysis.price_cache_ttl());

    let mut options = AggregatorOptions::from(analysis);
    if timeout.is_some() {
        options.timeout = timeout;
    }

    Ok(TradeAggregator::new(
        chain,
        Arc::new(reader),
        Arc::new(indexer),
        Arc::new(oracle),
        options,
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Strategy decoding needs no settings
    if let Command::Strategy { meta } = &cli.command {
        logging::init(cli.log_level.as_deref().unwrap_or("info"), cli.json_logs);
        let meta = decode_hex(meta).context("Invalid metadata hex")?;
        return print_json(&StrategyReport {
            is_dsf: strategy::classify(&meta),
            parameters: strategy::extract_parameters(&meta),
        });
    }

    let settings = Settings::load_with_env(&cli.config)
        .with_context(|| format!("Loading settings from {}", cli.config.display()))?;
    logging::init(
        cli.log_level.as_deref().unwrap_or(&settings.analysis.log_level),
        cli.json_logs || settings.analysis.log_json,
    );
    info!(
        "Settings: {} networks, {} tokens",
        settings.networks.len(),
        settings.tokens.len()
    );

    match cli.command {
        Command::Analyze {
            token,
            network,
            from,
            to,
            timeout_secs,
        } => {
            let (token_config, chain) = settings.analysis_target(&token, network.as_deref())?;
            let to = match to {
                Some(to) => to,
                None => u64::try_from(chrono::Utc::now().timestamp()).context("Clock before 1970")?,
            };
            let aggregator = build_aggregator(&settings, chain, timeout_secs.map(Duration::from_secs))?;
            let result = aggregator.analyze(&token_config, from, to).await?;
            print_json(&result)
        }
        Command::Pool {
            network,
            address,
            variant,
            from_block,
            to_block,
        } => {
            let chain = settings.chain(&network)?;
            let range = BlockRange::new(from_block, to_block)
                .with_context(|| format!("from-block {} is after to-block {}", from_block, to_block))?;
            let aggregator = build_aggregator(&settings, chain, None)?;
            let data = aggregator
                .pool_data(PoolRef::new(address, variant), range)
                .await
                .with_context(|| format!("Reading pool {:?}", address))?;
            print_json(&data)
        }
        Command::Resolve { network, timestamp } => {
            let chain = settings.chain(&network)?;
            let aggregator = build_aggregator(&settings, chain, None)?;
            let block = aggregator.resolver().resolve(timestamp).await;
            print_json(&ResolveReport {
                network: aggregator.chain().name.clone(),
                timestamp,
                block,
            })
        }
        Command::Strategy { .. } => Ok(()),
    }
}
