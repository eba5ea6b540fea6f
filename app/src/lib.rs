//! whirlroute: CLI wiring for the Whirlpool quote engine
//!
//! Loads configuration, builds the RPC-backed pool source, and dispatches
//! subcommands. Every command returns a serializable response.

pub mod cli;
pub mod commands;

use std::sync::Arc;

use anyhow::Context;
use tracing::info;
use whirlpool::PoolKeyDeriver;
use whirlpool_rpc::{RpcClient, RpcPoolSource};
use whirlroute_core::AppConfig;

pub use cli::{Cli, Command};

/// Shared handles for one CLI invocation
pub struct AppContext {
    pub deriver: PoolKeyDeriver,
    pub source: Arc<RpcPoolSource>,
}

impl AppContext {
    pub fn new(config: &AppConfig) -> anyhow::Result<Self> {
        let deriver = PoolKeyDeriver::from_config(&config.whirlpool)?;
        let client = RpcClient::new(&config.rpc)?;
        let source = Arc::new(RpcPoolSource::new(client, deriver.program_id()));
        Ok(Self { deriver, source })
    }
}

/// File (if given), then `WHIRLROUTE_RPC_URL`, then `--rpc-url`
pub fn load_config(cli: &Cli) -> anyhow::Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => AppConfig::default(),
    };
    config.apply_env_overrides();
    if let Some(url) = &cli.rpc_url {
        config.rpc.url = url.clone();
    }
    Ok(config)
}

pub async fn run(cli: Cli) -> anyhow::Result<serde_json::Value> {
    let config = load_config(&cli)?;
    info!(rpc = %config.rpc.url, "Starting whirlroute");
    let ctx = AppContext::new(&config)?;

    let output = match cli.command {
        Command::Pools { mint_a, mint_b } => {
            serde_json::to_value(commands::pools::list_pools(&ctx, &mint_a, &mint_b).await?)?
        }
        Command::Quote {
            mint_in,
            mint_out,
            amount,
            tick_spacing,
        } => serde_json::to_value(
            commands::quote::quote(&ctx, &mint_in, &mint_out, &amount, tick_spacing).await?,
        )?,
        Command::Route {
            mint_in,
            mint_out,
            amount,
            routing,
            pair_only,
        } => serde_json::to_value(
            commands::route::route(&ctx, &mint_in, &mint_out, &amount, &routing, pair_only).await?,
        )?,
    };
    Ok(output)
}
