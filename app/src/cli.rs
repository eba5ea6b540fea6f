//! Command-line surface

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use whirlpool::router::{
    DEFAULT_MAX_HOPS, DEFAULT_MAX_POOLS_PER_PAIR, DEFAULT_MAX_SPLITS, DEFAULT_PERCENT_INCREMENT,
};
use whirlpool::TransactionVersion;

#[derive(Parser, Debug)]
#[command(name = "whirlroute", version, about = "Orca Whirlpool quotes and routes")]
pub struct Cli {
    /// JSON configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// RPC endpoint, overrides config file and environment
    #[arg(long, global = true)]
    pub rpc_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List liquid pools for a token pair
    Pools {
        mint_a: String,
        mint_b: String,
    },
    /// Quote a swap through one pool
    Quote {
        mint_in: String,
        mint_out: String,
        #[command(flatten)]
        amount: AmountArgs,
        #[arg(long, default_value_t = 64)]
        tick_spacing: u16,
    },
    /// Find the best single or split route
    Route {
        mint_in: String,
        mint_out: String,
        #[command(flatten)]
        amount: AmountArgs,
        #[command(flatten)]
        routing: RoutingArgs,
        /// Only route through pools of this pair
        #[arg(long)]
        pair_only: bool,
    },
}

#[derive(Args, Debug, Clone)]
pub struct AmountArgs {
    /// UI amount, e.g. 1.5
    #[arg(long)]
    pub amount: String,
    /// Treat the amount as the exact output
    #[arg(long)]
    pub exact_out: bool,
    #[arg(long, default_value_t = 9)]
    pub decimals_in: u8,
    #[arg(long, default_value_t = 6)]
    pub decimals_out: u8,
    #[arg(long, default_value_t = 50)]
    pub slippage_bps: u16,
}

#[derive(Args, Debug, Clone)]
pub struct RoutingArgs {
    #[arg(long, default_value_t = DEFAULT_MAX_SPLITS)]
    pub max_splits: usize,
    #[arg(long, default_value_t = DEFAULT_MAX_HOPS)]
    pub max_hops: usize,
    #[arg(long, default_value_t = DEFAULT_PERCENT_INCREMENT)]
    pub percent_increment: u8,
    #[arg(long, default_value_t = DEFAULT_MAX_POOLS_PER_PAIR)]
    pub max_pools_per_pair: usize,
    #[arg(long, value_enum, default_value_t = TxVersionArg::V0)]
    pub tx_version: TxVersionArg,
    #[arg(long)]
    pub max_accounts: Option<usize>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxVersionArg {
    Legacy,
    V0,
}

impl From<TxVersionArg> for TransactionVersion {
    fn from(arg: TxVersionArg) -> Self {
        match arg {
            TxVersionArg::Legacy => TransactionVersion::Legacy,
            TxVersionArg::V0 => TransactionVersion::V0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_route_command() {
        let cli = Cli::try_parse_from([
            "whirlroute",
            "route",
            "So11111111111111111111111111111111111111112",
            "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v",
            "--amount",
            "2.5",
            "--exact-out",
            "--max-splits",
            "1",
            "--tx-version",
            "legacy",
        ])
        .unwrap();

        match cli.command {
            Command::Route {
                amount, routing, pair_only, ..
            } => {
                assert_eq!(amount.amount, "2.5");
                assert!(amount.exact_out);
                assert_eq!(amount.slippage_bps, 50);
                assert_eq!(routing.max_splits, 1);
                assert_eq!(routing.max_hops, DEFAULT_MAX_HOPS);
                assert_eq!(routing.tx_version, TxVersionArg::Legacy);
                assert!(!pair_only);
            }
            other => panic!("expected route, got {:?}", other),
        }
    }

    #[test]
    fn test_quote_defaults() {
        let cli = Cli::try_parse_from(["whirlroute", "quote", "a", "b", "--amount", "1"]).unwrap();
        match cli.command {
            Command::Quote { tick_spacing, amount, .. } => {
                assert_eq!(tick_spacing, 64);
                assert!(!amount.exact_out);
            }
            other => panic!("expected quote, got {:?}", other),
        }
    }
}
