//! Orca Whirlpool Quote Engine
//!
//! Derives and discovers Whirlpool accounts for a token pair, simulates
//! swaps across initialized ticks, and searches single and split multi-hop
//! routes over a pool universe.

pub mod cache;
pub mod calculator;
pub mod constants;
pub mod fetch;
pub mod pda;
pub mod quote;
pub mod router;
pub mod service;
pub mod state;

// Re-exports
pub use cache::{CacheMode, QuoteCache, QuoteKey};
pub use calculator::{compute_swap_step, sqrt_price_at_tick, tick_at_sqrt_price, SwapStep};
pub use constants::{fees, layout, seeds, sqrt_price, tick_array, tx_shape};
pub use fetch::PoolDiscovery;
pub use pda::{sort_mints, tick_array_address, tick_array_start_index, PoolKey, PoolKeyDeriver, TickSpacing};
pub use quote::{quote_exact_in, quote_exact_out, swap, SwapResult};
pub use router::{
    build_pool_graph, estimate_account_count, find_paths, quote_path, NoRouteReason, PathEdge,
    PathQuote, PoolGraph, Route, RouteOptimizer, RouteOutcome, RoutingOptions, SelectionOptions,
    SubRoute, TransactionVersion,
};
pub use service::{QuoteService, RouteService};
pub use state::{slippage_from_bps, Fill, MathError, Quote, TradeSpec, WhirlpoolError};
