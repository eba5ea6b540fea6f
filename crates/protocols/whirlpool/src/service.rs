//! Quote and Route Services
//!
//! Async entry points that load pool snapshots through the collaborator
//! traits and hand them to the synchronous quoter and optimizer.

use tracing::info;
use whirlroute_core::{Percentage, PoolEnumerator, PoolLookup, PoolState, PoolStateReader, Pubkey};

use crate::cache::CacheMode;
use crate::fetch::PoolDiscovery;
use crate::quote::{quote_exact_in, quote_exact_out};
use crate::router::{RouteOptimizer, RouteOutcome, RoutingOptions, SelectionOptions};
use crate::state::{Quote, TradeSpec, WhirlpoolError};

/// Single-pool quotes
pub struct QuoteService<R> {
    reader: R,
}

impl<R: PoolStateReader> QuoteService<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Exact-input quote against a snapshot the caller already holds
    pub fn quote_single_pool(
        &self,
        pool: &PoolState,
        token_in: &Pubkey,
        amount_in: u64,
        slippage: Percentage,
    ) -> Result<Quote, WhirlpoolError> {
        quote_exact_in(pool, token_in, amount_in, slippage)
    }

    pub fn quote_single_pool_exact_out(
        &self,
        pool: &PoolState,
        token_out: &Pubkey,
        amount_out: u64,
        slippage: Percentage,
    ) -> Result<Quote, WhirlpoolError> {
        quote_exact_out(pool, token_out, amount_out, slippage)
    }

    /// Read the pool at `address`, then quote against it.
    pub async fn quote_by_address(
        &self,
        address: &Pubkey,
        trade: &TradeSpec,
    ) -> Result<Quote, WhirlpoolError> {
        trade.validate()?;
        let pool = self.load(address).await?;
        for mint in [&trade.token_in, &trade.token_out] {
            if !pool.contains_mint(mint) {
                return Err(WhirlpoolError::InvalidToken {
                    pool: pool.address,
                    mint: *mint,
                });
            }
        }

        if trade.amount_specified_is_input {
            quote_exact_in(&pool, &trade.token_in, trade.amount, trade.slippage)
        } else {
            quote_exact_out(&pool, &trade.token_out, trade.amount, trade.slippage)
        }
    }

    async fn load(&self, address: &Pubkey) -> Result<PoolState, WhirlpoolError> {
        let mut lookups = self.reader.fetch_many(std::slice::from_ref(address)).await?;
        match lookups.remove(address) {
            Some(PoolLookup::Found(pool)) => Ok(pool),
            Some(PoolLookup::Missing) => Err(WhirlpoolError::PoolNotFound { address: *address }),
            None => Err(WhirlpoolError::IncompleteBatch {
                missing: vec![*address],
            }),
        }
    }
}

/// Best-route search over either the whole config universe or one pair
pub struct RouteService<R, E> {
    discovery: PoolDiscovery<R>,
    enumerator: E,
    cache_mode: CacheMode,
}

impl<R: PoolStateReader, E: PoolEnumerator> RouteService<R, E> {
    pub fn new(discovery: PoolDiscovery<R>, enumerator: E) -> Self {
        Self {
            discovery,
            enumerator,
            cache_mode: CacheMode::Use,
        }
    }

    pub fn with_cache_mode(mut self, cache_mode: CacheMode) -> Self {
        self.cache_mode = cache_mode;
        self
    }

    pub fn discovery(&self) -> &PoolDiscovery<R> {
        &self.discovery
    }

    /// Route over every pool under the configured Whirlpools config.
    pub async fn find_best_route(
        &self,
        trade: &TradeSpec,
        routing: &RoutingOptions,
        selection: &SelectionOptions,
    ) -> Result<RouteOutcome, WhirlpoolError> {
        trade.validate()?;
        let config_id = self.discovery.deriver().config_id();
        let mut universe: Vec<PoolState> = self
            .enumerator
            .list_all(&config_id)
            .await?
            .into_values()
            .collect();
        universe.sort_by(|a, b| a.address.cmp(&b.address));
        info!(pools = universe.len(), config = %config_id, "Loaded pool universe");

        self.search(&universe, trade, routing, selection)
    }

    /// Route over the pools [`PoolDiscovery`] finds for the trade's pair.
    pub async fn find_best_route_for_pair(
        &self,
        trade: &TradeSpec,
        routing: &RoutingOptions,
        selection: &SelectionOptions,
    ) -> Result<RouteOutcome, WhirlpoolError> {
        trade.validate()?;
        let pools = self
            .discovery
            .find_pools(&trade.token_in, &trade.token_out)
            .await?;
        self.search(&pools, trade, routing, selection)
    }

    fn search(
        &self,
        pools: &[PoolState],
        trade: &TradeSpec,
        routing: &RoutingOptions,
        selection: &SelectionOptions,
    ) -> Result<RouteOutcome, WhirlpoolError> {
        let outcome = RouteOptimizer::new(pools)
            .with_cache_mode(self.cache_mode)
            .find_best_route(trade, routing, selection)?;

        match &outcome {
            RouteOutcome::Found(route) => info!(
                sub_routes = route.sub_routes.len(),
                amount_in = route.total_amount_in,
                amount_out = route.total_amount_out,
                "Route found"
            ),
            RouteOutcome::NoRoute { reason } => info!(?reason, "No route found"),
        }
        Ok(outcome)
    }
}
