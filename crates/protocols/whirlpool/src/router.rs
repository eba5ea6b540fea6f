//! Route Optimizer: Multi-Hop, Multi-Split Whirlpool Routing
//!
//! Finds the best way to fill a trade across a pool universe. Every acyclic
//! path up to `max_hops` is quoted for the full amount, then the amount is
//! split across the strongest disjoint paths by allocating it in fixed
//! percentage quanta to whichever path improves the trade most.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::debug;
use whirlroute_core::{Percentage, PoolState, Pubkey};

use crate::cache::{CacheMode, QuoteCache};
use crate::constants::tx_shape;
use crate::state::{Quote, TradeSpec, WhirlpoolError};

pub const DEFAULT_PERCENT_INCREMENT: u8 = 20;
pub const DEFAULT_NUM_TOP_ROUTES: usize = 50;
pub const DEFAULT_NUM_TOP_PARTIAL_QUOTES: usize = 10;
pub const DEFAULT_MAX_SPLITS: usize = 3;
pub const DEFAULT_MAX_HOPS: usize = 2;
pub const DEFAULT_MAX_POOLS_PER_PAIR: usize = 10;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Search-space bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingOptions {
    pub max_splits: usize,
    pub max_hops: usize,
    /// Size of one split quantum, in whole percent
    pub percent_increment: u8,
    /// Paths kept after full-amount ranking
    pub num_top_routes: usize,
    /// Paths eligible to receive a split quantum
    pub num_top_partial_quotes: usize,
    pub max_pools_per_pair: usize,
}

impl Default for RoutingOptions {
    fn default() -> Self {
        Self {
            max_splits: DEFAULT_MAX_SPLITS,
            max_hops: DEFAULT_MAX_HOPS,
            percent_increment: DEFAULT_PERCENT_INCREMENT,
            num_top_routes: DEFAULT_NUM_TOP_ROUTES,
            num_top_partial_quotes: DEFAULT_NUM_TOP_PARTIAL_QUOTES,
            max_pools_per_pair: DEFAULT_MAX_POOLS_PER_PAIR,
        }
    }
}

impl RoutingOptions {
    pub fn validate(&self) -> Result<(), WhirlpoolError> {
        if self.max_splits == 0 {
            return Err(WhirlpoolError::InvalidTrade(
                "max_splits must be at least 1".to_string(),
            ));
        }
        if self.max_hops == 0 {
            return Err(WhirlpoolError::InvalidTrade(
                "max_hops must be at least 1".to_string(),
            ));
        }
        if self.percent_increment == 0 || self.percent_increment > 100 {
            return Err(WhirlpoolError::InvalidTrade(format!(
                "percent_increment must be within 1..=100, got {}",
                self.percent_increment
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionVersion {
    Legacy,
    #[default]
    V0,
}

impl TransactionVersion {
    pub fn max_accounts(self) -> usize {
        match self {
            Self::Legacy => tx_shape::LEGACY_MAX_ACCOUNTS,
            Self::V0 => tx_shape::V0_MAX_ACCOUNTS,
        }
    }
}

/// Constraints a route must satisfy to be executable by the caller
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionOptions {
    pub max_supported_transaction_version: TransactionVersion,
    /// Mints the caller already holds token accounts for. `None` assumes all
    /// exist.
    pub available_ata_accounts: Option<HashSet<Pubkey>>,
    /// Overrides the per-version account limit
    pub max_accounts: Option<usize>,
}

impl SelectionOptions {
    pub fn account_limit(&self) -> usize {
        self.max_accounts
            .unwrap_or_else(|| self.max_supported_transaction_version.max_accounts())
    }
}

// ---------------------------------------------------------------------------
// Route types
// ---------------------------------------------------------------------------

/// One hop of a path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathEdge {
    pub pool: Pubkey,
    pub token_in: Pubkey,
    pub token_out: Pubkey,
    pub a_to_b: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubRoute {
    pub split_percent: u8,
    pub path: Vec<PathEdge>,
    pub amount_in: u64,
    pub amount_out: u64,
    pub hop_quotes: Vec<Quote>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    pub token_in: Pubkey,
    pub token_out: Pubkey,
    pub amount_specified_is_input: bool,
    pub sub_routes: Vec<SubRoute>,
    pub total_amount_in: u64,
    pub total_amount_out: u64,
    /// Minimum total output (exact input) or maximum total input (exact output)
    pub other_amount_threshold: u64,
    pub slippage: Percentage,
    /// Account-count estimate used for selection
    pub estimated_accounts: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoRouteReason {
    /// The pool graph holds no path between the two tokens
    NoPath,
    /// Paths exist but none can fill the amount
    InsufficientLiquidity,
    /// Every fillable candidate broke the selection constraints
    SelectionFiltered,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RouteOutcome {
    Found(Route),
    NoRoute { reason: NoRouteReason },
}

impl RouteOutcome {
    pub fn route(&self) -> Option<&Route> {
        match self {
            Self::Found(route) => Some(route),
            Self::NoRoute { .. } => None,
        }
    }

    pub fn into_route(self) -> Option<Route> {
        match self {
            Self::Found(route) => Some(route),
            Self::NoRoute { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Step 1: Pool Graph & Path Finding
// ---------------------------------------------------------------------------

/// A directed edge through one pool
#[derive(Debug, Clone, Copy)]
pub struct PoolEdge<'a> {
    pub pool: &'a PoolState,
    pub token_in: Pubkey,
    pub token_out: Pubkey,
}

impl PoolEdge<'_> {
    fn to_path_edge(self) -> PathEdge {
        PathEdge {
            pool: self.pool.address,
            token_in: self.token_in,
            token_out: self.token_out,
            a_to_b: self.token_in == self.pool.token_mint_a,
        }
    }
}

/// Adjacency-list pool graph, each list ordered by descending liquidity
#[derive(Debug, Clone, Default)]
pub struct PoolGraph<'a> {
    pub adjacency: HashMap<Pubkey, Vec<PoolEdge<'a>>>,
    pub pool_count: usize,
}

/// Build a pool graph with both directions per pool.
///
/// Zero-liquidity pools are skipped. Per directed pair only the
/// `max_pools_per_pair` deepest pools are kept.
pub fn build_pool_graph(pools: &[PoolState], max_pools_per_pair: usize) -> PoolGraph<'_> {
    let mut ordered: Vec<&PoolState> = pools.iter().filter(|p| p.has_liquidity()).collect();
    ordered.sort_by(|a, b| {
        b.liquidity
            .cmp(&a.liquidity)
            .then_with(|| a.address.cmp(&b.address))
    });

    let mut adjacency: HashMap<Pubkey, Vec<PoolEdge<'_>>> = HashMap::new();
    let mut seen: HashSet<Pubkey> = HashSet::new();
    let mut pool_count = 0;

    for pool in ordered {
        if !seen.insert(pool.address) || pool.token_mint_a == pool.token_mint_b {
            continue;
        }

        let mut added = false;
        for (token_in, token_out) in [
            (pool.token_mint_a, pool.token_mint_b),
            (pool.token_mint_b, pool.token_mint_a),
        ] {
            let edges = adjacency.entry(token_in).or_default();
            let same_pair = edges.iter().filter(|e| e.token_out == token_out).count();
            if same_pair < max_pools_per_pair {
                edges.push(PoolEdge {
                    pool,
                    token_in,
                    token_out,
                });
                added = true;
            }
        }
        if added {
            pool_count += 1;
        }
    }

    PoolGraph {
        adjacency,
        pool_count,
    }
}

/// Find all acyclic paths from `source` to `target`, up to `max_hops`.
///
/// BFS with visited-token tracking: no token is revisited and no pool is
/// used twice in a path.
pub fn find_paths<'a>(
    graph: &PoolGraph<'a>,
    source: &Pubkey,
    target: &Pubkey,
    max_hops: usize,
) -> Vec<Vec<PoolEdge<'a>>> {
    let mut results: Vec<Vec<PoolEdge<'a>>> = Vec::new();
    if max_hops == 0 || source == target {
        return results;
    }

    type SearchNode<'g> = (Pubkey, Vec<PoolEdge<'g>>, HashSet<Pubkey>, HashSet<Pubkey>);
    let mut queue: VecDeque<SearchNode<'a>> = VecDeque::new();
    queue.push_back((*source, Vec::new(), HashSet::from([*source]), HashSet::new()));

    while let Some((current, path, visited, used_pools)) = queue.pop_front() {
        let Some(edges) = graph.adjacency.get(&current) else {
            continue;
        };
        for edge in edges {
            if used_pools.contains(&edge.pool.address) {
                continue;
            }

            if edge.token_out == *target {
                let mut complete = path.clone();
                complete.push(*edge);
                results.push(complete);
            } else if path.len() + 1 < max_hops && !visited.contains(&edge.token_out) {
                let mut next_visited = visited.clone();
                next_visited.insert(edge.token_out);
                let mut next_pools = used_pools.clone();
                next_pools.insert(edge.pool.address);
                let mut next_path = path.clone();
                next_path.push(*edge);
                queue.push_back((edge.token_out, next_path, next_visited, next_pools));
            }
        }
    }

    results
}

// ---------------------------------------------------------------------------
// Step 2: Path Quoting
// ---------------------------------------------------------------------------

/// Chained quote through every hop of a path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathQuote {
    pub hops: Vec<Quote>,
    pub amount_in: u64,
    pub amount_out: u64,
    /// Every hop filled its full specified amount
    pub complete: bool,
}

impl PathQuote {
    /// Higher is better for the trader
    fn score(&self, amount_specified_is_input: bool) -> i128 {
        if amount_specified_is_input {
            self.amount_out as i128
        } else {
            -(self.amount_in as i128)
        }
    }
}

/// Quote a path by chaining hops: forward for exact input, backward from the
/// output for exact output.
pub fn quote_path(
    path: &[PoolEdge<'_>],
    amount: u64,
    amount_specified_is_input: bool,
    slippage: Percentage,
    cache: &mut QuoteCache,
) -> Result<PathQuote, WhirlpoolError> {
    if path.is_empty() {
        return Err(WhirlpoolError::InvalidTrade("empty path".to_string()));
    }

    let mut hops = Vec::with_capacity(path.len());
    let mut complete = true;

    if amount_specified_is_input {
        let mut current = amount;
        for edge in path {
            let quote = cache.quote_exact_in(edge.pool, &edge.token_in, current, slippage)?;
            complete &= quote.is_complete();
            current = quote.estimated_amount_out;
            hops.push(quote);
        }
        let amount_in = hops.first().map(|q| q.estimated_amount_in).unwrap_or(0);
        Ok(PathQuote {
            hops,
            amount_in,
            amount_out: current,
            complete,
        })
    } else {
        let mut needed = amount;
        for edge in path.iter().rev() {
            let quote = cache.quote_exact_out(edge.pool, &edge.token_out, needed, slippage)?;
            complete &= quote.is_complete();
            needed = quote.estimated_amount_in;
            hops.push(quote);
        }
        hops.reverse();
        let amount_out = hops.last().map(|q| q.estimated_amount_out).unwrap_or(0);
        Ok(PathQuote {
            hops,
            amount_in: needed,
            amount_out,
            complete,
        })
    }
}

/// Base units for `percent` of `amount`, rounded down
fn share_of(amount: u64, percent: u8) -> u64 {
    (amount as u128 * percent as u128 / 100) as u64
}

/// Split quanta: `increment` percent each, the last one taking the remainder
fn split_quanta(increment: u8) -> Vec<u8> {
    let mut quanta = Vec::new();
    let mut left: u8 = 100;
    while left > 0 {
        let q = increment.min(left);
        quanta.push(q);
        left -= q;
    }
    quanta
}

struct RankedPath<'a> {
    edges: Vec<PoolEdge<'a>>,
    /// Full-amount quote when it fills completely
    full: Option<PathQuote>,
}

impl RankedPath<'_> {
    fn shares_pool_with(&self, other: &RankedPath<'_>) -> bool {
        self.edges.iter().any(|e| {
            other
                .edges
                .iter()
                .any(|o| o.pool.address == e.pool.address)
        })
    }
}

/// Quote every path and keep the best `limit`.
///
/// Paths that fill the whole amount rank first, by full-amount result.
/// The rest rank by a one-quantum quote so they stay available for splits.
fn rank_paths<'a>(
    paths: Vec<Vec<PoolEdge<'a>>>,
    trade: &TradeSpec,
    routing: &RoutingOptions,
    cache: &mut QuoteCache,
) -> Vec<RankedPath<'a>> {
    let quantum_amount = share_of(trade.amount, routing.percent_increment).max(1);
    let mut scored: Vec<(bool, i128, RankedPath<'a>)> = Vec::new();

    for edges in paths {
        let full = match quote_path(
            &edges,
            trade.amount,
            trade.amount_specified_is_input,
            trade.slippage,
            cache,
        ) {
            Ok(q) => q,
            Err(e) => {
                debug!(hops = edges.len(), error = %e, "Dropping unquotable path");
                continue;
            }
        };

        if full.complete {
            let score = full.score(trade.amount_specified_is_input);
            scored.push((true, score, RankedPath { edges, full: Some(full) }));
            continue;
        }

        match quote_path(
            &edges,
            quantum_amount,
            trade.amount_specified_is_input,
            trade.slippage,
            cache,
        ) {
            Ok(quantum) if quantum.complete => {
                let score = quantum.score(trade.amount_specified_is_input);
                scored.push((false, score, RankedPath { edges, full: None }));
            }
            _ => debug!(hops = edges.len(), "Dropping path that cannot fill one quantum"),
        }
    }

    // Stable: equal scores keep discovery order
    scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| b.1.cmp(&a.1)));
    scored.truncate(routing.num_top_routes);
    scored.into_iter().map(|(_, _, path)| path).collect()
}

// ---------------------------------------------------------------------------
// Step 3: Candidates & Split Allocation
// ---------------------------------------------------------------------------

struct Leg {
    path_index: usize,
    percent: u8,
    quote: PathQuote,
}

struct Candidate {
    legs: Vec<Leg>,
    total_in: u64,
    total_out: u64,
}

impl Candidate {
    fn new(legs: Vec<Leg>) -> Self {
        let total_in = legs
            .iter()
            .fold(0u64, |acc, l| acc.saturating_add(l.quote.amount_in));
        let total_out = legs
            .iter()
            .fold(0u64, |acc, l| acc.saturating_add(l.quote.amount_out));
        Self {
            legs,
            total_in,
            total_out,
        }
    }

    fn score(&self, amount_specified_is_input: bool) -> i128 {
        if amount_specified_is_input {
            self.total_out as i128
        } else {
            -(self.total_in as i128)
        }
    }

    fn pools<'a>(&self, ranked: &[RankedPath<'a>]) -> Vec<&'a PoolState> {
        let mut seen = HashSet::new();
        self.legs
            .iter()
            .flat_map(|leg| ranked[leg.path_index].edges.iter())
            .filter(|e| seen.insert(e.pool.address))
            .map(|e| e.pool)
            .collect()
    }

    fn aggregate_liquidity(&self, ranked: &[RankedPath<'_>]) -> u128 {
        self.pools(ranked)
            .iter()
            .fold(0u128, |acc, p| acc.saturating_add(p.liquidity))
    }

    fn tokens(&self, ranked: &[RankedPath<'_>]) -> HashSet<Pubkey> {
        self.legs
            .iter()
            .flat_map(|leg| ranked[leg.path_index].edges.iter())
            .flat_map(|e| [e.token_in, e.token_out])
            .collect()
    }
}

/// Greedy split over at most `k` disjoint paths.
///
/// Each quantum goes to the eligible path with the best marginal result
/// while still filling completely. Ties prefer an already active path, then
/// the lower rank.
fn greedy_split(
    ranked: &[RankedPath<'_>],
    trade: &TradeSpec,
    k: usize,
    routing: &RoutingOptions,
    cache: &mut QuoteCache,
) -> Option<Candidate> {
    let eligible = ranked.len().min(routing.num_top_partial_quotes);
    if eligible < 2 {
        return None;
    }

    let is_input = trade.amount_specified_is_input;
    let mut percents = vec![0u8; eligible];
    let mut current: Vec<Option<PathQuote>> = vec![None; eligible];

    for quantum in split_quanta(routing.percent_increment) {
        let active: Vec<usize> = (0..eligible).filter(|&i| percents[i] > 0).collect();
        let mut best: Option<(usize, i128, PathQuote)> = None;

        for i in 0..eligible {
            let is_active = percents[i] > 0;
            if !is_active {
                if active.len() >= k {
                    continue;
                }
                if active.iter().any(|&j| ranked[i].shares_pool_with(&ranked[j])) {
                    continue;
                }
            }

            let amount = share_of(trade.amount, percents[i] + quantum);
            if amount == 0 {
                continue;
            }
            let quote = match quote_path(&ranked[i].edges, amount, is_input, trade.slippage, cache)
            {
                Ok(q) if q.complete => q,
                _ => continue,
            };

            let before = current[i].as_ref().map(|q| q.score(is_input)).unwrap_or(0);
            let marginal = quote.score(is_input) - before;
            let better = match &best {
                None => true,
                Some((j, best_marginal, _)) => {
                    marginal > *best_marginal
                        || (marginal == *best_marginal && is_active && percents[*j] == 0)
                }
            };
            if better {
                best = Some((i, marginal, quote));
            }
        }

        let (i, _, quote) = best?;
        percents[i] += quantum;
        current[i] = Some(quote);
    }

    let active: Vec<usize> = (0..eligible).filter(|&i| percents[i] > 0).collect();
    if active.len() < 2 {
        return None;
    }

    // Floor each share; the dust goes to the largest one
    let mut amounts: Vec<u64> = active
        .iter()
        .map(|&i| share_of(trade.amount, percents[i]))
        .collect();
    let dust = trade.amount - amounts.iter().sum::<u64>();
    let largest = (0..active.len())
        .max_by(|&a, &b| percents[active[a]].cmp(&percents[active[b]]).then(b.cmp(&a)))?;
    amounts[largest] += dust;

    let mut legs = Vec::with_capacity(active.len());
    for (slot, &i) in active.iter().enumerate() {
        let quote = quote_path(
            &ranked[i].edges,
            amounts[slot],
            is_input,
            trade.slippage,
            cache,
        )
        .ok()
        .filter(|q| q.complete)?;
        legs.push(Leg {
            path_index: i,
            percent: percents[i],
            quote,
        });
    }

    Some(Candidate::new(legs))
}

// ---------------------------------------------------------------------------
// Step 4: Selection
// ---------------------------------------------------------------------------

/// Rough count of accounts a transaction executing `pools` would reference
pub fn estimate_account_count(
    pool_count: usize,
    tokens: &HashSet<Pubkey>,
    selection: &SelectionOptions,
) -> usize {
    let mut accounts =
        tx_shape::SHARED_ACCOUNTS + pool_count * tx_shape::ACCOUNTS_PER_POOL + tokens.len();

    if let Some(available) = &selection.available_ata_accounts {
        let missing = tokens.iter().filter(|t| !available.contains(t)).count();
        if missing > 0 {
            accounts += missing + tx_shape::ATA_CREATION_SHARED_ACCOUNTS;
        }
    }
    accounts
}

/// Whether `a` beats `b`: better result, then fewer sub-routes, then deeper
/// pools. Equal candidates keep the earlier one.
fn beats(
    a: &Candidate,
    b: &Candidate,
    ranked: &[RankedPath<'_>],
    amount_specified_is_input: bool,
) -> bool {
    let (sa, sb) = (
        a.score(amount_specified_is_input),
        b.score(amount_specified_is_input),
    );
    if sa != sb {
        return sa > sb;
    }
    if a.legs.len() != b.legs.len() {
        return a.legs.len() < b.legs.len();
    }
    a.aggregate_liquidity(ranked) > b.aggregate_liquidity(ranked)
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SearchState {
    Seeded { paths: usize },
    Evaluating { ranked: usize },
    Selected { candidates: usize },
    NoRoute(NoRouteReason),
}

fn enter(state: SearchState) -> SearchState {
    debug!(?state, "Route search transition");
    state
}

/// Route search over a fixed pool universe
#[derive(Debug, Clone, Copy)]
pub struct RouteOptimizer<'a> {
    pools: &'a [PoolState],
    cache_mode: CacheMode,
}

impl<'a> RouteOptimizer<'a> {
    pub fn new(pools: &'a [PoolState]) -> Self {
        Self {
            pools,
            cache_mode: CacheMode::Use,
        }
    }

    pub fn with_cache_mode(mut self, cache_mode: CacheMode) -> Self {
        self.cache_mode = cache_mode;
        self
    }

    /// Search with a fresh cache scoped to this call.
    pub fn find_best_route(
        &self,
        trade: &TradeSpec,
        routing: &RoutingOptions,
        selection: &SelectionOptions,
    ) -> Result<RouteOutcome, WhirlpoolError> {
        let mut cache = QuoteCache::new(self.cache_mode);
        let outcome = self.find_best_route_with_cache(trade, routing, selection, &mut cache);
        debug!(
            hits = cache.hits(),
            misses = cache.misses(),
            "Quote cache usage"
        );
        outcome
    }

    pub fn find_best_route_with_cache(
        &self,
        trade: &TradeSpec,
        routing: &RoutingOptions,
        selection: &SelectionOptions,
        cache: &mut QuoteCache,
    ) -> Result<RouteOutcome, WhirlpoolError> {
        trade.validate()?;
        routing.validate()?;

        let graph = build_pool_graph(self.pools, routing.max_pools_per_pair);
        let paths = find_paths(&graph, &trade.token_in, &trade.token_out, routing.max_hops);
        let state = enter(SearchState::Seeded { paths: paths.len() });
        if paths.is_empty() {
            enter(SearchState::NoRoute(NoRouteReason::NoPath));
            return Ok(RouteOutcome::NoRoute {
                reason: NoRouteReason::NoPath,
            });
        }
        debug!(?state, pools = graph.pool_count, "Pool graph built");

        let ranked = rank_paths(paths, trade, routing, cache);
        enter(SearchState::Evaluating {
            ranked: ranked.len(),
        });

        let mut candidates: Vec<Candidate> = ranked
            .iter()
            .enumerate()
            .filter_map(|(i, path)| {
                path.full.clone().map(|quote| {
                    Candidate::new(vec![Leg {
                        path_index: i,
                        percent: 100,
                        quote,
                    }])
                })
            })
            .collect();
        for k in 2..=routing.max_splits {
            if let Some(split) = greedy_split(&ranked, trade, k, routing, cache) {
                candidates.push(split);
            }
        }

        if candidates.is_empty() {
            enter(SearchState::NoRoute(NoRouteReason::InsufficientLiquidity));
            return Ok(RouteOutcome::NoRoute {
                reason: NoRouteReason::InsufficientLiquidity,
            });
        }

        let limit = selection.account_limit();
        let mut best: Option<(Candidate, usize)> = None;
        let mut admitted = 0;
        for candidate in candidates {
            let accounts = estimate_account_count(
                candidate.pools(&ranked).len(),
                &candidate.tokens(&ranked),
                selection,
            );
            if accounts > limit {
                debug!(accounts, limit, legs = candidate.legs.len(), "Candidate over account limit");
                continue;
            }
            admitted += 1;
            let replace = match &best {
                None => true,
                Some((current, _)) => {
                    beats(&candidate, current, &ranked, trade.amount_specified_is_input)
                }
            };
            if replace {
                best = Some((candidate, accounts));
            }
        }

        let Some((winner, accounts)) = best else {
            enter(SearchState::NoRoute(NoRouteReason::SelectionFiltered));
            return Ok(RouteOutcome::NoRoute {
                reason: NoRouteReason::SelectionFiltered,
            });
        };
        enter(SearchState::Selected {
            candidates: admitted,
        });

        Ok(RouteOutcome::Found(into_route(winner, accounts, &ranked, trade)))
    }
}

fn into_route(
    candidate: Candidate,
    accounts: usize,
    ranked: &[RankedPath<'_>],
    trade: &TradeSpec,
) -> Route {
    let other_amount_threshold = if trade.amount_specified_is_input {
        trade.slippage.adjust_down(candidate.total_out)
    } else {
        trade.slippage.adjust_up(candidate.total_in)
    };

    let sub_routes = candidate
        .legs
        .into_iter()
        .map(|leg| SubRoute {
            split_percent: leg.percent,
            path: ranked[leg.path_index]
                .edges
                .iter()
                .map(|e| e.to_path_edge())
                .collect(),
            amount_in: leg.quote.amount_in,
            amount_out: leg.quote.amount_out,
            hop_quotes: leg.quote.hops,
        })
        .collect();

    Route {
        token_in: trade.token_in,
        token_out: trade.token_out,
        amount_specified_is_input: trade.amount_specified_is_input,
        sub_routes,
        total_amount_in: candidate.total_in,
        total_amount_out: candidate.total_out,
        other_amount_threshold,
        slippage: trade.slippage,
        estimated_accounts: accounts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quote::quote_exact_in;
    use crate::quote::tests::{make_pool, mint};

    const SOL: u8 = 10;
    const USDC: u8 = 11;
    const BONK: u8 = 12;

    fn slippage() -> Percentage {
        Percentage::from_bps(100).unwrap()
    }

    fn sell(amount: u64) -> TradeSpec {
        TradeSpec::exact_in(mint(SOL), mint(USDC), amount, slippage())
    }

    fn single_hop_options() -> RoutingOptions {
        RoutingOptions {
            max_splits: 1,
            ..Default::default()
        }
    }

    fn found(outcome: RouteOutcome) -> Route {
        match outcome {
            RouteOutcome::Found(route) => route,
            RouteOutcome::NoRoute { reason } => panic!("expected a route, got {:?}", reason),
        }
    }

    // -- Graph & Paths --

    #[test]
    fn test_graph_skips_dry_pools_and_prunes_per_pair() {
        let mut pools: Vec<PoolState> = (0..5)
            .map(|i| make_pool(i + 1, SOL, USDC, 1_000_000 * (i as u128 + 1), 640))
            .collect();
        pools.push(make_pool(9, SOL, USDC, 0, 0));

        let graph = build_pool_graph(&pools, 3);
        let edges = &graph.adjacency[&mint(SOL)];
        assert_eq!(edges.len(), 3);
        assert_eq!(graph.pool_count, 3);
        // Deepest first
        assert_eq!(edges[0].pool.address, mint(5));
        assert!(edges.windows(2).all(|w| w[0].pool.liquidity >= w[1].pool.liquidity));
        assert!(edges.iter().all(|e| e.pool.has_liquidity()));
        assert_eq!(graph.adjacency[&mint(USDC)].len(), 3);
    }

    #[test]
    fn test_find_paths_direct_and_two_hop() {
        let pools = vec![
            make_pool(1, SOL, USDC, 1_000_000_000, 640),
            make_pool(2, SOL, BONK, 1_000_000_000, 640),
            make_pool(3, BONK, USDC, 1_000_000_000, 640),
        ];
        let graph = build_pool_graph(&pools, 10);

        let paths = find_paths(&graph, &mint(SOL), &mint(USDC), 2);
        assert_eq!(paths.len(), 2);
        assert_eq!(paths[0].len(), 1);
        assert_eq!(paths[1].len(), 2);
        assert_eq!(paths[1][0].token_out, mint(BONK));
        assert_eq!(paths[1][1].token_out, mint(USDC));

        let direct_only = find_paths(&graph, &mint(SOL), &mint(USDC), 1);
        assert_eq!(direct_only.len(), 1);
        assert!(find_paths(&graph, &mint(SOL), &mint(USDC), 0).is_empty());
    }

    #[test]
    fn test_paths_never_revisit_tokens_or_pools() {
        let pools = vec![
            make_pool(1, SOL, USDC, 1_000_000_000, 640),
            make_pool(2, SOL, BONK, 1_000_000_000, 640),
            make_pool(3, BONK, USDC, 1_000_000_000, 640),
            make_pool(4, SOL, USDC, 500_000_000, 640),
        ];
        let graph = build_pool_graph(&pools, 10);
        for path in find_paths(&graph, &mint(SOL), &mint(USDC), 3) {
            let mut tokens = HashSet::from([mint(SOL)]);
            let mut used = HashSet::new();
            for edge in &path {
                assert!(tokens.insert(edge.token_out), "token revisited");
                assert!(used.insert(edge.pool.address), "pool reused");
            }
        }
    }

    // -- Search --

    #[test]
    fn test_single_pool_route_matches_direct_quote() {
        let pools = vec![make_pool(1, SOL, USDC, 1_000_000_000, 640)];
        let route = found(
            RouteOptimizer::new(&pools)
                .find_best_route(&sell(100), &single_hop_options(), &SelectionOptions::default())
                .unwrap(),
        );

        let direct = quote_exact_in(&pools[0], &mint(SOL), 100, slippage()).unwrap();
        assert_eq!(route.sub_routes.len(), 1);
        assert_eq!(route.sub_routes[0].split_percent, 100);
        assert_eq!(route.total_amount_in, 100);
        assert_eq!(route.total_amount_out, direct.estimated_amount_out);
        assert_eq!(route.other_amount_threshold, direct.other_amount_threshold);
        assert_eq!(route.sub_routes[0].hop_quotes, vec![direct]);
    }

    #[test]
    fn test_no_liquid_pool_is_no_route() {
        let pools = vec![make_pool(1, SOL, USDC, 0, 0)];
        let outcome = RouteOptimizer::new(&pools)
            .find_best_route(&sell(100), &RoutingOptions::default(), &SelectionOptions::default())
            .unwrap();
        assert_eq!(
            outcome,
            RouteOutcome::NoRoute {
                reason: NoRouteReason::NoPath
            }
        );
        assert!(outcome.route().is_none());
    }

    #[test]
    fn test_unfillable_amount_is_no_route() {
        let pools = vec![make_pool(1, SOL, USDC, 1_000, 64)];
        let outcome = RouteOptimizer::new(&pools)
            .find_best_route(
                &sell(1_000_000_000),
                &RoutingOptions::default(),
                &SelectionOptions::default(),
            )
            .unwrap();
        assert_eq!(
            outcome,
            RouteOutcome::NoRoute {
                reason: NoRouteReason::InsufficientLiquidity
            }
        );
    }

    #[test]
    fn test_split_across_parallel_pools() {
        let pools = vec![
            make_pool(1, SOL, USDC, 1_000_000_000, 6_400),
            make_pool(2, SOL, USDC, 1_000_000_000, 6_400),
        ];
        let trade = sell(100_000_000);
        let optimizer = RouteOptimizer::new(&pools);

        let split = found(
            optimizer
                .find_best_route(&trade, &RoutingOptions::default(), &SelectionOptions::default())
                .unwrap(),
        );
        let single = found(
            optimizer
                .find_best_route(&trade, &single_hop_options(), &SelectionOptions::default())
                .unwrap(),
        );

        assert_eq!(split.sub_routes.len(), 2);
        assert_eq!(
            split.sub_routes.iter().map(|s| s.split_percent as u32).sum::<u32>(),
            100
        );
        assert_eq!(
            split.sub_routes.iter().map(|s| s.amount_in).sum::<u64>(),
            trade.amount
        );
        assert_eq!(split.total_amount_in, trade.amount);
        assert!(split.total_amount_out > single.total_amount_out);
        assert_eq!(single.sub_routes.len(), 1);
    }

    #[test]
    fn test_split_legs_never_share_pools() {
        let pools = vec![
            make_pool(1, SOL, USDC, 1_000_000_000, 6_400),
            make_pool(2, SOL, BONK, 1_000_000_000, 6_400),
            make_pool(3, BONK, USDC, 1_000_000_000, 6_400),
            make_pool(4, SOL, USDC, 800_000_000, 6_400),
        ];
        let route = found(
            RouteOptimizer::new(&pools)
                .find_best_route(
                    &sell(200_000_000),
                    &RoutingOptions::default(),
                    &SelectionOptions::default(),
                )
                .unwrap(),
        );

        let mut used = HashSet::new();
        for sub in &route.sub_routes {
            for edge in &sub.path {
                assert!(used.insert(edge.pool), "pool {} used twice", edge.pool);
            }
        }
        assert!(route.sub_routes.len() <= DEFAULT_MAX_SPLITS);
        assert_eq!(route.total_amount_in, 200_000_000);
    }

    #[test]
    fn test_exact_out_route_delivers_requested_amount() {
        let pools = vec![
            make_pool(1, SOL, USDC, 1_000_000_000, 6_400),
            make_pool(2, SOL, USDC, 1_000_000_000, 6_400),
        ];
        let trade = TradeSpec::exact_out(mint(SOL), mint(USDC), 50_000_000, slippage());
        let route = found(
            RouteOptimizer::new(&pools)
                .find_best_route(&trade, &RoutingOptions::default(), &SelectionOptions::default())
                .unwrap(),
        );

        assert_eq!(route.total_amount_out, 50_000_000);
        assert!(route.total_amount_in > 50_000_000);
        assert_eq!(
            route.other_amount_threshold,
            slippage().adjust_up(route.total_amount_in)
        );
        assert_eq!(
            route.sub_routes.iter().map(|s| s.split_percent as u32).sum::<u32>(),
            100
        );
    }

    #[test]
    fn test_two_hop_route_when_no_direct_pool() {
        let pools = vec![
            make_pool(1, SOL, BONK, 1_000_000_000, 640),
            make_pool(2, BONK, USDC, 1_000_000_000, 640),
        ];
        let route = found(
            RouteOptimizer::new(&pools)
                .find_best_route(&sell(10_000), &RoutingOptions::default(), &SelectionOptions::default())
                .unwrap(),
        );
        assert_eq!(route.sub_routes.len(), 1);
        let path = &route.sub_routes[0].path;
        assert_eq!(path.len(), 2);
        assert_eq!(path[0].token_in, mint(SOL));
        assert_eq!(path[1].token_out, mint(USDC));
        assert_eq!(
            route.sub_routes[0].hop_quotes[0].estimated_amount_out,
            route.sub_routes[0].hop_quotes[1].estimated_amount_in
        );
    }

    #[test]
    fn test_selection_filters_by_account_limit() {
        let pools = vec![make_pool(1, SOL, USDC, 1_000_000_000, 640)];
        let selection = SelectionOptions {
            max_accounts: Some(5),
            ..Default::default()
        };
        let outcome = RouteOptimizer::new(&pools)
            .find_best_route(&sell(100), &RoutingOptions::default(), &selection)
            .unwrap();
        assert_eq!(
            outcome,
            RouteOutcome::NoRoute {
                reason: NoRouteReason::SelectionFiltered
            }
        );
    }

    #[test]
    fn test_account_estimate_counts_missing_atas() {
        let tokens = HashSet::from([mint(SOL), mint(USDC)]);
        let all_present = SelectionOptions::default();
        assert_eq!(estimate_account_count(1, &tokens, &all_present), 3 + 7 + 2);

        let missing_one = SelectionOptions {
            available_ata_accounts: Some(HashSet::from([mint(SOL)])),
            ..Default::default()
        };
        assert_eq!(estimate_account_count(1, &tokens, &missing_one), 3 + 7 + 2 + 1 + 2);
        assert_eq!(
            SelectionOptions {
                max_supported_transaction_version: TransactionVersion::Legacy,
                ..Default::default()
            }
            .account_limit(),
            32
        );
    }

    #[test]
    fn test_legacy_limit_drops_wide_split() {
        let pools = vec![
            make_pool(1, SOL, USDC, 1_000_000_000, 6_400),
            make_pool(2, SOL, USDC, 1_000_000_000, 6_400),
            make_pool(3, SOL, USDC, 1_000_000_000, 6_400),
        ];
        let selection = SelectionOptions {
            max_supported_transaction_version: TransactionVersion::Legacy,
            ..Default::default()
        };
        let route = found(
            RouteOptimizer::new(&pools)
                .find_best_route(&sell(100_000_000), &RoutingOptions::default(), &selection)
                .unwrap(),
        );
        // Three pools need 3 + 21 + 2 = 26 accounts, still legacy-sized
        assert!(route.estimated_accounts <= 32);

        let tight = SelectionOptions {
            max_accounts: Some(19),
            ..Default::default()
        };
        let route = found(
            RouteOptimizer::new(&pools)
                .find_best_route(&sell(100_000_000), &RoutingOptions::default(), &tight)
                .unwrap(),
        );
        assert!(route.sub_routes.len() <= 2);
        assert!(route.estimated_accounts <= 19);
    }

    #[test]
    fn test_search_reuses_cached_quotes() {
        let pools = vec![
            make_pool(1, SOL, USDC, 1_000_000_000, 6_400),
            make_pool(2, SOL, USDC, 1_000_000_000, 6_400),
        ];
        let optimizer = RouteOptimizer::new(&pools);
        let mut cache = QuoteCache::new(CacheMode::Use);
        let cached = optimizer
            .find_best_route_with_cache(
                &sell(100_000_000),
                &RoutingOptions::default(),
                &SelectionOptions::default(),
                &mut cache,
            )
            .unwrap();
        assert!(cache.hits() > 0);

        let mut bypass = QuoteCache::new(CacheMode::Bypass);
        let uncached = optimizer
            .find_best_route_with_cache(
                &sell(100_000_000),
                &RoutingOptions::default(),
                &SelectionOptions::default(),
                &mut bypass,
            )
            .unwrap();
        assert_eq!(cached, uncached);
        assert_eq!(bypass.hits(), 0);
    }

    #[test]
    fn test_split_quanta() {
        assert_eq!(split_quanta(20), vec![20, 20, 20, 20, 20]);
        assert_eq!(split_quanta(30), vec![30, 30, 30, 10]);
        assert_eq!(split_quanta(100), vec![100]);
        assert!(RoutingOptions {
            percent_increment: 0,
            ..Default::default()
        }
        .validate()
        .is_err());
    }

    #[test]
    fn test_zero_splits_or_hops_rejected() {
        let pools = vec![make_pool(1, SOL, USDC, 1_000_000_000, 640)];
        let optimizer = RouteOptimizer::new(&pools);
        for routing in [
            RoutingOptions {
                max_splits: 0,
                ..Default::default()
            },
            RoutingOptions {
                max_hops: 0,
                ..Default::default()
            },
        ] {
            assert!(matches!(routing.validate(), Err(WhirlpoolError::InvalidTrade(_))));
            assert!(matches!(
                optimizer.find_best_route(&sell(100), &routing, &SelectionOptions::default()),
                Err(WhirlpoolError::InvalidTrade(_))
            ));
        }
        assert!(single_hop_options().validate().is_ok());
    }

    fn leg(path_index: usize, percent: u8, amount_in: u64, amount_out: u64) -> Leg {
        Leg {
            path_index,
            percent,
            quote: PathQuote {
                hops: Vec::new(),
                amount_in,
                amount_out,
                complete: true,
            },
        }
    }

    fn direct_path(pool: &PoolState) -> RankedPath<'_> {
        RankedPath {
            edges: vec![PoolEdge {
                pool,
                token_in: pool.token_mint_a,
                token_out: pool.token_mint_b,
            }],
            full: None,
        }
    }

    #[test]
    fn test_selection_tie_breaks() {
        let shallow = make_pool(1, SOL, USDC, 1_000_000, 640);
        let deep = make_pool(2, SOL, USDC, 9_000_000, 640);
        let ranked = vec![direct_path(&shallow), direct_path(&deep)];

        // Better output wins outright
        let more = Candidate::new(vec![leg(0, 100, 100, 60)]);
        let less = Candidate::new(vec![leg(1, 100, 100, 59)]);
        assert!(beats(&more, &less, &ranked, true));
        assert!(!beats(&less, &more, &ranked, true));

        // Exact output: less input wins
        let cheaper = Candidate::new(vec![leg(0, 100, 99, 60)]);
        assert!(beats(&cheaper, &more, &ranked, false));

        // Equal output: a single path beats a deeper split
        let single = Candidate::new(vec![leg(0, 100, 100, 60)]);
        let split = Candidate::new(vec![leg(0, 50, 50, 30), leg(1, 50, 50, 30)]);
        assert!(beats(&single, &split, &ranked, true));
        assert!(!beats(&split, &single, &ranked, true));

        // Equal output and legs: deeper pool wins
        let on_shallow = Candidate::new(vec![leg(0, 100, 100, 60)]);
        let on_deep = Candidate::new(vec![leg(1, 100, 100, 60)]);
        assert!(beats(&on_deep, &on_shallow, &ranked, true));
        assert!(!beats(&on_shallow, &on_deep, &ranked, true));

        // Identical candidates keep the earlier one
        assert!(!beats(&on_deep, &on_deep, &ranked, true));
    }

    #[test]
    fn test_equal_output_picks_deeper_pool() {
        let pools = vec![
            make_pool(1, SOL, USDC, 1_000_000, 640),
            make_pool(2, SOL, USDC, 9_000_000, 640),
        ];
        let route = found(
            RouteOptimizer::new(&pools)
                .find_best_route(&sell(1), &single_hop_options(), &SelectionOptions::default())
                .unwrap(),
        );
        assert_eq!(route.total_amount_out, 0);
        assert_eq!(route.sub_routes.len(), 1);
        assert_eq!(route.sub_routes[0].path[0].pool, mint(2));
    }

    #[test]
    fn test_invalid_trade_is_error() {
        let pools = vec![make_pool(1, SOL, USDC, 1_000_000_000, 640)];
        let result = RouteOptimizer::new(&pools).find_best_route(
            &sell(0),
            &RoutingOptions::default(),
            &SelectionOptions::default(),
        );
        assert!(matches!(result, Err(WhirlpoolError::ZeroAmount)));
    }
}
