//! Quote Cache
//!
//! Memoizes single-pool quotes for the lifetime of one route search. Keys
//! carry the pool fingerprint, so a changed snapshot never reuses a stale
//! quote.

use std::collections::HashMap;

use whirlroute_core::{Percentage, PoolFingerprint, PoolState, Pubkey};

use crate::quote::{quote_exact_in, quote_exact_out};
use crate::state::{Quote, WhirlpoolError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    #[default]
    Use,
    /// Always recompute; nothing is stored
    Bypass,
}

/// Identity of a single-pool quote request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QuoteKey {
    pub pool: Pubkey,
    pub fingerprint: PoolFingerprint,
    pub token_in: Pubkey,
    pub amount: u64,
    pub amount_specified_is_input: bool,
    pub slippage: Percentage,
}

impl QuoteKey {
    /// `token` is the input mint for exact-input requests and the output
    /// mint otherwise.
    pub fn new(
        pool: &PoolState,
        token: &Pubkey,
        amount: u64,
        amount_specified_is_input: bool,
        slippage: Percentage,
    ) -> Self {
        let token_in = if amount_specified_is_input {
            *token
        } else {
            pool.other_mint(token).unwrap_or(*token)
        };
        Self {
            pool: pool.address,
            fingerprint: pool.fingerprint(),
            token_in,
            amount,
            amount_specified_is_input,
            slippage,
        }
    }
}

/// Per-search quote memo. Failed computations are not stored.
#[derive(Debug, Default)]
pub struct QuoteCache {
    mode: CacheMode,
    entries: HashMap<QuoteKey, Quote>,
    hits: usize,
    misses: usize,
}

impl QuoteCache {
    pub fn new(mode: CacheMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    pub fn mode(&self) -> CacheMode {
        self.mode
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn misses(&self) -> usize {
        self.misses
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get_or_compute<F>(&mut self, key: QuoteKey, compute: F) -> Result<Quote, WhirlpoolError>
    where
        F: FnOnce() -> Result<Quote, WhirlpoolError>,
    {
        if self.mode == CacheMode::Use {
            if let Some(quote) = self.entries.get(&key) {
                self.hits += 1;
                return Ok(quote.clone());
            }
        }

        self.misses += 1;
        let quote = compute()?;
        if self.mode == CacheMode::Use {
            self.entries.insert(key, quote.clone());
        }
        Ok(quote)
    }

    pub fn quote_exact_in(
        &mut self,
        pool: &PoolState,
        token_in: &Pubkey,
        amount: u64,
        slippage: Percentage,
    ) -> Result<Quote, WhirlpoolError> {
        let key = QuoteKey::new(pool, token_in, amount, true, slippage);
        self.get_or_compute(key, || quote_exact_in(pool, token_in, amount, slippage))
    }

    pub fn quote_exact_out(
        &mut self,
        pool: &PoolState,
        token_out: &Pubkey,
        amount: u64,
        slippage: Percentage,
    ) -> Result<Quote, WhirlpoolError> {
        let key = QuoteKey::new(pool, token_out, amount, false, slippage);
        self.get_or_compute(key, || quote_exact_out(pool, token_out, amount, slippage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quote::tests::{make_pool, mint};

    #[test]
    fn test_repeat_quote_hits_cache() {
        let pool = make_pool(1, 10, 11, 1_000_000_000, 640);
        let slippage = Percentage::from_bps(50).unwrap();
        let mut cache = QuoteCache::new(CacheMode::Use);

        let first = cache.quote_exact_in(&pool, &mint(10), 5_000, slippage).unwrap();
        let second = cache.quote_exact_in(&pool, &mint(10), 5_000, slippage).unwrap();
        assert_eq!(first, second);
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.misses(), 1);
        assert_eq!(cache.len(), 1);

        // Different amount, direction, or slippage is a different key
        cache.quote_exact_in(&pool, &mint(10), 5_001, slippage).unwrap();
        cache.quote_exact_out(&pool, &mint(11), 5_000, slippage).unwrap();
        cache
            .quote_exact_in(&pool, &mint(10), 5_000, Percentage::zero())
            .unwrap();
        assert_eq!(cache.misses(), 4);
    }

    #[test]
    fn test_changed_snapshot_misses() {
        let pool = make_pool(1, 10, 11, 1_000_000_000, 640);
        let mut moved = pool.clone();
        moved.liquidity += 1;
        let mut cache = QuoteCache::new(CacheMode::Use);

        cache.quote_exact_in(&pool, &mint(10), 5_000, Percentage::zero()).unwrap();
        cache.quote_exact_in(&moved, &mint(10), 5_000, Percentage::zero()).unwrap();
        assert_eq!(cache.hits(), 0);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_bypass_never_stores() {
        let pool = make_pool(1, 10, 11, 1_000_000_000, 640);
        let mut cache = QuoteCache::new(CacheMode::Bypass);
        for _ in 0..3 {
            cache.quote_exact_in(&pool, &mint(10), 5_000, Percentage::zero()).unwrap();
        }
        assert_eq!(cache.hits(), 0);
        assert_eq!(cache.misses(), 3);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_errors_are_not_cached() {
        let pool = make_pool(1, 10, 11, 1_000_000_000, 640);
        let mut cache = QuoteCache::new(CacheMode::Use);
        assert!(cache.quote_exact_in(&pool, &mint(99), 5, Percentage::zero()).is_err());
        assert!(cache.is_empty());
    }
}
