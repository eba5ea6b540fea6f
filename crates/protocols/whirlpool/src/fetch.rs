//! Pool Discovery
//!
//! Finds the live Whirlpools for a token pair by deriving one address per
//! supported tick spacing and resolving them in a single batched read.

use tracing::{debug, info, warn};
use whirlroute_core::{PoolLookup, PoolState, PoolStateReader, Pubkey};

use crate::pda::{PoolKey, PoolKeyDeriver};
use crate::state::WhirlpoolError;

pub struct PoolDiscovery<R> {
    deriver: PoolKeyDeriver,
    reader: R,
}

impl<R: PoolStateReader> PoolDiscovery<R> {
    pub fn new(deriver: PoolKeyDeriver, reader: R) -> Self {
        Self { deriver, reader }
    }

    pub fn deriver(&self) -> &PoolKeyDeriver {
        &self.deriver
    }

    pub fn reader(&self) -> &R {
        &self.reader
    }

    /// Liquid pools for the pair, deepest first.
    ///
    /// Pools with equal liquidity keep tick-spacing order. A reader failure
    /// or a batch that leaves out any requested address fails the whole
    /// call.
    pub async fn find_pools(
        &self,
        token_a: &Pubkey,
        token_b: &Pubkey,
    ) -> Result<Vec<PoolState>, WhirlpoolError> {
        if token_a == token_b {
            return Err(WhirlpoolError::InvalidTrade(format!(
                "cannot pair {} with itself",
                token_a
            )));
        }

        let keys = self.deriver.derive_all(*token_a, *token_b);
        let addresses: Vec<Pubkey> = keys.iter().map(PoolKey::address).collect();

        let mut lookups = self.reader.fetch_many(&addresses).await?;

        let missing: Vec<Pubkey> = addresses
            .iter()
            .filter(|a| !lookups.contains_key(a))
            .copied()
            .collect();
        if !missing.is_empty() {
            warn!(
                requested = addresses.len(),
                missing = missing.len(),
                "Reader returned an incomplete batch"
            );
            return Err(WhirlpoolError::IncompleteBatch { missing });
        }

        let mut pools = Vec::new();
        for (key, address) in keys.iter().zip(&addresses) {
            match lookups.remove(address) {
                Some(PoolLookup::Found(pool)) => {
                    if !pool.contains_mint(token_a) || !pool.contains_mint(token_b) {
                        warn!(%address, "Pool account does not match derived pair, skipping");
                    } else if !pool.has_liquidity() {
                        debug!(%address, tick_spacing = key.tick_spacing.as_u16(), "Dropping empty pool");
                    } else {
                        pools.push(pool);
                    }
                }
                Some(PoolLookup::Missing) | None => {}
            }
        }

        pools.sort_by(|a, b| b.liquidity.cmp(&a.liquidity));

        info!(
            token_a = %token_a,
            token_b = %token_b,
            candidates = addresses.len(),
            liquid = pools.len(),
            "Discovered Whirlpools for pair"
        );
        Ok(pools)
    }
}
