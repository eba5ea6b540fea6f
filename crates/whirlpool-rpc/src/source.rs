//! RPC-backed pool source
//!
//! Serves both [`PoolStateReader`] and [`PoolEnumerator`]. Pool accounts are
//! loaded first, then the tick arrays around each pool's current tick in one
//! more batched read.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tracing::{debug, info, warn};
use whirlpool::constants::layout;
use whirlpool::constants::tick_array::{NEIGHBOR_ARRAYS, TICK_ARRAY_SIZE};
use whirlpool::pda::{tick_array_address, tick_array_start_index};
use whirlroute_core::{
    PoolEnumerator, PoolLookup, PoolState, PoolStateReader, Pubkey, ReaderError, TickEntry,
    TickWindow, MAX_TICK_INDEX, MIN_TICK_INDEX,
};

use crate::accounts::{decode_tick_array, decode_whirlpool, WhirlpoolAccount};
use crate::client::{AccountFilter, RpcClient};

pub struct RpcPoolSource {
    client: RpcClient,
    program_id: Pubkey,
}

impl RpcPoolSource {
    pub fn new(client: RpcClient, program_id: Pubkey) -> Self {
        Self { client, program_id }
    }

    pub fn client(&self) -> &RpcClient {
        &self.client
    }

    /// Load the tick arrays around each pool and assemble snapshots.
    /// Pools without liquidity get no tick arrays and an empty window.
    async fn with_ticks(
        &self,
        pools: Vec<(Pubkey, WhirlpoolAccount)>,
    ) -> Result<Vec<PoolState>, ReaderError> {
        let plans: Vec<Option<TickArrayPlan>> = pools
            .iter()
            .map(|(address, account)| {
                (account.liquidity > 0)
                    .then(|| TickArrayPlan::new(&self.program_id, address, account))
            })
            .collect();
        let array_addresses: Vec<Pubkey> = plans
            .iter()
            .flatten()
            .flat_map(|plan| plan.arrays.iter().map(|(_, address)| *address))
            .collect();

        let data = self.client.get_multiple_accounts(&array_addresses).await?;
        let loaded: HashMap<Pubkey, Option<Vec<u8>>> = array_addresses.into_iter().zip(data).collect();
        debug!(
            pools = pools.len(),
            tick_arrays = loaded.values().filter(|d| d.is_some()).count(),
            "Loaded tick arrays"
        );

        Ok(pools
            .into_iter()
            .zip(plans)
            .map(|((address, account), plan)| {
                let (ticks, window) = match plan {
                    Some(plan) => plan.assemble(&address, account.tick_spacing, &loaded),
                    None => (Vec::new(), point_window(account.tick_current_index)),
                };
                account.into_pool_state(address, ticks, window)
            })
            .collect())
    }
}

/// Window covering only `tick`, so a walk cannot leave the current price
fn point_window(tick: i32) -> TickWindow {
    let tick = tick.clamp(MIN_TICK_INDEX, MAX_TICK_INDEX);
    TickWindow {
        lower: tick,
        upper: tick,
    }
}

/// Tick arrays to load for one pool, ascending by start index
struct TickArrayPlan {
    arrays: Vec<(i32, Pubkey)>,
    /// Position of the array holding the current tick
    center: Option<usize>,
    current_tick: i32,
}

impl TickArrayPlan {
    fn new(program_id: &Pubkey, pool: &Pubkey, account: &WhirlpoolAccount) -> Self {
        let span = TICK_ARRAY_SIZE * account.tick_spacing as i32;
        let current = tick_array_start_index(account.tick_current_index, account.tick_spacing);
        let starts: Vec<i32> = (-NEIGHBOR_ARRAYS..=NEIGHBOR_ARRAYS)
            .map(|offset| current + offset * span)
            .filter(|start| *start + span > MIN_TICK_INDEX && *start <= MAX_TICK_INDEX)
            .collect();
        let center = starts.iter().position(|start| *start == current);
        let arrays = starts
            .into_iter()
            .map(|start| (start, tick_array_address(program_id, pool, start)))
            .collect();
        Self {
            arrays,
            center,
            current_tick: account.tick_current_index,
        }
    }

    /// Ticks from the contiguous run of existing arrays around the current
    /// one, and the window that run covers. Without the current array the
    /// window shrinks to its range and holds no ticks.
    fn assemble(
        &self,
        pool: &Pubkey,
        tick_spacing: u16,
        loaded: &HashMap<Pubkey, Option<Vec<u8>>>,
    ) -> (Vec<TickEntry>, TickWindow) {
        let Some(center) = self.center else {
            return (Vec::new(), point_window(self.current_tick));
        };
        let span = TICK_ARRAY_SIZE * tick_spacing as i32;

        let decoded: Vec<Option<Vec<TickEntry>>> = self
            .arrays
            .iter()
            .map(|(_, address)| {
                let data = loaded.get(address).and_then(Option::as_ref)?;
                match decode_tick_array(address, data, tick_spacing) {
                    Ok(array) if array.whirlpool == *pool => Some(array.ticks),
                    Ok(_) => {
                        warn!(%address, %pool, "Tick array belongs to another pool");
                        None
                    }
                    Err(e) => {
                        warn!(%address, error = %e, "Undecodable tick array");
                        None
                    }
                }
            })
            .collect();

        let (mut lo, mut hi) = (center, center);
        if decoded[center].is_some() {
            while lo > 0 && decoded[lo - 1].is_some() {
                lo -= 1;
            }
            while hi + 1 < decoded.len() && decoded[hi + 1].is_some() {
                hi += 1;
            }
        }

        let window = TickWindow {
            lower: self.arrays[lo].0.max(MIN_TICK_INDEX),
            upper: (self.arrays[hi].0 + span - 1).min(MAX_TICK_INDEX),
        };
        let mut ticks: Vec<TickEntry> = decoded[lo..=hi]
            .iter()
            .flatten()
            .flatten()
            .copied()
            .collect();
        ticks.sort_by_key(|t| t.index);
        (ticks, window)
    }
}

#[async_trait]
impl PoolStateReader for RpcPoolSource {
    async fn fetch_many(
        &self,
        addresses: &[Pubkey],
    ) -> Result<HashMap<Pubkey, PoolLookup>, ReaderError> {
        let data = self.client.get_multiple_accounts(addresses).await?;

        let mut lookups = HashMap::with_capacity(addresses.len());
        let mut found = Vec::new();
        for (address, account) in addresses.iter().zip(data) {
            let Some(bytes) = account else {
                lookups.insert(*address, PoolLookup::Missing);
                continue;
            };
            match decode_whirlpool(address, &bytes) {
                Ok(account) => found.push((*address, account)),
                Err(e) => {
                    warn!(%address, error = %e, "Account is not a Whirlpool, treating as missing");
                    lookups.insert(*address, PoolLookup::Missing);
                }
            }
        }

        for pool in self.with_ticks(found).await? {
            lookups.insert(pool.address, PoolLookup::Found(pool));
        }
        Ok(lookups)
    }
}

#[async_trait]
impl PoolEnumerator for RpcPoolSource {
    async fn list_all(
        &self,
        config_id: &Pubkey,
    ) -> Result<HashMap<Pubkey, PoolState>, ReaderError> {
        let filters = [
            AccountFilter::DataSize(layout::whirlpool::ACCOUNT_LEN as u64),
            AccountFilter::Memcmp {
                offset: layout::whirlpool::WHIRLPOOLS_CONFIG,
                bytes: config_id.to_string(),
            },
        ];
        let raw = self.client.get_program_accounts(&self.program_id, &filters).await?;

        let mut seen = HashSet::new();
        let mut pools = Vec::with_capacity(raw.len());
        for (address, data) in raw {
            if !seen.insert(address) {
                continue;
            }
            match decode_whirlpool(&address, &data) {
                Ok(account) => pools.push((address, account)),
                Err(e) => warn!(%address, error = %e, "Skipping undecodable Whirlpool"),
            }
        }
        info!(config = %config_id, pools = pools.len(), "Enumerated Whirlpools");

        Ok(self
            .with_ticks(pools)
            .await?
            .into_iter()
            .map(|pool| (pool.address, pool))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::tests::{sample_account, tick_array_bytes};
    use whirlroute_core::RpcConfig;

    fn plan_fixture() -> (Pubkey, Pubkey, WhirlpoolAccount, TickArrayPlan) {
        let program_id = Pubkey::new_from_array([100; 32]);
        let pool = Pubkey::new_from_array([55; 32]);
        let account = sample_account();
        let plan = TickArrayPlan::new(&program_id, &pool, &account);
        (program_id, pool, account, plan)
    }

    #[test]
    fn test_plan_covers_current_and_neighbors() {
        let (program_id, pool, account, plan) = plan_fixture();
        // tick -5 at spacing 64 lives in the array starting at -5632
        let starts: Vec<i32> = plan.arrays.iter().map(|(start, _)| *start).collect();
        assert_eq!(starts, vec![-16_896, -11_264, -5_632, 0, 5_632]);
        assert_eq!(plan.center, Some(2));
        assert_eq!(plan.arrays[2].1, tick_array_address(&program_id, &pool, -5_632));
        assert_eq!(account.tick_spacing, 64);
    }

    #[test]
    fn test_window_is_contiguous_run_around_current() {
        let (_, pool, _, plan) = plan_fixture();
        let mut loaded = HashMap::new();
        // Arrays at -11264, -5632 and 5632 exist; 0 is missing
        for (i, (start, address)) in plan.arrays.iter().enumerate() {
            let data = match i {
                1 => Some(tick_array_bytes(&pool, *start, &[(3, 40)])),
                2 => Some(tick_array_bytes(&pool, *start, &[(80, 70), (1, -10)])),
                4 => Some(tick_array_bytes(&pool, *start, &[(0, 99)])),
                _ => None,
            };
            loaded.insert(*address, data);
        }

        let (ticks, window) = plan.assemble(&pool, 64, &loaded);
        assert_eq!(window, TickWindow { lower: -11_264, upper: -1 });
        let indices: Vec<i32> = ticks.iter().map(|t| t.index).collect();
        assert_eq!(indices, vec![-11_264 + 3 * 64, -5_632 + 64, -5_632 + 80 * 64]);
    }

    #[test]
    fn test_missing_current_array_shrinks_window() {
        let (_, pool, _, plan) = plan_fixture();
        let loaded: HashMap<Pubkey, Option<Vec<u8>>> =
            plan.arrays.iter().map(|(_, address)| (*address, None)).collect();

        let (ticks, window) = plan.assemble(&pool, 64, &loaded);
        assert!(ticks.is_empty());
        assert_eq!(window, TickWindow { lower: -5_632, upper: -1 });
    }

    #[test]
    fn test_foreign_tick_array_is_ignored() {
        let (_, pool, _, plan) = plan_fixture();
        let stranger = Pubkey::new_from_array([66; 32]);
        let loaded: HashMap<Pubkey, Option<Vec<u8>>> = plan
            .arrays
            .iter()
            .map(|(start, address)| (*address, Some(tick_array_bytes(&stranger, *start, &[(0, 1)]))))
            .collect();

        let (ticks, window) = plan.assemble(&pool, 64, &loaded);
        assert!(ticks.is_empty());
        assert_eq!(window.lower, -5_632);
    }

    #[test]
    fn test_plan_without_current_array_pins_window() {
        let plan = TickArrayPlan {
            arrays: Vec::new(),
            center: None,
            current_tick: -5,
        };
        let (ticks, window) = plan.assemble(&Pubkey::new_unique(), 64, &HashMap::new());
        assert!(ticks.is_empty());
        assert_eq!(window, TickWindow { lower: -5, upper: -5 });
    }

    #[tokio::test]
    async fn test_dry_pools_load_no_tick_arrays() {
        // Nothing listens here, so any request would fail the test
        let client = RpcClient::new(&RpcConfig {
            url: "http://127.0.0.1:9".to_string(),
            commitment: "confirmed".to_string(),
            timeout_secs: 1,
        })
        .unwrap();
        let source = RpcPoolSource::new(client, Pubkey::new_from_array([100; 32]));

        let address = Pubkey::new_from_array([55; 32]);
        let account = WhirlpoolAccount {
            liquidity: 0,
            ..sample_account()
        };
        let pools = source.with_ticks(vec![(address, account)]).await.unwrap();

        assert_eq!(pools.len(), 1);
        assert_eq!(pools[0].address, address);
        assert!(pools[0].ticks.is_empty());
        assert_eq!(pools[0].tick_window, TickWindow { lower: -5, upper: -5 });
    }
}
