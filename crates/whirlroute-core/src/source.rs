//! Pool-state collaborator interfaces
//!
//! The routing core never talks to the network itself. It consumes a
//! [`PoolStateReader`] for batched lookups by address and a
//! [`PoolEnumerator`] for full-universe listings. [`StaticPoolSource`] serves
//! both from an in-memory snapshot.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::{Pubkey, PoolState, ReaderError};

/// Outcome of looking up a single address in a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolLookup {
    Found(PoolState),
    /// The reader confirmed no pool account exists at this address
    Missing,
}

impl PoolLookup {
    pub fn into_pool(self) -> Option<PoolState> {
        match self {
            Self::Found(pool) => Some(pool),
            Self::Missing => None,
        }
    }
}

/// Batched pool-state reads.
///
/// Implementations must answer every requested address (either `Found` or
/// `Missing`) or fail the whole batch.
#[async_trait]
pub trait PoolStateReader: Send + Sync {
    async fn fetch_many(
        &self,
        addresses: &[Pubkey],
    ) -> Result<HashMap<Pubkey, PoolLookup>, ReaderError>;
}

/// Lists every pool belonging to a Whirlpools config
#[async_trait]
pub trait PoolEnumerator: Send + Sync {
    async fn list_all(&self, config_id: &Pubkey)
        -> Result<HashMap<Pubkey, PoolState>, ReaderError>;
}

#[async_trait]
impl<T: PoolStateReader + ?Sized> PoolStateReader for Arc<T> {
    async fn fetch_many(
        &self,
        addresses: &[Pubkey],
    ) -> Result<HashMap<Pubkey, PoolLookup>, ReaderError> {
        (**self).fetch_many(addresses).await
    }
}

#[async_trait]
impl<T: PoolEnumerator + ?Sized> PoolEnumerator for Arc<T> {
    async fn list_all(
        &self,
        config_id: &Pubkey,
    ) -> Result<HashMap<Pubkey, PoolState>, ReaderError> {
        (**self).list_all(config_id).await
    }
}

/// In-memory pool source backed by a fixed snapshot.
///
/// Addresses marked with [`StaticPoolSource::withhold`] are silently left out
/// of batch answers, and [`StaticPoolSource::fail_with`] makes every call fail
/// with a transport error.
#[derive(Debug, Default)]
pub struct StaticPoolSource {
    pools: HashMap<Pubkey, PoolState>,
    withheld: HashSet<Pubkey>,
    failure: Option<String>,
    fetch_calls: AtomicUsize,
}

impl StaticPoolSource {
    pub fn new(pools: impl IntoIterator<Item = PoolState>) -> Self {
        Self {
            pools: pools.into_iter().map(|p| (p.address, p)).collect(),
            ..Default::default()
        }
    }

    pub fn withhold(mut self, address: Pubkey) -> Self {
        self.withheld.insert(address);
        self
    }

    pub fn fail_with(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }

    /// Number of `fetch_many` round-trips served so far
    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    fn check_failure(&self) -> Result<(), ReaderError> {
        match &self.failure {
            Some(message) => Err(ReaderError::Transport {
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl PoolStateReader for StaticPoolSource {
    async fn fetch_many(
        &self,
        addresses: &[Pubkey],
    ) -> Result<HashMap<Pubkey, PoolLookup>, ReaderError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;

        Ok(addresses
            .iter()
            .filter(|address| !self.withheld.contains(address))
            .map(|address| {
                let lookup = match self.pools.get(address) {
                    Some(pool) => PoolLookup::Found(pool.clone()),
                    None => PoolLookup::Missing,
                };
                (*address, lookup)
            })
            .collect())
    }
}

#[async_trait]
impl PoolEnumerator for StaticPoolSource {
    async fn list_all(
        &self,
        config_id: &Pubkey,
    ) -> Result<HashMap<Pubkey, PoolState>, ReaderError> {
        self.check_failure()?;

        Ok(self
            .pools
            .values()
            .filter(|pool| pool.whirlpools_config == *config_id)
            .map(|pool| (pool.address, pool.clone()))
            .collect())
    }
}
