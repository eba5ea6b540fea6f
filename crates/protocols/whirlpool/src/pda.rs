//! Pool Key Derivation
//!
//! Canonical Whirlpool addresses from (mint, mint, tick spacing), plus the
//! tick-array addresses the RPC reader needs.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use whirlroute_core::{Pubkey, WhirlpoolConfig};

use crate::constants::{seeds, tick_array::TICK_ARRAY_SIZE};
use crate::state::WhirlpoolError;

/// Tick spacings supported by the Whirlpool program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u16)]
pub enum TickSpacing {
    One = 1,
    Two = 2,
    Four = 4,
    Eight = 8,
    Sixteen = 16,
    SixtyFour = 64,
    NinetySix = 96,
    OneTwentyEight = 128,
    TwoFiftySix = 256,
    /// Full-range-only pools
    FullRange = 32896,
}

impl TickSpacing {
    pub const ALL: [TickSpacing; 10] = [
        TickSpacing::One,
        TickSpacing::Two,
        TickSpacing::Four,
        TickSpacing::Eight,
        TickSpacing::Sixteen,
        TickSpacing::SixtyFour,
        TickSpacing::NinetySix,
        TickSpacing::OneTwentyEight,
        TickSpacing::TwoFiftySix,
        TickSpacing::FullRange,
    ];

    pub fn as_u16(self) -> u16 {
        self as u16
    }
}

impl TryFrom<u16> for TickSpacing {
    type Error = WhirlpoolError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|ts| ts.as_u16() == value)
            .ok_or(WhirlpoolError::InvalidTickSpacing(value))
    }
}

/// Five-part pool identity; `mint_a < mint_b` byte-wise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PoolKey {
    pub program_id: Pubkey,
    pub config_id: Pubkey,
    pub mint_a: Pubkey,
    pub mint_b: Pubkey,
    pub tick_spacing: TickSpacing,
}

impl PoolKey {
    /// Program-derived address of this pool
    pub fn address(&self) -> Pubkey {
        let spacing = self.tick_spacing.as_u16().to_le_bytes();
        Pubkey::find_program_address(
            &[
                seeds::WHIRLPOOL,
                self.config_id.as_ref(),
                self.mint_a.as_ref(),
                self.mint_b.as_ref(),
                &spacing,
            ],
            &self.program_id,
        )
        .0
    }
}

/// Order two mints by their raw bytes.
pub fn sort_mints(first: Pubkey, second: Pubkey) -> (Pubkey, Pubkey) {
    match first.as_ref().cmp(second.as_ref()) {
        Ordering::Greater => (second, first),
        _ => (first, second),
    }
}

/// Derives pool keys for one program/config deployment
#[derive(Debug, Clone, Copy)]
pub struct PoolKeyDeriver {
    program_id: Pubkey,
    config_id: Pubkey,
}

impl PoolKeyDeriver {
    pub fn new(program_id: Pubkey, config_id: Pubkey) -> Self {
        Self {
            program_id,
            config_id,
        }
    }

    pub fn from_config(config: &WhirlpoolConfig) -> Result<Self, WhirlpoolError> {
        Ok(Self::new(config.program_id()?, config.config_id()?))
    }

    pub fn program_id(&self) -> Pubkey {
        self.program_id
    }

    pub fn config_id(&self) -> Pubkey {
        self.config_id
    }

    pub fn derive(
        &self,
        mint_a: Pubkey,
        mint_b: Pubkey,
        tick_spacing: u16,
    ) -> Result<PoolKey, WhirlpoolError> {
        let tick_spacing = TickSpacing::try_from(tick_spacing)?;
        Ok(self.derive_for(mint_a, mint_b, tick_spacing))
    }

    pub fn derive_for(&self, mint_a: Pubkey, mint_b: Pubkey, tick_spacing: TickSpacing) -> PoolKey {
        let (mint_a, mint_b) = sort_mints(mint_a, mint_b);
        PoolKey {
            program_id: self.program_id,
            config_id: self.config_id,
            mint_a,
            mint_b,
            tick_spacing,
        }
    }

    /// One key per supported tick spacing, in [`TickSpacing::ALL`] order
    pub fn derive_all(&self, mint_a: Pubkey, mint_b: Pubkey) -> Vec<PoolKey> {
        TickSpacing::ALL
            .into_iter()
            .map(|ts| self.derive_for(mint_a, mint_b, ts))
            .collect()
    }
}

/// First tick index of the tick array containing `tick_index`
pub fn tick_array_start_index(tick_index: i32, tick_spacing: u16) -> i32 {
    let ticks_in_array = TICK_ARRAY_SIZE * tick_spacing as i32;
    tick_index.div_euclid(ticks_in_array) * ticks_in_array
}

/// Program-derived address of a tick array
pub fn tick_array_address(program_id: &Pubkey, whirlpool: &Pubkey, start_tick_index: i32) -> Pubkey {
    let start = start_tick_index.to_string();
    Pubkey::find_program_address(
        &[seeds::TICK_ARRAY, whirlpool.as_ref(), start.as_bytes()],
        program_id,
    )
    .0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use whirlroute_core::{DEFAULT_WHIRLPOOLS_CONFIG, DEFAULT_WHIRLPOOL_PROGRAM_ID};

    fn deriver() -> PoolKeyDeriver {
        PoolKeyDeriver::new(
            Pubkey::from_str(DEFAULT_WHIRLPOOL_PROGRAM_ID).unwrap(),
            Pubkey::from_str(DEFAULT_WHIRLPOOLS_CONFIG).unwrap(),
        )
    }

    fn sol() -> Pubkey {
        Pubkey::from_str("So11111111111111111111111111111111111111112").unwrap()
    }

    fn bonk() -> Pubkey {
        Pubkey::from_str("DezXAZ8z7PnrnRJjz3wXBoRgixCa6xjnB7YaB1pPB263").unwrap()
    }

    #[test]
    fn test_derive_is_order_independent() {
        let d = deriver();
        for ts in TickSpacing::ALL {
            let forward = d.derive(sol(), bonk(), ts.as_u16()).unwrap();
            let backward = d.derive(bonk(), sol(), ts.as_u16()).unwrap();
            assert_eq!(forward, backward);
            assert_eq!(forward.address(), backward.address());
        }
    }

    #[test]
    fn test_mints_sorted_bytewise() {
        let low = Pubkey::new_from_array([0x01; 32]);
        let mut high_bytes = [0x00; 32];
        high_bytes[0] = 0x02;
        let high = Pubkey::new_from_array(high_bytes);

        let key = deriver().derive(high, low, 64).unwrap();
        assert_eq!(key.mint_a, low);
        assert_eq!(key.mint_b, high);
        assert!(key.mint_a.as_ref() < key.mint_b.as_ref());
    }

    #[test]
    fn test_invalid_tick_spacing() {
        let err = deriver().derive(sol(), bonk(), 3).unwrap_err();
        assert!(matches!(err, WhirlpoolError::InvalidTickSpacing(3)));
        assert!(TickSpacing::try_from(0).is_err());
        assert_eq!(TickSpacing::try_from(32896).unwrap(), TickSpacing::FullRange);
    }

    #[test]
    fn test_distinct_spacings_give_distinct_addresses() {
        let keys = deriver().derive_all(sol(), bonk());
        assert_eq!(keys.len(), 10);
        let mut addresses: Vec<Pubkey> = keys.iter().map(|k| k.address()).collect();
        addresses.sort();
        addresses.dedup();
        assert_eq!(addresses.len(), 10);
    }

    #[test]
    fn test_tick_array_start_index() {
        assert_eq!(tick_array_start_index(0, 64), 0);
        assert_eq!(tick_array_start_index(5631, 64), 0);
        assert_eq!(tick_array_start_index(5632, 64), 5632);
        assert_eq!(tick_array_start_index(-1, 64), -5632);
        assert_eq!(tick_array_start_index(-5632, 64), -5632);
        assert_eq!(tick_array_start_index(-5633, 64), -11264);
    }
}
