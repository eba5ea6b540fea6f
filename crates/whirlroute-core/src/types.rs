//! Core type definitions for Whirlroute

use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

pub use solana_program::pubkey::Pubkey;

/// Lowest tick index a Whirlpool can reach
pub const MIN_TICK_INDEX: i32 = -443_636;

/// Highest tick index a Whirlpool can reach
pub const MAX_TICK_INDEX: i32 = 443_636;

/// Token mint plus its decimal precision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Token {
    pub mint: Pubkey,
    pub decimals: u8,
}

impl Token {
    pub fn new(mint: Pubkey, decimals: u8) -> Self {
        Self { mint, decimals }
    }

    /// Convert a UI decimal string ("1.5") to base units.
    pub fn parse_ui_amount(&self, ui_amount: &str) -> Result<u64> {
        let trimmed = ui_amount.trim();
        let (whole, frac) = trimmed.split_once('.').unwrap_or((trimmed, ""));

        let invalid = |message: String| Error::InvalidAmount { message };

        if whole.is_empty() && frac.is_empty() {
            return Err(invalid(format!("'{}' is not a number", ui_amount)));
        }
        if !whole.bytes().all(|b| b.is_ascii_digit()) || !frac.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid(format!("'{}' is not a number", ui_amount)));
        }
        if frac.len() > self.decimals as usize {
            return Err(invalid(format!(
                "'{}' has more than {} decimal places",
                ui_amount, self.decimals
            )));
        }

        let overflow = || invalid(format!("'{}' does not fit in a u64", ui_amount));

        let scale = 10u128
            .checked_pow(self.decimals as u32)
            .ok_or_else(overflow)?;
        let whole_units: u128 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| overflow())?
        };
        let frac_units: u128 = if frac.is_empty() {
            0
        } else {
            let padded = format!("{:0<width$}", frac, width = self.decimals as usize);
            padded.parse().map_err(|_| overflow())?
        };

        let total = whole_units
            .checked_mul(scale)
            .and_then(|v| v.checked_add(frac_units))
            .ok_or_else(overflow)?;
        u64::try_from(total).map_err(|_| overflow())
    }

    /// Render base units as a UI decimal string, trimming trailing zeros.
    pub fn format_ui_amount(&self, raw: u64) -> String {
        let decimals = self.decimals as usize;
        if decimals == 0 {
            return raw.to_string();
        }
        let digits = format!("{:0>width$}", raw, width = decimals + 1);
        let (whole, frac) = digits.split_at(digits.len() - decimals);
        let frac = frac.trim_end_matches('0');
        if frac.is_empty() {
            whole.to_string()
        } else {
            format!("{}.{}", whole, frac)
        }
    }
}

/// Rational percentage, e.g. slippage tolerance of 10/1000 = 1%
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawPercentage")]
pub struct Percentage {
    numerator: u64,
    denominator: u64,
}

#[derive(Deserialize)]
struct RawPercentage {
    numerator: u64,
    denominator: u64,
}

impl TryFrom<RawPercentage> for Percentage {
    type Error = Error;

    fn try_from(raw: RawPercentage) -> Result<Self> {
        Self::from_fraction(raw.numerator, raw.denominator)
    }
}

impl Percentage {
    pub fn from_fraction(numerator: u64, denominator: u64) -> Result<Self> {
        if denominator == 0 || numerator > denominator {
            return Err(Error::InvalidPercentage {
                numerator,
                denominator,
            });
        }
        Ok(Self {
            numerator,
            denominator,
        })
    }

    /// Basis points (50 = 0.5%)
    pub fn from_bps(bps: u16) -> Result<Self> {
        Self::from_fraction(bps as u64, 10_000)
    }

    pub fn zero() -> Self {
        Self {
            numerator: 0,
            denominator: 1,
        }
    }

    pub fn numerator(&self) -> u64 {
        self.numerator
    }

    pub fn denominator(&self) -> u64 {
        self.denominator
    }

    /// `amount * (1 - self)`, rounded down
    pub fn adjust_down(&self, amount: u64) -> u64 {
        let keep = (self.denominator - self.numerator) as u128;
        (amount as u128 * keep / self.denominator as u128) as u64
    }

    /// `amount * (1 + self)`, rounded up and saturating at `u64::MAX`
    pub fn adjust_up(&self, amount: u64) -> u64 {
        let grow = self.denominator as u128 + self.numerator as u128;
        let scaled = amount as u128 * grow;
        let denom = self.denominator as u128;
        let result = scaled.div_ceil(denom);
        u64::try_from(result).unwrap_or(u64::MAX)
    }

    pub fn as_percent(&self) -> f64 {
        self.numerator as f64 / self.denominator as f64 * 100.0
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}%", self.as_percent())
    }
}

/// Initialized tick boundary: crossing it upward adds `liquidity_net`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TickEntry {
    pub index: i32,
    pub liquidity_net: i128,
}

/// Inclusive tick range whose tick data was loaded into a snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TickWindow {
    pub lower: i32,
    pub upper: i32,
}

impl TickWindow {
    pub const FULL: TickWindow = TickWindow {
        lower: MIN_TICK_INDEX,
        upper: MAX_TICK_INDEX,
    };

    pub fn contains(&self, tick: i32) -> bool {
        (self.lower..=self.upper).contains(&tick)
    }
}

impl Default for TickWindow {
    fn default() -> Self {
        Self::FULL
    }
}

/// Summary hash of a pool snapshot, used to key cached quotes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PoolFingerprint(pub u64);

impl fmt::Display for PoolFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Immutable snapshot of a Whirlpool's swap-relevant state
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PoolState {
    pub address: Pubkey,
    pub whirlpools_config: Pubkey,
    pub token_mint_a: Pubkey,
    pub token_mint_b: Pubkey,
    pub tick_spacing: u16,
    /// Hundredths of a basis point (3000 = 0.30%)
    pub fee_rate: u16,
    pub liquidity: u128,
    /// Q64.64
    pub sqrt_price: u128,
    pub tick_current_index: i32,
    /// Initialized ticks, ascending by index
    pub ticks: Vec<TickEntry>,
    #[serde(default)]
    pub tick_window: TickWindow,
}

impl PoolState {
    pub fn has_liquidity(&self) -> bool {
        self.liquidity > 0
    }

    pub fn contains_mint(&self, mint: &Pubkey) -> bool {
        self.token_mint_a == *mint || self.token_mint_b == *mint
    }

    /// The opposite side of the pair, if `mint` belongs to this pool
    pub fn other_mint(&self, mint: &Pubkey) -> Option<Pubkey> {
        if *mint == self.token_mint_a {
            Some(self.token_mint_b)
        } else if *mint == self.token_mint_b {
            Some(self.token_mint_a)
        } else {
            None
        }
    }

    pub fn fingerprint(&self) -> PoolFingerprint {
        let mut hasher = DefaultHasher::new();
        self.hash(&mut hasher);
        PoolFingerprint(hasher.finish())
    }
}

impl fmt::Display for PoolState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Whirlpool {} | ts {} | L {} | tick {}",
            self.address, self.tick_spacing, self.liquidity, self.tick_current_index
        )
    }
}
