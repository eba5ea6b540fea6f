//! Whirlpool State Types
//!
//! Trade requests, quotes, and protocol errors.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use whirlroute_core::{Percentage, Pubkey, ReaderError};

/// A swap the caller wants priced or routed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeSpec {
    pub token_in: Pubkey,
    pub token_out: Pubkey,
    /// Base units of `token_in` (exact input) or `token_out` (exact output)
    pub amount: u64,
    pub amount_specified_is_input: bool,
    pub slippage: Percentage,
}

impl TradeSpec {
    pub fn exact_in(token_in: Pubkey, token_out: Pubkey, amount: u64, slippage: Percentage) -> Self {
        Self {
            token_in,
            token_out,
            amount,
            amount_specified_is_input: true,
            slippage,
        }
    }

    pub fn exact_out(
        token_in: Pubkey,
        token_out: Pubkey,
        amount: u64,
        slippage: Percentage,
    ) -> Self {
        Self {
            token_in,
            token_out,
            amount,
            amount_specified_is_input: false,
            slippage,
        }
    }

    pub fn validate(&self) -> Result<(), WhirlpoolError> {
        if self.amount == 0 {
            return Err(WhirlpoolError::ZeroAmount);
        }
        if self.token_in == self.token_out {
            return Err(WhirlpoolError::InvalidTrade(format!(
                "input and output token are both {}",
                self.token_in
            )));
        }
        Ok(())
    }
}

/// Slippage tolerance from basis points (50 = 0.5%)
pub fn slippage_from_bps(bps: u16) -> Result<Percentage, WhirlpoolError> {
    Percentage::from_bps(bps).map_err(|e| WhirlpoolError::InvalidSlippage(e.to_string()))
}

/// Whether a quote consumed the whole specified amount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Fill {
    Complete,
    /// The pool ran out of reachable liquidity with `unfilled` base units left
    Insufficient { unfilled: u64 },
}

/// Single-pool swap estimate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub pool: Pubkey,
    pub token_in: Pubkey,
    pub token_out: Pubkey,
    pub a_to_b: bool,
    pub amount_specified_is_input: bool,
    pub requested_amount: u64,
    pub estimated_amount_in: u64,
    pub estimated_amount_out: u64,
    /// Minimum output (exact input) or maximum input (exact output) after slippage
    pub other_amount_threshold: u64,
    pub estimated_fee_amount: u64,
    pub estimated_end_sqrt_price: u128,
    pub estimated_end_tick_index: i32,
    pub fill: Fill,
}

impl Quote {
    pub fn is_complete(&self) -> bool {
        self.fill == Fill::Complete
    }
}

impl fmt::Display for Quote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} in -> {} out (threshold {}) via {}",
            self.estimated_amount_in,
            self.estimated_amount_out,
            self.other_amount_threshold,
            self.pool
        )?;
        if let Fill::Insufficient { unfilled } = self.fill {
            write!(f, " [insufficient fill, {} unfilled]", unfilled)?;
        }
        Ok(())
    }
}

/// Fixed-point math failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MathError {
    #[error("Tick index {0} outside supported range")]
    TickOutOfRange(i32),

    #[error("Sqrt price {0} outside supported range")]
    SqrtPriceOutOfRange(u128),

    #[error("Arithmetic overflow in {0}")]
    Overflow(&'static str),

    #[error("Division by zero in {0}")]
    DivideByZero(&'static str),

    #[error("Liquidity underflow crossing tick {tick}")]
    LiquidityUnderflow { tick: i32 },
}

/// Whirlpool protocol errors
#[derive(Debug, Error)]
pub enum WhirlpoolError {
    #[error("Unsupported tick spacing: {0}")]
    InvalidTickSpacing(u16),

    #[error("Pool discovery unavailable: {0}")]
    DiscoveryUnavailable(#[from] ReaderError),

    #[error("Reader answered without {} requested pool(s)", missing.len())]
    IncompleteBatch { missing: Vec<Pubkey> },

    #[error("No Whirlpool account at {address}")]
    PoolNotFound { address: Pubkey },

    #[error("Pool {pool} has no liquidity")]
    NoLiquidity { pool: Pubkey },

    #[error("Token {mint} is not part of pool {pool}")]
    InvalidToken { pool: Pubkey, mint: Pubkey },

    #[error("Trade amount must be greater than zero")]
    ZeroAmount,

    #[error("Invalid slippage tolerance: {0}")]
    InvalidSlippage(String),

    #[error("Invalid trade: {0}")]
    InvalidTrade(String),

    #[error("Math error: {0}")]
    Math(#[from] MathError),

    #[error("Core error: {0}")]
    Core(#[from] whirlroute_core::Error),
}

impl WhirlpoolError {
    /// Stable machine-readable code
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidTickSpacing(_) => "invalid_tick_spacing",
            Self::DiscoveryUnavailable(_) => "discovery_unavailable",
            Self::IncompleteBatch { .. } => "incomplete_batch",
            Self::PoolNotFound { .. } => "pool_not_found",
            Self::NoLiquidity { .. } => "no_liquidity",
            Self::InvalidToken { .. } => "invalid_token",
            Self::ZeroAmount => "zero_amount",
            Self::InvalidSlippage(_) => "invalid_slippage",
            Self::InvalidTrade(_) => "invalid_trade",
            Self::Math(_) => "math_error",
            Self::Core(_) => "core_error",
        }
    }

    /// Whether retrying the same request later may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::DiscoveryUnavailable(e) => e.is_retryable(),
            Self::IncompleteBatch { .. } => true,
            _ => false,
        }
    }
}
