//! Single-Pool Quoter
//!
//! Walks a pool snapshot's initialized ticks from the current price,
//! applying one [`compute_swap_step`] per constant-liquidity range.

use whirlroute_core::{Percentage, PoolState, Pubkey, TickEntry, TickWindow};

use crate::calculator::{compute_swap_step, sqrt_price_at_tick, tick_at_sqrt_price};
use crate::constants::sqrt_price::{MAX_SQRT_PRICE_X64, MIN_SQRT_PRICE_X64};
use crate::state::{Fill, MathError, Quote, WhirlpoolError};

/// Totals produced by [`swap`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapResult {
    /// Includes fees
    pub amount_in: u64,
    pub amount_out: u64,
    pub fee_amount: u64,
    pub end_sqrt_price: u128,
    pub end_tick_index: i32,
    /// Part of the specified amount the walk could not place
    pub amount_remaining: u64,
}

/// Next initialized tick in the swap direction, or the window edge if none
/// is left. Returns `(tick, initialized)`.
fn next_tick(
    ticks: &[TickEntry],
    window: &TickWindow,
    tick_current: i32,
    a_to_b: bool,
) -> (i32, Option<i128>) {
    if a_to_b {
        ticks
            .iter()
            .rev()
            .find(|t| t.index <= tick_current && t.index >= window.lower)
            .map(|t| (t.index, Some(t.liquidity_net)))
            .unwrap_or((window.lower, None))
    } else {
        ticks
            .iter()
            .find(|t| t.index > tick_current && t.index <= window.upper)
            .map(|t| (t.index, Some(t.liquidity_net)))
            .unwrap_or((window.upper, None))
    }
}

fn cross_tick(liquidity: u128, net: i128, tick: i32, a_to_b: bool) -> Result<u128, MathError> {
    // Moving down removes the range that starts at this tick
    let delta = if a_to_b { net.checked_neg() } else { Some(net) }
        .ok_or(MathError::LiquidityUnderflow { tick })?;
    if delta >= 0 {
        liquidity
            .checked_add(delta.unsigned_abs())
            .ok_or(MathError::Overflow("cross_tick"))
    } else {
        liquidity
            .checked_sub(delta.unsigned_abs())
            .ok_or(MathError::LiquidityUnderflow { tick })
    }
}

/// Simulate a swap of `amount` through `pool`.
///
/// Stops when the amount is used up, the price limit is hit, or the loaded
/// tick window runs out. `sqrt_price_limit` defaults to the protocol bound.
pub fn swap(
    pool: &PoolState,
    amount: u64,
    a_to_b: bool,
    amount_specified_is_input: bool,
    sqrt_price_limit: Option<u128>,
) -> Result<SwapResult, MathError> {
    let limit = sqrt_price_limit.unwrap_or(if a_to_b {
        MIN_SQRT_PRICE_X64
    } else {
        MAX_SQRT_PRICE_X64
    });

    let mut remaining = amount;
    let mut calculated: u64 = 0;
    let mut fees: u64 = 0;
    let mut sqrt_price = pool.sqrt_price;
    let mut tick_current = pool.tick_current_index;
    let mut liquidity = pool.liquidity;

    while remaining > 0 && sqrt_price != limit {
        let (tick, net) = next_tick(&pool.ticks, &pool.tick_window, tick_current, a_to_b);
        let tick_price = sqrt_price_at_tick(tick)?;
        let target = if a_to_b {
            tick_price.max(limit)
        } else {
            tick_price.min(limit)
        };
        // Already past the target; nothing reachable in this direction
        if (a_to_b && target > sqrt_price) || (!a_to_b && target < sqrt_price) {
            break;
        }

        let step = compute_swap_step(
            remaining,
            pool.fee_rate,
            liquidity,
            sqrt_price,
            target,
            amount_specified_is_input,
            a_to_b,
        )?;

        if amount_specified_is_input {
            remaining = remaining
                .checked_sub(step.amount_in + step.fee_amount)
                .ok_or(MathError::Overflow("amount_remaining"))?;
            calculated = calculated
                .checked_add(step.amount_out)
                .ok_or(MathError::Overflow("amount_out"))?;
        } else {
            remaining = remaining
                .checked_sub(step.amount_out)
                .ok_or(MathError::Overflow("amount_remaining"))?;
            calculated = calculated
                .checked_add(step.amount_in)
                .and_then(|v| v.checked_add(step.fee_amount))
                .ok_or(MathError::Overflow("amount_in"))?;
        }
        fees = fees.saturating_add(step.fee_amount);

        let moved = step.next_sqrt_price != sqrt_price;
        if step.next_sqrt_price == tick_price {
            match net {
                Some(net) => {
                    liquidity = cross_tick(liquidity, net, tick, a_to_b)?;
                    tick_current = if a_to_b { tick - 1 } else { tick };
                }
                None => {
                    // Edge of the loaded window
                    sqrt_price = step.next_sqrt_price;
                    tick_current = if a_to_b { tick - 1 } else { tick };
                    break;
                }
            }
        } else if moved {
            tick_current = tick_at_sqrt_price(step.next_sqrt_price)?;
        } else if step.amount_in == 0 && step.amount_out == 0 {
            // Too small to move the price
            break;
        }
        sqrt_price = step.next_sqrt_price;
    }

    let (amount_in, amount_out) = if amount_specified_is_input {
        (amount - remaining, calculated)
    } else {
        (calculated, amount - remaining)
    };

    Ok(SwapResult {
        amount_in,
        amount_out,
        fee_amount: fees,
        end_sqrt_price: sqrt_price,
        end_tick_index: tick_current,
        amount_remaining: remaining,
    })
}

fn check_quotable(pool: &PoolState, mint: &Pubkey, amount: u64) -> Result<(), WhirlpoolError> {
    if amount == 0 {
        return Err(WhirlpoolError::ZeroAmount);
    }
    if !pool.contains_mint(mint) {
        return Err(WhirlpoolError::InvalidToken {
            pool: pool.address,
            mint: *mint,
        });
    }
    if !pool.has_liquidity() {
        return Err(WhirlpoolError::NoLiquidity { pool: pool.address });
    }
    Ok(())
}

fn fill_for(remaining: u64) -> Fill {
    if remaining == 0 {
        Fill::Complete
    } else {
        Fill::Insufficient {
            unfilled: remaining,
        }
    }
}

/// Quote selling exactly `amount` of `token_in`.
pub fn quote_exact_in(
    pool: &PoolState,
    token_in: &Pubkey,
    amount: u64,
    slippage: Percentage,
) -> Result<Quote, WhirlpoolError> {
    check_quotable(pool, token_in, amount)?;
    let a_to_b = *token_in == pool.token_mint_a;
    let token_out = if a_to_b {
        pool.token_mint_b
    } else {
        pool.token_mint_a
    };

    let result = swap(pool, amount, a_to_b, true, None)?;

    Ok(Quote {
        pool: pool.address,
        token_in: *token_in,
        token_out,
        a_to_b,
        amount_specified_is_input: true,
        requested_amount: amount,
        estimated_amount_in: result.amount_in,
        estimated_amount_out: result.amount_out,
        other_amount_threshold: slippage.adjust_down(result.amount_out),
        estimated_fee_amount: result.fee_amount,
        estimated_end_sqrt_price: result.end_sqrt_price,
        estimated_end_tick_index: result.end_tick_index,
        fill: fill_for(result.amount_remaining),
    })
}

/// Quote buying exactly `amount` of `token_out`.
pub fn quote_exact_out(
    pool: &PoolState,
    token_out: &Pubkey,
    amount: u64,
    slippage: Percentage,
) -> Result<Quote, WhirlpoolError> {
    check_quotable(pool, token_out, amount)?;
    let a_to_b = *token_out == pool.token_mint_b;
    let token_in = if a_to_b {
        pool.token_mint_a
    } else {
        pool.token_mint_b
    };

    let result = swap(pool, amount, a_to_b, false, None)?;

    Ok(Quote {
        pool: pool.address,
        token_in,
        token_out: *token_out,
        a_to_b,
        amount_specified_is_input: false,
        requested_amount: amount,
        estimated_amount_in: result.amount_in,
        estimated_amount_out: result.amount_out,
        other_amount_threshold: slippage.adjust_up(result.amount_in),
        estimated_fee_amount: result.fee_amount,
        estimated_end_sqrt_price: result.end_sqrt_price,
        estimated_end_tick_index: result.end_tick_index,
        fill: fill_for(result.amount_remaining),
    })
}
