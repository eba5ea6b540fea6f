//! Whirlpool Calculator
//!
//! Q64.64 concentrated-liquidity math: tick/price conversion, token amount
//! deltas between two prices, and the single-range swap step.

use num_bigint::BigUint;
use num_traits::{One, ToPrimitive, Zero};
use whirlroute_core::{MAX_TICK_INDEX, MIN_TICK_INDEX};

use crate::constants::fees::FEE_RATE_DENOMINATOR;
use crate::constants::sqrt_price::RESOLUTION;
use crate::state::MathError;

/// `sqrt(1.0001^-(2^i))` as Q128.128, for bit `i` of the absolute tick
const TICK_RATIOS: [u128; 20] = [
    0xfffcb933bd6fad37aa2d162d1a594001,
    0xfff97272373d413259a46990580e213a,
    0xfff2e50f5f656932ef12357cf3c7fdcc,
    0xffe5caca7e10e4e61c3624eaa0941cd0,
    0xffcb9843d60f6159c9db58835c926644,
    0xff973b41fa98c081472e6896dfb254c0,
    0xff2ea16466c96a3843ec78b326b52861,
    0xfe5dee046a99a2a811c461f1969c3053,
    0xfcbe86c7900a88aedcffc83b479aa3a4,
    0xf987a7253ac413176f2b074cf7815e54,
    0xf3392b0822b70005940c7a398e4b70f3,
    0xe7159475a2c29b7443b29c7fa6e889d9,
    0xd097f3bdfd2022b8845ad8f792aa5825,
    0xa9f746462d870fdf8a65dc1f90e061e5,
    0x70d869a156d2a1b890bb3df62baf32f7,
    0x31be135f97d08fd981231505542fcfa6,
    0x9aa508b5b7a84e1c677de54f3e99bc9,
    0x5d6af8dedb81196699c329225ee604,
    0x2216e584f5fa1ea926041bedfe98,
    0x48a170391f7dc42444e8fa2,
];

fn shr_round(value: BigUint, bits: u32, round_up: bool) -> BigUint {
    let shifted = value.clone() >> bits;
    if round_up && (shifted.clone() << bits) != value {
        shifted + BigUint::one()
    } else {
        shifted
    }
}

fn div_round(
    numerator: BigUint,
    denominator: &BigUint,
    round_up: bool,
    context: &'static str,
) -> Result<BigUint, MathError> {
    if denominator.is_zero() {
        return Err(MathError::DivideByZero(context));
    }
    let quotient = &numerator / denominator;
    if round_up && !(&numerator % denominator).is_zero() {
        Ok(quotient + BigUint::one())
    } else {
        Ok(quotient)
    }
}

fn saturating_u128(value: BigUint) -> u128 {
    value.to_u128().unwrap_or(u128::MAX)
}

fn to_u64(value: u128, context: &'static str) -> Result<u64, MathError> {
    u64::try_from(value).map_err(|_| MathError::Overflow(context))
}

/// Q64.64 sqrt price at the lower edge of `tick`
pub fn sqrt_price_at_tick(tick: i32) -> Result<u128, MathError> {
    if !(MIN_TICK_INDEX..=MAX_TICK_INDEX).contains(&tick) {
        return Err(MathError::TickOutOfRange(tick));
    }

    let abs_tick = tick.unsigned_abs();
    let mut ratio = BigUint::one() << 128u32;
    for (bit, factor) in TICK_RATIOS.iter().enumerate() {
        if abs_tick & (1u32 << bit) != 0 {
            ratio = (ratio * BigUint::from(*factor)) >> 128u32;
        }
    }
    if tick > 0 {
        let max_u256 = (BigUint::one() << 256u32) - BigUint::one();
        ratio = max_u256 / ratio;
    }

    shr_round(ratio, RESOLUTION, true)
        .to_u128()
        .ok_or(MathError::Overflow("sqrt_price_at_tick"))
}

/// Largest tick whose sqrt price does not exceed `sqrt_price`.
///
/// Prices below the minimum tick resolve to `MIN_TICK_INDEX`, prices above
/// the maximum tick to `MAX_TICK_INDEX`.
pub fn tick_at_sqrt_price(sqrt_price: u128) -> Result<i32, MathError> {
    if sqrt_price == 0 {
        return Err(MathError::SqrtPriceOutOfRange(sqrt_price));
    }

    let (mut low, mut high) = (MIN_TICK_INDEX, MAX_TICK_INDEX);
    while low < high {
        let mid = low + (high - low + 1) / 2;
        if sqrt_price_at_tick(mid)? <= sqrt_price {
            low = mid;
        } else {
            high = mid - 1;
        }
    }
    Ok(low)
}

/// Token A between two prices: `L * (upper - lower) / (upper * lower)`.
///
/// Saturates at `u128::MAX`.
pub fn amount_delta_a(
    sqrt_price_0: u128,
    sqrt_price_1: u128,
    liquidity: u128,
    round_up: bool,
) -> Result<u128, MathError> {
    let (lower, upper) = if sqrt_price_0 <= sqrt_price_1 {
        (sqrt_price_0, sqrt_price_1)
    } else {
        (sqrt_price_1, sqrt_price_0)
    };
    if liquidity == 0 || lower == upper {
        return Ok(0);
    }

    let numerator = (BigUint::from(liquidity) * BigUint::from(upper - lower)) << RESOLUTION;
    let denominator = BigUint::from(upper) * BigUint::from(lower);
    let delta = div_round(numerator, &denominator, round_up, "amount_delta_a")?;
    Ok(saturating_u128(delta))
}

/// Token B between two prices: `L * (upper - lower)`.
///
/// Saturates at `u128::MAX`.
pub fn amount_delta_b(
    sqrt_price_0: u128,
    sqrt_price_1: u128,
    liquidity: u128,
    round_up: bool,
) -> u128 {
    let diff = sqrt_price_0.abs_diff(sqrt_price_1);
    if liquidity == 0 || diff == 0 {
        return 0;
    }
    let product = BigUint::from(liquidity) * BigUint::from(diff);
    saturating_u128(shr_round(product, RESOLUTION, round_up))
}

fn next_sqrt_price_from_a_round_up(
    sqrt_price: u128,
    liquidity: u128,
    amount: u64,
    add: bool,
) -> Result<u128, MathError> {
    if amount == 0 {
        return Ok(sqrt_price);
    }

    let product = BigUint::from(sqrt_price) * BigUint::from(amount);
    let liquidity_x64 = BigUint::from(liquidity) << RESOLUTION;
    let numerator = &liquidity_x64 * BigUint::from(sqrt_price);
    let denominator = if add {
        liquidity_x64 + product
    } else {
        if product >= liquidity_x64 {
            return Err(MathError::Overflow("next_sqrt_price_from_a"));
        }
        liquidity_x64 - product
    };

    div_round(numerator, &denominator, true, "next_sqrt_price_from_a")?
        .to_u128()
        .ok_or(MathError::Overflow("next_sqrt_price_from_a"))
}

fn next_sqrt_price_from_b_round_down(
    sqrt_price: u128,
    liquidity: u128,
    amount: u64,
    add: bool,
) -> Result<u128, MathError> {
    let amount_x64 = BigUint::from(amount) << RESOLUTION;
    let delta = div_round(
        amount_x64,
        &BigUint::from(liquidity),
        !add,
        "next_sqrt_price_from_b",
    )?;
    let delta = delta
        .to_u128()
        .ok_or(MathError::Overflow("next_sqrt_price_from_b"))?;

    if add {
        sqrt_price
            .checked_add(delta)
            .ok_or(MathError::Overflow("next_sqrt_price_from_b"))
    } else {
        sqrt_price
            .checked_sub(delta)
            .ok_or(MathError::Overflow("next_sqrt_price_from_b"))
    }
}

/// Price after moving `amount` of the specified token through a range of
/// constant liquidity.
pub fn next_sqrt_price(
    sqrt_price: u128,
    liquidity: u128,
    amount: u64,
    amount_specified_is_input: bool,
    a_to_b: bool,
) -> Result<u128, MathError> {
    if amount_specified_is_input == a_to_b {
        next_sqrt_price_from_a_round_up(sqrt_price, liquidity, amount, amount_specified_is_input)
    } else {
        next_sqrt_price_from_b_round_down(sqrt_price, liquidity, amount, amount_specified_is_input)
    }
}

fn fixed_delta(
    current: u128,
    target: u128,
    liquidity: u128,
    amount_specified_is_input: bool,
    a_to_b: bool,
) -> Result<u128, MathError> {
    if a_to_b == amount_specified_is_input {
        amount_delta_a(current, target, liquidity, amount_specified_is_input)
    } else {
        Ok(amount_delta_b(current, target, liquidity, amount_specified_is_input))
    }
}

fn unfixed_delta(
    current: u128,
    next: u128,
    liquidity: u128,
    amount_specified_is_input: bool,
    a_to_b: bool,
) -> Result<u128, MathError> {
    if a_to_b == amount_specified_is_input {
        Ok(amount_delta_b(current, next, liquidity, !amount_specified_is_input))
    } else {
        amount_delta_a(current, next, liquidity, !amount_specified_is_input)
    }
}

/// Result of swapping within one constant-liquidity range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapStep {
    pub amount_in: u64,
    pub amount_out: u64,
    pub next_sqrt_price: u128,
    pub fee_amount: u64,
}

/// Swap up to `amount_remaining` from `sqrt_price_current` toward
/// `sqrt_price_target` without crossing a tick.
///
/// For exact input the fee is taken from `amount_remaining` before pricing.
/// `amount_in` never includes the fee.
pub fn compute_swap_step(
    amount_remaining: u64,
    fee_rate: u16,
    liquidity: u128,
    sqrt_price_current: u128,
    sqrt_price_target: u128,
    amount_specified_is_input: bool,
    a_to_b: bool,
) -> Result<SwapStep, MathError> {
    let fee_rate = fee_rate as u128;
    let amount_calc = if amount_specified_is_input {
        amount_remaining as u128 * (FEE_RATE_DENOMINATOR - fee_rate) / FEE_RATE_DENOMINATOR
    } else {
        amount_remaining as u128
    };

    let to_target = fixed_delta(
        sqrt_price_current,
        sqrt_price_target,
        liquidity,
        amount_specified_is_input,
        a_to_b,
    )?;

    let next_price = if to_target <= amount_calc {
        sqrt_price_target
    } else {
        next_sqrt_price(
            sqrt_price_current,
            liquidity,
            to_u64(amount_calc, "amount_calc")?,
            amount_specified_is_input,
            a_to_b,
        )?
    };
    let is_max_swap = next_price == sqrt_price_target;

    let fixed = if is_max_swap {
        to_target
    } else {
        fixed_delta(
            sqrt_price_current,
            next_price,
            liquidity,
            amount_specified_is_input,
            a_to_b,
        )?
    };
    let unfixed = unfixed_delta(
        sqrt_price_current,
        next_price,
        liquidity,
        amount_specified_is_input,
        a_to_b,
    )?;

    let (amount_in, mut amount_out) = if amount_specified_is_input {
        (fixed, unfixed)
    } else {
        (unfixed, fixed)
    };
    if !amount_specified_is_input && amount_out > amount_remaining as u128 {
        amount_out = amount_remaining as u128;
    }

    let amount_in = to_u64(amount_in, "amount_in")?;
    let amount_out = to_u64(amount_out, "amount_out")?;

    let fee_amount = if amount_specified_is_input && !is_max_swap {
        amount_remaining.saturating_sub(amount_in)
    } else {
        let fee = (amount_in as u128 * fee_rate).div_ceil(FEE_RATE_DENOMINATOR - fee_rate);
        to_u64(fee, "fee_amount")?
    };

    Ok(SwapStep {
        amount_in,
        amount_out,
        next_sqrt_price: next_price,
        fee_amount,
    })
}
