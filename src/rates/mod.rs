/*
 * Rate comparison math
 *
 * Pure fixed-point arithmetic shared by the quote adapters and the provider
 * selector. All amounts are 18-decimal base units (wad); thresholds and
 * slippage are integer basis points. Multiplications always happen before
 * divisions so no precision is lost to intermediate rounding. Percentages
 * leave this module as `Decimal` for display only and are never fed back
 * into the integer math.
 */

use ethers::types::{I256, U256};
use rust_decimal::Decimal;

pub const WAD: U256 = U256([1_000_000_000_000_000_000, 0, 0, 0]);
pub const BPS_DENOMINATOR: u32 = 10_000;

/// Output per unit of input, scaled by 1e18. Zero input yields a zero rate.
#[must_use]
pub fn effective_rate(input_amount: U256, output_amount: U256) -> U256 {
    if input_amount.is_zero() {
        return U256::zero();
    }
    output_amount * WAD / input_amount
}

/// Signed percentage difference between two rates, positive when `rate_a` is
/// better. Computed as integer basis points `(a - b) * 10000 / b` and only
/// then scaled down to a 2-decimal percentage.
///
/// The denominator is always `rate_b`, so `f(a, b)` is not exactly
/// `-f(b, a)`; callers rely on the sign and magnitude, not on symmetry.
#[must_use]
pub fn rate_difference_percent(rate_a: U256, rate_b: U256) -> Decimal {
    if rate_b.is_zero() {
        if rate_a.is_zero() {
            return Decimal::ZERO;
        }
        return Decimal::from(100);
    }

    let a = I256::from_raw(rate_a);
    let b = I256::from_raw(rate_b);
    let diff_bps = (a - b) * I256::from(i64::from(BPS_DENOMINATOR)) / b;

    let bps = i64::try_from(diff_bps).unwrap_or(i64::MAX);
    Decimal::new(bps, 2)
}

/// Inclusive boundary: a difference of exactly `threshold_bps / 100` percent
/// counts as significant.
#[must_use]
pub fn is_difference_significant(percent: Decimal, threshold_bps: u32) -> bool {
    let threshold = Decimal::from(threshold_bps) / Decimal::from(100);
    percent.abs() >= threshold
}

/// Floor for an expected output under a slippage tolerance:
/// `output * (10000 - bps) / 10000`. Tolerances above 10000 bps clamp to a
/// zero floor rather than underflowing.
#[must_use]
pub fn min_output_with_slippage(output: U256, slippage_bps: u32) -> U256 {
    let bps = slippage_bps.min(BPS_DENOMINATOR);
    output * U256::from(BPS_DENOMINATOR - bps) / U256::from(BPS_DENOMINATOR)
}

/// Shaves a safety margin off a capacity or liquidity figure, same formula
/// as the slippage floor.
#[must_use]
pub fn apply_buffer(amount: U256, buffer_bps: u32) -> U256 {
    min_output_with_slippage(amount, buffer_bps)
}

/// Interest the vault accrues over a headroom window, used when checking
/// whether withdrawal liquidity covers a request that settles a few minutes
/// later. `rate_per_second_wad` is the per-second rate as a wad fraction of
/// principal. Non-positive windows accrue nothing.
#[must_use]
pub fn calculate_liquidity_buffer(
    principal: U256,
    rate_per_second_wad: U256,
    buffer_minutes: i64,
) -> U256 {
    if buffer_minutes <= 0 {
        return U256::zero();
    }
    #[allow(clippy::cast_sign_loss)]
    let seconds = U256::from(buffer_minutes as u64) * U256::from(60u64);
    principal * rate_per_second_wad * seconds / WAD
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn wad(n: u64) -> U256 {
        U256::from(n) * WAD
    }

    #[test]
    fn effective_rate_is_exact_integer_division() {
        assert_eq!(effective_rate(wad(10), wad(10)), WAD);
        assert_eq!(effective_rate(wad(2), wad(1)), WAD / 2);
        assert_eq!(
            effective_rate(U256::from(3u64), U256::from(1u64)),
            WAD / 3
        );
    }

    #[test]
    fn effective_rate_zero_input_yields_zero() {
        assert_eq!(effective_rate(U256::zero(), wad(5)), U256::zero());
    }

    #[test]
    fn rate_difference_sign_convention() {
        let better = effective_rate(wad(10_000), wad(10_020));
        let base = effective_rate(wad(10_000), wad(10_000));

        let diff = rate_difference_percent(better, base);
        assert!(diff > Decimal::ZERO);

        let diff = rate_difference_percent(base, better);
        assert!(diff < Decimal::ZERO);
    }

    #[test]
    fn rate_difference_degenerate_denominators() {
        assert_eq!(
            rate_difference_percent(U256::zero(), U256::zero()),
            Decimal::ZERO
        );
        assert_eq!(
            rate_difference_percent(WAD, U256::zero()),
            Decimal::from(100)
        );
    }

    #[test]
    fn rate_difference_is_asymmetric_by_construction() {
        // The denominator is always the second argument, so the two
        // directions differ slightly in magnitude. This is intentional.
        let a = wad(105);
        let b = wad(100);
        let forward = rate_difference_percent(a, b);
        let backward = rate_difference_percent(b, a);
        assert_eq!(forward, Decimal::from(5));
        assert_eq!(backward, Decimal::from_str("-4.76").unwrap());
    }

    #[test]
    fn significance_boundary_is_inclusive() {
        let threshold_bps = 10;
        let at_boundary = Decimal::from_str("0.1").unwrap();
        let below = Decimal::from_str("0.09").unwrap();

        assert!(is_difference_significant(at_boundary, threshold_bps));
        assert!(is_difference_significant(-at_boundary, threshold_bps));
        assert!(!is_difference_significant(below, threshold_bps));
    }

    #[test]
    fn slippage_floor_monotone_in_tolerance() {
        let x = wad(1_000);
        let mut prev = min_output_with_slippage(x, 0);
        assert_eq!(prev, x);
        for bps in [1, 10, 50, 100, 500, 2_500, 9_999, 10_000] {
            let floor = min_output_with_slippage(x, bps);
            assert!(floor <= prev);
            prev = floor;
        }
        assert_eq!(min_output_with_slippage(x, 10_000), U256::zero());
    }

    #[test]
    fn slippage_above_full_range_clamps() {
        assert_eq!(min_output_with_slippage(wad(7), 60_000), U256::zero());
    }

    #[test]
    fn liquidity_buffer_zero_for_nonpositive_window() {
        let rate = U256::from(1_000_000_000u64);
        assert_eq!(calculate_liquidity_buffer(wad(100), rate, 0), U256::zero());
        assert_eq!(
            calculate_liquidity_buffer(wad(100), rate, -5),
            U256::zero()
        );
    }

    #[test]
    fn liquidity_buffer_scales_with_window() {
        let rate = U256::from(1_000_000_000u64);
        let one = calculate_liquidity_buffer(wad(100), rate, 1);
        let ten = calculate_liquidity_buffer(wad(100), rate, 10);
        assert_eq!(ten, one * 10);
    }
}
