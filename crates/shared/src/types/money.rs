//! Money helpers with decimal precision.
//!
//! CRITICAL: Never use floating-point for money calculations.
//! All amounts are `rust_decimal::Decimal` values at currency scale.

use rust_decimal::{Decimal, RoundingStrategy};

/// Number of decimal places every stored amount carries (minor units).
pub const MONEY_SCALE: u32 = 2;

/// Smallest difference treated as a real imbalance or drift (one minor unit).
pub const BALANCE_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, MONEY_SCALE);

/// Rounds an amount to currency scale using Banker's Rounding.
#[must_use]
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointNearestEven)
}

/// Returns true if the amount has no more decimal places than `MONEY_SCALE`.
#[must_use]
pub fn has_money_scale(amount: Decimal) -> bool {
    amount.normalize().scale() <= MONEY_SCALE
}

/// Returns true if a difference is large enough to count as an imbalance.
#[must_use]
pub fn exceeds_tolerance(difference: Decimal) -> bool {
    difference.abs() >= BALANCE_TOLERANCE
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[test]
    fn test_tolerance_is_one_minor_unit() {
        assert_eq!(BALANCE_TOLERANCE, dec!(0.01));
    }

    #[rstest]
    #[case(dec!(10.005), dec!(10.00))]
    #[case(dec!(10.015), dec!(10.02))]
    #[case(dec!(-3.335), dec!(-3.34))]
    #[case(dec!(7), dec!(7))]
    fn test_round_money(#[case] input: Decimal, #[case] expected: Decimal) {
        assert_eq!(round_money(input), expected);
    }

    #[rstest]
    #[case(dec!(100), true)]
    #[case(dec!(100.10), true)]
    #[case(dec!(100.100), true)]
    #[case(dec!(100.001), false)]
    fn test_has_money_scale(#[case] amount: Decimal, #[case] expected: bool) {
        assert_eq!(has_money_scale(amount), expected);
    }

    #[rstest]
    #[case(dec!(0), false)]
    #[case(dec!(0.009), false)]
    #[case(dec!(0.01), true)]
    #[case(dec!(-0.01), true)]
    #[case(dec!(-250), true)]
    fn test_exceeds_tolerance(#[case] difference: Decimal, #[case] expected: bool) {
        assert_eq!(exceeds_tolerance(difference), expected);
    }
}
