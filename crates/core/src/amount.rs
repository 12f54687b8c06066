//! Currency and quantity arithmetic shared by the stock and GL layers.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::{DomainError, DomainResult};

/// Maximum |Σdebit − Σcredit| accepted for a journal entry.
pub const BALANCE_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Currency amounts carry two decimal places.
pub const CURRENCY_SCALE: u32 = 2;

/// Round a monetary value to currency precision (half away from zero).
pub fn round_currency(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(CURRENCY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Result of a checked `Decimal` operation; overflow is rejected as bad input.
pub fn in_range(value: Option<Decimal>) -> DomainResult<Decimal> {
    value.ok_or_else(|| DomainError::validation("quantity out of range"))
}

/// True when two monetary totals are equal within [`BALANCE_TOLERANCE`].
pub fn within_tolerance(a: Decimal, b: Decimal) -> bool {
    (a - b).abs() <= BALANCE_TOLERANCE
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn tolerance_is_one_cent() {
        assert_eq!(BALANCE_TOLERANCE, dec!(0.01));
        assert!(within_tolerance(dec!(100.00), dec!(100.01)));
        assert!(!within_tolerance(dec!(100.00), dec!(100.02)));
    }

    #[test]
    fn currency_rounds_half_away_from_zero() {
        assert_eq!(round_currency(dec!(1.005)), dec!(1.01));
        assert_eq!(round_currency(dec!(-1.005)), dec!(-1.01));
    }

    #[test]
    fn overflow_is_a_validation_error() {
        assert_eq!(in_range(dec!(2).checked_mul(dec!(3))).unwrap(), dec!(6));
        let err = in_range(Decimal::MAX.checked_add(Decimal::ONE)).unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }
}
