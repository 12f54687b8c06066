//! Materialized stock balance and weighted-average costing.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use millerp_core::amount::in_range;
use millerp_core::{BinId, DomainError, DomainResult, ItemId, StockShortfall, WarehouseId};

use crate::catalog::StockLocation;

/// Key of one balance row: (item, warehouse, bin-or-none).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BalanceKey {
    pub item_id: ItemId,
    pub warehouse_id: WarehouseId,
    pub bin_id: Option<BinId>,
}

impl BalanceKey {
    pub fn new(item_id: ItemId, location: StockLocation) -> Self {
        Self {
            item_id,
            warehouse_id: location.warehouse_id,
            bin_id: location.bin_id,
        }
    }

    pub fn location(&self) -> StockLocation {
        StockLocation::new(self.warehouse_id, self.bin_id)
    }
}

/// Quantity on hand (base unit) and weighted-average unit cost for one location.
///
/// Rows are created lazily on the first movement and never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockBalance {
    pub item_id: ItemId,
    pub warehouse_id: WarehouseId,
    pub bin_id: Option<BinId>,
    pub qty_on_hand: Decimal,
    pub avg_cost: Decimal,
    pub version: u64,
    pub updated_at: DateTime<Utc>,
}

impl StockBalance {
    pub fn empty(key: BalanceKey, at: DateTime<Utc>) -> Self {
        Self {
            item_id: key.item_id,
            warehouse_id: key.warehouse_id,
            bin_id: key.bin_id,
            qty_on_hand: Decimal::ZERO,
            avg_cost: Decimal::ZERO,
            version: 0,
            updated_at: at,
        }
    }

    pub fn key(&self) -> BalanceKey {
        BalanceKey {
            item_id: self.item_id,
            warehouse_id: self.warehouse_id,
            bin_id: self.bin_id,
        }
    }

    /// Apply a signed base-unit delta.
    ///
    /// Increases carrying a non-zero `unit_cost` re-average the cost. Decreases and
    /// zero-cost increases leave `avg_cost` untouched. A delta that would take the
    /// location below zero is rejected and `self` is left as it was.
    pub fn apply(
        &self,
        qty_delta: Decimal,
        unit_cost: Option<Decimal>,
        at: DateTime<Utc>,
    ) -> DomainResult<StockBalance> {
        if qty_delta.is_zero() {
            return Err(DomainError::validation("movement quantity cannot be zero"));
        }
        if let Some(cost) = unit_cost {
            if cost.is_sign_negative() {
                return Err(DomainError::validation("unit cost cannot be negative"));
            }
        }

        let new_qty = in_range(self.qty_on_hand.checked_add(qty_delta))?;
        if new_qty < Decimal::ZERO {
            return Err(DomainError::InsufficientStock(vec![StockShortfall {
                line_no: 0,
                item_id: self.item_id,
                unit_code: String::new(),
                requested: -qty_delta,
                available: self.qty_on_hand,
            }]));
        }

        let avg_cost = match unit_cost {
            Some(cost) if qty_delta > Decimal::ZERO && !cost.is_zero() => {
                weighted_average_cost(self.qty_on_hand, self.avg_cost, qty_delta, cost)?
            }
            _ => self.avg_cost,
        };

        Ok(StockBalance {
            qty_on_hand: new_qty,
            avg_cost,
            version: self.version + 1,
            updated_at: at,
            ..self.clone()
        })
    }

    /// Stock value at average cost (unrounded).
    pub fn value(&self) -> Decimal {
        self.qty_on_hand * self.avg_cost
    }
}

/// `(qty_before * avg_before + qty_in * cost_in) / (qty_before + qty_in)`.
///
/// An empty prior balance takes `cost_in` directly.
pub fn weighted_average_cost(
    qty_before: Decimal,
    avg_before: Decimal,
    qty_in: Decimal,
    cost_in: Decimal,
) -> DomainResult<Decimal> {
    if qty_before <= Decimal::ZERO {
        return Ok(cost_in);
    }
    let total_qty = in_range(qty_before.checked_add(qty_in))?;
    if total_qty.is_zero() {
        return Ok(cost_in);
    }
    let value_before = in_range(qty_before.checked_mul(avg_before))?;
    let value_in = in_range(qty_in.checked_mul(cost_in))?;
    in_range(in_range(value_before.checked_add(value_in))?.checked_div(total_qty))
}

/// Result of an availability check, both figures in base units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Availability {
    pub available: bool,
    pub current_qty: Decimal,
}

impl Availability {
    pub fn check(current_qty: Decimal, required_qty: Decimal) -> Self {
        Self {
            available: current_qty >= required_qty,
            current_qty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn balance(qty: Decimal, avg: Decimal) -> StockBalance {
        let key = BalanceKey {
            item_id: ItemId::new(),
            warehouse_id: WarehouseId::new(),
            bin_id: None,
        };
        StockBalance {
            qty_on_hand: qty,
            avg_cost: avg,
            ..StockBalance::empty(key, Utc::now())
        }
    }

    #[test]
    fn first_costed_receipt_takes_incoming_cost() {
        let b = balance(dec!(0), dec!(0))
            .apply(dec!(20), Some(dec!(500)), Utc::now())
            .unwrap();
        assert_eq!(b.qty_on_hand, dec!(20));
        assert_eq!(b.avg_cost, dec!(500));
        assert_eq!(b.version, 1);
    }

    #[test]
    fn costed_receipt_reaverages() {
        let b = balance(dec!(100), dec!(10))
            .apply(dec!(100), Some(dec!(20)), Utc::now())
            .unwrap();
        assert_eq!(b.avg_cost, dec!(15));
    }

    #[test]
    fn zero_cost_return_keeps_average() {
        let b = balance(dec!(150), dec!(1000))
            .apply(dec!(10), Some(dec!(0)), Utc::now())
            .unwrap();
        assert_eq!(b.qty_on_hand, dec!(160));
        assert_eq!(b.avg_cost, dec!(1000));
    }

    #[test]
    fn outbound_keeps_average() {
        let b = balance(dec!(200), dec!(1000))
            .apply(dec!(-50), None, Utc::now())
            .unwrap();
        assert_eq!(b.qty_on_hand, dec!(150));
        assert_eq!(b.avg_cost, dec!(1000));
    }

    #[test]
    fn overdraw_reports_shortfall() {
        let before = balance(dec!(5), dec!(3));
        let err = before.apply(dec!(-8), None, Utc::now()).unwrap_err();
        match err {
            DomainError::InsufficientStock(lines) => {
                assert_eq!(lines[0].requested, dec!(8));
                assert_eq!(lines[0].available, dec!(5));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(before.qty_on_hand, dec!(5));
    }

    #[test]
    fn receipt_past_decimal_range_is_rejected() {
        let full = balance(Decimal::MAX, dec!(0));
        let err = full.apply(dec!(1), None, Utc::now()).unwrap_err();
        assert_eq!(err, DomainError::validation("quantity out of range"));
        assert_eq!(full.qty_on_hand, Decimal::MAX);
    }

    #[test]
    fn costed_receipt_with_unrepresentable_value_is_rejected() {
        let err = balance(dec!(10), dec!(5))
            .apply(dec!(10), Some(Decimal::MAX), Utc::now())
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[test]
    fn zero_delta_is_rejected() {
        let err = balance(dec!(5), dec!(3))
            .apply(Decimal::ZERO, None, Utc::now())
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    proptest! {
        #[test]
        fn average_stays_between_old_and_incoming_cost(
            qty_before in 1u32..10_000,
            avg_before in 0u32..100_000,
            qty_in in 1u32..10_000,
            cost_in in 0u32..100_000,
        ) {
            let avg = weighted_average_cost(
                Decimal::from(qty_before),
                Decimal::from(avg_before),
                Decimal::from(qty_in),
                Decimal::from(cost_in),
            ).unwrap();
            let lo = Decimal::from(avg_before.min(cost_in));
            let hi = Decimal::from(avg_before.max(cost_in));
            prop_assert!(avg >= lo && avg <= hi);
        }

        #[test]
        fn balance_never_goes_negative(
            deltas in proptest::collection::vec(-500i64..500, 1..50)
        ) {
            let mut b = balance(Decimal::ZERO, Decimal::ZERO);
            let mut sum = Decimal::ZERO;
            for d in deltas.into_iter().filter(|d| *d != 0) {
                let delta = Decimal::from(d);
                match b.apply(delta, Some(dec!(1)), Utc::now()) {
                    Ok(next) => {
                        sum += delta;
                        b = next;
                    }
                    Err(DomainError::InsufficientStock(_)) => {
                        prop_assert!(b.qty_on_hand + delta < Decimal::ZERO);
                    }
                    Err(other) => prop_assert!(false, "unexpected error: {:?}", other),
                }
                prop_assert!(b.qty_on_hand >= Decimal::ZERO);
            }
            prop_assert_eq!(b.qty_on_hand, sum);
        }
    }
}
