//! Append-only stock movement ledger.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use millerp_core::{BinId, DomainError, DomainResult, ItemId, LedgerEntryId, UserId, WarehouseId};

use crate::balance::BalanceKey;
use crate::catalog::StockLocation;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReferenceType {
    In,
    Out,
    Adj,
}

impl ReferenceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceType::In => "IN",
            ReferenceType::Out => "OUT",
            ReferenceType::Adj => "ADJ",
        }
    }
}

impl core::str::FromStr for ReferenceType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "IN" => Ok(ReferenceType::In),
            "OUT" => Ok(ReferenceType::Out),
            "ADJ" => Ok(ReferenceType::Adj),
            other => Err(DomainError::validation(format!(
                "unknown reference type: {other}"
            ))),
        }
    }
}

/// One immutable ledger row. `qty_delta` is signed and in base units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockLedgerEntry {
    pub id: LedgerEntryId,
    pub occurred_at: DateTime<Utc>,
    pub item_id: ItemId,
    pub warehouse_id: WarehouseId,
    pub bin_id: Option<BinId>,
    pub reference_type: ReferenceType,
    /// Id of the movement document that produced this row.
    pub reference_id: Uuid,
    pub qty_delta: Decimal,
    pub unit_cost: Decimal,
    pub note: Option<String>,
    pub created_by: UserId,
}

impl StockLedgerEntry {
    pub fn key(&self) -> BalanceKey {
        BalanceKey {
            item_id: self.item_id,
            warehouse_id: self.warehouse_id,
            bin_id: self.bin_id,
        }
    }
}

/// Request to move stock in or out of one location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Movement {
    pub item_id: ItemId,
    pub location: StockLocation,
    pub qty_delta: Decimal,
    /// Cost per base unit. `None` on outbound records the current average.
    pub unit_cost: Option<Decimal>,
    pub reference_type: ReferenceType,
    pub reference_id: Uuid,
    pub note: Option<String>,
    pub actor: UserId,
    pub occurred_at: DateTime<Utc>,
}

impl Movement {
    pub fn validate(&self) -> DomainResult<()> {
        if self.qty_delta.is_zero() {
            return Err(DomainError::validation("movement quantity cannot be zero"));
        }
        match self.reference_type {
            ReferenceType::In if self.qty_delta < Decimal::ZERO => Err(DomainError::validation(
                "IN movement must carry a positive quantity",
            )),
            ReferenceType::Out if self.qty_delta > Decimal::ZERO => Err(DomainError::validation(
                "OUT movement must carry a negative quantity",
            )),
            _ => Ok(()),
        }
    }

    pub fn key(&self) -> BalanceKey {
        BalanceKey::new(self.item_id, self.location)
    }
}

/// Sum of deltas for `key` across `entries`.
pub fn replay_quantity<'a>(
    key: &BalanceKey,
    entries: impl IntoIterator<Item = &'a StockLedgerEntry>,
) -> Decimal {
    entries
        .into_iter()
        .filter(|e| e.key() == *key)
        .map(|e| e.qty_delta)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn entry(key: BalanceKey, delta: Decimal) -> StockLedgerEntry {
        StockLedgerEntry {
            id: LedgerEntryId::new(),
            occurred_at: Utc::now(),
            item_id: key.item_id,
            warehouse_id: key.warehouse_id,
            bin_id: key.bin_id,
            reference_type: if delta > Decimal::ZERO {
                ReferenceType::In
            } else {
                ReferenceType::Out
            },
            reference_id: Uuid::now_v7(),
            qty_delta: delta,
            unit_cost: dec!(1),
            note: None,
            created_by: UserId::new(),
        }
    }

    #[test]
    fn replay_only_counts_matching_location() {
        let a = BalanceKey {
            item_id: ItemId::new(),
            warehouse_id: WarehouseId::new(),
            bin_id: None,
        };
        let b = BalanceKey {
            bin_id: Some(BinId::new()),
            ..a
        };
        let entries = vec![
            entry(a, dec!(200)),
            entry(b, dec!(10)),
            entry(a, dec!(-50)),
        ];
        assert_eq!(replay_quantity(&a, &entries), dec!(150));
        assert_eq!(replay_quantity(&b, &entries), dec!(10));
    }

    #[test]
    fn reference_type_parses_case_insensitively() {
        assert_eq!("out".parse::<ReferenceType>().unwrap(), ReferenceType::Out);
        assert!("MOVE".parse::<ReferenceType>().is_err());
    }

    #[test]
    fn movement_sign_must_match_reference_type() {
        let m = Movement {
            item_id: ItemId::new(),
            location: StockLocation::new(WarehouseId::new(), None),
            qty_delta: dec!(5),
            unit_cost: None,
            reference_type: ReferenceType::Out,
            reference_id: Uuid::now_v7(),
            note: None,
            actor: UserId::new(),
            occurred_at: Utc::now(),
        };
        assert!(m.validate().is_err());
    }
}
