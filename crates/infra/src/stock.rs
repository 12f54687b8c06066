//! Stock ledger and balance engine.
//!
//! Owns all quantity/cost arithmetic on the materialized balance. Every change appends
//! exactly one ledger row with the same delta, in the same transaction.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use millerp_core::{BinId, DomainError, DomainResult, ItemId, LedgerEntryId, WarehouseId};
use millerp_inventory::{
    Availability, BalanceKey, Item, Movement, StockBalance, StockLedgerEntry, StockLocation,
    Warehouse, replay_quantity,
};

use crate::error::{ServiceError, ServiceResult};
use crate::query::{LedgerFilter, Page, Pagination};
use crate::store::{WarehouseStore, WarehouseTx};

/// Balance and ledger row written by one movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementResult {
    pub balance: StockBalance,
    pub entry: StockLedgerEntry,
}

/// Ledger replay compared with the materialized balance for one location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationReconciliation {
    pub item_id: ItemId,
    pub warehouse_id: WarehouseId,
    pub bin_id: Option<BinId>,
    pub ledger_qty: Decimal,
    pub balance_qty: Decimal,
    pub consistent: bool,
}

impl LocationReconciliation {
    fn new(key: BalanceKey, ledger_qty: Decimal, balance_qty: Decimal) -> Self {
        Self {
            item_id: key.item_id,
            warehouse_id: key.warehouse_id,
            bin_id: key.bin_id,
            ledger_qty,
            balance_qty,
            consistent: ledger_qty == balance_qty,
        }
    }
}

/// Warehouse must exist and be active; a bin, if given, must be active and inside it.
pub(crate) fn resolve_location(
    tx: &dyn WarehouseTx,
    location: StockLocation,
) -> DomainResult<Warehouse> {
    let warehouse = tx
        .warehouse(location.warehouse_id)
        .ok_or_else(|| {
            DomainError::validation(format!("warehouse {} not found", location.warehouse_id))
        })?;
    warehouse.ensure_active()?;
    if let Some(bin_id) = location.bin_id {
        let bin = tx
            .bin(bin_id)
            .ok_or_else(|| DomainError::validation(format!("bin {bin_id} not found")))?;
        bin.ensure_usable_in(warehouse.id)?;
    }
    Ok(warehouse)
}

/// Item must exist and be active.
pub(crate) fn resolve_item(tx: &dyn WarehouseTx, item_id: ItemId) -> DomainResult<Item> {
    let item = tx
        .item(item_id)
        .ok_or_else(|| DomainError::validation(format!("item {item_id} not found")))?;
    item.ensure_active()?;
    Ok(item)
}

pub(crate) fn unit_code(tx: &dyn WarehouseTx, unit_id: millerp_core::UnitId) -> String {
    tx.unit(unit_id)
        .map(|u| u.code)
        .unwrap_or_else(|| unit_id.to_string())
}

/// Apply one movement inside an open transaction.
///
/// The balance row read here is the locked row; the new row and the ledger entry are
/// written together or not at all.
pub fn apply_movement_in_tx(
    tx: &mut dyn WarehouseTx,
    movement: &Movement,
) -> ServiceResult<MovementResult> {
    movement.validate()?;
    let key = movement.key();
    let current = tx
        .balance(&key)
        .unwrap_or_else(|| StockBalance::empty(key, movement.occurred_at));

    let next = match current.apply(movement.qty_delta, movement.unit_cost, movement.occurred_at) {
        Ok(next) => next,
        Err(DomainError::InsufficientStock(mut lines)) => {
            let code = tx
                .item(movement.item_id)
                .map(|i| unit_code(&*tx, i.base_unit_id))
                .unwrap_or_default();
            for line in &mut lines {
                line.unit_code = code.clone();
            }
            return Err(DomainError::InsufficientStock(lines).into());
        }
        Err(other) => return Err(other.into()),
    };

    let entry = StockLedgerEntry {
        id: LedgerEntryId::new(),
        occurred_at: movement.occurred_at,
        item_id: movement.item_id,
        warehouse_id: key.warehouse_id,
        bin_id: key.bin_id,
        reference_type: movement.reference_type,
        reference_id: movement.reference_id,
        qty_delta: movement.qty_delta,
        unit_cost: movement.unit_cost.unwrap_or(current.avg_cost),
        note: movement.note.clone(),
        created_by: movement.actor,
    };

    tx.put_balance(next.clone())?;
    tx.append_ledger(entry.clone())?;

    debug!(
        item_id = %movement.item_id,
        warehouse_id = %key.warehouse_id,
        qty_delta = %movement.qty_delta,
        qty_on_hand = %next.qty_on_hand,
        avg_cost = %next.avg_cost,
        "stock balance updated"
    );

    Ok(MovementResult {
        balance: next,
        entry,
    })
}

/// Read/write surface over balances and the movement ledger.
pub struct StockEngine<S> {
    store: Arc<S>,
}

impl<S> Clone for StockEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: WarehouseStore> StockEngine<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    pub fn get_balance(
        &self,
        item_id: ItemId,
        location: StockLocation,
    ) -> ServiceResult<Option<StockBalance>> {
        self.store
            .transaction(|tx| Ok(tx.balance(&BalanceKey::new(item_id, location))))
    }

    /// Apply a standalone movement (e.g. an adjustment) in its own transaction.
    #[instrument(skip_all, fields(item_id = %movement.item_id, qty_delta = %movement.qty_delta))]
    pub fn apply_movement(&self, movement: Movement) -> ServiceResult<MovementResult> {
        self.store.transaction(|tx| {
            resolve_location(tx, movement.location)?;
            if tx.item(movement.item_id).is_none() {
                return Err(ServiceError::from(DomainError::validation(format!(
                    "item {} not found",
                    movement.item_id
                ))));
            }
            apply_movement_in_tx(tx, &movement)
        })
    }

    /// Every location holding (or having held) the item, ordered by warehouse then bin.
    pub fn list_balances(&self, item_id: ItemId) -> ServiceResult<Vec<StockBalance>> {
        let mut balances = self
            .store
            .transaction(|tx| Ok::<_, ServiceError>(tx.balances_for_item(item_id)))?;
        balances.sort_by(|a, b| {
            a.warehouse_id
                .cmp(&b.warehouse_id)
                .then_with(|| a.bin_id.cmp(&b.bin_id))
        });
        Ok(balances)
    }

    /// Newest-first page of the item's ledger.
    pub fn list_ledger(
        &self,
        item_id: ItemId,
        filter: &LedgerFilter,
        pagination: Pagination,
    ) -> ServiceResult<Page<StockLedgerEntry>> {
        let mut entries: Vec<StockLedgerEntry> = self
            .store
            .transaction(|tx| Ok::<_, ServiceError>(tx.ledger_entries(Some(item_id))))?
            .into_iter()
            .filter(|e| filter.matches(e))
            .collect();
        // Later appends win ties on equal timestamps.
        entries.reverse();
        entries.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at));
        Ok(Page::from_ordered(entries, pagination))
    }

    pub fn validate_availability(
        &self,
        item_id: ItemId,
        location: StockLocation,
        required_qty_base: Decimal,
    ) -> ServiceResult<Availability> {
        if required_qty_base.is_sign_negative() {
            return Err(DomainError::validation("required quantity cannot be negative").into());
        }
        let current = self
            .get_balance(item_id, location)?
            .map(|b| b.qty_on_hand)
            .unwrap_or(Decimal::ZERO);
        Ok(Availability::check(current, required_qty_base))
    }

    pub fn reconcile_location(
        &self,
        item_id: ItemId,
        location: StockLocation,
    ) -> ServiceResult<LocationReconciliation> {
        let key = BalanceKey::new(item_id, location);
        self.store.transaction(|tx| {
            let ledger_qty = replay_quantity(&key, &tx.ledger_entries(Some(item_id)));
            let balance_qty = tx
                .balance(&key)
                .map(|b| b.qty_on_hand)
                .unwrap_or(Decimal::ZERO);
            Ok(LocationReconciliation::new(key, ledger_qty, balance_qty))
        })
    }

    /// Replay the whole ledger and report every location whose balance disagrees.
    #[instrument(skip_all)]
    pub fn verify_ledger(&self) -> ServiceResult<Vec<LocationReconciliation>> {
        self.store.transaction(|tx| {
            let mut replayed: BTreeMap<(ItemId, WarehouseId, Option<BinId>), Decimal> =
                BTreeMap::new();
            for e in tx.ledger_entries(None) {
                *replayed
                    .entry((e.item_id, e.warehouse_id, e.bin_id))
                    .or_insert(Decimal::ZERO) += e.qty_delta;
            }

            let balances = tx.all_balances();
            let mut seen = HashSet::new();
            let mut mismatched = Vec::new();
            for b in &balances {
                let k = (b.item_id, b.warehouse_id, b.bin_id);
                seen.insert(k);
                let ledger_qty = replayed.get(&k).copied().unwrap_or(Decimal::ZERO);
                if ledger_qty != b.qty_on_hand {
                    mismatched.push(LocationReconciliation::new(b.key(), ledger_qty, b.qty_on_hand));
                }
            }
            for ((item_id, warehouse_id, bin_id), ledger_qty) in replayed {
                if !seen.contains(&(item_id, warehouse_id, bin_id)) && !ledger_qty.is_zero() {
                    let key = BalanceKey {
                        item_id,
                        warehouse_id,
                        bin_id,
                    };
                    mismatched.push(LocationReconciliation::new(key, ledger_qty, Decimal::ZERO));
                }
            }
            Ok(mismatched)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use millerp_core::{CompanyId, UnitId, UserId};
    use millerp_inventory::{ReferenceType, Unit};
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    use crate::config::CatalogSeed;
    use crate::store::InMemoryWarehouseStore;

    struct Fixture {
        engine: StockEngine<InMemoryWarehouseStore>,
        item: Item,
        location: StockLocation,
    }

    fn setup() -> Fixture {
        let unit = Unit {
            id: UnitId::new(),
            code: "L".to_string(),
            name: "Litre".to_string(),
        };
        let item = Item::new(ItemId::new(), "DIESEL", "Diesel fuel", unit.id, vec![]).unwrap();
        let warehouse = Warehouse {
            id: WarehouseId::new(),
            company_id: CompanyId::new(),
            code: "FUEL".to_string(),
            name: "Fuel depot".to_string(),
            active: true,
        };
        let store = InMemoryWarehouseStore::from_seed(CatalogSeed {
            units: vec![unit],
            items: vec![item.clone()],
            warehouses: vec![warehouse.clone()],
            ..CatalogSeed::default()
        })
        .unwrap();
        Fixture {
            engine: StockEngine::new(Arc::new(store)),
            item,
            location: StockLocation::new(warehouse.id, None),
        }
    }

    fn movement(f: &Fixture, delta: Decimal, cost: Option<Decimal>) -> Movement {
        Movement {
            item_id: f.item.id,
            location: f.location,
            qty_delta: delta,
            unit_cost: cost,
            reference_type: if delta > Decimal::ZERO {
                ReferenceType::In
            } else {
                ReferenceType::Out
            },
            reference_id: Uuid::now_v7(),
            note: None,
            actor: UserId::new(),
            occurred_at: Utc::now(),
        }
    }

    #[test]
    fn outbound_records_current_average_on_the_ledger() {
        let f = setup();
        f.engine.apply_movement(movement(&f, dec!(200), Some(dec!(1000)))).unwrap();
        let out = f.engine.apply_movement(movement(&f, dec!(-50), None)).unwrap();

        assert_eq!(out.balance.qty_on_hand, dec!(150));
        assert_eq!(out.balance.avg_cost, dec!(1000));
        assert_eq!(out.entry.unit_cost, dec!(1000));
        assert_eq!(out.entry.qty_delta, dec!(-50));
    }

    #[test]
    fn overdraw_leaves_balance_and_ledger_unchanged() {
        let f = setup();
        f.engine.apply_movement(movement(&f, dec!(10), Some(dec!(3)))).unwrap();
        let err = f.engine.apply_movement(movement(&f, dec!(-11), None)).unwrap_err();

        match err {
            ServiceError::Domain(DomainError::InsufficientStock(lines)) => {
                assert_eq!(lines[0].unit_code, "L");
                assert_eq!(lines[0].available, dec!(10));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        let balance = f.engine.get_balance(f.item.id, f.location).unwrap().unwrap();
        assert_eq!(balance.qty_on_hand, dec!(10));
        let page = f
            .engine
            .list_ledger(f.item.id, &LedgerFilter::default(), Pagination::default())
            .unwrap();
        assert_eq!(page.total, 1);
    }

    #[test]
    fn unknown_warehouse_is_a_validation_error() {
        let f = setup();
        let mut m = movement(&f, dec!(1), None);
        m.location = StockLocation::new(WarehouseId::new(), None);
        let err = f.engine.apply_movement(m).unwrap_err();
        assert_eq!(err.code(), "VALIDATION_ERROR");
    }

    #[test]
    fn ledger_is_newest_first_and_filterable() {
        let f = setup();
        let base = Utc::now();
        for (i, delta) in [dec!(5), dec!(7), dec!(-2)].into_iter().enumerate() {
            let mut m = movement(&f, delta, Some(dec!(1)));
            m.occurred_at = base + Duration::seconds(i as i64);
            f.engine.apply_movement(m).unwrap();
        }

        let page = f
            .engine
            .list_ledger(f.item.id, &LedgerFilter::default(), Pagination::new(Some(2), None))
            .unwrap();
        assert_eq!(page.total, 3);
        assert!(page.has_more);
        assert_eq!(page.items[0].qty_delta, dec!(-2));
        assert_eq!(page.items[1].qty_delta, dec!(7));

        let outs = f
            .engine
            .list_ledger(
                f.item.id,
                &LedgerFilter {
                    reference_type: Some(ReferenceType::Out),
                    ..LedgerFilter::default()
                },
                Pagination::default(),
            )
            .unwrap();
        assert_eq!(outs.total, 1);

        let early = f
            .engine
            .list_ledger(
                f.item.id,
                &LedgerFilter {
                    to: Some(base),
                    ..LedgerFilter::default()
                },
                Pagination::default(),
            )
            .unwrap();
        assert_eq!(early.items.len(), 1);
        assert_eq!(early.items[0].qty_delta, dec!(5));
    }

    #[test]
    fn availability_and_reconciliation() {
        let f = setup();
        f.engine.apply_movement(movement(&f, dec!(30), Some(dec!(2)))).unwrap();
        f.engine.apply_movement(movement(&f, dec!(-12), None)).unwrap();

        let ok = f.engine.validate_availability(f.item.id, f.location, dec!(18)).unwrap();
        assert!(ok.available);
        let short = f.engine.validate_availability(f.item.id, f.location, dec!(19)).unwrap();
        assert!(!short.available);
        assert_eq!(short.current_qty, dec!(18));

        let rec = f.engine.reconcile_location(f.item.id, f.location).unwrap();
        assert!(rec.consistent);
        assert_eq!(rec.ledger_qty, dec!(18));
        assert!(f.engine.verify_ledger().unwrap().is_empty());
    }
}
