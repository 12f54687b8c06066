use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Mutex, PoisonError};

use uuid::Uuid;

use millerp_accounting::{JournalEntry, JournalSourceType, SystemAccountMap};
use millerp_core::{
    AggregateRoot, BinId, CompanyId, Entity, ExpectedVersion, GoodsIssueId, GoodsReceiptId,
    ItemId, JournalEntryId, UnitId, WarehouseId,
};
use millerp_inventory::{
    BalanceKey, Bin, GoodsIssue, GoodsReceipt, Item, StockBalance, StockLedgerEntry, Unit,
    Warehouse,
};

use super::{StoreError, WarehouseStore, WarehouseTx};
use crate::config::CatalogSeed;

#[derive(Debug, Default)]
struct WarehouseState {
    units: HashMap<UnitId, Unit>,
    items: HashMap<ItemId, Item>,
    warehouses: HashMap<WarehouseId, Warehouse>,
    bins: HashMap<BinId, Bin>,
    accounts: HashMap<CompanyId, SystemAccountMap>,
    balances: HashMap<BalanceKey, StockBalance>,
    ledger: Vec<StockLedgerEntry>,
    sequences: HashMap<String, u32>,
    issues: HashMap<GoodsIssueId, GoodsIssue>,
    receipts: HashMap<GoodsReceiptId, GoodsReceipt>,
    journal: HashMap<JournalEntryId, JournalEntry>,
}

/// Writes buffered by an open transaction.
#[derive(Debug, Default)]
struct PendingWrites {
    items: HashMap<ItemId, Item>,
    balances: HashMap<BalanceKey, StockBalance>,
    ledger: Vec<StockLedgerEntry>,
    sequences: HashMap<String, u32>,
    issues: HashMap<GoodsIssueId, GoodsIssue>,
    receipts: HashMap<GoodsReceiptId, GoodsReceipt>,
    journal: HashMap<JournalEntryId, JournalEntry>,
}

impl WarehouseState {
    fn commit(&mut self, writes: PendingWrites) {
        self.items.extend(writes.items);
        self.balances.extend(writes.balances);
        self.ledger.extend(writes.ledger);
        self.sequences.extend(writes.sequences);
        self.issues.extend(writes.issues);
        self.receipts.extend(writes.receipts);
        self.journal.extend(writes.journal);
    }
}

/// Pending rows first, then committed rows not shadowed by a pending write.
fn merged<'a, K: Eq + Hash, V>(
    pending: &'a HashMap<K, V>,
    base: &'a HashMap<K, V>,
) -> impl Iterator<Item = &'a V> + 'a {
    pending.values().chain(
        base.iter()
            .filter(|(k, _)| !pending.contains_key(*k))
            .map(|(_, v)| v),
    )
}

fn lookup<K: Eq + Hash, V: Clone>(
    pending: &HashMap<K, V>,
    base: &HashMap<K, V>,
    key: &K,
) -> Option<V> {
    pending.get(key).or_else(|| base.get(key)).cloned()
}

struct InMemoryTx<'a> {
    base: &'a WarehouseState,
    writes: PendingWrites,
}

impl InMemoryTx<'_> {
    fn check_version(
        what: String,
        expected: ExpectedVersion,
        actual: u64,
    ) -> Result<(), StoreError> {
        if expected.matches(actual) {
            Ok(())
        } else {
            Err(StoreError::VersionMismatch {
                what,
                expected,
                actual,
            })
        }
    }
}

impl WarehouseTx for InMemoryTx<'_> {
    fn unit(&self, id: UnitId) -> Option<Unit> {
        self.base.units.get(&id).cloned()
    }

    fn item(&self, id: ItemId) -> Option<Item> {
        lookup(&self.writes.items, &self.base.items, &id)
    }

    fn item_by_sku(&self, sku: &str) -> Option<Item> {
        let sku = sku.trim();
        merged(&self.writes.items, &self.base.items)
            .find(|i| i.sku.eq_ignore_ascii_case(sku))
            .cloned()
    }

    fn insert_item(&mut self, item: Item) -> Result<(), StoreError> {
        if self.item(item.id()).is_some() {
            return Err(StoreError::Duplicate(format!("item {}", item.id())));
        }
        if self.item_by_sku(&item.sku).is_some() {
            return Err(StoreError::Duplicate(format!("sku {}", item.sku)));
        }
        self.writes.items.insert(item.id(), item);
        Ok(())
    }

    fn warehouse(&self, id: WarehouseId) -> Option<Warehouse> {
        self.base.warehouses.get(&id).cloned()
    }

    fn bin(&self, id: BinId) -> Option<Bin> {
        self.base.bins.get(&id).cloned()
    }

    fn system_accounts(&self, company_id: CompanyId) -> SystemAccountMap {
        self.base
            .accounts
            .get(&company_id)
            .cloned()
            .unwrap_or_else(|| SystemAccountMap::new(company_id))
    }

    fn balance(&self, key: &BalanceKey) -> Option<StockBalance> {
        lookup(&self.writes.balances, &self.base.balances, key)
    }

    fn put_balance(&mut self, balance: StockBalance) -> Result<(), StoreError> {
        let key = balance.key();
        let stored = self.balance(&key).map(|b| b.version).unwrap_or(0);
        Self::check_version(
            format!("balance {}@{}", key.item_id, key.warehouse_id),
            ExpectedVersion::Exact(balance.version.saturating_sub(1)),
            stored,
        )?;
        self.writes.balances.insert(key, balance);
        Ok(())
    }

    fn balances_for_item(&self, item_id: ItemId) -> Vec<StockBalance> {
        merged(&self.writes.balances, &self.base.balances)
            .filter(|b| b.item_id == item_id)
            .cloned()
            .collect()
    }

    fn all_balances(&self) -> Vec<StockBalance> {
        merged(&self.writes.balances, &self.base.balances)
            .cloned()
            .collect()
    }

    fn append_ledger(&mut self, entry: StockLedgerEntry) -> Result<(), StoreError> {
        if self.writes.ledger.iter().any(|e| e.id == entry.id) {
            return Err(StoreError::Duplicate(format!("ledger entry {}", entry.id)));
        }
        self.writes.ledger.push(entry);
        Ok(())
    }

    fn ledger_entries(&self, item_id: Option<ItemId>) -> Vec<StockLedgerEntry> {
        self.base
            .ledger
            .iter()
            .chain(self.writes.ledger.iter())
            .filter(|e| item_id.is_none_or(|id| e.item_id == id))
            .cloned()
            .collect()
    }

    fn next_sequence(&mut self, scope: &str) -> u32 {
        let current = self
            .writes
            .sequences
            .get(scope)
            .or_else(|| self.base.sequences.get(scope))
            .copied()
            .unwrap_or(0);
        let next = current + 1;
        self.writes.sequences.insert(scope.to_string(), next);
        next
    }

    fn insert_goods_issue(&mut self, issue: GoodsIssue) -> Result<(), StoreError> {
        if self.goods_issue(*issue.id()).is_some() {
            return Err(StoreError::Duplicate(format!("goods issue {}", issue.id())));
        }
        if self.goods_issue_by_doc_number(issue.doc_number()).is_some() {
            return Err(StoreError::Duplicate(format!(
                "doc number {}",
                issue.doc_number()
            )));
        }
        self.writes.issues.insert(*issue.id(), issue);
        Ok(())
    }

    fn goods_issue(&self, id: GoodsIssueId) -> Option<GoodsIssue> {
        lookup(&self.writes.issues, &self.base.issues, &id)
    }

    fn goods_issue_by_doc_number(&self, doc_number: &str) -> Option<GoodsIssue> {
        merged(&self.writes.issues, &self.base.issues)
            .find(|i| i.doc_number() == doc_number)
            .cloned()
    }

    fn save_goods_issue(
        &mut self,
        issue: GoodsIssue,
        expected: ExpectedVersion,
    ) -> Result<(), StoreError> {
        let stored = self
            .goods_issue(*issue.id())
            .ok_or_else(|| StoreError::Missing(format!("goods issue {}", issue.id())))?;
        Self::check_version(
            format!("goods issue {}", issue.doc_number()),
            expected,
            stored.version(),
        )?;
        self.writes.issues.insert(*issue.id(), issue);
        Ok(())
    }

    fn insert_goods_receipt(&mut self, receipt: GoodsReceipt) -> Result<(), StoreError> {
        if self.goods_receipt(*receipt.id()).is_some() {
            return Err(StoreError::Duplicate(format!("goods receipt {}", receipt.id())));
        }
        let doc_taken = merged(&self.writes.receipts, &self.base.receipts)
            .any(|r| r.doc_number() == receipt.doc_number());
        if doc_taken {
            return Err(StoreError::Duplicate(format!(
                "doc number {}",
                receipt.doc_number()
            )));
        }
        self.writes.receipts.insert(*receipt.id(), receipt);
        Ok(())
    }

    fn goods_receipt(&self, id: GoodsReceiptId) -> Option<GoodsReceipt> {
        lookup(&self.writes.receipts, &self.base.receipts, &id)
    }

    fn receipts_for_issue(&self, issue_id: GoodsIssueId) -> Vec<GoodsReceipt> {
        let mut receipts: Vec<GoodsReceipt> =
            merged(&self.writes.receipts, &self.base.receipts)
                .filter(|r| r.source_issue_id() == Some(issue_id))
                .cloned()
                .collect();
        receipts.sort_by(|a, b| {
            a.received_at()
                .cmp(&b.received_at())
                .then_with(|| a.doc_number().cmp(b.doc_number()))
        });
        receipts
    }

    fn save_goods_receipt(
        &mut self,
        receipt: GoodsReceipt,
        expected: ExpectedVersion,
    ) -> Result<(), StoreError> {
        let stored = self
            .goods_receipt(*receipt.id())
            .ok_or_else(|| StoreError::Missing(format!("goods receipt {}", receipt.id())))?;
        Self::check_version(
            format!("goods receipt {}", receipt.doc_number()),
            expected,
            stored.version(),
        )?;
        self.writes.receipts.insert(*receipt.id(), receipt);
        Ok(())
    }

    fn insert_journal_entry(&mut self, entry: JournalEntry) -> Result<(), StoreError> {
        if self.journal_entry(*entry.id()).is_some() {
            return Err(StoreError::Duplicate(format!("journal entry {}", entry.id())));
        }
        let number_taken = merged(&self.writes.journal, &self.base.journal).any(|e| {
            e.company_id() == entry.company_id() && e.entry_number() == entry.entry_number()
        });
        if number_taken {
            return Err(StoreError::Duplicate(format!(
                "entry number {}",
                entry.entry_number()
            )));
        }
        self.writes.journal.insert(*entry.id(), entry);
        Ok(())
    }

    fn journal_entry(&self, id: JournalEntryId) -> Option<JournalEntry> {
        lookup(&self.writes.journal, &self.base.journal, &id)
    }

    fn journal_entries_by_source(
        &self,
        source_type: JournalSourceType,
        source_id: Uuid,
    ) -> Vec<JournalEntry> {
        let mut entries: Vec<JournalEntry> = merged(&self.writes.journal, &self.base.journal)
            .filter(|e| e.source_type() == source_type && e.source_id() == source_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| {
            a.posted_at()
                .cmp(&b.posted_at())
                .then_with(|| a.entry_number().cmp(b.entry_number()))
        });
        entries
    }

    fn save_journal_entry(
        &mut self,
        entry: JournalEntry,
        expected: ExpectedVersion,
    ) -> Result<(), StoreError> {
        let stored = self
            .journal_entry(*entry.id())
            .ok_or_else(|| StoreError::Missing(format!("journal entry {}", entry.id())))?;
        Self::check_version(
            format!("journal entry {}", entry.entry_number()),
            expected,
            stored.version(),
        )?;
        self.writes.journal.insert(*entry.id(), entry);
        Ok(())
    }
}

/// In-memory warehouse store.
///
/// One mutex serializes whole transactions. Writes go to a private buffer that is
/// merged into the committed state only when the closure returns `Ok`, so an error
/// or a panic inside a transaction leaves committed state untouched.
#[derive(Debug, Default)]
pub struct InMemoryWarehouseStore {
    state: Mutex<WarehouseState>,
}

impl InMemoryWarehouseStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_seed(seed: CatalogSeed) -> Result<Self, StoreError> {
        let store = Self::new();
        store.load_seed(seed)?;
        Ok(store)
    }

    /// Register catalog rows and account mappings. Existing ids are replaced, except
    /// that a SKU may not be reused by a different item.
    pub fn load_seed(&self, seed: CatalogSeed) -> Result<(), StoreError> {
        let mut state = self.lock();
        for item in &seed.items {
            item.validate()
                .map_err(|e| StoreError::Invalid(format!("item {}: {e}", item.sku)))?;
            let clash = state
                .items
                .values()
                .chain(seed.items.iter())
                .any(|other| other.id != item.id && other.sku.eq_ignore_ascii_case(&item.sku));
            if clash {
                return Err(StoreError::Duplicate(format!("sku {}", item.sku)));
            }
        }
        for unit in seed.units {
            state.units.insert(unit.id(), unit);
        }
        for item in seed.items {
            state.items.insert(item.id(), item);
        }
        for warehouse in seed.warehouses {
            state.warehouses.insert(warehouse.id(), warehouse);
        }
        for bin in seed.bins {
            state.bins.insert(bin.id(), bin);
        }
        for mapping in seed.system_accounts {
            state
                .accounts
                .entry(mapping.company_id)
                .or_insert_with(|| SystemAccountMap::new(mapping.company_id))
                .insert(mapping.key, mapping.account_id);
        }
        Ok(())
    }

    // Committed state is only ever replaced wholesale after a successful closure, so a
    // guard poisoned by a panicking transaction still protects consistent data.
    fn lock(&self) -> std::sync::MutexGuard<'_, WarehouseState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl WarehouseStore for InMemoryWarehouseStore {
    fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn WarehouseTx) -> Result<T, E>,
        E: From<StoreError>,
    {
        let mut state = self.lock();
        let (out, writes) = {
            let mut tx = InMemoryTx {
                base: &*state,
                writes: PendingWrites::default(),
            };
            let out = f(&mut tx)?;
            (out, tx.writes)
        };
        state.commit(writes);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use millerp_accounting::SystemAccountKey;
    use millerp_core::AccountId;
    use millerp_inventory::UnitConversion;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use crate::config::SystemAccountSeed;

    fn seeded() -> (InMemoryWarehouseStore, Item, Warehouse) {
        let unit = Unit {
            id: UnitId::new(),
            code: "KG".to_string(),
            name: "Kilogram".to_string(),
        };
        let item = Item::new(ItemId::new(), "GREASE-01", "Lithium grease", unit.id, vec![]).unwrap();
        let warehouse = Warehouse {
            id: WarehouseId::new(),
            company_id: CompanyId::new(),
            code: "WH01".to_string(),
            name: "Main store".to_string(),
            active: true,
        };
        let store = InMemoryWarehouseStore::from_seed(CatalogSeed {
            units: vec![unit],
            items: vec![item.clone()],
            warehouses: vec![warehouse.clone()],
            bins: vec![],
            system_accounts: vec![SystemAccountSeed {
                company_id: warehouse.company_id,
                key: SystemAccountKey::InventoryGeneral,
                account_id: AccountId::new(),
            }],
        })
        .unwrap();
        (store, item, warehouse)
    }

    fn key(item: &Item, warehouse: &Warehouse) -> BalanceKey {
        BalanceKey {
            item_id: item.id,
            warehouse_id: warehouse.id,
            bin_id: None,
        }
    }

    #[test]
    fn failed_transaction_leaves_no_trace() {
        let (store, item, warehouse) = seeded();
        let k = key(&item, &warehouse);

        let res: Result<(), StoreError> = store.transaction(|tx| {
            let b = StockBalance::empty(k, Utc::now())
                .apply(dec!(10), Some(dec!(5)), Utc::now())
                .unwrap();
            tx.put_balance(b)?;
            tx.next_sequence("GI/WH01/20260101");
            Err(StoreError::Missing("boom".to_string()))
        });
        assert!(res.is_err());

        let (balance, seq) = store
            .transaction(|tx| {
                Ok::<_, StoreError>((tx.balance(&k), tx.next_sequence("GI/WH01/20260101")))
            })
            .unwrap();
        assert!(balance.is_none());
        assert_eq!(seq, 1);
    }

    #[test]
    fn stale_balance_write_is_rejected() {
        let (store, item, warehouse) = seeded();
        let k = key(&item, &warehouse);
        let first = StockBalance::empty(k, Utc::now())
            .apply(dec!(10), Some(dec!(5)), Utc::now())
            .unwrap();
        store
            .transaction(|tx| tx.put_balance(first.clone()))
            .unwrap();

        let err = store.transaction(|tx| tx.put_balance(first.clone())).unwrap_err();
        assert!(matches!(err, StoreError::VersionMismatch { .. }));
    }

    #[test]
    fn duplicate_sku_is_rejected() {
        let (store, item, _) = seeded();
        let clone = Item::new(ItemId::new(), item.sku.to_lowercase(), "Other", item.base_unit_id, vec![])
            .unwrap();
        let err = store.transaction(|tx| tx.insert_item(clone)).unwrap_err();
        assert!(matches!(err, StoreError::Duplicate(_)));
    }

    #[test]
    fn seeded_item_with_zero_factor_is_rejected() {
        let (store, item, _) = seeded();
        let mut bad = Item::new(ItemId::new(), "FERT-UREA", "Urea", item.base_unit_id, vec![])
            .unwrap();
        bad.conversions.push(UnitConversion {
            unit_id: UnitId::new(),
            factor: Decimal::ZERO,
        });
        let err = store
            .load_seed(CatalogSeed {
                units: vec![],
                items: vec![bad.clone()],
                warehouses: vec![],
                bins: vec![],
                system_accounts: vec![],
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::Invalid(msg) if msg.contains("FERT-UREA")));
        let stored = store
            .transaction(|tx| Ok::<_, StoreError>(tx.item(bad.id)))
            .unwrap();
        assert!(stored.is_none());
    }

    #[test]
    fn panicking_transaction_does_not_poison_the_store() {
        let (store, item, warehouse) = seeded();
        let store = std::sync::Arc::new(store);
        let k = key(&item, &warehouse);

        let s = store.clone();
        let handle = std::thread::spawn(move || {
            let _: Result<(), StoreError> = s.transaction(|tx| {
                let b = StockBalance::empty(k, Utc::now())
                    .apply(dec!(1), None, Utc::now())
                    .unwrap();
                tx.put_balance(b)?;
                panic!("crash inside transaction");
            });
        });
        assert!(handle.join().is_err());

        let balance = store
            .transaction(|tx| Ok::<_, StoreError>(tx.balance(&k)))
            .unwrap();
        assert!(balance.is_none());
    }

    #[test]
    fn unknown_company_gets_an_empty_account_map() {
        let (store, _, warehouse) = seeded();
        let (known, unknown) = store
            .transaction(|tx| {
                Ok::<_, StoreError>((
                    tx.system_accounts(warehouse.company_id),
                    tx.system_accounts(CompanyId::new()),
                ))
            })
            .unwrap();
        assert!(known.get(SystemAccountKey::InventoryGeneral).is_some());
        assert!(unknown.get(SystemAccountKey::InventoryGeneral).is_none());
    }
}
