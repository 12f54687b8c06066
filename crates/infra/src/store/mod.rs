//! Transactional store boundary for warehouse state.
//!
//! Every multi-step movement runs inside one [`WarehouseStore::transaction`] call. The
//! closure receives a [`WarehouseTx`] handle; if it returns `Err` (or panics) nothing it
//! wrote becomes visible.
//!
//! ## Lock scope
//!
//! A transaction is also the lock scope for balance rows: any balance read through the
//! handle is a read "for update", so read-check-write sequences on a location serialize
//! against other transactions touching it.
//!
//! ## Sequences
//!
//! Document and journal numbers are drawn from [`WarehouseTx::next_sequence`] inside the
//! creating transaction. A rolled-back transaction does not consume a number.

use thiserror::Error;

use millerp_accounting::{JournalEntry, JournalSourceType, SystemAccountMap};
use millerp_core::{
    BinId, CompanyId, ExpectedVersion, GoodsIssueId, GoodsReceiptId, ItemId, JournalEntryId,
    UnitId, WarehouseId,
};
use millerp_inventory::{
    BalanceKey, Bin, GoodsIssue, GoodsReceipt, Item, StockBalance, StockLedgerEntry, Unit,
    Warehouse,
};

pub mod in_memory;

pub use in_memory::InMemoryWarehouseStore;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("version mismatch for {what}: expected {expected:?}, found {actual}")]
    VersionMismatch {
        what: String,
        expected: ExpectedVersion,
        actual: u64,
    },

    #[error("duplicate key: {0}")]
    Duplicate(String),

    /// Update of a row that was never inserted.
    #[error("missing row: {0}")]
    Missing(String),

    /// Row rejected by the domain checks it must pass to enter the store.
    #[error("invalid row: {0}")]
    Invalid(String),
}

/// Handle to one open transaction.
///
/// Reads return owned copies. Writes are buffered until the transaction commits.
pub trait WarehouseTx {
    // Catalog.
    fn unit(&self, id: UnitId) -> Option<Unit>;
    fn item(&self, id: ItemId) -> Option<Item>;
    fn item_by_sku(&self, sku: &str) -> Option<Item>;
    fn insert_item(&mut self, item: Item) -> Result<(), StoreError>;
    fn warehouse(&self, id: WarehouseId) -> Option<Warehouse>;
    fn bin(&self, id: BinId) -> Option<Bin>;
    fn system_accounts(&self, company_id: CompanyId) -> SystemAccountMap;

    // Balances.
    fn balance(&self, key: &BalanceKey) -> Option<StockBalance>;
    /// Upsert a balance row. `balance.version` must be exactly one past the stored row.
    fn put_balance(&mut self, balance: StockBalance) -> Result<(), StoreError>;
    fn balances_for_item(&self, item_id: ItemId) -> Vec<StockBalance>;
    fn all_balances(&self) -> Vec<StockBalance>;

    // Ledger (append-only).
    fn append_ledger(&mut self, entry: StockLedgerEntry) -> Result<(), StoreError>;
    /// Entries in append order, optionally restricted to one item.
    fn ledger_entries(&self, item_id: Option<ItemId>) -> Vec<StockLedgerEntry>;

    // Sequences.
    fn next_sequence(&mut self, scope: &str) -> u32;

    // Goods issues.
    fn insert_goods_issue(&mut self, issue: GoodsIssue) -> Result<(), StoreError>;
    fn goods_issue(&self, id: GoodsIssueId) -> Option<GoodsIssue>;
    fn goods_issue_by_doc_number(&self, doc_number: &str) -> Option<GoodsIssue>;
    fn save_goods_issue(
        &mut self,
        issue: GoodsIssue,
        expected: ExpectedVersion,
    ) -> Result<(), StoreError>;

    // Goods receipts.
    fn insert_goods_receipt(&mut self, receipt: GoodsReceipt) -> Result<(), StoreError>;
    fn goods_receipt(&self, id: GoodsReceiptId) -> Option<GoodsReceipt>;
    fn receipts_for_issue(&self, issue_id: GoodsIssueId) -> Vec<GoodsReceipt>;
    fn save_goods_receipt(
        &mut self,
        receipt: GoodsReceipt,
        expected: ExpectedVersion,
    ) -> Result<(), StoreError>;

    // Journal.
    fn insert_journal_entry(&mut self, entry: JournalEntry) -> Result<(), StoreError>;
    fn journal_entry(&self, id: JournalEntryId) -> Option<JournalEntry>;
    fn journal_entries_by_source(
        &self,
        source_type: JournalSourceType,
        source_id: uuid::Uuid,
    ) -> Vec<JournalEntry>;
    fn save_journal_entry(
        &mut self,
        entry: JournalEntry,
        expected: ExpectedVersion,
    ) -> Result<(), StoreError>;
}

/// Store that can run closures atomically against warehouse state.
pub trait WarehouseStore: Send + Sync {
    fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn WarehouseTx) -> Result<T, E>,
        E: From<StoreError>;
}

impl<S> WarehouseStore for std::sync::Arc<S>
where
    S: WarehouseStore,
{
    fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&mut dyn WarehouseTx) -> Result<T, E>,
        E: From<StoreError>,
    {
        (**self).transaction(f)
    }
}
