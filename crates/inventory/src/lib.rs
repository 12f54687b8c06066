//! Inventory domain: catalog collaborators, stock balances, the movement ledger and the
//! goods issue / goods receipt documents.
//!
//! Pure, deterministic domain logic (no IO, no HTTP, no storage).

pub mod balance;
pub mod catalog;
pub mod gl_state;
pub mod issue;
pub mod ledger;
pub mod receipt;

pub use balance::{Availability, BalanceKey, StockBalance, weighted_average_cost};
pub use catalog::{Bin, Item, StockLocation, Unit, UnitConversion, Warehouse};
pub use gl_state::{GlState, GlStatus};
pub use issue::{
    GoodsIssue, GoodsIssueLine, IssueHeader, IssuePurpose, IssueStatus, LoanReturnLine,
    LoanSettlement, LoanTerms,
};
pub use ledger::{Movement, ReferenceType, StockLedgerEntry, replay_quantity};
pub use receipt::{GoodsReceipt, GoodsReceiptLine, ReceiptHeader, ReceiptSourceType};
