//! `millerp-core` — domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod aggregate;
pub mod amount;
pub mod entity;
pub mod error;
pub mod id;

pub use aggregate::{AggregateRoot, ExpectedVersion};
pub use entity::Entity;
pub use error::{DomainError, DomainResult, StockShortfall};
pub use id::{
    AccountId, BinId, CompanyId, GoodsIssueId, GoodsIssueLineId, GoodsReceiptId, ItemId,
    JournalEntryId, LedgerEntryId, UnitId, UserId, WarehouseId,
};
