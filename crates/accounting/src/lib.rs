//! Accounting domain: journal entries, the system account map and the GL line
//! builders for inventory movements.
//!
//! Pure domain logic only: no IO, no HTTP, no persistence concerns.

pub mod accounts;
pub mod journal;
pub mod posting;

pub use accounts::{AccountResolver, SystemAccountKey, SystemAccountMap};
pub use journal::{
    JournalContext, JournalEntry, JournalLine, JournalSourceType, JournalStatus, validate_lines,
};
pub use posting::{
    LoanReturnValues, build_goods_issue_gl_lines, build_loan_return_gl_lines,
    build_opening_stock_gl_lines,
};
