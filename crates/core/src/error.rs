//! Domain error model.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::id::{CompanyId, ItemId};

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// One line of an availability report: what was asked for versus what the
/// location holds, both expressed in the unit the caller requested.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockShortfall {
    pub line_no: u32,
    pub item_id: ItemId,
    pub unit_code: String,
    pub requested: Decimal,
    pub available: Decimal,
}

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// invariants, conflicts). Storage failures live in the infrastructure layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Missing, invalid or inactive input (user-fixable).
    #[error("validation failed: {0}")]
    Validation(String),

    /// The requested quantity is not on hand.
    #[error("insufficient stock on {} line(s)", .0.len())]
    InsufficientStock(Vec<StockShortfall>),

    /// Duplicate key or overlapping state (e.g. SKU already taken).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Debits and credits of a journal entry differ by more than the tolerance.
    #[error("unbalanced journal entry (debit={debit}, credit={credit})")]
    UnbalancedEntry { debit: Decimal, credit: Decimal },

    /// A logical system account has no concrete ledger account for the company.
    #[error("system account {key} is not configured for company {company_id}")]
    AccountNotConfigured { company_id: CompanyId, key: String },

    /// A requested document, line or entry does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// A domain invariant was violated.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn account_not_configured(company_id: CompanyId, key: impl Into<String>) -> Self {
        Self::AccountNotConfigured {
            company_id,
            key: key.into(),
        }
    }

    /// Stable machine-readable code used by the API envelope.
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::Validation(_) | DomainError::InvalidId(_) => "VALIDATION_ERROR",
            DomainError::InsufficientStock(_) => "INSUFFICIENT_STOCK",
            DomainError::Conflict(_) => "CONFLICT",
            DomainError::UnbalancedEntry { .. } => "UNBALANCED_ENTRY",
            DomainError::AccountNotConfigured { .. } => "ACCOUNT_NOT_CONFIGURED",
            DomainError::NotFound(_) => "NOT_FOUND",
            DomainError::InvariantViolation(_) => "INTERNAL_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn insufficient_stock_message_counts_lines() {
        let err = DomainError::InsufficientStock(vec![StockShortfall {
            line_no: 1,
            item_id: ItemId::new(),
            unit_code: "KG".to_string(),
            requested: dec!(10),
            available: dec!(4),
        }]);
        assert_eq!(err.to_string(), "insufficient stock on 1 line(s)");
        assert_eq!(err.code(), "INSUFFICIENT_STOCK");
    }

    #[test]
    fn invalid_id_maps_to_validation_code() {
        assert_eq!(DomainError::invalid_id("x").code(), "VALIDATION_ERROR");
    }
}
