//! Goods receipt (inbound) document.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use millerp_core::amount::in_range;
use millerp_core::{
    AggregateRoot, BinId, CompanyId, DomainError, DomainResult, GoodsIssueId, GoodsIssueLineId,
    GoodsReceiptId, ItemId, UnitId, UserId, WarehouseId,
};

use crate::catalog::StockLocation;
use crate::gl_state::{GlState, GlStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReceiptSourceType {
    Return,
    NewItem,
    LoanReturn,
}

impl ReceiptSourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReceiptSourceType::Return => "RETURN",
            ReceiptSourceType::NewItem => "NEW_ITEM",
            ReceiptSourceType::LoanReturn => "LOAN_RETURN",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoodsReceiptLine {
    pub line_no: u32,
    pub item_id: ItemId,
    pub unit_id: UnitId,
    pub qty: Decimal,
    pub qty_base: Decimal,
    /// Cost per base unit carried into the balance (zero for plain returns).
    pub unit_cost: Decimal,
    pub loan_issue_line_id: Option<GoodsIssueLineId>,
    /// Loan quantity declared unrecoverable on this line, in `unit_id`.
    pub qty_written_off: Decimal,
}

impl GoodsReceiptLine {
    pub fn value(&self) -> Decimal {
        self.qty_base * self.unit_cost
    }
}

/// Header data for a new receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptHeader {
    pub company_id: CompanyId,
    pub warehouse_id: WarehouseId,
    pub bin_id: Option<BinId>,
    pub source_type: ReceiptSourceType,
    pub source_ref: Option<String>,
    pub source_issue_id: Option<GoodsIssueId>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoodsReceipt {
    id: GoodsReceiptId,
    doc_number: String,
    company_id: CompanyId,
    warehouse_id: WarehouseId,
    bin_id: Option<BinId>,
    source_type: ReceiptSourceType,
    source_ref: Option<String>,
    source_issue_id: Option<GoodsIssueId>,
    gl: GlState,
    note: Option<String>,
    lines: Vec<GoodsReceiptLine>,
    received_at: DateTime<Utc>,
    created_by: UserId,
    version: u64,
}

impl AggregateRoot for GoodsReceipt {
    type Id = GoodsReceiptId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl GoodsReceipt {
    pub fn new(
        id: GoodsReceiptId,
        doc_number: impl Into<String>,
        header: ReceiptHeader,
        lines: Vec<GoodsReceiptLine>,
        created_by: UserId,
        received_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if lines.is_empty() {
            return Err(DomainError::validation(
                "goods receipt must have at least one line",
            ));
        }
        for line in &lines {
            if line.qty.is_sign_negative() || line.qty_written_off.is_sign_negative() {
                return Err(DomainError::validation(format!(
                    "line {}: quantities cannot be negative",
                    line.line_no
                )));
            }
            if line.unit_cost.is_sign_negative() {
                return Err(DomainError::validation(format!(
                    "line {}: unit cost cannot be negative",
                    line.line_no
                )));
            }
        }
        lines.iter().try_fold(Decimal::ZERO, |total, l| {
            let value = in_range(l.qty_base.checked_mul(l.unit_cost))?;
            in_range(total.checked_add(value))
        })?;

        match header.source_type {
            ReceiptSourceType::LoanReturn => {
                if header.source_issue_id.is_none() {
                    return Err(DomainError::validation(
                        "LOAN_RETURN receipt must reference its loan issue",
                    ));
                }
                if lines.iter().any(|l| l.loan_issue_line_id.is_none()) {
                    return Err(DomainError::validation(
                        "LOAN_RETURN receipt lines must reference loan lines",
                    ));
                }
            }
            _ => {
                if let Some(line) = lines.iter().find(|l| l.qty <= Decimal::ZERO) {
                    return Err(DomainError::validation(format!(
                        "line {}: quantity must be positive",
                        line.line_no
                    )));
                }
            }
        }

        Ok(Self {
            id,
            doc_number: doc_number.into(),
            company_id: header.company_id,
            warehouse_id: header.warehouse_id,
            bin_id: header.bin_id,
            source_type: header.source_type,
            source_ref: header.source_ref,
            source_issue_id: header.source_issue_id,
            gl: GlState::pending(),
            note: header.note,
            lines,
            received_at,
            created_by,
            version: 1,
        })
    }

    pub fn doc_number(&self) -> &str {
        &self.doc_number
    }

    pub fn company_id(&self) -> CompanyId {
        self.company_id
    }

    pub fn warehouse_id(&self) -> WarehouseId {
        self.warehouse_id
    }

    pub fn bin_id(&self) -> Option<BinId> {
        self.bin_id
    }

    pub fn location(&self) -> StockLocation {
        StockLocation::new(self.warehouse_id, self.bin_id)
    }

    pub fn source_type(&self) -> ReceiptSourceType {
        self.source_type
    }

    pub fn source_ref(&self) -> Option<&str> {
        self.source_ref.as_deref()
    }

    pub fn source_issue_id(&self) -> Option<GoodsIssueId> {
        self.source_issue_id
    }

    pub fn gl(&self) -> &GlState {
        &self.gl
    }

    pub fn gl_status(&self) -> GlStatus {
        self.gl.status
    }

    pub fn gl_mut(&mut self) -> &mut GlState {
        self.version += 1;
        &mut self.gl
    }

    pub fn note(&self) -> Option<&str> {
        self.note.as_deref()
    }

    pub fn lines(&self) -> &[GoodsReceiptLine] {
        &self.lines
    }

    pub fn received_at(&self) -> DateTime<Utc> {
        self.received_at
    }

    pub fn created_by(&self) -> UserId {
        self.created_by
    }

    pub fn total_value(&self) -> Decimal {
        self.lines.iter().map(GoodsReceiptLine::value).sum()
    }
}
