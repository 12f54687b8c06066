//! Goods issue (outbound) document and the loan return lifecycle.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use millerp_core::amount::in_range;
use millerp_core::{
    AggregateRoot, BinId, CompanyId, DomainError, DomainResult, GoodsIssueId, GoodsIssueLineId,
    ItemId, UnitId, UserId, WarehouseId,
};

use crate::catalog::StockLocation;
use crate::gl_state::{GlState, GlStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssuePurpose {
    /// General issue to a department (expensed).
    Issue,
    /// Consumed by production.
    Prod,
    /// Lent out, expected back.
    Loan,
    /// Written off as damaged or obsolete.
    Scrap,
}

impl IssuePurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssuePurpose::Issue => "ISSUE",
            IssuePurpose::Prod => "PROD",
            IssuePurpose::Loan => "LOAN",
            IssuePurpose::Scrap => "SCRAP",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueStatus {
    Approved,
    PartialReturn,
    Returned,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoodsIssueLine {
    pub id: GoodsIssueLineId,
    pub line_no: u32,
    pub item_id: ItemId,
    pub unit_id: UnitId,
    /// Quantity in `unit_id`.
    pub qty: Decimal,
    pub qty_base: Decimal,
    /// Average cost per base unit at the moment of issue.
    pub unit_cost: Decimal,
    /// Quantities below are in `unit_id`, like `qty`.
    pub qty_returned: Decimal,
    pub qty_written_off: Decimal,
}

impl GoodsIssueLine {
    pub fn new(
        line_no: u32,
        item_id: ItemId,
        unit_id: UnitId,
        qty: Decimal,
        qty_base: Decimal,
        unit_cost: Decimal,
    ) -> Self {
        Self {
            id: GoodsIssueLineId::new(),
            line_no,
            item_id,
            unit_id,
            qty,
            qty_base,
            unit_cost,
            qty_returned: Decimal::ZERO,
            qty_written_off: Decimal::ZERO,
        }
    }

    /// Issued value, unrounded.
    pub fn value(&self) -> Decimal {
        self.qty_base * self.unit_cost
    }

    /// Base units per one `unit_id` on this line.
    pub fn base_factor(&self) -> Decimal {
        if self.qty.is_zero() {
            Decimal::ONE
        } else {
            self.qty_base / self.qty
        }
    }

    pub fn settled_qty(&self) -> Decimal {
        self.qty_returned + self.qty_written_off
    }

    pub fn outstanding_qty(&self) -> Decimal {
        (self.qty - self.settled_qty()).max(Decimal::ZERO)
    }

    pub fn is_settled(&self) -> bool {
        self.settled_qty() >= self.qty
    }
}

/// Loan-specific header fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanTerms {
    pub receiver: String,
    pub expected_return_at: Option<DateTime<Utc>>,
}

/// Header data supplied when an issue is approved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueHeader {
    pub company_id: CompanyId,
    pub warehouse_id: WarehouseId,
    pub bin_id: Option<BinId>,
    pub purpose: IssuePurpose,
    pub loan: Option<LoanTerms>,
    pub note: Option<String>,
}

/// One returned line of a loan, quantities in the loan line's unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanReturnLine {
    pub loan_line_id: GoodsIssueLineId,
    pub qty: Decimal,
    #[serde(default)]
    pub qty_written_off: Decimal,
}

/// What one loan return line settled, for stock and GL purposes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoanSettlement {
    pub loan_line_id: GoodsIssueLineId,
    pub line_no: u32,
    pub item_id: ItemId,
    pub unit_id: UnitId,
    pub qty: Decimal,
    pub qty_base: Decimal,
    pub qty_written_off: Decimal,
    pub qty_written_off_base: Decimal,
    pub unit_cost: Decimal,
}

impl LoanSettlement {
    pub fn returned_value(&self) -> Decimal {
        self.qty_base * self.unit_cost
    }

    pub fn written_off_value(&self) -> Decimal {
        self.qty_written_off_base * self.unit_cost
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoodsIssue {
    id: GoodsIssueId,
    doc_number: String,
    company_id: CompanyId,
    warehouse_id: WarehouseId,
    bin_id: Option<BinId>,
    purpose: IssuePurpose,
    status: IssueStatus,
    gl: GlState,
    loan: Option<LoanTerms>,
    note: Option<String>,
    lines: Vec<GoodsIssueLine>,
    issued_at: DateTime<Utc>,
    created_by: UserId,
    version: u64,
}

impl AggregateRoot for GoodsIssue {
    type Id = GoodsIssueId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl GoodsIssue {
    /// Build an approved issue. Stock has been checked by the caller.
    pub fn approved(
        id: GoodsIssueId,
        doc_number: impl Into<String>,
        header: IssueHeader,
        lines: Vec<GoodsIssueLine>,
        created_by: UserId,
        issued_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if lines.is_empty() {
            return Err(DomainError::validation("goods issue must have at least one line"));
        }
        if let Some(line) = lines.iter().find(|l| l.qty <= Decimal::ZERO) {
            return Err(DomainError::validation(format!(
                "line {}: quantity must be positive",
                line.line_no
            )));
        }
        let loan = match (header.purpose, header.loan) {
            (IssuePurpose::Loan, Some(terms)) if !terms.receiver.trim().is_empty() => Some(terms),
            (IssuePurpose::Loan, _) => {
                return Err(DomainError::validation("LOAN issue requires a loan receiver"));
            }
            (_, _) => None,
        };
        lines.iter().try_fold(Decimal::ZERO, |total, l| {
            let value = in_range(l.qty_base.checked_mul(l.unit_cost))?;
            in_range(total.checked_add(value))
        })?;

        Ok(Self {
            id,
            doc_number: doc_number.into(),
            company_id: header.company_id,
            warehouse_id: header.warehouse_id,
            bin_id: header.bin_id,
            purpose: header.purpose,
            status: IssueStatus::Approved,
            gl: GlState::pending(),
            loan,
            note: header.note,
            lines,
            issued_at,
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

    pub fn purpose(&self) -> IssuePurpose {
        self.purpose
    }

    pub fn status(&self) -> IssueStatus {
        self.status
    }

    pub fn gl(&self) -> &GlState {
        &self.gl
    }

    pub fn gl_status(&self) -> GlStatus {
        self.gl.status
    }

    pub fn loan(&self) -> Option<&LoanTerms> {
        self.loan.as_ref()
    }

    pub fn note(&self) -> Option<&str> {
        self.note.as_deref()
    }

    pub fn lines(&self) -> &[GoodsIssueLine] {
        &self.lines
    }

    pub fn line(&self, line_id: GoodsIssueLineId) -> Option<&GoodsIssueLine> {
        self.lines.iter().find(|l| l.id == line_id)
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub fn created_by(&self) -> UserId {
        self.created_by
    }

    pub fn total_value(&self) -> Decimal {
        self.lines.iter().map(GoodsIssueLine::value).sum()
    }

    /// Mutable access to the GL bookkeeping; bumps the version.
    pub fn gl_mut(&mut self) -> &mut GlState {
        self.version += 1;
        &mut self.gl
    }

    /// Settle loan lines with returned and written-off quantities.
    ///
    /// All lines are validated before any is applied, so a failing call leaves the
    /// issue untouched. Repeated entries for the same loan line accumulate.
    pub fn apply_loan_return(
        &mut self,
        returns: &[LoanReturnLine],
    ) -> DomainResult<Vec<LoanSettlement>> {
        if self.purpose != IssuePurpose::Loan {
            return Err(DomainError::validation(format!(
                "goods issue {} is not a loan",
                self.doc_number
            )));
        }
        if returns.is_empty() {
            return Err(DomainError::validation("loan return must have at least one line"));
        }

        let mut requested: HashMap<GoodsIssueLineId, Decimal> = HashMap::new();
        for r in returns {
            if r.qty.is_sign_negative() || r.qty_written_off.is_sign_negative() {
                return Err(DomainError::validation(
                    "returned and written-off quantities cannot be negative",
                ));
            }
            if r.qty.is_zero() && r.qty_written_off.is_zero() {
                return Err(DomainError::validation(
                    "loan return line must return or write off a positive quantity",
                ));
            }
            let line = self.line(r.loan_line_id).ok_or_else(|| {
                DomainError::not_found(format!("loan line {}", r.loan_line_id))
            })?;
            let total = requested.entry(r.loan_line_id).or_insert(Decimal::ZERO);
            let settling = in_range(r.qty.checked_add(r.qty_written_off))?;
            *total = in_range(total.checked_add(settling))?;
            if *total > line.outstanding_qty() {
                return Err(DomainError::validation(format!(
                    "line {}: return exceeds loaned quantity (loaned {}, already settled {}, requested {})",
                    line.line_no,
                    line.qty,
                    line.settled_qty(),
                    *total
                )));
            }
        }

        let mut settlements = Vec::with_capacity(returns.len());
        for r in returns {
            let Some(line) = self.lines.iter_mut().find(|l| l.id == r.loan_line_id) else {
                return Err(DomainError::invariant("validated loan line disappeared"));
            };
            line.qty_returned += r.qty;
            line.qty_written_off += r.qty_written_off;
            let factor = line.base_factor();
            settlements.push(LoanSettlement {
                loan_line_id: line.id,
                line_no: line.line_no,
                item_id: line.item_id,
                unit_id: line.unit_id,
                qty: r.qty,
                qty_base: r.qty * factor,
                qty_written_off: r.qty_written_off,
                qty_written_off_base: r.qty_written_off * factor,
                unit_cost: line.unit_cost,
            });
        }

        self.status = if self.lines.iter().all(GoodsIssueLine::is_settled) {
            IssueStatus::Returned
        } else {
            IssueStatus::PartialReturn
        };
        self.version += 1;
        Ok(settlements)
    }

    /// Recompute returned quantities from the base-unit totals of every RETURN receipt
    /// referencing this issue. Totals are distributed over lines of the same item in
    /// line order. Returns `true` when anything changed.
    pub fn apply_return_totals(&mut self, returned_base: &HashMap<ItemId, Decimal>) -> bool {
        let mut remaining = returned_base.clone();
        let mut changed = false;
        for line in &mut self.lines {
            let pool = remaining.entry(line.item_id).or_insert(Decimal::ZERO);
            let take = (*pool).min(line.qty_base).max(Decimal::ZERO);
            *pool -= take;
            let qty_returned = if line.qty_base.is_zero() {
                Decimal::ZERO
            } else {
                take / line.base_factor()
            };
            if qty_returned != line.qty_returned {
                line.qty_returned = qty_returned;
                changed = true;
            }
        }

        let status = if self.lines.iter().all(|l| l.qty_returned >= l.qty) {
            IssueStatus::Returned
        } else if self.lines.iter().any(|l| l.qty_returned > Decimal::ZERO) {
            IssueStatus::PartialReturn
        } else {
            IssueStatus::Approved
        };
        if status != self.status {
            self.status = status;
            changed = true;
        }
        if changed {
            self.version += 1;
        }
        changed
    }
}
