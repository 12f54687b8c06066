//! Inbound workflows: plain returns, new-item opening stock, and loan returns.
//!
//! Same two-stage shape as outbound: the stock movement commits first, then the GL
//! stage records its outcome on the receipt.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use millerp_accounting::{
    JournalContext, JournalLine, JournalSourceType, LoanReturnValues, build_loan_return_gl_lines,
    build_opening_stock_gl_lines,
};
use millerp_core::amount::{in_range, round_currency};
use millerp_core::{
    AggregateRoot, BinId, DomainError, DomainResult, ExpectedVersion, GoodsIssueId,
    GoodsReceiptId, ItemId, UnitId, UserId, WarehouseId,
};
use millerp_inventory::{
    GoodsIssue, GoodsReceipt, GoodsReceiptLine, IssuePurpose, Item, LoanReturnLine, Movement,
    ReceiptHeader, ReceiptSourceType, ReferenceType, StockBalance, StockLocation, UnitConversion,
};

use crate::error::ServiceResult;
use crate::gl::{post_journal_entry_in_tx, run_gl_stage};
use crate::numbering::{DocumentKind, next_document_number};
use crate::stock::{apply_movement_in_tx, resolve_item, resolve_location};
use crate::store::{WarehouseStore, WarehouseTx};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundLineRequest {
    pub item_id: ItemId,
    pub unit_id: UnitId,
    pub qty: Decimal,
}

fn default_source_type() -> ReceiptSourceType {
    ReceiptSourceType::Return
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundRequest {
    pub warehouse_id: WarehouseId,
    #[serde(default)]
    pub bin_id: Option<BinId>,
    #[serde(default = "default_source_type")]
    pub source_type: ReceiptSourceType,
    /// Free-text reference; linked to an issue when it matches a GI document number.
    #[serde(default)]
    pub source_ref: Option<String>,
    #[serde(default)]
    pub source_issue_id: Option<GoodsIssueId>,
    #[serde(default)]
    pub note: Option<String>,
    pub lines: Vec<InboundLineRequest>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewItemInboundRequest {
    pub warehouse_id: WarehouseId,
    #[serde(default)]
    pub bin_id: Option<BinId>,
    pub sku: String,
    pub name: String,
    pub base_unit_id: UnitId,
    #[serde(default)]
    pub conversions: Vec<UnitConversion>,
    /// Unit of `qty` and `unit_cost`; the base unit when absent.
    #[serde(default)]
    pub unit_id: Option<UnitId>,
    pub qty: Decimal,
    pub unit_cost: Decimal,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewItemInboundResult {
    pub item: Item,
    pub receipt: GoodsReceipt,
    pub balance: StockBalance,
}

/// Loan return; the location defaults to the loan's own warehouse and bin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanReturnRequest {
    #[serde(default)]
    pub warehouse_id: Option<WarehouseId>,
    #[serde(default)]
    pub bin_id: Option<BinId>,
    pub lines: Vec<LoanReturnLine>,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanReturnResult {
    pub receipt: GoodsReceipt,
    pub issue: GoodsIssue,
    pub returned_value: Decimal,
    pub loss_value: Decimal,
}

/// Load a receipt, apply `f`, and save it with an optimistic version check.
pub(crate) fn update_goods_receipt(
    tx: &mut dyn WarehouseTx,
    id: GoodsReceiptId,
    f: impl FnOnce(&mut GoodsReceipt),
) -> ServiceResult<GoodsReceipt> {
    let mut receipt = tx
        .goods_receipt(id)
        .ok_or_else(|| DomainError::not_found(format!("goods receipt {id}")))?;
    let expected = ExpectedVersion::Exact(receipt.version());
    f(&mut receipt);
    tx.save_goods_receipt(receipt.clone(), expected)?;
    Ok(receipt)
}

fn receipt_movement(
    receipt: &GoodsReceipt,
    line: &GoodsReceiptLine,
    location: StockLocation,
    actor: UserId,
) -> Movement {
    Movement {
        item_id: line.item_id,
        location,
        qty_delta: line.qty_base,
        unit_cost: Some(line.unit_cost),
        reference_type: ReferenceType::In,
        reference_id: (*receipt.id()).into(),
        note: Some(format!("{} line {}", receipt.doc_number(), line.line_no)),
        actor,
        occurred_at: receipt.received_at(),
    }
}

/// Issue a RETURN receipt is linked to, by id first, then by document number.
fn linked_issue(
    tx: &dyn WarehouseTx,
    request: &InboundRequest,
) -> ServiceResult<Option<GoodsIssue>> {
    if let Some(id) = request.source_issue_id {
        let issue = tx
            .goods_issue(id)
            .ok_or_else(|| DomainError::not_found(format!("goods issue {id}")))?;
        return Ok(Some(issue));
    }
    Ok(request
        .source_ref
        .as_deref()
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .and_then(|r| tx.goods_issue_by_doc_number(r)))
}

/// Base-unit quantities already returned against `issue_id`, per item.
fn returned_totals(tx: &dyn WarehouseTx, issue_id: GoodsIssueId) -> HashMap<ItemId, Decimal> {
    let mut totals = HashMap::new();
    for receipt in tx.receipts_for_issue(issue_id) {
        if receipt.source_type() != ReceiptSourceType::Return {
            continue;
        }
        for line in receipt.lines() {
            *totals.entry(line.item_id).or_insert(Decimal::ZERO) += line.qty_base;
        }
    }
    totals
}

fn commit_return(
    tx: &mut dyn WarehouseTx,
    request: &InboundRequest,
    actor: UserId,
    now: DateTime<Utc>,
) -> ServiceResult<GoodsReceipt> {
    match request.source_type {
        ReceiptSourceType::Return => {}
        ReceiptSourceType::NewItem => {
            return Err(DomainError::validation(
                "NEW_ITEM receipts are created through the new-item inbound operation",
            )
            .into());
        }
        ReceiptSourceType::LoanReturn => {
            return Err(DomainError::validation(
                "LOAN_RETURN receipts are created through the loan return operation",
            )
            .into());
        }
    }

    let location = StockLocation::new(request.warehouse_id, request.bin_id);
    let warehouse = resolve_location(tx, location)?;
    if request.lines.is_empty() {
        return Err(DomainError::validation("goods receipt must have at least one line").into());
    }

    let mut lines = Vec::with_capacity(request.lines.len());
    for (idx, line) in request.lines.iter().enumerate() {
        let line_no = idx as u32 + 1;
        if line.qty <= Decimal::ZERO {
            return Err(DomainError::validation(format!(
                "line {line_no}: quantity must be positive"
            ))
            .into());
        }
        let item = resolve_item(tx, line.item_id)?;
        if tx.unit(line.unit_id).is_none() {
            return Err(DomainError::validation(format!(
                "line {line_no}: unit {} not found",
                line.unit_id
            ))
            .into());
        }
        lines.push(GoodsReceiptLine {
            line_no,
            item_id: item.id,
            unit_id: line.unit_id,
            qty: line.qty,
            qty_base: item.to_base(line.unit_id, line.qty)?,
            unit_cost: Decimal::ZERO,
            loan_issue_line_id: None,
            qty_written_off: Decimal::ZERO,
        });
    }

    let issue = linked_issue(tx, request)?;
    if let Some(issue) = &issue {
        if issue.purpose() == IssuePurpose::Loan {
            return Err(DomainError::validation(format!(
                "goods issue {} is a loan; use the loan return operation",
                issue.doc_number()
            ))
            .into());
        }
        let mut issued: HashMap<ItemId, Decimal> = HashMap::new();
        for l in issue.lines() {
            *issued.entry(l.item_id).or_insert(Decimal::ZERO) += l.qty_base;
        }
        let mut returning = returned_totals(tx, *issue.id());
        for line in &lines {
            let Some(limit) = issued.get(&line.item_id) else {
                return Err(DomainError::validation(format!(
                    "line {}: item {} was not issued on {}",
                    line.line_no,
                    line.item_id,
                    issue.doc_number()
                ))
                .into());
            };
            let total = returning.entry(line.item_id).or_insert(Decimal::ZERO);
            *total = in_range(total.checked_add(line.qty_base))?;
            if *total > *limit {
                return Err(DomainError::validation(format!(
                    "line {}: return exceeds issued quantity on {}",
                    line.line_no,
                    issue.doc_number()
                ))
                .into());
            }
        }
    }

    let doc_number =
        next_document_number(tx, DocumentKind::GoodsReceipt, &warehouse.code, now.date_naive());
    let receipt = GoodsReceipt::new(
        GoodsReceiptId::new(),
        doc_number,
        ReceiptHeader {
            company_id: warehouse.company_id,
            warehouse_id: warehouse.id,
            bin_id: request.bin_id,
            source_type: ReceiptSourceType::Return,
            source_ref: request.source_ref.clone(),
            source_issue_id: issue.as_ref().map(|i| *i.id()),
            note: request.note.clone(),
        },
        lines,
        actor,
        now,
    )?;

    for line in receipt.lines() {
        apply_movement_in_tx(tx, &receipt_movement(&receipt, line, location, actor))?;
    }
    tx.insert_goods_receipt(receipt.clone())?;
    Ok(receipt)
}

fn commit_new_item(
    tx: &mut dyn WarehouseTx,
    request: &NewItemInboundRequest,
    actor: UserId,
    now: DateTime<Utc>,
) -> ServiceResult<(Item, GoodsReceipt, StockBalance)> {
    let location = StockLocation::new(request.warehouse_id, request.bin_id);
    let warehouse = resolve_location(tx, location)?;

    if request.qty <= Decimal::ZERO {
        return Err(DomainError::validation("quantity must be positive").into());
    }
    if request.unit_cost.is_sign_negative() {
        return Err(DomainError::validation("unit cost cannot be negative").into());
    }
    for unit_id in std::iter::once(request.base_unit_id)
        .chain(request.conversions.iter().map(|c| c.unit_id))
    {
        if tx.unit(unit_id).is_none() {
            return Err(DomainError::validation(format!("unit {unit_id} not found")).into());
        }
    }
    if let Some(existing) = tx.item_by_sku(&request.sku) {
        return Err(DomainError::conflict(format!("sku {} already exists", existing.sku)).into());
    }

    let item = Item::new(
        ItemId::new(),
        request.sku.clone(),
        request.name.clone(),
        request.base_unit_id,
        request.conversions.clone(),
    )?;
    let unit_id = request.unit_id.unwrap_or(item.base_unit_id);
    let qty_base = item.to_base(unit_id, request.qty)?;
    // Cost is quoted per request unit; the balance carries cost per base unit.
    let quoted_value = in_range(request.unit_cost.checked_mul(request.qty))?;
    let base_cost = in_range(quoted_value.checked_div(qty_base))?;

    tx.insert_item(item.clone())?;

    let doc_number =
        next_document_number(tx, DocumentKind::GoodsReceipt, &warehouse.code, now.date_naive());
    let receipt = GoodsReceipt::new(
        GoodsReceiptId::new(),
        doc_number,
        ReceiptHeader {
            company_id: warehouse.company_id,
            warehouse_id: warehouse.id,
            bin_id: request.bin_id,
            source_type: ReceiptSourceType::NewItem,
            source_ref: Some(item.sku.clone()),
            source_issue_id: None,
            note: request.note.clone(),
        },
        vec![GoodsReceiptLine {
            line_no: 1,
            item_id: item.id,
            unit_id,
            qty: request.qty,
            qty_base,
            unit_cost: base_cost,
            loan_issue_line_id: None,
            qty_written_off: Decimal::ZERO,
        }],
        actor,
        now,
    )?;

    let mut balance = None;
    for line in receipt.lines() {
        let result = apply_movement_in_tx(tx, &receipt_movement(&receipt, line, location, actor))?;
        balance = Some(result.balance);
    }
    let balance = balance
        .ok_or_else(|| DomainError::invariant("opening receipt produced no movement"))?;
    tx.insert_goods_receipt(receipt.clone())?;
    Ok((item, receipt, balance))
}

fn commit_loan_return(
    tx: &mut dyn WarehouseTx,
    loan_issue_id: GoodsIssueId,
    request: &LoanReturnRequest,
    actor: UserId,
    now: DateTime<Utc>,
) -> ServiceResult<(GoodsReceipt, GoodsIssue, LoanReturnValues)> {
    let mut issue = tx
        .goods_issue(loan_issue_id)
        .ok_or_else(|| DomainError::not_found(format!("goods issue {loan_issue_id}")))?;
    let location = match request.warehouse_id {
        Some(warehouse_id) => StockLocation::new(warehouse_id, request.bin_id),
        None => issue.location(),
    };
    let warehouse = resolve_location(tx, location)?;

    let expected = ExpectedVersion::Exact(issue.version());
    let settlements = issue.apply_loan_return(&request.lines)?;

    let lines = settlements
        .iter()
        .enumerate()
        .map(|(idx, s)| GoodsReceiptLine {
            line_no: idx as u32 + 1,
            item_id: s.item_id,
            unit_id: s.unit_id,
            qty: s.qty,
            qty_base: s.qty_base,
            unit_cost: s.unit_cost,
            loan_issue_line_id: Some(s.loan_line_id),
            qty_written_off: s.qty_written_off,
        })
        .collect();

    let doc_number =
        next_document_number(tx, DocumentKind::GoodsReceipt, &warehouse.code, now.date_naive());
    let receipt = GoodsReceipt::new(
        GoodsReceiptId::new(),
        doc_number,
        ReceiptHeader {
            company_id: issue.company_id(),
            warehouse_id: warehouse.id,
            bin_id: location.bin_id,
            source_type: ReceiptSourceType::LoanReturn,
            source_ref: Some(issue.doc_number().to_string()),
            source_issue_id: Some(loan_issue_id),
            note: request.note.clone(),
        },
        lines,
        actor,
        now,
    )?;

    // Written-off-only lines settle the loan without moving stock.
    for line in receipt.lines().iter().filter(|l| l.qty_base > Decimal::ZERO) {
        apply_movement_in_tx(tx, &receipt_movement(&receipt, line, location, actor))?;
    }

    tx.save_goods_issue(issue.clone(), expected)?;
    tx.insert_goods_receipt(receipt.clone())?;
    Ok((receipt, issue, LoanReturnValues::from_settlements(&settlements)))
}

pub struct InboundService<S> {
    store: Arc<S>,
}

impl<S> Clone for InboundService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: WarehouseStore> InboundService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Receive returned goods at zero cost. The average cost of the location is kept.
    #[instrument(skip_all, fields(warehouse_id = %request.warehouse_id))]
    pub fn create_inbound(
        &self,
        request: InboundRequest,
        actor: UserId,
    ) -> ServiceResult<GoodsReceipt> {
        let now = Utc::now();
        let receipt = self
            .store
            .transaction(|tx| commit_return(tx, &request, actor, now))?;
        info!(
            doc_number = receipt.doc_number(),
            lines = receipt.lines().len(),
            linked = receipt.source_issue_id().is_some(),
            "return receipt committed"
        );

        if let Some(issue_id) = receipt.source_issue_id() {
            self.refresh_return_status(issue_id);
        }
        Ok(self.mark_not_required(receipt))
    }

    /// Create an item together with its opening stock, then post the opening value.
    #[instrument(skip_all, fields(sku = %request.sku, warehouse_id = %request.warehouse_id))]
    pub fn create_new_item_inbound(
        &self,
        request: NewItemInboundRequest,
        actor: UserId,
    ) -> ServiceResult<NewItemInboundResult> {
        let now = Utc::now();
        let (item, receipt, balance) = self
            .store
            .transaction(|tx| commit_new_item(tx, &request, actor, now))?;
        info!(
            doc_number = receipt.doc_number(),
            item_id = %item.id,
            total_value = %receipt.total_value(),
            "new item received"
        );

        let receipt = if round_currency(receipt.total_value()).is_zero() {
            self.mark_not_required(receipt)
        } else {
            self.post_receipt_gl(receipt, actor, JournalSourceType::GoodsReceipt, |tx, r| {
                let accounts = tx.system_accounts(r.company_id());
                build_opening_stock_gl_lines(r, &accounts)
            })
        };
        Ok(NewItemInboundResult {
            item,
            receipt,
            balance,
        })
    }

    /// Settle loan lines: returned quantities go back to stock at the loan's cost,
    /// written-off quantities are booked as loan loss.
    #[instrument(skip_all, fields(loan_issue_id = %loan_issue_id))]
    pub fn process_loan_return(
        &self,
        loan_issue_id: GoodsIssueId,
        request: LoanReturnRequest,
        actor: UserId,
    ) -> ServiceResult<LoanReturnResult> {
        let now = Utc::now();
        let (receipt, issue, values) = self
            .store
            .transaction(|tx| commit_loan_return(tx, loan_issue_id, &request, actor, now))?;
        info!(
            doc_number = receipt.doc_number(),
            loan = issue.doc_number(),
            status = ?issue.status(),
            returned_value = %values.returned,
            loss_value = %values.loss,
            "loan return committed"
        );

        let receipt = if values.is_zero() {
            self.mark_not_required(receipt)
        } else {
            self.post_receipt_gl(receipt, actor, JournalSourceType::LoanReturn, |tx, r| {
                let loan = tx
                    .goods_issue(loan_issue_id)
                    .ok_or_else(|| DomainError::not_found(format!("goods issue {loan_issue_id}")))?;
                let accounts = tx.system_accounts(r.company_id());
                build_loan_return_gl_lines(&loan, values, &accounts)
            })
        };
        Ok(LoanReturnResult {
            receipt,
            issue,
            returned_value: values.returned,
            loss_value: values.loss,
        })
    }

    pub fn get_goods_receipt(&self, id: GoodsReceiptId) -> ServiceResult<GoodsReceipt> {
        self.store.transaction(|tx| {
            tx.goods_receipt(id)
                .ok_or_else(|| DomainError::not_found(format!("goods receipt {id}")).into())
        })
    }

    /// Recompute returned quantities and status of a RETURN-linked issue.
    fn refresh_return_status(&self, issue_id: GoodsIssueId) {
        let res = self.store.transaction(|tx| -> ServiceResult<GoodsIssue> {
            let totals = returned_totals(&*tx, issue_id);
            let mut issue = tx
                .goods_issue(issue_id)
                .ok_or_else(|| DomainError::not_found(format!("goods issue {issue_id}")))?;
            let expected = ExpectedVersion::Exact(issue.version());
            if issue.apply_return_totals(&totals) {
                tx.save_goods_issue(issue.clone(), expected)?;
            }
            Ok(issue)
        });
        match res {
            Ok(issue) => info!(
                issue = issue.doc_number(),
                status = ?issue.status(),
                "issue return status refreshed"
            ),
            Err(err) => warn!(issue_id = %issue_id, error = %err, "could not refresh issue status"),
        }
    }

    fn mark_not_required(&self, receipt: GoodsReceipt) -> GoodsReceipt {
        let id = *receipt.id();
        match self
            .store
            .transaction(|tx| update_goods_receipt(tx, id, |r| r.gl_mut().not_required()))
        {
            Ok(updated) => updated,
            Err(err) => {
                warn!(doc_number = receipt.doc_number(), error = %err, "could not record GL status");
                receipt
            }
        }
    }

    fn post_receipt_gl(
        &self,
        receipt: GoodsReceipt,
        actor: UserId,
        source_type: JournalSourceType,
        build: impl FnOnce(
            &dyn WarehouseTx,
            &GoodsReceipt,
        ) -> DomainResult<Vec<JournalLine>>,
    ) -> GoodsReceipt {
        let id = *receipt.id();
        let doc_number = receipt.doc_number().to_string();
        run_gl_stage(
            &*self.store,
            &doc_number,
            receipt.clone(),
            |tx| {
                let current = tx
                    .goods_receipt(id)
                    .ok_or_else(|| DomainError::not_found(format!("goods receipt {id}")))?;
                let lines = build(&*tx, &current)?;
                let context = JournalContext {
                    company_id: current.company_id(),
                    entry_date: current.received_at().date_naive(),
                    source_type,
                    source_id: id.into(),
                    description: format!(
                        "Goods receipt {} ({})",
                        current.doc_number(),
                        current.source_type().as_str()
                    ),
                    created_by: actor,
                };
                let entry = post_journal_entry_in_tx(tx, context, lines, Utc::now())?;
                let entry_id = *entry.id();
                update_goods_receipt(tx, id, |r| r.gl_mut().posted(entry_id))
            },
            |tx, error| update_goods_receipt(tx, id, |r| r.gl_mut().failed(error)),
        )
    }
}
