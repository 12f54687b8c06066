//! Outbound (goods issue) workflow.
//!
//! Validation, availability check, numbering, the header/lines insert and the stock
//! decrements all run in one transaction. The GL stage runs after that commits.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};

use millerp_accounting::{JournalContext, JournalSourceType, build_goods_issue_gl_lines};
use millerp_core::amount::{in_range, round_currency};
use millerp_core::{
    AggregateRoot, BinId, DomainError, ExpectedVersion, GoodsIssueId, ItemId, StockShortfall,
    UnitId, UserId, WarehouseId,
};
use millerp_inventory::{
    BalanceKey, GoodsIssue, GoodsIssueLine, IssueHeader, IssuePurpose, Item, LoanTerms,
    Movement, ReferenceType, StockLocation,
};

use crate::error::ServiceResult;
use crate::gl::{post_journal_entry_in_tx, run_gl_stage};
use crate::numbering::{DocumentKind, next_document_number};
use crate::stock::{apply_movement_in_tx, resolve_item, resolve_location, unit_code};
use crate::store::{WarehouseStore, WarehouseTx};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundLineRequest {
    pub item_id: ItemId,
    pub unit_id: UnitId,
    pub qty: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundRequest {
    pub warehouse_id: WarehouseId,
    #[serde(default)]
    pub bin_id: Option<BinId>,
    pub purpose: IssuePurpose,
    #[serde(default)]
    pub loan_receiver: Option<String>,
    #[serde(default)]
    pub expected_return_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub note: Option<String>,
    pub lines: Vec<OutboundLineRequest>,
}

/// Load an issue, apply `f`, and save it with an optimistic version check.
pub(crate) fn update_goods_issue<R>(
    tx: &mut dyn WarehouseTx,
    id: GoodsIssueId,
    f: impl FnOnce(&mut GoodsIssue) -> R,
) -> ServiceResult<(GoodsIssue, R)> {
    let mut issue = tx
        .goods_issue(id)
        .ok_or_else(|| DomainError::not_found(format!("goods issue {id}")))?;
    let expected = ExpectedVersion::Exact(issue.version());
    let out = f(&mut issue);
    tx.save_goods_issue(issue.clone(), expected)?;
    Ok((issue, out))
}

struct ResolvedLine {
    line_no: u32,
    item: Item,
    unit_id: UnitId,
    qty: Decimal,
    qty_base: Decimal,
}

fn commit_issue(
    tx: &mut dyn WarehouseTx,
    request: &OutboundRequest,
    actor: UserId,
    now: DateTime<Utc>,
) -> ServiceResult<GoodsIssue> {
    let location = StockLocation::new(request.warehouse_id, request.bin_id);
    let warehouse = resolve_location(tx, location)?;

    if request.lines.is_empty() {
        return Err(DomainError::validation("goods issue must have at least one line").into());
    }
    let loan = match request.purpose {
        IssuePurpose::Loan => {
            let receiver = request
                .loan_receiver
                .as_deref()
                .map(str::trim)
                .filter(|r| !r.is_empty())
                .ok_or_else(|| DomainError::validation("LOAN issue requires a loan receiver"))?;
            Some(LoanTerms {
                receiver: receiver.to_string(),
                expected_return_at: request.expected_return_at,
            })
        }
        _ => None,
    };

    let mut resolved = Vec::with_capacity(request.lines.len());
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
        let factor = item.conversion_factor(line.unit_id).ok_or_else(|| {
            DomainError::validation(format!(
                "line {line_no}: unit {} is not convertible for item {}",
                line.unit_id, item.sku
            ))
        })?;
        let qty_base = in_range(line.qty.checked_mul(factor))?;
        resolved.push(ResolvedLine {
            line_no,
            item,
            unit_id: line.unit_id,
            qty: line.qty,
            qty_base,
        });
    }

    let mut balances: HashMap<ItemId, (Decimal, Decimal)> = HashMap::new();
    for line in &resolved {
        balances.entry(line.item.id).or_insert_with(|| {
            let b = tx.balance(&BalanceKey::new(line.item.id, location));
            let qty = b.as_ref().map(|b| b.qty_on_hand).unwrap_or(Decimal::ZERO);
            let avg = b.as_ref().map(|b| b.avg_cost).unwrap_or(Decimal::ZERO);
            (qty, avg)
        });
    }

    // Lines of one item draw on the same balance in line order; a short line reports
    // what the earlier lines left over.
    let mut remaining: HashMap<ItemId, Decimal> =
        balances.iter().map(|(id, (qty, _))| (*id, *qty)).collect();
    let mut shortfalls = Vec::new();
    for l in &resolved {
        let left = remaining.entry(l.item.id).or_insert(Decimal::ZERO);
        if l.qty_base > *left {
            shortfalls.push(StockShortfall {
                line_no: l.line_no,
                item_id: l.item.id,
                unit_code: unit_code(&*tx, l.unit_id),
                requested: l.qty,
                available: l.item.from_base(l.unit_id, *left)?,
            });
            *left = Decimal::ZERO;
        } else {
            *left -= l.qty_base;
        }
    }
    if !shortfalls.is_empty() {
        return Err(DomainError::InsufficientStock(shortfalls).into());
    }

    let doc_number =
        next_document_number(tx, DocumentKind::GoodsIssue, &warehouse.code, now.date_naive());
    let lines: Vec<GoodsIssueLine> = resolved
        .iter()
        .map(|l| {
            GoodsIssueLine::new(
                l.line_no,
                l.item.id,
                l.unit_id,
                l.qty,
                l.qty_base,
                balances[&l.item.id].1,
            )
        })
        .collect();
    let issue = GoodsIssue::approved(
        GoodsIssueId::new(),
        doc_number,
        IssueHeader {
            company_id: warehouse.company_id,
            warehouse_id: warehouse.id,
            bin_id: request.bin_id,
            purpose: request.purpose,
            loan,
            note: request.note.clone(),
        },
        lines,
        actor,
        now,
    )?;

    for line in issue.lines() {
        apply_movement_in_tx(
            tx,
            &Movement {
                item_id: line.item_id,
                location,
                qty_delta: -line.qty_base,
                unit_cost: None,
                reference_type: ReferenceType::Out,
                reference_id: (*issue.id()).into(),
                note: Some(format!("{} line {}", issue.doc_number(), line.line_no)),
                actor,
                occurred_at: now,
            },
        )?;
    }

    tx.insert_goods_issue(issue.clone())?;
    Ok(issue)
}

pub struct OutboundService<S> {
    store: Arc<S>,
}

impl<S> Clone for OutboundService<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: WarehouseStore> OutboundService<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Issue stock and post it to the GL. The returned document carries the final
    /// `gl_status`; a GL failure never undoes the stock movement.
    #[instrument(skip_all, fields(purpose = request.purpose.as_str(), warehouse_id = %request.warehouse_id))]
    pub fn create_outbound(
        &self,
        request: OutboundRequest,
        actor: UserId,
    ) -> ServiceResult<GoodsIssue> {
        let now = Utc::now();
        let issue = self
            .store
            .transaction(|tx| commit_issue(tx, &request, actor, now))?;
        info!(
            doc_number = issue.doc_number(),
            lines = issue.lines().len(),
            total_value = %issue.total_value(),
            "goods issue committed"
        );
        Ok(self.post_issue(issue, actor))
    }

    pub fn get_goods_issue(&self, id: GoodsIssueId) -> ServiceResult<GoodsIssue> {
        self.store.transaction(|tx| {
            tx.goods_issue(id)
                .ok_or_else(|| DomainError::not_found(format!("goods issue {id}")).into())
        })
    }

    fn post_issue(&self, issue: GoodsIssue, actor: UserId) -> GoodsIssue {
        let id = *issue.id();
        let doc_number = issue.doc_number().to_string();

        if round_currency(issue.total_value()).is_zero() {
            let res = self.store.transaction(|tx| {
                update_goods_issue(tx, id, |i| i.gl_mut().not_required()).map(|(i, _)| i)
            });
            return match res {
                Ok(updated) => updated,
                Err(err) => {
                    warn!(doc_number, error = %err, "could not record GL status");
                    issue
                }
            };
        }

        run_gl_stage(
            &*self.store,
            &doc_number,
            issue.clone(),
            |tx| {
                let current = tx
                    .goods_issue(id)
                    .ok_or_else(|| DomainError::not_found(format!("goods issue {id}")))?;
                let accounts = tx.system_accounts(current.company_id());
                let lines = build_goods_issue_gl_lines(&current, &accounts)?;
                let context = JournalContext {
                    company_id: current.company_id(),
                    entry_date: current.issued_at().date_naive(),
                    source_type: JournalSourceType::GoodsIssue,
                    source_id: id.into(),
                    description: format!(
                        "Goods issue {} ({})",
                        current.doc_number(),
                        current.purpose().as_str()
                    ),
                    created_by: actor,
                };
                let entry = post_journal_entry_in_tx(tx, context, lines, Utc::now())?;
                let entry_id = *entry.id();
                update_goods_issue(tx, id, |i| i.gl_mut().posted(entry_id)).map(|(i, _)| i)
            },
            |tx, error| {
                update_goods_issue(tx, id, |i| i.gl_mut().failed(error)).map(|(i, _)| i)
            },
        )
    }
}
