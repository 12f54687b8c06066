//! GL line builders for inventory movements.
//!
//! Pure functions: given a movement document and an [`AccountResolver`], produce the
//! balanced lines to post. A missing mapping is an error, never a dropped line.

use rust_decimal::Decimal;

use millerp_core::DomainResult;
use millerp_core::amount::round_currency;
use millerp_inventory::{GoodsIssue, GoodsReceipt, LoanSettlement};

use crate::accounts::{AccountResolver, SystemAccountKey};
use crate::journal::JournalLine;

/// Debit the purpose account, credit general inventory, for the issue's total value.
pub fn build_goods_issue_gl_lines(
    issue: &GoodsIssue,
    accounts: &impl AccountResolver,
) -> DomainResult<Vec<JournalLine>> {
    let debit_account = accounts.resolve(SystemAccountKey::debit_for_purpose(issue.purpose()))?;
    let inventory = accounts.resolve(SystemAccountKey::InventoryGeneral)?;
    let amount = round_currency(issue.total_value());
    let memo = format!("{} {}", issue.purpose().as_str(), issue.doc_number());

    Ok(vec![
        JournalLine::debit(debit_account, amount)
            .with_warehouse(issue.warehouse_id())
            .with_memo(memo.clone()),
        JournalLine::credit(inventory, amount)
            .with_warehouse(issue.warehouse_id())
            .with_memo(memo),
    ])
}

/// Value split of one loan return call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoanReturnValues {
    pub returned: Decimal,
    pub loss: Decimal,
}

impl LoanReturnValues {
    /// `loss` is settled loan value minus returned value, i.e. the written-off value.
    pub fn from_settlements(settlements: &[LoanSettlement]) -> Self {
        let returned: Decimal = settlements.iter().map(LoanSettlement::returned_value).sum();
        let settled: Decimal = settlements
            .iter()
            .map(|s| s.returned_value() + s.written_off_value())
            .sum();
        Self {
            returned: round_currency(returned),
            loss: round_currency(settled - returned),
        }
    }

    pub fn is_zero(&self) -> bool {
        self.returned.is_zero() && self.loss <= Decimal::ZERO
    }
}

/// Returned value goes back to general inventory; written-off value to loan loss.
/// Both sides credit inventory-on-loan. Yields 2 or 4 lines.
pub fn build_loan_return_gl_lines(
    loan: &GoodsIssue,
    values: LoanReturnValues,
    accounts: &impl AccountResolver,
) -> DomainResult<Vec<JournalLine>> {
    let on_loan = accounts.resolve(SystemAccountKey::InventoryOnLoan)?;
    let mut lines = Vec::with_capacity(4);

    if values.returned > Decimal::ZERO {
        let inventory = accounts.resolve(SystemAccountKey::InventoryGeneral)?;
        let memo = format!("loan return {}", loan.doc_number());
        lines.push(
            JournalLine::debit(inventory, values.returned)
                .with_warehouse(loan.warehouse_id())
                .with_memo(memo.clone()),
        );
        lines.push(
            JournalLine::credit(on_loan, values.returned)
                .with_warehouse(loan.warehouse_id())
                .with_memo(memo),
        );
    }

    if values.loss > Decimal::ZERO {
        let loan_loss = accounts.resolve(SystemAccountKey::LoanLoss)?;
        let memo = format!("loan loss {}", loan.doc_number());
        lines.push(
            JournalLine::debit(loan_loss, values.loss)
                .with_warehouse(loan.warehouse_id())
                .with_memo(memo.clone()),
        );
        lines.push(
            JournalLine::credit(on_loan, values.loss)
                .with_warehouse(loan.warehouse_id())
                .with_memo(memo),
        );
    }

    Ok(lines)
}

/// Opening stock of a new item: debit general inventory, credit opening balance.
pub fn build_opening_stock_gl_lines(
    receipt: &GoodsReceipt,
    accounts: &impl AccountResolver,
) -> DomainResult<Vec<JournalLine>> {
    let inventory = accounts.resolve(SystemAccountKey::InventoryGeneral)?;
    let opening = accounts.resolve(SystemAccountKey::OpeningBalance)?;
    let amount = round_currency(receipt.total_value());
    let memo = format!("opening stock {}", receipt.doc_number());
    let item_id = receipt.lines().first().map(|l| l.item_id);

    let mut debit = JournalLine::debit(inventory, amount)
        .with_warehouse(receipt.warehouse_id())
        .with_memo(memo.clone());
    let mut credit = JournalLine::credit(opening, amount)
        .with_warehouse(receipt.warehouse_id())
        .with_memo(memo);
    if let Some(item_id) = item_id {
        debit = debit.with_item(item_id);
        credit = credit.with_item(item_id);
    }
    Ok(vec![debit, credit])
}
