//! Double-entry journal entries.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use millerp_core::amount::{round_currency, within_tolerance};
use millerp_core::{
    AccountId, AggregateRoot, CompanyId, DomainError, DomainResult, ItemId, JournalEntryId,
    UserId, WarehouseId,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JournalStatus {
    Posted,
    Void,
}

/// Kind of document a journal entry was generated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JournalSourceType {
    GoodsIssue,
    GoodsReceipt,
    LoanReturn,
}

impl JournalSourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JournalSourceType::GoodsIssue => "GOODS_ISSUE",
            JournalSourceType::GoodsReceipt => "GOODS_RECEIPT",
            JournalSourceType::LoanReturn => "LOAN_RETURN",
        }
    }
}

impl core::str::FromStr for JournalSourceType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().replace('-', "_").as_str() {
            "GOODS_ISSUE" => Ok(JournalSourceType::GoodsIssue),
            "GOODS_RECEIPT" => Ok(JournalSourceType::GoodsReceipt),
            "LOAN_RETURN" => Ok(JournalSourceType::LoanReturn),
            other => Err(DomainError::validation(format!(
                "unknown journal source type: {other}"
            ))),
        }
    }
}

/// One side of a posting. Exactly one of `debit`/`credit` is non-zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalLine {
    pub account_id: AccountId,
    pub debit: Decimal,
    pub credit: Decimal,
    pub cost_center: Option<String>,
    pub dept: Option<String>,
    pub item_id: Option<ItemId>,
    pub warehouse_id: Option<WarehouseId>,
    pub memo: Option<String>,
}

impl JournalLine {
    pub fn debit(account_id: AccountId, amount: Decimal) -> Self {
        Self::side(account_id, round_currency(amount), Decimal::ZERO)
    }

    pub fn credit(account_id: AccountId, amount: Decimal) -> Self {
        Self::side(account_id, Decimal::ZERO, round_currency(amount))
    }

    fn side(account_id: AccountId, debit: Decimal, credit: Decimal) -> Self {
        Self {
            account_id,
            debit,
            credit,
            cost_center: None,
            dept: None,
            item_id: None,
            warehouse_id: None,
            memo: None,
        }
    }

    pub fn with_warehouse(mut self, warehouse_id: WarehouseId) -> Self {
        self.warehouse_id = Some(warehouse_id);
        self
    }

    pub fn with_item(mut self, item_id: ItemId) -> Self {
        self.item_id = Some(item_id);
        self
    }

    pub fn with_memo(mut self, memo: impl Into<String>) -> Self {
        self.memo = Some(memo.into());
        self
    }
}

/// Header data for a posting request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalContext {
    pub company_id: CompanyId,
    pub entry_date: NaiveDate,
    pub source_type: JournalSourceType,
    pub source_id: Uuid,
    pub description: String,
    pub created_by: UserId,
}

/// Check line shape and balance. Returns `(Σdebit, Σcredit)`.
pub fn validate_lines(lines: &[JournalLine]) -> DomainResult<(Decimal, Decimal)> {
    if lines.is_empty() {
        return Err(DomainError::validation("journal entry must have at least one line"));
    }
    let mut debit = Decimal::ZERO;
    let mut credit = Decimal::ZERO;
    for (idx, line) in lines.iter().enumerate() {
        if line.debit.is_sign_negative() || line.credit.is_sign_negative() {
            return Err(DomainError::validation(format!(
                "journal line {}: amounts cannot be negative",
                idx + 1
            )));
        }
        if !line.debit.is_zero() && !line.credit.is_zero() {
            return Err(DomainError::validation(format!(
                "journal line {}: cannot carry both debit and credit",
                idx + 1
            )));
        }
        debit += line.debit;
        credit += line.credit;
    }
    if !within_tolerance(debit, credit) {
        return Err(DomainError::UnbalancedEntry { debit, credit });
    }
    Ok((debit, credit))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JournalEntry {
    id: JournalEntryId,
    entry_number: String,
    company_id: CompanyId,
    entry_date: NaiveDate,
    source_type: JournalSourceType,
    source_id: Uuid,
    description: String,
    status: JournalStatus,
    posted_at: DateTime<Utc>,
    voided_at: Option<DateTime<Utc>>,
    voided_by: Option<UserId>,
    created_by: UserId,
    lines: Vec<JournalLine>,
    version: u64,
}

impl AggregateRoot for JournalEntry {
    type Id = JournalEntryId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl JournalEntry {
    /// Build a posted entry. Fails unless the lines are well formed and balanced.
    pub fn post(
        id: JournalEntryId,
        entry_number: impl Into<String>,
        context: JournalContext,
        lines: Vec<JournalLine>,
        posted_at: DateTime<Utc>,
    ) -> DomainResult<Self> {
        validate_lines(&lines)?;
        Ok(Self {
            id,
            entry_number: entry_number.into(),
            company_id: context.company_id,
            entry_date: context.entry_date,
            source_type: context.source_type,
            source_id: context.source_id,
            description: context.description,
            status: JournalStatus::Posted,
            posted_at,
            voided_at: None,
            voided_by: None,
            created_by: context.created_by,
            lines,
            version: 1,
        })
    }

    pub fn entry_number(&self) -> &str {
        &self.entry_number
    }

    pub fn company_id(&self) -> CompanyId {
        self.company_id
    }

    pub fn entry_date(&self) -> NaiveDate {
        self.entry_date
    }

    pub fn source_type(&self) -> JournalSourceType {
        self.source_type
    }

    pub fn source_id(&self) -> Uuid {
        self.source_id
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn status(&self) -> JournalStatus {
        self.status
    }

    pub fn posted_at(&self) -> DateTime<Utc> {
        self.posted_at
    }

    pub fn voided_at(&self) -> Option<DateTime<Utc>> {
        self.voided_at
    }

    pub fn voided_by(&self) -> Option<UserId> {
        self.voided_by
    }

    pub fn created_by(&self) -> UserId {
        self.created_by
    }

    pub fn lines(&self) -> &[JournalLine] {
        &self.lines
    }

    pub fn total_debit(&self) -> Decimal {
        self.lines.iter().map(|l| l.debit).sum()
    }

    pub fn total_credit(&self) -> Decimal {
        self.lines.iter().map(|l| l.credit).sum()
    }

    /// Mark the entry void. No reversal entry is created.
    pub fn void(&mut self, at: DateTime<Utc>, by: UserId) -> DomainResult<()> {
        if self.status == JournalStatus::Void {
            return Err(DomainError::conflict(format!(
                "journal entry {} is already void",
                self.entry_number
            )));
        }
        self.status = JournalStatus::Void;
        self.voided_at = Some(at);
        self.voided_by = Some(by);
        self.version += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn context() -> JournalContext {
        JournalContext {
            company_id: CompanyId::new(),
            entry_date: NaiveDate::from_ymd_opt(2026, 3, 14).unwrap(),
            source_type: JournalSourceType::GoodsIssue,
            source_id: Uuid::now_v7(),
            description: "GI/WH01/20260314/0001".to_string(),
            created_by: UserId::new(),
        }
    }

    #[test]
    fn balanced_entry_posts() {
        let lines = vec![
            JournalLine::debit(AccountId::new(), dec!(50000)),
            JournalLine::credit(AccountId::new(), dec!(50000)),
        ];
        let je = JournalEntry::post(
            JournalEntryId::new(),
            "JE/20260314/0001",
            context(),
            lines,
            Utc::now(),
        )
        .unwrap();
        assert_eq!(je.status(), JournalStatus::Posted);
        assert_eq!(je.total_debit(), je.total_credit());
    }

    #[test]
    fn cent_difference_is_tolerated_but_more_is_not() {
        let ok = vec![
            JournalLine::debit(AccountId::new(), dec!(100.00)),
            JournalLine::credit(AccountId::new(), dec!(100.01)),
        ];
        assert!(validate_lines(&ok).is_ok());

        let bad = vec![
            JournalLine::debit(AccountId::new(), dec!(100.00)),
            JournalLine::credit(AccountId::new(), dec!(100.02)),
        ];
        assert!(matches!(
            validate_lines(&bad),
            Err(DomainError::UnbalancedEntry { .. })
        ));
    }

    #[test]
    fn empty_and_two_sided_lines_are_rejected() {
        assert!(matches!(validate_lines(&[]), Err(DomainError::Validation(_))));

        let mut line = JournalLine::debit(AccountId::new(), dec!(5));
        line.credit = dec!(5);
        assert!(matches!(
            validate_lines(&[line]),
            Err(DomainError::Validation(_))
        ));
    }

    #[test]
    fn void_twice_is_a_conflict() {
        let mut je = JournalEntry::post(
            JournalEntryId::new(),
            "JE/20260314/0001",
            context(),
            vec![
                JournalLine::debit(AccountId::new(), dec!(1)),
                JournalLine::credit(AccountId::new(), dec!(1)),
            ],
            Utc::now(),
        )
        .unwrap();
        let actor = UserId::new();
        je.void(Utc::now(), actor).unwrap();
        assert_eq!(je.status(), JournalStatus::Void);
        assert_eq!(je.voided_by(), Some(actor));
        assert!(matches!(
            je.void(Utc::now(), actor),
            Err(DomainError::Conflict(_))
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 256,
            ..ProptestConfig::default()
        })]

        /// Any entry accepted by `post` has equal debit and credit totals (within a cent).
        #[test]
        fn posted_entries_are_balanced(
            cents in prop::collection::vec(1i64..10_000_000i64, 1..8),
            skew in 0i64..3,
        ) {
            let debit_account = AccountId::new();
            let credit_account = AccountId::new();
            let mut lines: Vec<JournalLine> = cents
                .iter()
                .map(|c| JournalLine::debit(debit_account, Decimal::new(*c, 2)))
                .collect();
            let total: i64 = cents.iter().sum();
            lines.push(JournalLine::credit(credit_account, Decimal::new(total + skew, 2)));

            match JournalEntry::post(
                JournalEntryId::new(),
                "JE/20260314/0001",
                context(),
                lines,
                Utc::now(),
            ) {
                Ok(je) => prop_assert!(within_tolerance(je.total_debit(), je.total_credit())),
                Err(DomainError::UnbalancedEntry { .. }) => prop_assert!(skew > 1),
                Err(other) => prop_assert!(false, "unexpected error: {:?}", other),
            }
        }
    }
}
