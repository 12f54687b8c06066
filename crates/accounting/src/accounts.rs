//! Logical system accounts and their per-company mapping to ledger accounts.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use millerp_core::{AccountId, CompanyId, DomainError, DomainResult};
use millerp_inventory::IssuePurpose;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SystemAccountKey {
    InventoryGeneral,
    InventoryOnLoan,
    IssueExpense,
    ProductionConsumption,
    InventoryAdjustmentLoss,
    LoanLoss,
    OpeningBalance,
}

impl SystemAccountKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            SystemAccountKey::InventoryGeneral => "INVENTORY_GENERAL",
            SystemAccountKey::InventoryOnLoan => "INVENTORY_ON_LOAN",
            SystemAccountKey::IssueExpense => "ISSUE_EXPENSE",
            SystemAccountKey::ProductionConsumption => "PRODUCTION_CONSUMPTION",
            SystemAccountKey::InventoryAdjustmentLoss => "INVENTORY_ADJUSTMENT_LOSS",
            SystemAccountKey::LoanLoss => "LOAN_LOSS",
            SystemAccountKey::OpeningBalance => "OPENING_BALANCE",
        }
    }

    /// Debit side of a goods issue. The credit side is always `InventoryGeneral`.
    pub fn debit_for_purpose(purpose: IssuePurpose) -> Self {
        match purpose {
            IssuePurpose::Issue => SystemAccountKey::IssueExpense,
            IssuePurpose::Prod => SystemAccountKey::ProductionConsumption,
            IssuePurpose::Loan => SystemAccountKey::InventoryOnLoan,
            IssuePurpose::Scrap => SystemAccountKey::InventoryAdjustmentLoss,
        }
    }
}

impl core::fmt::Display for SystemAccountKey {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for SystemAccountKey {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INVENTORY_GENERAL" => Ok(SystemAccountKey::InventoryGeneral),
            "INVENTORY_ON_LOAN" => Ok(SystemAccountKey::InventoryOnLoan),
            "ISSUE_EXPENSE" => Ok(SystemAccountKey::IssueExpense),
            "PRODUCTION_CONSUMPTION" => Ok(SystemAccountKey::ProductionConsumption),
            "INVENTORY_ADJUSTMENT_LOSS" => Ok(SystemAccountKey::InventoryAdjustmentLoss),
            "LOAN_LOSS" => Ok(SystemAccountKey::LoanLoss),
            "OPENING_BALANCE" => Ok(SystemAccountKey::OpeningBalance),
            other => Err(DomainError::validation(format!(
                "unknown system account key: {other}"
            ))),
        }
    }
}

/// Resolves logical keys to concrete ledger accounts for one company.
pub trait AccountResolver {
    fn resolve(&self, key: SystemAccountKey) -> DomainResult<AccountId>;
}

/// In-memory account map for a single company.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemAccountMap {
    company_id: CompanyId,
    accounts: HashMap<SystemAccountKey, AccountId>,
}

impl SystemAccountMap {
    pub fn new(company_id: CompanyId) -> Self {
        Self {
            company_id,
            accounts: HashMap::new(),
        }
    }

    pub fn with(mut self, key: SystemAccountKey, account_id: AccountId) -> Self {
        self.accounts.insert(key, account_id);
        self
    }

    pub fn insert(&mut self, key: SystemAccountKey, account_id: AccountId) {
        self.accounts.insert(key, account_id);
    }

    pub fn company_id(&self) -> CompanyId {
        self.company_id
    }

    pub fn get(&self, key: SystemAccountKey) -> Option<AccountId> {
        self.accounts.get(&key).copied()
    }
}

impl AccountResolver for SystemAccountMap {
    fn resolve(&self, key: SystemAccountKey) -> DomainResult<AccountId> {
        self.get(key)
            .ok_or_else(|| DomainError::account_not_configured(self.company_id, key.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn purpose_maps_to_debit_account() {
        assert_eq!(
            SystemAccountKey::debit_for_purpose(IssuePurpose::Prod),
            SystemAccountKey::ProductionConsumption
        );
        assert_eq!(
            SystemAccountKey::debit_for_purpose(IssuePurpose::Scrap),
            SystemAccountKey::InventoryAdjustmentLoss
        );
    }

    #[test]
    fn missing_key_reports_company_and_key() {
        let company = CompanyId::new();
        let map = SystemAccountMap::new(company)
            .with(SystemAccountKey::InventoryGeneral, AccountId::new());
        let err = map.resolve(SystemAccountKey::LoanLoss).unwrap_err();
        assert_eq!(
            err,
            DomainError::AccountNotConfigured {
                company_id: company,
                key: "LOAN_LOSS".to_string(),
            }
        );
    }

    #[test]
    fn keys_round_trip_through_their_wire_names() {
        for key in [
            SystemAccountKey::InventoryGeneral,
            SystemAccountKey::OpeningBalance,
        ] {
            assert_eq!(key.as_str().parse::<SystemAccountKey>().unwrap(), key);
        }
    }
}
