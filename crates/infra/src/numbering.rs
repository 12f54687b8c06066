//! Document and journal entry numbering.
//!
//! Numbers are `{PREFIX}/{WH}/{YYYYMMDD}/{NNNN}` for movement documents and
//! `JE/{YYYYMMDD}/{NNNN}` for journal entries, drawn from a per-scope sequence inside the
//! creating transaction.

use chrono::NaiveDate;

use millerp_core::CompanyId;

use crate::store::WarehouseTx;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    GoodsIssue,
    GoodsReceipt,
}

impl DocumentKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            DocumentKind::GoodsIssue => "GI",
            DocumentKind::GoodsReceipt => "GR",
        }
    }
}

fn format_number(scope: &str, seq: u32) -> String {
    format!("{scope}/{seq:04}")
}

/// Next document number for `(kind, warehouse_code, date)`.
pub fn next_document_number(
    tx: &mut dyn WarehouseTx,
    kind: DocumentKind,
    warehouse_code: &str,
    date: NaiveDate,
) -> String {
    let scope = format!(
        "{}/{}/{}",
        kind.prefix(),
        warehouse_code.trim().to_ascii_uppercase(),
        date.format("%Y%m%d")
    );
    let seq = tx.next_sequence(&scope);
    format_number(&scope, seq)
}

/// Next journal entry number; sequences are per company and date.
pub fn next_entry_number(
    tx: &mut dyn WarehouseTx,
    company_id: CompanyId,
    date: NaiveDate,
) -> String {
    let visible = format!("JE/{}", date.format("%Y%m%d"));
    let seq = tx.next_sequence(&format!("{visible}@{company_id}"));
    format_number(&visible, seq)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{InMemoryWarehouseStore, StoreError, WarehouseStore};

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    #[test]
    fn numbers_are_zero_padded_and_scoped() {
        let store = InMemoryWarehouseStore::new();
        let numbers = store
            .transaction(|tx| {
                Ok::<_, StoreError>(vec![
                    next_document_number(tx, DocumentKind::GoodsIssue, "wh01", date(14)),
                    next_document_number(tx, DocumentKind::GoodsIssue, "WH01", date(14)),
                    next_document_number(tx, DocumentKind::GoodsIssue, "WH02", date(14)),
                    next_document_number(tx, DocumentKind::GoodsIssue, "WH01", date(15)),
                    next_document_number(tx, DocumentKind::GoodsReceipt, "WH01", date(14)),
                ])
            })
            .unwrap();
        assert_eq!(
            numbers,
            vec![
                "GI/WH01/20260314/0001",
                "GI/WH01/20260314/0002",
                "GI/WH02/20260314/0001",
                "GI/WH01/20260315/0001",
                "GR/WH01/20260314/0001",
            ]
        );
    }

    #[test]
    fn entry_numbers_restart_per_company() {
        let store = InMemoryWarehouseStore::new();
        let (a1, a2, b1) = store
            .transaction(|tx| {
                let a = CompanyId::new();
                let b = CompanyId::new();
                Ok::<_, StoreError>((
                    next_entry_number(tx, a, date(14)),
                    next_entry_number(tx, a, date(14)),
                    next_entry_number(tx, b, date(14)),
                ))
            })
            .unwrap();
        assert_eq!(a1, "JE/20260314/0001");
        assert_eq!(a2, "JE/20260314/0002");
        assert_eq!(b1, "JE/20260314/0001");
    }
}
