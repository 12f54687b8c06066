//! GL posting engine: persists balanced journal entries and voids them by source.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use millerp_accounting::{
    AccountResolver, JournalContext, JournalEntry, JournalLine, JournalSourceType, JournalStatus,
    SystemAccountKey, validate_lines,
};
use millerp_core::{
    AccountId, AggregateRoot, CompanyId, DomainError, ExpectedVersion, JournalEntryId, UserId,
};

use crate::error::{ServiceError, ServiceResult};
use crate::numbering::next_entry_number;
use crate::store::{WarehouseStore, WarehouseTx};

/// Result of a posting request. Failures are reported, not raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostingOutcome {
    pub success: bool,
    pub journal_entry_id: Option<JournalEntryId>,
    pub entry_number: Option<String>,
    pub error: Option<String>,
}

impl PostingOutcome {
    fn posted(entry: &JournalEntry) -> Self {
        Self {
            success: true,
            journal_entry_id: Some(*entry.id()),
            entry_number: Some(entry.entry_number().to_string()),
            error: None,
        }
    }

    fn failed(error: &ServiceError) -> Self {
        Self {
            success: false,
            journal_entry_id: None,
            entry_number: None,
            error: Some(error.to_string()),
        }
    }
}

/// Validate, number and persist one journal entry inside an open transaction.
///
/// Lines are checked before a number is drawn, so rejected entries leave no gap.
pub fn post_journal_entry_in_tx(
    tx: &mut dyn WarehouseTx,
    context: JournalContext,
    lines: Vec<JournalLine>,
    posted_at: DateTime<Utc>,
) -> ServiceResult<JournalEntry> {
    validate_lines(&lines)?;
    let entry_number = next_entry_number(tx, context.company_id, context.entry_date);
    let entry = JournalEntry::post(JournalEntryId::new(), entry_number, context, lines, posted_at)?;
    tx.insert_journal_entry(entry.clone())?;
    Ok(entry)
}

/// GL stage of a committed movement.
///
/// `post` builds, posts and records the entry on the document in one transaction. If it
/// fails, `mark_failed` records the error text in a second transaction. If even that
/// fails, `fallback` (the document as committed) is returned.
pub(crate) fn run_gl_stage<S, D>(
    store: &S,
    doc_number: &str,
    fallback: D,
    post: impl FnOnce(&mut dyn WarehouseTx) -> ServiceResult<D>,
    mark_failed: impl FnOnce(&mut dyn WarehouseTx, String) -> ServiceResult<D>,
) -> D
where
    S: WarehouseStore,
{
    match store.transaction(post) {
        Ok(doc) => {
            info!(doc_number, gl_status = "POSTED", "journal entry posted");
            doc
        }
        Err(err) => {
            warn!(
                doc_number,
                gl_status = "FAILED",
                error = %err,
                "GL posting failed; stock movement stays committed"
            );
            let message = err.to_string();
            match store.transaction(|tx| mark_failed(tx, message)) {
                Ok(doc) => doc,
                Err(mark_err) => {
                    warn!(doc_number, error = %mark_err, "could not record GL failure");
                    fallback
                }
            }
        }
    }
}

pub struct GlPostingEngine<S> {
    store: Arc<S>,
}

impl<S> Clone for GlPostingEngine<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: WarehouseStore> GlPostingEngine<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    #[instrument(skip_all, fields(source_type = context.source_type.as_str(), source_id = %context.source_id))]
    pub fn post_journal_entry(
        &self,
        context: JournalContext,
        lines: Vec<JournalLine>,
    ) -> PostingOutcome {
        let res = self
            .store
            .transaction(|tx| post_journal_entry_in_tx(tx, context, lines, Utc::now()));
        match res {
            Ok(entry) => {
                info!(entry_number = entry.entry_number(), "journal entry posted");
                PostingOutcome::posted(&entry)
            }
            Err(err) => {
                warn!(error = %err, code = err.code(), "journal entry rejected");
                PostingOutcome::failed(&err)
            }
        }
    }

    pub fn get_system_account_id(
        &self,
        company_id: CompanyId,
        key: SystemAccountKey,
    ) -> ServiceResult<AccountId> {
        self.store.transaction(|tx| {
            tx.system_accounts(company_id)
                .resolve(key)
                .map_err(ServiceError::from)
        })
    }

    pub fn get_journal_entry(&self, id: JournalEntryId) -> ServiceResult<JournalEntry> {
        self.store.transaction(|tx| {
            tx.journal_entry(id)
                .ok_or_else(|| DomainError::not_found(format!("journal entry {id}")).into())
        })
    }

    pub fn list_journal_entries_by_source(
        &self,
        source_type: JournalSourceType,
        source_id: Uuid,
    ) -> ServiceResult<Vec<JournalEntry>> {
        self.store
            .transaction(|tx| Ok(tx.journal_entries_by_source(source_type, source_id)))
    }

    /// Void every POSTED entry of the source. No reversal entries are created.
    /// Returns the entries voided by this call (possibly none).
    #[instrument(skip_all, fields(source_type = source_type.as_str(), source_id = %source_id))]
    pub fn void_journal_entry_by_source(
        &self,
        source_type: JournalSourceType,
        source_id: Uuid,
        actor: UserId,
    ) -> ServiceResult<Vec<JournalEntry>> {
        let voided = self.store.transaction(|tx| -> ServiceResult<Vec<JournalEntry>> {
            let now = Utc::now();
            let mut voided = Vec::new();
            for mut entry in tx.journal_entries_by_source(source_type, source_id) {
                if entry.status() != JournalStatus::Posted {
                    continue;
                }
                let expected = ExpectedVersion::Exact(entry.version());
                entry.void(now, actor)?;
                tx.save_journal_entry(entry.clone(), expected)?;
                voided.push(entry);
            }
            Ok(voided)
        })?;
        info!(count = voided.len(), "journal entries voided");
        Ok(voided)
    }
}
