use serde::{Deserialize, Serialize};

use millerp_core::JournalEntryId;

/// Outcome of the GL stage recorded on a movement document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GlStatus {
    Pending,
    Posted,
    Failed,
    /// The movement carries no value, so nothing is posted.
    NotRequired,
}

impl GlStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GlStatus::Pending => "PENDING",
            GlStatus::Posted => "POSTED",
            GlStatus::Failed => "FAILED",
            GlStatus::NotRequired => "NOT_REQUIRED",
        }
    }
}

/// GL bookkeeping embedded in every movement document.
///
/// The movement commits with `Pending`; the GL stage then moves it to exactly one
/// terminal state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlState {
    pub status: GlStatus,
    pub journal_entry_id: Option<JournalEntryId>,
    pub error: Option<String>,
}

impl GlState {
    pub fn pending() -> Self {
        Self {
            status: GlStatus::Pending,
            journal_entry_id: None,
            error: None,
        }
    }

    pub fn posted(&mut self, entry_id: JournalEntryId) {
        self.status = GlStatus::Posted;
        self.journal_entry_id = Some(entry_id);
        self.error = None;
    }

    pub fn failed(&mut self, error: impl Into<String>) {
        self.status = GlStatus::Failed;
        self.journal_entry_id = None;
        self.error = Some(error.into());
    }

    pub fn not_required(&mut self) {
        self.status = GlStatus::NotRequired;
        self.journal_entry_id = None;
        self.error = None;
    }
}

impl Default for GlState {
    fn default() -> Self {
        Self::pending()
    }
}
