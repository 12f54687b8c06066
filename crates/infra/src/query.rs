//! Ledger query parameters and paginated results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use millerp_core::{BinId, WarehouseId};
use millerp_inventory::{ReferenceType, StockLedgerEntry};

pub const DEFAULT_LIMIT: u32 = 50;
pub const MAX_LIMIT: u32 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub limit: u32,
    pub offset: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }
}

impl Pagination {
    pub fn new(limit: Option<u32>, offset: Option<u32>) -> Self {
        Self {
            limit: limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
            offset: offset.unwrap_or(0),
        }
    }
}

/// Optional ledger filters. `bin_id = None` spans every bin of the warehouse.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerFilter {
    pub warehouse_id: Option<WarehouseId>,
    pub bin_id: Option<BinId>,
    /// Inclusive lower bound on `occurred_at`.
    pub from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on `occurred_at`.
    pub to: Option<DateTime<Utc>>,
    pub reference_type: Option<ReferenceType>,
}

impl LedgerFilter {
    pub fn matches(&self, entry: &StockLedgerEntry) -> bool {
        self.warehouse_id.is_none_or(|w| entry.warehouse_id == w)
            && self.bin_id.is_none_or(|b| entry.bin_id == Some(b))
            && self.from.is_none_or(|from| entry.occurred_at >= from)
            && self.to.is_none_or(|to| entry.occurred_at <= to)
            && self.reference_type.is_none_or(|r| entry.reference_type == r)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Matches across all pages.
    pub total: u64,
    pub pagination: Pagination,
    pub has_more: bool,
}

impl<T> Page<T> {
    /// Slice an already ordered result set.
    pub fn from_ordered(all: Vec<T>, pagination: Pagination) -> Self {
        let total = all.len() as u64;
        let items: Vec<T> = all
            .into_iter()
            .skip(pagination.offset as usize)
            .take(pagination.limit as usize)
            .collect();
        let has_more = u64::from(pagination.offset) + (items.len() as u64) < total;
        Self {
            items,
            total,
            pagination,
            has_more,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_defaults_and_caps() {
        assert_eq!(Pagination::new(None, None).limit, 50);
        assert_eq!(Pagination::new(Some(5000), None).limit, 1000);
        assert_eq!(Pagination::new(Some(0), None).limit, 1);
    }

    #[test]
    fn page_reports_has_more() {
        let page = Page::from_ordered((1..=7).collect::<Vec<_>>(), Pagination::new(Some(3), Some(3)));
        assert_eq!(page.items, vec![4, 5, 6]);
        assert_eq!(page.total, 7);
        assert!(page.has_more);

        let last = Page::from_ordered((1..=7).collect::<Vec<_>>(), Pagination::new(Some(3), Some(6)));
        assert_eq!(last.items, vec![7]);
        assert!(!last.has_more);
    }
}
