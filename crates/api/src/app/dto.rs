use std::str::FromStr;

use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use millerp_core::{BinId, DomainError, WarehouseId};
use millerp_infra::query::{LedgerFilter, Pagination};
use millerp_inventory::{ReferenceType, StockLocation};

use crate::app::errors;

// -------------------------
// Query DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct LocationQuery {
    pub warehouse_id: WarehouseId,
    pub bin_id: Option<BinId>,
}

impl LocationQuery {
    pub fn location(&self) -> StockLocation {
        StockLocation::new(self.warehouse_id, self.bin_id)
    }
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub warehouse_id: WarehouseId,
    pub bin_id: Option<BinId>,
    /// Required quantity in base units.
    pub qty: Decimal,
}

impl AvailabilityQuery {
    pub fn location(&self) -> StockLocation {
        StockLocation::new(self.warehouse_id, self.bin_id)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LedgerQuery {
    pub warehouse_id: Option<WarehouseId>,
    pub bin_id: Option<BinId>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub reference_type: Option<ReferenceType>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl LedgerQuery {
    pub fn filter(&self) -> LedgerFilter {
        LedgerFilter {
            warehouse_id: self.warehouse_id,
            bin_id: self.bin_id,
            from: self.from,
            to: self.to,
            reference_type: self.reference_type,
        }
    }

    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.limit, self.offset)
    }
}

// -------------------------
// Path parameters
// -------------------------

/// Parse a path segment, answering 400 with the envelope on failure.
pub fn parse_path<T>(raw: &str, what: &str) -> Result<T, axum::response::Response>
where
    T: FromStr<Err = DomainError>,
{
    raw.parse().map_err(|_| {
        errors::json_error(
            StatusCode::BAD_REQUEST,
            "VALIDATION_ERROR",
            format!("invalid {what}: {raw}"),
            None,
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use millerp_core::GoodsIssueId;

    #[test]
    fn ledger_query_maps_to_filter_and_clamped_page() {
        let q = LedgerQuery {
            limit: Some(5000),
            reference_type: Some(ReferenceType::Out),
            ..LedgerQuery::default()
        };
        assert_eq!(q.pagination().limit, 1000);
        assert_eq!(q.filter().reference_type, Some(ReferenceType::Out));
    }

    #[test]
    fn bad_path_id_is_rejected() {
        assert!(parse_path::<GoodsIssueId>("nope", "goods issue id").is_err());
        let id = GoodsIssueId::new();
        assert_eq!(
            parse_path::<GoodsIssueId>(&id.to_string(), "goods issue id").unwrap(),
            id
        );
    }
}
