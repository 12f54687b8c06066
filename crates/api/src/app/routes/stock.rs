use std::sync::Arc;

use axum::{
    Router,
    extract::{Extension, Path, Query, rejection::QueryRejection},
    http::StatusCode,
    routing::get,
};
use serde_json::json;

use millerp_core::ItemId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};

pub fn router() -> Router {
    Router::new()
        .route("/items/:item_id/balances", get(list_balances))
        .route("/items/:item_id/balance", get(get_balance))
        .route("/items/:item_id/availability", get(validate_availability))
        .route("/items/:item_id/ledger", get(list_ledger))
        .route("/reconcile", get(verify_ledger))
}

pub async fn list_balances(
    Extension(services): Extension<Arc<AppServices>>,
    Path(item_id): Path<String>,
) -> axum::response::Response {
    let item_id: ItemId = match dto::parse_path(&item_id, "item id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.stock.list_balances(item_id) {
        Ok(items) => errors::json_ok(StatusCode::OK, json!({ "items": items })),
        Err(e) => errors::service_error_to_response(e),
    }
}

/// `data` is `null` when the location never held the item.
pub async fn get_balance(
    Extension(services): Extension<Arc<AppServices>>,
    Path(item_id): Path<String>,
    query: Result<Query<dto::LocationQuery>, QueryRejection>,
) -> axum::response::Response {
    let item_id: ItemId = match dto::parse_path(&item_id, "item id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Query(q) = match query {
        Ok(q) => q,
        Err(e) => return errors::query_rejection(e),
    };

    match services.stock.get_balance(item_id, q.location()) {
        Ok(balance) => errors::json_ok(StatusCode::OK, balance),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn validate_availability(
    Extension(services): Extension<Arc<AppServices>>,
    Path(item_id): Path<String>,
    query: Result<Query<dto::AvailabilityQuery>, QueryRejection>,
) -> axum::response::Response {
    let item_id: ItemId = match dto::parse_path(&item_id, "item id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Query(q) = match query {
        Ok(q) => q,
        Err(e) => return errors::query_rejection(e),
    };

    match services
        .stock
        .validate_availability(item_id, q.location(), q.qty)
    {
        Ok(availability) => errors::json_ok(StatusCode::OK, availability),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn list_ledger(
    Extension(services): Extension<Arc<AppServices>>,
    Path(item_id): Path<String>,
    query: Result<Query<dto::LedgerQuery>, QueryRejection>,
) -> axum::response::Response {
    let item_id: ItemId = match dto::parse_path(&item_id, "item id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Query(q) = match query {
        Ok(q) => q,
        Err(e) => return errors::query_rejection(e),
    };

    match services
        .stock
        .list_ledger(item_id, &q.filter(), q.pagination())
    {
        Ok(page) => errors::json_ok(StatusCode::OK, page),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn verify_ledger(
    Extension(services): Extension<Arc<AppServices>>,
) -> axum::response::Response {
    match services.stock.verify_ledger() {
        Ok(mismatches) => errors::json_ok(
            StatusCode::OK,
            json!({
                "consistent": mismatches.is_empty(),
                "mismatches": mismatches,
            }),
        ),
        Err(e) => errors::service_error_to_response(e),
    }
}
