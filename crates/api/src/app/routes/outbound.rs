use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    routing::{get, post},
};

use millerp_core::GoodsIssueId;
use millerp_infra::{LoanReturnRequest, OutboundRequest};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_outbound))
        .route("/:id", get(get_goods_issue))
        .route("/:id/loan-returns", post(process_loan_return))
}

pub async fn create_outbound(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    body: Result<Json<OutboundRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return errors::json_rejection(e),
    };

    match services.outbound.create_outbound(body, actor.actor_id()) {
        Ok(issue) => errors::json_ok(StatusCode::CREATED, issue),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_goods_issue(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: GoodsIssueId = match dto::parse_path(&id, "goods issue id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.outbound.get_goods_issue(id) {
        Ok(issue) => errors::json_ok(StatusCode::OK, issue),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn process_loan_return(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path(id): Path<String>,
    body: Result<Json<LoanReturnRequest>, JsonRejection>,
) -> axum::response::Response {
    let id: GoodsIssueId = match dto::parse_path(&id, "goods issue id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return errors::json_rejection(e),
    };

    match services
        .inbound
        .process_loan_return(id, body, actor.actor_id())
    {
        Ok(result) => errors::json_ok(StatusCode::CREATED, result),
        Err(e) => errors::service_error_to_response(e),
    }
}
