use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Extension, Path, rejection::JsonRejection},
    http::StatusCode,
    routing::{get, post},
};

use millerp_core::GoodsReceiptId;
use millerp_infra::{InboundRequest, NewItemInboundRequest};

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_inbound))
        .route("/new-item", post(create_new_item_inbound))
        .route("/:id", get(get_goods_receipt))
}

pub async fn create_inbound(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    body: Result<Json<InboundRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return errors::json_rejection(e),
    };

    match services.inbound.create_inbound(body, actor.actor_id()) {
        Ok(receipt) => errors::json_ok(StatusCode::CREATED, receipt),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn create_new_item_inbound(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    body: Result<Json<NewItemInboundRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match body {
        Ok(b) => b,
        Err(e) => return errors::json_rejection(e),
    };

    match services
        .inbound
        .create_new_item_inbound(body, actor.actor_id())
    {
        Ok(result) => errors::json_ok(StatusCode::CREATED, result),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn get_goods_receipt(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: GoodsReceiptId = match dto::parse_path(&id, "goods receipt id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.inbound.get_goods_receipt(id) {
        Ok(receipt) => errors::json_ok(StatusCode::OK, receipt),
        Err(e) => errors::service_error_to_response(e),
    }
}
