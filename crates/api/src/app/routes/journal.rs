use std::sync::Arc;

use axum::{
    Router,
    extract::{Extension, Path},
    http::StatusCode,
    routing::{get, post},
};
use serde_json::json;
use uuid::Uuid;

use millerp_accounting::JournalSourceType;
use millerp_core::JournalEntryId;

use crate::app::services::AppServices;
use crate::app::{dto, errors};
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new()
        .route("/:id", get(get_journal_entry))
        .route("/by-source/:source_type/:source_id", get(list_by_source))
        .route("/by-source/:source_type/:source_id/void", post(void_by_source))
}

fn parse_source(
    source_type: &str,
    source_id: &str,
) -> Result<(JournalSourceType, Uuid), axum::response::Response> {
    let source_type: JournalSourceType = dto::parse_path(source_type, "source type")?;
    let source_id = source_id.parse::<Uuid>().map_err(|_| {
        errors::json_error(
            StatusCode::BAD_REQUEST,
            "VALIDATION_ERROR",
            format!("invalid source id: {source_id}"),
            None,
        )
    })?;
    Ok((source_type, source_id))
}

pub async fn get_journal_entry(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let id: JournalEntryId = match dto::parse_path(&id, "journal entry id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.gl.get_journal_entry(id) {
        Ok(entry) => errors::json_ok(StatusCode::OK, entry),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn list_by_source(
    Extension(services): Extension<Arc<AppServices>>,
    Path((source_type, source_id)): Path<(String, String)>,
) -> axum::response::Response {
    let (source_type, source_id) = match parse_source(&source_type, &source_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services
        .gl
        .list_journal_entries_by_source(source_type, source_id)
    {
        Ok(items) => errors::json_ok(StatusCode::OK, json!({ "items": items })),
        Err(e) => errors::service_error_to_response(e),
    }
}

pub async fn void_by_source(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(actor): Extension<ActorContext>,
    Path((source_type, source_id)): Path<(String, String)>,
) -> axum::response::Response {
    let (source_type, source_id) = match parse_source(&source_type, &source_id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services
        .gl
        .void_journal_entry_by_source(source_type, source_id, actor.actor_id())
    {
        Ok(voided) => errors::json_ok(
            StatusCode::OK,
            json!({ "voided": voided.len(), "items": voided }),
        ),
        Err(e) => errors::service_error_to_response(e),
    }
}
