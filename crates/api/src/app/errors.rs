use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;
use serde_json::json;

use millerp_core::DomainError;
use millerp_infra::ServiceError;

pub fn status_for_code(code: &str) -> StatusCode {
    match code {
        "VALIDATION_ERROR" => StatusCode::BAD_REQUEST,
        "CONFLICT" | "INSUFFICIENT_STOCK" => StatusCode::CONFLICT,
        "NOT_FOUND" => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn service_error_to_response(err: ServiceError) -> axum::response::Response {
    let code = err.code();
    let status = status_for_code(code);
    let details = match err.as_domain() {
        Some(DomainError::InsufficientStock(lines)) => Some(json!({ "lines": lines })),
        Some(DomainError::UnbalancedEntry { debit, credit }) => {
            Some(json!({ "debit": debit, "credit": credit }))
        }
        _ => None,
    };
    if status.is_server_error() {
        tracing::error!(code, error = %err, "request failed");
    }
    json_error(status, code, err.to_string(), details)
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> axum::response::Response {
    let mut body = json!({
        "success": false,
        "error": code,
        "message": message.into(),
    });
    if let Some(details) = details {
        body["details"] = details;
    }
    (status, axum::Json(body)).into_response()
}

pub fn json_ok(status: StatusCode, data: impl Serialize) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "success": true,
            "data": data,
        })),
    )
        .into_response()
}

pub fn json_rejection(rejection: JsonRejection) -> axum::response::Response {
    json_error(
        StatusCode::BAD_REQUEST,
        "VALIDATION_ERROR",
        rejection.body_text(),
        None,
    )
}

pub fn query_rejection(rejection: QueryRejection) -> axum::response::Response {
    json_error(
        StatusCode::BAD_REQUEST,
        "VALIDATION_ERROR",
        rejection.body_text(),
        None,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_map_to_statuses() {
        assert_eq!(status_for_code("VALIDATION_ERROR"), StatusCode::BAD_REQUEST);
        assert_eq!(status_for_code("INSUFFICIENT_STOCK"), StatusCode::CONFLICT);
        assert_eq!(status_for_code("CONFLICT"), StatusCode::CONFLICT);
        assert_eq!(status_for_code("NOT_FOUND"), StatusCode::NOT_FOUND);
        assert_eq!(
            status_for_code("ACCOUNT_NOT_CONFIGURED"),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            status_for_code("UNBALANCED_ENTRY"),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
