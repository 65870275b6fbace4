use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;
use tracing::error;

use stockroom_core::DomainError;
use stockroom_infra::{LedgerError, StoreError};

use crate::app::dto::QuantityBodyError;

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    match err {
        DomainError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        DomainError::InvalidId(msg) => json_error(StatusCode::BAD_REQUEST, "invalid_id", msg),
        DomainError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        DomainError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
    }
}

pub fn store_error_to_response(err: StoreError) -> axum::response::Response {
    match err {
        StoreError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", "not found"),
        StoreError::Validation(msg) => json_error(StatusCode::BAD_REQUEST, "validation_error", msg),
        StoreError::Conflict(msg) => json_error(StatusCode::CONFLICT, "conflict", msg),
        StoreError::Backend(msg) => {
            error!(error = %msg, "storage backend failure");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "storage_error", "storage backend failure")
        }
    }
}

// -------------------------
// Ledger endpoints
// -------------------------
//
// Reserve / release / availability answer with a `success` flag alongside the
// usual `error` code, so clients of the ledger can branch on one field.

fn ledger_error(status: StatusCode, code: &'static str, message: impl Into<String>) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "success": false,
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn invalid_product_id(err: DomainError) -> axum::response::Response {
    ledger_error(StatusCode::BAD_REQUEST, "invalid_id", err.to_string())
}

pub fn invalid_quantity(message: impl Into<String>) -> axum::response::Response {
    ledger_error(StatusCode::BAD_REQUEST, "invalid_quantity", message)
}

pub fn quantity_body_error(err: QuantityBodyError) -> axum::response::Response {
    match err {
        QuantityBodyError::Malformed(msg) => ledger_error(StatusCode::BAD_REQUEST, "invalid_body", msg),
        QuantityBodyError::Invalid(msg) => invalid_quantity(msg),
    }
}

pub fn product_not_found() -> axum::response::Response {
    (
        StatusCode::NOT_FOUND,
        axum::Json(json!({
            "success": false,
            "message": "Product not found",
        })),
    )
        .into_response()
}

pub fn ledger_error_to_response(err: LedgerError) -> axum::response::Response {
    match err {
        LedgerError::InvalidQuantity(msg) => invalid_quantity(msg),
        LedgerError::Storage(StoreError::Conflict(msg)) => ledger_error(StatusCode::CONFLICT, "conflict", msg),
        LedgerError::Storage(StoreError::NotFound) => product_not_found(),
        LedgerError::Storage(other) => {
            error!(error = %other, "ledger storage failure");
            ledger_error(StatusCode::INTERNAL_SERVER_ERROR, "storage_error", "storage backend failure")
        }
    }
}

/// Malformed or mistyped JSON body, keeping axum's status (400/415/422).
pub fn json_rejection(rejection: JsonRejection) -> axum::response::Response {
    json_error(rejection.status(), "invalid_body", rejection.body_text())
}
