//! Ledger endpoints: reserve, release, availability.

use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

use stockroom_core::ProductId;
use stockroom_inventory::{ReleaseOutcome, ReserveOutcome};

use crate::app::{dto, errors};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/:id/reserve", post(reserve_product))
        .route("/:id/release", post(release_product))
        .route("/:id/availability", get(check_availability))
}

fn parse_id(raw: &str) -> Result<ProductId, axum::response::Response> {
    raw.parse().map_err(errors::invalid_product_id)
}

pub async fn reserve_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    dto::QuantityBody(body): dto::QuantityBody,
) -> axum::response::Response {
    let product_id = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let quantity = match body {
        Ok(q) => q,
        Err(e) => return errors::quantity_body_error(e),
    };

    match services.ledger.reserve(product_id, quantity.get()).await {
        Ok(ReserveOutcome::Reserved {
            name,
            quantity,
            remaining_stock,
            ..
        }) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": format!("Reserved {quantity} units of {name}"),
                "remaining_stock": remaining_stock,
            })),
        )
            .into_response(),
        Ok(ReserveOutcome::InsufficientStock { available_stock, .. }) => (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "success": false,
                "message": "Insufficient stock",
                "available_stock": available_stock,
            })),
        )
            .into_response(),
        Ok(ReserveOutcome::NotFound { .. }) => errors::product_not_found(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn release_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    dto::QuantityBody(body): dto::QuantityBody,
) -> axum::response::Response {
    let product_id = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let quantity = match body {
        Ok(q) => q,
        Err(e) => return errors::quantity_body_error(e),
    };

    match services.ledger.release(product_id, quantity.get()).await {
        Ok(ReleaseOutcome::Released {
            name,
            quantity,
            current_stock,
            ..
        }) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "message": format!("Released {quantity} units of {name}"),
                "current_stock": current_stock,
            })),
        )
            .into_response(),
        Ok(ReleaseOutcome::NotFound { .. }) => errors::product_not_found(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn check_availability(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    Query(params): Query<dto::AvailabilityParams>,
) -> axum::response::Response {
    let product_id = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let quantity = match params.quantity() {
        Ok(q) => q,
        Err(e) => return errors::invalid_quantity(e.to_string()),
    };

    match services.ledger.check_availability(product_id, quantity.get()).await {
        Ok(Some(report)) => Json(report).into_response(),
        Ok(None) => errors::product_not_found(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}
