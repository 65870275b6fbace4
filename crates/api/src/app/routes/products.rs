use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::Utc;

use stockroom_catalog::{ProductDraft, ProductPatch};
use stockroom_core::ProductId;

use crate::app::{dto, errors};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_products).post(create_product))
        .route(
            "/:id",
            get(get_product)
                .put(replace_product)
                .patch(patch_product)
                .delete(delete_product),
        )
}

fn parse_id(raw: &str) -> Result<ProductId, axum::response::Response> {
    raw.parse().map_err(errors::domain_error_to_response)
}

pub async fn list_products(
    Extension(services): Extension<Arc<AppServices>>,
    Query(params): Query<dto::ProductListParams>,
) -> axum::response::Response {
    let query = match params.into_query() {
        Ok(q) => q,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.catalog.list_products(&query).await {
        Ok(products) => Json(products).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn create_product(
    Extension(services): Extension<Arc<AppServices>>,
    payload: Result<Json<ProductDraft>, JsonRejection>,
) -> axum::response::Response {
    let Json(draft) = match payload {
        Ok(p) => p,
        Err(rejection) => return errors::json_rejection(rejection),
    };

    let product = match draft.into_product(ProductId::new(), Utc::now()) {
        Ok(p) => p,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.catalog.create_product(product).await {
        Ok(created) => (StatusCode::CREATED, Json(created)).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn get_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let product_id = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.catalog.get_product(product_id).await {
        Ok(Some(product)) => Json(product).into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "Product not found"),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn replace_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    payload: Result<Json<ProductDraft>, JsonRejection>,
) -> axum::response::Response {
    let product_id = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Json(draft) = match payload {
        Ok(p) => p,
        Err(rejection) => return errors::json_rejection(rejection),
    };

    match services.catalog.replace_product(product_id, draft).await {
        Ok(product) => Json(product).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn patch_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    payload: Result<Json<ProductPatch>, JsonRejection>,
) -> axum::response::Response {
    let product_id = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let Json(patch) = match payload {
        Ok(p) => p,
        Err(rejection) => return errors::json_rejection(rejection),
    };

    match services.catalog.patch_product(product_id, patch).await {
        Ok(product) => Json(product).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

/// Deactivates rather than deletes: the row keeps its stock and stays readable by id.
pub async fn delete_product(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let product_id = match parse_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match services.catalog.deactivate_product(product_id).await {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}
