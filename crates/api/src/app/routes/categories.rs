use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use chrono::Utc;

use stockroom_catalog::{slugify, CategoryPatch, NewCategory};
use stockroom_core::CategoryId;

use crate::app::{dto, errors};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_categories).post(create_category))
        .route(
            "/:slug",
            get(get_category)
                .put(replace_category)
                .patch(patch_category)
                .delete(delete_category),
        )
}

pub async fn list_categories(
    Extension(services): Extension<Arc<AppServices>>,
    Query(params): Query<dto::CategoryListParams>,
) -> axum::response::Response {
    match services.catalog.list_categories(params.search.as_deref()).await {
        Ok(categories) => Json(categories).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn create_category(
    Extension(services): Extension<Arc<AppServices>>,
    payload: Result<Json<NewCategory>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match payload {
        Ok(p) => p,
        Err(rejection) => return errors::json_rejection(rejection),
    };

    let category = match body.into_category(CategoryId::new(), Utc::now()) {
        Ok(c) => c,
        Err(e) => return errors::domain_error_to_response(e),
    };

    match services.catalog.create_category(category).await {
        Ok(created) => (StatusCode::CREATED, Json(created)).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn get_category(
    Extension(services): Extension<Arc<AppServices>>,
    Path(slug): Path<String>,
) -> axum::response::Response {
    match services.catalog.get_category(&slug).await {
        Ok(Some(category)) => Json(category).into_response(),
        Ok(None) => errors::json_error(StatusCode::NOT_FOUND, "not_found", "Category not found"),
        Err(e) => errors::store_error_to_response(e),
    }
}

/// Full replacement; a missing slug is re-derived from the new name.
pub async fn replace_category(
    Extension(services): Extension<Arc<AppServices>>,
    Path(slug): Path<String>,
    payload: Result<Json<NewCategory>, JsonRejection>,
) -> axum::response::Response {
    let Json(body) = match payload {
        Ok(p) => p,
        Err(rejection) => return errors::json_rejection(rejection),
    };

    let patch = CategoryPatch {
        slug: Some(body.slug.unwrap_or_else(|| slugify(&body.name))),
        name: Some(body.name),
        description: Some(body.description),
    };
    update(&services, &slug, patch).await
}

pub async fn patch_category(
    Extension(services): Extension<Arc<AppServices>>,
    Path(slug): Path<String>,
    payload: Result<Json<CategoryPatch>, JsonRejection>,
) -> axum::response::Response {
    let Json(patch) = match payload {
        Ok(p) => p,
        Err(rejection) => return errors::json_rejection(rejection),
    };
    update(&services, &slug, patch).await
}

async fn update(services: &AppServices, slug: &str, patch: CategoryPatch) -> axum::response::Response {
    match services.catalog.update_category(slug, patch).await {
        Ok(category) => Json(category).into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}

pub async fn delete_category(
    Extension(services): Extension<Arc<AppServices>>,
    Path(slug): Path<String>,
) -> axum::response::Response {
    match services.catalog.delete_category(&slug).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::store_error_to_response(e),
    }
}
