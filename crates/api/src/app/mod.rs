//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: storage selection and the shared service handle
//! - `routes/`: HTTP routes + handlers (one file per area)
//! - `dto.rs`: query/body DTOs and their parsing
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tower::ServiceBuilder;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

use services::AppServices;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(services: Arc<AppServices>) -> Router {
    Router::new()
        .route("/health", get(routes::system::health))
        .merge(routes::router())
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn(middleware::trace_requests))
                .layer(Extension(services)),
        )
}

/// Router over a fresh in-memory store.
pub fn build_in_memory_app() -> Router {
    build_app(Arc::new(AppServices::in_memory()))
}
