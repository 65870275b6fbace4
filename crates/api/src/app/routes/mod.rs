use axum::Router;

pub mod categories;
pub mod inventory;
pub mod products;
pub mod system;

/// Router for all resource endpoints.
pub fn router() -> Router {
    Router::new()
        .nest("/categories", categories::router())
        .nest("/products", products::router().merge(inventory::router()))
}
