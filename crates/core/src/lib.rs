//! `stockroom-core`: shared domain building blocks.
//!
//! Identifiers, the domain error model and the small traits the catalog and
//! inventory crates build on. No IO lives here.

pub mod entity;
pub mod error;
pub mod id;
pub mod value_object;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{CategoryId, ProductId};
pub use value_object::ValueObject;
