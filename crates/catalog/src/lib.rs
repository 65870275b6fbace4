//! Product catalog domain module.
//!
//! Categories, products and the rules for validating and listing them. Pure
//! domain logic: storage adapters live in `stockroom-infra`.

pub mod category;
pub mod price;
pub mod product;
pub mod query;

pub use category::{slugify, Category, CategoryPatch, NewCategory};
pub use price::Price;
pub use product::{Product, ProductDraft, ProductPatch};
pub use query::{ProductOrdering, ProductQuery, SortField};
