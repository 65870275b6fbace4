//! Product listing filters and ordering.
//!
//! The in-memory store evaluates a `ProductQuery` directly; the Postgres store
//! translates the same fields into a parameterised `WHERE` / `ORDER BY`.

use core::cmp::Ordering;
use core::str::FromStr;

use stockroom_core::{CategoryId, DomainError};

use crate::price::Price;
use crate::product::Product;

/// Column a product listing can be ordered by.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SortField {
    Name,
    Price,
    CreatedAt,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ProductOrdering {
    pub field: SortField,
    pub descending: bool,
}

impl Default for ProductOrdering {
    /// Newest first.
    fn default() -> Self {
        Self {
            field: SortField::CreatedAt,
            descending: true,
        }
    }
}

impl FromStr for ProductOrdering {
    type Err = DomainError;

    /// `name`, `price`, `created_at`, each optionally prefixed with `-`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (descending, column) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let field = match column {
            "name" => SortField::Name,
            "price" => SortField::Price,
            "created_at" => SortField::CreatedAt,
            other => {
                return Err(DomainError::validation(format!(
                    "unsupported ordering {other:?}; expected name, price or created_at"
                )));
            }
        };
        Ok(Self { field, descending })
    }
}

impl ProductOrdering {
    pub fn compare(&self, a: &Product, b: &Product) -> Ordering {
        let ord = match self.field {
            SortField::Name => a.name.cmp(&b.name),
            SortField::Price => a.price.cmp(&b.price),
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        }
        // Stable tiebreak so equal keys list deterministically.
        .then_with(|| a.id.as_uuid().cmp(b.id.as_uuid()));

        if self.descending { ord.reverse() } else { ord }
    }
}

/// Listing query over active products.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductQuery {
    pub search: Option<String>,
    pub category: Option<CategoryId>,
    pub is_active: Option<bool>,
    pub min_price: Option<Price>,
    pub max_price: Option<Price>,
    pub in_stock: bool,
    pub ordering: ProductOrdering,
}

impl ProductQuery {
    /// The search term, lowercased, when one is set and non-blank.
    pub fn search_term(&self) -> Option<String> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase)
    }

    pub fn matches(&self, product: &Product) -> bool {
        // Listings only ever show active products.
        if !product.is_active {
            return false;
        }
        if let Some(active) = self.is_active {
            if product.is_active != active {
                return false;
            }
        }
        if let Some(category) = self.category {
            if product.category_id != Some(category) {
                return false;
            }
        }
        if let Some(min) = self.min_price {
            if product.price < min {
                return false;
            }
        }
        if let Some(max) = self.max_price {
            if product.price > max {
                return false;
            }
        }
        if self.in_stock && !product.in_stock() {
            return false;
        }
        if let Some(term) = self.search_term() {
            let hit = product.name.to_lowercase().contains(&term)
                || product.description.to_lowercase().contains(&term);
            if !hit {
                return false;
            }
        }
        true
    }

    /// Filter and order a full product set.
    pub fn apply<'a>(&self, products: impl IntoIterator<Item = &'a Product>) -> Vec<Product> {
        let mut out: Vec<Product> = products
            .into_iter()
            .filter(|p| self.matches(p))
            .cloned()
            .collect();
        out.sort_by(|a, b| self.ordering.compare(a, b));
        out
    }
}
