use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use stockroom_core::{CategoryId, DomainError, DomainResult, Entity, ProductId};

use crate::price::Price;

const MAX_NAME_LEN: usize = 200;

/// A catalog product, including its current stock row.
///
/// `stock_quantity` is owned by the inventory ledger once the product exists;
/// the catalog only sets it on create and on explicit administrative updates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Price,
    pub category_id: Option<CategoryId>,
    pub stock_quantity: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

fn default_active() -> bool {
    true
}

/// Full product payload, used for create and for `PUT` replacement.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProductDraft {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price: Price,
    #[serde(default, alias = "category")]
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub stock_quantity: i64,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

/// Partial product update (`PATCH`).
///
/// `category_id` distinguishes "absent" (`None`) from an explicit `null`
/// (`Some(None)`, detach from category).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price: Option<Price>,
    #[serde(default, alias = "category", deserialize_with = "explicit_null")]
    pub category_id: Option<Option<CategoryId>>,
    pub stock_quantity: Option<i64>,
    pub is_active: Option<bool>,
}

fn explicit_null<'de, D>(deserializer: D) -> Result<Option<Option<CategoryId>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<CategoryId>::deserialize(deserializer).map(Some)
}

impl ProductDraft {
    pub fn validate(&self) -> DomainResult<()> {
        validate_name(&self.name)?;
        validate_stock(self.stock_quantity)
    }

    pub fn into_product(self, id: ProductId, now: DateTime<Utc>) -> DomainResult<Product> {
        self.validate()?;
        Ok(Product {
            id,
            name: self.name.trim().to_string(),
            description: self.description,
            price: self.price,
            category_id: self.category_id,
            stock_quantity: self.stock_quantity,
            is_active: self.is_active,
            created_at: now,
            updated_at: now,
        })
    }
}

impl ProductPatch {
    pub fn validate(&self) -> DomainResult<()> {
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        if let Some(stock) = self.stock_quantity {
            validate_stock(stock)?;
        }
        Ok(())
    }

    /// The category this patch would leave the product in, when it touches it.
    pub fn category_target(&self) -> Option<CategoryId> {
        self.category_id.flatten()
    }
}

impl Product {
    /// Replace every editable field (`PUT`).
    pub fn replace(&mut self, draft: ProductDraft, now: DateTime<Utc>) -> DomainResult<()> {
        draft.validate()?;
        self.name = draft.name.trim().to_string();
        self.description = draft.description;
        self.price = draft.price;
        self.category_id = draft.category_id;
        self.stock_quantity = draft.stock_quantity;
        self.is_active = draft.is_active;
        self.updated_at = now;
        Ok(())
    }

    /// Apply the fields present in `patch` (`PATCH`). Nothing changes on error.
    pub fn apply_patch(&mut self, patch: ProductPatch, now: DateTime<Utc>) -> DomainResult<()> {
        patch.validate()?;
        if let Some(name) = patch.name {
            self.name = name.trim().to_string();
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(price) = patch.price {
            self.price = price;
        }
        if let Some(category_id) = patch.category_id {
            self.category_id = category_id;
        }
        if let Some(stock) = patch.stock_quantity {
            self.stock_quantity = stock;
        }
        if let Some(active) = patch.is_active {
            self.is_active = active;
        }
        self.updated_at = now;
        Ok(())
    }

    /// Withdraw from sale. Products are never hard-deleted.
    pub fn deactivate(&mut self, now: DateTime<Utc>) {
        self.is_active = false;
        self.updated_at = now;
    }

    pub fn in_stock(&self) -> bool {
        self.stock_quantity > 0
    }
}

fn validate_name(name: &str) -> DomainResult<()> {
    let name = name.trim();
    if name.is_empty() {
        return Err(DomainError::validation("name cannot be empty"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(DomainError::validation(format!(
            "name cannot exceed {MAX_NAME_LEN} characters"
        )));
    }
    Ok(())
}

fn validate_stock(stock: i64) -> DomainResult<()> {
    if stock < 0 {
        return Err(DomainError::validation("stock_quantity cannot be negative"));
    }
    Ok(())
}
