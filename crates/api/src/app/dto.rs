use std::convert::Infallible;

use axum::async_trait;
use axum::body::Bytes;
use axum::extract::{FromRequest, Request};
use axum::http::header::CONTENT_TYPE;
use axum::Form;
use serde::Deserialize;
use serde_json::Value as JsonValue;

use stockroom_catalog::{Price, ProductOrdering, ProductQuery};
use stockroom_core::{CategoryId, DomainError, DomainResult};
use stockroom_inventory::Quantity;

// -------------------------
// Query parameters
// -------------------------

/// `GET /products` query string. Everything arrives as text and is parsed in
/// `into_query` so malformed values surface as our own JSON errors.
#[derive(Debug, Default, Deserialize)]
pub struct ProductListParams {
    pub search: Option<String>,
    pub category: Option<String>,
    pub is_active: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    pub in_stock: Option<String>,
    pub ordering: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CategoryListParams {
    pub search: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct AvailabilityParams {
    pub quantity: Option<String>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_bool(field: &str, raw: &str) -> DomainResult<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        _ => Err(DomainError::validation(format!("{field} must be true or false, got {raw:?}"))),
    }
}

impl ProductListParams {
    pub fn into_query(self) -> DomainResult<ProductQuery> {
        let category = non_blank(self.category)
            .map(|raw| raw.parse::<CategoryId>())
            .transpose()?;
        let is_active = non_blank(self.is_active)
            .map(|raw| parse_bool("is_active", &raw))
            .transpose()?;
        let min_price = non_blank(self.min_price).map(|raw| Price::parse(&raw)).transpose()?;
        let max_price = non_blank(self.max_price).map(|raw| Price::parse(&raw)).transpose()?;
        // Only an explicit `true` narrows the listing; other values are ignored.
        let in_stock = non_blank(self.in_stock).is_some_and(|raw| raw.eq_ignore_ascii_case("true"));
        let ordering = non_blank(self.ordering)
            .map(|raw| raw.parse::<ProductOrdering>())
            .transpose()?
            .unwrap_or_default();

        Ok(ProductQuery {
            search: non_blank(self.search),
            category,
            is_active,
            min_price,
            max_price,
            in_stock,
            ordering,
        })
    }
}

impl AvailabilityParams {
    pub fn quantity(&self) -> DomainResult<Quantity> {
        match self.quantity.as_deref() {
            None => Ok(Quantity::default()),
            Some(raw) => Quantity::parse(raw),
        }
    }
}

// -------------------------
// Ledger request bodies
// -------------------------

/// Why a reserve/release body could not be turned into a quantity.
#[derive(Debug, PartialEq, Eq)]
pub enum QuantityBodyError {
    /// Not JSON, or JSON that is not an object.
    Malformed(String),
    /// The `quantity` field is present but not a positive integer.
    Invalid(String),
}

/// Read `{"quantity": n}` from a raw request body. An empty body, an empty
/// object, or a `null` quantity all mean one unit.
pub fn quantity_from_body(body: &[u8]) -> Result<Quantity, QuantityBodyError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Quantity::default());
    }

    let value: JsonValue =
        serde_json::from_slice(body).map_err(|e| QuantityBodyError::Malformed(e.to_string()))?;

    let field = match &value {
        JsonValue::Object(map) => map.get("quantity"),
        JsonValue::Null => None,
        _ => {
            return Err(QuantityBodyError::Malformed(
                "request body must be a JSON object".to_string(),
            ));
        }
    };

    Quantity::from_json(field).map_err(|e| QuantityBodyError::Invalid(e.to_string()))
}

/// `quantity=n` from an HTML form post.
#[derive(Debug, Default, Deserialize)]
pub struct QuantityForm {
    pub quantity: Option<String>,
}

impl QuantityForm {
    pub fn quantity(&self) -> Result<Quantity, QuantityBodyError> {
        match self.quantity.as_deref() {
            None => Ok(Quantity::default()),
            Some(raw) => Quantity::parse(raw).map_err(|e| QuantityBodyError::Invalid(e.to_string())),
        }
    }
}

/// Reserve/release body, JSON or form-encoded by `Content-Type`. Never
/// rejects: the outcome is handed to the handler so id errors are reported
/// before body errors.
pub struct QuantityBody(pub Result<Quantity, QuantityBodyError>);

fn is_form(req: &Request) -> bool {
    req.headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.trim_start().starts_with("application/x-www-form-urlencoded"))
}

#[async_trait]
impl<S> FromRequest<S> for QuantityBody
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if is_form(&req) {
            let parsed = match Form::<QuantityForm>::from_request(req, state).await {
                Ok(Form(form)) => form.quantity(),
                Err(rejection) => Err(QuantityBodyError::Malformed(rejection.body_text())),
            };
            return Ok(Self(parsed));
        }

        let parsed = match Bytes::from_request(req, state).await {
            Ok(body) => quantity_from_body(&body),
            Err(rejection) => Err(QuantityBodyError::Malformed(rejection.body_text())),
        };
        Ok(Self(parsed))
    }
}
