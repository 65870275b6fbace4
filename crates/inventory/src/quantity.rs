use serde::Serialize;
use serde_json::Value as JsonValue;

use stockroom_core::{DomainError, DomainResult, ValueObject};

/// Strictly positive unit count for a reserve / release / availability request.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Quantity(i64);

impl ValueObject for Quantity {}

impl Default for Quantity {
    /// A request that names no quantity asks for a single unit.
    fn default() -> Self {
        Quantity(1)
    }
}

impl Quantity {
    pub fn new(value: i64) -> DomainResult<Self> {
        if value <= 0 {
            return Err(DomainError::validation(format!(
                "quantity must be a positive integer, got {value}"
            )));
        }
        Ok(Self(value))
    }

    pub fn get(&self) -> i64 {
        self.0
    }

    /// Parse a query-string style value (`"3"`).
    pub fn parse(raw: &str) -> DomainResult<Self> {
        let value: i64 = raw.trim().parse().map_err(|_| {
            DomainError::validation(format!("quantity must be a positive integer, got {raw:?}"))
        })?;
        Self::new(value)
    }

    /// Read an optional JSON field: absent or `null` selects the default, an
    /// integer (`5` or `5.0`) or a numeric string is validated, anything else
    /// is rejected.
    pub fn from_json(value: Option<&JsonValue>) -> DomainResult<Self> {
        match value {
            None | Some(JsonValue::Null) => Ok(Self::default()),
            Some(JsonValue::Number(n)) => match n.as_i64().or_else(|| n.as_f64().and_then(integral)) {
                Some(v) => Self::new(v),
                None => Err(DomainError::validation(format!(
                    "quantity must be a positive integer, got {n}"
                ))),
            },
            Some(JsonValue::String(s)) => Self::parse(s),
            Some(other) => Err(DomainError::validation(format!(
                "quantity must be a positive integer, got {other}"
            ))),
        }
    }
}

/// A float with no fractional part that fits in `i64`.
fn integral(v: f64) -> Option<i64> {
    // `i64::MAX as f64` rounds up to 2^63, which is out of range.
    (v.fract() == 0.0 && v >= i64::MIN as f64 && v < i64::MAX as f64).then_some(v as i64)
}

impl core::fmt::Display for Quantity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn zero_and_negative_are_rejected() {
        assert!(matches!(Quantity::new(0), Err(DomainError::Validation(_))));
        assert!(matches!(Quantity::new(-1), Err(DomainError::Validation(_))));
        assert_eq!(Quantity::new(7).unwrap().get(), 7);
    }

    #[test]
    fn missing_json_field_defaults_to_one() {
        assert_eq!(Quantity::from_json(None).unwrap().get(), 1);
        assert_eq!(Quantity::from_json(Some(&JsonValue::Null)).unwrap().get(), 1);
    }

    #[test]
    fn json_accepts_integers_and_numeric_strings() {
        assert_eq!(Quantity::from_json(Some(&json!(4))).unwrap().get(), 4);
        assert_eq!(Quantity::from_json(Some(&json!(" 6 "))).unwrap().get(), 6);
    }

    #[test]
    fn json_accepts_whole_floats() {
        assert_eq!(Quantity::from_json(Some(&json!(5.0))).unwrap().get(), 5);
        assert!(matches!(Quantity::from_json(Some(&json!(0.0))), Err(DomainError::Validation(_))));
        assert!(Quantity::from_json(Some(&json!(1e300))).is_err());
    }

    #[test]
    fn json_rejects_fractions_and_non_numbers() {
        for bad in [json!(1.5), json!(-2.0), json!("two"), json!(true), json!([1]), json!(-3)] {
            assert!(Quantity::from_json(Some(&bad)).is_err(), "{bad} should be rejected");
        }
    }
}
