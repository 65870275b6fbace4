use core::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use stockroom_core::{DomainError, ValueObject};

/// Non-negative price with two fractional digits, held in minor units (cents).
///
/// Serialized as a decimal string (`"12.50"`) so clients never see float
/// rounding. Deserialization accepts either a string or a JSON number.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Price(u64);

impl ValueObject for Price {}

impl Price {
    pub fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    pub fn cents(&self) -> u64 {
        self.0
    }

    /// Parse `"12"`, `"12.5"` or `"12.50"`. Signs, exponents and more than two
    /// fractional digits are rejected.
    pub fn parse(input: &str) -> Result<Self, DomainError> {
        let s = input.trim();
        let invalid = || DomainError::validation(format!("invalid price: {input:?}"));

        let (whole, frac) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };

        if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        if frac.len() > 2 || !frac.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        if s.ends_with('.') {
            return Err(invalid());
        }

        let units: u64 = whole.parse().map_err(|_| invalid())?;
        let cents: u64 = match frac.len() {
            0 => 0,
            1 => frac.parse::<u64>().map_err(|_| invalid())? * 10,
            _ => frac.parse::<u64>().map_err(|_| invalid())?,
        };

        units
            .checked_mul(100)
            .and_then(|v| v.checked_add(cents))
            .map(Price)
            .ok_or_else(invalid)
    }
}

impl FromStr for Price {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Price::parse(s)
    }
}

impl core::fmt::Display for Price {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl Serialize for Price {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawPrice {
    Text(String),
    Number(serde_json::Number),
}

impl<'de> Deserialize<'de> for Price {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = match RawPrice::deserialize(deserializer)? {
            RawPrice::Text(s) => s,
            RawPrice::Number(n) => n.to_string(),
        };
        Price::parse(&raw).map_err(serde::de::Error::custom)
    }
}
