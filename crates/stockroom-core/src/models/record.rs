//! Product record model

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Server-assigned record identifier.
///
/// Opaque to the client: the backend may send it as a JSON string or integer,
/// and it is held as text either way.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for RecordId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyId);
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl<'de> Deserialize<'de> for RecordId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Signed(i64),
            Unsigned(u64),
        }

        let raw = match RawId::deserialize(deserializer)? {
            RawId::Text(text) => text,
            RawId::Signed(value) => value.to_string(),
            RawId::Unsigned(value) => value.to_string(),
        };
        // Kept verbatim; only user input is trimmed.
        if raw.trim().is_empty() {
            return Err(serde::de::Error::custom(ValidationError::EmptyId));
        }
        Ok(Self(raw))
    }
}

/// A product as last observed on the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireRecord")]
pub struct Record {
    /// Server-assigned identifier
    pub id: RecordId,
    /// Display name, never empty
    pub name: String,
    /// Units in stock
    pub quantity: u64,
    /// Unit price
    pub price: f64,
}

impl Record {
    /// Overwrite the editable fields with validated values.
    pub fn apply(&mut self, fields: &RecordFields) {
        self.name.clone_from(&fields.name);
        self.quantity = fields.quantity;
        self.price = fields.price;
    }
}

/// Validated editable fields of a record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordFields {
    pub name: String,
    pub quantity: u64,
    pub price: f64,
}

/// Raw user input for a record, before validation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordDraft {
    pub name: String,
    pub quantity: String,
    pub price: String,
}

impl RecordDraft {
    pub fn new(
        name: impl Into<String>,
        quantity: impl Into<String>,
        price: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            quantity: quantity.into(),
            price: price.into(),
        }
    }

    /// Prefill a draft from an existing record.
    #[must_use]
    pub fn from_record(record: &Record) -> Self {
        Self {
            name: record.name.clone(),
            quantity: record.quantity.to_string(),
            price: record.price.to_string(),
        }
    }

    /// Check the draft and convert it into typed fields.
    pub fn validate(&self) -> Result<RecordFields, ValidationError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(ValidationError::EmptyName);
        }

        Ok(RecordFields {
            name: name.to_string(),
            quantity: parse_quantity(&self.quantity)?,
            price: parse_price(&self.price)?,
        })
    }
}

/// Local field checks that run before any network call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Product ID cannot be empty")]
    EmptyId,
    #[error("Product name cannot be empty")]
    EmptyName,
    #[error("Quantity must be a whole number, got '{0}'")]
    QuantityNotNumeric(String),
    #[error("Quantity cannot be negative")]
    NegativeQuantity,
    #[error("Price must be a number, got '{0}'")]
    PriceNotNumeric(String),
    #[error("Price cannot be negative")]
    NegativePrice,
}

fn parse_quantity(raw: &str) -> Result<u64, ValidationError> {
    let raw = raw.trim();
    if let Ok(quantity) = raw.parse::<u64>() {
        return Ok(quantity);
    }
    match raw.parse::<i64>() {
        Ok(value) if value < 0 => Err(ValidationError::NegativeQuantity),
        _ => Err(ValidationError::QuantityNotNumeric(raw.to_string())),
    }
}

fn parse_price(raw: &str) -> Result<f64, ValidationError> {
    let raw = raw.trim();
    let price = raw
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| ValidationError::PriceNotNumeric(raw.to_string()))?;
    if price < 0.0 {
        return Err(ValidationError::NegativePrice);
    }
    Ok(price)
}

/// Loosely typed server row; converted strictly into [`Record`].
#[derive(Debug, Deserialize)]
struct WireRecord {
    #[serde(default, alias = "identifier")]
    id: Option<RecordId>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    quantity: Option<Value>,
    #[serde(default)]
    price: Option<Value>,
}

impl TryFrom<WireRecord> for Record {
    type Error = String;

    fn try_from(value: WireRecord) -> Result<Self, Self::Error> {
        let id = value.id.ok_or("record is missing 'id'")?;
        let name = value
            .name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| format!("record {id} is missing 'name'"))?;
        let quantity = value
            .quantity
            .ok_or_else(|| format!("record {id} is missing 'quantity'"))
            .and_then(|raw| {
                parse_quantity(&number_text(&raw))
                    .map_err(|error| format!("record {id} has invalid 'quantity': {error}"))
            })?;
        let price = value
            .price
            .ok_or_else(|| format!("record {id} is missing 'price'"))
            .and_then(|raw| {
                parse_price(&number_text(&raw))
                    .map_err(|error| format!("record {id} has invalid 'price': {error}"))
            })?;

        Ok(Self {
            id,
            name,
            quantity,
            price,
        })
    }
}

// Numbers may arrive as JSON numbers or numeric strings.
fn number_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
