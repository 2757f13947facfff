//! Raw inventory records
//!
//! CellarTracker returns one row per physical bottle. Rows are kept as an
//! open-ended, insertion-ordered mapping so that fields this crate does not
//! consume survive unchanged into the per-bottle output.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Column names consumed from the inventory export
pub mod fields {
    pub const IWINE: &str = "iWine";
    pub const VINTAGE: &str = "Vintage";
    pub const WINE: &str = "Wine";
    pub const SIZE: &str = "Size";
    pub const VARIETAL: &str = "Varietal";
    pub const PRODUCER: &str = "Producer";
    pub const TYPE: &str = "Type";
    pub const APPELLATION: &str = "Appellation";
    pub const COUNTRY: &str = "Country";
    pub const REGION: &str = "Region";
    pub const LOCATION: &str = "Location";
    pub const STORE_NAME: &str = "StoreName";
    pub const BIN: &str = "Bin";
    pub const BEGIN_CONSUME: &str = "BeginConsume";
    pub const END_CONSUME: &str = "EndConsume";
    pub const VALUATION: &str = "Valuation";
    pub const PRICE: &str = "Price";
    pub const PURCHASE_DATE: &str = "PurchaseDate";
    pub const BARCODE: &str = "Barcode";
}

/// One bottle as reported by the upstream inventory
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BottleRecord(IndexMap<String, Value>);

impl BottleRecord {
    /// Create an empty record
    pub fn new() -> Self {
        Self(IndexMap::new())
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert or replace a field
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Get a field, treating JSON `null` as absent
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key).filter(|v| !v.is_null())
    }

    /// Get a field rendered as text; absent fields render as ""
    pub fn text(&self, key: &str) -> String {
        self.get(key).map(scalar_text).unwrap_or_default()
    }

    /// Whether the record carries a usable `iWine` catalog id
    pub fn has_wine_id(&self) -> bool {
        match self.get(fields::IWINE) {
            Some(Value::String(s)) => !s.trim().is_empty(),
            Some(_) => true,
            None => false,
        }
    }

    /// Normalized valuation, `0.0` when missing or unparseable
    pub fn valuation(&self) -> f64 {
        parse_valuation(self.get(fields::VALUATION))
    }

    /// Normalized purchase price, `None` when missing or unparseable
    pub fn price(&self) -> Option<f64> {
        parse_price(self.get(fields::PRICE))
    }

    /// All fields in upstream order
    pub fn fields(&self) -> &IndexMap<String, Value> {
        &self.0
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the record has no fields
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<IndexMap<String, Value>> for BottleRecord {
    fn from(map: IndexMap<String, Value>) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, Value)> for BottleRecord {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Render a scalar value the way it appears in keys and attributes
pub fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Parse a valuation, accepting `,` as the decimal separator
///
/// Never fails: anything that does not parse to a finite number is `0.0`.
pub fn parse_valuation(value: Option<&Value>) -> f64 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(other) => scalar_text(other).trim().replace(',', ".").parse::<f64>().ok(),
        None => None,
    };
    parsed.filter(|v| v.is_finite()).unwrap_or(0.0)
}

/// Parse a purchase price
///
/// Unlike [`parse_valuation`] the decimal separator is not normalized, and a
/// value that does not parse is reported as `None` rather than zero.
pub fn parse_price(value: Option<&Value>) -> Option<f64> {
    let parsed = match value? {
        Value::Number(n) => n.as_f64(),
        other => scalar_text(other).trim().parse::<f64>().ok(),
    };
    parsed.filter(|v| v.is_finite())
}
