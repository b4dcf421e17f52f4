//! Serde types matching the storefront API responses.
//!
//! Products round-trip through the cache, so every type here serializes back
//! to the same wire shape it was read from.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// A catalog product. List entries carry only the summary fields; detail
/// records add `options` and free-form technical fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
  pub id: String,
  #[serde(default)]
  pub brand: String,
  #[serde(default)]
  pub model: String,
  /// Raw price as sent by the API. Empty means "not available".
  #[serde(default, deserialize_with = "deserialize_price")]
  pub price: String,
  #[serde(default)]
  pub img_url: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub options: Option<ProductOptions>,
  /// Technical fields (cpu, ram, os, displayResolution, ...). Opaque.
  #[serde(flatten)]
  pub details: BTreeMap<String, serde_json::Value>,
}

impl Product {
  /// Numeric price, if the raw price parses.
  pub fn price_amount(&self) -> Option<Decimal> {
    parse_price(&self.price)
  }

  /// Price for display, e.g. `170€`.
  pub fn display_price(&self) -> String {
    if self.price.trim().is_empty() {
      "Price not available".to_string()
    } else {
      format!("{}€", self.price.trim())
    }
  }

  /// Render a technical field for display. List values are joined with `, `.
  pub fn detail(&self, name: &str) -> Option<String> {
    match self.details.get(name)? {
      serde_json::Value::Null => None,
      serde_json::Value::String(s) if s.trim().is_empty() => None,
      serde_json::Value::String(s) => Some(s.clone()),
      serde_json::Value::Array(items) => {
        let parts: Vec<String> = items
          .iter()
          .filter_map(|v| match v {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Null => None,
            other => Some(other.to_string()),
          })
          .filter(|s| !s.trim().is_empty())
          .collect();
        if parts.is_empty() {
          None
        } else {
          Some(parts.join(", "))
        }
      }
      other => Some(other.to_string()),
    }
  }
}

/// Selectable variants of a product.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductOptions {
  #[serde(default)]
  pub colors: Vec<ColorOption>,
  #[serde(default)]
  pub storages: Vec<StorageOption>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColorOption {
  pub code: i64,
  pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageOption {
  pub code: i64,
  pub name: String,
}

/// Body of `POST /api/cart`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequest<'a> {
  pub id: &'a str,
  pub color_code: i64,
  pub storage_code: i64,
}

/// Server response to a cart addition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CartConfirmation {
  /// Items in the remote cart, when the server reports it.
  #[serde(default)]
  pub count: Option<u64>,
  #[serde(flatten)]
  pub extra: BTreeMap<String, serde_json::Value>,
}

/// Parse a raw price: a trimmed decimal string, or nothing.
pub fn parse_price(raw: &str) -> Option<Decimal> {
  let raw = raw.trim();
  if raw.is_empty() {
    return None;
  }
  Decimal::from_str(raw).ok()
}

/// Accept a price sent as a string, a number, or null.
fn deserialize_price<'de, D>(deserializer: D) -> Result<String, D::Error>
where
  D: Deserializer<'de>,
{
  let value = Option::<serde_json::Value>::deserialize(deserializer)?;
  Ok(match value {
    None | Some(serde_json::Value::Null) => String::new(),
    Some(serde_json::Value::String(s)) => s,
    Some(other) => other.to_string(),
  })
}
