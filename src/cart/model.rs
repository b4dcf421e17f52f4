//! Cart data model: lines keyed by product variant, kept in insertion order.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::api::types::parse_price;
use crate::api::{ColorOption, Product, StorageOption};

/// Identity of a cart line: the product and the chosen variants.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LineKey {
  pub product_id: String,
  pub color_code: i64,
  pub storage_code: i64,
}

impl LineKey {
  pub fn new(product_id: impl Into<String>, color_code: i64, storage_code: i64) -> Self {
    Self {
      product_id: product_id.into(),
      color_code,
      storage_code,
    }
  }
}

/// A product variant in the cart, captured at the time it was added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
  pub id: String,
  #[serde(default)]
  pub brand: String,
  #[serde(default)]
  pub model: String,
  #[serde(default)]
  pub price: String,
  #[serde(default)]
  pub img_url: String,
  pub color_code: i64,
  #[serde(default)]
  pub color_name: String,
  pub storage_code: i64,
  #[serde(default)]
  pub storage_name: String,
  pub quantity: u32,
}

impl CartLine {
  fn new(product: &Product, color: &ColorOption, storage: &StorageOption) -> Self {
    Self {
      id: product.id.clone(),
      brand: product.brand.clone(),
      model: product.model.clone(),
      price: product.price.clone(),
      img_url: product.img_url.clone(),
      color_code: color.code,
      color_name: color.name.clone(),
      storage_code: storage.code,
      storage_name: storage.name.clone(),
      quantity: 1,
    }
  }

  pub fn key(&self) -> LineKey {
    LineKey::new(self.id.clone(), self.color_code, self.storage_code)
  }

  fn matches(&self, key: &LineKey) -> bool {
    self.id == key.product_id && self.color_code == key.color_code && self.storage_code == key.storage_code
  }

  /// Unit price; unparseable or missing prices count as zero.
  pub fn unit_price(&self) -> Decimal {
    parse_price(&self.price).unwrap_or(Decimal::ZERO)
  }

  pub fn subtotal(&self) -> Decimal {
    self.unit_price() * Decimal::from(self.quantity)
  }
}

/// Position and contents of a line, or `None` when the key is absent.
pub type LineSlot = Option<(usize, CartLine)>;

/// Insertion-ordered cart, unique by [`LineKey`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cart {
  lines: Vec<CartLine>,
}

impl Cart {
  pub fn new() -> Self {
    Self::default()
  }

  /// Build a cart from stored lines, dropping zero quantities and merging
  /// duplicate keys into the first occurrence.
  pub fn from_lines(lines: Vec<CartLine>) -> Self {
    let mut cart = Self::new();
    let mut positions: HashMap<LineKey, usize> = HashMap::new();

    for line in lines.into_iter().filter(|l| l.quantity > 0) {
      let key = line.key();
      if let Some(&pos) = positions.get(&key) {
        if let Some(existing) = cart.lines.get_mut(pos) {
          existing.quantity = existing.quantity.saturating_add(line.quantity);
        }
      } else {
        positions.insert(key, cart.lines.len());
        cart.lines.push(line);
      }
    }

    cart
  }

  pub fn lines(&self) -> &[CartLine] {
    &self.lines
  }

  pub fn is_empty(&self) -> bool {
    self.lines.is_empty()
  }

  pub fn len(&self) -> usize {
    self.lines.len()
  }

  fn position(&self, key: &LineKey) -> Option<usize> {
    self.lines.iter().position(|l| l.matches(key))
  }

  pub fn get(&self, key: &LineKey) -> Option<&CartLine> {
    self.lines.iter().find(|l| l.matches(key))
  }

  /// Snapshot of the line for `key`, used to undo a change to it.
  pub fn slot(&self, key: &LineKey) -> LineSlot {
    let pos = self.position(key)?;
    self.lines.get(pos).map(|line| (pos, line.clone()))
  }

  /// Put the line for `key` back exactly as `slot` describes.
  pub fn restore_slot(&mut self, key: &LineKey, slot: LineSlot) {
    let current = self.position(key);
    match (current, slot) {
      (Some(pos), None) => {
        self.lines.remove(pos);
      }
      (Some(pos), Some((_, line))) => {
        if let Some(existing) = self.lines.get_mut(pos) {
          *existing = line;
        }
      }
      (None, Some((pos, line))) => {
        let pos = pos.min(self.lines.len());
        self.lines.insert(pos, line);
      }
      (None, None) => {}
    }
  }

  /// Add one unit of a variant: bump the quantity or append a new line.
  pub fn add(&mut self, product: &Product, color: &ColorOption, storage: &StorageOption) {
    let key = LineKey::new(product.id.clone(), color.code, storage.code);
    match self.lines.iter_mut().find(|l| l.matches(&key)) {
      Some(line) => line.quantity = line.quantity.saturating_add(1),
      None => self.lines.push(CartLine::new(product, color, storage)),
    }
  }

  /// Remove the line for `key`. Returns whether anything was removed.
  pub fn remove(&mut self, key: &LineKey) -> bool {
    match self.position(key) {
      Some(pos) => {
        self.lines.remove(pos);
        true
      }
      None => false,
    }
  }

  /// Set the quantity of a line. Zero or less removes it.
  pub fn set_quantity(&mut self, key: &LineKey, quantity: i64) {
    if quantity <= 0 {
      self.remove(key);
      return;
    }
    let quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
    if let Some(line) = self.lines.iter_mut().find(|l| l.matches(key)) {
      line.quantity = quantity;
    }
  }

  pub fn clear(&mut self) {
    self.lines.clear();
  }

  /// Sum of price times quantity over all lines.
  pub fn total(&self) -> Decimal {
    self.lines.iter().map(CartLine::subtotal).sum()
  }

  /// Number of units in the cart.
  pub fn count(&self) -> u64 {
    self.lines.iter().map(|l| u64::from(l.quantity)).sum()
  }
}

/// Cart total for display, e.g. `1499.00€`.
pub fn format_total(total: Decimal) -> String {
  format!("{:.2}€", total)
}
