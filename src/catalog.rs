//! Catalog helpers used by the list and detail views.

use crate::api::{ColorOption, Product, ProductOptions, StorageOption};

/// Filter products by a search term against brand and model.
///
/// Matching is a case-insensitive substring test. A blank term keeps
/// everything.
pub fn filter_products<'a>(products: &'a [Product], term: &str) -> Vec<&'a Product> {
  let term = term.trim().to_lowercase();
  if term.is_empty() {
    return products.iter().collect();
  }

  products
    .iter()
    .filter(|p| p.brand.to_lowercase().contains(&term) || p.model.to_lowercase().contains(&term))
    .collect()
}

/// The variant choice on a product's detail view.
///
/// Options with a single entry are preselected. Add-to-cart is possible once
/// both a color and a storage are chosen.
#[derive(Debug, Clone, Default)]
pub struct VariantSelection {
  options: ProductOptions,
  color: Option<ColorOption>,
  storage: Option<StorageOption>,
}

impl VariantSelection {
  pub fn new(options: ProductOptions) -> Self {
    let color = match options.colors.as_slice() {
      [only] => Some(only.clone()),
      _ => None,
    };
    let storage = match options.storages.as_slice() {
      [only] => Some(only.clone()),
      _ => None,
    };
    Self {
      options,
      color,
      storage,
    }
  }

  /// Selection for a product; products without options have nothing to pick.
  pub fn for_product(product: &Product) -> Self {
    Self::new(product.options.clone().unwrap_or_default())
  }

  pub fn options(&self) -> &ProductOptions {
    &self.options
  }

  /// Choose a color by code. Returns false if the product has no such color.
  pub fn select_color(&mut self, code: i64) -> bool {
    match self.options.colors.iter().find(|c| c.code == code) {
      Some(color) => {
        self.color = Some(color.clone());
        true
      }
      None => false,
    }
  }

  /// Choose a storage by code. Returns false if the product has no such storage.
  pub fn select_storage(&mut self, code: i64) -> bool {
    match self.options.storages.iter().find(|s| s.code == code) {
      Some(storage) => {
        self.storage = Some(storage.clone());
        true
      }
      None => false,
    }
  }

  pub fn color(&self) -> Option<&ColorOption> {
    self.color.as_ref()
  }

  pub fn storage(&self) -> Option<&StorageOption> {
    self.storage.as_ref()
  }

  /// Both choices, if made.
  pub fn selected(&self) -> Option<(&ColorOption, &StorageOption)> {
    Some((self.color.as_ref()?, self.storage.as_ref()?))
  }

  pub fn can_add_to_cart(&self) -> bool {
    self.selected().is_some()
  }
}
