//! Cache keys for API resources.

use std::fmt;

/// Cacheable API resources.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
  /// The full product list
  Products,
  /// A single product detail record
  ProductDetail(String),
}

impl CacheKey {
  /// Key used in durable storage.
  pub fn as_storage_key(&self) -> String {
    match self {
      Self::Products => "mobile-store-products".to_string(),
      Self::ProductDetail(id) => format!("mobile-store-product-{}", id),
    }
  }
}

impl fmt::Display for CacheKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.as_storage_key())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_storage_keys() {
    assert_eq!(CacheKey::Products.as_storage_key(), "mobile-store-products");
    assert_eq!(
      CacheKey::ProductDetail("123".to_string()).as_storage_key(),
      "mobile-store-product-123"
    );
  }
}
