//! Storefront REST API access.
//!
//! [`ApiClient`] performs raw HTTP calls; [`CachedApiClient`] is the gateway
//! the rest of the crate uses, adding read-through caching and cancellation.

mod cached_client;
mod client;
mod error;
pub mod types;

use async_trait::async_trait;

pub use cached_client::CachedApiClient;
pub use client::ApiClient;
pub use error::{ApiError, ApiResult};
pub use types::{CartConfirmation, ColorOption, Product, ProductOptions, StorageOption};

/// Remote cart endpoint, as seen by the cart store.
#[async_trait]
pub trait CartApi: Send + Sync {
  async fn add_cart_item(
    &self,
    product_id: &str,
    color_code: i64,
    storage_code: i64,
  ) -> ApiResult<CartConfirmation>;
}

#[async_trait]
impl<T: CartApi + ?Sized> CartApi for std::sync::Arc<T> {
  async fn add_cart_item(
    &self,
    product_id: &str,
    color_code: i64,
    storage_code: i64,
  ) -> ApiResult<CartConfirmation> {
    (**self)
      .add_cart_item(product_id, color_code, storage_code)
      .await
  }
}
