//! API gateway that wraps ApiClient with transparent caching.

use async_trait::async_trait;
use color_eyre::Result;
use std::sync::Arc;

use crate::cache::{Cache, CacheKey};
use crate::cancel::CancellationToken;
use crate::config::ApiConfig;
use crate::storage::KvStore;

use super::client::ApiClient;
use super::error::{ApiError, ApiResult};
use super::types::{CartConfirmation, Product};
use super::CartApi;

/// Storefront API client with read-through caching of GET endpoints.
///
/// Reads accept a cancellation token. A cancelled read returns
/// [`ApiError::Cancelled`] and leaves the cache untouched.
pub struct CachedApiClient<S: KvStore> {
  inner: ApiClient,
  cache: Cache<S>,
}

impl<S: KvStore> CachedApiClient<S> {
  pub fn new(config: &ApiConfig, storage: Arc<S>) -> Result<Self> {
    let inner = ApiClient::new(config)?;
    Ok(Self::with_cache(inner, Cache::new(storage)))
  }

  pub fn with_cache(inner: ApiClient, cache: Cache<S>) -> Self {
    Self { inner, cache }
  }

  /// Get all products with caching.
  pub async fn list_products(&self, cancel: &CancellationToken) -> ApiResult<Vec<Product>> {
    let result = self
      .cache
      .fetch(&CacheKey::Products, || {
        cancellable(cancel, self.inner.list_products())
      })
      .await?;

    Ok(result.data)
  }

  /// Get a single product by id with caching.
  pub async fn get_product(&self, id: &str, cancel: &CancellationToken) -> ApiResult<Product> {
    let key = CacheKey::ProductDetail(id.to_string());
    let result = self
      .cache
      .fetch(&key, || cancellable(cancel, self.inner.get_product(id)))
      .await?;

    Ok(result.data)
  }

  /// Add an item to the remote cart (not cached - write operation).
  pub async fn add_cart_item(
    &self,
    product_id: &str,
    color_code: i64,
    storage_code: i64,
  ) -> ApiResult<CartConfirmation> {
    self
      .inner
      .add_cart_item(product_id, color_code, storage_code)
      .await
  }

  /// Forget a cached product, e.g. after the user asks to reload it.
  pub fn invalidate_product(&self, id: &str) {
    self.cache.remove(&CacheKey::ProductDetail(id.to_string()));
  }

  /// Forget the cached product list.
  pub fn invalidate_products(&self) {
    self.cache.remove(&CacheKey::Products);
  }
}

async fn cancellable<T>(
  cancel: &CancellationToken,
  fut: impl std::future::Future<Output = ApiResult<T>>,
) -> ApiResult<T> {
  cancel
    .run_until_cancelled(fut)
    .await
    .unwrap_or(Err(ApiError::Cancelled))
}

#[async_trait]
impl<S: KvStore> CartApi for CachedApiClient<S> {
  async fn add_cart_item(
    &self,
    product_id: &str,
    color_code: i64,
    storage_code: i64,
  ) -> ApiResult<CartConfirmation> {
    CachedApiClient::add_cart_item(self, product_id, color_code, storage_code).await
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::clock::ManualClock;
  use crate::cache::CACHE_TTL_MILLIS;
  use crate::storage::MemoryStore;
  use httpmock::MockServer;
  use serde_json::json;
  use std::time::Duration;

  struct Fixture {
    client: CachedApiClient<MemoryStore>,
    storage: Arc<MemoryStore>,
    clock: Arc<ManualClock>,
  }

  fn fixture(server: &MockServer) -> Fixture {
    let storage = Arc::new(MemoryStore::new());
    let clock = Arc::new(ManualClock::new(0));
    let inner = ApiClient::new(&ApiConfig {
      base_url: server.base_url(),
      timeout_secs: 5,
    })
    .unwrap();
    let cache = Cache::with_clock(Arc::clone(&storage), clock.clone());
    Fixture {
      client: CachedApiClient::with_cache(inner, cache),
      storage,
      clock,
    }
  }

  fn products_body() -> serde_json::Value {
    json!([
      {"id": "1", "brand": "Apple", "model": "iPhone 14", "price": "999", "imgUrl": "a.jpg"},
      {"id": "2", "brand": "Samsung", "model": "Galaxy S23", "price": "", "imgUrl": "b.jpg"}
    ])
  }

  #[tokio::test]
  async fn test_second_list_is_served_from_cache() {
    let server = MockServer::start_async().await;
    let mock = server
      .mock_async(|when, then| {
        when.method("GET").path("/api/product");
        then.status(200).json_body(products_body());
      })
      .await;
    let f = fixture(&server);
    let cancel = CancellationToken::new();

    let first = f.client.list_products(&cancel).await.unwrap();
    let second = f.client.list_products(&cancel).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first.len(), 2);
    mock.assert_hits_async(1).await;
    assert!(f.storage.get("mobile-store-products").unwrap().is_some());
  }

  #[tokio::test]
  async fn test_expired_cache_refetches() {
    let server = MockServer::start_async().await;
    let mock = server
      .mock_async(|when, then| {
        when.method("GET").path("/api/product/1");
        then
          .status(200)
          .json_body(json!({"id": "1", "brand": "Apple", "model": "iPhone 14", "price": "999"}));
      })
      .await;
    let f = fixture(&server);
    let cancel = CancellationToken::new();

    f.client.get_product("1", &cancel).await.unwrap();
    f.clock.advance(CACHE_TTL_MILLIS + 1);
    f.client.get_product("1", &cancel).await.unwrap();

    mock.assert_hits_async(2).await;
  }

  #[tokio::test]
  async fn test_failure_is_not_cached() {
    let server = MockServer::start_async().await;
    let mock = server
      .mock_async(|when, then| {
        when.method("GET").path("/api/product");
        then.status(500);
      })
      .await;
    let f = fixture(&server);
    let cancel = CancellationToken::new();

    let err = f.client.list_products(&cancel).await.unwrap_err();
    assert_eq!(err.status(), Some(500));
    assert!(f.storage.get("mobile-store-products").unwrap().is_none());

    // Next call goes to the network again
    let _ = f.client.list_products(&cancel).await;
    mock.assert_hits_async(2).await;
  }

  #[tokio::test]
  async fn test_cancelled_fetch_writes_no_cache() {
    let server = MockServer::start_async().await;
    server
      .mock_async(|when, then| {
        when.method("GET").path("/api/product/slow");
        then
          .status(200)
          .delay(Duration::from_millis(500))
          .json_body(json!({"id": "slow"}));
      })
      .await;
    let f = fixture(&server);
    let cancel = CancellationToken::new();

    let canceller = cancel.clone();
    tokio::spawn(async move {
      tokio::time::sleep(Duration::from_millis(50)).await;
      canceller.cancel();
    });

    let err = f.client.get_product("slow", &cancel).await.unwrap_err();
    assert!(err.is_cancelled());
    assert!(f
      .storage
      .get("mobile-store-product-slow")
      .unwrap()
      .is_none());
  }

  #[tokio::test]
  async fn test_cache_hit_ignores_cancellation() {
    let server = MockServer::start_async().await;
    server
      .mock_async(|when, then| {
        when.method("GET").path("/api/product");
        then.status(200).json_body(products_body());
      })
      .await;
    let f = fixture(&server);

    f.client
      .list_products(&CancellationToken::new())
      .await
      .unwrap();

    let cancelled = CancellationToken::new();
    cancelled.cancel();
    let products = f.client.list_products(&cancelled).await.unwrap();
    assert_eq!(products.len(), 2);
  }

  #[tokio::test]
  async fn test_invalidate_forces_refetch() {
    let server = MockServer::start_async().await;
    let list = server
      .mock_async(|when, then| {
        when.method("GET").path("/api/product");
        then.status(200).json_body(products_body());
      })
      .await;
    let detail = server
      .mock_async(|when, then| {
        when.method("GET").path("/api/product/1");
        then
          .status(200)
          .json_body(json!({"id": "1", "brand": "Apple", "model": "iPhone 14", "price": "999"}));
      })
      .await;
    let f = fixture(&server);
    let cancel = CancellationToken::new();

    f.client.list_products(&cancel).await.unwrap();
    f.client.get_product("1", &cancel).await.unwrap();

    f.client.invalidate_product("1");
    assert!(f.storage.get("mobile-store-product-1").unwrap().is_none());
    // The list entry is left alone
    assert!(f.storage.get("mobile-store-products").unwrap().is_some());

    f.client.get_product("1", &cancel).await.unwrap();
    f.client.invalidate_products();
    f.client.list_products(&cancel).await.unwrap();

    list.assert_hits_async(2).await;
    detail.assert_hits_async(2).await;
  }

  #[tokio::test]
  async fn test_add_cart_item_is_never_cached() {
    let server = MockServer::start_async().await;
    let mock = server
      .mock_async(|when, then| {
        when.method("POST").path("/api/cart");
        then.status(200).json_body(json!({"count": 1}));
      })
      .await;
    let f = fixture(&server);

    f.client.add_cart_item("1", 1, 2).await.unwrap();
    f.client.add_cart_item("1", 1, 2).await.unwrap();

    mock.assert_hits_async(2).await;
  }
}
