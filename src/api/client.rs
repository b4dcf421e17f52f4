use crate::api::error::{ApiError, ApiResult};
use crate::api::types::{AddToCartRequest, CartConfirmation, Product};
use crate::config::ApiConfig;
use color_eyre::{eyre::eyre, Result};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Storefront REST API client
#[derive(Clone)]
pub struct ApiClient {
  http: reqwest::Client,
  base: Url,
}

impl ApiClient {
  pub fn new(config: &ApiConfig) -> Result<Self> {
    let base = Url::parse(&config.base_url)
      .map_err(|e| eyre!("Invalid API base URL {}: {}", config.base_url, e))?;
    if base.cannot_be_a_base() {
      return Err(eyre!("API base URL {} cannot have a path", config.base_url));
    }

    let http = reqwest::Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self { http, base })
  }

  /// Build `{base}/{segments...}`, percent-encoding each segment
  fn endpoint(&self, segments: &[&str]) -> Url {
    let mut url = self.base.clone();
    // cannot_be_a_base was rejected in new(), so this always succeeds
    if let Ok(mut path) = url.path_segments_mut() {
      path.pop_if_empty().extend(segments);
    }
    url
  }

  /// Get the full product list
  pub async fn list_products(&self) -> ApiResult<Vec<Product>> {
    let url = self.endpoint(&["api", "product"]);
    self.get_json(url).await
  }

  /// Get a single product with its options and technical details
  pub async fn get_product(&self, id: &str) -> ApiResult<Product> {
    let url = self.endpoint(&["api", "product", id]);
    self.get_json(url).await
  }

  /// Add one unit of a product variant to the remote cart
  pub async fn add_cart_item(
    &self,
    product_id: &str,
    color_code: i64,
    storage_code: i64,
  ) -> ApiResult<CartConfirmation> {
    let url = self.endpoint(&["api", "cart"]);
    let body = AddToCartRequest {
      id: product_id,
      color_code,
      storage_code,
    };

    debug!(%url, product_id, color_code, storage_code, "POST");
    let response = self
      .http
      .post(url.clone())
      .json(&body)
      .send()
      .await
      .map_err(|source| ApiError::Transport {
        url: url.to_string(),
        source,
      })?;

    Self::decode(url, response).await
  }

  async fn get_json<T: DeserializeOwned>(&self, url: Url) -> ApiResult<T> {
    debug!(%url, "GET");
    let response = self
      .http
      .get(url.clone())
      .send()
      .await
      .map_err(|source| ApiError::Transport {
        url: url.to_string(),
        source,
      })?;

    Self::decode(url, response).await
  }

  async fn decode<T: DeserializeOwned>(url: Url, response: reqwest::Response) -> ApiResult<T> {
    let status = response.status();
    if !status.is_success() {
      return Err(ApiError::Status {
        status: status.as_u16(),
        url: url.to_string(),
      });
    }

    response.json().await.map_err(|source| ApiError::Decode {
      url: url.to_string(),
      source,
    })
  }
}
