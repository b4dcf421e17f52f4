//! Simulated checkout: wait, then empty the cart.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::info;

use crate::api::CartApi;
use crate::cancel::CancellationToken;
use crate::storage::KvStore;

use super::CartStore;

/// How long the "order processed" state is shown before the cart clears.
pub const DEFAULT_CHECKOUT_DELAY: Duration = Duration::from_millis(2500);

/// How a checkout ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutOutcome {
  /// The cart was cleared; the UI should return to the catalog.
  Completed,
  /// Abandoned before the delay elapsed; the cart is untouched.
  Cancelled,
}

/// A pending checkout. Dropping it cancels the checkout.
pub struct Checkout {
  cancel: CancellationToken,
  handle: Option<JoinHandle<CheckoutOutcome>>,
}

impl Checkout {
  /// Start the checkout timer for `cart`.
  pub fn start<A, S>(cart: Arc<CartStore<A, S>>, delay: Duration) -> Self
  where
    A: CartApi + 'static,
    S: KvStore + 'static,
  {
    let cancel = CancellationToken::new();
    let token = cancel.clone();

    let handle = tokio::spawn(async move {
      match token.run_until_cancelled(tokio::time::sleep(delay)).await {
        Some(()) => {
          let units = cart.count();
          cart.clear();
          info!(units, "Order processed, cart cleared");
          CheckoutOutcome::Completed
        }
        None => CheckoutOutcome::Cancelled,
      }
    });

    Self {
      cancel,
      handle: Some(handle),
    }
  }

  pub fn cancel(&self) {
    self.cancel.cancel();
  }

  /// Wait for the checkout to finish. Dropping this future cancels it too.
  pub async fn wait(mut self) -> CheckoutOutcome {
    let Some(handle) = self.handle.as_mut() else {
      return CheckoutOutcome::Cancelled;
    };
    let outcome = handle.await.unwrap_or(CheckoutOutcome::Cancelled);
    self.handle = None;
    outcome
  }
}

impl Drop for Checkout {
  fn drop(&mut self) {
    if self.handle.is_some() {
      self.cancel.cancel();
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::{ApiResult, CartConfirmation, ColorOption, Product, StorageOption};
  use crate::storage::MemoryStore;
  use async_trait::async_trait;

  struct OkApi;

  #[async_trait]
  impl CartApi for OkApi {
    async fn add_cart_item(&self, _: &str, _: i64, _: i64) -> ApiResult<CartConfirmation> {
      Ok(CartConfirmation::default())
    }
  }

  async fn filled_cart() -> Arc<CartStore<OkApi, MemoryStore>> {
    let cart = Arc::new(CartStore::new(OkApi, Arc::new(MemoryStore::new())));
    let product = Product {
      id: "1".to_string(),
      brand: "Apple".to_string(),
      model: "iPhone 14".to_string(),
      price: "999".to_string(),
      img_url: String::new(),
      options: None,
      details: Default::default(),
    };
    let color = ColorOption {
      code: 1,
      name: "Black".to_string(),
    };
    let storage = StorageOption {
      code: 2,
      name: "128GB".to_string(),
    };
    cart.add_item(&product, &color, &storage).await.unwrap();
    cart
  }

  #[tokio::test(start_paused = true)]
  async fn test_checkout_clears_after_delay() {
    let cart = filled_cart().await;
    let checkout = Checkout::start(Arc::clone(&cart), DEFAULT_CHECKOUT_DELAY);

    tokio::time::sleep(Duration::from_millis(2000)).await;
    assert!(!cart.is_empty());

    assert_eq!(checkout.wait().await, CheckoutOutcome::Completed);
    assert!(cart.is_empty());
  }

  #[tokio::test(start_paused = true)]
  async fn test_cancelled_checkout_keeps_cart() {
    let cart = filled_cart().await;
    let checkout = Checkout::start(Arc::clone(&cart), DEFAULT_CHECKOUT_DELAY);

    tokio::time::sleep(Duration::from_millis(100)).await;
    checkout.cancel();

    assert_eq!(checkout.wait().await, CheckoutOutcome::Cancelled);
    assert_eq!(cart.count(), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn test_abandoned_wait_cancels() {
    let cart = filled_cart().await;
    let checkout = Checkout::start(Arc::clone(&cart), DEFAULT_CHECKOUT_DELAY);

    let interrupted = tokio::select! {
      _ = checkout.wait() => false,
      _ = tokio::time::sleep(Duration::from_millis(100)) => true,
    };
    assert!(interrupted);

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(cart.count(), 1);
  }

  #[tokio::test(start_paused = true)]
  async fn test_dropping_checkout_cancels() {
    let cart = filled_cart().await;
    drop(Checkout::start(Arc::clone(&cart), DEFAULT_CHECKOUT_DELAY));

    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(cart.count(), 1);
  }
}
