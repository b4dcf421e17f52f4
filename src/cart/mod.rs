//! Shopping cart: data model, the session cart store, and checkout.

mod checkout;
mod model;
mod store;

pub use checkout::{Checkout, CheckoutOutcome, DEFAULT_CHECKOUT_DELAY};
pub use model::{format_total, Cart, CartLine, LineKey};
pub use store::{CartStore, CART_ITEMS_KEY};

use crate::api::ApiError;

/// Errors surfaced by cart operations.
#[derive(Debug, thiserror::Error)]
pub enum CartError {
  /// The API rejected an addition; the cart was rolled back.
  #[error("Failed to add item to cart. Please try again.")]
  SyncFailed {
    #[source]
    source: ApiError,
  },
}

impl CartError {
  /// Whether retrying the same operation may succeed.
  pub fn is_retryable(&self) -> bool {
    match self {
      Self::SyncFailed { .. } => true,
    }
  }
}
