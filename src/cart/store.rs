//! The cart store: in-memory cart, mirrored to storage, synced to the API.

use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

use crate::api::{CartApi, CartConfirmation, ColorOption, Product, StorageOption};
use crate::storage::KvStore;

use super::model::{Cart, CartLine, LineKey, LineSlot};
use super::CartError;

/// Storage key holding the serialized cart lines.
pub const CART_ITEMS_KEY: &str = "mobile-store-cart-items";

/// Owns the cart for one application session.
///
/// Construct once and share it (`Arc<CartStore<..>>`). Every mutation is
/// written through to storage. `add_item` is optimistic: the line is added
/// before the API confirms it and undone if the API rejects it.
pub struct CartStore<A: CartApi, S: KvStore> {
  api: A,
  storage: Arc<S>,
  state: Mutex<CartState>,
}

#[derive(Debug, Default)]
struct CartState {
  cart: Cart,
  /// Lines with an add waiting on the API; dropped once none are left
  in_flight: HashMap<LineKey, InFlight>,
}

#[derive(Debug, Default)]
struct InFlight {
  adds: usize,
  /// Local edits of the line since the first pending add started
  edits: u64,
}

impl CartState {
  /// Record a local edit of `key`, or of every line when `key` is `None`.
  fn touch(&mut self, key: Option<&LineKey>) {
    match key {
      Some(key) => {
        if let Some(in_flight) = self.in_flight.get_mut(key) {
          in_flight.edits += 1;
        }
      }
      None => self.in_flight.values_mut().for_each(|f| f.edits += 1),
    }
  }
}

impl<A: CartApi, S: KvStore> CartStore<A, S> {
  /// Create the store, loading any cart persisted by a previous session.
  pub fn new(api: A, storage: Arc<S>) -> Self {
    let cart = load_cart(storage.as_ref());
    debug!(lines = cart.len(), "Loaded cart");
    Self {
      api,
      storage,
      state: Mutex::new(CartState {
        cart,
        in_flight: HashMap::new(),
      }),
    }
  }

  fn state(&self) -> MutexGuard<'_, CartState> {
    self.state.lock().unwrap_or_else(PoisonError::into_inner)
  }

  fn persist(&self, cart: &Cart) {
    let raw = match serde_json::to_string(cart.lines()) {
      Ok(raw) => raw,
      Err(e) => {
        warn!(error = %e, "Error serializing cart items");
        return;
      }
    };
    if let Err(e) = self.storage.set(CART_ITEMS_KEY, &raw) {
      warn!(error = %e, "Error saving cart items");
    }
  }

  /// Apply `f` and persist the cart, atomically with respect to other
  /// mutations.
  fn mutate<R>(&self, f: impl FnOnce(&mut CartState) -> R) -> R {
    let mut state = self.state();
    let out = f(&mut state);
    self.persist(&state.cart);
    out
  }

  /// A user edit. It wins over the rollback of any add still in flight.
  fn edit<R>(&self, key: Option<&LineKey>, f: impl FnOnce(&mut Cart) -> R) -> R {
    self.mutate(|state| {
      state.touch(key);
      f(&mut state.cart)
    })
  }

  /// Add one unit of a product variant and sync it to the remote cart.
  ///
  /// The increment is visible immediately, also while earlier adds of the
  /// same variant are still waiting on the API. On API failure this call's
  /// increment is undone and [`CartError::SyncFailed`] is returned.
  pub async fn add_item(
    &self,
    product: &Product,
    color: &ColorOption,
    storage: &StorageOption,
  ) -> Result<CartConfirmation, CartError> {
    let key = LineKey::new(product.id.clone(), color.code, storage.code);

    let pending = self.mutate(|state| {
      let before = state.cart.slot(&key);
      state.cart.add(product, color, storage);
      let written = state.cart.get(&key).cloned();

      let in_flight = state.in_flight.entry(key.clone()).or_default();
      in_flight.adds += 1;
      PendingAdd {
        store: self,
        edits: in_flight.edits,
        key,
        before,
        written,
        armed: true,
      }
    });

    let result = self
      .api
      .add_cart_item(&pending.key.product_id, pending.key.color_code, pending.key.storage_code)
      .await;

    match result {
      Ok(confirmation) => {
        pending.commit();
        Ok(confirmation)
      }
      Err(source) => {
        warn!(product_id = %pending.key.product_id, error = %source, "Error syncing with API cart, rolling back");
        // Still armed: dropping it undoes the increment
        drop(pending);
        Err(CartError::SyncFailed { source })
      }
    }
  }

  /// Remove a line. Missing lines are ignored.
  pub fn remove_item(&self, product_id: &str, color_code: i64, storage_code: i64) {
    let key = LineKey::new(product_id, color_code, storage_code);
    self.edit(Some(&key), |cart| cart.remove(&key));
  }

  /// Set a line's quantity locally. Zero or less removes the line.
  pub fn update_quantity(&self, product_id: &str, color_code: i64, storage_code: i64, quantity: i64) {
    let key = LineKey::new(product_id, color_code, storage_code);
    self.edit(Some(&key), |cart| cart.set_quantity(&key, quantity));
  }

  /// Empty the cart.
  pub fn clear(&self) {
    self.edit(None, Cart::clear);
  }

  /// Copy of the current lines in insertion order.
  pub fn lines(&self) -> Vec<CartLine> {
    self.state().cart.lines().to_vec()
  }

  pub fn line(&self, key: &LineKey) -> Option<CartLine> {
    self.state().cart.get(key).cloned()
  }

  pub fn is_empty(&self) -> bool {
    self.state().cart.is_empty()
  }

  pub fn total(&self) -> Decimal {
    self.state().cart.total()
  }

  pub fn count(&self) -> u64 {
    self.state().cart.count()
  }
}

/// An optimistic add waiting for the API. Dropping it without `commit`
/// (e.g. the caller abandoned the future) rolls the increment back.
struct PendingAdd<'a, A: CartApi, S: KvStore> {
  store: &'a CartStore<A, S>,
  key: LineKey,
  /// The line's slot right before this call's increment
  before: LineSlot,
  /// The line right after it
  written: Option<CartLine>,
  edits: u64,
  armed: bool,
}

impl<A: CartApi, S: KvStore> PendingAdd<'_, A, S> {
  fn commit(mut self) {
    self.armed = false;
  }

  fn undo(&self, state: &mut CartState, before: LineSlot) {
    let edited = state
      .in_flight
      .get(&self.key)
      .map_or(true, |f| f.edits != self.edits);
    if edited {
      warn!(product_id = %self.key.product_id, "Cart line changed during sync, not rolling back");
      return;
    }

    if state.cart.get(&self.key) == self.written.as_ref() {
      state.cart.restore_slot(&self.key, before);
    } else if let Some(quantity) = state.cart.get(&self.key).map(|l| l.quantity) {
      // Later adds of the same line are stacked on top; take back only ours
      state.cart.set_quantity(&self.key, i64::from(quantity) - 1);
    }
  }

  fn release(&self, state: &mut CartState) {
    if let Some(in_flight) = state.in_flight.get_mut(&self.key) {
      in_flight.adds = in_flight.adds.saturating_sub(1);
      if in_flight.adds == 0 {
        state.in_flight.remove(&self.key);
      }
    }
  }
}

impl<A: CartApi, S: KvStore> Drop for PendingAdd<'_, A, S> {
  fn drop(&mut self) {
    let before = self.before.take();
    let store = self.store;
    if self.armed {
      store.mutate(|state| {
        self.undo(state, before);
        self.release(state);
      });
    } else {
      self.release(&mut store.state());
    }
  }
}

fn load_cart<S: KvStore + ?Sized>(storage: &S) -> Cart {
  let raw = match storage.get(CART_ITEMS_KEY) {
    Ok(Some(raw)) => raw,
    Ok(None) => return Cart::new(),
    Err(e) => {
      warn!(error = %e, "Error reading cart items");
      return Cart::new();
    }
  };

  match serde_json::from_str::<Vec<CartLine>>(&raw) {
    Ok(lines) => Cart::from_lines(lines),
    Err(e) => {
      warn!(error = %e, "Stored cart is corrupt, starting empty");
      Cart::new()
    }
  }
}
