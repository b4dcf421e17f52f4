//! Debounced values.
//!
//! A [`Debouncer`] takes rapid raw updates (keystrokes in the search box)
//! and publishes the latest one only once it has been stable for the delay.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Delay used by the catalog search box.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(300);

/// Timer-based debouncer publishing through a watch channel.
///
/// The initial value is published immediately. Each `set` cancels the
/// pending emission of the previous value.
pub struct Debouncer<T> {
  delay: Duration,
  raw: T,
  tx: Arc<watch::Sender<T>>,
  pending: Option<JoinHandle<()>>,
}

impl<T: Clone + Send + Sync + 'static> Debouncer<T> {
  pub fn new(initial: T, delay: Duration) -> Self {
    let (tx, _rx) = watch::channel(initial.clone());
    Self {
      delay,
      raw: initial,
      tx: Arc::new(tx),
      pending: None,
    }
  }

  /// Debouncer with the default 300ms delay.
  pub fn with_default_delay(initial: T) -> Self {
    Self::new(initial, DEFAULT_DEBOUNCE)
  }

  /// Record a new raw value and schedule its emission.
  pub fn set(&mut self, value: T) {
    self.cancel_pending();
    self.raw = value.clone();

    let tx = Arc::clone(&self.tx);
    let delay = self.delay;
    self.pending = Some(tokio::spawn(async move {
      tokio::time::sleep(delay).await;
      tx.send_replace(value);
    }));
  }

  /// Latest raw value, emitted or not.
  pub fn raw(&self) -> &T {
    &self.raw
  }

  /// Latest emitted value.
  pub fn current(&self) -> T {
    self.tx.borrow().clone()
  }

  /// Receiver that observes every emission.
  pub fn subscribe(&self) -> watch::Receiver<T> {
    self.tx.subscribe()
  }

  /// Emit the raw value now, skipping the remaining delay.
  pub fn flush(&mut self) {
    self.cancel_pending();
    self.tx.send_replace(self.raw.clone());
  }

  fn cancel_pending(&mut self) {
    if let Some(pending) = self.pending.take() {
      pending.abort();
    }
  }
}

impl<T> Drop for Debouncer<T> {
  fn drop(&mut self) {
    if let Some(pending) = self.pending.take() {
      pending.abort();
    }
  }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Debouncer<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Debouncer")
      .field("delay", &self.delay)
      .field("raw", &self.raw)
      .field("pending", &self.pending.is_some())
      .finish_non_exhaustive()
  }
}
