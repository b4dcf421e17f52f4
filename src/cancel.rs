//! Cancellation token for abandoning in-flight fetches.
//!
//! A view that is torn down, or whose parameters change, cancels its token;
//! the request future observing it stops without touching shared state.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

#[derive(Debug, Default)]
struct Inner {
  cancelled: AtomicBool,
  notify: Notify,
}

/// A cancellation token for cooperative cancellation of async operations.
///
/// Clones share state: cancelling any clone cancels all of them.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
  inner: Arc<Inner>,
}

impl CancellationToken {
  pub fn new() -> Self {
    Self::default()
  }

  /// Request cancellation and wake every task waiting on `cancelled()`.
  pub fn cancel(&self) {
    self.inner.cancelled.store(true, Ordering::SeqCst);
    self.inner.notify.notify_waiters();
  }

  pub fn is_cancelled(&self) -> bool {
    self.inner.cancelled.load(Ordering::SeqCst)
  }

  /// Resolve once the token is cancelled.
  pub async fn cancelled(&self) {
    let notified = self.inner.notify.notified();
    tokio::pin!(notified);
    // Register before checking the flag so a concurrent cancel is not missed
    notified.as_mut().enable();
    if self.is_cancelled() {
      return;
    }
    notified.await;
  }

  /// Run `fut` unless the token is cancelled first.
  ///
  /// Returns `None` when cancelled; `fut` is dropped at that point.
  pub async fn run_until_cancelled<F: std::future::Future>(&self, fut: F) -> Option<F::Output> {
    if self.is_cancelled() {
      return None;
    }
    tokio::select! {
      biased;
      _ = self.cancelled() => None,
      out = fut => Some(out),
    }
  }
}
