//! View-level fetch state for the product list and detail screens.
//!
//! A `Query<T>` owns one in-flight request at a time and exposes the
//! loading/success/error state a view renders. Replacing or dropping the
//! query cancels the request; a cancelled request never shows up as an error.
//!
//! # Example
//!
//! ```ignore
//! let api = Arc::clone(&api);
//! let mut query = Query::new(move |cancel| {
//!     let api = Arc::clone(&api);
//!     async move { api.list_products(&cancel).await }
//! })
//! .with_error_message("Error loading products. Please try again later.");
//!
//! query.fetch();
//!
//! // In event loop tick
//! if query.poll() {
//!     // State changed, trigger re-render
//! }
//!
//! match query.state() {
//!     QueryState::Loading => render_spinner(),
//!     QueryState::Success(products) => render_grid(products),
//!     QueryState::Error(message) => render_retry(message),
//!     QueryState::Idle => {}
//! }
//! ```

use futures::future::BoxFuture;
use std::future::Future;
use tokio::sync::oneshot;
use tracing::warn;

use crate::api::ApiResult;
use crate::cancel::CancellationToken;

/// The state of a query
#[derive(Debug, Clone)]
pub enum QueryState<T> {
  /// Not started, or the last request was cancelled
  Idle,
  /// A request is in flight
  Loading,
  /// Query completed successfully
  Success(T),
  /// Query failed; holds the message to show next to a retry action
  Error(String),
}

impl<T> QueryState<T> {
  pub fn is_loading(&self) -> bool {
    matches!(self, QueryState::Loading)
  }

  pub fn is_success(&self) -> bool {
    matches!(self, QueryState::Success(_))
  }

  pub fn is_error(&self) -> bool {
    matches!(self, QueryState::Error(_))
  }

  pub fn data(&self) -> Option<&T> {
    match self {
      QueryState::Success(data) => Some(data),
      _ => None,
    }
  }

  pub fn error(&self) -> Option<&str> {
    match self {
      QueryState::Error(e) => Some(e),
      _ => None,
    }
  }
}

/// A factory function that creates futures for fetching data
type FetcherFn<T> = Box<dyn Fn(CancellationToken) -> BoxFuture<'static, ApiResult<T>> + Send + Sync>;

/// Async query for data fetching with state management.
pub struct Query<T> {
  state: QueryState<T>,
  fetcher: FetcherFn<T>,
  receiver: Option<oneshot::Receiver<ApiResult<T>>>,
  cancel: Option<CancellationToken>,
  error_message: Option<String>,
}

impl<T: Send + 'static> Query<T> {
  /// Create a new query with the given fetcher function.
  ///
  /// The fetcher receives the token for the request it starts and is called
  /// each time `fetch()` or `refetch()` starts a request.
  pub fn new<F, Fut>(fetcher: F) -> Self
  where
    F: Fn(CancellationToken) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ApiResult<T>> + Send + 'static,
  {
    Self {
      state: QueryState::Idle,
      fetcher: Box::new(move |cancel| Box::pin(fetcher(cancel))),
      receiver: None,
      cancel: None,
      error_message: None,
    }
  }

  /// Show `message` on failure instead of the underlying error text.
  pub fn with_error_message(mut self, message: impl Into<String>) -> Self {
    self.error_message = Some(message.into());
    self
  }

  pub fn state(&self) -> &QueryState<T> {
    &self.state
  }

  pub fn data(&self) -> Option<&T> {
    self.state.data()
  }

  pub fn is_loading(&self) -> bool {
    self.state.is_loading()
  }

  pub fn is_success(&self) -> bool {
    self.state.is_success()
  }

  pub fn is_error(&self) -> bool {
    self.state.is_error()
  }

  pub fn error(&self) -> Option<&str> {
    self.state.error()
  }

  /// Start fetching data if not already loading.
  pub fn fetch(&mut self) {
    if self.state.is_loading() {
      return;
    }
    self.start_fetch();
  }

  /// Cancel any pending request and start a new one.
  pub fn refetch(&mut self) {
    self.abandon();
    self.start_fetch();
  }

  /// Abandon the pending request, if any. The state goes back to `Idle`.
  pub fn cancel(&mut self) {
    self.abandon();
    if self.state.is_loading() {
      self.state = QueryState::Idle;
    }
  }

  /// Poll for results from a pending fetch.
  ///
  /// Returns `true` if the state changed. Call this in the event loop tick.
  pub fn poll(&mut self) -> bool {
    let receiver = match &mut self.receiver {
      Some(rx) => rx,
      None => return false,
    };

    let result = match receiver.try_recv() {
      Ok(result) => Some(result),
      Err(oneshot::error::TryRecvError::Empty) => return false,
      Err(oneshot::error::TryRecvError::Closed) => None,
    };

    self.finish(result);
    true
  }

  /// Wait for the pending request and apply its result.
  pub async fn settle(&mut self) -> &QueryState<T> {
    // Awaited in place so the request stays cancellable if this future is dropped
    let result = match self.receiver.as_mut() {
      Some(receiver) => receiver.await.ok(),
      None => return &self.state,
    };
    self.finish(result);
    &self.state
  }

  /// Apply a finished request. `None` means the task ended without answering.
  fn finish(&mut self, result: Option<ApiResult<T>>) {
    let cancelled = self
      .cancel
      .take()
      .is_some_and(|cancel| cancel.is_cancelled());
    self.receiver = None;

    self.state = match result {
      Some(Ok(data)) => QueryState::Success(data),
      Some(Err(e)) if e.is_cancelled() => QueryState::Idle,
      Some(Err(e)) => {
        warn!(error = %e, "Query failed");
        self.failure(e.to_string())
      }
      None if cancelled => QueryState::Idle,
      None => {
        warn!("Query task ended without a result");
        self.failure("Request failed unexpectedly".to_string())
      }
    };
  }

  fn failure(&self, detail: String) -> QueryState<T> {
    QueryState::Error(self.error_message.clone().unwrap_or(detail))
  }

  fn abandon(&mut self) {
    if let Some(cancel) = self.cancel.take() {
      cancel.cancel();
    }
    self.receiver = None;
  }

  fn start_fetch(&mut self) {
    let (tx, rx) = oneshot::channel();
    let cancel = CancellationToken::new();
    self.receiver = Some(rx);
    self.cancel = Some(cancel.clone());
    self.state = QueryState::Loading;

    let future = (self.fetcher)(cancel);
    tokio::spawn(async move {
      let result = future.await;
      // Receiver is gone if the query was cancelled or dropped
      let _ = tx.send(result);
    });
  }
}

impl<T> Drop for Query<T> {
  fn drop(&mut self) {
    if let Some(cancel) = self.cancel.take() {
      cancel.cancel();
    }
  }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Query<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Query")
      .field("state", &self.state)
      .field("in_flight", &self.receiver.is_some())
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::ApiError;
  use std::sync::atomic::{AtomicU32, Ordering};
  use std::sync::Arc;
  use std::time::Duration;

  #[tokio::test]
  async fn test_query_success() {
    let mut query = Query::new(|_| async { Ok(vec![1, 2, 3]) });

    assert!(matches!(query.state(), QueryState::Idle));

    query.fetch();
    assert!(query.is_loading());

    // Wait for the result
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(query.poll());
    assert!(query.is_success());
    assert_eq!(query.data(), Some(&vec![1, 2, 3]));
  }

  #[tokio::test]
  async fn test_query_error_uses_view_message() {
    let mut query: Query<i32> = Query::new(|_| async {
      Err(ApiError::Status {
        status: 500,
        url: "http://test/api/product".to_string(),
      })
    })
    .with_error_message("Error loading products. Please try again later.");

    query.fetch();
    query.settle().await;

    assert!(query.is_error());
    assert_eq!(
      query.error(),
      Some("Error loading products. Please try again later.")
    );
  }

  #[tokio::test]
  async fn test_query_error_defaults_to_error_text() {
    let mut query: Query<i32> = Query::new(|_| async {
      Err(ApiError::Status {
        status: 404,
        url: "http://test/api/product/x".to_string(),
      })
    });

    query.fetch();
    query.settle().await;

    assert_eq!(
      query.error(),
      Some("HTTP error! status: 404 at http://test/api/product/x")
    );
  }

  #[tokio::test]
  async fn test_cancelled_result_is_not_an_error() {
    let mut query: Query<i32> = Query::new(|_| async { Err(ApiError::Cancelled) });

    query.fetch();
    query.settle().await;

    assert!(matches!(query.state(), QueryState::Idle));
  }

  #[tokio::test]
  async fn test_task_dying_without_answer_is_an_error() {
    let mut query: Query<i32> = Query::new(|_| async {
      if true {
        panic!("fetch task died");
      }
      Ok(1)
    })
    .with_error_message("Error loading product details. Please try again later.");

    query.fetch();
    query.settle().await;

    assert_eq!(
      query.error(),
      Some("Error loading product details. Please try again later.")
    );
  }

  #[tokio::test]
  async fn test_poll_reports_task_dying_without_answer() {
    let mut query: Query<i32> = Query::new(|_| async {
      if true {
        panic!("fetch task died");
      }
      Ok(1)
    });

    query.fetch();
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(query.poll());
    assert_eq!(query.error(), Some("Request failed unexpectedly"));
    assert!(!query.poll());
  }

  #[tokio::test]
  async fn test_dropped_settle_keeps_request_cancellable() {
    let token_seen = Arc::new(std::sync::Mutex::new(None));
    let token_seen_clone = Arc::clone(&token_seen);

    let mut query = Query::new(move |cancel: CancellationToken| {
      *token_seen_clone.lock().unwrap() = Some(cancel.clone());
      async move {
        cancel.cancelled().await;
        Err::<i32, _>(ApiError::Cancelled)
      }
    });
    query.fetch();

    let settled = tokio::time::timeout(Duration::from_millis(10), query.settle()).await;
    assert!(settled.is_err());
    assert!(query.is_loading());

    query.cancel();
    let token = token_seen.lock().unwrap().clone().unwrap();
    assert!(token.is_cancelled());
    assert!(matches!(query.state(), QueryState::Idle));
  }

  #[tokio::test]
  async fn test_cancel_signals_fetcher() {
    let observed = Arc::new(AtomicU32::new(0));
    let observed_clone = Arc::clone(&observed);

    let mut query = Query::new(move |cancel: CancellationToken| {
      let observed = Arc::clone(&observed_clone);
      async move {
        cancel.cancelled().await;
        observed.fetch_add(1, Ordering::SeqCst);
        Err::<i32, _>(ApiError::Cancelled)
      }
    });

    query.fetch();
    query.cancel();
    assert!(matches!(query.state(), QueryState::Idle));
    assert!(!query.poll());

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(observed.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_drop_cancels_in_flight_request() {
    let token_seen = Arc::new(std::sync::Mutex::new(None));
    let token_seen_clone = Arc::clone(&token_seen);

    let mut query = Query::new(move |cancel: CancellationToken| {
      *token_seen_clone.lock().unwrap() = Some(cancel.clone());
      async move {
        cancel.cancelled().await;
        Err::<i32, _>(ApiError::Cancelled)
      }
    });
    query.fetch();
    drop(query);

    let token = token_seen.lock().unwrap().clone().unwrap();
    assert!(token.is_cancelled());
  }

  #[tokio::test]
  async fn test_fetch_while_loading_is_noop() {
    let counter = Arc::new(AtomicU32::new(0));
    let counter_clone = Arc::clone(&counter);

    let mut query = Query::new(move |_| {
      counter_clone.fetch_add(1, Ordering::SeqCst);
      async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        Ok(42)
      }
    });

    query.fetch();
    query.fetch();
    assert!(query.is_loading());
    assert_eq!(counter.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_refetch_cancels_pending() {
    let counter = Arc::new(AtomicU32::new(0));
    let counter_clone = Arc::clone(&counter);

    let mut query = Query::new(move |cancel: CancellationToken| {
      let n = counter_clone.fetch_add(1, Ordering::SeqCst);
      async move {
        cancel
          .run_until_cancelled(tokio::time::sleep(Duration::from_millis(50)))
          .await
          .ok_or(ApiError::Cancelled)?;
        Ok::<_, ApiError>(n)
      }
    });

    query.fetch();
    tokio::time::sleep(Duration::from_millis(10)).await;

    // Refetch should cancel the first and start a new one
    query.refetch();
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert!(query.poll());
    // Only the second fetch should have completed and been received
    assert_eq!(query.data(), Some(&1));
  }
}
