//! Error types for storefront API calls.

/// Errors that can occur when calling the storefront API.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
  /// The server answered with a non-2xx status.
  #[error("HTTP error! status: {status} at {url}")]
  Status { status: u16, url: String },

  /// The request never produced a response (DNS, connect, timeout, ...).
  #[error("Request to {url} failed: {source}")]
  Transport {
    url: String,
    #[source]
    source: reqwest::Error,
  },

  /// The response body was not the expected JSON.
  #[error("Invalid response from {url}: {source}")]
  Decode {
    url: String,
    #[source]
    source: reqwest::Error,
  },

  /// The caller abandoned the request. Not a failure.
  #[error("Request cancelled")]
  Cancelled,
}

impl ApiError {
  /// Whether the request was abandoned rather than failed.
  pub fn is_cancelled(&self) -> bool {
    matches!(self, Self::Cancelled)
  }

  /// HTTP status for status failures.
  pub fn status(&self) -> Option<u16> {
    match self {
      Self::Status { status, .. } => Some(*status),
      _ => None,
    }
  }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
