//! Failures at the network boundary.
//!
//! The kind is decided where the HTTP call is made, from the transport
//! error or the response status, so nothing downstream inspects message text.

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  Network,
  Authentication,
  RateLimit,
  Generic,
}

impl ErrorKind {
  pub fn title(self) -> &'static str {
    match self {
      ErrorKind::Network => "Connection problem",
      ErrorKind::Authentication => "Authentication required",
      ErrorKind::RateLimit => "Rate limit exceeded",
      ErrorKind::Generic => "Something went wrong",
    }
  }

  /// User-facing advice. Generic failures show their own message instead.
  pub fn hint(self) -> Option<&'static str> {
    match self {
      ErrorKind::Network => Some("Check your internet connection and try again."),
      ErrorKind::Authentication => Some("Your session has expired. Please log in again."),
      ErrorKind::RateLimit => Some("Too many requests. Wait a moment and retry."),
      ErrorKind::Generic => None,
    }
  }

  pub fn is_retryable(self) -> bool {
    !matches!(self, ErrorKind::Authentication)
  }

  /// Classify a non-success HTTP status.
  pub fn from_status(status: StatusCode, rate_limit_exhausted: bool) -> Self {
    match status {
      StatusCode::TOO_MANY_REQUESTS => ErrorKind::RateLimit,
      StatusCode::FORBIDDEN if rate_limit_exhausted => ErrorKind::RateLimit,
      StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ErrorKind::Authentication,
      _ => ErrorKind::Generic,
    }
  }
}

#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ApiError {
  pub kind: ErrorKind,
  pub message: String,
}

impl ApiError {
  pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
    Self {
      kind,
      message: message.into(),
    }
  }

  pub fn missing_token() -> Self {
    Self::new(ErrorKind::Authentication, "No authentication token found")
  }

  /// Wrap a reqwest failure that happened before a usable response arrived.
  pub fn transport(context: &str, err: reqwest::Error) -> Self {
    let kind = if err.is_timeout() || err.is_connect() || err.is_request() {
      ErrorKind::Network
    } else if let Some(status) = err.status() {
      ErrorKind::from_status(status, false)
    } else if err.is_decode() || err.is_builder() {
      ErrorKind::Generic
    } else {
      ErrorKind::Network
    };
    Self::new(kind, format!("{}: {}", context, err))
  }

  /// Build from an error response.
  pub fn from_response(
    context: &str,
    status: StatusCode,
    rate_limit_exhausted: bool,
    body_message: Option<String>,
  ) -> Self {
    let detail = body_message
      .filter(|m| !m.trim().is_empty())
      .or_else(|| status.canonical_reason().map(String::from))
      .unwrap_or_else(|| "request failed".to_string());
    Self::new(
      ErrorKind::from_status(status, rate_limit_exhausted),
      format!("{} ({}): {}", context, status.as_u16(), detail),
    )
  }

  /// Text for an error banner: the kind's hint, or the raw message.
  pub fn user_message(&self) -> String {
    self
      .kind
      .hint()
      .map(String::from)
      .unwrap_or_else(|| self.message.clone())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_status_classification() {
    assert_eq!(
      ErrorKind::from_status(StatusCode::UNAUTHORIZED, false),
      ErrorKind::Authentication
    );
    assert_eq!(
      ErrorKind::from_status(StatusCode::FORBIDDEN, false),
      ErrorKind::Authentication
    );
    assert_eq!(
      ErrorKind::from_status(StatusCode::FORBIDDEN, true),
      ErrorKind::RateLimit
    );
    assert_eq!(
      ErrorKind::from_status(StatusCode::TOO_MANY_REQUESTS, false),
      ErrorKind::RateLimit
    );
    assert_eq!(
      ErrorKind::from_status(StatusCode::INTERNAL_SERVER_ERROR, false),
      ErrorKind::Generic
    );
    assert_eq!(
      ErrorKind::from_status(StatusCode::NOT_FOUND, false),
      ErrorKind::Generic
    );
  }

  #[test]
  fn test_only_authentication_is_final() {
    assert!(ErrorKind::Network.is_retryable());
    assert!(ErrorKind::RateLimit.is_retryable());
    assert!(ErrorKind::Generic.is_retryable());
    assert!(!ErrorKind::Authentication.is_retryable());
  }

  #[test]
  fn test_response_message_prefers_body() {
    let err = ApiError::from_response(
      "list repositories",
      StatusCode::BAD_GATEWAY,
      false,
      Some("upstream down".to_string()),
    );
    assert_eq!(err.kind, ErrorKind::Generic);
    assert_eq!(err.to_string(), "list repositories (502): upstream down");
    assert_eq!(err.user_message(), err.message);

    let err = ApiError::from_response("stats", StatusCode::UNAUTHORIZED, false, None);
    assert_eq!(err.message, "stats (401): Unauthorized");
    assert_eq!(
      err.user_message(),
      "Your session has expired. Please log in again."
    );
  }

  #[test]
  fn test_missing_token_is_authentication() {
    assert_eq!(ApiError::missing_token().kind, ErrorKind::Authentication);
  }
}
