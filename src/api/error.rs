use thiserror::Error;

/// Errors surfaced by the HTTP boundary.
///
/// Cloneable so a single failed request can be handed to every subscriber
/// that joined the same in-flight query.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
  /// The request never produced a response (DNS, connect, timeout, ...)
  #[error("network error: {0}")]
  Transport(String),

  /// Non-2xx response; `message` is the server's error payload when it sent one
  #[error("server returned {status}: {message}")]
  Status { status: u16, message: String },

  /// 2xx response whose envelope said `success: false`
  #[error("request rejected: {0}")]
  Rejected(String),

  /// Response body did not match the expected shape
  #[error("unexpected response: {0}")]
  Decode(String),

  /// Refused before sending, e.g. an id that cannot be a path segment
  #[error("invalid request: {0}")]
  Invalid(String),
}

impl ApiError {
  pub fn is_not_found(&self) -> bool {
    matches!(self, ApiError::Status { status: 404, .. })
  }

  /// Server-side validation failure on a mutation
  pub fn is_validation(&self) -> bool {
    matches!(self, ApiError::Status { status: 400 | 422, .. })
  }

  /// Message suitable for a user-facing notice.
  pub fn user_message(&self) -> &str {
    match self {
      ApiError::Transport(msg)
      | ApiError::Rejected(msg)
      | ApiError::Decode(msg)
      | ApiError::Invalid(msg) => msg,
      ApiError::Status { message, .. } => message,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_categories() {
    let not_found = ApiError::Status {
      status: 404,
      message: "Project not found".to_string(),
    };
    assert!(not_found.is_not_found());
    assert!(!not_found.is_validation());

    let invalid = ApiError::Status {
      status: 422,
      message: "name is required".to_string(),
    };
    assert!(invalid.is_validation());
    assert_eq!(invalid.user_message(), "name is required");

    assert!(!ApiError::Transport("refused".to_string()).is_not_found());
  }
}
