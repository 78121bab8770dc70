//! Wire shapes shared by every REST resource.

use serde::Deserialize;

use super::error::ApiError;

/// `{ success, data }` wrapper around every resource payload.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
  #[serde(default)]
  pub success: Option<bool>,
  #[serde(default)]
  pub message: Option<String>,
  pub data: T,
}

impl<T> Envelope<T> {
  pub fn into_data(self) -> Result<T, ApiError> {
    if self.success == Some(false) {
      return Err(ApiError::Rejected(
        self
          .message
          .unwrap_or_else(|| "request was not successful".to_string()),
      ));
    }
    Ok(self.data)
  }
}

/// Error payload sent with non-2xx responses.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorBody {
  pub message: Option<String>,
  pub error: Option<String>,
}

impl ErrorBody {
  /// Best-effort message extraction from a raw error body.
  pub fn message_from(body: &[u8]) -> Option<String> {
    match serde_json::from_slice::<ErrorBody>(body) {
      Ok(parsed) => parsed.message.or(parsed.error),
      Err(_) => {
        let text = String::from_utf8_lossy(body).trim().to_string();
        (!text.is_empty()).then_some(text)
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_envelope_rejected() {
    let env: Envelope<Option<u32>> =
      serde_json::from_str(r#"{"success":false,"message":"nope","data":null}"#).unwrap();
    assert_eq!(env.into_data(), Err(ApiError::Rejected("nope".to_string())));
  }

  #[test]
  fn test_envelope_without_success_flag() {
    let env: Envelope<Vec<u32>> = serde_json::from_str(r#"{"data":[1,2]}"#).unwrap();
    assert_eq!(env.into_data().unwrap(), vec![1, 2]);
  }

  #[test]
  fn test_error_body_message() {
    assert_eq!(
      ErrorBody::message_from(br#"{"success":false,"message":"Invalid token"}"#).as_deref(),
      Some("Invalid token")
    );
    assert_eq!(
      ErrorBody::message_from(b"Bad Gateway").as_deref(),
      Some("Bad Gateway")
    );
    assert_eq!(ErrorBody::message_from(b""), None);
  }
}
