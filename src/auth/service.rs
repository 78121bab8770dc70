//! Calls against the `/auth/*` endpoints.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::info;

use super::session::{AuthHolder, Session};
use crate::api::{ApiClient, ApiError};
use crate::domain::User;
use crate::notice::Notifier;

/// `{ success, user: {..., token} }` or `{ success, message }`
#[derive(Debug, Deserialize)]
struct AuthResponse {
  #[serde(default)]
  success: Option<bool>,
  #[serde(default)]
  user: Option<Value>,
  #[serde(default)]
  message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Registration {
  pub name: String,
  pub email: String,
  pub password: String,
}

#[derive(Clone)]
pub struct AuthService {
  client: ApiClient,
  auth: AuthHolder,
  notifier: Notifier,
  session_ttl: Duration,
}

impl AuthService {
  pub fn new(
    client: ApiClient,
    auth: AuthHolder,
    notifier: Notifier,
    session_ttl: Duration,
  ) -> Self {
    Self {
      client,
      auth,
      notifier,
      session_ttl,
    }
  }

  pub async fn login(&self, email: &str, password: &str) -> Result<User, ApiError> {
    let body = json!({ "email": email, "password": password });
    let result = self.client.post("/auth/login", &body).await;

    match self.start_session(result) {
      Ok(Some(user)) => {
        self
          .notifier
          .success(format!("Welcome back, {}", user.display_name()));
        Ok(user)
      }
      Ok(None) => self.fail(ApiError::Decode("login response had no user".to_string())),
      Err(e) => self.fail(e),
    }
  }

  /// Register; when the server returns a user with a token the new account
  /// is logged in straight away.
  pub async fn register(&self, registration: &Registration) -> Result<Option<User>, ApiError> {
    let result = self.client.post("/auth/register", registration).await;
    self.finish(result, "Account created")
  }

  pub async fn change_password(&self, current: &str, new: &str) -> Result<(), ApiError> {
    let body = json!({ "currentPassword": current, "newPassword": new });
    let result = self.client.patch("/auth/change-password", &body).await;
    self.finish(result, "Password changed").map(|_| ())
  }

  pub async fn forgot_password(&self, email: &str) -> Result<(), ApiError> {
    let body = json!({ "email": email });
    let result = self.client.post("/auth/forgot-password", &body).await;
    self.finish(result, "Password reset email sent").map(|_| ())
  }

  pub async fn reset_password(&self, token: &str, password: &str) -> Result<Option<User>, ApiError> {
    let body = json!({ "password": password });
    let path = format!("/auth/reset-password/{}", token);
    let result = self.client.put(&path, &body).await;
    self.finish(result, "Password reset")
  }

  pub fn logout(&self) {
    self.auth.clear();
    self.notifier.info("Logged out");
  }

  /// Shared tail for endpoints that answer with either a user or a message.
  fn finish(
    &self,
    result: Result<AuthResponse, ApiError>,
    default_message: &str,
  ) -> Result<Option<User>, ApiError> {
    let message = result
      .as_ref()
      .ok()
      .and_then(|r| r.message.clone())
      .unwrap_or_else(|| default_message.to_string());

    match self.start_session(result) {
      Ok(user) => {
        self.notifier.success(message);
        Ok(user)
      }
      Err(e) => self.fail(e),
    }
  }

  /// Validate the response and, when it carries a user, store the session.
  fn start_session(&self, result: Result<AuthResponse, ApiError>) -> Result<Option<User>, ApiError> {
    let response = result?;

    if response.success == Some(false) {
      return Err(ApiError::Rejected(
        response
          .message
          .unwrap_or_else(|| "request was not successful".to_string()),
      ));
    }

    let Some(user) = response.user else {
      return Ok(None);
    };

    let (user, token) = split_token(user)?;
    let ttl_ms = i64::try_from(self.session_ttl.as_millis()).unwrap_or(i64::MAX);
    let expires_at = Utc::now().timestamp_millis().saturating_add(ttl_ms);

    info!(user = %user.id, "logged in");
    self.auth.set_session(Session {
      user: user.clone(),
      token,
      expires_at,
    });

    Ok(Some(user))
  }

  fn fail<T>(&self, error: ApiError) -> Result<T, ApiError> {
    self.notifier.error(error.user_message().to_string());
    Err(error)
  }
}

/// Pull the bearer token out of the user object so it is never stored with it.
fn split_token(mut user: Value) -> Result<(User, String), ApiError> {
  let token = user
    .as_object_mut()
    .and_then(|obj| obj.remove("token"))
    .and_then(|t| t.as_str().map(String::from))
    .ok_or_else(|| ApiError::Decode("auth response had no token".to_string()))?;

  let user: User = serde_json::from_value(user).map_err(|e| ApiError::Decode(e.to_string()))?;
  Ok((user, token))
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::transport::mock::MockTransport;
  use crate::cache::{KeyValueStorage, SqliteStorage};
  use crate::notice::NoticeLevel;
  use std::sync::Arc;

  fn setup() -> (
    Arc<MockTransport>,
    AuthHolder,
    AuthService,
    tokio::sync::mpsc::UnboundedReceiver<crate::notice::Notice>,
    Arc<dyn KeyValueStorage>,
  ) {
    let mock = MockTransport::new();
    let storage: Arc<dyn KeyValueStorage> = Arc::new(SqliteStorage::open_in_memory().unwrap());
    let auth = AuthHolder::load(storage.clone());
    let client = ApiClient::new("http://mock.local", mock.clone(), auth.clone()).unwrap();
    let (notifier, rx) = Notifier::channel();
    let service = AuthService::new(client, auth.clone(), notifier, Duration::from_secs(3600));
    (mock, auth, service, rx, storage)
  }

  #[tokio::test]
  async fn test_login_strips_token_and_stores_session() {
    let (mock, auth, service, mut notices, storage) = setup();
    mock.respond(
      "POST",
      "/auth/login",
      200,
      json!({"success": true, "user": {"id": "u1", "name": "Hana", "token": "jwt-123"}}),
    );

    let user = service.login("hana@site.example", "pw").await.unwrap();

    assert_eq!(user.id, "u1");
    assert!(!user.extra.contains_key("token"));
    assert_eq!(auth.token().as_deref(), Some("jwt-123"));
    assert_eq!(notices.try_recv().unwrap().level, NoticeLevel::Success);

    let session = auth.session().unwrap();
    assert!(!session.is_expired());
    assert!(session.remaining() > Duration::from_secs(3500));

    // Persisted blob keeps the token outside the user object
    let blob: Value = serde_json::from_str(&storage.get("auth-session").unwrap().unwrap()).unwrap();
    assert_eq!(blob["token"], json!("jwt-123"));
    assert!(blob["user"].get("token").is_none());
  }

  #[tokio::test]
  async fn test_unbounded_ttl_saturates_expiry() {
    let mock = MockTransport::new();
    let auth = AuthHolder::load(Arc::new(SqliteStorage::open_in_memory().unwrap()));
    let client = ApiClient::new("http://mock.local", mock.clone(), auth.clone()).unwrap();
    let (notifier, _) = Notifier::channel();
    let service = AuthService::new(client, auth.clone(), notifier, Duration::MAX);
    mock.respond(
      "POST",
      "/auth/login",
      200,
      json!({"success": true, "user": {"id": "u1", "token": "jwt"}}),
    );

    service.login("hana@site.example", "pw").await.unwrap();

    let session = auth.session().unwrap();
    assert_eq!(session.expires_at, i64::MAX);
    assert!(!session.is_expired());
  }

  #[tokio::test]
  async fn test_login_failure_notifies_and_keeps_anonymous() {
    let (mock, auth, service, mut notices, _) = setup();
    mock.respond(
      "POST",
      "/auth/login",
      401,
      json!({"success": false, "message": "Invalid credentials"}),
    );

    let err = service.login("x@y.z", "bad").await.unwrap_err();

    assert_eq!(err.user_message(), "Invalid credentials");
    assert!(auth.session().is_none());
    let notice = notices.try_recv().unwrap();
    assert_eq!(notice.level, NoticeLevel::Error);
    assert_eq!(notice.message, "Invalid credentials");
  }

  #[tokio::test]
  async fn test_forgot_password_uses_server_message() {
    let (mock, _, service, mut notices, _) = setup();
    mock.respond(
      "POST",
      "/auth/forgot-password",
      200,
      json!({"success": true, "message": "Check your inbox"}),
    );

    service.forgot_password("hana@site.example").await.unwrap();
    assert_eq!(notices.try_recv().unwrap().message, "Check your inbox");
  }

  #[tokio::test]
  async fn test_reset_password_logs_in() {
    let (mock, auth, service, _, _) = setup();
    mock.respond(
      "PUT",
      "/auth/reset-password/reset-tok",
      200,
      json!({"success": true, "user": {"id": "u9", "token": "fresh"}}),
    );

    let user = service.reset_password("reset-tok", "n3w").await.unwrap();
    assert_eq!(user.map(|u| u.id), Some("u9".to_string()));
    assert_eq!(auth.token().as_deref(), Some("fresh"));
  }

  #[tokio::test]
  async fn test_change_password_rejected() {
    let (mock, _, service, mut notices, _) = setup();
    mock.respond(
      "PATCH",
      "/auth/change-password",
      200,
      json!({"success": false, "message": "Current password is wrong"}),
    );

    let err = service.change_password("old", "new").await.unwrap_err();
    assert_eq!(err, ApiError::Rejected("Current password is wrong".to_string()));
    assert_eq!(notices.try_recv().unwrap().level, NoticeLevel::Error);
  }

  #[tokio::test]
  async fn test_logout_clears_session() {
    let (mock, auth, service, _, _) = setup();
    mock.respond(
      "POST",
      "/auth/login",
      200,
      json!({"user": {"id": "u1", "token": "t"}}),
    );
    service.login("a@b.c", "pw").await.unwrap();

    service.logout();
    assert!(auth.token().is_none());
  }
}
