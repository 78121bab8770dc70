use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::cache::KeyValueStorage;
use crate::domain::User;

/// Durable blob holding the current session.
const SESSION_BLOB: &str = "auth-session";

/// Logged-in state: the user, their bearer token and when it lapses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
  pub user: User,
  pub token: String,
  /// Epoch milliseconds
  pub expires_at: i64,
}

impl Session {
  pub fn is_expired(&self) -> bool {
    Utc::now().timestamp_millis() >= self.expires_at
  }

  /// Time left before expiry, zero once expired.
  pub fn remaining(&self) -> Duration {
    let left = self.expires_at - Utc::now().timestamp_millis();
    Duration::from_millis(left.max(0) as u64)
  }
}

/// Process-wide credential holder.
///
/// Clones share state. Readers always see the latest session, so the HTTP
/// client picks up a new token on its next request.
#[derive(Clone)]
pub struct AuthHolder {
  inner: Arc<Inner>,
}

struct Inner {
  state: watch::Sender<Option<Session>>,
  storage: Arc<dyn KeyValueStorage>,
}

impl AuthHolder {
  /// Rehydrate the session saved in `storage`, if any.
  pub fn load(storage: Arc<dyn KeyValueStorage>) -> Self {
    let session = match storage.get(SESSION_BLOB) {
      Ok(Some(blob)) => serde_json::from_str::<Session>(&blob)
        .map_err(|e| warn!("discarding unreadable session: {}", e))
        .ok(),
      Ok(None) => None,
      Err(e) => {
        warn!("failed to read session: {}", e);
        None
      }
    };

    let (state, _) = watch::channel(session);
    Self {
      inner: Arc::new(Inner { state, storage }),
    }
  }

  pub fn token(&self) -> Option<String> {
    self.inner.state.borrow().as_ref().map(|s| s.token.clone())
  }

  pub fn session(&self) -> Option<Session> {
    self.inner.state.borrow().clone()
  }

  pub fn user(&self) -> Option<User> {
    self.inner.state.borrow().as_ref().map(|s| s.user.clone())
  }

  pub fn set_session(&self, session: Session) {
    match serde_json::to_string(&session) {
      Ok(blob) => {
        if let Err(e) = self.inner.storage.set(SESSION_BLOB, &blob) {
          warn!("failed to persist session: {}", e);
        }
      }
      Err(e) => warn!("failed to serialize session: {}", e),
    }

    info!(user = %session.user.id, "session started");
    self.inner.state.send_replace(Some(session));
  }

  pub fn clear(&self) {
    if let Err(e) = self.inner.storage.remove(SESSION_BLOB) {
      warn!("failed to remove session: {}", e);
    }

    if self.inner.state.send_replace(None).is_some() {
      info!("session cleared");
    }
  }

  /// Receiver notified on every login/logout.
  pub fn subscribe(&self) -> watch::Receiver<Option<Session>> {
    self.inner.state.subscribe()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::SqliteStorage;

  fn session(expires_in_ms: i64) -> Session {
    Session {
      user: User::named("u1", "Foreman"),
      token: "tok".to_string(),
      expires_at: Utc::now().timestamp_millis() + expires_in_ms,
    }
  }

  #[test]
  fn test_session_persists_across_loads() {
    let storage: Arc<dyn KeyValueStorage> = Arc::new(SqliteStorage::open_in_memory().unwrap());

    AuthHolder::load(storage.clone()).set_session(session(60_000));

    let reloaded = AuthHolder::load(storage.clone());
    assert_eq!(reloaded.token().as_deref(), Some("tok"));

    reloaded.clear();
    assert!(AuthHolder::load(storage).session().is_none());
  }

  #[test]
  fn test_clones_share_state() {
    let storage: Arc<dyn KeyValueStorage> = Arc::new(SqliteStorage::open_in_memory().unwrap());
    let a = AuthHolder::load(storage);
    let b = a.clone();

    a.set_session(session(60_000));
    assert_eq!(b.user().map(|u| u.id), Some("u1".to_string()));
  }

  #[test]
  fn test_expiry_math() {
    assert!(session(-1).is_expired());
    assert_eq!(session(-5_000).remaining(), Duration::ZERO);

    let live = session(60_000);
    assert!(!live.is_expired());
    assert!(live.remaining() > Duration::from_secs(50));
  }
}
