//! Session expiry: startup check and a background timer.

use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::session::AuthHolder;

/// Outcome of the startup session check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionStatus {
  /// No session stored
  Anonymous,
  Active { remaining: Duration },
  /// A stored session had lapsed and was cleared; the user must log in again
  Expired,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
  Expired,
}

/// Check the stored session before anything protected runs.
pub fn check_session(auth: &AuthHolder) -> SessionStatus {
  match auth.session() {
    None => SessionStatus::Anonymous,
    Some(session) if session.is_expired() => {
      info!("stored session expired, clearing");
      auth.clear();
      SessionStatus::Expired
    }
    Some(session) => SessionStatus::Active {
      remaining: session.remaining(),
    },
  }
}

/// Background timer that logs the user out when the session lapses.
///
/// Re-armed on every login-state change; stops when dropped.
pub struct SessionExpiryTimer {
  handle: JoinHandle<()>,
}

impl SessionExpiryTimer {
  pub fn arm(auth: AuthHolder, tx: mpsc::UnboundedSender<SessionEvent>) -> Self {
    let handle = tokio::spawn(async move {
      let mut changes = auth.subscribe();

      loop {
        let remaining = changes.borrow_and_update().as_ref().map(|s| s.remaining());

        match remaining {
          Some(remaining) => {
            tokio::select! {
              _ = tokio::time::sleep(remaining) => {
                warn!("session expired");
                auth.clear();
                if tx.send(SessionEvent::Expired).is_err() {
                  break;
                }
              }
              changed = changes.changed() => {
                if changed.is_err() {
                  break;
                }
              }
            }
          }
          None => {
            if changes.changed().await.is_err() {
              break;
            }
          }
        }
      }
    });

    Self { handle }
  }
}

impl Drop for SessionExpiryTimer {
  fn drop(&mut self) {
    self.handle.abort();
  }
}
