//! Transient user-facing notices (the "toast" channel).

use tokio::sync::mpsc;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
  Success,
  Info,
  Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
  pub level: NoticeLevel,
  pub message: String,
}

/// Cloneable sender half. Sending never fails; notices are dropped when
/// nobody is listening.
#[derive(Debug, Clone)]
pub struct Notifier {
  tx: mpsc::UnboundedSender<Notice>,
}

impl Notifier {
  pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notice>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Self { tx }, rx)
  }

  pub fn success(&self, message: impl Into<String>) {
    let message = message.into();
    info!(notice = %message);
    self.send(NoticeLevel::Success, message);
  }

  pub fn info(&self, message: impl Into<String>) {
    let message = message.into();
    info!(notice = %message);
    self.send(NoticeLevel::Info, message);
  }

  pub fn error(&self, message: impl Into<String>) {
    let message = message.into();
    warn!(notice = %message);
    self.send(NoticeLevel::Error, message);
  }

  fn send(&self, level: NoticeLevel, message: String) {
    let _ = self.tx.send(Notice { level, message });
  }
}
