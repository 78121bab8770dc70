//! Core traits for synchronized entities.

use serde::{de::DeserializeOwned, Serialize};

/// A domain record kept in a local store and fetched through the query cache.
///
/// Implementors must provide a unique id; `updated_at` is optional and only
/// informational.
pub trait Entity: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
  /// Unique identifier (server-assigned)
  fn id(&self) -> &str;

  /// Last modification timestamp (ISO 8601), when the server sends one
  fn updated_at(&self) -> Option<&str> {
    None
  }
}
