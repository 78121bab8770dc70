//! Durable key-value storage for store snapshots.
//!
//! Every store (and the auth session) is saved as one JSON blob under its
//! own name. The whole blob is rewritten on each change.

use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Trait for durable storage backends.
pub trait KeyValueStorage: Send + Sync {
  /// Read the blob saved under `name`.
  fn get(&self, name: &str) -> Result<Option<String>>;

  /// Replace the blob saved under `name`.
  fn set(&self, name: &str, value: &str) -> Result<()>;

  /// Delete the blob saved under `name`.
  fn remove(&self, name: &str) -> Result<()>;
}

/// Storage implementation that doesn't persist anything.
/// Used when persistence is disabled - all operations are no-ops.
pub struct NoopStorage;

impl KeyValueStorage for NoopStorage {
  fn get(&self, _name: &str) -> Result<Option<String>> {
    Ok(None) // Always miss
  }

  fn set(&self, _name: &str, _value: &str) -> Result<()> {
    Ok(()) // Discard
  }

  fn remove(&self, _name: &str) -> Result<()> {
    Ok(())
  }
}

/// SQLite-based storage implementation.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Open (or create) the database at `path`, or at the default location.
  pub fn open(path: Option<&Path>) -> Result<Self> {
    let path = match path {
      Some(p) => p.to_path_buf(),
      None => Self::default_path()?,
    };

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create store directory: {}", e))?;
    }

    let conn = Connection::open(&path)
      .map_err(|e| eyre!("Failed to open store database at {}: {}", path.display(), e))?;

    Self::with_connection(conn)
  }

  #[cfg(test)]
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory database: {}", e))?;
    Self::with_connection(conn)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;
    Ok(storage)
  }

  /// Get the default database path.
  fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("sitedash").join("store.db"))
  }

  fn run_migrations(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute_batch(STORE_SCHEMA)
      .map_err(|e| eyre!("Failed to run store migrations: {}", e))?;

    Ok(())
  }
}

const STORE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS store_blobs (
    name TEXT PRIMARY KEY,
    data TEXT NOT NULL,
    saved_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

impl KeyValueStorage for SqliteStorage {
  fn get(&self, name: &str) -> Result<Option<String>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .query_row(
        "SELECT data FROM store_blobs WHERE name = ?",
        params![name],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read {}: {}", name, e))
  }

  fn set(&self, name: &str, value: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO store_blobs (name, data, saved_at)
         VALUES (?, ?, datetime('now'))",
        params![name, value],
      )
      .map_err(|e| eyre!("Failed to write {}: {}", name, e))?;

    Ok(())
  }

  fn remove(&self, name: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute("DELETE FROM store_blobs WHERE name = ?", params![name])
      .map_err(|e| eyre!("Failed to remove {}: {}", name, e))?;

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_sqlite_roundtrip_and_remove() {
    let storage = SqliteStorage::open_in_memory().unwrap();
    assert_eq!(storage.get("projects-storage").unwrap(), None);

    storage.set("projects-storage", "[]").unwrap();
    storage.set("projects-storage", r#"[{"id":"p1"}]"#).unwrap();
    assert_eq!(
      storage.get("projects-storage").unwrap().as_deref(),
      Some(r#"[{"id":"p1"}]"#)
    );

    storage.remove("projects-storage").unwrap();
    assert_eq!(storage.get("projects-storage").unwrap(), None);
  }

  #[test]
  fn test_sqlite_file_survives_reopen() {
    let dir = std::env::temp_dir().join(format!("sitedash-test-{}", std::process::id()));
    let path = dir.join("store.db");

    {
      let storage = SqliteStorage::open(Some(&path)).unwrap();
      storage.set("auth-session", r#"{"token":"t"}"#).unwrap();
    }

    let reopened = SqliteStorage::open(Some(&path)).unwrap();
    assert_eq!(
      reopened.get("auth-session").unwrap().as_deref(),
      Some(r#"{"token":"t"}"#)
    );

    let _ = std::fs::remove_dir_all(&dir);
  }

  #[test]
  fn test_noop_storage_forgets() {
    let storage = NoopStorage;
    storage.set("tasks-storage", "[]").unwrap();
    assert_eq!(storage.get("tasks-storage").unwrap(), None);
  }
}
