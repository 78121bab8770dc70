//! Persisted, observable per-entity store.
//!
//! A `Store<E>` holds the last known collection of one entity type plus an
//! optional selected record. Reads are synchronous snapshots; every mutation
//! rewrites the whole collection to durable storage before returning.
//! Stores never talk to the network.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;
use tracing::warn;

use super::storage::KeyValueStorage;
use super::traits::Entity;

/// Snapshot of a store's collection. Unchanged entries keep their `Arc`
/// across mutations.
pub type Items<E> = Arc<Vec<Arc<E>>>;

struct State<E> {
  items: Items<E>,
  selected: Option<Arc<E>>,
}

#[derive(Serialize)]
struct SavedRef<'a, E> {
  items: Vec<&'a E>,
  selected: Option<&'a E>,
}

#[derive(Deserialize)]
struct Saved<E> {
  items: Vec<E>,
  selected: Option<E>,
}

pub struct Store<E: Entity> {
  name: String,
  storage: Arc<dyn KeyValueStorage>,
  state: Mutex<State<E>>,
  changes: watch::Sender<Items<E>>,
}

impl<E: Entity> Store<E> {
  /// Create the store and rehydrate it from the blob saved under `name`.
  ///
  /// An unreadable blob is logged and the store starts empty.
  pub fn load(name: impl Into<String>, storage: Arc<dyn KeyValueStorage>) -> Self {
    let name = name.into();

    let saved = match storage.get(&name) {
      Ok(Some(blob)) => match serde_json::from_str::<Saved<E>>(&blob) {
        Ok(saved) => Some(saved),
        Err(e) => {
          warn!(store = %name, "discarding unreadable snapshot: {}", e);
          None
        }
      },
      Ok(None) => None,
      Err(e) => {
        warn!(store = %name, "failed to read snapshot: {}", e);
        None
      }
    };

    let (items, selected) = match saved {
      Some(saved) => (dedup(saved.items), saved.selected.map(Arc::new)),
      None => (Vec::new(), None),
    };

    let items = Arc::new(items);
    let (changes, _) = watch::channel(items.clone());

    Self {
      name,
      storage,
      state: Mutex::new(State { items, selected }),
      changes,
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  /// Current collection snapshot.
  pub fn items(&self) -> Items<E> {
    self.lock().items.clone()
  }

  pub fn len(&self) -> usize {
    self.lock().items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn get(&self, id: &str) -> Option<Arc<E>> {
    self.lock().items.iter().find(|e| e.id() == id).cloned()
  }

  pub fn selected(&self) -> Option<Arc<E>> {
    self.lock().selected.clone()
  }

  /// Receiver that sees every new collection snapshot.
  pub fn subscribe(&self) -> watch::Receiver<Items<E>> {
    self.changes.subscribe()
  }

  /// Replace the whole collection. Duplicate ids collapse, last one wins.
  pub fn set_all(&self, items: Vec<E>) {
    self.mutate(|state| {
      state.items = Arc::new(dedup(items));
      true
    });
  }

  /// Append a record; a record with the same id is replaced in place.
  pub fn add(&self, item: E) {
    self.mutate(|state| {
      let mut items = (*state.items).clone();
      match items.iter().position(|e| e.id() == item.id()) {
        Some(index) => items[index] = Arc::new(item),
        None => items.push(Arc::new(item)),
      }
      state.items = Arc::new(items);
      true
    });
  }

  /// Replace the record with the same id. Unknown ids are ignored so late or
  /// duplicate updates are harmless.
  pub fn update(&self, item: E) {
    self.mutate(|state| {
      let Some(index) = state.items.iter().position(|e| e.id() == item.id()) else {
        return false;
      };

      let item = Arc::new(item);
      if state.selected.as_ref().is_some_and(|s| s.id() == item.id()) {
        state.selected = Some(item.clone());
      }

      let mut items = (*state.items).clone();
      items[index] = item;
      state.items = Arc::new(items);
      true
    });
  }

  pub fn remove(&self, id: &str) {
    self.mutate(|state| {
      let was_selected = state.selected.as_ref().is_some_and(|s| s.id() == id);
      if was_selected {
        state.selected = None;
      }

      if !state.items.iter().any(|e| e.id() == id) {
        return was_selected;
      }

      let items: Vec<Arc<E>> = state
        .items
        .iter()
        .filter(|e| e.id() != id)
        .cloned()
        .collect();
      state.items = Arc::new(items);
      true
    });
  }

  /// Set the selected record (filled by detail fetches).
  pub fn select(&self, item: E) {
    self.mutate(|state| {
      state.selected = Some(Arc::new(item));
      true
    });
  }

  fn lock(&self) -> MutexGuard<'_, State<E>> {
    // A panic elsewhere must not make the store unusable.
    self.state.lock().unwrap_or_else(|e| e.into_inner())
  }

  /// Apply `f`; when it reports a change, persist and notify subscribers.
  fn mutate(&self, f: impl FnOnce(&mut State<E>) -> bool) {
    let mut state = self.lock();
    if !f(&mut state) {
      return;
    }

    self.persist(&state);
    self.changes.send_replace(state.items.clone());
  }

  fn persist(&self, state: &State<E>) {
    let saved = SavedRef {
      items: state.items.iter().map(|e| e.as_ref()).collect(),
      selected: state.selected.as_deref(),
    };

    let result = serde_json::to_string(&saved)
      .map_err(|e| color_eyre::eyre::eyre!("Failed to serialize snapshot: {}", e))
      .and_then(|blob| self.storage.set(&self.name, &blob));

    if let Err(e) = result {
      warn!(store = %self.name, "failed to persist snapshot: {}", e);
    }
  }
}

/// Collapse duplicate ids keeping the position of the first occurrence and the
/// value of the last.
fn dedup<E: Entity>(items: Vec<E>) -> Vec<Arc<E>> {
  let mut index: HashMap<String, usize> = HashMap::with_capacity(items.len());
  let mut out: Vec<Arc<E>> = Vec::with_capacity(items.len());

  for item in items {
    match index.get(item.id()) {
      Some(&i) => out[i] = Arc::new(item),
      None => {
        index.insert(item.id().to_string(), out.len());
        out.push(Arc::new(item));
      }
    }
  }

  out
}
