use std::sync::Arc;
use tracing::debug;

use crate::cache::{Entity, Store};

/// One-way copy of settled query results into a store.
///
/// The query cache calls into the bridge once per successful fetch; the
/// store never calls back, so there is no feedback loop.
pub struct StoreBridge<E: Entity> {
  store: Arc<Store<E>>,
}

impl<E: Entity> StoreBridge<E> {
  pub fn new(store: Arc<Store<E>>) -> Self {
    Self { store }
  }

  pub fn store(&self) -> &Arc<Store<E>> {
    &self.store
  }

  pub fn push_list(&self, items: &[E]) {
    debug!(store = %self.store.name(), count = items.len(), "syncing list");
    self.store.set_all(items.to_vec());
  }

  pub fn push_detail(&self, item: &E) {
    debug!(store = %self.store.name(), id = %item.id(), "syncing detail");
    self.store.select(item.clone());
  }
}
