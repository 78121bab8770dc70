use color_eyre::{eyre::eyre, Result};
use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::resource::Resource;
use crate::api::ApiClient;
use crate::cache::{Entity, KeyValueStorage, Store};
use crate::domain::{Record, ResourceKind};
use crate::notice::Notifier;

/// Hands out one `Resource` (and therefore one store) per resource kind.
///
/// Built once in `main` and passed down; tests build their own so nothing is
/// shared between them.
pub struct Registry {
  client: ApiClient,
  storage: Arc<dyn KeyValueStorage>,
  notifier: Notifier,
  stale_time: Duration,
  resources: Mutex<HashMap<ResourceKind, Arc<dyn Any + Send + Sync>>>,
}

impl Registry {
  pub fn new(
    client: ApiClient,
    storage: Arc<dyn KeyValueStorage>,
    notifier: Notifier,
    stale_time: Duration,
  ) -> Self {
    Self {
      client,
      storage,
      notifier,
      stale_time,
      resources: Mutex::new(HashMap::new()),
    }
  }

  /// The resource for `kind`, created (and its store rehydrated) on first use.
  pub fn resource<E: Entity>(&self, kind: ResourceKind) -> Result<Arc<Resource<E>>> {
    let mut resources = self
      .resources
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    if let Some(existing) = resources.get(&kind) {
      return existing
        .clone()
        .downcast::<Resource<E>>()
        .map_err(|_| eyre!("{} is already registered with a different entity type", kind));
    }

    let store = Arc::new(Store::load(kind.store_name(), self.storage.clone()));
    let resource = Arc::new(Resource::new(
      kind,
      self.client.clone(),
      store,
      self.notifier.clone(),
      self.stale_time,
    ));
    resources.insert(kind, resource.clone());

    Ok(resource)
  }

  /// Untyped access, used by the CLI and browse view.
  pub fn records(&self, kind: ResourceKind) -> Result<Arc<Resource<Record>>> {
    self.resource(kind)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::auth::AuthHolder;
  use crate::api::transport::mock::MockTransport;
  use crate::cache::SqliteStorage;
  use crate::domain::User;
  use serde_json::json;

  fn registry(storage: Arc<dyn KeyValueStorage>) -> (Arc<MockTransport>, Registry) {
    let mock = MockTransport::new();
    let auth = AuthHolder::load(storage.clone());
    let client = ApiClient::new("http://mock.local", mock.clone(), auth).unwrap();
    let (notifier, _) = Notifier::channel();
    let registry = Registry::new(client, storage, notifier, Duration::from_secs(60));
    (mock, registry)
  }

  #[test]
  fn test_same_kind_same_instance() {
    let (_, registry) = registry(Arc::new(SqliteStorage::open_in_memory().unwrap()));

    let a = registry.records(ResourceKind::Projects).unwrap();
    let b = registry.records(ResourceKind::Projects).unwrap();
    let c = registry.records(ResourceKind::Tasks).unwrap();

    assert!(Arc::ptr_eq(&a, &b));
    assert!(!Arc::ptr_eq(a.store(), c.store()));
  }

  #[test]
  fn test_type_mismatch_is_an_error() {
    let (_, registry) = registry(Arc::new(SqliteStorage::open_in_memory().unwrap()));

    registry.records(ResourceKind::Users).unwrap();
    assert!(registry.resource::<User>(ResourceKind::Users).is_err());
  }

  #[tokio::test]
  async fn test_store_rehydrated_by_new_registry() {
    let storage: Arc<dyn KeyValueStorage> = Arc::new(SqliteStorage::open_in_memory().unwrap());

    let (mock, first) = registry(storage.clone());
    mock.respond(
      "GET",
      "/kpis",
      200,
      json!({"data": [{"id": "k1", "name": "Schedule variance"}]}),
    );
    first.records(ResourceKind::Kpis).unwrap().list().await;

    // Readers of the new registry see the snapshot before any network call.
    let (mock, second) = registry(storage);
    let kpis = second.records(ResourceKind::Kpis).unwrap();
    assert_eq!(kpis.store().len(), 1);
    assert!(mock.requests().is_empty());
  }
}
