//! Generic per-entity resource: list/detail reads and create/update/delete,
//! each wired to the query cache and the entity's store.

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use super::bridge::StoreBridge;
use crate::api::{ApiClient, ApiError, Envelope};
use crate::cache::{Entity, QueryCache, QueryKey, QueryResult, Store};
use crate::domain::ResourceKind;
use crate::notice::Notifier;

pub struct Resource<E: Entity> {
  kind: ResourceKind,
  client: ApiClient,
  bridge: StoreBridge<E>,
  lists: QueryCache<Vec<E>>,
  details: QueryCache<E>,
  notifier: Notifier,
}

impl<E: Entity> Resource<E> {
  pub fn new(
    kind: ResourceKind,
    client: ApiClient,
    store: Arc<Store<E>>,
    notifier: Notifier,
    stale_time: Duration,
  ) -> Self {
    Self {
      kind,
      client,
      bridge: StoreBridge::new(store),
      lists: QueryCache::new(stale_time),
      details: QueryCache::new(stale_time),
      notifier,
    }
  }

  pub fn kind(&self) -> ResourceKind {
    self.kind
  }

  pub fn store(&self) -> &Arc<Store<E>> {
    self.bridge.store()
  }

  /// Read the collection. Successful fetches replace the store contents;
  /// failures keep the previous data visible with `is_error` set.
  pub async fn list(&self) -> QueryResult<Vec<E>> {
    let client = self.client.clone();
    let path = self.kind.path();

    self
      .lists
      .fetch(
        &self.list_key(),
        move || fetch_collection(client, path),
        |items| self.bridge.push_list(items),
      )
      .await
  }

  /// Like `list`, but always goes to the network.
  pub async fn refetch(&self) -> QueryResult<Vec<E>> {
    let client = self.client.clone();
    let path = self.kind.path();

    self
      .lists
      .refetch(
        &self.list_key(),
        move || fetch_collection(client, path),
        |items| self.bridge.push_list(items),
      )
      .await
  }

  /// Current list request state, without fetching.
  pub fn list_state(&self) -> QueryResult<Vec<E>> {
    self.lists.snapshot(&self.list_key())
  }

  /// Read one record. An empty id issues no request.
  ///
  /// Any failure yields `data: None`. A 404 is a soft miss and does not set
  /// `is_error`. No notices are emitted for reads.
  pub async fn get(&self, id: &str) -> QueryResult<E> {
    if id.is_empty() {
      return QueryResult::idle();
    }

    let path = match self.member_path(id) {
      Ok(path) => path,
      Err(e) => {
        return QueryResult {
          data: None,
          is_loading: false,
          is_error: true,
          error: Some(e),
        }
      }
    };
    let client = self.client.clone();

    let mut result = self
      .details
      .fetch(
        &self.detail_key(id),
        move || async move { client.get::<Envelope<E>>(&path).await?.into_data() },
        |item| self.bridge.push_detail(item),
      )
      .await;

    if result.is_error {
      result.data = None;
      if result.error.as_ref().is_some_and(ApiError::is_not_found) {
        result.is_error = false;
      }
    }

    result
  }

  pub async fn create<P: Serialize + ?Sized>(&self, payload: &P) -> Result<E, ApiError> {
    self.create_with(payload, |_| {}).await
  }

  /// Create a record. On success the list is invalidated, the server's copy
  /// is added to the store and `on_success` sees it.
  pub async fn create_with<P, F>(&self, payload: &P, on_success: F) -> Result<E, ApiError>
  where
    P: Serialize + ?Sized,
    F: FnOnce(&E),
  {
    let result = self
      .client
      .post::<_, Envelope<E>>(self.kind.path(), payload)
      .await
      .and_then(Envelope::into_data);

    match result {
      Ok(item) => {
        info!(resource = %self.kind, id = %item.id(), "created");
        self.lists.invalidate(&self.list_key());
        self.store().add(item.clone());
        self.notifier.success(format!("{} created", self.kind.label()));
        on_success(&item);
        Ok(item)
      }
      Err(e) => Err(self.mutation_failed("create", e)),
    }
  }

  pub async fn update<P: Serialize + ?Sized>(&self, id: &str, payload: &P) -> Result<E, ApiError> {
    let result = match self.member_path(id) {
      Ok(path) => self
        .client
        .put::<_, Envelope<E>>(&path, payload)
        .await
        .and_then(Envelope::into_data),
      Err(e) => Err(e),
    };

    match result {
      Ok(item) => {
        info!(resource = %self.kind, %id, "updated");
        self.lists.invalidate(&self.list_key());
        self.details.invalidate(&self.detail_key(id));
        self.store().update(item.clone());
        self.notifier.success(format!("{} updated", self.kind.label()));
        Ok(item)
      }
      Err(e) => Err(self.mutation_failed("update", e)),
    }
  }

  pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
    let result = match self.member_path(id) {
      Ok(path) => self
        .client
        .delete::<Envelope<Option<Value>>>(&path)
        .await
        .and_then(Envelope::into_data),
      Err(e) => Err(e),
    };

    match result {
      Ok(_) => {
        info!(resource = %self.kind, %id, "deleted");
        self.lists.invalidate(&self.list_key());
        self.details.invalidate(&self.detail_key(id));
        self.store().remove(id);
        self.notifier.success(format!("{} deleted", self.kind.label()));
        Ok(())
      }
      Err(e) => Err(self.mutation_failed("delete", e)),
    }
  }

  /// Report a failed mutation. The store is left untouched.
  fn mutation_failed(&self, action: &str, error: ApiError) -> ApiError {
    self.notifier.error(format!(
      "Failed to {} {}: {}",
      action,
      self.kind.label().to_lowercase(),
      error.user_message()
    ));
    error
  }

  fn list_key(&self) -> QueryKey {
    QueryKey::list(self.kind.name())
  }

  fn detail_key(&self, id: &str) -> QueryKey {
    QueryKey::detail(self.kind.name(), id)
  }

  /// `/{resource}/{id}` with the id encoded as exactly one path segment.
  fn member_path(&self, id: &str) -> Result<String, ApiError> {
    // URL parsing resolves these even when percent-encoded.
    if id == "." || id == ".." {
      return Err(ApiError::Invalid(format!("'{}' is not a valid id", id)));
    }
    Ok(format!("{}/{}", self.kind.path(), urlencoding::encode(id)))
  }
}

async fn fetch_collection<E: Entity>(client: ApiClient, path: &'static str) -> Result<Vec<E>, ApiError> {
  client.get::<Envelope<Vec<E>>>(path).await?.into_data()
}
