//! Keyed query cache with in-flight deduplication.
//!
//! Every read goes through a `QueryKey`. While a fetch for a key is pending,
//! further readers join it instead of issuing a second request. Settled
//! results stay fresh for `stale_time` unless the key is invalidated.
//!
//! Only the most recently started fetch for a key may settle. A fetch that was
//! superseded by `refetch` is dropped on arrival, so results never land out of
//! order. Invalidation only marks an entry stale; a fetch already in flight
//! still settles normally.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::api::ApiError;

type SharedFetch<V> = Shared<BoxFuture<'static, Result<V, ApiError>>>;

/// Cache key for one resource read.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
  /// Full collection of a resource
  List { resource: String },
  /// One record of a resource
  Detail { resource: String, id: String },
}

impl QueryKey {
  pub fn list(resource: &str) -> Self {
    Self::List {
      resource: resource.to_string(),
    }
  }

  pub fn detail(resource: &str, id: &str) -> Self {
    Self::Detail {
      resource: resource.to_string(),
      id: id.to_string(),
    }
  }

  pub fn description(&self) -> String {
    match self {
      Self::List { resource } => format!("{} list", resource),
      Self::Detail { resource, id } => format!("{} {}", resource, id),
    }
  }
}

impl fmt::Display for QueryKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.description())
  }
}

/// Transient view of one key's request state.
#[derive(Debug, Clone)]
pub struct QueryResult<V> {
  /// Last successfully fetched value, kept visible after later failures
  pub data: Option<V>,
  pub is_loading: bool,
  pub is_error: bool,
  pub error: Option<ApiError>,
}

impl<V> QueryResult<V> {
  /// Nothing requested yet.
  pub fn idle() -> Self {
    Self {
      data: None,
      is_loading: false,
      is_error: false,
      error: None,
    }
  }

  pub fn is_success(&self) -> bool {
    self.data.is_some() && !self.is_error
  }
}

struct InFlight<V> {
  seq: u64,
  generation: u64,
  future: SharedFetch<V>,
}

struct Entry<V> {
  data: Option<V>,
  error: Option<ApiError>,
  fetched_at: Option<Instant>,
  /// Generation the current data was requested under
  fetched_generation: u64,
  /// Bumped by every invalidation
  generation: u64,
  last_seq: u64,
  in_flight: Option<InFlight<V>>,
}

impl<V: Clone> Entry<V> {
  fn new() -> Self {
    Self {
      data: None,
      error: None,
      fetched_at: None,
      fetched_generation: 0,
      generation: 0,
      last_seq: 0,
      in_flight: None,
    }
  }

  fn is_fresh(&self, stale_time: Duration) -> bool {
    self.data.is_some()
      && self.error.is_none()
      && self.fetched_generation == self.generation
      && self
        .fetched_at
        .is_some_and(|t| t.elapsed() <= stale_time)
  }

  fn result(&self) -> QueryResult<V> {
    QueryResult {
      data: self.data.clone(),
      is_loading: self.in_flight.is_some(),
      is_error: self.error.is_some(),
      error: self.error.clone(),
    }
  }
}

pub struct QueryCache<V> {
  entries: Mutex<HashMap<QueryKey, Entry<V>>>,
  /// How long before settled data is considered stale
  stale_time: Duration,
}

impl<V: Clone + Send + Sync + 'static> QueryCache<V> {
  pub fn new(stale_time: Duration) -> Self {
    Self {
      entries: Mutex::new(HashMap::new()),
      stale_time,
    }
  }

  /// Read `key`, joining a pending fetch or serving fresh data when possible.
  ///
  /// `on_success` runs exactly once per fetch that settles successfully, while
  /// the cache lock is held; it must not call back into this cache.
  pub async fn fetch<F, Fut, S>(&self, key: &QueryKey, fetcher: F, on_success: S) -> QueryResult<V>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<V, ApiError>> + Send + 'static,
    S: FnOnce(&V),
  {
    self.run(key, false, fetcher, on_success).await
  }

  /// Start a new fetch for `key` even if one is pending or data is fresh.
  /// The pending fetch, if any, is superseded.
  pub async fn refetch<F, Fut, S>(
    &self,
    key: &QueryKey,
    fetcher: F,
    on_success: S,
  ) -> QueryResult<V>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<V, ApiError>> + Send + 'static,
    S: FnOnce(&V),
  {
    self.run(key, true, fetcher, on_success).await
  }

  /// Mark `key` stale so the next read goes to the network.
  pub fn invalidate(&self, key: &QueryKey) {
    if let Some(entry) = self.lock().get_mut(key) {
      entry.generation += 1;
      debug!(query = %key, "invalidated");
    }
  }

  /// Current state of `key` without triggering a fetch.
  pub fn snapshot(&self, key: &QueryKey) -> QueryResult<V> {
    self
      .lock()
      .get(key)
      .map(Entry::result)
      .unwrap_or_else(QueryResult::idle)
  }

  async fn run<F, Fut, S>(
    &self,
    key: &QueryKey,
    force: bool,
    fetcher: F,
    on_success: S,
  ) -> QueryResult<V>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<V, ApiError>> + Send + 'static,
    S: FnOnce(&V),
  {
    let (seq, future) = {
      let mut entries = self.lock();
      let entry = entries.entry(key.clone()).or_insert_with(Entry::new);

      match &entry.in_flight {
        Some(flight) if !force => {
          debug!(query = %key, "joining in-flight request");
          (flight.seq, flight.future.clone())
        }
        _ => {
          if !force && entry.is_fresh(self.stale_time) {
            debug!(query = %key, "cache hit");
            return entry.result();
          }

          entry.last_seq += 1;
          let seq = entry.last_seq;
          let future = fetcher().boxed().shared();
          entry.in_flight = Some(InFlight {
            seq,
            generation: entry.generation,
            future: future.clone(),
          });
          debug!(query = %key, seq, "fetch started");
          (seq, future)
        }
      }
    };

    let outcome = future.await;

    let mut entries = self.lock();
    let entry = entries.entry(key.clone()).or_insert_with(Entry::new);

    match entry.in_flight.take() {
      Some(flight) if flight.seq == seq => match outcome {
        Ok(data) => {
          entry.fetched_at = Some(Instant::now());
          entry.fetched_generation = flight.generation;
          entry.error = None;
          on_success(&data);
          entry.data = Some(data);
        }
        Err(e) => {
          debug!(query = %key, "fetch failed: {}", e);
          entry.error = Some(e);
        }
      },
      other => {
        // Superseded by a newer fetch, or already settled by another reader.
        if seq < entry.last_seq {
          debug!(query = %key, seq, "discarding superseded result");
        }
        entry.in_flight = other;
      }
    }

    entry.result()
  }

  fn lock(&self) -> MutexGuard<'_, HashMap<QueryKey, Entry<V>>> {
    self.entries.lock().unwrap_or_else(|e| e.into_inner())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Arc;

  fn counted(
    counter: &Arc<AtomicUsize>,
    delay_ms: u64,
    value: u32,
  ) -> impl FnOnce() -> BoxFuture<'static, Result<u32, ApiError>> {
    let counter = counter.clone();
    move || {
      counter.fetch_add(1, Ordering::SeqCst);
      async move {
        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
        Ok(value)
      }
      .boxed()
    }
  }

  #[tokio::test]
  async fn test_concurrent_readers_share_one_fetch() {
    let cache = QueryCache::new(Duration::from_secs(60));
    let key = QueryKey::list("projects");
    let counter = Arc::new(AtomicUsize::new(0));

    let (a, b) = tokio::join!(
      cache.fetch(&key, counted(&counter, 30, 7), |_| {}),
      cache.fetch(&key, counted(&counter, 30, 8), |_| {}),
    );

    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert_eq!(a.data, Some(7));
    assert_eq!(b.data, Some(7));
  }

  #[tokio::test]
  async fn test_fresh_data_is_served_from_cache() {
    let cache = QueryCache::new(Duration::from_secs(60));
    let key = QueryKey::list("tasks");
    let counter = Arc::new(AtomicUsize::new(0));

    cache.fetch(&key, counted(&counter, 0, 1), |_| {}).await;
    let second = cache.fetch(&key, counted(&counter, 0, 2), |_| {}).await;

    assert_eq!(counter.load(Ordering::SeqCst), 1);
    assert_eq!(second.data, Some(1));
  }

  #[tokio::test]
  async fn test_invalidate_forces_next_read() {
    let cache = QueryCache::new(Duration::from_secs(60));
    let key = QueryKey::list("tasks");
    let counter = Arc::new(AtomicUsize::new(0));

    cache.fetch(&key, counted(&counter, 0, 1), |_| {}).await;
    cache.invalidate(&key);
    let second = cache.fetch(&key, counted(&counter, 0, 2), |_| {}).await;

    assert_eq!(counter.load(Ordering::SeqCst), 2);
    assert_eq!(second.data, Some(2));
  }

  #[tokio::test]
  async fn test_superseded_fetch_never_settles() {
    let cache = QueryCache::new(Duration::from_secs(60));
    let key = QueryKey::list("materials");
    let counter = Arc::new(AtomicUsize::new(0));
    let settled = Mutex::new(Vec::new());

    let record = |v: &u32| settled.lock().unwrap().push(*v);

    let (slow, fast) = tokio::join!(
      cache.fetch(&key, counted(&counter, 60, 1), record),
      async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        cache.refetch(&key, counted(&counter, 0, 2), record).await
      },
    );

    assert_eq!(fast.data, Some(2));
    assert_eq!(slow.data, Some(2));
    assert_eq!(*settled.lock().unwrap(), vec![2]);
    assert!(!cache.snapshot(&key).is_loading);
  }

  #[tokio::test]
  async fn test_failure_keeps_previous_data() {
    let cache = QueryCache::new(Duration::ZERO);
    let key = QueryKey::list("warehouses");

    cache.fetch(&key, || async { Ok(5u32) }, |_| {}).await;
    let failed = cache
      .fetch(
        &key,
        || async { Err(ApiError::Transport("connection refused".to_string())) },
        |_| {},
      )
      .await;

    assert!(failed.is_error);
    assert_eq!(failed.data, Some(5));
    assert!(!failed.is_success());
  }

  #[tokio::test]
  async fn test_invalidate_does_not_cancel_in_flight() {
    let cache = QueryCache::new(Duration::from_secs(60));
    let key = QueryKey::list("projects");
    let counter = Arc::new(AtomicUsize::new(0));

    let (result, _) = tokio::join!(
      cache.fetch(&key, counted(&counter, 30, 3), |_| {}),
      async {
        tokio::time::sleep(Duration::from_millis(5)).await;
        cache.invalidate(&key);
      },
    );

    // The result still lands, but is already stale.
    assert_eq!(result.data, Some(3));
    cache.fetch(&key, counted(&counter, 0, 4), |_| {}).await;
    assert_eq!(counter.load(Ordering::SeqCst), 2);
  }

  #[test]
  fn test_snapshot_of_unknown_key_is_idle() {
    let cache: QueryCache<u32> = QueryCache::new(Duration::from_secs(1));
    let snapshot = cache.snapshot(&QueryKey::detail("projects", "p1"));
    assert!(snapshot.data.is_none());
    assert!(!snapshot.is_loading);
    assert!(!snapshot.is_error);
  }
}
