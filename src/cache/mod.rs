//! Client-side state: durable storage, per-entity stores and the query cache.
//!
//! - `Store<E>` keeps the last known collection of one entity, persisted
//! - `QueryCache<V>` deduplicates in-flight reads per key and tracks freshness
//! - `KeyValueStorage` is the durable blob backend both rely on

mod query;
mod storage;
mod store;
mod traits;

pub use query::{QueryCache, QueryKey, QueryResult};
pub use storage::{KeyValueStorage, NoopStorage, SqliteStorage};
pub use store::{Items, Store};
pub use traits::Entity;
