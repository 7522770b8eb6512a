//! Ordered key-value storage for audiomatch collections.
//!
//! Keys are UTF-8 strings compared byte-wise; every implementation returns
//! scan results in ascending key order so callers can encode ordering
//! (record ids, namespaces) directly into keys.
//!
//! Two implementations are provided: [`MemoryStore`] for tests and
//! ephemeral engines, and [`RedbStore`] for durable on-disk storage.

pub mod memory;
pub mod redb;

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// Errors that can occur in KV store operations.
#[derive(Error, Debug)]
pub enum KVError {
    #[error("kv: storage error: {0}")]
    Storage(String),

    #[error("kv: store is closed")]
    Closed,
}

/// Result type for KV operations.
pub type KVResult<T> = Result<T, KVError>;

/// Ordered key-value store.
///
/// Implementations must be safe for concurrent use. Batch operations are
/// atomic: either every entry is applied or none is.
pub trait KVStore: Send + Sync {
    /// Get a value by key.
    fn get(&self, key: &str) -> KVResult<Option<Vec<u8>>>;

    /// Set a key-value pair.
    fn set(&self, key: &str, value: &[u8]) -> KVResult<()>;

    /// Delete a key. Deleting a missing key is not an error.
    fn delete(&self, key: &str) -> KVResult<()>;

    /// Return all entries whose key starts with `prefix`, ascending by key.
    fn scan(&self, prefix: &str) -> KVResult<Vec<(String, Vec<u8>)>>;

    /// Atomically set multiple key-value pairs.
    fn batch_set(&self, entries: &[(&str, &[u8])]) -> KVResult<()>;

    /// Atomically delete multiple keys.
    fn batch_delete(&self, keys: &[&str]) -> KVResult<()>;

    /// Return true if `key` is present.
    fn contains(&self, key: &str) -> KVResult<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Delete every key starting with `prefix` and return how many were
    /// removed.
    fn delete_prefix(&self, prefix: &str) -> KVResult<usize> {
        let entries = self.scan(prefix)?;
        let keys: Vec<&str> = entries.iter().map(|(k, _)| k.as_str()).collect();
        self.batch_delete(&keys)?;
        Ok(keys.len())
    }
}

impl fmt::Debug for dyn KVStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KVStore {{ ... }}")
    }
}

/// A KV store shared between the catalog and its collections.
pub type SharedKVStore = Arc<dyn KVStore>;

pub use memory::MemoryStore;
pub use redb::RedbStore;
