//! Key/value persistence port.

use serde_json::Value;
use thiserror::Error;

/// Persistence failures from a key/value store adapter.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing file exists but is not a JSON object.
    #[error("store is malformed: {0}")]
    Malformed(String),

    /// Reading or writing the backing storage failed.
    #[error("store I/O error: {0}")]
    Io(String),

    /// A stored value does not match the expected shape.
    #[error("store serialization error: {0}")]
    Serialization(String),
}

/// Flat key/value persistence for JSON documents.
///
/// Deliberately minimal: whole values in, whole values out. Entity
/// collections are stored as one array per key and rewritten
/// read-modify-write; there is no per-record access and no transactions.
pub trait KvStore: Send + Sync {
    /// The value under `key`, or `None` when absent.
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Replace the value under `key`.
    fn set(&self, key: &str, value: Value) -> Result<(), StoreError>;

    /// Remove `key`. Returns whether it existed.
    fn delete(&self, key: &str) -> Result<bool, StoreError>;

    /// Whether `key` is present.
    fn has(&self, key: &str) -> Result<bool, StoreError>;
}
