//! In-memory store for tests and ephemeral runs.

use std::sync::{Mutex, MutexGuard, PoisonError};

use serde_json::{Map, Value};

use frpdesk_core::ports::{KvStore, StoreError};

/// [`KvStore`] over a plain in-memory map. Contents vanish on drop.
#[derive(Default)]
pub struct MemoryStore {
    cache: Mutex<Map<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_cache(&self) -> MutexGuard<'_, Map<String, Value>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(self.lock_cache().get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        self.lock_cache().insert(key.to_string(), value);
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.lock_cache().remove(key).is_some())
    }

    fn has(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.lock_cache().contains_key(key))
    }
}
