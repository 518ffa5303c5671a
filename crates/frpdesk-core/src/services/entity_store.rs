//! Typed collection access over the key/value store.

use std::marker::PhantomData;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::domain::{Definition, EntityId};
use crate::ports::{KvStore, StoreError};

/// Whole-collection, read-modify-write persistence for one entity kind.
///
/// The backing store holds one JSON array per kind. Every mutation loads
/// the array, applies the change, and writes the array back. Collections
/// are human-curated and small, so this stays simple rather than clever.
///
/// Mutations are serialized through an internal lock shared by clones, so
/// concurrent updates (a stop sweep, the event watcher) never lose each
/// other's writes.
pub struct EntityStore<D> {
    kv: Arc<dyn KvStore>,
    write_lock: Arc<Mutex<()>>,
    _kind: PhantomData<fn() -> D>,
}

impl<D> Clone for EntityStore<D> {
    fn clone(&self) -> Self {
        Self {
            kv: Arc::clone(&self.kv),
            write_lock: Arc::clone(&self.write_lock),
            _kind: PhantomData,
        }
    }
}

impl<D: Definition> EntityStore<D> {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self {
            kv,
            write_lock: Arc::new(Mutex::new(())),
            _kind: PhantomData,
        }
    }

    fn lock_writes(&self) -> MutexGuard<'_, ()> {
        self.write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn key() -> &'static str {
        D::KIND.store_key()
    }

    /// All definitions of this kind; a missing key is an empty collection.
    pub fn list(&self) -> Result<Vec<D>, StoreError> {
        match self.kv.get(Self::key())? {
            Some(value) => serde_json::from_value(value)
                .map_err(|e| StoreError::Serialization(e.to_string())),
            None => Ok(Vec::new()),
        }
    }

    pub fn save_all(&self, items: &[D]) -> Result<(), StoreError> {
        let value =
            serde_json::to_value(items).map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.kv.set(Self::key(), value)
    }

    pub fn find(&self, id: EntityId) -> Result<Option<D>, StoreError> {
        Ok(self.list()?.into_iter().find(|d| d.id() == id))
    }

    /// Append a freshly built definition.
    pub fn insert(&self, item: D) -> Result<(), StoreError> {
        let _guard = self.lock_writes();
        let mut items = self.list()?;
        items.push(item);
        self.save_all(&items)
    }

    /// Replace the definition with the same id. Returns whether it was
    /// present.
    pub fn replace(&self, item: D) -> Result<bool, StoreError> {
        let _guard = self.lock_writes();
        let mut items = self.list()?;
        let Some(slot) = items.iter_mut().find(|d| d.id() == item.id()) else {
            return Ok(false);
        };
        *slot = item;
        self.save_all(&items)?;
        Ok(true)
    }

    /// Load, mutate, and persist the definition with `id`. Returns the
    /// updated definition, or `None` when absent.
    pub fn update_with(
        &self,
        id: EntityId,
        f: impl FnOnce(&mut D),
    ) -> Result<Option<D>, StoreError> {
        let _guard = self.lock_writes();
        let mut items = self.list()?;
        let Some(slot) = items.iter_mut().find(|d| d.id() == id) else {
            return Ok(None);
        };
        f(slot);
        let updated = slot.clone();
        self.save_all(&items)?;
        Ok(Some(updated))
    }

    /// Remove the definition with `id`. Returns whether it was present.
    pub fn remove(&self, id: EntityId) -> Result<bool, StoreError> {
        let _guard = self.lock_writes();
        let mut items = self.list()?;
        let before = items.len();
        items.retain(|d| d.id() != id);
        if items.len() == before {
            return Ok(false);
        }
        self.save_all(&items)?;
        Ok(true)
    }

    /// Next free id: `max + 1`, or 1 for an empty collection.
    pub fn next_id(&self) -> Result<EntityId, StoreError> {
        let items = self.list()?;
        Ok(items
            .iter()
            .map(Definition::id)
            .max()
            .map_or(1, |max| max + 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TunnelDefinition;
    use crate::test_support::{MemKv, tunnel_draft};
    use chrono::Utc;

    fn store() -> EntityStore<TunnelDefinition> {
        EntityStore::new(Arc::new(MemKv::default()))
    }

    fn tunnel(id: EntityId, name: &str) -> TunnelDefinition {
        TunnelDefinition::from_draft(id, tunnel_draft(name), Utc::now()).unwrap()
    }

    #[test]
    fn missing_key_reads_as_empty() {
        let store = store();
        assert!(store.list().unwrap().is_empty());
        assert_eq!(store.next_id().unwrap(), 1);
    }

    #[test]
    fn ids_grow_from_the_maximum() {
        let store = store();
        store.insert(tunnel(1, "a")).unwrap();
        store.insert(tunnel(5, "b")).unwrap();
        assert_eq!(store.next_id().unwrap(), 6);
    }

    #[test]
    fn insert_find_remove_round_trip() {
        let store = store();
        store.insert(tunnel(1, "a")).unwrap();
        store.insert(tunnel(2, "b")).unwrap();
        assert_eq!(store.find(2).unwrap().unwrap().name, "b");
        assert!(store.remove(1).unwrap());
        assert!(!store.remove(1).unwrap());
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn update_with_persists_the_mutation() {
        let store = store();
        store.insert(tunnel(1, "a")).unwrap();
        let updated = store
            .update_with(1, |t| t.name = "renamed".to_string())
            .unwrap()
            .unwrap();
        assert_eq!(updated.name, "renamed");
        assert_eq!(store.find(1).unwrap().unwrap().name, "renamed");
        assert!(store.update_with(99, |_| {}).unwrap().is_none());
    }

    #[test]
    fn replace_reports_presence() {
        let store = store();
        store.insert(tunnel(1, "a")).unwrap();
        assert!(store.replace(tunnel(1, "swapped")).unwrap());
        assert!(!store.replace(tunnel(9, "ghost")).unwrap());
        assert_eq!(store.find(1).unwrap().unwrap().name, "swapped");
    }
}
