//! Local store seam
//!
//! The embedded local database belongs to the application; the sync engine
//! only needs upsert-by-id, delete, point lookup and per-kind listing.
//! `MemoryStore` is the in-process implementation used by the replay tool
//! and tests.

use bandsync_common::{Entity, EntityKind, Error, Result};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

/// Persistence for canonical entities, keyed by kind and id
pub trait LocalStore {
    /// Insert or replace the entity with the same kind and id
    fn upsert(&mut self, entity: Entity) -> Result<()>;

    /// Remove an entity; returns whether it existed
    fn delete(&mut self, kind: EntityKind, id: &str) -> Result<bool>;

    fn get(&self, kind: EntityKind, id: &str) -> Result<Option<Entity>>;

    /// All entities of a kind, ordered by id
    fn list(&self, kind: EntityKind) -> Result<Vec<Entity>>;

    /// Version of the stored copy, if any
    fn version_of(&self, kind: EntityKind, id: &str) -> Result<Option<i64>> {
        Ok(self.get(kind, id)?.map(|entity| entity.version()))
    }

    fn count(&self, kind: EntityKind) -> Result<usize> {
        Ok(self.list(kind)?.len())
    }
}

/// `BTreeMap`-backed store
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entities: BTreeMap<(EntityKind, String), Entity>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl LocalStore for MemoryStore {
    fn upsert(&mut self, entity: Entity) -> Result<()> {
        if entity.id().is_empty() {
            return Err(Error::InvalidInput(format!(
                "cannot store {} without an id",
                entity.kind()
            )));
        }
        self.entities
            .insert((entity.kind(), entity.id().to_string()), entity);
        Ok(())
    }

    fn delete(&mut self, kind: EntityKind, id: &str) -> Result<bool> {
        Ok(self.entities.remove(&(kind, id.to_string())).is_some())
    }

    fn get(&self, kind: EntityKind, id: &str) -> Result<Option<Entity>> {
        Ok(self.entities.get(&(kind, id.to_string())).cloned())
    }

    fn list(&self, kind: EntityKind) -> Result<Vec<Entity>> {
        Ok(self
            .entities
            .range((kind, String::new())..)
            .take_while(|((k, _), _)| *k == kind)
            .map(|(_, entity)| entity.clone())
            .collect())
    }
}

/// Shared store handle, so a refresh callback can read what replay writes
impl<S: LocalStore> LocalStore for Arc<Mutex<S>> {
    fn upsert(&mut self, entity: Entity) -> Result<()> {
        self.lock().map_err(poisoned)?.upsert(entity)
    }

    fn delete(&mut self, kind: EntityKind, id: &str) -> Result<bool> {
        self.lock().map_err(poisoned)?.delete(kind, id)
    }

    fn get(&self, kind: EntityKind, id: &str) -> Result<Option<Entity>> {
        self.lock().map_err(poisoned)?.get(kind, id)
    }

    fn list(&self, kind: EntityKind) -> Result<Vec<Entity>> {
        self.lock().map_err(poisoned)?.list(kind)
    }
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> Error {
    Error::Store("store lock poisoned".to_string())
}
