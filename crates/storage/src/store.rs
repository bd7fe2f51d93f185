use std::path::Path;
use std::sync::Arc;

use crate::api::{StoreEngine, WriteBatch};
use crate::durable::LogStore;
use crate::error::StoreError;
use crate::memory::InMemoryStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineType {
    InMemory,
    AppendLog,
}

/// Cheaply clonable handle over a store engine. Every component writes
/// through this handle; nothing touches the engine directly.
#[derive(Clone)]
pub struct Store {
    engine: Arc<dyn StoreEngine>,
}

impl Store {
    pub fn new(path: impl AsRef<Path>, engine_type: EngineType) -> Result<Self, StoreError> {
        let engine: Arc<dyn StoreEngine> = match engine_type {
            EngineType::InMemory => Arc::new(InMemoryStore::new()),
            EngineType::AppendLog => Arc::new(LogStore::open(path)?),
        };
        Ok(Self { engine })
    }

    pub fn in_memory() -> Self {
        Self {
            engine: Arc::new(InMemoryStore::new()),
        }
    }

    pub fn put(&self, key: Vec<u8>, value: Vec<u8>) -> Result<(), StoreError> {
        self.engine.put(key, value)
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        self.engine.get(key)
    }

    pub fn delete(&self, key: &[u8]) -> Result<(), StoreError> {
        self.engine.delete(key)
    }

    pub fn exists(&self, key: &[u8]) -> Result<bool, StoreError> {
        self.engine.exists(key)
    }

    pub fn write_batch(&self, batch: WriteBatch) -> Result<(), StoreError> {
        self.engine.write_batch(batch)
    }

    pub fn iter_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        self.engine.iter_prefix(prefix)
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store").finish_non_exhaustive()
    }
}
