use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::api::{StoreEngine, WriteBatch};
use crate::error::StoreError;

/// In-memory engine; the default for tests and ephemeral nodes.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    inner: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(err: std::sync::PoisonError<T>) -> StoreError {
    StoreError::LockPoisoned(err.to_string())
}

impl StoreEngine for InMemoryStore {
    fn put(&self, key: Vec<u8>, value: Vec<u8>) -> Result<(), StoreError> {
        self.inner.write().map_err(poisoned)?.insert(key, value);
        Ok(())
    }

    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.inner.read().map_err(poisoned)?.get(key).cloned())
    }

    fn delete(&self, key: &[u8]) -> Result<(), StoreError> {
        self.inner.write().map_err(poisoned)?.remove(key);
        Ok(())
    }

    fn exists(&self, key: &[u8]) -> Result<bool, StoreError> {
        Ok(self.inner.read().map_err(poisoned)?.contains_key(key))
    }

    fn write_batch(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let mut inner = self.inner.write().map_err(poisoned)?;
        for (key, value) in batch.puts {
            inner.insert(key, value);
        }
        for key in batch.deletes {
            inner.remove(&key);
        }
        Ok(())
    }

    fn iter_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError> {
        let inner = self.inner.read().map_err(poisoned)?;
        Ok(inner
            .range(prefix.to_vec()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_get_delete() {
        let store = InMemoryStore::new();
        store.put(b"a".to_vec(), b"1".to_vec()).unwrap();
        assert_eq!(store.get(b"a").unwrap(), Some(b"1".to_vec()));
        assert!(store.exists(b"a").unwrap());
        store.delete(b"a").unwrap();
        assert_eq!(store.get(b"a").unwrap(), None);
        assert!(!store.exists(b"a").unwrap());
    }

    #[test]
    fn batch_applies_puts_then_deletes() {
        let store = InMemoryStore::new();
        store.put(b"gone".to_vec(), b"x".to_vec()).unwrap();
        let mut batch = WriteBatch::default();
        batch.put(b"a".to_vec(), b"1".to_vec());
        batch.put(b"b".to_vec(), b"2".to_vec());
        batch.delete(b"gone".to_vec());
        store.write_batch(batch).unwrap();
        assert_eq!(store.get(b"a").unwrap(), Some(b"1".to_vec()));
        assert_eq!(store.get(b"gone").unwrap(), None);
    }

    #[test]
    fn prefix_iteration_is_ordered_and_bounded() {
        let store = InMemoryStore::new();
        for key in [&b"ab"[..], b"aa", b"ac", b"b", b"a"] {
            store.put(key.to_vec(), key.to_vec()).unwrap();
        }
        let entries = store.iter_prefix(b"a").unwrap();
        let keys: Vec<_> = entries.iter().map(|(k, _)| k.clone()).collect();
        assert_eq!(
            keys,
            vec![b"a".to_vec(), b"aa".to_vec(), b"ab".to_vec(), b"ac".to_vec()]
        );
    }
}
