use crate::error::StoreError;

/// A set of writes applied atomically with respect to other callers.
#[derive(Debug, Default, Clone)]
pub struct WriteBatch {
    pub puts: Vec<(Vec<u8>, Vec<u8>)>,
    pub deletes: Vec<Vec<u8>>,
}

impl WriteBatch {
    pub fn put(&mut self, key: Vec<u8>, value: Vec<u8>) {
        self.puts.push((key, value));
    }

    pub fn delete(&mut self, key: Vec<u8>) {
        self.deletes.push(key);
    }

    pub fn is_empty(&self) -> bool {
        self.puts.is_empty() && self.deletes.is_empty()
    }
}

/// Ordered byte-key map. Engines are not transactional; transactionality
/// lives in the layers above.
pub trait StoreEngine: Send + Sync {
    fn put(&self, key: Vec<u8>, value: Vec<u8>) -> Result<(), StoreError>;
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError>;
    fn delete(&self, key: &[u8]) -> Result<(), StoreError>;
    fn exists(&self, key: &[u8]) -> Result<bool, StoreError>;
    fn write_batch(&self, batch: WriteBatch) -> Result<(), StoreError>;
    /// Entries whose key starts with `prefix`, in ascending key order.
    fn iter_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, StoreError>;
}
