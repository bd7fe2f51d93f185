//! Flat-authenticated key-value trie.
//!
//! Values live in the store under `0x01 || H(key)`. The root is the Merkle
//! root over `H(hashed_key || value)` of every live leaf, taken in hashed-key
//! order, so it commits to the full key-value set. Writes are buffered and
//! land in one batch at `commit`.

use std::collections::BTreeMap;

use tessera_common::H256;
use tessera_crypto::hash::{hash_bytes, hash_concat, Hash256, ZERO_HASH};
use tessera_crypto::merkle::{merkle_proof, merkle_root, verify_merkle_proof};

use crate::api::WriteBatch;
use crate::error::StoreError;
use crate::keys::{trie_leaf_key, trie_root_key, TRIE_LEAF_PREFIX};
use crate::store::Store;

/// Sibling path proving one key-value pair against the trie root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrieProof {
    pub leaf_index: u64,
    pub siblings: Vec<Hash256>,
}

pub struct Trie {
    store: Store,
    root: Hash256,
    /// Buffered writes keyed by hashed key; `None` marks a deletion.
    dirty: BTreeMap<H256, Option<Vec<u8>>>,
}

impl Trie {
    /// Opens the trie over `store`, restoring the persisted root if present.
    pub fn new(store: Store) -> Result<Self, StoreError> {
        let root = match store.get(&trie_root_key())? {
            Some(raw) if raw.len() == 32 => H256::from_slice(&raw),
            _ => ZERO_HASH,
        };
        Ok(Self {
            store,
            root,
            dirty: BTreeMap::new(),
        })
    }

    pub fn root(&self) -> Hash256 {
        self.root
    }

    pub fn put(&mut self, key: &[u8], value: Vec<u8>) {
        self.dirty.insert(hash_bytes(key), Some(value));
    }

    pub fn delete(&mut self, key: &[u8]) {
        self.dirty.insert(hash_bytes(key), None);
    }

    pub fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, StoreError> {
        let hashed = hash_bytes(key);
        if let Some(buffered) = self.dirty.get(&hashed) {
            return Ok(buffered.clone());
        }
        self.store.get(&trie_leaf_key(&hashed))
    }

    /// Live leaves: stored entries overlaid with the buffered writes, in
    /// hashed-key order.
    fn live_leaves(&self) -> Result<Vec<(H256, Vec<u8>)>, StoreError> {
        let mut merged: BTreeMap<H256, Vec<u8>> = BTreeMap::new();
        for (key, value) in self.store.iter_prefix(&[TRIE_LEAF_PREFIX])? {
            if key.len() == 1 + 32 {
                merged.insert(H256::from_slice(&key[1..]), value);
            }
        }
        for (hashed, buffered) in &self.dirty {
            match buffered {
                Some(value) => {
                    merged.insert(*hashed, value.clone());
                }
                None => {
                    merged.remove(hashed);
                }
            }
        }
        Ok(merged.into_iter().collect())
    }

    fn leaf_hashes(leaves: &[(H256, Vec<u8>)]) -> Vec<Hash256> {
        leaves
            .iter()
            .map(|(hashed, value)| hash_concat([hashed.as_bytes(), value.as_slice()]))
            .collect()
    }

    /// The root the trie would have after committing, without flushing.
    pub fn pending_root(&self) -> Result<Hash256, StoreError> {
        let leaves = self.live_leaves()?;
        Ok(merkle_root(&Self::leaf_hashes(&leaves)))
    }

    /// Flushes the buffered writes in one batch and recomputes the root.
    pub fn commit(&mut self) -> Result<Hash256, StoreError> {
        let root = self.pending_root()?;

        let mut batch = WriteBatch::default();
        for (hashed, buffered) in std::mem::take(&mut self.dirty) {
            match buffered {
                Some(value) => batch.put(trie_leaf_key(&hashed), value),
                None => batch.delete(trie_leaf_key(&hashed)),
            }
        }
        batch.put(trie_root_key(), root.as_bytes().to_vec());
        self.store.write_batch(batch)?;

        self.root = root;
        Ok(root)
    }

    /// Sibling path for `key` against the pending leaf set. `None` when the
    /// key is not live.
    pub fn get_proof(&self, key: &[u8]) -> Result<Option<TrieProof>, StoreError> {
        let hashed = hash_bytes(key);
        let leaves = self.live_leaves()?;
        let Some(index) = leaves.iter().position(|(h, _)| *h == hashed) else {
            return Ok(None);
        };
        let hashes = Self::leaf_hashes(&leaves);
        Ok(Some(TrieProof {
            leaf_index: index as u64,
            siblings: merkle_proof(&hashes, index),
        }))
    }

    /// Rebuilds the root from the proof and compares.
    pub fn verify_proof(root: &Hash256, key: &[u8], value: &[u8], proof: &TrieProof) -> bool {
        let hashed = hash_bytes(key);
        let leaf = hash_concat([hashed.as_bytes(), value]);
        verify_merkle_proof(&leaf, &proof.siblings, proof.leaf_index as usize, root)
    }
}

impl std::fmt::Debug for Trie {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Trie")
            .field("root", &self.root)
            .field("dirty", &self.dirty.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trie() -> Trie {
        Trie::new(Store::in_memory()).unwrap()
    }

    #[test]
    fn reads_hit_the_buffer_before_the_store() {
        let mut trie = trie();
        trie.put(b"k", b"v1".to_vec());
        assert_eq!(trie.get(b"k").unwrap(), Some(b"v1".to_vec()));
        trie.commit().unwrap();
        trie.put(b"k", b"v2".to_vec());
        assert_eq!(trie.get(b"k").unwrap(), Some(b"v2".to_vec()));
    }

    #[test]
    fn root_depends_only_on_content() {
        let mut a = trie();
        a.put(b"x", b"1".to_vec());
        a.commit().unwrap();
        a.put(b"y", b"2".to_vec());
        let root_a = a.commit().unwrap();

        // Same content written in one shot, different history.
        let mut b = trie();
        b.put(b"y", b"2".to_vec());
        b.put(b"x", b"1".to_vec());
        let root_b = b.commit().unwrap();

        assert_eq!(root_a, root_b);
    }

    #[test]
    fn deletes_change_the_root() {
        let mut trie = trie();
        trie.put(b"x", b"1".to_vec());
        trie.put(b"y", b"2".to_vec());
        let full = trie.commit().unwrap();

        trie.delete(b"y");
        let pruned = trie.commit().unwrap();
        assert_ne!(full, pruned);
        assert_eq!(trie.get(b"y").unwrap(), None);
    }

    #[test]
    fn empty_trie_has_zero_root() {
        let mut trie = trie();
        assert_eq!(trie.commit().unwrap(), ZERO_HASH);
    }

    #[test]
    fn pending_root_matches_commit() {
        let mut trie = trie();
        trie.put(b"a", b"1".to_vec());
        trie.put(b"b", b"2".to_vec());
        let pending = trie.pending_root().unwrap();
        assert_eq!(trie.commit().unwrap(), pending);
        assert_eq!(trie.root(), pending);
    }

    #[test]
    fn root_survives_reopen() {
        let store = Store::in_memory();
        let mut trie = Trie::new(store.clone()).unwrap();
        trie.put(b"k", b"v".to_vec());
        let root = trie.commit().unwrap();

        let reopened = Trie::new(store).unwrap();
        assert_eq!(reopened.root(), root);
    }

    #[test]
    fn proofs_verify_and_tampering_fails() {
        let mut trie = trie();
        for i in 0u8..5 {
            trie.put(&[i], vec![i, i]);
        }
        let root = trie.commit().unwrap();

        let proof = trie.get_proof(&[3]).unwrap().unwrap();
        assert!(Trie::verify_proof(&root, &[3], &[3, 3], &proof));
        // Wrong value.
        assert!(!Trie::verify_proof(&root, &[3], &[9, 9], &proof));
        // Wrong key.
        assert!(!Trie::verify_proof(&root, &[4], &[3, 3], &proof));
        // Corrupted sibling.
        let mut bad = proof.clone();
        bad.siblings[0].0[0] ^= 1;
        assert!(!Trie::verify_proof(&root, &[3], &[3, 3], &bad));
    }

    #[test]
    fn missing_key_has_no_proof() {
        let mut trie = trie();
        trie.put(b"present", b"1".to_vec());
        trie.commit().unwrap();
        assert!(trie.get_proof(b"absent").unwrap().is_none());
    }
}
