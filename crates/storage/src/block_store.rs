//! Blocks, receipts and the transaction index.

use std::sync::RwLock;

use tessera_codec::{WireDecode, WireEncode};
use tessera_common::{Block, BlockHeader, Receipt};
use tessera_crypto::hash::Hash256;

use crate::error::StoreError;
use crate::keys::{block_hash_key, block_number_key, head_key, receipt_key, tx_index_key};
use crate::store::Store;

/// Blocks by number and by hash, the head pointer, per-transaction location
/// index, and receipts.
pub struct BlockStore {
    store: Store,
    head: RwLock<u64>,
}

impl BlockStore {
    pub fn new(store: Store) -> Result<Self, StoreError> {
        let head = match store.get(&head_key())? {
            Some(raw) if raw.len() == 8 => {
                let mut bytes = [0u8; 8];
                bytes.copy_from_slice(&raw);
                u64::from_be_bytes(bytes)
            }
            _ => 0,
        };
        Ok(Self {
            store,
            head: RwLock::new(head),
        })
    }

    pub fn store_block(&self, block: &Block) -> Result<(), StoreError> {
        let number = block.header.number;
        let hash = block.hash();
        let encoded = block.encode_to_vec();

        self.store.put(block_number_key(number), encoded)?;
        self.store
            .put(block_hash_key(&hash), number.to_be_bytes().to_vec())?;

        let mut head = self
            .head
            .write()
            .map_err(|err| StoreError::LockPoisoned(err.to_string()))?;
        if number > *head || number == 0 {
            *head = number;
            self.store.put(head_key(), number.to_be_bytes().to_vec())?;
        }
        Ok(())
    }

    pub fn get_block(&self, number: u64) -> Result<Option<Block>, StoreError> {
        match self.store.get(&block_number_key(number))? {
            Some(raw) => Ok(Some(Block::decode(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn get_header(&self, number: u64) -> Result<Option<BlockHeader>, StoreError> {
        Ok(self.get_block(number)?.map(|block| block.header))
    }

    pub fn get_block_by_hash(&self, hash: &Hash256) -> Result<Option<Block>, StoreError> {
        match self.store.get(&block_hash_key(hash))? {
            Some(raw) if raw.len() == 8 => {
                let mut bytes = [0u8; 8];
                bytes.copy_from_slice(&raw);
                self.get_block(u64::from_be_bytes(bytes))
            }
            _ => Ok(None),
        }
    }

    pub fn head(&self) -> Result<u64, StoreError> {
        Ok(*self
            .head
            .read()
            .map_err(|err| StoreError::LockPoisoned(err.to_string()))?)
    }

    pub fn set_head(&self, number: u64) -> Result<(), StoreError> {
        let mut head = self
            .head
            .write()
            .map_err(|err| StoreError::LockPoisoned(err.to_string()))?;
        *head = number;
        self.store.put(head_key(), number.to_be_bytes().to_vec())
    }

    pub fn index_transaction(
        &self,
        tx_hash: &Hash256,
        block_number: u64,
        tx_index: u32,
    ) -> Result<(), StoreError> {
        let mut value = Vec::with_capacity(12);
        value.extend_from_slice(&block_number.to_be_bytes());
        value.extend_from_slice(&tx_index.to_be_bytes());
        self.store.put(tx_index_key(tx_hash), value)
    }

    pub fn get_tx_location(&self, tx_hash: &Hash256) -> Result<Option<(u64, u32)>, StoreError> {
        match self.store.get(&tx_index_key(tx_hash))? {
            Some(raw) if raw.len() == 12 => {
                let mut number = [0u8; 8];
                number.copy_from_slice(&raw[..8]);
                let mut index = [0u8; 4];
                index.copy_from_slice(&raw[8..]);
                Ok(Some((u64::from_be_bytes(number), u32::from_be_bytes(index))))
            }
            _ => Ok(None),
        }
    }

    pub fn store_receipt(&self, receipt: &Receipt) -> Result<(), StoreError> {
        self.store
            .put(receipt_key(&receipt.transaction_hash), receipt.encode_to_vec())
    }

    pub fn get_receipt(&self, tx_hash: &Hash256) -> Result<Option<Receipt>, StoreError> {
        match self.store.get(&receipt_key(tx_hash))? {
            Some(raw) => Ok(Some(Receipt::decode(&raw)?)),
            None => Ok(None),
        }
    }
}

impl std::fmt::Debug for BlockStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockStore").finish_non_exhaustive()
    }
}
