//! Buffers accepted blocks until a batch is worth committing.
//!
//! A batch is ready once it holds `max_batch_size` transactions, or once it
//! is both old enough and above the minimum size.

use std::sync::Mutex;

use bytes::Bytes;
use tracing::info;

use tessera_codec::WireEncode;
use tessera_common::{BatchStatus, Block, SettlementBatch};
use tessera_crypto::hash::{hash_concat, Hash256};
use tessera_crypto::merkle::merkle_root;

use crate::error::SettlementError;

#[derive(Debug, Clone)]
pub struct BatchBuilderConfig {
    /// Transaction-count threshold that makes a batch ready immediately.
    pub max_batch_size: u64,
    /// Age in seconds after which a batch above the minimum size is ready.
    pub max_batch_age_seconds: u64,
    /// Batches below this transaction count are never age-flushed.
    pub min_batch_size: u64,
}

impl Default for BatchBuilderConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 50_000,
            max_batch_age_seconds: 3_600,
            min_batch_size: 100,
        }
    }
}

#[derive(Debug)]
struct BuilderInner {
    pending_blocks: Vec<Block>,
    batch_started_at: u64,
    next_batch_id: u64,
}

#[derive(Debug)]
pub struct BatchBuilder {
    config: BatchBuilderConfig,
    inner: Mutex<BuilderInner>,
}

impl BatchBuilder {
    pub fn new(config: BatchBuilderConfig, now: u64) -> Self {
        Self {
            config,
            inner: Mutex::new(BuilderInner {
                pending_blocks: Vec::new(),
                batch_started_at: now,
                next_batch_id: 1,
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BuilderInner> {
        self.inner.lock().unwrap_or_else(|err| err.into_inner())
    }

    /// Ingests an accepted block. Blocks must arrive in order and exactly
    /// once.
    pub fn add_block(&self, block: Block) -> Result<(), SettlementError> {
        let mut inner = self.lock();
        if let Some(last) = inner.pending_blocks.last() {
            let expected = last.header.number + 1;
            if block.header.number == last.header.number {
                return Err(SettlementError::DuplicateBlock(block.header.number));
            }
            if block.header.number != expected {
                return Err(SettlementError::NonContiguousBlock {
                    expected: last.header.number,
                    got: block.header.number,
                });
            }
        }
        inner.pending_blocks.push(block);
        Ok(())
    }

    pub fn is_ready(&self, now: u64) -> bool {
        let inner = self.lock();
        if inner.pending_blocks.is_empty() {
            return false;
        }
        let tx_count: u64 = inner
            .pending_blocks
            .iter()
            .map(|block| block.transactions.len() as u64)
            .sum();

        if tx_count >= self.config.max_batch_size {
            return true;
        }
        now.saturating_sub(inner.batch_started_at) >= self.config.max_batch_age_seconds
            && tx_count >= self.config.min_batch_size
    }

    /// Drains the pending blocks into a batch record.
    pub fn build_batch(
        &self,
        pre_state_root: Hash256,
        now: u64,
    ) -> Result<SettlementBatch, SettlementError> {
        let mut inner = self.lock();
        if inner.pending_blocks.is_empty() {
            return Err(SettlementError::EmptyBatch);
        }

        let blocks = std::mem::take(&mut inner.pending_blocks);
        let batch_id = inner.next_batch_id;
        inner.next_batch_id += 1;
        inner.batch_started_at = now;
        drop(inner);

        let start_block = blocks.first().map(|block| block.header.number).unwrap_or(0);
        let end_block = blocks.last().map(|block| block.header.number).unwrap_or(0);
        let post_state_root = blocks
            .last()
            .map(|block| block.header.state_root)
            .unwrap_or_default();

        // Commitment over the batched headers.
        let header_hashes: Vec<Hash256> = blocks.iter().map(Block::hash).collect();
        let transactions_root = merkle_root(&header_hashes);

        // Data availability payload: length-prefixed block encodings.
        let mut compressed = Vec::new();
        for block in &blocks {
            let encoded = block.encode_to_vec();
            compressed.extend_from_slice(&(encoded.len() as u32).to_be_bytes());
            compressed.extend_from_slice(&encoded);
        }

        let state_proof = vec![
            pre_state_root,
            hash_concat([pre_state_root.as_bytes(), post_state_root.as_bytes()]),
            post_state_root,
        ];

        info!(batch_id, start_block, end_block, "batch built");
        Ok(SettlementBatch {
            batch_id,
            start_block,
            end_block,
            pre_state_root,
            post_state_root,
            transactions_root,
            compressed_data: Bytes::from(compressed),
            state_proof,
            status: BatchStatus::Pending,
            l1_tx_id: None,
            submitted_at: 0,
        })
    }

    /// Identifier the next built batch will get.
    pub fn current_batch_id(&self) -> u64 {
        self.lock().next_batch_id
    }

    pub fn pending_blocks(&self) -> usize {
        self.lock().pending_blocks.len()
    }

    pub fn pending_transactions(&self) -> u64 {
        self.lock()
            .pending_blocks
            .iter()
            .map(|block| block.transactions.len() as u64)
            .sum()
    }

    /// Block range currently buffered, if any.
    pub fn pending_range(&self) -> Option<(u64, u64)> {
        let inner = self.lock();
        let first = inner.pending_blocks.first()?.header.number;
        let last = inner.pending_blocks.last()?.header.number;
        Some((first, last))
    }
}

#[cfg(test)]
mod tests {
    use tessera_common::{BlockHeader, Transaction};

    use super::*;

    fn block(number: u64, tx_count: usize) -> Block {
        let transactions = (0..tx_count)
            .map(|i| Transaction {
                nonce: i as u64,
                ..Default::default()
            })
            .collect();
        let mut block = Block::new(
            BlockHeader {
                number,
                state_root: Hash256::repeat_byte(number as u8),
                ..Default::default()
            },
            transactions,
        );
        block.header.transactions_root = block.compute_transactions_root();
        block
    }

    fn builder(max_size: u64, max_age: u64, min_size: u64) -> BatchBuilder {
        BatchBuilder::new(
            BatchBuilderConfig {
                max_batch_size: max_size,
                max_batch_age_seconds: max_age,
                min_batch_size: min_size,
            },
            0,
        )
    }

    #[test]
    fn ready_when_transaction_count_reaches_the_cap() {
        let builder = builder(10, 3_600, 1);
        for number in 1..=5 {
            builder.add_block(block(number, 2)).unwrap();
        }
        assert!(builder.is_ready(0));
    }

    #[test]
    fn ready_when_old_enough_and_above_minimum() {
        let builder = builder(1_000, 60, 2);
        builder.add_block(block(1, 3)).unwrap();
        assert!(!builder.is_ready(59));
        assert!(builder.is_ready(60));
    }

    #[test]
    fn tiny_batches_never_age_out() {
        let builder = builder(1_000, 60, 5);
        builder.add_block(block(1, 1)).unwrap();
        assert!(!builder.is_ready(10_000));
    }

    #[test]
    fn blocks_must_be_contiguous_and_unique() {
        let builder = builder(10, 60, 1);
        builder.add_block(block(5, 1)).unwrap();
        assert!(matches!(
            builder.add_block(block(5, 1)),
            Err(SettlementError::DuplicateBlock(5))
        ));
        assert!(matches!(
            builder.add_block(block(9, 1)),
            Err(SettlementError::NonContiguousBlock { expected: 5, got: 9 })
        ));
        builder.add_block(block(6, 1)).unwrap();
    }

    #[test]
    fn built_batch_carries_the_expected_fields() {
        let builder = builder(10, 60, 1);
        let blocks: Vec<Block> = (1..=3).map(|n| block(n, 2)).collect();
        for b in &blocks {
            builder.add_block(b.clone()).unwrap();
        }

        let pre = Hash256::repeat_byte(0xAA);
        let batch = builder.build_batch(pre, 100).unwrap();

        assert_eq!(batch.batch_id, 1);
        assert_eq!(batch.start_block, 1);
        assert_eq!(batch.end_block, 3);
        assert_eq!(batch.pre_state_root, pre);
        assert_eq!(batch.post_state_root, blocks[2].header.state_root);
        let header_hashes: Vec<Hash256> = blocks.iter().map(Block::hash).collect();
        assert_eq!(batch.transactions_root, merkle_root(&header_hashes));
        assert_eq!(batch.status, BatchStatus::Pending);
        assert_eq!(batch.state_proof.len(), 3);
        assert!(!batch.compressed_data.is_empty());

        // Ids increment; the builder is drained.
        assert_eq!(builder.current_batch_id(), 2);
        assert_eq!(builder.pending_blocks(), 0);
    }

    #[test]
    fn building_an_empty_batch_fails() {
        let builder = builder(10, 60, 1);
        assert!(matches!(
            builder.build_batch(Hash256::zero(), 0),
            Err(SettlementError::EmptyBatch)
        ));
    }
}
