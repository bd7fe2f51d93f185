//! Fee-market mempool.
//!
//! Transactions are indexed three ways: by hash, by sender (nonce-ordered
//! with a next-expected-nonce cursor), and, at selection time, by effective
//! price at the requested base fee. Replacement of a (sender, nonce) slot
//! requires a strictly >10% higher max fee.

use std::collections::{BTreeMap, BinaryHeap, HashMap};
use std::sync::RwLock;

use tracing::debug;

use tessera_common::constants::RBF_BUMP_PERCENT;
use tessera_common::{Address, Transaction, H256};

use crate::error::MempoolError;

/// Default pool capacity.
pub const DEFAULT_POOL_CAPACITY: usize = 10_000;

/// How far a nonce may run ahead of the account nonce before the pool
/// refuses to queue it.
pub const NONCE_WINDOW: u64 = 64;

/// Successful admission outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxAdmitOutcome {
    Added,
    /// Took the (sender, nonce) slot from a cheaper transaction.
    Replaced,
}

#[derive(Debug, Default)]
struct SenderQueue {
    /// nonce -> transaction hash
    by_nonce: BTreeMap<u64, H256>,
    /// Next nonce this sender is expected to use, counting queued
    /// transactions that extend the account nonce contiguously.
    pending_nonce: u64,
}

#[derive(Debug, Default)]
struct Inner {
    by_hash: HashMap<H256, Transaction>,
    by_sender: HashMap<Address, SenderQueue>,
}

#[derive(Debug)]
pub struct Mempool {
    capacity: usize,
    inner: RwLock<Inner>,
}

impl Default for Mempool {
    fn default() -> Self {
        Self::new(DEFAULT_POOL_CAPACITY)
    }
}

/// Heap entry ordering selection candidates by effective price.
#[derive(Debug, PartialEq, Eq)]
struct Candidate {
    effective_price: u64,
    sender: Address,
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.effective_price
            .cmp(&other.effective_price)
            // Deterministic tie-break so selection is reproducible.
            .then_with(|| other.sender.cmp(&self.sender))
    }
}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Mempool {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            inner: RwLock::new(Inner::default()),
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|err| err.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|err| err.into_inner())
    }

    /// Admits `transaction` against the sender's committed balance and nonce.
    ///
    /// The caller is responsible for signature verification; everything else
    /// about admission is decided here.
    pub fn add_transaction(
        &self,
        transaction: Transaction,
        sender_balance: u64,
        sender_nonce: u64,
    ) -> Result<TxAdmitOutcome, MempoolError> {
        let hash = transaction.compute_hash();
        let sender = transaction.from;
        let nonce = transaction.nonce;

        let mut inner = self.write();

        if inner.by_hash.contains_key(&hash) {
            return Err(MempoolError::AlreadyKnown);
        }
        if nonce < sender_nonce {
            return Err(MempoolError::NonceTooLow);
        }
        if nonce > sender_nonce.saturating_add(NONCE_WINDOW) {
            return Err(MempoolError::NonceTooHigh);
        }
        let required = transaction.max_cost().ok_or(MempoolError::Invalid)?;
        if sender_balance < required {
            return Err(MempoolError::InsufficientFunds);
        }
        // Capacity gates everything, replacements included: a full pool
        // rejects before the (sender, nonce) slot is even consulted.
        if inner.by_hash.len() >= self.capacity {
            return Err(MempoolError::PoolFull);
        }

        let existing_hash = inner
            .by_sender
            .get(&sender)
            .and_then(|queue| queue.by_nonce.get(&nonce))
            .copied();

        if let Some(existing_hash) = existing_hash {
            // Replace-by-fee: the bump must be strictly more than 10%.
            let existing_fee = inner
                .by_hash
                .get(&existing_hash)
                .map(|tx| tx.max_fee_per_gas)
                .unwrap_or(0);
            let threshold = existing_fee.saturating_mul(100 + RBF_BUMP_PERCENT) / 100;
            if transaction.max_fee_per_gas <= threshold {
                return Err(MempoolError::Underpriced);
            }

            inner.by_hash.remove(&existing_hash);
            inner.by_hash.insert(hash, transaction);
            if let Some(queue) = inner.by_sender.get_mut(&sender) {
                queue.by_nonce.insert(nonce, hash);
            }
            debug!(%sender, nonce, "replaced mempool transaction");
            return Ok(TxAdmitOutcome::Replaced);
        }

        inner.by_hash.insert(hash, transaction);
        let queue = inner.by_sender.entry(sender).or_insert_with(|| SenderQueue {
            by_nonce: BTreeMap::new(),
            pending_nonce: sender_nonce,
        });
        queue.pending_nonce = queue.pending_nonce.max(sender_nonce);
        queue.by_nonce.insert(nonce, hash);
        // Contiguous-nonce advancement.
        while queue.by_nonce.contains_key(&queue.pending_nonce) {
            queue.pending_nonce += 1;
        }

        Ok(TxAdmitOutcome::Added)
    }

    pub fn remove_transaction(&self, hash: &H256) -> bool {
        let mut inner = self.write();
        let Some(transaction) = inner.by_hash.remove(hash) else {
            return false;
        };
        let mut sender_drained = false;
        if let Some(queue) = inner.by_sender.get_mut(&transaction.from) {
            queue.by_nonce.remove(&transaction.nonce);
            sender_drained = queue.by_nonce.is_empty();
        }
        if sender_drained {
            inner.by_sender.remove(&transaction.from);
        }
        true
    }

    /// Drops every listed transaction, typically after block inclusion.
    pub fn remove_confirmed(&self, hashes: &[H256]) {
        for hash in hashes {
            self.remove_transaction(hash);
        }
    }

    pub fn get_transaction(&self, hash: &H256) -> Option<Transaction> {
        self.read().by_hash.get(hash).cloned()
    }

    pub fn contains(&self, hash: &H256) -> bool {
        self.read().by_hash.contains_key(hash)
    }

    /// Pending transactions of one sender, in nonce order.
    pub fn pending_for(&self, sender: &Address) -> Vec<Transaction> {
        let inner = self.read();
        let Some(queue) = inner.by_sender.get(sender) else {
            return Vec::new();
        };
        queue
            .by_nonce
            .values()
            .filter_map(|hash| inner.by_hash.get(hash).cloned())
            .collect()
    }

    /// Next nonce the sender is expected to use, counting queued
    /// transactions.
    pub fn pending_nonce(&self, sender: &Address) -> Option<u64> {
        self.read()
            .by_sender
            .get(sender)
            .map(|queue| queue.pending_nonce)
    }

    pub fn len(&self) -> usize {
        self.read().by_hash.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().by_hash.is_empty()
    }

    pub fn clear(&self) {
        let mut inner = self.write();
        inner.by_hash.clear();
        inner.by_sender.clear();
    }

    /// Picks transactions for a block: descending effective price at
    /// `base_fee`, per-sender nonce order, skipping entries priced below the
    /// base fee or too large for the remaining gas budget.
    ///
    /// A skipped transaction ends its sender's run, since later nonces cannot
    /// be included without it.
    pub fn select_transactions(&self, gas_limit: u64, base_fee: u64) -> Vec<Transaction> {
        let inner = self.read();

        // Per-sender nonce-ordered queues feeding a price-ordered heap of
        // queue heads.
        let mut sender_queues: HashMap<Address, Vec<Transaction>> = HashMap::new();
        for queue in inner.by_sender.values() {
            let transactions: Vec<Transaction> = queue
                .by_nonce
                .values()
                .filter_map(|hash| inner.by_hash.get(hash).cloned())
                .collect();
            if let Some(first) = transactions.first() {
                sender_queues.insert(first.from, transactions);
            }
        }
        drop(inner);

        let mut heap: BinaryHeap<Candidate> = sender_queues
            .iter()
            .map(|(sender, transactions)| Candidate {
                effective_price: transactions[0].effective_gas_price(base_fee),
                sender: *sender,
            })
            .collect();
        let mut cursors: HashMap<Address, usize> = HashMap::new();

        let mut selected = Vec::new();
        let mut gas_left = gas_limit;

        while let Some(candidate) = heap.pop() {
            let queue = match sender_queues.get(&candidate.sender) {
                Some(queue) => queue,
                None => continue,
            };
            let cursor = cursors.entry(candidate.sender).or_insert(0);
            let Some(transaction) = queue.get(*cursor) else {
                continue;
            };

            let price = transaction.effective_gas_price(base_fee);
            if price < base_fee || transaction.gas_limit > gas_left {
                // Sender is done: later nonces cannot leapfrog this one.
                continue;
            }

            gas_left -= transaction.gas_limit;
            selected.push(transaction.clone());
            *cursor += 1;

            if let Some(next) = queue.get(*cursor) {
                heap.push(Candidate {
                    effective_price: next.effective_gas_price(base_fee),
                    sender: candidate.sender,
                });
            }
            if gas_left == 0 {
                break;
            }
        }

        selected
    }
}
