//! The `Node` owns every core component and drives the block-production and
//! settlement loops. External layers (RPC, P2P, L1 client) talk to it
//! through the methods here and the `PeerSink`/`L1Client`/`Clock` seams.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread::JoinHandle;
use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, error, info, warn};

use tessera_blockchain::{next_base_fee, BlockProcessor, Mempool, MempoolError};
use tessera_common::constants::GAS_ESTIMATE_MARGIN_PERCENT;
use tessera_common::{
    Address, Block, BlockHeader, ChainConfig, Clock, Receipt, SystemClock, Transaction, H256,
};
use tessera_consensus::{ConsensusEngine, Sequencer};
use tessera_crypto::hash::Hash256;
use tessera_crypto::signature::Keypair;
use tessera_settlement::{
    BatchBuilder, L1Client, LogL1Client, SettlementManager,
};
use tessera_storage::{BlockStore, StateManager, Store};
use tessera_vm::VM;

use crate::config::NodeConfig;
use crate::error::NodeError;
use crate::metrics::Metrics;
use crate::network::{NoopPeerSink, PeerSink};

const DB_FILE: &str = "chain.db";
const L1_LOG_FILE: &str = "l1_submissions.log";
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone)]
pub struct HealthStatus {
    pub healthy: bool,
    pub chain_head: u64,
    pub latest_finalized_block: u64,
    pub pending_transactions: usize,
    pub version: String,
}

pub struct Node {
    config: NodeConfig,
    chain_config: ChainConfig,
    state: RwLock<StateManager>,
    block_store: BlockStore,
    mempool: Mempool,
    consensus: ConsensusEngine,
    processor: BlockProcessor,
    batch_builder: BatchBuilder,
    settlement: SettlementManager,
    clock: Arc<dyn Clock>,
    peers: Arc<dyn PeerSink>,
    metrics: Metrics,
    sequencer_keypair: Option<Keypair>,
    sequencer_address: Option<Address>,
    /// Post-state root of the last settled batch; pre-state of the next.
    last_settled_root: Mutex<Hash256>,
    running: Arc<AtomicBool>,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl Node {
    /// Builds a node with the default collaborators: the system clock, the
    /// audit-log L1 client, and no peers.
    pub fn new(config: NodeConfig) -> Result<Arc<Self>, NodeError> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let l1: Arc<dyn L1Client> = Arc::new(LogL1Client::new(
            config.data_dir.join(L1_LOG_FILE),
            clock.clone(),
        ));
        Self::with_collaborators(config, clock, l1, Arc::new(NoopPeerSink))
    }

    /// Builds a node with injected collaborators; how the tests drive the
    /// settlement clock and observe L1 submissions.
    pub fn with_collaborators(
        config: NodeConfig,
        clock: Arc<dyn Clock>,
        l1: Arc<dyn L1Client>,
        peers: Arc<dyn PeerSink>,
    ) -> Result<Arc<Self>, NodeError> {
        let store = Store::new(config.data_dir.join(DB_FILE), config.engine)?;
        let state = StateManager::new(store.clone())?;
        let block_store = BlockStore::new(store)?;
        let mempool = Mempool::new(config.mempool_capacity);
        let consensus = ConsensusEngine::new(config.consensus.clone());
        let chain_config = config.genesis.config.clone();
        let processor = BlockProcessor::new(chain_config.clone());
        let batch_builder = BatchBuilder::new(config.batch.clone(), clock.now());
        let settlement =
            SettlementManager::new(config.settlement.clone(), l1, clock.clone());

        let sequencer_keypair = config.sequencer_seed.map(|seed| Keypair::from_seed(&seed));
        let sequencer_address = sequencer_keypair
            .as_ref()
            .map(|keypair| Address::from_public_key(&keypair.public_key()));

        let node = Arc::new(Self {
            config,
            chain_config,
            state: RwLock::new(state),
            block_store,
            mempool,
            consensus,
            processor,
            batch_builder,
            settlement,
            clock,
            peers,
            metrics: Metrics::new(),
            sequencer_keypair,
            sequencer_address,
            last_settled_root: Mutex::new(Hash256::zero()),
            running: Arc::new(AtomicBool::new(false)),
            threads: Mutex::new(Vec::new()),
        });
        node.initialize()?;
        Ok(node)
    }

    /// Applies genesis on an empty store and anchors the consensus head.
    fn initialize(&self) -> Result<(), NodeError> {
        let genesis = &self.config.genesis;

        if self.block_store.get_block(0)?.is_none() {
            info!(chain_id = genesis.config.chain_id, "initializing genesis");
            let mut state = self.write_state();
            for account in &genesis.alloc {
                state.add_balance(&account.address, account.balance)?;
            }
            let state_root = state.commit()?;
            drop(state);

            let mut block = genesis.to_block();
            block.header.state_root = state_root;
            self.block_store.store_block(&block)?;
        }

        // Sequencer set, from genesis plus this node's own identity.
        for sequencer in &genesis.sequencers {
            let public_key = parse_public_key(&sequencer.public_key)?;
            self.consensus.register_sequencer(Sequencer::new(
                sequencer.address,
                public_key,
                sequencer.stake,
            ))?;
        }
        if self.config.is_sequencer {
            if let (Some(keypair), Some(address)) =
                (&self.sequencer_keypair, self.sequencer_address)
            {
                if !genesis
                    .sequencers
                    .iter()
                    .any(|sequencer| sequencer.address == address)
                {
                    self.consensus.register_sequencer(Sequencer::new(
                        address,
                        keypair.public_key(),
                        self.config.consensus.min_stake,
                    ))?;
                }
            }
        }

        let head = self.block_store.head()?;
        let head_block = self
            .block_store
            .get_block(head)?
            .ok_or(NodeError::BlockNotFound)?;
        self.consensus.set_head(head, head_block.hash());
        self.metrics.chain_head.set(head as i64);

        let root = self.read_state().state_root();
        *self.lock_settled_root() = root;
        Ok(())
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, StateManager> {
        self.state.read().unwrap_or_else(|err| err.into_inner())
    }

    fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, StateManager> {
        self.state.write().unwrap_or_else(|err| err.into_inner())
    }

    fn lock_settled_root(&self) -> std::sync::MutexGuard<'_, Hash256> {
        self.last_settled_root
            .lock()
            .unwrap_or_else(|err| err.into_inner())
    }

    // ------------------------------------------------------------------
    // Process-boundary API
    // ------------------------------------------------------------------

    /// Verifies and admits a transaction, announcing it to peers.
    pub fn submit_transaction(&self, transaction: Transaction) -> Result<H256, NodeError> {
        // The hash excludes the signature bytes, so a resubmission of a
        // pooled transaction reports as known even when its signature
        // differs; the duplicate check therefore runs first.
        let hash = transaction.compute_hash();
        if self.mempool.contains(&hash) {
            return Err(MempoolError::AlreadyKnown.into());
        }

        if !transaction.verify_signature(self.chain_config.allow_dev_signatures) {
            return Err(MempoolError::Invalid.into());
        }

        let (balance, nonce) = {
            let state = self.read_state();
            (
                state.get_balance(&transaction.from)?,
                state.get_nonce(&transaction.from)?,
            )
        };

        self.mempool
            .add_transaction(transaction.clone(), balance, nonce)?;
        self.metrics
            .pending_transactions
            .set(self.mempool.len() as i64);
        self.peers.broadcast_transaction(&transaction);
        debug!(%hash, "transaction admitted");
        Ok(hash)
    }

    pub fn chain_head(&self) -> Result<u64, NodeError> {
        Ok(self.block_store.head()?)
    }

    pub fn state_root(&self) -> Hash256 {
        self.read_state().state_root()
    }

    pub fn latest_block(&self) -> Result<Option<Block>, NodeError> {
        let head = self.block_store.head()?;
        Ok(self.block_store.get_block(head)?)
    }

    pub fn get_block(&self, number: u64) -> Result<Option<Block>, NodeError> {
        Ok(self.block_store.get_block(number)?)
    }

    pub fn get_block_by_hash(&self, hash: &H256) -> Result<Option<Block>, NodeError> {
        Ok(self.block_store.get_block_by_hash(hash)?)
    }

    pub fn get_receipt(&self, tx_hash: &H256) -> Result<Option<Receipt>, NodeError> {
        Ok(self.block_store.get_receipt(tx_hash)?)
    }

    pub fn get_balance(&self, address: &Address) -> Result<u64, NodeError> {
        Ok(self.read_state().get_balance(address)?)
    }

    pub fn get_nonce(&self, address: &Address) -> Result<u64, NodeError> {
        Ok(self.read_state().get_nonce(address)?)
    }

    pub fn get_code(&self, address: &Address) -> Result<Bytes, NodeError> {
        Ok(self.read_state().get_code(address)?)
    }

    pub fn get_storage(&self, address: &Address, slot: &H256) -> Result<H256, NodeError> {
        Ok(self.read_state().get_storage(address, slot)?)
    }

    /// Executes a read-only call against the latest state and reverts every
    /// side effect.
    pub fn call(
        &self,
        from: Address,
        to: Address,
        data: Bytes,
        gas: u64,
    ) -> Result<Bytes, NodeError> {
        let head = self.block_store.head()?;
        let header = self
            .block_store
            .get_header(head)?
            .ok_or(NodeError::BlockNotFound)?;

        let mut state = self.write_state();
        let snapshot = state.snapshot();
        let probe = Transaction {
            from,
            to,
            data: data.clone(),
            gas_limit: gas,
            ..Default::default()
        };
        let env = self
            .processor
            .environment_for(&header, &probe, Default::default());
        let mut vm = VM::new(env, &mut state);
        let report = vm.execute_call(from, to, data, 0, gas, false);
        let result = match report {
            Ok(report) if report.is_success() => Ok(report.output),
            Ok(report) => Err(NodeError::ExecutionFailed(format!(
                "{:?}",
                report.result
            ))),
            Err(err) => Err(err.into()),
        };
        state.revert(&snapshot)?;
        result
    }

    /// Simulates the transaction and returns its gas usage with a 20%
    /// margin.
    pub fn estimate_gas(&self, transaction: &Transaction) -> Result<u64, NodeError> {
        let head = self.block_store.head()?;
        let header = self
            .block_store
            .get_header(head)?
            .ok_or(NodeError::BlockNotFound)?;

        let mut state = self.write_state();
        let snapshot = state.snapshot();
        let env = self
            .processor
            .environment_for(&header, transaction, Default::default());
        let outcome = self
            .processor
            .process_transaction(&mut state, &env, transaction);
        state.revert(&snapshot)?;

        let processed = outcome?;
        Ok(processed.gas_used * (100 + GAS_ESTIMATE_MARGIN_PERCENT) / 100)
    }

    pub fn latest_batch_id(&self) -> u64 {
        self.batch_builder.current_batch_id()
    }

    pub fn latest_finalized_block(&self) -> u64 {
        self.settlement.latest_finalized_block()
    }

    pub fn active_sequencers(&self) -> Vec<Sequencer> {
        self.consensus.active_sequencers()
    }

    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    pub fn settlement(&self) -> &SettlementManager {
        &self.settlement
    }

    pub fn is_sequencer(&self) -> bool {
        self.config.is_sequencer
    }

    pub fn health(&self) -> HealthStatus {
        HealthStatus {
            healthy: self.running.load(Ordering::SeqCst),
            chain_head: self.block_store.head().unwrap_or(0),
            latest_finalized_block: self.settlement.latest_finalized_block(),
            pending_transactions: self.mempool.len(),
            version: VERSION.to_string(),
        }
    }

    // ------------------------------------------------------------------
    // Block production
    // ------------------------------------------------------------------

    /// Produces one block if this node leads the next slot. Returns the
    /// accepted block, or `None` when the slot belongs to someone else.
    pub fn produce_block(&self) -> Result<Option<Block>, NodeError> {
        let sequencer = self.sequencer_address.ok_or(NodeError::NotASequencer)?;

        let head = self.block_store.head()?;
        let parent = self
            .block_store
            .get_block(head)?
            .ok_or(NodeError::BlockNotFound)?;
        let next_number = head + 1;

        if !self.consensus.is_leader(next_number, &sequencer) {
            debug!(slot = next_number, "not our slot");
            return Ok(None);
        }

        let base_fee = next_base_fee(&parent.header);
        let gas_limit = parent.header.gas_limit;
        let transactions = self.mempool.select_transactions(gas_limit, base_fee);

        let mut header = BlockHeader {
            number: next_number,
            parent_hash: parent.hash(),
            sequencer,
            gas_limit,
            base_fee,
            timestamp: self.clock.now(),
            l1_block_number: self.settlement.l1_current_slot(),
            batch_id: self.batch_builder.current_batch_id(),
            ..Default::default()
        };

        let block_hashes = self
            .processor
            .recent_block_hashes(&self.block_store, &parent.header)?;

        let mut state = self.write_state();
        let mut receipts: Vec<Receipt> = Vec::new();
        let mut included: Vec<Transaction> = Vec::new();
        let mut dropped: Vec<H256> = Vec::new();
        let mut cumulative_gas = 0u64;

        for transaction in transactions {
            let env = self
                .processor
                .environment_for(&header, &transaction, block_hashes.clone());
            match self
                .processor
                .process_transaction(&mut state, &env, &transaction)
            {
                Ok(mut processed) => {
                    cumulative_gas += processed.gas_used;
                    processed.receipt.cumulative_gas_used = cumulative_gas;
                    processed.receipt.transaction_index = included.len() as u64;
                    receipts.push(processed.receipt);
                    included.push(transaction);
                }
                Err(err) => {
                    // An unprocessable transaction is dropped; the block
                    // stays valid without it.
                    warn!(%err, "skipping transaction during production");
                    dropped.push(transaction.compute_hash());
                }
            }
        }

        header.gas_used = cumulative_gas;
        header.state_root = state.pending_root()?;
        header.receipts_root = tessera_blockchain::processor::receipts_root(&receipts);

        let mut block = Block::new(header, included);
        block.header.transactions_root = block.compute_transactions_root();

        self.consensus.accept_block(&block)?;
        state.commit()?;
        drop(state);

        self.block_store.store_block(&block)?;
        for receipt in &receipts {
            self.block_store.store_receipt(receipt)?;
            self.block_store.index_transaction(
                &receipt.transaction_hash,
                block.header.number,
                receipt.transaction_index as u32,
            )?;
        }

        let confirmed: Vec<H256> = block
            .transactions
            .iter()
            .map(Transaction::compute_hash)
            .collect();
        self.mempool.remove_confirmed(&confirmed);
        self.mempool.remove_confirmed(&dropped);

        if let Err(err) = self.batch_builder.add_block(block.clone()) {
            error!(%err, "settlement ingestion rejected a produced block");
        }

        self.metrics.blocks_produced.inc();
        self.metrics
            .transactions_processed
            .inc_by(block.transactions.len() as u64);
        self.metrics.gas_used_total.inc_by(cumulative_gas);
        self.metrics.chain_head.set(block.header.number as i64);
        self.metrics
            .pending_transactions
            .set(self.mempool.len() as i64);

        self.peers.broadcast_block(&block);
        info!(
            number = block.header.number,
            txs = block.transactions.len(),
            gas = cumulative_gas,
            "block produced"
        );
        Ok(Some(block))
    }

    /// Validates and applies a block received from the outside: consensus
    /// acceptance, full re-execution against local state, persistence,
    /// mempool pruning and batch ingestion. All-or-nothing: a block that
    /// fails any check leaves no trace.
    pub fn import_block(&self, block: Block) -> Result<(), NodeError> {
        self.consensus.validate_block(&block)?;

        let parent_number = block.header.number.saturating_sub(1);
        let parent = self
            .block_store
            .get_header(parent_number)?
            .ok_or(NodeError::BlockNotFound)?;
        let block_hashes = self
            .processor
            .recent_block_hashes(&self.block_store, &parent)?;

        let receipts = {
            let mut state = self.write_state();
            let result = self
                .processor
                .execute_block(&mut state, &block, block_hashes)?;
            result.receipts
        };

        self.consensus.accept_block(&block)?;
        self.block_store.store_block(&block)?;
        for receipt in &receipts {
            self.block_store.store_receipt(receipt)?;
            self.block_store.index_transaction(
                &receipt.transaction_hash,
                block.header.number,
                receipt.transaction_index as u32,
            )?;
        }

        let confirmed: Vec<H256> = block
            .transactions
            .iter()
            .map(Transaction::compute_hash)
            .collect();
        self.mempool.remove_confirmed(&confirmed);

        if let Err(err) = self.batch_builder.add_block(block.clone()) {
            error!(%err, "settlement ingestion rejected an imported block");
        }

        self.metrics.chain_head.set(block.header.number as i64);
        self.metrics
            .transactions_processed
            .inc_by(block.transactions.len() as u64);
        info!(
            number = block.header.number,
            txs = block.transactions.len(),
            "block imported"
        );
        Ok(())
    }

    /// One settlement iteration: flush a ready batch and roll the finality
    /// clock. The production loop calls this; tests drive it directly.
    pub fn run_settlement_once(&self) -> Result<(), NodeError> {
        let now = self.clock.now();
        if self.batch_builder.is_ready(now) {
            let pre_state_root = *self.lock_settled_root();
            let batch = self.batch_builder.build_batch(pre_state_root, now)?;
            let receipts = self.collect_batch_receipts(batch.start_block, batch.end_block)?;
            let record = self.settlement.prover().generate(&batch, &receipts);
            let post_root = batch.post_state_root;
            self.settlement.submit_batch(batch, record)?;
            *self.lock_settled_root() = post_root;
            self.metrics.batches_submitted.inc();
        }

        self.settlement.check_finality();
        Ok(())
    }

    fn collect_batch_receipts(&self, start: u64, end: u64) -> Result<Vec<Receipt>, NodeError> {
        let mut receipts = Vec::new();
        for number in start..=end {
            let Some(block) = self.block_store.get_block(number)? else {
                continue;
            };
            for transaction in &block.transactions {
                if let Some(receipt) = self.block_store.get_receipt(&transaction.compute_hash())? {
                    receipts.push(receipt);
                }
            }
        }
        Ok(receipts)
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Spawns the production and settlement loops. Idempotent.
    pub fn start(self: &Arc<Self>) {
        if self.running.swap(true, Ordering::SeqCst) {
            return;
        }
        info!(sequencer = self.config.is_sequencer, "starting node loops");

        let mut threads = self
            .threads
            .lock()
            .unwrap_or_else(|err| err.into_inner());

        if self.config.is_sequencer {
            let node = Arc::clone(self);
            threads.push(std::thread::spawn(move || {
                let interval = Duration::from_millis(node.config.consensus.block_time_ms);
                while node.running.load(Ordering::SeqCst) {
                    if let Err(err) = node.produce_block() {
                        error!(%err, "block production failed");
                    }
                    std::thread::sleep(interval);
                }
            }));
        }

        let node = Arc::clone(self);
        threads.push(std::thread::spawn(move || {
            let interval = Duration::from_millis(node.config.settlement_poll_ms);
            while node.running.load(Ordering::SeqCst) {
                if let Err(err) = node.run_settlement_once() {
                    error!(%err, "settlement iteration failed");
                }
                std::thread::sleep(interval);
            }
        }));
    }

    /// Flips the stop flag and joins the loops; in-flight iterations finish
    /// first.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        let mut threads = self
            .threads
            .lock()
            .unwrap_or_else(|err| err.into_inner());
        for handle in threads.drain(..) {
            let _ = handle.join();
        }
        info!("node stopped");
    }
}

impl Drop for Node {
    fn drop(&mut self) {
        self.stop();
    }
}

fn parse_public_key(hex_key: &str) -> Result<[u8; 32], NodeError> {
    let raw = hex::decode(hex_key.strip_prefix("0x").unwrap_or(hex_key))
        .map_err(|_| NodeError::InvalidGenesis("sequencer public key is not hex".into()))?;
    raw.try_into()
        .map_err(|_| NodeError::InvalidGenesis("sequencer public key must be 32 bytes".into()))
}
