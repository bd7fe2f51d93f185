//! Transaction and block execution.
//!
//! A transaction runs as: nonce bump, upfront debit at the effective price,
//! snapshot, VM frame (or plain transfer), refund, sequencer payment,
//! receipt. Block execution runs every transaction under one context and
//! applies all-or-nothing: the computed roots are checked against the header
//! before anything is committed.

use std::collections::HashMap;

use tracing::{debug, warn};

use tessera_common::{
    constants::{TX_CREATE_GAS_COST, TX_DATA_NON_ZERO_GAS_COST, TX_DATA_ZERO_GAS_COST, TX_GAS_COST},
    Block, BlockHeader, ChainConfig, Receipt, Transaction, H256,
};
use tessera_crypto::hash::Hash256;
use tessera_crypto::merkle::merkle_root;
use tessera_storage::{BlockStore, StateManager};
use tessera_vm::{Environment, ExecutionReport, ExecutionResult, VM};

use crate::error::{ChainError, InvalidBlockError, TxValidationError};

/// 21000 base, +32000 for creates, +4 per zero data byte, +16 per non-zero.
pub fn intrinsic_gas(transaction: &Transaction) -> u64 {
    let mut gas = TX_GAS_COST;
    if transaction.is_contract_creation() {
        gas += TX_CREATE_GAS_COST;
    }
    for byte in transaction.data.iter() {
        gas += if *byte == 0 {
            TX_DATA_ZERO_GAS_COST
        } else {
            TX_DATA_NON_ZERO_GAS_COST
        };
    }
    gas
}

/// Receipt plus the gas it consumed.
#[derive(Debug, Clone)]
pub struct ProcessedTransaction {
    pub receipt: Receipt,
    pub gas_used: u64,
}

/// Result of executing a full block against the parent post-state.
#[derive(Debug)]
pub struct BlockExecutionResult {
    pub receipts: Vec<Receipt>,
    pub state_root: Hash256,
    pub receipts_root: Hash256,
    pub gas_used: u64,
}

#[derive(Debug, Clone)]
pub struct BlockProcessor {
    config: ChainConfig,
}

impl BlockProcessor {
    pub fn new(config: ChainConfig) -> Self {
        Self { config }
    }

    pub fn chain_config(&self) -> &ChainConfig {
        &self.config
    }

    /// Stateful pre-execution checks: nonce, funds, intrinsic gas, fee floor.
    pub fn validate_transaction(
        &self,
        state: &StateManager,
        transaction: &Transaction,
        base_fee: u64,
    ) -> Result<(), ChainError> {
        let account_nonce = state.get_nonce(&transaction.from)?;
        if transaction.nonce != account_nonce {
            return Err(TxValidationError::BadNonce {
                expected: account_nonce,
                got: transaction.nonce,
            }
            .into());
        }

        let required = transaction
            .max_cost()
            .ok_or(TxValidationError::InsufficientBalance)?;
        if state.get_balance(&transaction.from)? < required {
            return Err(TxValidationError::InsufficientBalance.into());
        }

        if transaction.gas_limit < intrinsic_gas(transaction) {
            return Err(TxValidationError::GasBelowIntrinsic.into());
        }

        if transaction.max_fee_per_gas < base_fee {
            return Err(TxValidationError::FeeBelowBase.into());
        }

        Ok(())
    }

    /// Builds the per-transaction execution environment for a header.
    pub fn environment_for(
        &self,
        header: &BlockHeader,
        transaction: &Transaction,
        block_hashes: HashMap<u64, H256>,
    ) -> Environment {
        Environment {
            origin: transaction.from,
            coinbase: header.sequencer,
            block_number: header.number,
            timestamp: header.timestamp,
            block_gas_limit: header.gas_limit,
            base_fee: header.base_fee,
            gas_price: transaction.effective_gas_price(header.base_fee),
            chain_id: self.config.chain_id,
            prev_randao: Default::default(),
            block_hashes,
        }
    }

    /// Validates and executes one transaction, producing its receipt.
    ///
    /// A failed frame rolls back to the post-debit snapshot: nonce and fee
    /// accounting stand, value movement and contract writes do not.
    pub fn process_transaction(
        &self,
        state: &mut StateManager,
        env: &Environment,
        transaction: &Transaction,
    ) -> Result<ProcessedTransaction, ChainError> {
        self.validate_transaction(state, transaction, env.base_fee)?;

        let sender = transaction.from;
        let effective_price = transaction.effective_gas_price(env.base_fee);
        let intrinsic = intrinsic_gas(transaction);
        let frame_gas = transaction.gas_limit - intrinsic;

        let upfront = transaction
            .gas_limit
            .checked_mul(effective_price)
            .and_then(|gas| gas.checked_add(transaction.value))
            .ok_or(ChainError::GasOverflow)?;

        let is_creation = transaction.is_contract_creation();

        // The creation path bumps the nonce inside the VM (the new address
        // derives from the pre-bump value); plain calls bump it here.
        if !is_creation {
            state.increment_nonce(&sender)?;
        }
        state.sub_balance(&sender, upfront)?;

        let snapshot = state.snapshot();

        let report = if is_creation {
            let mut vm = VM::new(env.clone(), state);
            vm.execute_create(sender, transaction.value, transaction.data.clone(), frame_gas)?
        } else {
            if transaction.value > 0 {
                state.add_balance(&transaction.to, transaction.value)?;
            }
            let has_code = state.get_account(&transaction.to)?.is_contract();
            if has_code {
                let mut vm = VM::new(env.clone(), state);
                vm.execute_call(
                    sender,
                    transaction.to,
                    transaction.data.clone(),
                    transaction.value,
                    frame_gas,
                    false,
                )?
            } else {
                plain_transfer_report()
            }
        };

        let gas_used = match report.result {
            ExecutionResult::Success | ExecutionResult::Revert => intrinsic + report.gas_used,
            // Exceptional halts consume the whole limit.
            ExecutionResult::Halted(_) => transaction.gas_limit,
        };

        if !report.is_success() {
            // The VM already rolled back its frames; this undoes the value
            // credit for plain calls. Creation cleanup lives inside the VM
            // (its snapshot is taken after the nonce bump).
            if !is_creation {
                state.revert(&snapshot)?;
            }
            debug!(hash = %transaction.compute_hash(), result = ?report.result, "transaction failed");
        }

        // Refund unused gas, pay the sequencer for what was used.
        let refund = (transaction.gas_limit - gas_used)
            .checked_mul(effective_price)
            .ok_or(ChainError::GasOverflow)?;
        state.add_balance(&sender, refund)?;
        let payment = gas_used
            .checked_mul(effective_price)
            .ok_or(ChainError::GasOverflow)?;
        state.add_balance(&env.coinbase, payment)?;

        let receipt = Receipt {
            transaction_hash: transaction.compute_hash(),
            succeeded: report.is_success(),
            gas_used,
            cumulative_gas_used: 0,
            block_number: env.block_number,
            transaction_index: 0,
            from: sender,
            to: transaction.to,
            contract_address: report.created_address,
            logs: report.logs,
        };

        Ok(ProcessedTransaction { receipt, gas_used })
    }

    /// Executes every transaction of `block` against the current state and
    /// checks the header commitments before committing. On any mismatch the
    /// state is rolled back and nothing is retained.
    pub fn execute_block(
        &self,
        state: &mut StateManager,
        block: &Block,
        block_hashes: HashMap<u64, H256>,
    ) -> Result<BlockExecutionResult, ChainError> {
        let header = &block.header;

        if header.gas_used > header.gas_limit {
            return Err(InvalidBlockError::GasOverLimit.into());
        }
        if block.compute_transactions_root() != header.transactions_root {
            return Err(InvalidBlockError::BadTransactionsRoot.into());
        }

        let block_snapshot = state.snapshot();
        let mut receipts = Vec::with_capacity(block.transactions.len());
        let mut cumulative_gas = 0u64;

        for (index, transaction) in block.transactions.iter().enumerate() {
            let env = self.environment_for(header, transaction, block_hashes.clone());
            let mut processed = match self.process_transaction(state, &env, transaction) {
                Ok(processed) => processed,
                Err(err) => {
                    warn!(index, %err, "block carries an unprocessable transaction");
                    state.revert(&block_snapshot)?;
                    return Err(err);
                }
            };
            cumulative_gas += processed.gas_used;
            processed.receipt.cumulative_gas_used = cumulative_gas;
            processed.receipt.transaction_index = index as u64;
            receipts.push(processed.receipt);
        }

        let receipts_root = receipts_root(&receipts);
        let state_root = state.pending_root()?;

        if cumulative_gas != header.gas_used {
            state.revert(&block_snapshot)?;
            return Err(InvalidBlockError::GasUsedMismatch.into());
        }
        if state_root != header.state_root {
            state.revert(&block_snapshot)?;
            return Err(InvalidBlockError::BadRoot.into());
        }
        if receipts_root != header.receipts_root {
            state.revert(&block_snapshot)?;
            return Err(InvalidBlockError::BadReceiptsRoot.into());
        }

        state.commit()?;
        Ok(BlockExecutionResult {
            receipts,
            state_root,
            receipts_root,
            gas_used: cumulative_gas,
        })
    }

    /// Hashes of up to 256 ancestors ending at `parent`, for `BLOCKHASH`.
    pub fn recent_block_hashes(
        &self,
        block_store: &BlockStore,
        parent: &BlockHeader,
    ) -> Result<HashMap<u64, H256>, ChainError> {
        let mut hashes = HashMap::new();
        hashes.insert(parent.number, parent.compute_hash());
        let oldest = parent.number.saturating_sub(255);
        let mut number = parent.number;
        while number > oldest {
            number -= 1;
            match block_store.get_header(number)? {
                Some(header) => {
                    hashes.insert(number, header.compute_hash());
                }
                None => break,
            }
        }
        Ok(hashes)
    }
}

/// Merkle root over receipt hashes, duplicate-last rule.
pub fn receipts_root(receipts: &[Receipt]) -> Hash256 {
    let hashes: Vec<Hash256> = receipts.iter().map(Receipt::compute_hash).collect();
    merkle_root(&hashes)
}

/// Outcome of a transfer to a code-less account: nothing executed.
fn plain_transfer_report() -> ExecutionReport {
    ExecutionReport {
        result: ExecutionResult::Success,
        gas_used: 0,
        output: bytes::Bytes::new(),
        logs: Vec::new(),
        created_address: None,
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use tessera_common::{Address, AddressKind};
    use tessera_storage::Store;

    use super::*;

    const GWEI: u64 = 1_000_000_000;
    const TEN_NATX: u64 = 10_000_000_000_000_000_000;

    fn addr(last: u8) -> Address {
        let mut credential = [0u8; 28];
        credential[27] = last;
        Address::new(AddressKind::Enterprise, credential)
    }

    fn funded_state(accounts: &[(Address, u64)]) -> StateManager {
        let mut state = StateManager::new(Store::in_memory()).unwrap();
        for (address, balance) in accounts {
            state.add_balance(address, *balance).unwrap();
        }
        state.commit().unwrap();
        state
    }

    fn processor() -> BlockProcessor {
        BlockProcessor::new(ChainConfig {
            chain_id: 88,
            mainnet: false,
            allow_dev_signatures: true,
        })
    }

    fn transfer(from: u8, to: u8, value: u64, nonce: u64) -> Transaction {
        Transaction {
            from: addr(from),
            to: addr(to),
            value,
            nonce,
            gas_limit: 21_000,
            max_fee_per_gas: 2 * GWEI,
            max_priority_fee_per_gas: GWEI,
            ..Default::default()
        }
    }

    fn env_for(tx: &Transaction, processor: &BlockProcessor) -> Environment {
        let header = BlockHeader {
            number: 1,
            sequencer: addr(9),
            base_fee: GWEI,
            ..Default::default()
        };
        processor.environment_for(&header, tx, HashMap::new())
    }

    #[test]
    fn intrinsic_gas_counts_bytes() {
        let mut tx = transfer(1, 2, 0, 0);
        assert_eq!(intrinsic_gas(&tx), TX_GAS_COST);

        tx.data = Bytes::from_static(&[0, 1, 1, 0, 1, 1]);
        assert_eq!(
            intrinsic_gas(&tx),
            TX_GAS_COST + 2 * TX_DATA_ZERO_GAS_COST + 4 * TX_DATA_NON_ZERO_GAS_COST
        );

        tx.to = Address::ZERO;
        assert_eq!(
            intrinsic_gas(&tx),
            TX_GAS_COST + TX_CREATE_GAS_COST + 2 * TX_DATA_ZERO_GAS_COST
                + 4 * TX_DATA_NON_ZERO_GAS_COST
        );
    }

    #[test]
    fn simple_transfer_settles_balances() {
        let alice = addr(1);
        let bob = addr(2);
        let sequencer = addr(9);
        let mut state = funded_state(&[(alice, TEN_NATX), (bob, TEN_NATX)]);
        let processor = processor();

        let tx = transfer(1, 2, GWEI, 0);
        let env = env_for(&tx, &processor);
        let processed = processor.process_transaction(&mut state, &env, &tx).unwrap();

        // effective price = min(2 gwei, 1 gwei base + 1 gwei tip) = 2 gwei.
        let effective = 2 * GWEI;
        assert!(processed.receipt.succeeded);
        assert_eq!(processed.gas_used, 21_000);
        assert_eq!(state.get_balance(&bob).unwrap(), TEN_NATX + GWEI);
        assert_eq!(
            state.get_balance(&alice).unwrap(),
            TEN_NATX - GWEI - 21_000 * effective
        );
        assert_eq!(state.get_balance(&sequencer).unwrap(), 21_000 * effective);
        assert_eq!(state.get_nonce(&alice).unwrap(), 1);
    }

    #[test]
    fn transfers_conserve_total_value() {
        let alice = addr(1);
        let bob = addr(2);
        let sequencer = addr(9);
        let mut state = funded_state(&[(alice, TEN_NATX), (bob, TEN_NATX)]);
        let processor = processor();

        for (nonce, value) in [(0, GWEI), (1, 3 * GWEI)] {
            let tx = transfer(1, 2, value, nonce);
            let env = env_for(&tx, &processor);
            processor.process_transaction(&mut state, &env, &tx).unwrap();
        }

        let total = state.get_balance(&alice).unwrap()
            + state.get_balance(&bob).unwrap()
            + state.get_balance(&sequencer).unwrap();
        assert_eq!(total, 2 * TEN_NATX);
    }

    #[test]
    fn validation_rejects_in_a_fixed_order() {
        let alice = addr(1);
        let mut state = funded_state(&[(alice, TEN_NATX)]);
        state.increment_nonce(&alice).unwrap();
        state.commit().unwrap();
        let processor = processor();

        let stale = transfer(1, 2, 0, 0);
        assert!(matches!(
            processor.validate_transaction(&state, &stale, GWEI),
            Err(ChainError::InvalidTransaction(TxValidationError::BadNonce { expected: 1, got: 0 }))
        ));

        let mut broke = transfer(1, 2, TEN_NATX, 1);
        assert!(matches!(
            processor.validate_transaction(&state, &broke, GWEI),
            Err(ChainError::InvalidTransaction(TxValidationError::InsufficientBalance))
        ));

        broke.value = 0;
        broke.gas_limit = 20_000;
        assert!(matches!(
            processor.validate_transaction(&state, &broke, GWEI),
            Err(ChainError::InvalidTransaction(TxValidationError::GasBelowIntrinsic))
        ));

        broke.gas_limit = 21_000;
        broke.max_fee_per_gas = GWEI / 2;
        assert!(matches!(
            processor.validate_transaction(&state, &broke, GWEI),
            Err(ChainError::InvalidTransaction(TxValidationError::FeeBelowBase))
        ));
    }

    #[test]
    fn contract_deploy_and_storage_write() {
        let alice = addr(1);
        let mut state = funded_state(&[(alice, TEN_NATX)]);
        let processor = processor();

        // Store 5 at slot 0, return empty runtime.
        let init = [0x60, 0x05, 0x60, 0x00, 0x55, 0x60, 0x00, 0x60, 0x00, 0xF3];
        let tx = Transaction {
            from: alice,
            to: Address::ZERO,
            value: 0,
            nonce: 0,
            data: Bytes::copy_from_slice(&init),
            gas_limit: 200_000,
            max_fee_per_gas: 2 * GWEI,
            max_priority_fee_per_gas: GWEI,
            ..Default::default()
        };
        let env = env_for(&tx, &processor);
        let processed = processor.process_transaction(&mut state, &env, &tx).unwrap();

        assert!(processed.receipt.succeeded);
        let contract = processed.receipt.contract_address.expect("contract address");
        assert_eq!(
            state.get_storage(&contract, &H256::from_low_u64_be(0)).unwrap(),
            H256::from_low_u64_be(5)
        );
        assert_eq!(state.get_nonce(&alice).unwrap(), 1);
    }

    #[test]
    fn failed_execution_keeps_fee_accounting() {
        let alice = addr(1);
        let contract = addr(0xC0);
        let mut state = funded_state(&[(alice, TEN_NATX)]);
        // Contract that always reverts.
        state
            .set_code(&contract, &[0x60, 0x00, 0x60, 0x00, 0xFD])
            .unwrap();
        state.commit().unwrap();
        let processor = processor();

        let tx = Transaction {
            from: alice,
            to: contract,
            value: 5 * GWEI,
            nonce: 0,
            gas_limit: 50_000,
            max_fee_per_gas: 2 * GWEI,
            max_priority_fee_per_gas: GWEI,
            ..Default::default()
        };
        let env = env_for(&tx, &processor);
        let processed = processor.process_transaction(&mut state, &env, &tx).unwrap();

        assert!(!processed.receipt.succeeded);
        // Value transfer rolled back, nonce and gas payment stand.
        assert_eq!(state.get_balance(&contract).unwrap(), 0);
        assert_eq!(state.get_nonce(&alice).unwrap(), 1);
        let effective = 2 * GWEI;
        assert_eq!(
            state.get_balance(&alice).unwrap(),
            TEN_NATX - processed.gas_used * effective
        );
    }

    #[test]
    fn block_execution_is_all_or_nothing() {
        let alice = addr(1);
        let mut state = funded_state(&[(alice, TEN_NATX)]);
        let root_before = state.state_root();
        let processor = processor();

        let tx = transfer(1, 2, GWEI, 0);
        let mut block = Block::new(
            BlockHeader {
                number: 1,
                sequencer: addr(9),
                base_fee: GWEI,
                gas_used: 21_000,
                // Wrong state root: the block must be rejected wholesale.
                state_root: H256::repeat_byte(0xEE),
                ..Default::default()
            },
            vec![tx],
        );
        block.header.transactions_root = block.compute_transactions_root();

        let err = processor
            .execute_block(&mut state, &block, HashMap::new())
            .unwrap_err();
        assert!(matches!(
            err,
            ChainError::InvalidBlock(InvalidBlockError::BadRoot)
        ));
        // No state change retained.
        assert_eq!(state.pending_root().unwrap(), root_before);
        assert_eq!(state.get_nonce(&alice).unwrap(), 0);
    }

    #[test]
    fn block_execution_commits_when_roots_match() {
        let alice = addr(1);
        let bob = addr(2);
        let processor = processor();

        // Dry-run on a scratch state to learn the correct roots.
        let mut scratch = funded_state(&[(alice, TEN_NATX), (bob, TEN_NATX)]);
        let tx = transfer(1, 2, GWEI, 0);
        let header = BlockHeader {
            number: 1,
            sequencer: addr(9),
            base_fee: GWEI,
            ..Default::default()
        };
        let env = processor.environment_for(&header, &tx, HashMap::new());
        let mut processed = processor
            .process_transaction(&mut scratch, &env, &tx)
            .unwrap();
        processed.receipt.cumulative_gas_used = processed.gas_used;
        let expected_state_root = scratch.pending_root().unwrap();
        let expected_receipts_root = receipts_root(&[processed.receipt.clone()]);

        let mut block = Block::new(
            BlockHeader {
                number: 1,
                sequencer: addr(9),
                base_fee: GWEI,
                gas_used: processed.gas_used,
                state_root: expected_state_root,
                receipts_root: expected_receipts_root,
                ..Default::default()
            },
            vec![tx],
        );
        block.header.transactions_root = block.compute_transactions_root();

        let mut state = funded_state(&[(alice, TEN_NATX), (bob, TEN_NATX)]);
        let result = processor
            .execute_block(&mut state, &block, HashMap::new())
            .unwrap();

        assert_eq!(result.gas_used, 21_000);
        assert_eq!(result.state_root, expected_state_root);
        assert_eq!(state.state_root(), expected_state_root);
        assert_eq!(state.get_balance(&bob).unwrap(), TEN_NATX + GWEI);
    }

    #[test]
    fn nonces_increase_by_tx_count_after_a_block() {
        let alice = addr(1);
        let bob = addr(2);
        let processor = processor();
        let mut state = funded_state(&[(alice, TEN_NATX), (bob, TEN_NATX)]);

        let header = BlockHeader {
            number: 1,
            sequencer: addr(9),
            base_fee: GWEI,
            ..Default::default()
        };
        for tx in [transfer(1, 2, 1, 0), transfer(1, 2, 1, 1), transfer(2, 1, 1, 0)] {
            let env = processor.environment_for(&header, &tx, HashMap::new());
            processor.process_transaction(&mut state, &env, &tx).unwrap();
        }

        assert_eq!(state.get_nonce(&alice).unwrap(), 2);
        assert_eq!(state.get_nonce(&bob).unwrap(), 1);
    }
}
