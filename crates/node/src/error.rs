use thiserror::Error;

use tessera_blockchain::{ChainError, MempoolError};
use tessera_consensus::ConsensusError;
use tessera_settlement::SettlementError;
use tessera_storage::StoreError;
use tessera_vm::VmError;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("store: {0}")]
    Store(#[from] StoreError),
    #[error("chain: {0}")]
    Chain(#[from] ChainError),
    #[error("consensus: {0}")]
    Consensus(#[from] ConsensusError),
    #[error("settlement: {0}")]
    Settlement(#[from] SettlementError),
    #[error("mempool: {0}")]
    Mempool(#[from] MempoolError),
    #[error("vm: {0}")]
    Vm(#[from] VmError),
    #[error("invalid genesis: {0}")]
    InvalidGenesis(String),
    #[error("block not found")]
    BlockNotFound,
    #[error("execution failed: {0}")]
    ExecutionFailed(String),
    #[error("node is not configured as a sequencer")]
    NotASequencer,
}
