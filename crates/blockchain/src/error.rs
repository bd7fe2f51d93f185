use thiserror::Error;

use tessera_storage::StoreError;
use tessera_vm::VmError;

/// Reasons the mempool turns a transaction away.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MempoolError {
    #[error("transaction already known")]
    AlreadyKnown,
    #[error("replacement fee bump below the required 10%")]
    Underpriced,
    #[error("nonce below the account nonce")]
    NonceTooLow,
    #[error("nonce too far ahead of the account nonce")]
    NonceTooHigh,
    #[error("sender cannot cover value plus maximum gas cost")]
    InsufficientFunds,
    #[error("pool is full")]
    PoolFull,
    #[error("transaction is invalid")]
    Invalid,
}

/// Per-transaction validation failures; the offending transaction is skipped,
/// the block stays valid.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TxValidationError {
    #[error("nonce mismatch: expected {expected}, got {got}")]
    BadNonce { expected: u64, got: u64 },
    #[error("balance below value plus maximum gas cost")]
    InsufficientBalance,
    #[error("gas limit below the intrinsic cost")]
    GasBelowIntrinsic,
    #[error("max fee per gas below the block base fee")]
    FeeBelowBase,
}

/// Whole-block validation failures; the block is rejected and no state change
/// is retained.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum InvalidBlockError {
    #[error("parent hash does not match the chain head")]
    BadParent,
    #[error("post-state root does not match the header")]
    BadRoot,
    #[error("receipts root does not match the header")]
    BadReceiptsRoot,
    #[error("transactions root does not match the header")]
    BadTransactionsRoot,
    #[error("gas used exceeds the block gas limit")]
    GasOverLimit,
    #[error("gas used does not match the header")]
    GasUsedMismatch,
}

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("invalid block: {0}")]
    InvalidBlock(#[from] InvalidBlockError),
    #[error("invalid transaction: {0}")]
    InvalidTransaction(#[from] TxValidationError),
    #[error("store: {0}")]
    Store(#[from] StoreError),
    #[error("vm: {0}")]
    Vm(#[from] VmError),
    #[error("gas arithmetic overflow")]
    GasOverflow,
    #[error("parent block not found")]
    ParentNotFound,
}
