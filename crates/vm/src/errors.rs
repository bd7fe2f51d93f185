use bytes::Bytes;
use thiserror::Error;

use tessera_common::{Address, Log};
use tessera_storage::StoreError;

/// Reasons a frame halts exceptionally, consuming all of its gas.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum HaltReason {
    #[error("out of gas")]
    OutOfGas,
    #[error("invalid opcode {0:#04x}")]
    InvalidOpcode(u8),
    #[error("stack underflow")]
    StackUnderflow,
    #[error("stack overflow")]
    StackOverflow,
    #[error("jump to an invalid destination")]
    BadJump,
    #[error("state mutation inside a static frame")]
    StaticViolation,
}

/// Bugs and environment failures, never caused by guest code alone.
#[derive(Debug, Error)]
pub enum InternalError {
    #[error("no active call frame")]
    EmptyFrameStack,
    #[error("arithmetic overflow in gas accounting")]
    GasOverflow,
}

#[derive(Debug, Error)]
pub enum VmError {
    /// Exceptional halt of the active frame.
    #[error("{0}")]
    Halt(#[from] HaltReason),
    #[error("store: {0}")]
    Store(#[from] StoreError),
    #[error("internal: {0}")]
    Internal(#[from] InternalError),
}

/// How a frame (or the whole execution) ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionResult {
    Success,
    /// Explicit `REVERT`; unused gas is returned.
    Revert,
    /// Exceptional halt; all frame gas is consumed.
    Halted(HaltReason),
}

impl ExecutionResult {
    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionResult::Success)
    }
}

/// Outcome of executing a top-level call or create.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    pub result: ExecutionResult,
    /// Gas consumed by the frame tree (the full limit on exceptional halts).
    pub gas_used: u64,
    pub output: Bytes,
    pub logs: Vec<Log>,
    /// Address of the deployed contract for successful creates.
    pub created_address: Option<Address>,
}

impl ExecutionReport {
    pub fn is_success(&self) -> bool {
        self.result.is_success()
    }
}
