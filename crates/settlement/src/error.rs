use thiserror::Error;

use tessera_codec::DecodeError;

#[derive(Debug, Error)]
pub enum SettlementError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("decode: {0}")]
    Decode(#[from] DecodeError),
    #[error("block {got} does not extend the pending batch ending at {expected}")]
    NonContiguousBlock { expected: u64, got: u64 },
    #[error("block {0} is already in the pending batch")]
    DuplicateBlock(u64),
    #[error("no blocks to batch")]
    EmptyBatch,
    #[error("l1 submission failed: {0}")]
    SubmissionFailed(String),
    #[error("unknown batch {0}")]
    UnknownBatch(u64),
}
