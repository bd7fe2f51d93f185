use thiserror::Error;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ConsensusError {
    #[error("stake below the registration minimum")]
    StakeBelowMinimum,
    #[error("sequencer is not registered")]
    UnknownSequencer,
    #[error("block number does not extend the head")]
    BadNumber,
    #[error("parent hash does not match the head")]
    BadParent,
    #[error("block was produced by the wrong sequencer for its slot")]
    BadSequencer,
    #[error("transactions root does not match the block body")]
    BadTransactionsRoot,
    #[error("gas used exceeds the block gas limit")]
    GasOverLimit,
    #[error("no active sequencers")]
    EmptyActiveSet,
}
