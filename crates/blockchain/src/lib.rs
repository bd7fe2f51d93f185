//! The block pipeline: mempool admission and selection, transaction
//! execution, block execution with all-or-nothing application, and the
//! base-fee market.

pub mod error;
pub mod fee;
pub mod mempool;
pub mod processor;

pub use error::{ChainError, InvalidBlockError, MempoolError, TxValidationError};
pub use fee::next_base_fee;
pub use mempool::{Mempool, TxAdmitOutcome};
pub use processor::{intrinsic_gas, BlockExecutionResult, BlockProcessor, ProcessedTransaction};
