//! Settlement: aggregating accepted blocks into batches, building the
//! validity-proof commitment over each batch, and tracking finality across
//! the L1 challenge window.

pub mod batch_builder;
pub mod commitment;
pub mod error;
pub mod l1;
pub mod manager;

pub use batch_builder::{BatchBuilder, BatchBuilderConfig};
pub use commitment::{CommitmentProver, CommitmentRecord};
pub use error::SettlementError;
pub use l1::{L1Client, LogL1Client, MemoryL1Client};
pub use manager::{SettlementConfig, SettlementManager};
