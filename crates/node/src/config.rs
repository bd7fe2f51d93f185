use std::path::PathBuf;

use tessera_blockchain::mempool::DEFAULT_POOL_CAPACITY;
use tessera_common::Genesis;
use tessera_consensus::ConsensusConfig;
use tessera_settlement::{BatchBuilderConfig, SettlementConfig};
use tessera_storage::EngineType;

/// Everything needed to bring a node up.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub data_dir: PathBuf,
    pub engine: EngineType,
    pub genesis: Genesis,
    pub consensus: ConsensusConfig,
    pub batch: BatchBuilderConfig,
    pub settlement: SettlementConfig,
    pub mempool_capacity: usize,
    /// Produce blocks when this node holds the slot.
    pub is_sequencer: bool,
    /// Ed25519 seed for the sequencer identity.
    pub sequencer_seed: Option<[u8; 32]>,
    /// Cadence of the settlement loop.
    pub settlement_poll_ms: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            engine: EngineType::InMemory,
            genesis: Genesis::default(),
            consensus: ConsensusConfig::default(),
            batch: BatchBuilderConfig::default(),
            settlement: SettlementConfig::default(),
            mempool_capacity: DEFAULT_POOL_CAPACITY,
            is_sequencer: false,
            sequencer_seed: None,
            settlement_poll_ms: 1_000,
        }
    }
}

impl NodeConfig {
    /// Development profile: in-memory store, dev genesis, aggressive
    /// batching, this node as the only sequencer.
    pub fn dev(seed: [u8; 32]) -> Self {
        Self {
            genesis: Genesis::dev(),
            batch: BatchBuilderConfig {
                max_batch_size: 10,
                max_batch_age_seconds: 30,
                min_batch_size: 1,
            },
            is_sequencer: true,
            sequencer_seed: Some(seed),
            ..Default::default()
        }
    }
}
