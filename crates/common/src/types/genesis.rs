use serde::{Deserialize, Serialize};

use tessera_crypto::hash::ZERO_HASH;

use crate::constants::{DEFAULT_BASE_FEE, DEFAULT_GAS_LIMIT};
use crate::types::address::Address;
use crate::types::block::{Block, BlockHeader};

/// Chain-wide parameters shared by every component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    pub chain_id: u64,
    /// Controls the address text-form network prefix.
    #[serde(default)]
    pub mainnet: bool,
    /// Accept all-0xFF signatures. Development only; production deployments
    /// must leave this off.
    #[serde(default)]
    pub allow_dev_signatures: bool,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            chain_id: 1,
            mainnet: false,
            allow_dev_signatures: false,
        }
    }
}

/// A pre-funded account in the genesis state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenesisAccount {
    pub address: Address,
    pub balance: u64,
}

/// A sequencer registered at genesis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenesisSequencer {
    pub address: Address,
    /// Hex-encoded Ed25519 public key.
    pub public_key: String,
    pub stake: u64,
}

/// Genesis file contents (JSON on disk).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Genesis {
    #[serde(flatten)]
    pub config: ChainConfig,
    #[serde(default)]
    pub timestamp: u64,
    #[serde(default = "default_gas_limit")]
    pub gas_limit: u64,
    #[serde(default = "default_base_fee")]
    pub base_fee: u64,
    #[serde(default)]
    pub alloc: Vec<GenesisAccount>,
    #[serde(default)]
    pub sequencers: Vec<GenesisSequencer>,
}

fn default_gas_limit() -> u64 {
    DEFAULT_GAS_LIMIT
}

fn default_base_fee() -> u64 {
    DEFAULT_BASE_FEE
}

impl Default for Genesis {
    fn default() -> Self {
        Self {
            config: ChainConfig::default(),
            timestamp: 0,
            gas_limit: DEFAULT_GAS_LIMIT,
            base_fee: DEFAULT_BASE_FEE,
            alloc: Vec::new(),
            sequencers: Vec::new(),
        }
    }
}

impl Genesis {
    /// Block zero. The state root is filled in once the allocations are
    /// applied and committed.
    pub fn to_block(&self) -> Block {
        Block::new(
            BlockHeader {
                number: 0,
                parent_hash: ZERO_HASH,
                gas_limit: self.gas_limit,
                base_fee: self.base_fee,
                timestamp: self.timestamp,
                ..Default::default()
            },
            Vec::new(),
        )
    }

    /// A development profile: four funded accounts with recognisable
    /// credentials and the signature override enabled.
    pub fn dev() -> Self {
        let mut alloc = Vec::new();
        for last in [0x01u8, 0x02, 0x03, 0xFF] {
            let mut credential = [0u8; 28];
            credential[27] = last;
            alloc.push(GenesisAccount {
                address: Address::new(Default::default(), credential),
                balance: 10_000_000_000_000_000_000,
            });
        }
        Self {
            config: ChainConfig {
                chain_id: 88,
                mainnet: false,
                allow_dev_signatures: true,
            },
            alloc,
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_round_trip() {
        let genesis = Genesis::dev();
        let json = serde_json::to_string_pretty(&genesis).unwrap();
        let back: Genesis = serde_json::from_str(&json).unwrap();
        assert_eq!(back.config.chain_id, 88);
        assert!(back.config.allow_dev_signatures);
        assert_eq!(back.alloc.len(), 4);
        assert_eq!(back.alloc[0].balance, 10_000_000_000_000_000_000);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let genesis: Genesis = serde_json::from_str(r#"{"chain_id": 7}"#).unwrap();
        assert_eq!(genesis.config.chain_id, 7);
        assert_eq!(genesis.gas_limit, DEFAULT_GAS_LIMIT);
        assert_eq!(genesis.base_fee, DEFAULT_BASE_FEE);
        assert!(!genesis.config.allow_dev_signatures);
        assert!(genesis.alloc.is_empty());
    }

    #[test]
    fn genesis_block_shape() {
        let block = Genesis::dev().to_block();
        assert_eq!(block.header.number, 0);
        assert_eq!(block.header.parent_hash, ZERO_HASH);
        assert!(block.transactions.is_empty());
    }
}
