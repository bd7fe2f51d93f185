use std::collections::HashMap;

use tessera_common::{Address, H256};

/// Block-level execution context shared by every transaction in a block.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    /// Original transaction sender.
    pub origin: Address,
    /// Block producer credited with gas payments.
    pub coinbase: Address,
    pub block_number: u64,
    pub timestamp: u64,
    pub block_gas_limit: u64,
    pub base_fee: u64,
    /// Effective gas price of the running transaction.
    pub gas_price: u64,
    pub chain_id: u64,
    pub prev_randao: H256,
    /// Hashes of recent ancestor blocks served by `BLOCKHASH`.
    pub block_hashes: HashMap<u64, H256>,
}

impl Environment {
    pub fn block_hash(&self, number: u64) -> H256 {
        self.block_hashes.get(&number).copied().unwrap_or_default()
    }
}
