//! Core protocol types: addresses, transactions, blocks, receipts, account
//! records, settlement batches, chain configuration and genesis.

pub mod clock;
pub mod constants;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};

pub use ethereum_types::{H256, U256, U512};

pub use types::account::AccountState;
pub use types::address::{Address, AddressError, AddressKind, PAYMENT_CREDENTIAL_SIZE};
pub use types::batch::{BatchStatus, SettlementBatch};
pub use types::block::{Block, BlockHeader};
pub use types::genesis::{ChainConfig, Genesis, GenesisAccount, GenesisSequencer};
pub use types::receipt::{Log, Receipt};
pub use types::transaction::Transaction;
