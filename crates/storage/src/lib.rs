//! Persistence: the ordered key-value store engines, the authenticated state
//! trie layered on top, the block store, and the journaled state manager.

pub mod api;
pub mod block_store;
pub mod durable;
pub mod error;
pub mod keys;
pub mod memory;
pub mod state;
pub mod store;
pub mod trie;

pub use api::{StoreEngine, WriteBatch};
pub use block_store::BlockStore;
pub use error::StoreError;
pub use state::{StateManager, StateSnapshot};
pub use store::{EngineType, Store};
pub use trie::{Trie, TrieProof};
