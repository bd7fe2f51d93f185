//! Boundary to the P2P layer. Transport and discovery are external; the core
//! only pushes blocks and transactions outward.

use tessera_common::{Block, Transaction};

pub trait PeerSink: Send + Sync {
    fn broadcast_block(&self, block: &Block);
    fn broadcast_transaction(&self, transaction: &Transaction);
}

/// Stand-alone nodes have nobody to tell.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPeerSink;

impl PeerSink for NoopPeerSink {
    fn broadcast_block(&self, _block: &Block) {}
    fn broadcast_transaction(&self, _transaction: &Transaction) {}
}
