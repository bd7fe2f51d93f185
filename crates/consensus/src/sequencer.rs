use bytes::Bytes;

use tessera_common::Address;
use tessera_crypto::signature::PublicKeyBytes;

/// Where a sequencer sits in the rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SequencerStatus {
    /// In the active set, producing blocks.
    Active,
    /// Registered and eligible, waiting for rotation.
    #[default]
    Standby,
    /// Removed for misbehavior.
    Slashed,
    /// Voluntary exit, serving the unbonding window.
    Exiting,
}

/// One registered sequencer.
#[derive(Debug, Clone)]
pub struct Sequencer {
    pub address: Address,
    pub public_key: PublicKeyBytes,
    /// Bonded stake backing this sequencer's slots.
    pub stake: u64,
    pub status: SequencerStatus,
    pub last_block_produced: u64,
    pub blocks_produced: u64,
    pub missed_slots: u64,
    /// Wall-clock seconds at which the exit was requested.
    pub exited_at: Option<u64>,
}

impl Sequencer {
    pub fn new(address: Address, public_key: PublicKeyBytes, stake: u64) -> Self {
        Self {
            address,
            public_key,
            stake,
            status: SequencerStatus::Standby,
            last_block_produced: 0,
            blocks_produced: 0,
            missed_slots: 0,
            exited_at: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlashingType {
    /// Two signed blocks at the same height.
    DoubleSign,
    /// Produced an invalid state transition.
    InvalidBlock,
    /// Missed too many slots.
    Unavailability,
    /// Failed to publish batch data.
    DataWithholding,
}

/// Evidence queued against a sequencer; applied at the epoch boundary.
#[derive(Debug, Clone)]
pub struct SlashingEvidence {
    pub kind: SlashingType,
    pub sequencer: Address,
    pub block_number: u64,
    pub data: Bytes,
    pub amount: u64,
}
