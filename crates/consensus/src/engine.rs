//! The consensus engine: registry, active-set maintenance, stake-weighted
//! modular leader selection, block acceptance and slashing.

use std::sync::RwLock;

use tracing::{info, warn};

use tessera_common::{Address, Block};
use tessera_crypto::hash::Hash256;

use crate::error::ConsensusError;
use crate::sequencer::{Sequencer, SequencerStatus, SlashingEvidence};

#[derive(Debug, Clone)]
pub struct ConsensusConfig {
    pub block_time_ms: u64,
    pub blocks_per_epoch: u64,
    /// Active-set size cap.
    pub max_sequencers: u32,
    pub min_stake: u64,
    /// Seconds an exiting sequencer stays bonded.
    pub unbonding_period_seconds: u64,
}

impl Default for ConsensusConfig {
    fn default() -> Self {
        Self {
            block_time_ms: 1_000,
            blocks_per_epoch: 86_400,
            max_sequencers: 21,
            min_stake: 100_000,
            unbonding_period_seconds: 604_800,
        }
    }
}

#[derive(Debug, Default)]
struct EngineInner {
    sequencers: Vec<Sequencer>,
    /// Top-M by stake among eligible entries; the deterministic walk order
    /// for leader selection.
    active_set: Vec<Sequencer>,
    head: u64,
    head_hash: Hash256,
    pending_slashings: Vec<SlashingEvidence>,
}

#[derive(Debug)]
pub struct ConsensusEngine {
    config: ConsensusConfig,
    inner: RwLock<EngineInner>,
}

impl ConsensusEngine {
    pub fn new(config: ConsensusConfig) -> Self {
        Self {
            config,
            inner: RwLock::new(EngineInner::default()),
        }
    }

    pub fn config(&self) -> &ConsensusConfig {
        &self.config
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, EngineInner> {
        self.inner.read().unwrap_or_else(|err| err.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, EngineInner> {
        self.inner.write().unwrap_or_else(|err| err.into_inner())
    }

    /// Registers (or re-registers) a sequencer. Stake must clear the
    /// configured minimum.
    pub fn register_sequencer(&self, sequencer: Sequencer) -> Result<(), ConsensusError> {
        if sequencer.stake < self.config.min_stake {
            return Err(ConsensusError::StakeBelowMinimum);
        }
        let mut inner = self.write();
        match inner
            .sequencers
            .iter()
            .position(|existing| existing.address == sequencer.address)
        {
            Some(index) => inner.sequencers[index] = sequencer,
            None => {
                info!(address = %sequencer.address, stake = sequencer.stake, "sequencer registered");
                inner.sequencers.push(sequencer);
            }
        }
        update_active_set(&mut inner, &self.config);
        Ok(())
    }

    /// Begins a voluntary exit; the sequencer leaves the active set now and
    /// the registry once the unbonding window elapses.
    pub fn unregister_sequencer(&self, address: &Address, now: u64) -> Result<(), ConsensusError> {
        let mut inner = self.write();
        let sequencer = inner
            .sequencers
            .iter_mut()
            .find(|existing| existing.address == *address)
            .ok_or(ConsensusError::UnknownSequencer)?;
        sequencer.status = SequencerStatus::Exiting;
        sequencer.exited_at = Some(now);
        update_active_set(&mut inner, &self.config);
        Ok(())
    }

    pub fn update_stake(&self, address: &Address, new_stake: u64) -> Result<(), ConsensusError> {
        let mut inner = self.write();
        let sequencer = inner
            .sequencers
            .iter_mut()
            .find(|existing| existing.address == *address)
            .ok_or(ConsensusError::UnknownSequencer)?;
        sequencer.stake = new_stake;
        update_active_set(&mut inner, &self.config);
        Ok(())
    }

    pub fn active_sequencers(&self) -> Vec<Sequencer> {
        self.read().active_set.clone()
    }

    /// Leader for `slot` by stake-weighted modular selection: each member
    /// owns a contiguous band of residues proportional to its stake.
    pub fn leader_for_slot(&self, slot: u64) -> Option<Address> {
        let inner = self.read();
        leader_of(&inner.active_set, slot)
    }

    pub fn is_leader(&self, slot: u64, address: &Address) -> bool {
        self.leader_for_slot(slot)
            .map(|leader| leader == *address)
            .unwrap_or(false)
    }

    /// Next slot after `current_slot` at which `address` leads, within a
    /// bounded search horizon.
    pub fn next_slot_for(&self, address: &Address, current_slot: u64) -> Option<u64> {
        let inner = self.read();
        let total: u64 = inner.active_set.iter().map(|s| s.stake).sum();
        let horizon = total.max(1);
        (current_slot + 1..=current_slot + horizon)
            .find(|slot| leader_of(&inner.active_set, *slot) == Some(*address))
    }

    pub fn head(&self) -> u64 {
        self.read().head
    }

    pub fn head_hash(&self) -> Hash256 {
        self.read().head_hash
    }

    /// Anchors the chain head, used at genesis and on startup.
    pub fn set_head(&self, number: u64, hash: Hash256) {
        let mut inner = self.write();
        inner.head = number;
        inner.head_hash = hash;
    }

    /// The acceptance checks: height, ancestry, slot leadership, transaction
    /// commitment, gas bound.
    pub fn validate_block(&self, block: &Block) -> Result<(), ConsensusError> {
        let inner = self.read();
        let header = &block.header;

        if header.number != inner.head + 1 {
            return Err(ConsensusError::BadNumber);
        }
        if header.parent_hash != inner.head_hash {
            return Err(ConsensusError::BadParent);
        }
        // Block number doubles as the slot index.
        match leader_of(&inner.active_set, header.number) {
            Some(leader) if leader == header.sequencer => {}
            Some(_) => return Err(ConsensusError::BadSequencer),
            None => return Err(ConsensusError::EmptyActiveSet),
        }
        if block.compute_transactions_root() != header.transactions_root {
            return Err(ConsensusError::BadTransactionsRoot);
        }
        if header.gas_used > header.gas_limit {
            return Err(ConsensusError::GasOverLimit);
        }
        Ok(())
    }

    /// Validates and accepts a block, advancing the head atomically.
    pub fn accept_block(&self, block: &Block) -> Result<(), ConsensusError> {
        self.validate_block(block)?;
        let mut inner = self.write();
        let inner = &mut *inner;
        inner.head = block.header.number;
        inner.head_hash = block.hash();
        let producer = block.header.sequencer;
        for sequencer in inner
            .sequencers
            .iter_mut()
            .chain(inner.active_set.iter_mut())
        {
            if sequencer.address == producer {
                sequencer.blocks_produced += 1;
                sequencer.last_block_produced = block.header.number;
            }
        }
        Ok(())
    }

    /// Queues evidence and pushes the subject out of the rotation; the stake
    /// penalty lands at the epoch boundary.
    pub fn report_misbehavior(&self, evidence: SlashingEvidence) {
        let mut inner = self.write();
        warn!(
            sequencer = %evidence.sequencer,
            kind = ?evidence.kind,
            amount = evidence.amount,
            "slashing evidence queued"
        );
        if let Some(sequencer) = inner
            .sequencers
            .iter_mut()
            .find(|existing| existing.address == evidence.sequencer)
        {
            sequencer.status = SequencerStatus::Slashed;
        }
        inner.pending_slashings.push(evidence);
        update_active_set(&mut inner, &self.config);
    }

    pub fn pending_slashings(&self) -> Vec<SlashingEvidence> {
        self.read().pending_slashings.clone()
    }

    pub fn current_epoch(&self) -> u64 {
        self.read().head / self.config.blocks_per_epoch
    }

    /// Epoch boundary: apply queued slashes (saturating), drop exiting
    /// sequencers past their unbonding window, recompute the active set.
    pub fn on_epoch_end(&self, now: u64) {
        let mut inner = self.write();

        let slashes = std::mem::take(&mut inner.pending_slashings);
        for slash in &slashes {
            if let Some(sequencer) = inner
                .sequencers
                .iter_mut()
                .find(|existing| existing.address == slash.sequencer)
            {
                sequencer.stake = sequencer.stake.saturating_sub(slash.amount);
            }
        }

        let unbonding = self.config.unbonding_period_seconds;
        inner.sequencers.retain(|sequencer| {
            let expired = sequencer.status == SequencerStatus::Exiting
                && sequencer
                    .exited_at
                    .map(|exited_at| now.saturating_sub(exited_at) >= unbonding)
                    .unwrap_or(true);
            !expired
        });

        update_active_set(&mut inner, &self.config);
    }
}

/// Top-M by stake among `{Active, Standby}` entries clearing the minimum,
/// ordered stake-descending with the address as tie break.
fn update_active_set(inner: &mut EngineInner, config: &ConsensusConfig) {
    let mut eligible: Vec<Sequencer> = inner
        .sequencers
        .iter()
        .filter(|sequencer| {
            matches!(
                sequencer.status,
                SequencerStatus::Active | SequencerStatus::Standby
            ) && sequencer.stake >= config.min_stake
        })
        .cloned()
        .collect();

    eligible.sort_by(|a, b| {
        b.stake
            .cmp(&a.stake)
            .then_with(|| a.address.cmp(&b.address))
    });
    eligible.truncate(config.max_sequencers as usize);
    for sequencer in &mut eligible {
        sequencer.status = SequencerStatus::Active;
    }
    inner.active_set = eligible;
}

/// Walk the set accumulating stake; the first member whose running total
/// strictly exceeds `slot mod total` owns the slot.
fn leader_of(active_set: &[Sequencer], slot: u64) -> Option<Address> {
    if active_set.is_empty() {
        return None;
    }
    let total: u64 = active_set.iter().map(|sequencer| sequencer.stake).sum();
    let residue = slot % total.max(1);

    let mut cumulative = 0u64;
    for sequencer in active_set {
        cumulative += sequencer.stake;
        if cumulative > residue {
            return Some(sequencer.address);
        }
    }
    active_set.first().map(|sequencer| sequencer.address)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use tessera_common::{AddressKind, Block, BlockHeader};

    use super::*;
    use crate::sequencer::SlashingType;

    fn addr(last: u8) -> Address {
        let mut credential = [0u8; 28];
        credential[27] = last;
        Address::new(AddressKind::Enterprise, credential)
    }

    fn config() -> ConsensusConfig {
        ConsensusConfig {
            min_stake: 100,
            max_sequencers: 21,
            blocks_per_epoch: 100,
            unbonding_period_seconds: 1_000,
            ..Default::default()
        }
    }

    fn engine_with_stakes(stakes: &[(u8, u64)]) -> ConsensusEngine {
        let engine = ConsensusEngine::new(config());
        for (last, stake) in stakes {
            engine
                .register_sequencer(Sequencer::new(addr(*last), [*last; 32], *stake))
                .unwrap();
        }
        engine
    }

    #[test]
    fn registration_enforces_minimum_stake() {
        let engine = ConsensusEngine::new(config());
        let poor = Sequencer::new(addr(1), [1; 32], 99);
        assert_eq!(
            engine.register_sequencer(poor),
            Err(ConsensusError::StakeBelowMinimum)
        );
        assert!(engine.active_sequencers().is_empty());
    }

    #[test]
    fn leader_shares_are_exactly_stake_proportional() {
        let engine = engine_with_stakes(&[(1, 100), (2, 200), (3, 300)]);

        let mut counts: HashMap<Address, u64> = HashMap::new();
        for slot in 0..600 {
            let leader = engine.leader_for_slot(slot).unwrap();
            *counts.entry(leader).or_default() += 1;
        }
        assert_eq!(counts[&addr(1)], 100);
        assert_eq!(counts[&addr(2)], 200);
        assert_eq!(counts[&addr(3)], 300);
    }

    #[test]
    fn leader_selection_is_deterministic() {
        let a = engine_with_stakes(&[(1, 100), (2, 200), (3, 300)]);
        let b = engine_with_stakes(&[(3, 300), (1, 100), (2, 200)]);
        for slot in 0..100 {
            assert_eq!(a.leader_for_slot(slot), b.leader_for_slot(slot));
        }
    }

    #[test]
    fn active_set_caps_at_top_m_by_stake() {
        let mut config = config();
        config.max_sequencers = 2;
        let engine = ConsensusEngine::new(config);
        for (last, stake) in [(1u8, 100u64), (2, 500), (3, 300)] {
            engine
                .register_sequencer(Sequencer::new(addr(last), [last; 32], stake))
                .unwrap();
        }
        let active = engine.active_sequencers();
        assert_eq!(active.len(), 2);
        assert_eq!(active[0].address, addr(2));
        assert_eq!(active[1].address, addr(3));
    }

    fn block_at(number: u64, parent_hash: Hash256, sequencer: Address) -> Block {
        let mut block = Block::new(
            BlockHeader {
                number,
                parent_hash,
                sequencer,
                ..Default::default()
            },
            Vec::new(),
        );
        block.header.transactions_root = block.compute_transactions_root();
        block
    }

    #[test]
    fn block_acceptance_advances_the_head() {
        let engine = engine_with_stakes(&[(1, 100)]);
        engine.set_head(0, Hash256::repeat_byte(0xAB));

        let block = block_at(1, Hash256::repeat_byte(0xAB), addr(1));
        engine.accept_block(&block).unwrap();
        assert_eq!(engine.head(), 1);
        assert_eq!(engine.head_hash(), block.hash());
        assert_eq!(engine.active_sequencers()[0].blocks_produced, 1);
    }

    #[test]
    fn validation_rejects_wrong_height_parent_and_producer() {
        let engine = engine_with_stakes(&[(1, 100)]);
        engine.set_head(0, Hash256::repeat_byte(0xAB));

        let skipped = block_at(2, Hash256::repeat_byte(0xAB), addr(1));
        assert_eq!(
            engine.validate_block(&skipped),
            Err(ConsensusError::BadNumber)
        );

        let orphan = block_at(1, Hash256::repeat_byte(0xCD), addr(1));
        assert_eq!(
            engine.validate_block(&orphan),
            Err(ConsensusError::BadParent)
        );

        let engine = engine_with_stakes(&[(1, 100), (2, 100_000)]);
        engine.set_head(0, Hash256::repeat_byte(0xAB));
        let leader = engine.leader_for_slot(1).unwrap();
        let usurper = if leader == addr(1) { addr(2) } else { addr(1) };
        let forged = block_at(1, Hash256::repeat_byte(0xAB), usurper);
        assert_eq!(
            engine.validate_block(&forged),
            Err(ConsensusError::BadSequencer)
        );
    }

    #[test]
    fn gas_over_limit_is_rejected() {
        let engine = engine_with_stakes(&[(1, 100)]);
        engine.set_head(0, Hash256::zero());
        let mut block = block_at(1, Hash256::zero(), addr(1));
        block.header.gas_used = block.header.gas_limit + 1;
        assert_eq!(
            engine.validate_block(&block),
            Err(ConsensusError::GasOverLimit)
        );
    }

    #[test]
    fn slashing_removes_from_rotation_then_burns_stake() {
        let engine = engine_with_stakes(&[(1, 1_000), (2, 500)]);
        engine.report_misbehavior(SlashingEvidence {
            kind: SlashingType::DoubleSign,
            sequencer: addr(1),
            block_number: 3,
            data: Default::default(),
            amount: 400,
        });

        // Out of the rotation immediately.
        let active = engine.active_sequencers();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].address, addr(2));
        assert_eq!(engine.pending_slashings().len(), 1);

        engine.on_epoch_end(0);
        assert!(engine.pending_slashings().is_empty());
        // Slashed entries stay out of the set even with stake remaining.
        assert_eq!(engine.active_sequencers().len(), 1);
    }

    #[test]
    fn slash_saturates_at_zero() {
        let engine = engine_with_stakes(&[(1, 300)]);
        engine.report_misbehavior(SlashingEvidence {
            kind: SlashingType::InvalidBlock,
            sequencer: addr(1),
            block_number: 1,
            data: Default::default(),
            amount: 1_000,
        });
        engine.on_epoch_end(0);
        // No panic, and nothing eligible remains.
        assert!(engine.active_sequencers().is_empty());
    }

    #[test]
    fn exiting_sequencers_leave_after_unbonding() {
        let engine = engine_with_stakes(&[(1, 1_000), (2, 500)]);
        engine.unregister_sequencer(&addr(1), 100).unwrap();
        assert_eq!(engine.active_sequencers().len(), 1);

        // Window not yet elapsed: still registered (though out of rotation).
        engine.on_epoch_end(500);
        assert!(engine.update_stake(&addr(1), 1_000).is_ok());
        assert_eq!(engine.active_sequencers().len(), 1);

        // Past the window: gone from the registry.
        engine.on_epoch_end(100 + 1_000);
        assert_eq!(
            engine.update_stake(&addr(1), 1_000),
            Err(ConsensusError::UnknownSequencer)
        );
    }

    #[test]
    fn empty_set_has_no_leader() {
        let engine = ConsensusEngine::new(config());
        assert_eq!(engine.leader_for_slot(5), None);
    }
}
