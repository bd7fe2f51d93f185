//! Tracks submitted batches through the challenge window to finality.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::info;

use tessera_codec::WireEncode;
use tessera_common::{BatchStatus, Clock, SettlementBatch};

use crate::commitment::{CommitmentProver, CommitmentRecord};
use crate::error::SettlementError;
use crate::l1::L1Client;

#[derive(Debug, Clone)]
pub struct SettlementConfig {
    /// Seconds a submitted batch can be disputed before it finalizes.
    pub challenge_period_seconds: u64,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            challenge_period_seconds: 604_800,
        }
    }
}

#[derive(Debug, Default)]
struct ManagerInner {
    pending: Vec<SettlementBatch>,
    finalized: Vec<SettlementBatch>,
    records: HashMap<u64, CommitmentRecord>,
}

pub struct SettlementManager {
    config: SettlementConfig,
    prover: CommitmentProver,
    l1: Arc<dyn L1Client>,
    clock: Arc<dyn Clock>,
    inner: RwLock<ManagerInner>,
}

impl SettlementManager {
    pub fn new(config: SettlementConfig, l1: Arc<dyn L1Client>, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            prover: CommitmentProver::new(),
            l1,
            clock,
            inner: RwLock::new(ManagerInner::default()),
        }
    }

    pub fn prover(&self) -> &CommitmentProver {
        &self.prover
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, ManagerInner> {
        self.inner.read().unwrap_or_else(|err| err.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, ManagerInner> {
        self.inner.write().unwrap_or_else(|err| err.into_inner())
    }

    /// Submits a batch's commitment to L1 and starts its challenge window.
    pub fn submit_batch(
        &self,
        mut batch: SettlementBatch,
        record: CommitmentRecord,
    ) -> Result<String, SettlementError> {
        let payload = record.encode_to_vec();
        let tx_id = self.l1.submit_commitment(&payload)?;

        batch.status = BatchStatus::Submitted;
        batch.l1_tx_id = Some(tx_id.clone());
        batch.submitted_at = self.clock.now();
        info!(batch_id = batch.batch_id, tx_id, "batch submitted");

        let mut inner = self.write();
        inner.records.insert(batch.batch_id, record);
        inner.pending.push(batch);
        Ok(tx_id)
    }

    /// Finalizes every submitted batch whose challenge window has elapsed;
    /// returns the newly finalized batch ids.
    pub fn check_finality(&self) -> Vec<u64> {
        let now = self.clock.now();
        let challenge = self.config.challenge_period_seconds;
        let mut finalized_ids = Vec::new();

        let mut inner = self.write();
        let inner = &mut *inner;
        let mut still_pending = Vec::with_capacity(inner.pending.len());
        for mut batch in inner.pending.drain(..) {
            let elapsed = now.saturating_sub(batch.submitted_at);
            if batch.status == BatchStatus::Submitted && elapsed > challenge {
                batch.status = BatchStatus::Finalized;
                info!(batch_id = batch.batch_id, "batch finalized");
                finalized_ids.push(batch.batch_id);
                inner.finalized.push(batch);
            } else {
                still_pending.push(batch);
            }
        }
        inner.pending = still_pending;
        finalized_ids
    }

    pub fn is_batch_finalized(&self, batch_id: u64) -> bool {
        self.read()
            .finalized
            .iter()
            .any(|batch| batch.batch_id == batch_id)
    }

    /// End block of the most recently finalized batch.
    pub fn latest_finalized_block(&self) -> u64 {
        self.read()
            .finalized
            .last()
            .map(|batch| batch.end_block)
            .unwrap_or(0)
    }

    pub fn get_batch(&self, batch_id: u64) -> Option<SettlementBatch> {
        let inner = self.read();
        inner
            .pending
            .iter()
            .chain(inner.finalized.iter())
            .find(|batch| batch.batch_id == batch_id)
            .cloned()
    }

    pub fn get_record(&self, batch_id: u64) -> Option<CommitmentRecord> {
        self.read().records.get(&batch_id).cloned()
    }

    pub fn pending_batches(&self) -> Vec<SettlementBatch> {
        self.read().pending.clone()
    }

    pub fn l1_current_slot(&self) -> u64 {
        self.l1.current_slot()
    }
}
