//! The L1 boundary. The chain client proper is an external collaborator;
//! the core only needs commitment submission and the L1 clock.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tracing::info;

use tessera_common::Clock;
use tessera_crypto::hash::hash_bytes;

use crate::error::SettlementError;

pub trait L1Client: Send + Sync {
    /// Submits a commitment payload and returns the L1 transaction id.
    fn submit_commitment(&self, payload: &[u8]) -> Result<String, SettlementError>;
    fn current_slot(&self) -> u64;
}

/// Stand-in client that records every submission to an append-only audit log
/// and derives the transaction id from the payload hash.
pub struct LogL1Client {
    log_path: PathBuf,
    clock: Arc<dyn Clock>,
}

impl LogL1Client {
    pub fn new(log_path: impl AsRef<Path>, clock: Arc<dyn Clock>) -> Self {
        Self {
            log_path: log_path.as_ref().to_path_buf(),
            clock,
        }
    }
}

impl L1Client for LogL1Client {
    fn submit_commitment(&self, payload: &[u8]) -> Result<String, SettlementError> {
        let tx_id = hex::encode(hash_bytes(payload));
        if let Some(parent) = self.log_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;
        writeln!(
            file,
            "{} SUBMIT TX_ID={} SIZE={}",
            self.clock.now(),
            tx_id,
            payload.len()
        )?;
        info!(tx_id, size = payload.len(), "commitment recorded to l1 log");
        Ok(tx_id)
    }

    fn current_slot(&self) -> u64 {
        self.clock.now()
    }
}

/// In-memory client for tests; keeps every submitted payload.
#[derive(Default)]
pub struct MemoryL1Client {
    submissions: Mutex<Vec<Vec<u8>>>,
    slot: std::sync::atomic::AtomicU64,
}

impl MemoryL1Client {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submissions(&self) -> Vec<Vec<u8>> {
        self.submissions
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .clone()
    }

    pub fn set_slot(&self, slot: u64) {
        self.slot.store(slot, std::sync::atomic::Ordering::SeqCst);
    }
}

impl L1Client for MemoryL1Client {
    fn submit_commitment(&self, payload: &[u8]) -> Result<String, SettlementError> {
        let tx_id = hex::encode(hash_bytes(payload));
        self.submissions
            .lock()
            .unwrap_or_else(|err| err.into_inner())
            .push(payload.to_vec());
        Ok(tx_id)
    }

    fn current_slot(&self) -> u64 {
        self.slot.load(std::sync::atomic::Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use tessera_common::ManualClock;

    use super::*;

    #[test]
    fn log_client_appends_and_returns_a_stable_id() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("l1_submissions.log");
        let clock = Arc::new(ManualClock::new(1_000));
        let client = LogL1Client::new(&path, clock);

        let id_a = client.submit_commitment(b"payload").unwrap();
        let id_b = client.submit_commitment(b"payload").unwrap();
        assert_eq!(id_a, id_b);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 2);
        assert!(contents.contains(&id_a));
    }

    #[test]
    fn memory_client_captures_payloads() {
        let client = MemoryL1Client::new();
        client.submit_commitment(b"abc").unwrap();
        assert_eq!(client.submissions(), vec![b"abc".to_vec()]);
    }
}
