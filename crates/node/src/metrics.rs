//! Node metrics. One value owned by the `Node`, handed out by reference;
//! no process-wide registry.

use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

#[derive(Debug, Clone)]
pub struct Metrics {
    registry: Registry,
    pub blocks_produced: IntCounter,
    pub transactions_processed: IntCounter,
    pub batches_submitted: IntCounter,
    pub gas_used_total: IntCounter,
    pub chain_head: IntGauge,
    pub pending_transactions: IntGauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();
        let blocks_produced =
            IntCounter::new("tessera_blocks_produced_total", "Blocks produced").unwrap();
        let transactions_processed = IntCounter::new(
            "tessera_transactions_processed_total",
            "Transactions processed",
        )
        .unwrap();
        let batches_submitted =
            IntCounter::new("tessera_batches_submitted_total", "Batches submitted to L1").unwrap();
        let gas_used_total =
            IntCounter::new("tessera_gas_used_total", "Total gas consumed").unwrap();
        let chain_head = IntGauge::new("tessera_chain_head", "Current chain head").unwrap();
        let pending_transactions =
            IntGauge::new("tessera_pending_transactions", "Mempool size").unwrap();

        for collector in [
            Box::new(blocks_produced.clone()) as Box<dyn prometheus::core::Collector>,
            Box::new(transactions_processed.clone()),
            Box::new(batches_submitted.clone()),
            Box::new(gas_used_total.clone()),
            Box::new(chain_head.clone()),
            Box::new(pending_transactions.clone()),
        ] {
            registry.register(collector).unwrap();
        }

        Self {
            registry,
            blocks_produced,
            transactions_processed,
            batches_submitted,
            gas_used_total,
            chain_head,
            pending_transactions,
        }
    }

    /// Prometheus text exposition of every registered metric.
    pub fn export(&self) -> String {
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if encoder.encode(&self.registry.gather(), &mut buffer).is_err() {
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
