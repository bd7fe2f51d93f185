//! The validity-proof commitment: a Merkle-digest stand-in for a ZK proof,
//! binding a batch's block range, state transition and execution trace to a
//! verification key.

use bytes::BufMut;

use tessera_codec::{DecodeError, Decoder, Encoder, WireDecode, WireEncode};
use tessera_common::{Receipt, SettlementBatch};
use tessera_crypto::hash::{hash_bytes, hash_concat, Hash256};

/// Extra hashing rounds applied on top of the seed hash.
const PROOF_HASH_ROUNDS: usize = 3;

/// Commitment carried to L1 for one settlement batch.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommitmentRecord {
    pub batch_id: u64,
    pub start_block: u64,
    pub end_block: u64,
    pub pre_state_root: Hash256,
    pub post_state_root: Hash256,
    pub transactions_root: Hash256,
    /// `[pre, H(pre || post), post]`
    pub state_proof: Vec<Hash256>,
    /// Receipt hashes of every transaction in the batch, in order.
    pub execution_trace: Vec<Hash256>,
    /// `H(batch_id || start || end || pre || post || txs_root || state_proof…)`
    pub commitment: Hash256,
    /// Iterated hash seeded by `commitment || verification_key || trace…`.
    pub proof_hash: Hash256,
    pub verification_key: Hash256,
}

impl CommitmentRecord {
    pub fn compute_commitment(&self) -> Hash256 {
        let mut data = Vec::new();
        Encoder::new(&mut data)
            .encode_field(&self.batch_id)
            .encode_field(&self.start_block)
            .encode_field(&self.end_block)
            .encode_field(&self.pre_state_root)
            .encode_field(&self.post_state_root)
            .encode_field(&self.transactions_root)
            .finish();
        for hash in &self.state_proof {
            data.extend_from_slice(hash.as_bytes());
        }
        hash_bytes(&data)
    }
}

impl WireEncode for CommitmentRecord {
    fn encode(&self, buf: &mut dyn BufMut) {
        Encoder::new(buf)
            .encode_field(&self.batch_id)
            .encode_field(&self.start_block)
            .encode_field(&self.end_block)
            .encode_field(&self.pre_state_root)
            .encode_field(&self.post_state_root)
            .encode_field(&self.transactions_root)
            .encode_field(&self.state_proof)
            .encode_field(&self.execution_trace)
            .encode_field(&self.commitment)
            .encode_field(&self.proof_hash)
            .encode_field(&self.verification_key)
            .finish();
    }
}

impl WireDecode for CommitmentRecord {
    fn decode_unfinished(buf: &[u8]) -> Result<(Self, &[u8]), DecodeError> {
        let decoder = Decoder::new(buf);
        let (batch_id, decoder) = decoder.decode_field("batch_id")?;
        let (start_block, decoder) = decoder.decode_field("start_block")?;
        let (end_block, decoder) = decoder.decode_field("end_block")?;
        let (pre_state_root, decoder) = decoder.decode_field("pre_state_root")?;
        let (post_state_root, decoder) = decoder.decode_field("post_state_root")?;
        let (transactions_root, decoder) = decoder.decode_field("transactions_root")?;
        let (state_proof, decoder) = decoder.decode_field("state_proof")?;
        let (execution_trace, decoder) = decoder.decode_field("execution_trace")?;
        let (commitment, decoder) = decoder.decode_field("commitment")?;
        let (proof_hash, decoder) = decoder.decode_field("proof_hash")?;
        let (verification_key, decoder) = decoder.decode_field("verification_key")?;
        Ok((
            CommitmentRecord {
                batch_id,
                start_block,
                end_block,
                pre_state_root,
                post_state_root,
                transactions_root,
                state_proof,
                execution_trace,
                commitment,
                proof_hash,
                verification_key,
            },
            decoder.finish_unchecked(),
        ))
    }
}

/// Generates and verifies commitment records under one verification key.
#[derive(Debug, Clone)]
pub struct CommitmentProver {
    verification_key: Hash256,
}

impl Default for CommitmentProver {
    fn default() -> Self {
        Self::new()
    }
}

impl CommitmentProver {
    pub fn new() -> Self {
        Self {
            verification_key: hash_bytes(b"tessera-commitment-vk-v1"),
        }
    }

    pub fn verification_key(&self) -> Hash256 {
        self.verification_key
    }

    /// Builds the commitment record for a batch and its receipts.
    pub fn generate(&self, batch: &SettlementBatch, receipts: &[Receipt]) -> CommitmentRecord {
        let execution_trace: Vec<Hash256> =
            receipts.iter().map(Receipt::compute_hash).collect();

        let mut record = CommitmentRecord {
            batch_id: batch.batch_id,
            start_block: batch.start_block,
            end_block: batch.end_block,
            pre_state_root: batch.pre_state_root,
            post_state_root: batch.post_state_root,
            transactions_root: batch.transactions_root,
            state_proof: vec![
                batch.pre_state_root,
                hash_concat([
                    batch.pre_state_root.as_bytes(),
                    batch.post_state_root.as_bytes(),
                ]),
                batch.post_state_root,
            ],
            execution_trace,
            verification_key: self.verification_key,
            ..Default::default()
        };
        record.commitment = record.compute_commitment();
        record.proof_hash = self.proof_hash(&record.commitment, &record.execution_trace);
        record
    }

    /// Recomputes every binding and compares.
    pub fn verify(&self, record: &CommitmentRecord) -> bool {
        if record.verification_key != self.verification_key {
            return false;
        }
        if record.compute_commitment() != record.commitment {
            return false;
        }
        if self.proof_hash(&record.commitment, &record.execution_trace) != record.proof_hash {
            return false;
        }
        // The state-proof path must tie the roots together.
        let expected_link = hash_concat([
            record.pre_state_root.as_bytes(),
            record.post_state_root.as_bytes(),
        ]);
        record.state_proof.len() == 3
            && record.state_proof[0] == record.pre_state_root
            && record.state_proof[1] == expected_link
            && record.state_proof[2] == record.post_state_root
    }

    /// Compact payload submitted to L1.
    pub fn l1_payload(&self, record: &CommitmentRecord) -> Vec<u8> {
        let mut payload = Vec::with_capacity(4 * 32);
        payload.extend_from_slice(record.commitment.as_bytes());
        payload.extend_from_slice(record.proof_hash.as_bytes());
        payload.extend_from_slice(record.pre_state_root.as_bytes());
        payload.extend_from_slice(record.post_state_root.as_bytes());
        payload
    }

    /// Four hash rounds: the seed over `commitment || vk || trace`, then
    /// three foldings back over the commitment.
    fn proof_hash(&self, commitment: &Hash256, trace: &[Hash256]) -> Hash256 {
        let mut seed = Vec::with_capacity(64 + trace.len() * 32);
        seed.extend_from_slice(commitment.as_bytes());
        seed.extend_from_slice(self.verification_key.as_bytes());
        for hash in trace {
            seed.extend_from_slice(hash.as_bytes());
        }

        let mut digest = hash_bytes(&seed);
        for _ in 0..PROOF_HASH_ROUNDS {
            digest = hash_concat([digest.as_bytes(), commitment.as_bytes()]);
        }
        digest
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;

    use tessera_common::BatchStatus;

    use super::*;

    fn batch() -> SettlementBatch {
        SettlementBatch {
            batch_id: 3,
            start_block: 10,
            end_block: 14,
            pre_state_root: hash_bytes(b"pre"),
            post_state_root: hash_bytes(b"post"),
            transactions_root: hash_bytes(b"txs"),
            compressed_data: Bytes::from_static(b"data"),
            state_proof: Vec::new(),
            status: BatchStatus::Pending,
            l1_tx_id: None,
            submitted_at: 0,
        }
    }

    fn receipts() -> Vec<Receipt> {
        (0..4)
            .map(|i| Receipt {
                transaction_hash: hash_bytes(&[i]),
                succeeded: true,
                gas_used: 21_000,
                ..Default::default()
            })
            .collect()
    }

    #[test]
    fn generated_records_verify() {
        let prover = CommitmentProver::new();
        let record = prover.generate(&batch(), &receipts());
        assert!(prover.verify(&record));
        assert_eq!(record.execution_trace.len(), 4);
    }

    #[test]
    fn any_field_mutation_breaks_verification() {
        let prover = CommitmentProver::new();
        let record = prover.generate(&batch(), &receipts());

        let mut tampered = record.clone();
        tampered.end_block += 1;
        assert!(!prover.verify(&tampered));

        let mut tampered = record.clone();
        tampered.post_state_root = hash_bytes(b"forged");
        assert!(!prover.verify(&tampered));

        let mut tampered = record.clone();
        tampered.execution_trace.push(hash_bytes(b"extra"));
        assert!(!prover.verify(&tampered));

        let mut tampered = record.clone();
        tampered.commitment = hash_bytes(b"zero");
        assert!(!prover.verify(&tampered));

        let mut tampered = record.clone();
        tampered.proof_hash = hash_bytes(b"zero");
        assert!(!prover.verify(&tampered));

        let mut tampered = record.clone();
        tampered.verification_key = hash_bytes(b"other vk");
        assert!(!prover.verify(&tampered));

        let mut tampered = record.clone();
        tampered.state_proof[1] = hash_bytes(b"cut link");
        assert!(!prover.verify(&tampered));
    }

    #[test]
    fn record_round_trips_on_the_wire() {
        let prover = CommitmentProver::new();
        let record = prover.generate(&batch(), &receipts());
        let encoded = record.encode_to_vec();
        let decoded = CommitmentRecord::decode(&encoded).unwrap();
        assert_eq!(decoded, record);
        assert!(prover.verify(&decoded));
    }

    #[test]
    fn proof_hash_depends_on_the_trace() {
        let prover = CommitmentProver::new();
        let with_trace = prover.generate(&batch(), &receipts());
        let without_trace = prover.generate(&batch(), &[]);
        assert_ne!(with_trace.proof_hash, without_trace.proof_hash);
    }

    #[test]
    fn l1_payload_is_the_compact_quadruple() {
        let prover = CommitmentProver::new();
        let record = prover.generate(&batch(), &receipts());
        let payload = prover.l1_payload(&record);
        assert_eq!(payload.len(), 128);
        assert_eq!(&payload[..32], record.commitment.as_bytes());
    }
}
