use bytes::{BufMut, Bytes};

use tessera_codec::{DecodeError, Decoder, Encoder, WireDecode, WireEncode};
use tessera_crypto::hash::{Hash256, ZERO_HASH};

/// Lifecycle of a settlement batch on L1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchStatus {
    /// Built, awaiting submission.
    #[default]
    Pending = 0,
    /// On L1, inside the challenge window.
    Submitted = 1,
    /// Challenge window elapsed.
    Finalized = 2,
    /// Under dispute.
    Challenged = 3,
    /// Dispute upheld; batch rolled back.
    Reverted = 4,
}

impl BatchStatus {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(BatchStatus::Pending),
            1 => Some(BatchStatus::Submitted),
            2 => Some(BatchStatus::Finalized),
            3 => Some(BatchStatus::Challenged),
            4 => Some(BatchStatus::Reverted),
            _ => None,
        }
    }
}

/// A contiguous range of blocks committed to L1 as one unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementBatch {
    pub batch_id: u64,
    pub start_block: u64,
    pub end_block: u64,
    pub pre_state_root: Hash256,
    pub post_state_root: Hash256,
    /// Merkle root over the header hashes of the batched blocks.
    pub transactions_root: Hash256,
    /// Length-prefixed concatenation of the block encodings.
    pub compressed_data: Bytes,
    /// `[pre, H(pre || post), post]`
    pub state_proof: Vec<Hash256>,
    pub status: BatchStatus,
    /// L1 transaction carrying the commitment, once submitted.
    pub l1_tx_id: Option<String>,
    /// Wall-clock seconds at submission; drives the finality clock.
    pub submitted_at: u64,
}

impl Default for SettlementBatch {
    fn default() -> Self {
        Self {
            batch_id: 0,
            start_block: 0,
            end_block: 0,
            pre_state_root: ZERO_HASH,
            post_state_root: ZERO_HASH,
            transactions_root: ZERO_HASH,
            compressed_data: Bytes::new(),
            state_proof: Vec::new(),
            status: BatchStatus::Pending,
            l1_tx_id: None,
            submitted_at: 0,
        }
    }
}

impl WireEncode for SettlementBatch {
    fn encode(&self, buf: &mut dyn BufMut) {
        Encoder::new(buf)
            .encode_field(&self.batch_id)
            .encode_field(&self.start_block)
            .encode_field(&self.end_block)
            .encode_field(&self.pre_state_root)
            .encode_field(&self.post_state_root)
            .encode_field(&self.transactions_root)
            .encode_field(&self.compressed_data)
            .encode_field(&self.state_proof)
            .encode_field(&(self.status as u8))
            .encode_field(&self.submitted_at)
            .finish();
        match &self.l1_tx_id {
            Some(tx_id) => {
                buf.put_u8(1);
                tx_id.as_bytes().encode(buf);
            }
            None => buf.put_u8(0),
        }
    }
}

impl WireDecode for SettlementBatch {
    fn decode_unfinished(buf: &[u8]) -> Result<(Self, &[u8]), DecodeError> {
        let decoder = Decoder::new(buf);
        let (batch_id, decoder) = decoder.decode_field("batch_id")?;
        let (start_block, decoder) = decoder.decode_field("start_block")?;
        let (end_block, decoder) = decoder.decode_field("end_block")?;
        let (pre_state_root, decoder) = decoder.decode_field("pre_state_root")?;
        let (post_state_root, decoder) = decoder.decode_field("post_state_root")?;
        let (transactions_root, decoder) = decoder.decode_field("transactions_root")?;
        let (compressed_data, decoder) = decoder.decode_field("compressed_data")?;
        let (state_proof, decoder) = decoder.decode_field("state_proof")?;
        let (status_byte, decoder): (u8, _) = decoder.decode_field("status")?;
        let status = BatchStatus::from_u8(status_byte).ok_or_else(|| {
            DecodeError::Custom(format!("unknown batch status {status_byte}"))
        })?;
        let (submitted_at, decoder) = decoder.decode_field("submitted_at")?;
        let (has_tx_id, decoder): (u8, _) = decoder.decode_field("l1_tx_flag")?;
        let (l1_tx_id, decoder) = match has_tx_id {
            0 => (None, decoder),
            1 => {
                let (raw, decoder): (Bytes, _) = decoder.decode_field("l1_tx_id")?;
                let text = String::from_utf8(raw.to_vec())
                    .map_err(|_| DecodeError::Custom("l1 tx id is not utf-8".into()))?;
                (Some(text), decoder)
            }
            other => return Err(DecodeError::InvalidBoolean(other).with_context("l1_tx_flag")),
        };
        Ok((
            SettlementBatch {
                batch_id,
                start_block,
                end_block,
                pre_state_root,
                post_state_root,
                transactions_root,
                compressed_data,
                state_proof,
                status,
                l1_tx_id,
                submitted_at,
            },
            decoder.finish_unchecked(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use tessera_crypto::hash::hash_bytes;

    use super::*;

    #[test]
    fn round_trip() {
        let batch = SettlementBatch {
            batch_id: 2,
            start_block: 10,
            end_block: 14,
            pre_state_root: hash_bytes(b"pre"),
            post_state_root: hash_bytes(b"post"),
            transactions_root: hash_bytes(b"txs"),
            compressed_data: Bytes::from_static(b"blocks"),
            state_proof: vec![hash_bytes(b"a"), hash_bytes(b"b"), hash_bytes(b"c")],
            status: BatchStatus::Submitted,
            l1_tx_id: Some("a1b2c3".to_string()),
            submitted_at: 1_700_000_123,
        };
        let encoded = batch.encode_to_vec();
        assert_eq!(SettlementBatch::decode(&encoded).unwrap(), batch);
    }

    #[test]
    fn round_trip_without_submission_details() {
        let batch = SettlementBatch {
            batch_id: 1,
            start_block: 1,
            end_block: 3,
            ..Default::default()
        };
        let encoded = batch.encode_to_vec();
        assert_eq!(SettlementBatch::decode(&encoded).unwrap(), batch);
    }

    #[test]
    fn unknown_status_is_rejected() {
        let mut encoded = SettlementBatch::default().encode_to_vec();
        // status byte sits before submitted_at (8 bytes) and the tx-id flag.
        let status_index = encoded.len() - 10;
        encoded[status_index] = 9;
        assert!(SettlementBatch::decode(&encoded).is_err());
    }
}
