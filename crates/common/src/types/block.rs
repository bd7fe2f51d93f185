use bytes::BufMut;

use tessera_codec::{DecodeError, Decoder, Encoder, WireDecode, WireEncode};
use tessera_crypto::hash::{hash_bytes, Hash256, ZERO_HASH};
use tessera_crypto::merkle::merkle_root;

use crate::constants::{DEFAULT_BASE_FEE, DEFAULT_GAS_LIMIT};
use crate::types::address::Address;
use crate::types::transaction::Transaction;

/// Block header. The hash is the content hash of the fixed-order encoding of
/// every field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockHeader {
    pub number: u64,
    pub parent_hash: Hash256,
    pub state_root: Hash256,
    pub transactions_root: Hash256,
    pub receipts_root: Hash256,
    pub sequencer: Address,
    pub gas_limit: u64,
    pub gas_used: u64,
    pub base_fee: u64,
    pub timestamp: u64,
    /// L1 reference block observed when this block was produced.
    pub l1_block_number: u64,
    /// Settlement batch this block is slated for.
    pub batch_id: u64,
}

impl Default for BlockHeader {
    fn default() -> Self {
        Self {
            number: 0,
            parent_hash: ZERO_HASH,
            state_root: ZERO_HASH,
            transactions_root: ZERO_HASH,
            receipts_root: ZERO_HASH,
            sequencer: Address::ZERO,
            gas_limit: DEFAULT_GAS_LIMIT,
            gas_used: 0,
            base_fee: DEFAULT_BASE_FEE,
            timestamp: 0,
            l1_block_number: 0,
            batch_id: 0,
        }
    }
}

impl BlockHeader {
    pub fn compute_hash(&self) -> Hash256 {
        hash_bytes(&self.encode_to_vec())
    }
}

impl WireEncode for BlockHeader {
    fn encode(&self, buf: &mut dyn BufMut) {
        Encoder::new(buf)
            .encode_field(&self.number)
            .encode_field(&self.parent_hash)
            .encode_field(&self.state_root)
            .encode_field(&self.transactions_root)
            .encode_field(&self.receipts_root)
            .encode_field(&self.sequencer)
            .encode_field(&self.gas_limit)
            .encode_field(&self.gas_used)
            .encode_field(&self.base_fee)
            .encode_field(&self.timestamp)
            .encode_field(&self.l1_block_number)
            .encode_field(&self.batch_id)
            .finish();
    }
}

impl WireDecode for BlockHeader {
    fn decode_unfinished(buf: &[u8]) -> Result<(Self, &[u8]), DecodeError> {
        decode_header(buf).map_err(|err| err.with_context("BlockHeader"))
    }
}

fn decode_header(buf: &[u8]) -> Result<(BlockHeader, &[u8]), DecodeError> {
    let decoder = Decoder::new(buf);
    let (number, decoder) = decoder.decode_field("number")?;
    let (parent_hash, decoder) = decoder.decode_field("parent_hash")?;
    let (state_root, decoder) = decoder.decode_field("state_root")?;
    let (transactions_root, decoder) = decoder.decode_field("transactions_root")?;
    let (receipts_root, decoder) = decoder.decode_field("receipts_root")?;
    let (sequencer, decoder) = decoder.decode_field("sequencer")?;
    let (gas_limit, decoder) = decoder.decode_field("gas_limit")?;
    let (gas_used, decoder) = decoder.decode_field("gas_used")?;
    let (base_fee, decoder) = decoder.decode_field("base_fee")?;
    let (timestamp, decoder) = decoder.decode_field("timestamp")?;
    let (l1_block_number, decoder) = decoder.decode_field("l1_block_number")?;
    let (batch_id, decoder) = decoder.decode_field("batch_id")?;
    Ok((
        BlockHeader {
            number,
            parent_hash,
            state_root,
            transactions_root,
            receipts_root,
            sequencer,
            gas_limit,
            gas_used,
            base_fee,
            timestamp,
            l1_block_number,
            batch_id,
        },
        decoder.finish_unchecked(),
    ))
}

/// Header plus the ordered transaction list.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Block {
    pub header: BlockHeader,
    pub transactions: Vec<Transaction>,
}

impl Block {
    pub fn new(header: BlockHeader, transactions: Vec<Transaction>) -> Self {
        Self {
            header,
            transactions,
        }
    }

    pub fn hash(&self) -> Hash256 {
        self.header.compute_hash()
    }

    /// Merkle root (duplicate-last rule) over the transaction hashes.
    pub fn compute_transactions_root(&self) -> Hash256 {
        let hashes: Vec<Hash256> = self
            .transactions
            .iter()
            .map(Transaction::compute_hash)
            .collect();
        merkle_root(&hashes)
    }
}

impl WireEncode for Block {
    /// `header || tx_count:u32 || (tx_len:u32, tx_bytes)*`
    fn encode(&self, buf: &mut dyn BufMut) {
        self.header.encode(buf);
        buf.put_u32(self.transactions.len() as u32);
        for tx in &self.transactions {
            let tx_bytes = tx.encode_to_vec();
            buf.put_u32(tx_bytes.len() as u32);
            buf.put_slice(&tx_bytes);
        }
    }
}

impl WireDecode for Block {
    fn decode_unfinished(buf: &[u8]) -> Result<(Self, &[u8]), DecodeError> {
        let (header, rest) = BlockHeader::decode_unfinished(buf)?;
        let (tx_count, mut rest) =
            u32::decode_unfinished(rest).map_err(|err| err.with_context("Block tx_count"))?;
        let mut transactions = Vec::with_capacity(tx_count.min(1024) as usize);
        for index in 0..tx_count {
            let (tx_len, after_len) = u32::decode_unfinished(rest)
                .map_err(|err| err.with_context("Block tx_len"))?;
            let tx_len = tx_len as usize;
            if after_len.len() < tx_len {
                return Err(DecodeError::BadLengthPrefix(tx_len as u64)
                    .with_context(&format!("Block transaction {index}")));
            }
            let (tx_bytes, after_tx) = after_len.split_at(tx_len);
            let tx = Transaction::decode(tx_bytes)
                .map_err(|err| err.with_context(&format!("Block transaction {index}")))?;
            transactions.push(tx);
            rest = after_tx;
        }
        Ok((
            Block {
                header,
                transactions,
            },
            rest,
        ))
    }
}
