use bytes::{BufMut, Bytes};

use tessera_codec::{DecodeError, Decoder, Encoder, WireDecode, WireEncode};
use tessera_crypto::hash::{hash_bytes, Hash256};

use crate::types::address::Address;

/// Data record emitted during contract execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Log {
    pub address: Address,
    pub topics: Vec<Hash256>,
    pub data: Bytes,
}

impl WireEncode for Log {
    /// `address || topic_count:u8 || topics || data_len:u32 || data`
    fn encode(&self, buf: &mut dyn BufMut) {
        self.address.encode(buf);
        buf.put_u8(self.topics.len() as u8);
        for topic in &self.topics {
            topic.encode(buf);
        }
        buf.put_u32(self.data.len() as u32);
        buf.put_slice(&self.data);
    }
}

impl WireDecode for Log {
    fn decode_unfinished(buf: &[u8]) -> Result<(Self, &[u8]), DecodeError> {
        let (address, rest) = Address::decode_unfinished(buf)?;
        let (topic_count, mut rest) = u8::decode_unfinished(rest)?;
        let mut topics = Vec::with_capacity(topic_count as usize);
        for _ in 0..topic_count {
            let (topic, remaining) = Hash256::decode_unfinished(rest)?;
            topics.push(topic);
            rest = remaining;
        }
        let (data_len, rest) = u32::decode_unfinished(rest)?;
        let data_len = data_len as usize;
        if rest.len() < data_len {
            return Err(DecodeError::BadLengthPrefix(data_len as u64).with_context("Log data"));
        }
        let (data, rest) = rest.split_at(data_len);
        Ok((
            Log {
                address,
                topics,
                data: Bytes::copy_from_slice(data),
            },
            rest,
        ))
    }
}

/// Result of executing one transaction inside a block.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Receipt {
    pub transaction_hash: Hash256,
    pub succeeded: bool,
    pub gas_used: u64,
    pub cumulative_gas_used: u64,
    pub block_number: u64,
    pub transaction_index: u64,
    pub from: Address,
    pub to: Address,
    /// Set for contract-creating transactions.
    pub contract_address: Option<Address>,
    pub logs: Vec<Log>,
}

impl Receipt {
    pub fn compute_hash(&self) -> Hash256 {
        hash_bytes(&self.encode_to_vec())
    }
}

impl WireEncode for Receipt {
    fn encode(&self, buf: &mut dyn BufMut) {
        let encoder = Encoder::new(buf)
            .encode_field(&self.transaction_hash)
            .encode_field(&self.succeeded)
            .encode_field(&self.gas_used)
            .encode_field(&self.cumulative_gas_used)
            .encode_field(&self.block_number)
            .encode_field(&self.transaction_index)
            .encode_field(&self.from)
            .encode_field(&self.to);
        let encoder = match &self.contract_address {
            Some(address) => encoder.encode_field(&1u8).encode_field(address),
            None => encoder.encode_field(&0u8),
        };
        encoder
            .encode_field(&(self.logs.len() as u32))
            .finish();
        for log in &self.logs {
            log.encode(buf);
        }
    }
}

impl WireDecode for Receipt {
    fn decode_unfinished(buf: &[u8]) -> Result<(Self, &[u8]), DecodeError> {
        decode_receipt(buf).map_err(|err| err.with_context("Receipt"))
    }
}

fn decode_receipt(buf: &[u8]) -> Result<(Receipt, &[u8]), DecodeError> {
    let decoder = Decoder::new(buf);
    let (transaction_hash, decoder) = decoder.decode_field("transaction_hash")?;
    let (succeeded, decoder) = decoder.decode_field("succeeded")?;
    let (gas_used, decoder) = decoder.decode_field("gas_used")?;
    let (cumulative_gas_used, decoder) = decoder.decode_field("cumulative_gas_used")?;
    let (block_number, decoder) = decoder.decode_field("block_number")?;
    let (transaction_index, decoder) = decoder.decode_field("transaction_index")?;
    let (from, decoder) = decoder.decode_field("from")?;
    let (to, decoder) = decoder.decode_field("to")?;
    let (has_contract, decoder): (u8, _) = decoder.decode_field("contract_flag")?;
    let (contract_address, decoder) = match has_contract {
        0 => (None, decoder),
        1 => {
            let (address, decoder) = decoder.decode_field("contract_address")?;
            (Some(address), decoder)
        }
        other => {
            return Err(DecodeError::InvalidBoolean(other).with_context("contract_flag"));
        }
    };
    let (log_count, decoder): (u32, _) = decoder.decode_field("log_count")?;
    let mut rest = decoder.finish_unchecked();
    let mut logs = Vec::with_capacity(log_count.min(1024) as usize);
    for index in 0..log_count {
        let (log, remaining) = Log::decode_unfinished(rest)
            .map_err(|err| err.with_context(&format!("log {index}")))?;
        logs.push(log);
        rest = remaining;
    }
    Ok((
        Receipt {
            transaction_hash,
            succeeded,
            gas_used,
            cumulative_gas_used,
            block_number,
            transaction_index,
            from,
            to,
            contract_address,
            logs,
        },
        rest,
    ))
}
