use bytes::Bytes;

use tessera_codec::{Decoder, Encoder, DecodeError, WireDecode, WireEncode};
use tessera_crypto::hash::{hash_bytes, Hash256};
use tessera_crypto::signature::{
    self, Keypair, PublicKeyBytes, SignatureBytes, PUBLIC_KEY_SIZE, SIGNATURE_SIZE,
};

use crate::types::address::Address;

/// A signed transfer or contract interaction.
///
/// A zero recipient address designates contract creation, with `data` as the
/// init code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub from: Address,
    pub to: Address,
    pub value: u64,
    pub nonce: u64,
    /// Call data, or init code for creations.
    pub data: Bytes,
    pub gas_limit: u64,
    pub max_fee_per_gas: u64,
    pub max_priority_fee_per_gas: u64,
    pub sender_pubkey: PublicKeyBytes,
    pub signature: SignatureBytes,
}

impl Default for Transaction {
    fn default() -> Self {
        Self {
            from: Address::ZERO,
            to: Address::ZERO,
            value: 0,
            nonce: 0,
            data: Bytes::new(),
            gas_limit: 21_000,
            max_fee_per_gas: 0,
            max_priority_fee_per_gas: 0,
            sender_pubkey: [0u8; PUBLIC_KEY_SIZE],
            signature: [0u8; SIGNATURE_SIZE],
        }
    }
}

impl Transaction {
    /// Everything on the wire except the trailing signature bytes; the
    /// signing and hashing pre-image.
    pub fn signing_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        Encoder::new(&mut buf)
            .encode_field(&self.from)
            .encode_field(&self.to)
            .encode_field(&self.value)
            .encode_field(&self.nonce)
            .encode_field(&self.gas_limit)
            .encode_field(&self.max_fee_per_gas)
            .encode_field(&self.max_priority_fee_per_gas)
            .encode_field(&self.data)
            .encode_field(&self.sender_pubkey)
            .finish();
        buf
    }

    pub fn compute_hash(&self) -> Hash256 {
        hash_bytes(&self.signing_bytes())
    }

    /// `min(max_fee, base_fee + max_priority_fee)`.
    pub fn effective_gas_price(&self, base_fee: u64) -> u64 {
        self.max_fee_per_gas
            .min(base_fee.saturating_add(self.max_priority_fee_per_gas))
    }

    pub fn is_contract_creation(&self) -> bool {
        self.to.is_zero()
    }

    /// Worst-case funds the sender must hold: `value + gas_limit · max_fee`.
    /// `None` on arithmetic overflow.
    pub fn max_cost(&self) -> Option<u64> {
        self.gas_limit
            .checked_mul(self.max_fee_per_gas)?
            .checked_add(self.value)
    }

    /// Signs with `keypair`, filling in the public key and signature.
    pub fn sign(&mut self, keypair: &Keypair) {
        self.sender_pubkey = keypair.public_key();
        self.signature = keypair.sign(self.compute_hash().as_bytes());
    }

    /// Verifies the signature against the carried public key.
    ///
    /// When `allow_dev_override` is set, an all-0xFF signature is accepted;
    /// production configurations must leave it off.
    pub fn verify_signature(&self, allow_dev_override: bool) -> bool {
        if allow_dev_override && signature::is_dev_override(&self.signature) {
            return true;
        }
        signature::verify(
            self.compute_hash().as_bytes(),
            &self.signature,
            &self.sender_pubkey,
        )
        .is_ok()
    }
}

impl WireEncode for Transaction {
    fn encode(&self, buf: &mut dyn bytes::BufMut) {
        buf.put_slice(&self.signing_bytes());
        buf.put_slice(&self.signature);
    }
}

impl WireDecode for Transaction {
    fn decode_unfinished(buf: &[u8]) -> Result<(Self, &[u8]), DecodeError> {
        decode_transaction(buf).map_err(|err| err.with_context("Transaction"))
    }
}

fn decode_transaction(buf: &[u8]) -> Result<(Transaction, &[u8]), DecodeError> {
    let decoder = Decoder::new(buf);
    let (from, decoder) = decoder.decode_field("from")?;
    let (to, decoder) = decoder.decode_field("to")?;
    let (value, decoder) = decoder.decode_field("value")?;
    let (nonce, decoder) = decoder.decode_field("nonce")?;
    let (gas_limit, decoder) = decoder.decode_field("gas_limit")?;
    let (max_fee_per_gas, decoder) = decoder.decode_field("max_fee_per_gas")?;
    let (max_priority_fee_per_gas, decoder) = decoder.decode_field("max_priority_fee_per_gas")?;
    let (data, decoder): (Bytes, _) = decoder.decode_field("data")?;
    let (sender_pubkey, decoder) = decoder.decode_field("sender_pubkey")?;
    let (signature, decoder) = decoder.decode_field("signature")?;
    Ok((
        Transaction {
            from,
            to,
            value,
            nonce,
            data,
            gas_limit,
            max_fee_per_gas,
            max_priority_fee_per_gas,
            sender_pubkey,
            signature,
        },
        decoder.finish_unchecked(),
    ))
}

#[cfg(test)]
mod tests {
    use crate::types::address::{AddressKind, PAYMENT_CREDENTIAL_SIZE};

    use super::*;

    fn addr(last: u8) -> Address {
        let mut credential = [0u8; PAYMENT_CREDENTIAL_SIZE];
        credential[PAYMENT_CREDENTIAL_SIZE - 1] = last;
        Address::new(AddressKind::Enterprise, credential)
    }

    fn sample() -> Transaction {
        Transaction {
            from: addr(1),
            to: addr(2),
            value: 1_000_000_000,
            nonce: 3,
            data: Bytes::from_static(&[0x60, 0x05, 0x60, 0x00, 0x55]),
            gas_limit: 50_000,
            max_fee_per_gas: 2_000_000_000,
            max_priority_fee_per_gas: 1_000_000_000,
            ..Default::default()
        }
    }

    #[test]
    fn encode_decode_round_trip() {
        let tx = sample();
        let encoded = tx.encode_to_vec();
        assert_eq!(Transaction::decode(&encoded).unwrap(), tx);
    }

    #[test]
    fn hash_is_deterministic_and_excludes_the_signature() {
        let mut tx = sample();
        let unsigned = tx.compute_hash();
        assert_eq!(unsigned, tx.compute_hash());

        tx.signature = [0xAB; SIGNATURE_SIZE];
        assert_eq!(tx.compute_hash(), unsigned);

        tx.nonce += 1;
        assert_ne!(tx.compute_hash(), unsigned);
    }

    #[test]
    fn effective_price_is_capped_by_max_fee() {
        let tx = sample();
        // base 2 gwei + priority 1 gwei > max fee 2 gwei.
        assert_eq!(tx.effective_gas_price(2_000_000_000), 2_000_000_000);
        // base 0.5 gwei + priority 1 gwei below the cap.
        assert_eq!(tx.effective_gas_price(500_000_000), 1_500_000_000);
    }

    #[test]
    fn signing_round_trip() {
        let keypair = Keypair::from_seed(&[9u8; 32]);
        let mut tx = sample();
        tx.from = Address::from_public_key(&keypair.public_key());
        tx.sign(&keypair);
        assert!(tx.verify_signature(false));

        tx.value += 1;
        assert!(!tx.verify_signature(false));
    }

    #[test]
    fn dev_override_only_with_the_flag() {
        let mut tx = sample();
        tx.signature = [0xFF; SIGNATURE_SIZE];
        assert!(tx.verify_signature(true));
        assert!(!tx.verify_signature(false));
    }

    #[test]
    fn truncated_input_is_rejected() {
        let encoded = sample().encode_to_vec();
        assert!(Transaction::decode(&encoded[..encoded.len() - 10]).is_err());
    }

    #[test]
    fn max_cost_overflow_is_detected() {
        let mut tx = sample();
        tx.gas_limit = u64::MAX;
        tx.max_fee_per_gas = 2;
        assert_eq!(tx.max_cost(), None);
    }
}
