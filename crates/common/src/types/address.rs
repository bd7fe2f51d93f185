use bytes::BufMut;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

use tessera_codec::{DecodeError, WireDecode, WireEncode};
use tessera_crypto::bech32::{self, Bech32Error};
use tessera_crypto::hash::hash_bytes;
use tessera_crypto::signature::PublicKeyBytes;

pub const PAYMENT_CREDENTIAL_SIZE: usize = 28;

/// What an address designates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AddressKind {
    /// Payment plus staking credential.
    Base = 0x00,
    /// Payment credential only.
    #[default]
    Enterprise = 0x01,
    /// Contract account.
    Script = 0x02,
}

impl AddressKind {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value & 0x0F {
            0x00 => Some(AddressKind::Base),
            0x01 => Some(AddressKind::Enterprise),
            0x02 => Some(AddressKind::Script),
            _ => None,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AddressError {
    #[error("bech32: {0}")]
    Bech32(#[from] Bech32Error),
    #[error("address payload too short")]
    PayloadTooShort,
    #[error("unknown address kind byte {0:#04x}")]
    UnknownKind(u8),
    #[error("invalid hex address")]
    InvalidHex,
}

/// A 28-byte payment credential with a kind tag.
///
/// Identity (equality, ordering, hashing) is the credential alone: the kind
/// is presentation metadata carried by the text form and never travels on the
/// wire, where an address is exactly its 28 credential bytes.
#[derive(Debug, Clone, Copy, Default)]
pub struct Address {
    pub kind: AddressKind,
    pub credential: [u8; PAYMENT_CREDENTIAL_SIZE],
}

impl Address {
    pub const ZERO: Address = Address {
        kind: AddressKind::Enterprise,
        credential: [0u8; PAYMENT_CREDENTIAL_SIZE],
    };

    pub fn new(kind: AddressKind, credential: [u8; PAYMENT_CREDENTIAL_SIZE]) -> Self {
        Self { kind, credential }
    }

    /// Derives the payment credential from an Ed25519 public key by hashing
    /// and truncating to 28 bytes.
    pub fn from_public_key(public_key: &PublicKeyBytes) -> Self {
        let digest = hash_bytes(public_key);
        let mut credential = [0u8; PAYMENT_CREDENTIAL_SIZE];
        credential.copy_from_slice(&digest.as_bytes()[..PAYMENT_CREDENTIAL_SIZE]);
        Self::new(AddressKind::Enterprise, credential)
    }

    /// The all-zero credential, used as the contract-creation recipient.
    pub fn is_zero(&self) -> bool {
        self.credential.iter().all(|b| *b == 0)
    }

    /// Bech32 text form: `type_byte || credential` under the network prefix.
    pub fn to_bech32(&self, mainnet: bool) -> Result<String, AddressError> {
        let mut payload = Vec::with_capacity(1 + PAYMENT_CREDENTIAL_SIZE);
        payload.push(self.kind as u8);
        payload.extend_from_slice(&self.credential);
        Ok(bech32::encode(mainnet, &payload)?)
    }

    /// Decodes the text form. Base-address payloads carrying a stake
    /// credential are accepted; only the payment credential is retained.
    pub fn from_bech32(text: &str) -> Result<Self, AddressError> {
        let (_mainnet, payload) = bech32::decode(text)?;
        if payload.len() < 1 + PAYMENT_CREDENTIAL_SIZE {
            return Err(AddressError::PayloadTooShort);
        }
        let kind = AddressKind::from_u8(payload[0]).ok_or(AddressError::UnknownKind(payload[0]))?;
        let mut credential = [0u8; PAYMENT_CREDENTIAL_SIZE];
        credential.copy_from_slice(&payload[1..=PAYMENT_CREDENTIAL_SIZE]);
        Ok(Self::new(kind, credential))
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.credential))
    }

    pub fn from_hex(text: &str) -> Result<Self, AddressError> {
        let stripped = text.strip_prefix("0x").unwrap_or(text);
        let bytes = hex::decode(stripped).map_err(|_| AddressError::InvalidHex)?;
        if bytes.len() != PAYMENT_CREDENTIAL_SIZE {
            return Err(AddressError::InvalidHex);
        }
        let mut credential = [0u8; PAYMENT_CREDENTIAL_SIZE];
        credential.copy_from_slice(&bytes);
        Ok(Self::new(AddressKind::Enterprise, credential))
    }
}

impl PartialEq for Address {
    fn eq(&self, other: &Self) -> bool {
        self.credential == other.credential
    }
}

impl Eq for Address {}

impl PartialOrd for Address {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Address {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.credential.cmp(&other.credential)
    }
}

impl std::hash::Hash for Address {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.credential.hash(state);
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl WireEncode for Address {
    fn encode(&self, buf: &mut dyn BufMut) {
        buf.put_slice(&self.credential);
    }

    fn length(&self) -> usize {
        PAYMENT_CREDENTIAL_SIZE
    }
}

impl WireDecode for Address {
    fn decode_unfinished(buf: &[u8]) -> Result<(Self, &[u8]), DecodeError> {
        let (credential, rest) = <[u8; PAYMENT_CREDENTIAL_SIZE]>::decode_unfinished(buf)?;
        Ok((Address::new(AddressKind::Enterprise, credential), rest))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        if text.starts_with("addr") {
            Address::from_bech32(&text).map_err(serde::de::Error::custom)
        } else {
            Address::from_hex(&text).map_err(serde::de::Error::custom)
        }
    }
}

#[cfg(test)]
mod tests {
    use tessera_crypto::signature::Keypair;

    use super::*;

    #[test]
    fn derivation_truncates_the_key_hash() {
        let keypair = Keypair::from_seed(&[1u8; 32]);
        let address = Address::from_public_key(&keypair.public_key());
        let digest = hash_bytes(&keypair.public_key());
        assert_eq!(address.credential, digest.as_bytes()[..28]);
    }

    #[test]
    fn bech32_round_trip() {
        let keypair = Keypair::from_seed(&[2u8; 32]);
        let address = Address::from_public_key(&keypair.public_key());
        for mainnet in [true, false] {
            let text = address.to_bech32(mainnet).unwrap();
            assert_eq!(Address::from_bech32(&text).unwrap(), address);
        }
    }

    #[test]
    fn identity_ignores_the_kind_tag() {
        let mut credential = [0u8; PAYMENT_CREDENTIAL_SIZE];
        credential[27] = 0x05;
        let account = Address::new(AddressKind::Enterprise, credential);
        let contract = Address::new(AddressKind::Script, credential);
        assert_eq!(account, contract);
    }

    #[test]
    fn hex_round_trip() {
        let mut credential = [0u8; PAYMENT_CREDENTIAL_SIZE];
        credential[0] = 0xab;
        credential[27] = 0x01;
        let address = Address::new(AddressKind::Enterprise, credential);
        assert_eq!(Address::from_hex(&address.to_hex()).unwrap(), address);
    }

    #[test]
    fn wire_form_is_the_bare_credential() {
        let address = Address::from_hex(
            "0x0102030405060708090a0b0c0d0e0f101112131415161718191a1b1c",
        )
        .unwrap();
        let encoded = address.encode_to_vec();
        assert_eq!(encoded.len(), PAYMENT_CREDENTIAL_SIZE);
        assert_eq!(Address::decode(&encoded).unwrap(), address);
    }

    #[test]
    fn serde_accepts_both_text_forms() {
        let address = Address::from_hex(
            "0x0102030405060708090a0b0c0d0e0f101112131415161718191a1b1c",
        )
        .unwrap();
        let hex_json = serde_json::to_string(&address).unwrap();
        assert_eq!(serde_json::from_str::<Address>(&hex_json).unwrap(), address);

        let bech = address.to_bech32(false).unwrap();
        let bech_json = format!("\"{bech}\"");
        assert_eq!(serde_json::from_str::<Address>(&bech_json).unwrap(), address);
    }
}
