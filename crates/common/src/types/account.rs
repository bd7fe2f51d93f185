use bytes::BufMut;

use tessera_codec::{DecodeError, Decoder, Encoder, WireDecode, WireEncode};
use tessera_crypto::hash::{Hash256, ZERO_HASH};

/// Per-account record stored under the payment credential in the state trie.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountState {
    pub nonce: u64,
    pub balance: u64,
    pub storage_root: Hash256,
    pub code_hash: Hash256,
}

impl Default for AccountState {
    fn default() -> Self {
        Self {
            nonce: 0,
            balance: 0,
            storage_root: ZERO_HASH,
            code_hash: ZERO_HASH,
        }
    }
}

impl AccountState {
    /// An account is a contract once it carries code.
    pub fn is_contract(&self) -> bool {
        self.code_hash != ZERO_HASH
    }

    pub fn is_empty(&self) -> bool {
        *self == AccountState::default()
    }
}

impl WireEncode for AccountState {
    fn encode(&self, buf: &mut dyn BufMut) {
        Encoder::new(buf)
            .encode_field(&self.nonce)
            .encode_field(&self.balance)
            .encode_field(&self.storage_root)
            .encode_field(&self.code_hash)
            .finish();
    }

    fn length(&self) -> usize {
        8 + 8 + 32 + 32
    }
}

impl WireDecode for AccountState {
    fn decode_unfinished(buf: &[u8]) -> Result<(Self, &[u8]), DecodeError> {
        let decoder = Decoder::new(buf);
        let (nonce, decoder) = decoder.decode_field("nonce")?;
        let (balance, decoder) = decoder.decode_field("balance")?;
        let (storage_root, decoder) = decoder.decode_field("storage_root")?;
        let (code_hash, decoder) = decoder.decode_field("code_hash")?;
        Ok((
            AccountState {
                nonce,
                balance,
                storage_root,
                code_hash,
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
        let account = AccountState {
            nonce: 4,
            balance: 1_000_000,
            storage_root: ZERO_HASH,
            code_hash: hash_bytes(b"code"),
        };
        let encoded = account.encode_to_vec();
        assert_eq!(encoded.len(), account.length());
        assert_eq!(AccountState::decode(&encoded).unwrap(), account);
    }

    #[test]
    fn contract_detection() {
        let mut account = AccountState::default();
        assert!(!account.is_contract());
        account.code_hash = hash_bytes(b"runtime");
        assert!(account.is_contract());
    }

    #[test]
    fn default_is_empty() {
        assert!(AccountState::default().is_empty());
        let funded = AccountState {
            balance: 1,
            ..Default::default()
        };
        assert!(!funded.is_empty());
    }
}
