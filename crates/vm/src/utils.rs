use ethereum_types::U256;

use tessera_common::{Address, AddressKind, H256, PAYMENT_CREDENTIAL_SIZE};

use crate::errors::{HaltReason, VmError};

/// Narrows a stack word to `usize`; words that cannot possibly address
/// anything halt the frame out-of-gas.
pub fn u256_to_usize(value: U256) -> Result<usize, VmError> {
    usize::try_from(value).map_err(|_| HaltReason::OutOfGas.into())
}

/// Low 28 bytes of the big-endian word form an address credential.
pub fn word_to_address(word: U256) -> Address {
    let bytes = word.to_big_endian();
    let mut credential = [0u8; PAYMENT_CREDENTIAL_SIZE];
    credential.copy_from_slice(&bytes[32 - PAYMENT_CREDENTIAL_SIZE..]);
    Address::new(AddressKind::Enterprise, credential)
}

/// Right-aligns the 28 credential bytes inside a 32-byte word.
pub fn address_to_word(address: &Address) -> U256 {
    let mut bytes = [0u8; 32];
    bytes[32 - PAYMENT_CREDENTIAL_SIZE..].copy_from_slice(&address.credential);
    U256::from_big_endian(&bytes)
}

pub fn word_to_h256(word: U256) -> H256 {
    H256::from(word.to_big_endian())
}

pub fn h256_to_word(hash: H256) -> U256 {
    U256::from_big_endian(hash.as_bytes())
}

/// Branchless-ish boolean word.
pub fn bool_to_word(value: bool) -> U256 {
    if value {
        U256::one()
    } else {
        U256::zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_word_round_trip() {
        let mut credential = [0u8; PAYMENT_CREDENTIAL_SIZE];
        credential[0] = 0xAA;
        credential[27] = 0x01;
        let address = Address::new(AddressKind::Enterprise, credential);
        assert_eq!(word_to_address(address_to_word(&address)), address);
    }

    #[test]
    fn h256_word_round_trip() {
        let hash = H256::from_low_u64_be(0xCAFE);
        assert_eq!(word_to_h256(h256_to_word(hash)), hash);
    }

    #[test]
    fn huge_words_do_not_narrow() {
        assert!(u256_to_usize(U256::MAX).is_err());
        assert_eq!(u256_to_usize(U256::from(7)).unwrap(), 7);
    }
}
