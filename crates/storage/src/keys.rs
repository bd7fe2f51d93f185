//! Key layouts for the shared store namespace.

use tessera_common::{Address, H256};

/// Namespace byte under which authenticated trie leaves live.
pub const TRIE_LEAF_PREFIX: u8 = 0x01;

const TRIE_ROOT_KEY: [u8; 5] = [0x00, b'R', b'O', b'O', b'T'];
const HEAD_KEY: [u8; 4] = *b"HEAD";

pub fn trie_root_key() -> Vec<u8> {
    TRIE_ROOT_KEY.to_vec()
}

pub fn trie_leaf_key(hashed_key: &H256) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + 32);
    key.push(TRIE_LEAF_PREFIX);
    key.extend_from_slice(hashed_key.as_bytes());
    key
}

pub fn head_key() -> Vec<u8> {
    HEAD_KEY.to_vec()
}

pub fn block_number_key(number: u64) -> Vec<u8> {
    let mut key = Vec::with_capacity(2 + 8);
    key.extend_from_slice(b"BN");
    key.extend_from_slice(&number.to_be_bytes());
    key
}

pub fn block_hash_key(hash: &H256) -> Vec<u8> {
    let mut key = Vec::with_capacity(2 + 32);
    key.extend_from_slice(b"BH");
    key.extend_from_slice(hash.as_bytes());
    key
}

pub fn tx_index_key(tx_hash: &H256) -> Vec<u8> {
    let mut key = Vec::with_capacity(3 + 32);
    key.extend_from_slice(b"TXI");
    key.extend_from_slice(tx_hash.as_bytes());
    key
}

pub fn receipt_key(tx_hash: &H256) -> Vec<u8> {
    let mut key = Vec::with_capacity(3 + 32);
    key.extend_from_slice(b"RCT");
    key.extend_from_slice(tx_hash.as_bytes());
    key
}

pub fn storage_slot_key(address: &Address, slot: &H256) -> Vec<u8> {
    let mut key = Vec::with_capacity(4 + 28 + 32);
    key.extend_from_slice(b"STOR");
    key.extend_from_slice(&address.credential);
    key.extend_from_slice(slot.as_bytes());
    key
}

pub fn code_key(code_hash: &H256) -> Vec<u8> {
    let mut key = Vec::with_capacity(4 + 32);
    key.extend_from_slice(b"CODE");
    key.extend_from_slice(code_hash.as_bytes());
    key
}
