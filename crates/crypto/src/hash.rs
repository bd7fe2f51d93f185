use blake2::{digest::consts::U32, Blake2b, Digest};
use ethereum_types::H256;

/// 32-byte content hash. The all-zero hash denotes "none".
pub type Hash256 = H256;

pub const ZERO_HASH: Hash256 = H256::zero();

type Blake2b256 = Blake2b<U32>;

/// Blake2b-256 of a byte string.
pub fn hash_bytes(data: &[u8]) -> Hash256 {
    let digest = Blake2b256::digest(data);
    H256::from_slice(&digest)
}

/// Blake2b-256 over the concatenation of several byte strings, without
/// materializing the joined buffer.
pub fn hash_concat<'a>(parts: impl IntoIterator<Item = &'a [u8]>) -> Hash256 {
    let mut hasher = Blake2b256::new();
    for part in parts {
        hasher.update(part);
    }
    H256::from_slice(&hasher.finalize())
}
