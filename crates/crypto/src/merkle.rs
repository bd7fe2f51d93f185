//! Binary Merkle tree over [`Hash256`] leaves.
//!
//! Levels with an odd node count duplicate their last node before pairing.
//! The root of an empty leaf set is the zero hash; a single leaf is its own
//! root.

use crate::hash::{hash_concat, Hash256, ZERO_HASH};

fn combine(left: &Hash256, right: &Hash256) -> Hash256 {
    hash_concat([left.as_bytes(), right.as_bytes()])
}

pub fn merkle_root(leaves: &[Hash256]) -> Hash256 {
    if leaves.is_empty() {
        return ZERO_HASH;
    }
    if leaves.len() == 1 {
        return leaves[0];
    }

    let mut current = leaves.to_vec();
    if current.len() % 2 != 0 {
        current.push(*current.last().unwrap_or(&ZERO_HASH));
    }

    while current.len() > 1 {
        let mut next = Vec::with_capacity(current.len() / 2);
        for pair in current.chunks(2) {
            next.push(combine(&pair[0], &pair[1]));
        }
        current = next;
        if current.len() > 1 && current.len() % 2 != 0 {
            current.push(*current.last().unwrap_or(&ZERO_HASH));
        }
    }

    current[0]
}

/// Sibling path for the leaf at `index`, bottom-up. Empty when `index` is out
/// of range or the tree is a single leaf.
pub fn merkle_proof(leaves: &[Hash256], index: usize) -> Vec<Hash256> {
    let mut proof = Vec::new();
    if leaves.is_empty() || index >= leaves.len() {
        return proof;
    }
    // A single leaf is its own root; nothing to pair against.
    if leaves.len() == 1 {
        return proof;
    }

    let mut current = leaves.to_vec();
    if current.len() % 2 != 0 {
        current.push(*current.last().unwrap_or(&ZERO_HASH));
    }

    let mut idx = index;
    while current.len() > 1 {
        let sibling = if idx % 2 == 0 { idx + 1 } else { idx - 1 };
        if let Some(hash) = current.get(sibling) {
            proof.push(*hash);
        }

        let mut next = Vec::with_capacity(current.len() / 2);
        for pair in current.chunks(2) {
            next.push(combine(&pair[0], &pair[1]));
        }
        current = next;
        idx /= 2;

        if current.len() > 1 && current.len() % 2 != 0 {
            current.push(*current.last().unwrap_or(&ZERO_HASH));
        }
    }

    proof
}

pub fn verify_merkle_proof(
    leaf: &Hash256,
    proof: &[Hash256],
    index: usize,
    root: &Hash256,
) -> bool {
    let mut current = *leaf;
    let mut idx = index;
    for sibling in proof {
        current = if idx % 2 == 0 {
            combine(&current, sibling)
        } else {
            combine(sibling, &current)
        };
        idx /= 2;
    }
    current == *root
}

#[cfg(test)]
mod tests {
    use crate::hash::hash_bytes;

    use super::*;

    fn leaves(n: usize) -> Vec<Hash256> {
        (0..n).map(|i| hash_bytes(&[i as u8])).collect()
    }

    #[test]
    fn empty_set_roots_to_zero() {
        assert_eq!(merkle_root(&[]), ZERO_HASH);
    }

    #[test]
    fn single_leaf_is_its_own_root() {
        let leaf = hash_bytes(b"only");
        assert_eq!(merkle_root(&[leaf]), leaf);
    }

    #[test]
    fn odd_leaf_count_duplicates_last() {
        let three = leaves(3);
        let mut four = three.clone();
        four.push(three[2]);
        assert_eq!(merkle_root(&three), merkle_root(&four));
    }

    #[test]
    fn every_leaf_proves_against_the_root() {
        for n in 1..=9 {
            let set = leaves(n);
            let root = merkle_root(&set);
            for (i, leaf) in set.iter().enumerate() {
                let proof = merkle_proof(&set, i);
                assert!(
                    verify_merkle_proof(leaf, &proof, i, &root),
                    "leaf {i} of {n} failed"
                );
            }
        }
    }

    #[test]
    fn tampering_breaks_verification() {
        let set = leaves(8);
        let root = merkle_root(&set);
        let proof = merkle_proof(&set, 3);

        // Wrong leaf.
        assert!(!verify_merkle_proof(&hash_bytes(b"evil"), &proof, 3, &root));
        // Wrong index.
        assert!(!verify_merkle_proof(&set[3], &proof, 4, &root));
        // Corrupted sibling.
        let mut bad = proof.clone();
        bad[0].0[0] ^= 0x01;
        assert!(!verify_merkle_proof(&set[3], &bad, 3, &root));
        // Wrong root.
        let mut bad_root = root;
        bad_root.0[31] ^= 0x01;
        assert!(!verify_merkle_proof(&set[3], &proof, 3, &bad_root));
    }

    #[test]
    fn out_of_range_proof_is_empty() {
        let set = leaves(4);
        assert!(merkle_proof(&set, 9).is_empty());
    }
}
