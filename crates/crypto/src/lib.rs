//! Cryptographic primitives: the Blake2b-256 content hash, Merkle trees over
//! it, Ed25519 signatures, and the Bech32 address text form.

pub mod bech32;
pub mod hash;
pub mod merkle;
pub mod signature;

pub use hash::{hash_bytes, hash_concat, Hash256, ZERO_HASH};
pub use merkle::{merkle_proof, merkle_root, verify_merkle_proof};
pub use signature::{Keypair, PublicKeyBytes, SignatureBytes, SignatureError};
