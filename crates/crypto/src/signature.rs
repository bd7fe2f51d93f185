//! Ed25519 transaction and block signatures.
//!
//! Signatures cover a 32-byte content hash and verify against the public key
//! carried alongside them. An all-0xFF signature is the development override;
//! callers decide whether to honor it (see `ChainConfig`).

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use thiserror::Error;

pub const PUBLIC_KEY_SIZE: usize = 32;
pub const SIGNATURE_SIZE: usize = 64;
pub const SEED_SIZE: usize = 32;

pub type PublicKeyBytes = [u8; PUBLIC_KEY_SIZE];
pub type SignatureBytes = [u8; SIGNATURE_SIZE];

#[derive(Debug, Error)]
pub enum SignatureError {
    #[error("malformed public key")]
    MalformedPublicKey,
    #[error("signature verification failed")]
    BadSignature,
}

/// An Ed25519 signing identity.
#[derive(Clone)]
pub struct Keypair {
    signing: SigningKey,
}

impl Keypair {
    pub fn generate() -> Self {
        Self {
            signing: SigningKey::generate(&mut OsRng),
        }
    }

    pub fn from_seed(seed: &[u8; SEED_SIZE]) -> Self {
        Self {
            signing: SigningKey::from_bytes(seed),
        }
    }

    pub fn public_key(&self) -> PublicKeyBytes {
        self.signing.verifying_key().to_bytes()
    }

    pub fn sign(&self, message: &[u8]) -> SignatureBytes {
        self.signing.sign(message).to_bytes()
    }
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keypair")
            .field("public_key", &hex_fmt(&self.public_key()))
            .finish_non_exhaustive()
    }
}

fn hex_fmt(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Verifies `signature` over `message` against `public_key`.
pub fn verify(
    message: &[u8],
    signature: &SignatureBytes,
    public_key: &PublicKeyBytes,
) -> Result<(), SignatureError> {
    let key = VerifyingKey::from_bytes(public_key)
        .map_err(|_| SignatureError::MalformedPublicKey)?;
    let signature = Signature::from_bytes(signature);
    key.verify(message, &signature)
        .map_err(|_| SignatureError::BadSignature)
}

/// True when every signature byte is 0xFF, the development override form.
pub fn is_dev_override(signature: &SignatureBytes) -> bool {
    signature.iter().all(|b| *b == 0xFF)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify_round_trip() {
        let keypair = Keypair::generate();
        let message = b"block 7";
        let signature = keypair.sign(message);
        assert!(verify(message, &signature, &keypair.public_key()).is_ok());
    }

    #[test]
    fn wrong_message_fails() {
        let keypair = Keypair::generate();
        let signature = keypair.sign(b"block 7");
        assert!(matches!(
            verify(b"block 8", &signature, &keypair.public_key()),
            Err(SignatureError::BadSignature)
        ));
    }

    #[test]
    fn wrong_key_fails() {
        let keypair = Keypair::generate();
        let other = Keypair::generate();
        let signature = keypair.sign(b"payload");
        assert!(verify(b"payload", &signature, &other.public_key()).is_err());
    }

    #[test]
    fn seed_derivation_is_deterministic() {
        let seed = [7u8; SEED_SIZE];
        let a = Keypair::from_seed(&seed);
        let b = Keypair::from_seed(&seed);
        assert_eq!(a.public_key(), b.public_key());
        assert_eq!(a.sign(b"x"), b.sign(b"x"));
    }

    #[test]
    fn dev_override_detection() {
        assert!(is_dev_override(&[0xFF; SIGNATURE_SIZE]));
        let mut almost = [0xFF; SIGNATURE_SIZE];
        almost[63] = 0xFE;
        assert!(!is_dev_override(&almost));
    }
}
