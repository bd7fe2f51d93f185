//! Bech32 text form for addresses.
//!
//! Payloads are 5-bit regrouped with a six-symbol polynomial checksum behind
//! a human-readable network prefix: `addr` on mainnet, `addr_test` otherwise.

use bech32::{Bech32, Hrp};
use thiserror::Error;

pub const MAINNET_HRP: &str = "addr";
pub const TESTNET_HRP: &str = "addr_test";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum Bech32Error {
    #[error("invalid human-readable prefix")]
    InvalidPrefix,
    #[error("malformed bech32 string: {0}")]
    Malformed(String),
}

/// Encodes `payload` under the network prefix.
pub fn encode(mainnet: bool, payload: &[u8]) -> Result<String, Bech32Error> {
    let hrp = Hrp::parse(if mainnet { MAINNET_HRP } else { TESTNET_HRP })
        .map_err(|_| Bech32Error::InvalidPrefix)?;
    bech32::encode::<Bech32>(hrp, payload).map_err(|err| Bech32Error::Malformed(err.to_string()))
}

/// Decodes a bech32 string, validating the checksum, and returns the payload
/// along with whether the prefix named the mainnet.
pub fn decode(text: &str) -> Result<(bool, Vec<u8>), Bech32Error> {
    let (hrp, payload) =
        bech32::decode(text).map_err(|err| Bech32Error::Malformed(err.to_string()))?;
    let mainnet = match hrp.as_str() {
        MAINNET_HRP => true,
        TESTNET_HRP => false,
        _ => return Err(Bech32Error::InvalidPrefix),
    };
    Ok((mainnet, payload))
}
