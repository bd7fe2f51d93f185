//! Static gas schedule, in the classic cost classes.
//!
//! Gas for an instruction is charged before it executes; a frame that cannot
//! cover the charge halts out-of-gas with all remaining gas consumed.

use ethereum_types::U256;

use crate::constants::WORD_SIZE;

pub const ZERO: u64 = 0;
pub const BASE: u64 = 2;
pub const VERYLOW: u64 = 3;
pub const LOW: u64 = 5;
pub const MID: u64 = 8;
pub const HIGH: u64 = 10;
pub const JUMPDEST: u64 = 1;

pub const BALANCE: u64 = 700;
pub const EXTCODESIZE: u64 = 700;
pub const BLOCKHASH: u64 = 20;
pub const SELFBALANCE: u64 = 5;

pub const SLOAD: u64 = 800;
pub const SSTORE_SET: u64 = 20_000;
pub const SSTORE_RESET: u64 = 5_000;

pub const CALL: u64 = 700;
pub const CALL_VALUE: u64 = 9_000;
pub const CREATE: u64 = 32_000;
pub const SELFDESTRUCT: u64 = 5_000;

pub const LOG: u64 = 375;
pub const LOG_TOPIC: u64 = 375;
pub const LOG_DATA_BYTE: u64 = 8;

pub const EXP: u64 = 10;
pub const EXP_BYTE: u64 = 50;

pub const COPY_WORD: u64 = 3;

fn words(len: usize) -> u64 {
    (len as u64).div_ceil(WORD_SIZE as u64)
}

/// `EXP` plus a per-byte charge on the exponent's magnitude.
pub fn exp(exponent: U256) -> u64 {
    let byte_len = (exponent.bits() as u64).div_ceil(8);
    EXP + EXP_BYTE * byte_len
}

/// Copy instructions: base cost plus a per-word charge.
pub fn copy(len: usize) -> u64 {
    VERYLOW + COPY_WORD * words(len)
}

/// `LOGn`: base plus per-topic and per-byte charges.
pub fn log(topic_count: usize, data_len: usize) -> u64 {
    LOG + LOG_TOPIC * topic_count as u64 + LOG_DATA_BYTE * data_len as u64
}

/// `SSTORE`: setting a fresh slot is the expensive case.
pub fn sstore(current_is_zero: bool, new_is_zero: bool) -> u64 {
    if current_is_zero && !new_is_zero {
        SSTORE_SET
    } else {
        SSTORE_RESET
    }
}

/// `CALL`-family base cost plus the value-transfer surcharge.
pub fn call(transfers_value: bool) -> u64 {
    if transfers_value {
        CALL + CALL_VALUE
    } else {
        CALL
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exp_scales_with_exponent_width() {
        assert_eq!(exp(U256::zero()), EXP);
        assert_eq!(exp(U256::from(0xFF)), EXP + EXP_BYTE);
        assert_eq!(exp(U256::from(0x100)), EXP + 2 * EXP_BYTE);
        assert_eq!(exp(U256::MAX), EXP + 32 * EXP_BYTE);
    }

    #[test]
    fn copy_rounds_up_to_words() {
        assert_eq!(copy(0), VERYLOW);
        assert_eq!(copy(1), VERYLOW + COPY_WORD);
        assert_eq!(copy(32), VERYLOW + COPY_WORD);
        assert_eq!(copy(33), VERYLOW + 2 * COPY_WORD);
    }

    #[test]
    fn sstore_distinguishes_fresh_slots() {
        assert_eq!(sstore(true, false), SSTORE_SET);
        assert_eq!(sstore(false, false), SSTORE_RESET);
        assert_eq!(sstore(false, true), SSTORE_RESET);
        assert_eq!(sstore(true, true), SSTORE_RESET);
    }
}
