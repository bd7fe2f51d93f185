//! Byte-addressable frame memory, growing on demand in 32-byte words.

use ethereum_types::U256;

use crate::constants::{MAX_MEMORY_SIZE, WORD_SIZE};
use crate::errors::{HaltReason, VmError};
use crate::utils::u256_to_usize;

#[derive(Debug, Default, Clone)]
pub struct Memory {
    data: Vec<u8>,
}

impl Memory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Grows (zero-filled, word-granular) so `end` is addressable.
    fn ensure(&mut self, end: usize) -> Result<(), VmError> {
        if end <= self.data.len() {
            return Ok(());
        }
        let target = end
            .checked_next_multiple_of(WORD_SIZE)
            .ok_or(HaltReason::OutOfGas)?;
        if target > MAX_MEMORY_SIZE {
            return Err(HaltReason::OutOfGas.into());
        }
        self.data.resize(target, 0);
        Ok(())
    }

    /// Reads `size` bytes at `offset`, zero-padded past the current end, and
    /// without growing the backing buffer.
    pub fn load_range(&self, offset: U256, size: usize) -> Result<Vec<u8>, VmError> {
        if size == 0 {
            return Ok(Vec::new());
        }
        let offset = u256_to_usize(offset)?;
        let mut out = vec![0u8; size];
        if offset < self.data.len() {
            let available = (self.data.len() - offset).min(size);
            out[..available].copy_from_slice(&self.data[offset..offset + available]);
        }
        Ok(out)
    }

    /// Reads one 32-byte word, growing memory to cover it.
    pub fn load_word(&mut self, offset: U256) -> Result<U256, VmError> {
        let offset = u256_to_usize(offset)?;
        let end = offset.checked_add(WORD_SIZE).ok_or(HaltReason::OutOfGas)?;
        self.ensure(end)?;
        Ok(U256::from_big_endian(&self.data[offset..end]))
    }

    /// Writes one 32-byte word, growing memory to cover it.
    pub fn store_word(&mut self, offset: U256, word: U256) -> Result<(), VmError> {
        let offset = u256_to_usize(offset)?;
        let end = offset.checked_add(WORD_SIZE).ok_or(HaltReason::OutOfGas)?;
        self.ensure(end)?;
        self.data[offset..end].copy_from_slice(&word.to_big_endian());
        Ok(())
    }

    /// Writes `data`, growing memory to cover the destination.
    pub fn store_data(&mut self, offset: U256, data: &[u8]) -> Result<(), VmError> {
        if data.is_empty() {
            return Ok(());
        }
        let offset = u256_to_usize(offset)?;
        let end = offset.checked_add(data.len()).ok_or(HaltReason::OutOfGas)?;
        self.ensure(end)?;
        self.data[offset..end].copy_from_slice(data);
        Ok(())
    }

    /// Fills `[offset, offset+size)` from `source[source_offset..]`,
    /// zero-padding where the source runs out. The destination window always
    /// grows.
    pub fn store_from_slice(
        &mut self,
        offset: U256,
        size: usize,
        source: &[u8],
        source_offset: U256,
    ) -> Result<(), VmError> {
        if size == 0 {
            return Ok(());
        }
        let offset = u256_to_usize(offset)?;
        let end = offset.checked_add(size).ok_or(HaltReason::OutOfGas)?;
        self.ensure(end)?;

        // Source offsets past the end read as zeros.
        let source_offset = match u256_to_usize(source_offset) {
            Ok(value) => value,
            Err(_) => source.len(),
        };
        for i in 0..size {
            self.data[offset + i] = source
                .get(source_offset.wrapping_add(i))
                .copied()
                .unwrap_or(0);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn words_round_trip_and_grow_by_words() {
        let mut memory = Memory::new();
        let word = U256::from(0xDEADBEEFu64);
        memory.store_word(U256::from(4), word).unwrap();
        // 4 + 32 = 36 rounds up to 64.
        assert_eq!(memory.len(), 64);
        assert_eq!(memory.load_word(U256::from(4)).unwrap(), word);
    }

    #[test]
    fn out_of_bounds_reads_are_zero_padded() {
        let memory = Memory::new();
        assert_eq!(memory.load_range(U256::from(100), 8).unwrap(), vec![0u8; 8]);
    }

    #[test]
    fn partial_source_copies_zero_pad() {
        let mut memory = Memory::new();
        memory
            .store_from_slice(U256::zero(), 6, b"ab", U256::zero())
            .unwrap();
        assert_eq!(memory.load_range(U256::zero(), 6).unwrap(), b"ab\0\0\0\0");
    }

    #[test]
    fn source_offset_past_end_reads_zeros() {
        let mut memory = Memory::new();
        memory
            .store_from_slice(U256::zero(), 4, b"abcd", U256::from(10))
            .unwrap();
        assert_eq!(memory.load_range(U256::zero(), 4).unwrap(), vec![0u8; 4]);
    }

    #[test]
    fn oversized_allocation_is_out_of_gas() {
        let mut memory = Memory::new();
        let err = memory.store_word(U256::from(u64::MAX), U256::one());
        assert!(matches!(err, Err(VmError::Halt(HaltReason::OutOfGas))));
    }
}
