use std::collections::HashSet;

use bytes::Bytes;
use ethereum_types::U256;

use tessera_common::Address;
use tessera_storage::StateSnapshot;

use crate::constants::STACK_LIMIT;
use crate::errors::{HaltReason, InternalError, VmError};
use crate::memory::Memory;
use crate::opcodes::Instruction;

/// Word stack, bounded at 1024 entries.
#[derive(Debug, Default, Clone)]
pub struct Stack {
    values: Vec<U256>,
}

impl Stack {
    pub fn push(&mut self, value: U256) -> Result<(), VmError> {
        if self.values.len() >= STACK_LIMIT {
            return Err(HaltReason::StackOverflow.into());
        }
        self.values.push(value);
        Ok(())
    }

    /// Pops `N` words; the first element is the topmost.
    pub fn pop<const N: usize>(&mut self) -> Result<[U256; N], VmError> {
        if self.values.len() < N {
            return Err(HaltReason::StackUnderflow.into());
        }
        let mut out = [U256::zero(); N];
        for slot in out.iter_mut() {
            *slot = self
                .values
                .pop()
                .ok_or(HaltReason::StackUnderflow)?;
        }
        Ok(out)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Pushes a copy of the `n`-th word from the top (1-based).
    pub fn dup(&mut self, n: usize) -> Result<(), VmError> {
        if self.values.len() < n {
            return Err(HaltReason::StackUnderflow.into());
        }
        let value = self.values[self.values.len() - n];
        self.push(value)
    }

    /// Swaps the top word with the `n`-th word below it (1-based).
    pub fn swap(&mut self, n: usize) -> Result<(), VmError> {
        if self.values.len() < n + 1 {
            return Err(HaltReason::StackUnderflow.into());
        }
        let top = self.values.len() - 1;
        self.values.swap(top, top - n);
        Ok(())
    }
}

/// How a finished frame ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameStatus {
    Running,
    /// STOP or RETURN.
    Stopped,
    /// Explicit REVERT.
    Reverted,
    /// Exceptional halt; consumes all frame gas.
    Halted(HaltReason),
}

/// One invocation context: a call or a create.
#[derive(Debug)]
pub struct CallFrame {
    /// `msg.sender` of this frame.
    pub caller: Address,
    /// Account whose storage and balance this frame touches.
    pub to: Address,
    /// Account the bytecode was loaded from (differs under delegate calls).
    pub code_address: Address,
    pub bytecode: Bytes,
    pub calldata: Bytes,
    pub value: u64,
    pub gas_limit: u64,
    pub gas_used: u64,
    pub pc: usize,
    pub stack: Stack,
    pub memory: Memory,
    pub is_static: bool,
    /// Set on create frames: successful output becomes the contract code.
    pub create_address: Option<Address>,
    /// Parent memory window for returned bytes.
    pub ret_offset: U256,
    pub ret_size: usize,
    /// State rollback point taken when the frame was opened.
    pub snapshot: StateSnapshot,
    /// Length of the shared log vector when the frame was opened.
    pub logs_checkpoint: usize,
    /// Bytes set by RETURN or REVERT.
    pub output: Bytes,
    /// Output of the most recent completed sub-call.
    pub return_data: Bytes,
    pub status: FrameStatus,
    valid_jump_destinations: HashSet<usize>,
}

impl CallFrame {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        caller: Address,
        to: Address,
        code_address: Address,
        bytecode: Bytes,
        calldata: Bytes,
        value: u64,
        gas_limit: u64,
        is_static: bool,
        snapshot: StateSnapshot,
        logs_checkpoint: usize,
    ) -> Self {
        let valid_jump_destinations = analyze_jump_destinations(&bytecode);
        Self {
            caller,
            to,
            code_address,
            bytecode,
            calldata,
            value,
            gas_limit,
            gas_used: 0,
            pc: 0,
            stack: Stack::default(),
            memory: Memory::new(),
            is_static,
            create_address: None,
            ret_offset: U256::zero(),
            ret_size: 0,
            snapshot,
            logs_checkpoint,
            output: Bytes::new(),
            return_data: Bytes::new(),
            status: FrameStatus::Running,
            valid_jump_destinations,
        }
    }

    pub fn gas_remaining(&self) -> u64 {
        self.gas_limit.saturating_sub(self.gas_used)
    }

    /// Charges gas up front; an uncoverable charge is an out-of-gas halt.
    pub fn increase_consumed_gas(&mut self, cost: u64) -> Result<(), VmError> {
        let next = self
            .gas_used
            .checked_add(cost)
            .ok_or(InternalError::GasOverflow)?;
        if next > self.gas_limit {
            return Err(HaltReason::OutOfGas.into());
        }
        self.gas_used = next;
        Ok(())
    }

    /// Returns gas to the frame after a sub-call spent less than it was given.
    pub fn refund_gas(&mut self, amount: u64) {
        self.gas_used = self.gas_used.saturating_sub(amount);
    }

    pub fn is_valid_jump_destination(&self, target: usize) -> bool {
        self.valid_jump_destinations.contains(&target)
    }

    /// Immediate bytes of a PUSH at the current pc, zero-padded past the end
    /// of the code.
    pub fn push_immediate(&mut self, width: usize) -> U256 {
        let mut padded = [0u8; 32];
        for i in 0..width {
            padded[32 - width + i] = self
                .bytecode
                .get(self.pc + 1 + i)
                .copied()
                .unwrap_or(0);
        }
        U256::from_big_endian(&padded)
    }
}

/// JUMPDEST positions, skipping push immediates.
fn analyze_jump_destinations(code: &[u8]) -> HashSet<usize> {
    let mut destinations = HashSet::new();
    let mut pc = 0;
    while pc < code.len() {
        let byte = code[pc];
        if byte == 0x5B {
            destinations.insert(pc);
        }
        let skip = match Instruction::from_u8(byte) {
            Some(instruction) => instruction.immediate_len(),
            None => 0,
        };
        pc += 1 + skip;
    }
    destinations
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stack_limits_are_enforced() {
        let mut stack = Stack::default();
        for i in 0..STACK_LIMIT {
            stack.push(U256::from(i)).unwrap();
        }
        assert!(matches!(
            stack.push(U256::zero()),
            Err(VmError::Halt(HaltReason::StackOverflow))
        ));

        let mut empty = Stack::default();
        assert!(matches!(
            empty.pop::<1>(),
            Err(VmError::Halt(HaltReason::StackUnderflow))
        ));
    }

    #[test]
    fn pop_returns_topmost_first() {
        let mut stack = Stack::default();
        stack.push(U256::from(1)).unwrap();
        stack.push(U256::from(2)).unwrap();
        let [top, below] = stack.pop::<2>().unwrap();
        assert_eq!(top, U256::from(2));
        assert_eq!(below, U256::from(1));
    }

    #[test]
    fn dup_and_swap() {
        let mut stack = Stack::default();
        stack.push(U256::from(10)).unwrap();
        stack.push(U256::from(20)).unwrap();
        stack.dup(2).unwrap();
        let [top] = stack.pop::<1>().unwrap();
        assert_eq!(top, U256::from(10));

        stack.swap(1).unwrap();
        let [a, b] = stack.pop::<2>().unwrap();
        assert_eq!((a, b), (U256::from(10), U256::from(20)));
    }

    #[test]
    fn jumpdest_analysis_skips_push_immediates() {
        // PUSH2 0x5B5B, JUMPDEST
        let code = [0x61, 0x5B, 0x5B, 0x5B];
        let destinations = analyze_jump_destinations(&code);
        assert!(!destinations.contains(&1));
        assert!(!destinations.contains(&2));
        assert!(destinations.contains(&3));
    }
}
