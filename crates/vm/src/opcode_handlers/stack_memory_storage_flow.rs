//! POP, MLOAD, MSTORE, SLOAD, SSTORE, JUMP, JUMPI, PC, MSIZE, GAS, JUMPDEST,
//! STOP, RETURN, REVERT.

use bytes::Bytes;
use ethereum_types::U256;

use crate::call_frame::FrameStatus;
use crate::errors::{HaltReason, VmError};
use crate::gas_cost;
use crate::utils::{h256_to_word, u256_to_usize, word_to_h256};
use crate::vm::{OpcodeResult, VM};

const CONTINUE: OpcodeResult = OpcodeResult::Continue { pc_increment: 1 };

impl VM<'_> {
    pub fn op_stop(&mut self) -> Result<OpcodeResult, VmError> {
        let frame = self.current_frame_mut()?;
        frame.status = FrameStatus::Stopped;
        Ok(OpcodeResult::Halt)
    }

    pub fn op_pop(&mut self) -> Result<OpcodeResult, VmError> {
        let frame = self.current_frame_mut()?;
        frame.increase_consumed_gas(gas_cost::BASE)?;
        frame.stack.pop::<1>()?;
        Ok(CONTINUE)
    }

    pub fn op_mload(&mut self) -> Result<OpcodeResult, VmError> {
        let frame = self.current_frame_mut()?;
        frame.increase_consumed_gas(gas_cost::VERYLOW)?;
        let [offset] = frame.stack.pop::<1>()?;
        let word = frame.memory.load_word(offset)?;
        frame.stack.push(word)?;
        Ok(CONTINUE)
    }

    pub fn op_mstore(&mut self) -> Result<OpcodeResult, VmError> {
        let frame = self.current_frame_mut()?;
        frame.increase_consumed_gas(gas_cost::VERYLOW)?;
        let [offset, value] = frame.stack.pop::<2>()?;
        frame.memory.store_word(offset, value)?;
        Ok(CONTINUE)
    }

    pub fn op_sload(&mut self) -> Result<OpcodeResult, VmError> {
        let (address, key) = {
            let frame = self.current_frame_mut()?;
            frame.increase_consumed_gas(gas_cost::SLOAD)?;
            let [key] = frame.stack.pop::<1>()?;
            (frame.to, word_to_h256(key))
        };
        let value = self.state.get_storage(&address, &key)?;
        self.current_frame_mut()?.stack.push(h256_to_word(value))?;
        Ok(CONTINUE)
    }

    pub fn op_sstore(&mut self) -> Result<OpcodeResult, VmError> {
        let (address, key, value) = {
            let frame = self.current_frame_mut()?;
            if frame.is_static {
                return Err(HaltReason::StaticViolation.into());
            }
            let [key, value] = frame.stack.pop::<2>()?;
            (frame.to, word_to_h256(key), word_to_h256(value))
        };

        let current = self.state.get_storage(&address, &key)?;
        let cost = gas_cost::sstore(current.is_zero(), value.is_zero());
        self.current_frame_mut()?.increase_consumed_gas(cost)?;

        self.state.set_storage(&address, &key, value)?;
        Ok(CONTINUE)
    }

    pub fn op_jump(&mut self) -> Result<OpcodeResult, VmError> {
        let frame = self.current_frame_mut()?;
        frame.increase_consumed_gas(gas_cost::MID)?;
        let [target] = frame.stack.pop::<1>()?;
        let target = u256_to_usize(target).map_err(|_| HaltReason::BadJump)?;
        if !frame.is_valid_jump_destination(target) {
            return Err(HaltReason::BadJump.into());
        }
        frame.pc = target;
        Ok(OpcodeResult::Continue { pc_increment: 0 })
    }

    pub fn op_jumpi(&mut self) -> Result<OpcodeResult, VmError> {
        let frame = self.current_frame_mut()?;
        frame.increase_consumed_gas(gas_cost::HIGH)?;
        let [target, condition] = frame.stack.pop::<2>()?;
        if condition.is_zero() {
            return Ok(CONTINUE);
        }
        let target = u256_to_usize(target).map_err(|_| HaltReason::BadJump)?;
        if !frame.is_valid_jump_destination(target) {
            return Err(HaltReason::BadJump.into());
        }
        frame.pc = target;
        Ok(OpcodeResult::Continue { pc_increment: 0 })
    }

    pub fn op_jumpdest(&mut self) -> Result<OpcodeResult, VmError> {
        let frame = self.current_frame_mut()?;
        frame.increase_consumed_gas(gas_cost::JUMPDEST)?;
        Ok(CONTINUE)
    }

    pub fn op_pc(&mut self) -> Result<OpcodeResult, VmError> {
        let frame = self.current_frame_mut()?;
        frame.increase_consumed_gas(gas_cost::BASE)?;
        let pc = frame.pc;
        frame.stack.push(U256::from(pc))?;
        Ok(CONTINUE)
    }

    pub fn op_msize(&mut self) -> Result<OpcodeResult, VmError> {
        let frame = self.current_frame_mut()?;
        frame.increase_consumed_gas(gas_cost::BASE)?;
        let size = frame.memory.len();
        frame.stack.push(U256::from(size))?;
        Ok(CONTINUE)
    }

    pub fn op_gas(&mut self) -> Result<OpcodeResult, VmError> {
        let frame = self.current_frame_mut()?;
        frame.increase_consumed_gas(gas_cost::BASE)?;
        let remaining = frame.gas_remaining();
        frame.stack.push(U256::from(remaining))?;
        Ok(CONTINUE)
    }

    pub fn op_return(&mut self) -> Result<OpcodeResult, VmError> {
        let frame = self.current_frame_mut()?;
        let [offset, size] = frame.stack.pop::<2>()?;
        let size = u256_to_usize(size)?;
        frame.output = Bytes::from(frame.memory.load_range(offset, size)?);
        frame.status = FrameStatus::Stopped;
        Ok(OpcodeResult::Halt)
    }

    /// Rewinds this frame's state mutations and reports the actual gas
    /// consumed, returning the revert payload.
    pub fn op_revert(&mut self) -> Result<OpcodeResult, VmError> {
        let frame = self.current_frame_mut()?;
        let [offset, size] = frame.stack.pop::<2>()?;
        let size = u256_to_usize(size)?;
        frame.output = Bytes::from(frame.memory.load_range(offset, size)?);
        frame.status = FrameStatus::Reverted;
        Ok(OpcodeResult::Halt)
    }
}
