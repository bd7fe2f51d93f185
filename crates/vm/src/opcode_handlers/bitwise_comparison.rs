//! Comparison and bitwise ops: LT, GT, SLT, SGT, EQ, ISZERO, AND, OR, XOR,
//! NOT, BYTE, SHL, SHR, SAR.

use ethereum_types::U256;

use crate::errors::VmError;
use crate::gas_cost;
use crate::opcode_handlers::arithmetic::is_negative;
use crate::utils::bool_to_word;
use crate::vm::{OpcodeResult, VM};

const CONTINUE: OpcodeResult = OpcodeResult::Continue { pc_increment: 1 };

impl VM<'_> {
    pub fn op_lt(&mut self) -> Result<OpcodeResult, VmError> {
        let frame = self.current_frame_mut()?;
        frame.increase_consumed_gas(gas_cost::VERYLOW)?;
        let [lhs, rhs] = frame.stack.pop::<2>()?;
        frame.stack.push(bool_to_word(lhs < rhs))?;
        Ok(CONTINUE)
    }

    pub fn op_gt(&mut self) -> Result<OpcodeResult, VmError> {
        let frame = self.current_frame_mut()?;
        frame.increase_consumed_gas(gas_cost::VERYLOW)?;
        let [lhs, rhs] = frame.stack.pop::<2>()?;
        frame.stack.push(bool_to_word(lhs > rhs))?;
        Ok(CONTINUE)
    }

    pub fn op_slt(&mut self) -> Result<OpcodeResult, VmError> {
        let frame = self.current_frame_mut()?;
        frame.increase_consumed_gas(gas_cost::VERYLOW)?;
        let [lhs, rhs] = frame.stack.pop::<2>()?;
        let result = match (is_negative(lhs), is_negative(rhs)) {
            (true, false) => true,
            (false, true) => false,
            // Same sign: two's complement preserves order.
            _ => lhs < rhs,
        };
        frame.stack.push(bool_to_word(result))?;
        Ok(CONTINUE)
    }

    pub fn op_sgt(&mut self) -> Result<OpcodeResult, VmError> {
        let frame = self.current_frame_mut()?;
        frame.increase_consumed_gas(gas_cost::VERYLOW)?;
        let [lhs, rhs] = frame.stack.pop::<2>()?;
        let result = match (is_negative(lhs), is_negative(rhs)) {
            (true, false) => false,
            (false, true) => true,
            _ => lhs > rhs,
        };
        frame.stack.push(bool_to_word(result))?;
        Ok(CONTINUE)
    }

    pub fn op_eq(&mut self) -> Result<OpcodeResult, VmError> {
        let frame = self.current_frame_mut()?;
        frame.increase_consumed_gas(gas_cost::VERYLOW)?;
        let [lhs, rhs] = frame.stack.pop::<2>()?;
        frame.stack.push(bool_to_word(lhs == rhs))?;
        Ok(CONTINUE)
    }

    pub fn op_iszero(&mut self) -> Result<OpcodeResult, VmError> {
        let frame = self.current_frame_mut()?;
        frame.increase_consumed_gas(gas_cost::VERYLOW)?;
        let [value] = frame.stack.pop::<1>()?;
        frame.stack.push(bool_to_word(value.is_zero()))?;
        Ok(CONTINUE)
    }

    pub fn op_and(&mut self) -> Result<OpcodeResult, VmError> {
        let frame = self.current_frame_mut()?;
        frame.increase_consumed_gas(gas_cost::VERYLOW)?;
        let [lhs, rhs] = frame.stack.pop::<2>()?;
        frame.stack.push(lhs & rhs)?;
        Ok(CONTINUE)
    }

    pub fn op_or(&mut self) -> Result<OpcodeResult, VmError> {
        let frame = self.current_frame_mut()?;
        frame.increase_consumed_gas(gas_cost::VERYLOW)?;
        let [lhs, rhs] = frame.stack.pop::<2>()?;
        frame.stack.push(lhs | rhs)?;
        Ok(CONTINUE)
    }

    pub fn op_xor(&mut self) -> Result<OpcodeResult, VmError> {
        let frame = self.current_frame_mut()?;
        frame.increase_consumed_gas(gas_cost::VERYLOW)?;
        let [lhs, rhs] = frame.stack.pop::<2>()?;
        frame.stack.push(lhs ^ rhs)?;
        Ok(CONTINUE)
    }

    pub fn op_not(&mut self) -> Result<OpcodeResult, VmError> {
        let frame = self.current_frame_mut()?;
        frame.increase_consumed_gas(gas_cost::VERYLOW)?;
        let [value] = frame.stack.pop::<1>()?;
        frame.stack.push(!value)?;
        Ok(CONTINUE)
    }

    /// Big-endian byte extraction: index 0 is the most significant byte.
    pub fn op_byte(&mut self) -> Result<OpcodeResult, VmError> {
        let frame = self.current_frame_mut()?;
        frame.increase_consumed_gas(gas_cost::VERYLOW)?;
        let [index, value] = frame.stack.pop::<2>()?;
        let result = if index < U256::from(32) {
            let index = index.low_u64() as usize;
            U256::from(value.byte(31 - index))
        } else {
            U256::zero()
        };
        frame.stack.push(result)?;
        Ok(CONTINUE)
    }

    pub fn op_shl(&mut self) -> Result<OpcodeResult, VmError> {
        let frame = self.current_frame_mut()?;
        frame.increase_consumed_gas(gas_cost::VERYLOW)?;
        let [shift, value] = frame.stack.pop::<2>()?;
        let result = if shift < U256::from(256) {
            value << shift.low_u64() as usize
        } else {
            U256::zero()
        };
        frame.stack.push(result)?;
        Ok(CONTINUE)
    }

    pub fn op_shr(&mut self) -> Result<OpcodeResult, VmError> {
        let frame = self.current_frame_mut()?;
        frame.increase_consumed_gas(gas_cost::VERYLOW)?;
        let [shift, value] = frame.stack.pop::<2>()?;
        let result = if shift < U256::from(256) {
            value >> shift.low_u64() as usize
        } else {
            U256::zero()
        };
        frame.stack.push(result)?;
        Ok(CONTINUE)
    }

    /// Arithmetic shift right: the sign bit fills vacated positions.
    pub fn op_sar(&mut self) -> Result<OpcodeResult, VmError> {
        let frame = self.current_frame_mut()?;
        frame.increase_consumed_gas(gas_cost::VERYLOW)?;
        let [shift, value] = frame.stack.pop::<2>()?;
        let negative = is_negative(value);

        let result = if shift >= U256::from(256) {
            if negative {
                U256::MAX
            } else {
                U256::zero()
            }
        } else {
            let shift = shift.low_u64() as usize;
            let shifted = value >> shift;
            if negative && shift > 0 {
                shifted | (!(U256::MAX >> shift))
            } else {
                shifted
            }
        };
        frame.stack.push(result)?;
        Ok(CONTINUE)
    }
}
