//! Execution-environment queries: ADDRESS, BALANCE, ORIGIN, CALLER,
//! CALLVALUE, CALLDATA*, CODE*, GASPRICE, EXTCODESIZE, RETURNDATA*,
//! SELFBALANCE.

use ethereum_types::U256;

use crate::errors::VmError;
use crate::gas_cost;
use crate::utils::{address_to_word, u256_to_usize, word_to_address};
use crate::vm::{OpcodeResult, VM};

const CONTINUE: OpcodeResult = OpcodeResult::Continue { pc_increment: 1 };

impl VM<'_> {
    pub fn op_address(&mut self) -> Result<OpcodeResult, VmError> {
        let frame = self.current_frame_mut()?;
        frame.increase_consumed_gas(gas_cost::BASE)?;
        let word = address_to_word(&frame.to);
        frame.stack.push(word)?;
        Ok(CONTINUE)
    }

    pub fn op_balance(&mut self) -> Result<OpcodeResult, VmError> {
        let target = {
            let frame = self.current_frame_mut()?;
            frame.increase_consumed_gas(gas_cost::BALANCE)?;
            let [word] = frame.stack.pop::<1>()?;
            word_to_address(word)
        };
        let balance = self.state.get_balance(&target)?;
        self.current_frame_mut()?.stack.push(U256::from(balance))?;
        Ok(CONTINUE)
    }

    pub fn op_origin(&mut self) -> Result<OpcodeResult, VmError> {
        let origin = self.env.origin;
        let frame = self.current_frame_mut()?;
        frame.increase_consumed_gas(gas_cost::BASE)?;
        frame.stack.push(address_to_word(&origin))?;
        Ok(CONTINUE)
    }

    pub fn op_caller(&mut self) -> Result<OpcodeResult, VmError> {
        let frame = self.current_frame_mut()?;
        frame.increase_consumed_gas(gas_cost::BASE)?;
        let word = address_to_word(&frame.caller);
        frame.stack.push(word)?;
        Ok(CONTINUE)
    }

    pub fn op_callvalue(&mut self) -> Result<OpcodeResult, VmError> {
        let frame = self.current_frame_mut()?;
        frame.increase_consumed_gas(gas_cost::BASE)?;
        let value = frame.value;
        frame.stack.push(U256::from(value))?;
        Ok(CONTINUE)
    }

    pub fn op_calldataload(&mut self) -> Result<OpcodeResult, VmError> {
        let frame = self.current_frame_mut()?;
        frame.increase_consumed_gas(gas_cost::VERYLOW)?;
        let [offset] = frame.stack.pop::<1>()?;

        // Reads past the end of calldata are zero-padded.
        let mut padded = [0u8; 32];
        if let Ok(offset) = u256_to_usize(offset) {
            for (i, slot) in padded.iter_mut().enumerate() {
                *slot = frame
                    .calldata
                    .get(offset.wrapping_add(i))
                    .copied()
                    .unwrap_or(0);
            }
        }
        frame.stack.push(U256::from_big_endian(&padded))?;
        Ok(CONTINUE)
    }

    pub fn op_calldatasize(&mut self) -> Result<OpcodeResult, VmError> {
        let frame = self.current_frame_mut()?;
        frame.increase_consumed_gas(gas_cost::BASE)?;
        let size = frame.calldata.len();
        frame.stack.push(U256::from(size))?;
        Ok(CONTINUE)
    }

    pub fn op_calldatacopy(&mut self) -> Result<OpcodeResult, VmError> {
        let frame = self.current_frame_mut()?;
        let [dest_offset, data_offset, size] = frame.stack.pop::<3>()?;
        let size = u256_to_usize(size)?;
        frame.increase_consumed_gas(gas_cost::copy(size))?;
        let calldata = frame.calldata.clone();
        frame
            .memory
            .store_from_slice(dest_offset, size, &calldata, data_offset)?;
        Ok(CONTINUE)
    }

    pub fn op_codesize(&mut self) -> Result<OpcodeResult, VmError> {
        let frame = self.current_frame_mut()?;
        frame.increase_consumed_gas(gas_cost::BASE)?;
        let size = frame.bytecode.len();
        frame.stack.push(U256::from(size))?;
        Ok(CONTINUE)
    }

    pub fn op_codecopy(&mut self) -> Result<OpcodeResult, VmError> {
        let frame = self.current_frame_mut()?;
        let [dest_offset, code_offset, size] = frame.stack.pop::<3>()?;
        let size = u256_to_usize(size)?;
        frame.increase_consumed_gas(gas_cost::copy(size))?;
        let bytecode = frame.bytecode.clone();
        frame
            .memory
            .store_from_slice(dest_offset, size, &bytecode, code_offset)?;
        Ok(CONTINUE)
    }

    pub fn op_gasprice(&mut self) -> Result<OpcodeResult, VmError> {
        let gas_price = self.env.gas_price;
        let frame = self.current_frame_mut()?;
        frame.increase_consumed_gas(gas_cost::BASE)?;
        frame.stack.push(U256::from(gas_price))?;
        Ok(CONTINUE)
    }

    pub fn op_extcodesize(&mut self) -> Result<OpcodeResult, VmError> {
        let target = {
            let frame = self.current_frame_mut()?;
            frame.increase_consumed_gas(gas_cost::EXTCODESIZE)?;
            let [word] = frame.stack.pop::<1>()?;
            word_to_address(word)
        };
        let size = self.state.get_code(&target)?.len();
        self.current_frame_mut()?.stack.push(U256::from(size))?;
        Ok(CONTINUE)
    }

    pub fn op_returndatasize(&mut self) -> Result<OpcodeResult, VmError> {
        let frame = self.current_frame_mut()?;
        frame.increase_consumed_gas(gas_cost::BASE)?;
        let size = frame.return_data.len();
        frame.stack.push(U256::from(size))?;
        Ok(CONTINUE)
    }

    pub fn op_returndatacopy(&mut self) -> Result<OpcodeResult, VmError> {
        let frame = self.current_frame_mut()?;
        let [dest_offset, data_offset, size] = frame.stack.pop::<3>()?;
        let size = u256_to_usize(size)?;
        frame.increase_consumed_gas(gas_cost::copy(size))?;
        let return_data = frame.return_data.clone();
        frame
            .memory
            .store_from_slice(dest_offset, size, &return_data, data_offset)?;
        Ok(CONTINUE)
    }

    pub fn op_selfbalance(&mut self) -> Result<OpcodeResult, VmError> {
        let address = {
            let frame = self.current_frame_mut()?;
            frame.increase_consumed_gas(gas_cost::SELFBALANCE)?;
            frame.to
        };
        let balance = self.state.get_balance(&address)?;
        self.current_frame_mut()?.stack.push(U256::from(balance))?;
        Ok(CONTINUE)
    }
}
