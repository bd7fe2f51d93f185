//! Calls, creates and SELFDESTRUCT. Each sub-frame carries its own state
//! snapshot: a failing child rolls back exactly its own mutations.

use bytes::Bytes;
use ethereum_types::U256;

use tessera_common::Address;

use crate::call_frame::{CallFrame, FrameStatus};
use crate::constants::MAX_CALL_DEPTH;
use crate::errors::{HaltReason, VmError};
use crate::gas_cost;
use crate::utils::{u256_to_usize, word_to_address};
use crate::vm::{create2_address, create_address, OpcodeResult, VM};

const CONTINUE: OpcodeResult = OpcodeResult::Continue { pc_increment: 1 };
/// Resume in the freshly pushed child frame.
const ENTER_CHILD: OpcodeResult = OpcodeResult::Continue { pc_increment: 0 };

/// Operand layout shared by the call family.
struct CallOperands {
    gas: U256,
    target: Address,
    value: u64,
    value_overflows: bool,
    args_offset: U256,
    args_size: usize,
    ret_offset: U256,
    ret_size: usize,
}

impl VM<'_> {
    /// CALL: message call with value into `target`, running the target's
    /// code over the target's storage.
    pub fn op_call(&mut self) -> Result<OpcodeResult, VmError> {
        let operands = self.pop_call_operands(true)?;
        {
            let frame = self.current_frame_mut()?;
            if frame.is_static && operands.value > 0 {
                return Err(HaltReason::StaticViolation.into());
            }
        }
        let (caller, target) = {
            let frame = self.current_frame_mut()?;
            (frame.to, operands.target)
        };
        self.generic_call(operands, caller, target, target, None, true)
    }

    /// CALLCODE: run the target's code over the *current* contract's storage
    /// and balance.
    pub fn op_callcode(&mut self) -> Result<OpcodeResult, VmError> {
        let operands = self.pop_call_operands(true)?;
        let (caller, storage_target, code_source) = {
            let frame = self.current_frame_mut()?;
            (frame.to, frame.to, operands.target)
        };
        // Value feeds CALLVALUE in the child but never moves accounts.
        self.generic_call(operands, caller, storage_target, code_source, None, false)
    }

    /// DELEGATECALL: the target's code with the current frame's storage,
    /// caller and value.
    pub fn op_delegatecall(&mut self) -> Result<OpcodeResult, VmError> {
        let mut operands = self.pop_call_operands(false)?;
        let (caller, storage_target, code_source, value) = {
            let frame = self.current_frame_mut()?;
            (frame.caller, frame.to, operands.target, frame.value)
        };
        operands.value = value;
        operands.value_overflows = false;
        self.generic_call(operands, caller, storage_target, code_source, None, false)
    }

    /// STATICCALL: value-less call in a frame that forbids state mutation.
    pub fn op_staticcall(&mut self) -> Result<OpcodeResult, VmError> {
        let operands = self.pop_call_operands(false)?;
        let (caller, target) = {
            let frame = self.current_frame_mut()?;
            (frame.to, operands.target)
        };
        self.generic_call(operands, caller, target, target, Some(true), false)
    }

    pub fn op_create(&mut self) -> Result<OpcodeResult, VmError> {
        self.generic_create(false)
    }

    pub fn op_create2(&mut self) -> Result<OpcodeResult, VmError> {
        self.generic_create(true)
    }

    /// SELFDESTRUCT: moves the contract's whole balance to the beneficiary
    /// and halts the frame. Accounts are never deleted.
    pub fn op_selfdestruct(&mut self) -> Result<OpcodeResult, VmError> {
        let (contract, beneficiary) = {
            let frame = self.current_frame_mut()?;
            if frame.is_static {
                return Err(HaltReason::StaticViolation.into());
            }
            frame.increase_consumed_gas(gas_cost::SELFDESTRUCT)?;
            let [beneficiary] = frame.stack.pop::<1>()?;
            (frame.to, word_to_address(beneficiary))
        };

        let balance = self.state.get_balance(&contract)?;
        if balance > 0 && beneficiary != contract {
            self.state.sub_balance(&contract, balance)?;
            self.state.add_balance(&beneficiary, balance)?;
        }

        let frame = self.current_frame_mut()?;
        frame.status = FrameStatus::Stopped;
        Ok(OpcodeResult::Halt)
    }

    fn pop_call_operands(&mut self, with_value: bool) -> Result<CallOperands, VmError> {
        let frame = self.current_frame_mut()?;
        let [gas, target_word] = frame.stack.pop::<2>()?;
        let (value, value_overflows) = if with_value {
            let [value_word] = frame.stack.pop::<1>()?;
            match u64::try_from(value_word) {
                Ok(value) => (value, false),
                Err(_) => (0, true),
            }
        } else {
            (0, false)
        };
        let [args_offset, args_size, ret_offset, ret_size] = frame.stack.pop::<4>()?;
        Ok(CallOperands {
            gas,
            target: word_to_address(target_word),
            value,
            value_overflows,
            args_offset,
            args_size: u256_to_usize(args_size)?,
            ret_offset,
            ret_size: u256_to_usize(ret_size)?,
        })
    }

    /// Shared call machinery. `force_static` pins the child's static flag;
    /// otherwise the parent's is inherited. `transfer_value` moves the value
    /// between the caller contract and the storage target.
    fn generic_call(
        &mut self,
        operands: CallOperands,
        caller: Address,
        storage_target: Address,
        code_source: Address,
        force_static: Option<bool>,
        transfer_value: bool,
    ) -> Result<OpcodeResult, VmError> {
        let depth = self.call_frames.len();

        // Base charge plus the value surcharge, then reserve the child's gas.
        let child_gas = {
            let frame = self.current_frame_mut()?;
            frame.increase_consumed_gas(gas_cost::call(operands.value > 0))?;
            let available = frame.gas_remaining();
            let requested = u64::try_from(operands.gas).unwrap_or(u64::MAX);
            let child_gas = requested.min(available);
            frame.increase_consumed_gas(child_gas)?;
            child_gas
        };

        let args = {
            let frame = self.current_frame_mut()?;
            frame
                .memory
                .load_range(operands.args_offset, operands.args_size)?
        };

        // A call the chain cannot honor fails fast: the child gas flows back
        // and the caller sees a zero status word.
        let balance = self.state.get_balance(&caller)?;
        let cannot_enter = operands.value_overflows
            || depth >= MAX_CALL_DEPTH
            || (transfer_value && balance < operands.value);
        if cannot_enter {
            let frame = self.current_frame_mut()?;
            frame.refund_gas(child_gas);
            frame.return_data = Bytes::new();
            frame.stack.push(U256::zero())?;
            return Ok(CONTINUE);
        }

        let is_static = {
            let frame = self.current_frame_mut()?;
            force_static.unwrap_or(frame.is_static)
        };

        let snapshot = self.state.snapshot();
        if transfer_value && operands.value > 0 && caller != storage_target {
            self.state.sub_balance(&caller, operands.value)?;
            self.state.add_balance(&storage_target, operands.value)?;
        }
        let bytecode = self.state.get_code(&code_source)?;

        // The parent resumes after this instruction once the child returns.
        let logs_checkpoint = self.logs.len();
        {
            let frame = self.current_frame_mut()?;
            frame.pc += 1;
        }

        let mut child = CallFrame::new(
            caller,
            storage_target,
            code_source,
            bytecode,
            Bytes::from(args),
            operands.value,
            child_gas,
            is_static,
            snapshot,
            logs_checkpoint,
        );
        child.ret_offset = operands.ret_offset;
        child.ret_size = operands.ret_size;
        self.call_frames.push(child);
        Ok(ENTER_CHILD)
    }

    fn generic_create(&mut self, salted: bool) -> Result<OpcodeResult, VmError> {
        let depth = self.call_frames.len();
        let (creator, value, value_overflows, init_code, salt, child_gas) = {
            let frame = self.current_frame_mut()?;
            if frame.is_static {
                return Err(HaltReason::StaticViolation.into());
            }
            let [value_word, offset, size] = frame.stack.pop::<3>()?;
            let salt = if salted {
                let [salt] = frame.stack.pop::<1>()?;
                Some(salt.to_big_endian())
            } else {
                None
            };
            frame.increase_consumed_gas(gas_cost::CREATE)?;
            let size = u256_to_usize(size)?;
            let init_code = frame.memory.load_range(offset, size)?;

            let (value, value_overflows) = match u64::try_from(value_word) {
                Ok(value) => (value, false),
                Err(_) => (0, true),
            };

            // The init frame gets everything the parent has left.
            let child_gas = frame.gas_remaining();
            frame.increase_consumed_gas(child_gas)?;
            (frame.to, value, value_overflows, init_code, salt, child_gas)
        };

        let balance = self.state.get_balance(&creator)?;
        if value_overflows || depth >= MAX_CALL_DEPTH || balance < value {
            let frame = self.current_frame_mut()?;
            frame.refund_gas(child_gas);
            frame.return_data = Bytes::new();
            frame.stack.push(U256::zero())?;
            return Ok(CONTINUE);
        }

        // The creator's nonce feeds the address and stays incremented even if
        // the create fails.
        let nonce = self.state.get_nonce(&creator)?;
        self.state.increment_nonce(&creator)?;
        let new_address = match salt {
            Some(salt) => create2_address(&creator, &salt, &init_code),
            None => create_address(&creator, nonce),
        };

        let snapshot = self.state.snapshot();
        if value > 0 {
            self.state.sub_balance(&creator, value)?;
            self.state.add_balance(&new_address, value)?;
        }

        let logs_checkpoint = self.logs.len();
        {
            let frame = self.current_frame_mut()?;
            frame.pc += 1;
        }

        let mut child = CallFrame::new(
            creator,
            new_address,
            new_address,
            Bytes::from(init_code),
            Bytes::new(),
            value,
            child_gas,
            false,
            snapshot,
            logs_checkpoint,
        );
        child.create_address = Some(new_address);
        self.call_frames.push(child);
        Ok(ENTER_CHILD)
    }
}
