use bytes::Bytes;

use tessera_common::{Address, Log};
use tessera_crypto::hash::{hash_bytes, hash_concat};
use tessera_storage::StateManager;

use crate::call_frame::{CallFrame, FrameStatus};
use crate::environment::Environment;
use crate::errors::{ExecutionReport, ExecutionResult, HaltReason, InternalError, VmError};
use crate::opcodes::{Instruction, Opcode};
use crate::utils::address_to_word;

/// What an opcode handler tells the execution loop to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpcodeResult {
    Continue { pc_increment: usize },
    /// The active frame has finished (STOP, RETURN, REVERT, or a spawned
    /// sub-frame took over).
    Halt,
}

/// The machine: an environment, the state it executes over, and the frame
/// arena. The last frame is the active one.
pub struct VM<'a> {
    pub env: Environment,
    pub state: &'a mut StateManager,
    pub call_frames: Vec<CallFrame>,
    /// Logs emitted so far; frames record a checkpoint and failures truncate
    /// back to it.
    pub logs: Vec<Log>,
}

/// `H(sender || nonce)` truncated to the credential size.
pub fn create_address(creator: &Address, nonce: u64) -> Address {
    let digest = hash_concat([creator.credential.as_slice(), &nonce.to_be_bytes()]);
    let mut credential = [0u8; 28];
    credential.copy_from_slice(&digest.as_bytes()[..28]);
    Address::new(tessera_common::AddressKind::Script, credential)
}

/// `H(0xff || sender || salt || H(init_code))` truncated to the credential
/// size.
pub fn create2_address(creator: &Address, salt: &[u8; 32], init_code: &[u8]) -> Address {
    let code_hash = hash_bytes(init_code);
    let digest = hash_concat([
        &[0xFFu8][..],
        creator.credential.as_slice(),
        salt.as_slice(),
        code_hash.as_bytes(),
    ]);
    let mut credential = [0u8; 28];
    credential.copy_from_slice(&digest.as_bytes()[..28]);
    Address::new(tessera_common::AddressKind::Script, credential)
}

impl<'a> VM<'a> {
    pub fn new(env: Environment, state: &'a mut StateManager) -> Self {
        Self {
            env,
            state,
            call_frames: Vec::new(),
            logs: Vec::new(),
        }
    }

    pub(crate) fn current_frame_mut(&mut self) -> Result<&mut CallFrame, VmError> {
        self.call_frames
            .last_mut()
            .ok_or(VmError::Internal(InternalError::EmptyFrameStack))
    }

    /// Runs a message call to `to` under the given gas budget.
    ///
    /// Value movement is the caller's business (the transaction processor
    /// credits the recipient before invoking the frame); `value` is carried
    /// as context for `CALLVALUE`.
    pub fn execute_call(
        &mut self,
        caller: Address,
        to: Address,
        calldata: Bytes,
        value: u64,
        gas_limit: u64,
        is_static: bool,
    ) -> Result<ExecutionReport, VmError> {
        let bytecode = self.state.get_code(&to)?;
        let snapshot = self.state.snapshot();
        let frame = CallFrame::new(
            caller,
            to,
            to,
            bytecode,
            calldata,
            value,
            gas_limit,
            is_static,
            snapshot,
            self.logs.len(),
        );
        self.call_frames.push(frame);
        self.run()
    }

    /// Deploys a contract from `init_code`.
    ///
    /// The creator's nonce feeds the new address and is incremented before
    /// the init frame runs, so it stays incremented even when the create
    /// fails. The deposit of `value` into the new account is covered by the
    /// frame snapshot.
    pub fn execute_create(
        &mut self,
        creator: Address,
        value: u64,
        init_code: Bytes,
        gas_limit: u64,
    ) -> Result<ExecutionReport, VmError> {
        let nonce = self.state.get_nonce(&creator)?;
        self.state.increment_nonce(&creator)?;
        let new_address = create_address(&creator, nonce);

        let snapshot = self.state.snapshot();
        if value > 0 {
            self.state.add_balance(&new_address, value)?;
        }

        let mut frame = CallFrame::new(
            creator,
            new_address,
            new_address,
            init_code,
            Bytes::new(),
            value,
            gas_limit,
            false,
            snapshot,
            self.logs.len(),
        );
        frame.create_address = Some(new_address);
        self.call_frames.push(frame);
        self.run()
    }

    /// Main execution loop: steps the active frame, settles finished frames,
    /// and unwinds into parents until the root frame completes.
    ///
    /// Handlers that spawn a sub-frame advance the parent's pc themselves
    /// before pushing, so `Continue { 0 }` resumes cleanly in the child.
    fn run(&mut self) -> Result<ExecutionReport, VmError> {
        loop {
            match self.step() {
                Ok(OpcodeResult::Continue { pc_increment }) => {
                    let frame = self.current_frame_mut()?;
                    frame.pc += pc_increment;
                    continue;
                }
                Ok(OpcodeResult::Halt) => {}
                Err(VmError::Halt(reason)) => {
                    let frame = self.current_frame_mut()?;
                    frame.gas_used = frame.gas_limit;
                    frame.status = FrameStatus::Halted(reason);
                }
                Err(other) => return Err(other),
            }

            self.settle_finished_frame()?;
            if self.call_frames.len() == 1 {
                return self.build_report();
            }
            self.return_to_parent()?;
        }
    }

    /// Fetches, charges and dispatches the instruction at the program
    /// counter. Running off the end of the code is an implicit STOP.
    fn step(&mut self) -> Result<OpcodeResult, VmError> {
        let frame = self.current_frame_mut()?;
        let Some(byte) = frame.bytecode.get(frame.pc).copied() else {
            frame.status = FrameStatus::Stopped;
            return Ok(OpcodeResult::Halt);
        };
        let instruction =
            Instruction::from_u8(byte).ok_or(HaltReason::InvalidOpcode(byte))?;

        match instruction {
            Instruction::Push(width) => self.op_push(width),
            Instruction::Dup(depth) => self.op_dup(depth),
            Instruction::Swap(depth) => self.op_swap(depth),
            Instruction::Log(topic_count) => self.op_log(topic_count),
            Instruction::Op(opcode) => self.dispatch(opcode),
        }
    }

    fn dispatch(&mut self, opcode: Opcode) -> Result<OpcodeResult, VmError> {
        use Opcode::*;
        match opcode {
            Stop => self.op_stop(),
            Add => self.op_add(),
            Mul => self.op_mul(),
            Sub => self.op_sub(),
            Div => self.op_div(),
            SDiv => self.op_sdiv(),
            Mod => self.op_mod(),
            SMod => self.op_smod(),
            AddMod => self.op_addmod(),
            MulMod => self.op_mulmod(),
            Exp => self.op_exp(),
            Lt => self.op_lt(),
            Gt => self.op_gt(),
            Slt => self.op_slt(),
            Sgt => self.op_sgt(),
            Eq => self.op_eq(),
            IsZero => self.op_iszero(),
            And => self.op_and(),
            Or => self.op_or(),
            Xor => self.op_xor(),
            Not => self.op_not(),
            Byte => self.op_byte(),
            Shl => self.op_shl(),
            Shr => self.op_shr(),
            Sar => self.op_sar(),
            Address => self.op_address(),
            Balance => self.op_balance(),
            Origin => self.op_origin(),
            Caller => self.op_caller(),
            CallValue => self.op_callvalue(),
            CallDataLoad => self.op_calldataload(),
            CallDataSize => self.op_calldatasize(),
            CallDataCopy => self.op_calldatacopy(),
            CodeSize => self.op_codesize(),
            CodeCopy => self.op_codecopy(),
            GasPrice => self.op_gasprice(),
            ExtCodeSize => self.op_extcodesize(),
            ReturnDataSize => self.op_returndatasize(),
            ReturnDataCopy => self.op_returndatacopy(),
            BlockHash => self.op_blockhash(),
            Coinbase => self.op_coinbase(),
            Timestamp => self.op_timestamp(),
            Number => self.op_number(),
            PrevRandao => self.op_prevrandao(),
            GasLimit => self.op_gaslimit(),
            ChainId => self.op_chainid(),
            SelfBalance => self.op_selfbalance(),
            BaseFee => self.op_basefee(),
            Pop => self.op_pop(),
            MLoad => self.op_mload(),
            MStore => self.op_mstore(),
            SLoad => self.op_sload(),
            SStore => self.op_sstore(),
            Jump => self.op_jump(),
            JumpI => self.op_jumpi(),
            Pc => self.op_pc(),
            MSize => self.op_msize(),
            Gas => self.op_gas(),
            JumpDest => self.op_jumpdest(),
            Create => self.op_create(),
            Call => self.op_call(),
            CallCode => self.op_callcode(),
            Return => self.op_return(),
            DelegateCall => self.op_delegatecall(),
            Create2 => self.op_create2(),
            StaticCall => self.op_staticcall(),
            Revert => self.op_revert(),
            Invalid => Err(HaltReason::InvalidOpcode(Opcode::Invalid as u8).into()),
            SelfDestruct => self.op_selfdestruct(),
            // Range markers are decoded through `Instruction`, never
            // dispatched directly.
            Push1 | Push32 | Dup1 | Dup16 | Swap1 | Swap16 | Log0 | Log4 => {
                Err(HaltReason::InvalidOpcode(opcode as u8).into())
            }
        }
    }

    /// Rolls back a failed frame's state and logs; deposits created code for
    /// a successful create frame.
    fn settle_finished_frame(&mut self) -> Result<(), VmError> {
        let frame = self
            .call_frames
            .last()
            .ok_or(VmError::Internal(InternalError::EmptyFrameStack))?;
        let status = frame.status.clone();
        let snapshot = frame.snapshot;
        let checkpoint = frame.logs_checkpoint;
        let create_address = frame.create_address;
        let output = frame.output.clone();

        match status {
            FrameStatus::Stopped => {
                if let Some(address) = create_address {
                    self.state.set_code(&address, &output)?;
                }
            }
            FrameStatus::Reverted | FrameStatus::Halted(_) => {
                self.state.revert(&snapshot)?;
                self.logs.truncate(checkpoint);
            }
            FrameStatus::Running => {}
        }
        Ok(())
    }

    /// Pops the finished child and feeds its result back into the parent:
    /// gas refund, return-data buffer, memory window, and the status word.
    fn return_to_parent(&mut self) -> Result<(), VmError> {
        let child = self
            .call_frames
            .pop()
            .ok_or(VmError::Internal(InternalError::EmptyFrameStack))?;
        let parent = self.current_frame_mut()?;

        match child.status {
            FrameStatus::Stopped | FrameStatus::Reverted => {
                parent.refund_gas(child.gas_remaining());
            }
            // Exceptional halts consume the whole sub-frame budget.
            FrameStatus::Halted(_) => {}
            FrameStatus::Running => {
                return Err(VmError::Internal(InternalError::EmptyFrameStack));
            }
        }

        match child.status {
            FrameStatus::Stopped => match child.create_address {
                Some(address) => {
                    parent.return_data = Bytes::new();
                    parent.stack.push(address_to_word(&address))?;
                }
                None => {
                    parent.return_data = child.output.clone();
                    let window = child.ret_size.min(child.output.len());
                    if window > 0 {
                        parent
                            .memory
                            .store_data(child.ret_offset, &child.output[..window])?;
                    }
                    parent.stack.push(ethereum_types::U256::one())?;
                }
            },
            FrameStatus::Reverted => {
                parent.return_data = child.output.clone();
                if child.create_address.is_none() {
                    let window = child.ret_size.min(child.output.len());
                    if window > 0 {
                        parent
                            .memory
                            .store_data(child.ret_offset, &child.output[..window])?;
                    }
                }
                parent.stack.push(ethereum_types::U256::zero())?;
            }
            FrameStatus::Halted(_) => {
                parent.return_data = Bytes::new();
                parent.stack.push(ethereum_types::U256::zero())?;
            }
            FrameStatus::Running => {}
        }
        Ok(())
    }

    fn build_report(&mut self) -> Result<ExecutionReport, VmError> {
        let frame = self
            .call_frames
            .pop()
            .ok_or(VmError::Internal(InternalError::EmptyFrameStack))?;
        let (result, gas_used) = match frame.status {
            FrameStatus::Stopped => (ExecutionResult::Success, frame.gas_used),
            FrameStatus::Reverted => (ExecutionResult::Revert, frame.gas_used),
            FrameStatus::Halted(reason) => (ExecutionResult::Halted(reason), frame.gas_limit),
            FrameStatus::Running => {
                return Err(VmError::Internal(InternalError::EmptyFrameStack));
            }
        };
        let created_address = if result.is_success() {
            frame.create_address
        } else {
            None
        };
        Ok(ExecutionReport {
            result,
            gas_used,
            output: frame.output,
            logs: std::mem::take(&mut self.logs),
            created_address,
        })
    }
}
