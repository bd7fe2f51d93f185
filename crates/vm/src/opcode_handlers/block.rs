//! Block-context queries: BLOCKHASH, COINBASE, TIMESTAMP, NUMBER,
//! PREVRANDAO, GASLIMIT, CHAINID, BASEFEE.

use ethereum_types::U256;

use crate::errors::VmError;
use crate::gas_cost;
use crate::utils::{address_to_word, h256_to_word};
use crate::vm::{OpcodeResult, VM};

const CONTINUE: OpcodeResult = OpcodeResult::Continue { pc_increment: 1 };

/// How far back `BLOCKHASH` serves ancestors.
const BLOCKHASH_WINDOW: u64 = 256;

impl VM<'_> {
    /// Hash of one of the 256 most recent ancestors; zero otherwise.
    pub fn op_blockhash(&mut self) -> Result<OpcodeResult, VmError> {
        let current_block = self.env.block_number;
        let frame = self.current_frame_mut()?;
        frame.increase_consumed_gas(gas_cost::BLOCKHASH)?;
        let [number] = frame.stack.pop::<1>()?;

        let in_window = number < U256::from(current_block)
            && number + U256::from(BLOCKHASH_WINDOW) >= U256::from(current_block);
        let result = if in_window {
            let requested = number.low_u64();
            h256_to_word(self.env.block_hash(requested))
        } else {
            U256::zero()
        };
        self.current_frame_mut()?.stack.push(result)?;
        Ok(CONTINUE)
    }

    pub fn op_coinbase(&mut self) -> Result<OpcodeResult, VmError> {
        let coinbase = self.env.coinbase;
        let frame = self.current_frame_mut()?;
        frame.increase_consumed_gas(gas_cost::BASE)?;
        frame.stack.push(address_to_word(&coinbase))?;
        Ok(CONTINUE)
    }

    pub fn op_timestamp(&mut self) -> Result<OpcodeResult, VmError> {
        let timestamp = self.env.timestamp;
        let frame = self.current_frame_mut()?;
        frame.increase_consumed_gas(gas_cost::BASE)?;
        frame.stack.push(U256::from(timestamp))?;
        Ok(CONTINUE)
    }

    pub fn op_number(&mut self) -> Result<OpcodeResult, VmError> {
        let number = self.env.block_number;
        let frame = self.current_frame_mut()?;
        frame.increase_consumed_gas(gas_cost::BASE)?;
        frame.stack.push(U256::from(number))?;
        Ok(CONTINUE)
    }

    pub fn op_prevrandao(&mut self) -> Result<OpcodeResult, VmError> {
        let randao = self.env.prev_randao;
        let frame = self.current_frame_mut()?;
        frame.increase_consumed_gas(gas_cost::BASE)?;
        frame.stack.push(h256_to_word(randao))?;
        Ok(CONTINUE)
    }

    pub fn op_gaslimit(&mut self) -> Result<OpcodeResult, VmError> {
        let gas_limit = self.env.block_gas_limit;
        let frame = self.current_frame_mut()?;
        frame.increase_consumed_gas(gas_cost::BASE)?;
        frame.stack.push(U256::from(gas_limit))?;
        Ok(CONTINUE)
    }

    pub fn op_chainid(&mut self) -> Result<OpcodeResult, VmError> {
        let chain_id = self.env.chain_id;
        let frame = self.current_frame_mut()?;
        frame.increase_consumed_gas(gas_cost::BASE)?;
        frame.stack.push(U256::from(chain_id))?;
        Ok(CONTINUE)
    }

    pub fn op_basefee(&mut self) -> Result<OpcodeResult, VmError> {
        let base_fee = self.env.base_fee;
        let frame = self.current_frame_mut()?;
        frame.increase_consumed_gas(gas_cost::BASE)?;
        frame.stack.push(U256::from(base_fee))?;
        Ok(CONTINUE)
    }
}
