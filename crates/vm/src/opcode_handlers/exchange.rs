//! SWAP1..SWAP16: exchange the top stack word with a deeper one.

use crate::errors::VmError;
use crate::gas_cost;
use crate::vm::{OpcodeResult, VM};

impl VM<'_> {
    pub fn op_swap(&mut self, depth: usize) -> Result<OpcodeResult, VmError> {
        let frame = self.current_frame_mut()?;
        frame.increase_consumed_gas(gas_cost::VERYLOW)?;
        frame.stack.swap(depth)?;
        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}
