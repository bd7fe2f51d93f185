//! DUP1..DUP16: duplicate a stack word.

use crate::errors::VmError;
use crate::gas_cost;
use crate::vm::{OpcodeResult, VM};

impl VM<'_> {
    pub fn op_dup(&mut self, depth: usize) -> Result<OpcodeResult, VmError> {
        let frame = self.current_frame_mut()?;
        frame.increase_consumed_gas(gas_cost::VERYLOW)?;
        frame.stack.dup(depth)?;
        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}
