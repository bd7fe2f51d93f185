//! PUSH1..PUSH32: load an immediate onto the stack.

use crate::errors::VmError;
use crate::gas_cost;
use crate::vm::{OpcodeResult, VM};

impl VM<'_> {
    /// Immediates running past the end of the code are zero-padded on the
    /// right.
    pub fn op_push(&mut self, width: usize) -> Result<OpcodeResult, VmError> {
        let frame = self.current_frame_mut()?;
        frame.increase_consumed_gas(gas_cost::VERYLOW)?;
        let value = frame.push_immediate(width);
        frame.stack.push(value)?;
        Ok(OpcodeResult::Continue {
            pc_increment: 1 + width,
        })
    }
}
