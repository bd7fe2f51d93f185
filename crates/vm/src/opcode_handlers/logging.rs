//! LOG0..LOG4: append a log record to the running transaction.

use bytes::Bytes;

use tessera_common::Log;

use crate::errors::{HaltReason, VmError};
use crate::gas_cost;
use crate::utils::{u256_to_usize, word_to_h256};
use crate::vm::{OpcodeResult, VM};

impl VM<'_> {
    pub fn op_log(&mut self, topic_count: usize) -> Result<OpcodeResult, VmError> {
        let log = {
            let frame = self.current_frame_mut()?;
            if frame.is_static {
                return Err(HaltReason::StaticViolation.into());
            }
            let [offset, size] = frame.stack.pop::<2>()?;
            let size = u256_to_usize(size)?;

            let mut topics = Vec::with_capacity(topic_count);
            for _ in 0..topic_count {
                let [topic] = frame.stack.pop::<1>()?;
                topics.push(word_to_h256(topic));
            }

            frame.increase_consumed_gas(gas_cost::log(topic_count, size))?;
            let data = frame.memory.load_range(offset, size)?;
            Log {
                address: frame.to,
                topics,
                data: Bytes::from(data),
            }
        };
        self.logs.push(log);
        Ok(OpcodeResult::Continue { pc_increment: 1 })
    }
}
