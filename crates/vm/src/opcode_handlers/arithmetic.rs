//! Arithmetic over modular 2^256 integers: ADD, MUL, SUB, DIV, SDIV, MOD,
//! SMOD, ADDMOD, MULMOD, EXP.

use ethereum_types::{U256, U512};

use crate::errors::VmError;
use crate::gas_cost;
use crate::vm::{OpcodeResult, VM};

const CONTINUE: OpcodeResult = OpcodeResult::Continue { pc_increment: 1 };

pub(crate) fn is_negative(value: U256) -> bool {
    value.bit(255)
}

pub(crate) fn twos_complement(value: U256) -> U256 {
    (!value).overflowing_add(U256::one()).0
}

impl VM<'_> {
    pub fn op_add(&mut self) -> Result<OpcodeResult, VmError> {
        let frame = self.current_frame_mut()?;
        frame.increase_consumed_gas(gas_cost::VERYLOW)?;
        let [lhs, rhs] = frame.stack.pop::<2>()?;
        frame.stack.push(lhs.overflowing_add(rhs).0)?;
        Ok(CONTINUE)
    }

    pub fn op_mul(&mut self) -> Result<OpcodeResult, VmError> {
        let frame = self.current_frame_mut()?;
        frame.increase_consumed_gas(gas_cost::LOW)?;
        let [lhs, rhs] = frame.stack.pop::<2>()?;
        frame.stack.push(lhs.overflowing_mul(rhs).0)?;
        Ok(CONTINUE)
    }

    pub fn op_sub(&mut self) -> Result<OpcodeResult, VmError> {
        let frame = self.current_frame_mut()?;
        frame.increase_consumed_gas(gas_cost::VERYLOW)?;
        let [lhs, rhs] = frame.stack.pop::<2>()?;
        frame.stack.push(lhs.overflowing_sub(rhs).0)?;
        Ok(CONTINUE)
    }

    pub fn op_div(&mut self) -> Result<OpcodeResult, VmError> {
        let frame = self.current_frame_mut()?;
        frame.increase_consumed_gas(gas_cost::LOW)?;
        let [lhs, rhs] = frame.stack.pop::<2>()?;
        frame
            .stack
            .push(lhs.checked_div(rhs).unwrap_or_default())?;
        Ok(CONTINUE)
    }

    pub fn op_sdiv(&mut self) -> Result<OpcodeResult, VmError> {
        let frame = self.current_frame_mut()?;
        frame.increase_consumed_gas(gas_cost::LOW)?;
        let [mut lhs, mut rhs] = frame.stack.pop::<2>()?;

        let mut negative = false;
        if is_negative(lhs) {
            lhs = twos_complement(lhs);
            negative = !negative;
        }
        if is_negative(rhs) {
            rhs = twos_complement(rhs);
            negative = !negative;
        }

        let quotient = match lhs.checked_div(rhs) {
            Some(mut quotient) => {
                if negative {
                    quotient = twos_complement(quotient);
                }
                quotient
            }
            None => U256::zero(),
        };
        frame.stack.push(quotient)?;
        Ok(CONTINUE)
    }

    pub fn op_mod(&mut self) -> Result<OpcodeResult, VmError> {
        let frame = self.current_frame_mut()?;
        frame.increase_consumed_gas(gas_cost::LOW)?;
        let [lhs, rhs] = frame.stack.pop::<2>()?;
        frame
            .stack
            .push(lhs.checked_rem(rhs).unwrap_or_default())?;
        Ok(CONTINUE)
    }

    pub fn op_smod(&mut self) -> Result<OpcodeResult, VmError> {
        let frame = self.current_frame_mut()?;
        frame.increase_consumed_gas(gas_cost::LOW)?;
        let [mut lhs, mut rhs] = frame.stack.pop::<2>()?;

        // The remainder takes the dividend's sign.
        let negative = is_negative(lhs);
        if negative {
            lhs = twos_complement(lhs);
        }
        if is_negative(rhs) {
            rhs = twos_complement(rhs);
        }

        let remainder = match lhs.checked_rem(rhs) {
            Some(mut remainder) => {
                if negative && !remainder.is_zero() {
                    remainder = twos_complement(remainder);
                }
                remainder
            }
            None => U256::zero(),
        };
        frame.stack.push(remainder)?;
        Ok(CONTINUE)
    }

    pub fn op_addmod(&mut self) -> Result<OpcodeResult, VmError> {
        let frame = self.current_frame_mut()?;
        frame.increase_consumed_gas(gas_cost::MID)?;
        let [lhs, rhs, modulus] = frame.stack.pop::<3>()?;
        if modulus.is_zero() {
            frame.stack.push(U256::zero())?;
        } else {
            let sum = U512::from(lhs) + U512::from(rhs);
            let reduced = sum % U512::from(modulus);
            frame.stack.push(u512_low(reduced))?;
        }
        Ok(CONTINUE)
    }

    pub fn op_mulmod(&mut self) -> Result<OpcodeResult, VmError> {
        let frame = self.current_frame_mut()?;
        frame.increase_consumed_gas(gas_cost::MID)?;
        let [lhs, rhs, modulus] = frame.stack.pop::<3>()?;
        if modulus.is_zero() {
            frame.stack.push(U256::zero())?;
        } else {
            let product = lhs.full_mul(rhs);
            let reduced = product % U512::from(modulus);
            frame.stack.push(u512_low(reduced))?;
        }
        Ok(CONTINUE)
    }

    pub fn op_exp(&mut self) -> Result<OpcodeResult, VmError> {
        let frame = self.current_frame_mut()?;
        let [base, exponent] = frame.stack.pop::<2>()?;
        frame.increase_consumed_gas(gas_cost::exp(exponent))?;
        frame.stack.push(base.overflowing_pow(exponent).0)?;
        Ok(CONTINUE)
    }
}

/// A value already reduced below 2^256 fits the low limbs.
fn u512_low(value: U512) -> U256 {
    let mut limbs = [0u64; 4];
    limbs.copy_from_slice(&value.0[..4]);
    U256(limbs)
}
