//! EIP-1559-style base-fee market.

use tessera_common::constants::{BASE_FEE_CHANGE_DENOMINATOR, ELASTICITY_MULTIPLIER};
use tessera_common::BlockHeader;

/// Base fee for the child of `parent`.
///
/// The target is half the gas limit. Utilization above target raises the fee
/// by `base · delta / target / 8` (at least 1); below target lowers it by the
/// symmetric amount, clamped at zero. Integer division throughout.
pub fn next_base_fee(parent: &BlockHeader) -> u64 {
    let target = parent.gas_limit / ELASTICITY_MULTIPLIER;
    if target == 0 || parent.gas_used == target {
        return parent.base_fee;
    }

    if parent.gas_used > target {
        let gas_delta = parent.gas_used - target;
        let fee_delta = (parent.base_fee as u128 * gas_delta as u128
            / target as u128
            / BASE_FEE_CHANGE_DENOMINATOR as u128) as u64;
        parent.base_fee.saturating_add(fee_delta.max(1))
    } else {
        let gas_delta = target - parent.gas_used;
        let fee_delta = (parent.base_fee as u128 * gas_delta as u128
            / target as u128
            / BASE_FEE_CHANGE_DENOMINATOR as u128) as u64;
        parent.base_fee.saturating_sub(fee_delta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parent(gas_limit: u64, gas_used: u64, base_fee: u64) -> BlockHeader {
        BlockHeader {
            gas_limit,
            gas_used,
            base_fee,
            ..Default::default()
        }
    }

    #[test]
    fn at_target_the_fee_is_unchanged() {
        let header = parent(30_000_000, 15_000_000, 1_000_000_000);
        assert_eq!(next_base_fee(&header), 1_000_000_000);
    }

    #[test]
    fn full_block_raises_by_an_eighth() {
        let header = parent(30_000_000, 30_000_000, 1_000_000_000);
        assert_eq!(next_base_fee(&header), 1_125_000_000);
    }

    #[test]
    fn empty_block_lowers_by_an_eighth() {
        let header = parent(30_000_000, 0, 1_000_000_000);
        assert_eq!(next_base_fee(&header), 875_000_000);
    }

    #[test]
    fn tiny_overage_still_moves_the_fee() {
        // Delta rounds to zero; the floor of 1 applies.
        let header = parent(30_000_000, 15_000_001, 1_000);
        assert_eq!(next_base_fee(&header), 1_001);
    }

    #[test]
    fn fee_bottoms_out_at_zero() {
        let header = parent(30_000_000, 0, 7);
        // 7/8 == 0 decrement; stays at 7.
        assert_eq!(next_base_fee(&header), 7);

        let header = parent(30_000_000, 0, 0);
        assert_eq!(next_base_fee(&header), 0);
    }

    #[test]
    fn bounds_hold_for_doubled_and_zero_usage() {
        let base = 2_000_000_000u64;
        let doubled = parent(30_000_000, 30_000_000, base);
        assert!(next_base_fee(&doubled) <= base + base / 8);

        let idle = parent(30_000_000, 0, base);
        assert!(next_base_fee(&idle) >= base - base / 8);
    }
}
