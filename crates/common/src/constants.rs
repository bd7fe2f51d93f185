/// Base cost of any transaction.
pub const TX_GAS_COST: u64 = 21_000;
/// Additional base cost of a contract-creating transaction.
pub const TX_CREATE_GAS_COST: u64 = 32_000;
/// Per-byte cost of zero bytes in transaction data.
pub const TX_DATA_ZERO_GAS_COST: u64 = 4;
/// Per-byte cost of non-zero bytes in transaction data.
pub const TX_DATA_NON_ZERO_GAS_COST: u64 = 16;

/// Default block gas limit.
pub const DEFAULT_GAS_LIMIT: u64 = 30_000_000;
/// Default base fee: 1 gwei.
pub const DEFAULT_BASE_FEE: u64 = 1_000_000_000;

/// Base-fee adjustment denominator (EIP-1559 style).
pub const BASE_FEE_CHANGE_DENOMINATOR: u64 = 8;
/// Gas target is `gas_limit / ELASTICITY_MULTIPLIER`.
pub const ELASTICITY_MULTIPLIER: u64 = 2;

/// Replace-by-fee requires a strictly >10% higher max fee.
pub const RBF_BUMP_PERCENT: u64 = 10;

/// Margin applied on top of simulated gas usage by `estimate_gas`.
pub const GAS_ESTIMATE_MARGIN_PERCENT: u64 = 20;
