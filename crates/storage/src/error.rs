use thiserror::Error;

use tessera_codec::DecodeError;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("a lock was poisoned: {0}")]
    LockPoisoned(String),
    #[error("decode: {0}")]
    Decode(#[from] DecodeError),
    #[error("balance overflow for account")]
    BalanceOverflow,
    #[error("balance underflow for account")]
    InsufficientBalance,
    #[error("corrupt durable log: {0}")]
    CorruptLog(String),
    #[error("{0}")]
    Custom(String),
}
