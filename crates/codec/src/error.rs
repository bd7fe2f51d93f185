use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("input ended before the field could be read")]
    UnexpectedEof,
    #[error("length prefix {0} exceeds the remaining input")]
    BadLengthPrefix(u64),
    #[error("invalid boolean byte {0:#04x}")]
    InvalidBoolean(u8),
    #[error("unconsumed trailing bytes after decoding")]
    TrailingBytes,
    #[error("{0}")]
    Custom(String),
}

impl DecodeError {
    /// Wraps the error with the name of the structure or field being decoded.
    pub fn with_context(self, context: &str) -> Self {
        DecodeError::Custom(format!("{context}: {self}"))
    }
}
