//! Deterministic wire framing for protocol structures.
//!
//! Everything on the wire is a fixed-order, big-endian concatenation of
//! fields: `u64`/`u32` as MSB-first bytes, fixed-size byte arrays verbatim,
//! variable-length byte fields as `len:u64 || bytes`. There are no item
//! headers; a structure is decoded by reading its fields back in the order
//! they were written.

pub mod decode;
pub mod encode;
pub mod error;
pub mod structs;

pub use decode::WireDecode;
pub use encode::WireEncode;
pub use error::DecodeError;
pub use structs::{Decoder, Encoder};
