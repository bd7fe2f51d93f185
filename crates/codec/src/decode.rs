use bytes::Bytes;
use ethereum_types::H256;

use crate::error::DecodeError;

/// Types that can be read back from the wire framing.
///
/// `decode_unfinished` consumes the type's fields from the front of the
/// buffer and returns the remainder, so structures can be decoded field by
/// field in the order they were encoded.
pub trait WireDecode: Sized {
    fn decode_unfinished(buf: &[u8]) -> Result<(Self, &[u8]), DecodeError>;

    /// Decodes a value that must span the entire input.
    fn decode(buf: &[u8]) -> Result<Self, DecodeError> {
        let (value, rest) = Self::decode_unfinished(buf)?;
        if !rest.is_empty() {
            return Err(DecodeError::TrailingBytes);
        }
        Ok(value)
    }
}

fn split_at_checked(buf: &[u8], n: usize) -> Result<(&[u8], &[u8]), DecodeError> {
    if buf.len() < n {
        return Err(DecodeError::UnexpectedEof);
    }
    Ok(buf.split_at(n))
}

impl WireDecode for u8 {
    fn decode_unfinished(buf: &[u8]) -> Result<(Self, &[u8]), DecodeError> {
        let (bytes, rest) = split_at_checked(buf, 1)?;
        Ok((bytes[0], rest))
    }
}

impl WireDecode for u32 {
    fn decode_unfinished(buf: &[u8]) -> Result<(Self, &[u8]), DecodeError> {
        let (bytes, rest) = split_at_checked(buf, 4)?;
        let mut raw = [0u8; 4];
        raw.copy_from_slice(bytes);
        Ok((u32::from_be_bytes(raw), rest))
    }
}

impl WireDecode for u64 {
    fn decode_unfinished(buf: &[u8]) -> Result<(Self, &[u8]), DecodeError> {
        let (bytes, rest) = split_at_checked(buf, 8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Ok((u64::from_be_bytes(raw), rest))
    }
}

impl WireDecode for bool {
    fn decode_unfinished(buf: &[u8]) -> Result<(Self, &[u8]), DecodeError> {
        let (byte, rest) = u8::decode_unfinished(buf)?;
        match byte {
            0 => Ok((false, rest)),
            1 => Ok((true, rest)),
            other => Err(DecodeError::InvalidBoolean(other)),
        }
    }
}

impl WireDecode for H256 {
    fn decode_unfinished(buf: &[u8]) -> Result<(Self, &[u8]), DecodeError> {
        let (bytes, rest) = split_at_checked(buf, 32)?;
        Ok((H256::from_slice(bytes), rest))
    }
}

impl<const N: usize> WireDecode for [u8; N] {
    fn decode_unfinished(buf: &[u8]) -> Result<(Self, &[u8]), DecodeError> {
        let (bytes, rest) = split_at_checked(buf, N)?;
        let mut raw = [0u8; N];
        raw.copy_from_slice(bytes);
        Ok((raw, rest))
    }
}

impl WireDecode for Bytes {
    fn decode_unfinished(buf: &[u8]) -> Result<(Self, &[u8]), DecodeError> {
        let (len, rest) = u64::decode_unfinished(buf)?;
        let len = usize::try_from(len).map_err(|_| DecodeError::BadLengthPrefix(len))?;
        if rest.len() < len {
            return Err(DecodeError::BadLengthPrefix(len as u64));
        }
        let (bytes, rest) = rest.split_at(len);
        Ok((Bytes::copy_from_slice(bytes), rest))
    }
}

impl<T: WireDecode> WireDecode for Vec<T> {
    fn decode_unfinished(buf: &[u8]) -> Result<(Self, &[u8]), DecodeError> {
        let (count, mut rest) = u64::decode_unfinished(buf)?;
        let count = usize::try_from(count).map_err(|_| DecodeError::BadLengthPrefix(count))?;
        // An element takes at least one byte; reject counts the input cannot hold.
        if count > rest.len() {
            return Err(DecodeError::BadLengthPrefix(count as u64));
        }
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            let (item, remaining) = T::decode_unfinished(rest)?;
            items.push(item);
            rest = remaining;
        }
        Ok((items, rest))
    }
}
