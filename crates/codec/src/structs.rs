use bytes::BufMut;

use crate::{decode::WireDecode, encode::WireEncode, error::DecodeError};

/// # Struct encoding helper
///
/// Writes a structure's fields in the order they are passed to
/// [`Encoder::encode_field`].
///
/// ```
/// # use tessera_codec::{Encoder, WireEncode};
/// let mut buf = vec![];
/// Encoder::new(&mut buf)
///     .encode_field(&7u32)
///     .encode_field(&9u64)
///     .finish();
/// assert_eq!(buf.len(), 12);
/// ```
#[must_use = "`Encoder` must be consumed with `finish`"]
pub struct Encoder<'a> {
    buf: &'a mut dyn BufMut,
}

impl<'a> Encoder<'a> {
    pub fn new(buf: &'a mut dyn BufMut) -> Self {
        Self { buf }
    }

    pub fn encode_field<T: WireEncode>(self, value: &T) -> Self {
        value.encode(self.buf);
        self
    }

    /// Writes raw bytes without any framing.
    pub fn encode_raw(self, value: &[u8]) -> Self {
        self.buf.put_slice(value);
        self
    }

    pub fn finish(self) {}
}

/// # Struct decoding helper
///
/// Reads a structure's fields back in the order they were encoded, tagging
/// failures with the field name.
///
/// ```
/// # use tessera_codec::{Decoder, Encoder};
/// let mut buf = vec![];
/// Encoder::new(&mut buf).encode_field(&3u64).finish();
/// let decoder = Decoder::new(&buf);
/// let (x, decoder): (u64, _) = decoder.decode_field("x").unwrap();
/// decoder.finish().unwrap();
/// assert_eq!(x, 3);
/// ```
#[derive(Debug)]
#[must_use = "`Decoder` must be consumed with `finish` to perform decoding checks"]
pub struct Decoder<'a> {
    buf: &'a [u8],
}

impl<'a> Decoder<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    pub fn decode_field<T: WireDecode>(self, name: &str) -> Result<(T, Self), DecodeError> {
        let (value, rest) =
            T::decode_unfinished(self.buf).map_err(|err| err.with_context(name))?;
        Ok((value, Self { buf: rest }))
    }

    /// Splits off the next `n` raw bytes without framing.
    pub fn decode_raw(self, n: usize, name: &str) -> Result<(&'a [u8], Self), DecodeError> {
        if self.buf.len() < n {
            return Err(DecodeError::UnexpectedEof.with_context(name));
        }
        let (bytes, rest) = self.buf.split_at(n);
        Ok((bytes, Self { buf: rest }))
    }

    /// Finishes decoding; fails if input remains.
    pub fn finish(self) -> Result<(), DecodeError> {
        if self.buf.is_empty() {
            Ok(())
        } else {
            Err(DecodeError::TrailingBytes)
        }
    }

    /// Finishes decoding and hands back whatever input remains.
    pub fn finish_unchecked(self) -> &'a [u8] {
        self.buf
    }

    pub fn is_done(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn remaining(&self) -> usize {
        self.buf.len()
    }
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use hex_literal::hex;

    use super::*;

    #[derive(Debug, PartialEq, Eq)]
    struct Sample {
        seq: u64,
        kind: u8,
        payload: Bytes,
    }

    impl WireEncode for Sample {
        fn encode(&self, buf: &mut dyn BufMut) {
            Encoder::new(buf)
                .encode_field(&self.seq)
                .encode_field(&self.kind)
                .encode_field(&self.payload)
                .finish();
        }
    }

    impl WireDecode for Sample {
        fn decode_unfinished(buf: &[u8]) -> Result<(Self, &[u8]), DecodeError> {
            let decoder = Decoder::new(buf);
            let (seq, decoder) = decoder.decode_field("seq")?;
            let (kind, decoder) = decoder.decode_field("kind")?;
            let (payload, decoder) = decoder.decode_field("payload")?;
            Ok((Sample { seq, kind, payload }, decoder.finish_unchecked()))
        }
    }

    #[test]
    fn struct_round_trip() {
        let sample = Sample {
            seq: 42,
            kind: 7,
            payload: Bytes::from_static(b"hello"),
        };
        let encoded = sample.encode_to_vec();
        assert_eq!(sample, Sample::decode(&encoded).unwrap());
    }

    #[test]
    fn integers_are_big_endian() {
        assert_eq!(0x0102030405060708u64.encode_to_vec(), hex!("0102030405060708"));
        assert_eq!(0xdeadbeefu32.encode_to_vec(), hex!("deadbeef"));
    }

    #[test]
    fn bytes_carry_length_prefix() {
        let encoded = Bytes::from_static(b"ab").encode_to_vec();
        assert_eq!(encoded, hex!("0000000000000002 6162"));
    }

    #[test]
    fn vec_of_bytes_matches_slice_layout() {
        let raw: Vec<u8> = vec![1, 2, 3];
        let mut expected = Vec::new();
        expected.extend_from_slice(&3u64.to_be_bytes());
        expected.extend_from_slice(&[1, 2, 3]);
        assert_eq!(raw.encode_to_vec(), expected);
        assert_eq!(Vec::<u8>::decode(&expected).unwrap(), raw);
    }

    #[test]
    fn truncated_input_is_rejected() {
        let encoded = 7u64.encode_to_vec();
        assert_eq!(
            u64::decode(&encoded[..5]),
            Err(DecodeError::UnexpectedEof)
        );
    }

    #[test]
    fn oversized_length_prefix_is_rejected() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&100u64.to_be_bytes());
        buf.extend_from_slice(b"short");
        assert!(matches!(
            Bytes::decode(&buf),
            Err(DecodeError::BadLengthPrefix(100))
        ));
    }

    #[test]
    fn trailing_bytes_are_rejected() {
        let mut encoded = 7u64.encode_to_vec();
        encoded.push(0xff);
        assert_eq!(u64::decode(&encoded), Err(DecodeError::TrailingBytes));
    }
}
