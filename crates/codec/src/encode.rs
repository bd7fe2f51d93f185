use bytes::{BufMut, Bytes};
use ethereum_types::H256;

/// Types that can be written into the wire framing.
pub trait WireEncode {
    fn encode(&self, buf: &mut dyn BufMut);

    fn encode_to_vec(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode(&mut buf);
        buf
    }

    /// Number of bytes `encode` will produce, when cheap to compute.
    fn length(&self) -> usize {
        self.encode_to_vec().len()
    }
}

impl WireEncode for u8 {
    fn encode(&self, buf: &mut dyn BufMut) {
        buf.put_u8(*self);
    }

    fn length(&self) -> usize {
        1
    }
}

impl WireEncode for u32 {
    fn encode(&self, buf: &mut dyn BufMut) {
        buf.put_u32(*self);
    }

    fn length(&self) -> usize {
        4
    }
}

impl WireEncode for u64 {
    fn encode(&self, buf: &mut dyn BufMut) {
        buf.put_u64(*self);
    }

    fn length(&self) -> usize {
        8
    }
}

impl WireEncode for bool {
    fn encode(&self, buf: &mut dyn BufMut) {
        buf.put_u8(u8::from(*self));
    }

    fn length(&self) -> usize {
        1
    }
}

/// Hashes are written as their 32 raw bytes.
impl WireEncode for H256 {
    fn encode(&self, buf: &mut dyn BufMut) {
        buf.put_slice(self.as_bytes());
    }

    fn length(&self) -> usize {
        32
    }
}

/// Fixed-size arrays are written verbatim, without a length prefix.
impl<const N: usize> WireEncode for [u8; N] {
    fn encode(&self, buf: &mut dyn BufMut) {
        buf.put_slice(self);
    }

    fn length(&self) -> usize {
        N
    }
}

/// Variable-length byte strings carry a `u64` length prefix.
impl WireEncode for [u8] {
    fn encode(&self, buf: &mut dyn BufMut) {
        buf.put_u64(self.len() as u64);
        buf.put_slice(self);
    }

    fn length(&self) -> usize {
        8 + self.len()
    }
}

impl WireEncode for Bytes {
    fn encode(&self, buf: &mut dyn BufMut) {
        self.as_ref().encode(buf);
    }

    fn length(&self) -> usize {
        8 + self.len()
    }
}

/// Sequences carry a `u64` element count followed by each element.
///
/// For `Vec<u8>` this degenerates to the same `len:u64 || bytes` layout as
/// the slice impl.
impl<T: WireEncode> WireEncode for Vec<T> {
    fn encode(&self, buf: &mut dyn BufMut) {
        buf.put_u64(self.len() as u64);
        for item in self {
            item.encode(buf);
        }
    }
}

impl<T: WireEncode + ?Sized> WireEncode for &T {
    fn encode(&self, buf: &mut dyn BufMut) {
        (**self).encode(buf);
    }

    fn length(&self) -> usize {
        (**self).length()
    }
}
