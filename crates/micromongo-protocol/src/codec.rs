//! Fixed-width integer codec and bounds-checked byte reader
//!
//! Every multi-byte field on the wire is little-endian. Reads never trust a
//! declared length: each one is checked against the bytes actually present.

use bytes::{BufMut, BytesMut};

use micromongo_common::ProtocolError;

/// A value with a fixed encoded width
pub trait FixedWidth: Sized + Copy {
    /// Encoded width in bytes
    const WIDTH: usize;

    /// Decode from the front of `src`, ignoring trailing bytes
    fn read_le(src: &[u8]) -> Result<Self, ProtocolError>;

    /// Append exactly `WIDTH` bytes to `dst`
    fn write_le(self, dst: &mut BytesMut);
}

macro_rules! impl_fixed_width {
    ($($ty:ty => $put:ident),* $(,)?) => {
        $(
            impl FixedWidth for $ty {
                const WIDTH: usize = std::mem::size_of::<$ty>();

                fn read_le(src: &[u8]) -> Result<Self, ProtocolError> {
                    let bytes = src
                        .get(..Self::WIDTH)
                        .ok_or_else(|| ProtocolError::framing(Self::WIDTH, src.len()))?;
                    let mut raw = [0u8; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(bytes);
                    Ok(<$ty>::from_le_bytes(raw))
                }

                fn write_le(self, dst: &mut BytesMut) {
                    dst.$put(self);
                }
            }
        )*
    };
}

impl_fixed_width! {
    u8 => put_u8,
    i8 => put_i8,
    i32 => put_i32_le,
    u32 => put_u32_le,
    i64 => put_i64_le,
    u64 => put_u64_le,
    f64 => put_f64_le,
}

/// Encode a value into a fresh buffer of exactly `T::WIDTH` bytes
pub fn encode_fixed<T: FixedWidth>(value: T) -> BytesMut {
    let mut buf = BytesMut::with_capacity(T::WIDTH);
    value.write_le(&mut buf);
    buf
}

/// Cursor over a borrowed buffer; all reads are bounds-checked
#[derive(Debug, Clone)]
pub struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Current offset from the start of the buffer
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left after the cursor
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Unread portion of the buffer, without advancing
    pub fn rest(&self) -> &'a [u8] {
        &self.buf[self.pos..]
    }

    pub fn read<T: FixedWidth>(&mut self) -> Result<T, ProtocolError> {
        let value = T::read_le(self.rest())?;
        self.pos += T::WIDTH;
        Ok(value)
    }

    /// Take the next `len` bytes
    pub fn take(&mut self, len: usize) -> Result<&'a [u8], ProtocolError> {
        if len > self.remaining() {
            return Err(ProtocolError::framing(len, self.remaining()));
        }
        let slice = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    /// Advance without looking at the bytes
    pub fn skip(&mut self, len: usize) -> Result<(), ProtocolError> {
        self.take(len).map(|_| ())
    }

    /// Read a NUL-terminated UTF-8 string, consuming the terminator
    pub fn read_cstring(&mut self) -> Result<&'a str, ProtocolError> {
        let rest = self.rest();
        let end = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or(ProtocolError::MissingTerminator)?;
        let text = std::str::from_utf8(&rest[..end]).map_err(|_| ProtocolError::InvalidUtf8)?;
        self.pos += end + 1;
        Ok(text)
    }
}

/// Append a NUL-terminated string
pub fn write_cstring(dst: &mut BytesMut, text: &str) {
    dst.put_slice(text.as_bytes());
    dst.put_u8(0);
}

/// Convert an in-memory length into the wire's int32
pub fn wire_len(len: usize) -> Result<i32, ProtocolError> {
    i32::try_from(len).map_err(|_| ProtocolError::Overflow)
}
