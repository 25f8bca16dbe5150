//! BSON encode/decode
//!
//! Containers are `int32 total length`, then `(tag, cstring name, payload)*`,
//! then a `0x00` terminator. Arrays use the decimal index as the name.
//!
//! Declared lengths (container, string, binary) are never used to index the
//! buffer directly: every one goes through [`ByteReader`], so a lying sender
//! gets a decode error instead of an out-of-bounds read.

use bytes::{BufMut, BytesMut};
use tracing::warn;

use micromongo_common::metrics;
use micromongo_common::ProtocolError;

use super::document::{Array, Document};
use super::oid::ObjectId;
use super::value::{Binary, ElementType, Value};
use crate::codec::{wire_len, write_cstring, ByteReader, FixedWidth};

/// Containers nested deeper than this are rejected
pub const MAX_NESTING_DEPTH: usize = 100;

/// Smallest valid container: length prefix plus terminator
pub const EMPTY_CONTAINER_LEN: usize = 5;

/// Result of decoding a value from the front of a buffer
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded<T> {
    pub value: T,
    /// Bytes taken from the source, including any length prefix and terminator
    pub consumed: usize,
    /// First unsupported element tag met while decoding, at any depth.
    /// The container holding it keeps the elements that came before it.
    pub unsupported: Option<u8>,
}

impl<T> Decoded<T> {
    fn map<U>(self, f: impl FnOnce(T) -> U) -> Decoded<U> {
        Decoded {
            value: f(self.value),
            consumed: self.consumed,
            unsupported: self.unsupported,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.unsupported.is_none()
    }
}

/// Decode a document from the front of `src`
pub fn decode_document(src: &[u8]) -> Result<Decoded<Document>, ProtocolError> {
    decode_document_at(src, 0)
}

/// Decode an array from the front of `src`
pub fn decode_array(src: &[u8]) -> Result<Decoded<Array>, ProtocolError> {
    decode_array_at(src, 0)
}

fn decode_document_at(src: &[u8], depth: usize) -> Result<Decoded<Document>, ProtocolError> {
    let mut doc = Document::new();
    let decoded = decode_container(src, depth, |name, value| {
        if name.is_empty() {
            return Err(ProtocolError::InvalidKey(String::new()));
        }
        doc.insert(name, value);
        Ok(())
    })?;
    Ok(decoded.map(|()| doc))
}

fn decode_array_at(src: &[u8], depth: usize) -> Result<Decoded<Array>, ProtocolError> {
    let mut values = Vec::new();
    let decoded = decode_container(src, depth, |_, value| {
        values.push(value);
        Ok(())
    })?;
    Ok(decoded.map(|()| Array::from(values)))
}

fn decode_container(
    src: &[u8],
    depth: usize,
    mut push: impl FnMut(&str, Value) -> Result<(), ProtocolError>,
) -> Result<Decoded<()>, ProtocolError> {
    if depth > MAX_NESTING_DEPTH {
        return Err(ProtocolError::NestingTooDeep(MAX_NESTING_DEPTH));
    }

    let mut outer = ByteReader::new(src);
    let declared = outer.read::<i32>()?;
    let total = usize::try_from(declared)
        .ok()
        .filter(|&len| len >= EMPTY_CONTAINER_LEN)
        .ok_or(ProtocolError::InvalidLength(declared))?;
    let body = outer.take(total - 4)?;

    let mut reader = ByteReader::new(body);
    let mut unsupported = None;

    loop {
        let tag = reader.read::<u8>()?;
        if tag == 0x00 {
            break;
        }

        let element_type = match ElementType::try_from(tag) {
            Ok(element_type) => element_type,
            Err(err) => {
                warn!(
                    "Unsupported element type 0x{:02x} encountered while decoding, aborting decode",
                    tag
                );
                metrics::record_decode_failure(err.kind());
                return Ok(Decoded {
                    value: (),
                    consumed: total,
                    unsupported: Some(tag),
                });
            }
        };

        let name = reader.read_cstring()?;
        let element = element_type.decode_payload(&mut reader, depth)?;
        unsupported = unsupported.or(element.unsupported);
        push(name, element.value)?;
    }

    if reader.remaining() != 0 {
        return Err(ProtocolError::InvalidLength(declared));
    }

    Ok(Decoded {
        value: (),
        consumed: total,
        unsupported,
    })
}

impl ElementType {
    /// Decode the payload for this tag at the reader's cursor and advance past it
    pub(crate) fn decode_payload(
        self,
        reader: &mut ByteReader<'_>,
        depth: usize,
    ) -> Result<Decoded<Value>, ProtocolError> {
        let start = reader.position();
        let mut unsupported = None;

        let value = match self {
            ElementType::Double => Value::Double(reader.read::<f64>()?),
            ElementType::String => Value::String(read_string(reader)?),
            ElementType::Document => {
                let nested = decode_document_at(reader.rest(), depth + 1)?;
                reader.skip(nested.consumed)?;
                unsupported = nested.unsupported;
                Value::Document(nested.value)
            }
            ElementType::Array => {
                let nested = decode_array_at(reader.rest(), depth + 1)?;
                reader.skip(nested.consumed)?;
                unsupported = nested.unsupported;
                Value::Array(nested.value)
            }
            ElementType::Binary => {
                let declared = reader.read::<i32>()?;
                let len = usize::try_from(declared).map_err(|_| ProtocolError::InvalidLength(declared))?;
                let subtype = reader.read::<u8>()?;
                let data = reader.take(len)?;
                Value::Binary(Binary::new(subtype, data))
            }
            ElementType::ObjectId => {
                let mut bytes = [0u8; ObjectId::LEN];
                bytes.copy_from_slice(reader.take(ObjectId::LEN)?);
                Value::ObjectId(ObjectId::from_bytes(bytes))
            }
            ElementType::Boolean => Value::Boolean(reader.read::<u8>()? != 0),
            ElementType::Null => Value::Null,
            ElementType::Int32 => Value::Int32(reader.read::<i32>()?),
            ElementType::UInt64 => Value::UInt64(reader.read::<u64>()?),
            ElementType::Int64 => Value::Int64(reader.read::<i64>()?),
        };

        Ok(Decoded {
            value,
            consumed: reader.position() - start,
            unsupported,
        })
    }
}

/// `int32 L`, then `L - 1` bytes of UTF-8, then NUL
fn read_string(reader: &mut ByteReader<'_>) -> Result<String, ProtocolError> {
    let declared = reader.read::<i32>()?;
    let len = usize::try_from(declared)
        .ok()
        .filter(|&len| len >= 1)
        .ok_or(ProtocolError::InvalidLength(declared))?;
    let bytes = reader.take(len)?;
    let (text, terminator) = bytes.split_at(len - 1);
    if terminator[0] != 0 {
        return Err(ProtocolError::MissingTerminator);
    }
    String::from_utf8(text.to_vec()).map_err(|_| ProtocolError::InvalidUtf8)
}

// ============================================================================
// Encoding
// ============================================================================

/// Encode a document, computing its length prefix
pub fn encode_document(doc: &Document) -> Result<BytesMut, ProtocolError> {
    let mut buf = BytesMut::with_capacity(doc.document_length());
    write_document(doc, &mut buf)?;
    Ok(buf)
}

/// Encode an array as a document keyed "0", "1", ...
pub fn encode_array(arr: &Array) -> Result<BytesMut, ProtocolError> {
    let mut buf = BytesMut::with_capacity(arr.document_length());
    write_array(arr, &mut buf)?;
    Ok(buf)
}

/// Append an encoded document to `dst`
pub fn write_document(doc: &Document, dst: &mut BytesMut) -> Result<(), ProtocolError> {
    wire_len(document_encoded_len(doc))?.write_le(dst);
    for (name, value) in doc.iter() {
        if name.is_empty() || name.contains('\0') {
            return Err(ProtocolError::InvalidKey(name.to_string()));
        }
        write_element(name, value, dst)?;
    }
    dst.put_u8(0);
    Ok(())
}

/// Append an encoded array to `dst`
pub fn write_array(arr: &Array, dst: &mut BytesMut) -> Result<(), ProtocolError> {
    wire_len(array_encoded_len(arr))?.write_le(dst);
    for (index, value) in arr.iter().enumerate() {
        write_element(&index.to_string(), value, dst)?;
    }
    dst.put_u8(0);
    Ok(())
}

fn write_element(name: &str, value: &Value, dst: &mut BytesMut) -> Result<(), ProtocolError> {
    dst.put_u8(value.element_type() as u8);
    write_cstring(dst, name);
    value.write_payload(dst)
}

impl Value {
    /// Bytes the payload occupies after the tag and name
    pub fn payload_len(&self) -> usize {
        match self {
            Value::Double(_) | Value::UInt64(_) | Value::Int64(_) => 8,
            Value::String(s) => s.len() + 5,
            Value::Document(doc) => document_encoded_len(doc),
            Value::Array(arr) => array_encoded_len(arr),
            Value::Binary(bin) => bin.data.len() + 5,
            Value::ObjectId(_) => ObjectId::LEN,
            Value::Boolean(_) => 1,
            Value::Null => 0,
            Value::Int32(_) => 4,
        }
    }

    /// Append the payload for this value's tag
    pub fn write_payload(&self, dst: &mut BytesMut) -> Result<(), ProtocolError> {
        match self {
            Value::Double(d) => d.write_le(dst),
            Value::String(s) => {
                wire_len(s.len() + 1)?.write_le(dst);
                dst.put_slice(s.as_bytes());
                dst.put_u8(0);
            }
            Value::Document(doc) => write_document(doc, dst)?,
            Value::Array(arr) => write_array(arr, dst)?,
            Value::Binary(bin) => {
                wire_len(bin.data.len())?.write_le(dst);
                dst.put_u8(bin.subtype);
                dst.put_slice(&bin.data);
            }
            Value::ObjectId(oid) => dst.put_slice(&oid.bytes()),
            Value::Boolean(b) => dst.put_u8(u8::from(*b)),
            Value::Null => {}
            Value::Int32(i) => i.write_le(dst),
            Value::UInt64(u) => u.write_le(dst),
            Value::Int64(i) => i.write_le(dst),
        }
        Ok(())
    }
}

/// Encoded length of a document, including prefix and terminator
pub fn document_encoded_len(doc: &Document) -> usize {
    let elements: usize = doc
        .iter()
        .map(|(name, value)| 1 + name.len() + 1 + value.payload_len())
        .sum();
    EMPTY_CONTAINER_LEN + elements
}

/// Encoded length of an array, including prefix and terminator
pub fn array_encoded_len(arr: &Array) -> usize {
    let elements: usize = arr
        .iter()
        .enumerate()
        .map(|(index, value)| 1 + decimal_len(index) + 1 + value.payload_len())
        .sum();
    EMPTY_CONTAINER_LEN + elements
}

fn decimal_len(mut n: usize) -> usize {
    let mut digits = 1;
    while n >= 10 {
        n /= 10;
        digits += 1;
    }
    digits
}
