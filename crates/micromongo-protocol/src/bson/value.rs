//! BSON value model

use std::fmt;

use serde_json::json;

use micromongo_common::ProtocolError;

use super::document::{Array, Document};
use super::oid::ObjectId;

/// Element type tags understood by this codec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ElementType {
    Double = 0x01,
    String = 0x02,
    Document = 0x03,
    Array = 0x04,
    Binary = 0x05,
    ObjectId = 0x07,
    Boolean = 0x08,
    Null = 0x0A,
    Int32 = 0x10,
    UInt64 = 0x11,
    Int64 = 0x12,
}

impl TryFrom<u8> for ElementType {
    type Error = ProtocolError;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        match tag {
            0x01 => Ok(ElementType::Double),
            0x02 => Ok(ElementType::String),
            0x03 => Ok(ElementType::Document),
            0x04 => Ok(ElementType::Array),
            0x05 => Ok(ElementType::Binary),
            0x07 => Ok(ElementType::ObjectId),
            0x08 => Ok(ElementType::Boolean),
            0x0A => Ok(ElementType::Null),
            0x10 => Ok(ElementType::Int32),
            0x11 => Ok(ElementType::UInt64),
            0x12 => Ok(ElementType::Int64),
            other => Err(ProtocolError::UnsupportedElementType(other)),
        }
    }
}

/// Binary payload with its subtype byte
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binary {
    pub subtype: u8,
    pub data: Vec<u8>,
}

impl Binary {
    pub fn new(subtype: u8, data: impl Into<Vec<u8>>) -> Self {
        Self {
            subtype,
            data: data.into(),
        }
    }
}

/// A decoded BSON value. The variant decides the payload layout on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Double(f64),
    String(String),
    Document(Document),
    Array(Array),
    Binary(Binary),
    ObjectId(ObjectId),
    Boolean(bool),
    Null,
    Int32(i32),
    UInt64(u64),
    Int64(i64),
}

impl Value {
    pub fn element_type(&self) -> ElementType {
        match self {
            Value::Double(_) => ElementType::Double,
            Value::String(_) => ElementType::String,
            Value::Document(_) => ElementType::Document,
            Value::Array(_) => ElementType::Array,
            Value::Binary(_) => ElementType::Binary,
            Value::ObjectId(_) => ElementType::ObjectId,
            Value::Boolean(_) => ElementType::Boolean,
            Value::Null => ElementType::Null,
            Value::Int32(_) => ElementType::Int32,
            Value::UInt64(_) => ElementType::UInt64,
            Value::Int64(_) => ElementType::Int64,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_document(&self) -> Option<&Document> {
        match self {
            Value::Document(doc) => Some(doc),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Array> {
        match self {
            Value::Array(arr) => Some(arr),
            _ => None,
        }
    }

    /// JSON rendering for logs. Binary data and object ids become hex strings.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Double(d) => serde_json::Number::from_f64(*d)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Document(doc) => doc.to_json(),
            Value::Array(arr) => serde_json::Value::Array(arr.iter().map(Value::to_json).collect()),
            Value::Binary(bin) => json!({
                "$binary": hex::encode(&bin.data),
                "$subtype": format!("{:02x}", bin.subtype),
            }),
            Value::ObjectId(oid) => json!({ "$oid": oid.to_hex() }),
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::Null => serde_json::Value::Null,
            Value::Int32(i) => json!(i),
            Value::UInt64(u) => json!(u),
            Value::Int64(i) => json!(i),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

macro_rules! impl_from_payload {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::$variant(value)
                }
            }
        )*
    };
}

impl_from_payload! {
    f64 => Double,
    String => String,
    Document => Document,
    Array => Array,
    Binary => Binary,
    ObjectId => ObjectId,
    bool => Boolean,
    i32 => Int32,
    u64 => UInt64,
    i64 => Int64,
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<()> for Value {
    fn from((): ()) -> Self {
        Value::Null
    }
}
