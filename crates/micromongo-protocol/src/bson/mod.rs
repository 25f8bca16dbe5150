//! BSON value model and codec
//!
//! Supports the element types a legacy query carries: double, string,
//! embedded document, array, binary, object id, boolean, null, int32,
//! uint64 and int64. Any other tag stops decoding of its container.

mod codec;
mod document;
mod oid;
mod value;

pub use codec::{
    array_encoded_len, decode_array, decode_document, document_encoded_len, encode_array,
    encode_document, write_array, write_document, Decoded, EMPTY_CONTAINER_LEN, MAX_NESTING_DEPTH,
};
pub use document::{Array, Document};
pub use oid::{ObjectId, ObjectIdGenerator};
pub use value::{Binary, ElementType, Value};
