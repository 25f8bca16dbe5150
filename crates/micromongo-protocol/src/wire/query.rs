//! Legacy OP_QUERY request

use bytes::BytesMut;
use tracing::warn;

use micromongo_common::ProtocolError;

use super::header::{MessageHeader, OpCode};
use crate::bson::{decode_document, write_document, Decoded, Document};
use crate::codec::{wire_len, write_cstring, ByteReader, FixedWidth};

/// OP_QUERY flag bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueryFlags(pub i32);

impl QueryFlags {
    pub const TAILABLE_CURSOR: i32 = 1 << 1;
    pub const SLAVE_OK: i32 = 1 << 2;
    pub const NO_CURSOR_TIMEOUT: i32 = 1 << 4;
    pub const AWAIT_DATA: i32 = 1 << 5;
    pub const EXHAUST: i32 = 1 << 6;
    pub const PARTIAL: i32 = 1 << 7;

    pub fn contains(self, bit: i32) -> bool {
        self.0 & bit == bit
    }
}

/// OP_QUERY message
///
/// ```text
/// header | flags:int32 | fullCollectionName:cstring | numberToSkip:int32
///        | numberToReturn:int32 | query:document | [returnFieldsSelector:document]
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct OpQueryMessage {
    pub header: MessageHeader,
    pub flags: QueryFlags,
    pub full_collection_name: String,
    pub number_to_skip: i32,
    pub number_to_return: i32,
    pub query: Document,
    pub return_fields_selector: Option<Document>,
}

impl OpQueryMessage {
    /// Build a query with zero flags/skip/return and a consistent header
    pub fn new(request_id: i32, full_collection_name: impl Into<String>, query: Document) -> Self {
        let mut message = Self {
            header: MessageHeader {
                message_length: 0,
                request_id,
                response_to: 0,
                op_code: OpCode::OpQuery as i32,
            },
            flags: QueryFlags::default(),
            full_collection_name: full_collection_name.into(),
            number_to_skip: 0,
            number_to_return: 0,
            query,
            return_fields_selector: None,
        };
        message.header.message_length = i32::try_from(message.encoded_len()).unwrap_or(i32::MAX);
        message
    }

    /// Exact encoded size, header included
    pub fn encoded_len(&self) -> usize {
        MessageHeader::LENGTH
            + 4
            + self.full_collection_name.len()
            + 1
            + 4
            + 4
            + self.query.document_length()
            + self
                .return_fields_selector
                .as_ref()
                .map_or(0, Document::document_length)
    }

    /// Decode a full message, header included.
    ///
    /// Field offsets follow from the variable-length collection name. The
    /// optional selector is only read from bytes inside both the declared
    /// message length and the received buffer; if those bytes are not a
    /// document the query is still returned, without a selector.
    pub fn decode(src: &[u8]) -> Result<Decoded<Self>, ProtocolError> {
        let mut reader = ByteReader::new(src);
        let header = MessageHeader::read(&mut reader)?;
        let flags = QueryFlags(reader.read()?);
        let full_collection_name = reader.read_cstring()?.to_string();
        let number_to_skip = reader.read()?;
        let number_to_return = reader.read()?;

        let query = decode_document(reader.rest())?;
        reader.skip(query.consumed)?;
        let mut unsupported = query.unsupported;

        let declared_end = usize::try_from(header.message_length)
            .unwrap_or(0)
            .min(src.len());
        let return_fields_selector = if reader.position() < declared_end {
            match decode_document(&src[reader.position()..declared_end]) {
                Ok(selector) => {
                    reader.skip(selector.consumed)?;
                    unsupported = unsupported.or(selector.unsupported);
                    Some(selector.value)
                }
                Err(err) => {
                    warn!(
                        request_id = header.request_id,
                        error = %err,
                        "Ignoring undecodable return fields selector"
                    );
                    None
                }
            }
        } else {
            None
        };

        Ok(Decoded {
            value: Self {
                header,
                flags,
                full_collection_name,
                number_to_skip,
                number_to_return,
                query: query.value,
                return_fields_selector,
            },
            consumed: reader.position(),
            unsupported,
        })
    }

    /// Serialize the message. The header's length field is recomputed.
    pub fn encode(&self) -> Result<BytesMut, ProtocolError> {
        let len = self.encoded_len();
        let mut buf = BytesMut::with_capacity(len);
        MessageHeader {
            message_length: wire_len(len)?,
            ..self.header
        }
        .encode(&mut buf);
        self.flags.0.write_le(&mut buf);
        write_cstring(&mut buf, &self.full_collection_name);
        self.number_to_skip.write_le(&mut buf);
        self.number_to_return.write_le(&mut buf);
        write_document(&self.query, &mut buf)?;
        if let Some(selector) = &self.return_fields_selector {
            write_document(selector, &mut buf)?;
        }
        Ok(buf)
    }

    /// Database part of `db.collection`
    pub fn database(&self) -> &str {
        self.full_collection_name
            .split_once('.')
            .map_or(self.full_collection_name.as_str(), |(db, _)| db)
    }

    /// Collection part of `db.collection`
    pub fn collection(&self) -> &str {
        self.full_collection_name
            .split_once('.')
            .map_or("", |(_, coll)| coll)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BufMut;

    /// header(len, reqid, 0, 2004) + flags 0 + "db.coll" + skip 0 + return 0 + {}
    fn handwritten_query() -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&41i32.to_le_bytes());
        buf.extend_from_slice(&12i32.to_le_bytes());
        buf.extend_from_slice(&0i32.to_le_bytes());
        buf.extend_from_slice(&2004i32.to_le_bytes());
        buf.extend_from_slice(&0i32.to_le_bytes());
        buf.extend_from_slice(b"db.coll\0");
        buf.extend_from_slice(&0i32.to_le_bytes());
        buf.extend_from_slice(&0i32.to_le_bytes());
        buf.extend_from_slice(&[5, 0, 0, 0, 0]);
        buf
    }

    #[test]
    fn test_decode_handwritten_query() {
        let buf = handwritten_query();
        assert_eq!(buf.len(), 41);

        let decoded = OpQueryMessage::decode(&buf).unwrap();
        let message = decoded.value;
        assert_eq!(message.header.message_length, 41);
        assert_eq!(message.header.request_id, 12);
        assert_eq!(message.header.response_to, 0);
        assert_eq!(message.header.opcode().unwrap(), OpCode::OpQuery);
        assert_eq!(message.flags, QueryFlags(0));
        assert_eq!(message.full_collection_name, "db.coll");
        assert_eq!(message.database(), "db");
        assert_eq!(message.collection(), "coll");
        assert_eq!(message.number_to_skip, 0);
        assert_eq!(message.number_to_return, 0);
        assert!(message.query.is_empty());
        assert!(message.return_fields_selector.is_none());
        assert_eq!(decoded.consumed, 41);
    }

    #[test]
    fn test_new_and_encode_match() {
        let query = Document::new().with("isMaster", 1);
        let message = OpQueryMessage::new(3, "admin.$cmd", query);
        let encoded = message.encode().unwrap();
        assert_eq!(encoded.len(), message.encoded_len());
        assert_eq!(message.header.message_length as usize, encoded.len());

        let decoded = OpQueryMessage::decode(&encoded).unwrap();
        assert_eq!(decoded.value, message);
    }

    #[test]
    fn test_selector_decoded_when_present() {
        let mut message = OpQueryMessage::new(4, "db.users", Document::new().with("age", 30));
        message.return_fields_selector = Some(Document::new().with("name", 1));
        message.flags = QueryFlags(QueryFlags::SLAVE_OK);
        message.number_to_return = -1;
        let encoded = message.encode().unwrap();

        let decoded = OpQueryMessage::decode(&encoded).unwrap().value;
        assert!(decoded.flags.contains(QueryFlags::SLAVE_OK));
        assert_eq!(decoded.number_to_return, -1);
        assert_eq!(
            decoded.return_fields_selector,
            Some(Document::new().with("name", 1))
        );
    }

    #[test]
    fn test_bytes_after_declared_length_ignored() {
        let mut buf = BytesMut::from(&handwritten_query()[..]);
        // start of a second message in the same read
        buf.put_slice(&[0x10, 0, 0, 0, 1, 0, 0, 0]);

        let decoded = OpQueryMessage::decode(&buf).unwrap();
        assert!(decoded.value.return_fields_selector.is_none());
        assert_eq!(decoded.consumed, 41);
    }

    #[test]
    fn test_truncated_query_is_framing_failure() {
        let buf = handwritten_query();
        // cut inside number_to_return
        assert!(matches!(
            OpQueryMessage::decode(&buf[..34]),
            Err(ProtocolError::Framing { .. })
        ));
        // cut inside the collection name
        assert_eq!(
            OpQueryMessage::decode(&buf[..23]),
            Err(ProtocolError::MissingTerminator)
        );
    }

    #[test]
    fn test_lying_message_length_does_not_overread() {
        let mut buf = handwritten_query();
        buf[..4].copy_from_slice(&i32::MAX.to_le_bytes());
        let decoded = OpQueryMessage::decode(&buf).unwrap();
        assert!(decoded.value.return_fields_selector.is_none());
        assert_eq!(decoded.value.header.message_length, i32::MAX);
    }

    #[test]
    fn test_junk_selector_keeps_query() {
        let mut buf = handwritten_query();
        buf[..4].copy_from_slice(&44i32.to_le_bytes());
        buf.extend_from_slice(&[0xde, 0xad, 0xbe]);

        let decoded = OpQueryMessage::decode(&buf).unwrap();
        assert_eq!(decoded.value.full_collection_name, "db.coll");
        assert!(decoded.value.query.is_empty());
        assert!(decoded.value.return_fields_selector.is_none());
        assert_eq!(decoded.consumed, 41);
    }
}
