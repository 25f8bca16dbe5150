//! Legacy OP_REPLY response

use bytes::BytesMut;

use micromongo_common::ProtocolError;

use super::header::{MessageHeader, OpCode};
use crate::bson::{write_document, Document};
use crate::codec::FixedWidth;

/// OP_REPLY response flag bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResponseFlags(pub i32);

impl ResponseFlags {
    pub const CURSOR_NOT_FOUND: i32 = 1;
    pub const QUERY_FAILURE: i32 = 1 << 1;
    pub const AWAIT_CAPABLE: i32 = 1 << 3;
}

/// Fixed part of the body: flags, cursor id, starting from, number returned
const REPLY_FIELDS_LEN: usize = 4 + 8 + 4 + 4;

/// OP_REPLY message. Only built from documents; never decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct OpReplyMessage {
    header: MessageHeader,
    response_flags: ResponseFlags,
    cursor_id: i64,
    starting_from: i32,
    documents: Vec<Document>,
}

impl OpReplyMessage {
    /// Build a reply to `request_id`.
    ///
    /// `message_length` and `number_returned` are derived from `documents`.
    pub fn from_documents(request_id: i32, documents: Vec<Document>) -> Result<Self, ProtocolError> {
        let documents_len: usize = documents.iter().map(Document::document_length).sum();
        let message_length = i32::try_from(MessageHeader::LENGTH + REPLY_FIELDS_LEN + documents_len)
            .map_err(|_| ProtocolError::Overflow)?;
        i32::try_from(documents.len()).map_err(|_| ProtocolError::Overflow)?;

        Ok(Self {
            header: MessageHeader {
                message_length,
                request_id,
                response_to: request_id,
                op_code: OpCode::OpReply as i32,
            },
            response_flags: ResponseFlags::default(),
            cursor_id: 0,
            starting_from: 0,
            documents,
        })
    }

    pub fn header(&self) -> &MessageHeader {
        &self.header
    }

    pub fn response_flags(&self) -> ResponseFlags {
        self.response_flags
    }

    pub fn cursor_id(&self) -> i64 {
        self.cursor_id
    }

    pub fn starting_from(&self) -> i32 {
        self.starting_from
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    pub fn number_returned(&self) -> i32 {
        // bounded by the check in from_documents
        self.documents.len() as i32
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    /// Serialize header, reply fields and documents
    pub fn encode(&self) -> Result<BytesMut, ProtocolError> {
        let mut buf = BytesMut::with_capacity(usize::try_from(self.header.message_length).unwrap_or(0));
        self.header.encode(&mut buf);
        self.response_flags.0.write_le(&mut buf);
        self.cursor_id.write_le(&mut buf);
        self.starting_from.write_le(&mut buf);
        self.number_returned().write_le(&mut buf);
        for doc in &self.documents {
            write_document(doc, &mut buf)?;
        }
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bson::decode_document;

    #[test]
    fn test_from_documents_derives_fields() {
        let docs = vec![
            Document::new().with("ok", 1.0),
            Document::new(),
        ];
        let expected_len = 16 + 4 + 8 + 4 + 4 + docs[0].document_length() + 5;

        let reply = OpReplyMessage::from_documents(42, docs).unwrap();
        assert_eq!(reply.header().message_length as usize, expected_len);
        assert_eq!(reply.header().request_id, 42);
        assert_eq!(reply.header().response_to, 42);
        assert_eq!(reply.header().opcode().unwrap(), OpCode::OpReply);
        assert_eq!(reply.cursor_id(), 0);
        assert_eq!(reply.starting_from(), 0);
        assert_eq!(reply.number_returned(), 2);
        assert_eq!(reply.response_flags(), ResponseFlags(0));
    }

    #[test]
    fn test_encode_layout() {
        let doc = Document::new().with("ok", 1.0);
        let reply = OpReplyMessage::from_documents(9, vec![doc.clone()]).unwrap();
        let encoded = reply.encode().unwrap();

        assert_eq!(encoded.len(), reply.header().message_length as usize);
        let header = MessageHeader::decode(&encoded).unwrap();
        assert_eq!(header, *reply.header());
        // number_returned sits right before the first document
        assert_eq!(i32::read_le(&encoded[32..]).unwrap(), 1);
        assert_eq!(decode_document(&encoded[36..]).unwrap().value, doc);
    }

    #[test]
    fn test_empty_reply() {
        let reply = OpReplyMessage::from_documents(1, Vec::new()).unwrap();
        assert_eq!(reply.header().message_length, 36);
        assert_eq!(reply.encode().unwrap().len(), 36);
    }
}
