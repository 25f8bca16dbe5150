//! Message header shared by every wire message

use std::fmt;

use bytes::BytesMut;

use micromongo_common::ProtocolError;

use crate::codec::{ByteReader, FixedWidth};

/// MongoDB wire protocol opcodes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum OpCode {
    OpReply = 1,
    OpQuery = 2004,
    OpCompressed = 2012,
    OpMsg = 2013,
}

impl OpCode {
    pub fn name(self) -> &'static str {
        match self {
            OpCode::OpReply => "OP_REPLY",
            OpCode::OpQuery => "OP_QUERY",
            OpCode::OpCompressed => "OP_COMPRESSED",
            OpCode::OpMsg => "OP_MSG",
        }
    }
}

impl TryFrom<i32> for OpCode {
    type Error = ProtocolError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(OpCode::OpReply),
            2004 => Ok(OpCode::OpQuery),
            2012 => Ok(OpCode::OpCompressed),
            2013 => Ok(OpCode::OpMsg),
            other => Err(ProtocolError::UnknownOpcode(other)),
        }
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Message header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    /// Total length the sender claims, header included. Never used for bounds.
    pub message_length: i32,
    pub request_id: i32,
    /// Request this message answers, 0 when unsolicited
    pub response_to: i32,
    /// Raw opcode; see [`MessageHeader::opcode`]
    pub op_code: i32,
}

impl MessageHeader {
    pub const LENGTH: usize = 16;

    /// Parse the header from the first 16 bytes
    pub fn decode(src: &[u8]) -> Result<Self, ProtocolError> {
        let mut reader = ByteReader::new(src);
        Self::read(&mut reader)
    }

    pub(crate) fn read(reader: &mut ByteReader<'_>) -> Result<Self, ProtocolError> {
        if reader.remaining() < Self::LENGTH {
            return Err(ProtocolError::framing(Self::LENGTH, reader.remaining()));
        }
        Ok(Self {
            message_length: reader.read()?,
            request_id: reader.read()?,
            response_to: reader.read()?,
            op_code: reader.read()?,
        })
    }

    /// Serialize the header
    pub fn encode(&self, buf: &mut BytesMut) {
        self.message_length.write_le(buf);
        self.request_id.write_le(buf);
        self.response_to.write_le(buf);
        self.op_code.write_le(buf);
    }

    /// Classify the raw opcode
    pub fn opcode(&self) -> Result<OpCode, ProtocolError> {
        OpCode::try_from(self.op_code)
    }
}
