//! OP_COMPRESSED envelope
//!
//! The payload is kept as opaque bytes; nothing here decompresses it.

use bytes::{Bytes, BytesMut};

use micromongo_common::ProtocolError;

use super::header::{MessageHeader, OpCode};
use crate::codec::{wire_len, ByteReader, FixedWidth};

/// Compressor ids
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CompressorId {
    Noop = 0,
    Zlib = 2,
}

impl TryFrom<u8> for CompressorId {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(CompressorId::Noop),
            2 => Ok(CompressorId::Zlib),
            other => Err(ProtocolError::UnknownCompressor(other)),
        }
    }
}

/// header | originalOpcode:int32 | uncompressedSize:int32 | compressorId:uint8 | payload
#[derive(Debug, Clone, PartialEq)]
pub struct OpCompressedMessage {
    pub header: MessageHeader,
    pub original_opcode: OpCode,
    pub uncompressed_size: i32,
    pub compressor_id: CompressorId,
    pub compressed_message: Bytes,
}

impl OpCompressedMessage {
    /// Offset of the compressed payload
    pub const PAYLOAD_OFFSET: usize = MessageHeader::LENGTH + 4 + 4 + 1;

    /// Wrap an already-compressed payload, deriving the header length
    pub fn new(
        request_id: i32,
        original_opcode: OpCode,
        uncompressed_size: i32,
        compressor_id: CompressorId,
        compressed_message: impl Into<Bytes>,
    ) -> Result<Self, ProtocolError> {
        let compressed_message = compressed_message.into();
        Ok(Self {
            header: MessageHeader {
                message_length: wire_len(Self::PAYLOAD_OFFSET + compressed_message.len())?,
                request_id,
                response_to: 0,
                op_code: OpCode::OpCompressed as i32,
            },
            original_opcode,
            uncompressed_size,
            compressor_id,
            compressed_message,
        })
    }

    /// Decode the envelope. Everything after the compressor id in the received
    /// buffer is the payload.
    pub fn decode(src: &[u8]) -> Result<Self, ProtocolError> {
        let mut reader = ByteReader::new(src);
        let header = MessageHeader::read(&mut reader)?;
        let original_opcode = OpCode::try_from(reader.read::<i32>()?)?;
        let uncompressed_size = reader.read()?;
        let compressor_id = CompressorId::try_from(reader.read::<u8>()?)?;
        let compressed_message = Bytes::copy_from_slice(reader.rest());

        Ok(Self {
            header,
            original_opcode,
            uncompressed_size,
            compressor_id,
            compressed_message,
        })
    }

    pub fn encode(&self) -> Result<BytesMut, ProtocolError> {
        let len = Self::PAYLOAD_OFFSET + self.compressed_message.len();
        let mut buf = BytesMut::with_capacity(len);
        MessageHeader {
            message_length: wire_len(len)?,
            ..self.header
        }
        .encode(&mut buf);
        (self.original_opcode as i32).write_le(&mut buf);
        self.uncompressed_size.write_le(&mut buf);
        (self.compressor_id as u8).write_le(&mut buf);
        buf.extend_from_slice(&self.compressed_message);
        Ok(buf)
    }
}
