//! MongoDB wire protocol messages
//!
//! Every message starts with a 16-byte [`MessageHeader`]; the opcode decides
//! the body layout. OP_QUERY and OP_COMPRESSED decode, OP_REPLY is built for
//! sending, OP_MSG is data only.

mod compressed;
mod header;
mod msg;
mod query;
mod reply;

pub use compressed::{CompressorId, OpCompressedMessage};
pub use header::{MessageHeader, OpCode};
pub use msg::{MsgFlags, OpMsgMessage, Section, SectionKind};
pub use query::{OpQueryMessage, QueryFlags};
pub use reply::{OpReplyMessage, ResponseFlags};

use micromongo_common::ProtocolError;

/// What the connection handler should do with one received buffer
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// A decoded OP_QUERY. `unsupported` is set when a document stopped early.
    Query {
        message: OpQueryMessage,
        unsupported: Option<u8>,
    },
    /// A known opcode this server does not decode
    Unhandled { header: MessageHeader, op_code: OpCode },
    /// The header decoded but its opcode is not one we know
    UnknownOpcode { header: MessageHeader },
    /// The header or the query body could not be decoded
    Malformed(ProtocolError),
}

impl Dispatch {
    /// Short label for logs and counters
    pub fn label(&self) -> &'static str {
        match self {
            Dispatch::Query { .. } => OpCode::OpQuery.name(),
            Dispatch::Unhandled { op_code, .. } => op_code.name(),
            Dispatch::UnknownOpcode { .. } => "unknown",
            Dispatch::Malformed(_) => "malformed",
        }
    }

    pub fn header(&self) -> Option<&MessageHeader> {
        match self {
            Dispatch::Query { message, .. } => Some(&message.header),
            Dispatch::Unhandled { header, .. } | Dispatch::UnknownOpcode { header } => Some(header),
            Dispatch::Malformed(_) => None,
        }
    }
}

/// Classify a received buffer as one message.
///
/// Only OP_QUERY bodies are decoded; other opcodes are classified from the
/// header alone.
pub fn dispatch(src: &[u8]) -> Dispatch {
    let header = match MessageHeader::decode(src) {
        Ok(header) => header,
        Err(err) => return Dispatch::Malformed(err),
    };

    match header.opcode() {
        Ok(OpCode::OpQuery) => match OpQueryMessage::decode(src) {
            Ok(decoded) => Dispatch::Query {
                message: decoded.value,
                unsupported: decoded.unsupported,
            },
            Err(err) => Dispatch::Malformed(err),
        },
        Ok(op_code) => Dispatch::Unhandled { header, op_code },
        Err(_) => Dispatch::UnknownOpcode { header },
    }
}
