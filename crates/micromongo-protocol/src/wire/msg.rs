//! OP_MSG data shape
//!
//! Sections and the optional checksum are modelled as data only. There is no
//! encoder or decoder for this opcode; the connection handler classifies it
//! and moves on.

use super::header::MessageHeader;
use crate::bson::Document;

/// OP_MSG flag bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MsgFlags(pub u32);

impl MsgFlags {
    pub const CHECKSUM_PRESENT: u32 = 1;
    pub const MORE_TO_COME: u32 = 2;
    pub const EXHAUST_ALLOWED: u32 = 1 << 16;

    pub fn contains(self, bit: u32) -> bool {
        self.0 & bit == bit
    }
}

/// OP_MSG section types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SectionKind {
    Body = 0,
    DocumentSequence = 1,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Section {
    Body(Document),
    DocumentSequence {
        identifier: String,
        documents: Vec<Document>,
    },
}

impl Section {
    pub fn kind(&self) -> SectionKind {
        match self {
            Section::Body(_) => SectionKind::Body,
            Section::DocumentSequence { .. } => SectionKind::DocumentSequence,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpMsgMessage {
    pub header: MessageHeader,
    pub flag_bits: MsgFlags,
    pub sections: Vec<Section>,
    pub checksum: Option<u32>,
}

impl OpMsgMessage {
    /// A checksum must be present exactly when the flag says so
    pub fn is_consistent(&self) -> bool {
        self.flag_bits.contains(MsgFlags::CHECKSUM_PRESENT) == self.checksum.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::OpCode;

    #[test]
    fn test_section_kinds() {
        let body = Section::Body(Document::new().with("ping", 1));
        let seq = Section::DocumentSequence {
            identifier: "documents".to_string(),
            documents: vec![Document::new()],
        };
        assert_eq!(body.kind(), SectionKind::Body);
        assert_eq!(seq.kind() as u8, 1);
    }

    #[test]
    fn test_checksum_consistency() {
        let header = MessageHeader {
            message_length: 0,
            request_id: 1,
            response_to: 0,
            op_code: OpCode::OpMsg as i32,
        };
        let mut message = OpMsgMessage {
            header,
            flag_bits: MsgFlags(MsgFlags::CHECKSUM_PRESENT),
            sections: Vec::new(),
            checksum: None,
        };
        assert!(!message.is_consistent());
        message.checksum = Some(0xdead_beef);
        assert!(message.is_consistent());
        assert!(!message.flag_bits.contains(MsgFlags::MORE_TO_COME));
    }
}
