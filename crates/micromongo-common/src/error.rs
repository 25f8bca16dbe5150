//! Error types for micromongo
//!
//! Provides a unified error type hierarchy for the entire system.

use thiserror::Error;

/// Result type alias using micromongo's Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for micromongo
#[derive(Error, Debug)]
pub enum Error {
    // Protocol Errors
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    // Network Errors
    #[error("Network error: {0}")]
    Network(#[from] NetworkError),

    // Configuration Errors
    #[error("Configuration error: {0}")]
    Config(String),

    // IO Errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Wire protocol and BSON decoding errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Fewer bytes were available than a fixed-width field or declared length requires
    #[error("Framing error: needed {needed} bytes, {available} available")]
    Framing { needed: usize, available: usize },

    #[error("Unsupported element type 0x{0:02x}")]
    UnsupportedElementType(u8),

    #[error("Unknown opcode: {0}")]
    UnknownOpcode(i32),

    #[error("Unknown compressor id: {0}")]
    UnknownCompressor(u8),

    #[error("Missing NUL terminator")]
    MissingTerminator,

    #[error("Invalid UTF-8 in string")]
    InvalidUtf8,

    #[error("Invalid length: {0}")]
    InvalidLength(i32),

    #[error("Invalid element name: {0:?}")]
    InvalidKey(String),

    #[error("Length does not fit in int32")]
    Overflow,

    #[error("Documents nested deeper than {0} levels")]
    NestingTooDeep(usize),

    #[error("Invalid character {character:?} at position {index} in object id")]
    InvalidObjectId { character: char, index: usize },
}

impl ProtocolError {
    /// Short stable label, used as a log field and counter label
    pub fn kind(&self) -> &'static str {
        match self {
            ProtocolError::Framing { .. } => "framing",
            ProtocolError::UnsupportedElementType(_) => "unsupported_type",
            ProtocolError::UnknownOpcode(_) => "unknown_opcode",
            ProtocolError::UnknownCompressor(_) => "unknown_compressor",
            ProtocolError::MissingTerminator => "missing_terminator",
            ProtocolError::InvalidUtf8 => "invalid_utf8",
            ProtocolError::InvalidLength(_) => "invalid_length",
            ProtocolError::InvalidKey(_) => "invalid_key",
            ProtocolError::Overflow => "overflow",
            ProtocolError::NestingTooDeep(_) => "nesting_too_deep",
            ProtocolError::InvalidObjectId { .. } => "invalid_object_id",
        }
    }

    /// Shorthand for a framing failure
    pub fn framing(needed: usize, available: usize) -> Self {
        ProtocolError::Framing { needed, available }
    }
}

/// Network-related errors
#[derive(Error, Debug)]
pub enum NetworkError {
    #[error("Bind failed on {addr}: {source}")]
    BindFailed {
        addr: String,
        #[source]
        source: std::io::Error,
    },
}
