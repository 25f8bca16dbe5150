//! 12-byte object identifiers

use std::fmt;
use std::str::FromStr;

use rand::RngCore;

use micromongo_common::ProtocolError;

/// Timestamp (4 bytes, big-endian seconds) + process salt (5 bytes) + counter (3 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectId([u8; 12]);

impl ObjectId {
    pub const LEN: usize = 12;

    pub fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    pub fn bytes(&self) -> [u8; 12] {
        self.0
    }

    /// Seconds since the Unix epoch at generation time
    pub fn timestamp(&self) -> u32 {
        u32::from_be_bytes([self.0[0], self.0[1], self.0[2], self.0[3]])
    }

    pub fn random_value(&self) -> [u8; 5] {
        [self.0[4], self.0[5], self.0[6], self.0[7], self.0[8]]
    }

    pub fn counter(&self) -> [u8; 3] {
        [self.0[9], self.0[10], self.0[11]]
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for ObjectId {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 12];
        hex::decode_to_slice(s, &mut bytes).map_err(|err| match err {
            hex::FromHexError::InvalidHexCharacter { c, index } => ProtocolError::InvalidObjectId {
                character: c,
                index,
            },
            hex::FromHexError::OddLength | hex::FromHexError::InvalidStringLength => {
                ProtocolError::InvalidLength(i32::try_from(s.len()).unwrap_or(i32::MAX))
            }
        })?;
        Ok(Self(bytes))
    }
}

/// Produces object ids for one process.
///
/// The 5-byte random value is drawn once when the generator is created; the
/// server creates a single generator at startup and hands out references.
#[derive(Debug, Clone)]
pub struct ObjectIdGenerator {
    random_value: [u8; 5],
}

impl ObjectIdGenerator {
    pub fn new() -> Self {
        let mut random_value = [0u8; 5];
        rand::thread_rng().fill_bytes(&mut random_value);
        Self { random_value }
    }

    /// Generator with a fixed salt
    pub fn with_random_value(random_value: [u8; 5]) -> Self {
        Self { random_value }
    }

    pub fn random_value(&self) -> [u8; 5] {
        self.random_value
    }

    pub fn generate(&self) -> ObjectId {
        let seconds = u32::try_from(chrono::Utc::now().timestamp()).unwrap_or(u32::MAX);
        let mut counter = [0u8; 3];
        rand::thread_rng().fill_bytes(&mut counter);
        self.generate_at(seconds, counter)
    }

    fn generate_at(&self, seconds: u32, counter: [u8; 3]) -> ObjectId {
        let mut bytes = [0u8; 12];
        bytes[..4].copy_from_slice(&seconds.to_be_bytes());
        bytes[4..9].copy_from_slice(&self.random_value);
        bytes[9..].copy_from_slice(&counter);
        ObjectId(bytes)
    }
}

impl Default for ObjectIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
