//! MongoDB wire protocol for micromongo
//!
//! - `codec`: bounds-checked little-endian primitives
//! - `bson`: document model and binary codec
//! - `wire`: message header and opcode bodies
//! - `server`: TCP accept loop, connection handler and shutdown

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod bson;
pub mod codec;
pub mod server;
pub mod wire;

pub use server::{MongoServer, ShutdownCoordinator};
