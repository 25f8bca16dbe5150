//! micromongo Common - Shared utilities and types
//!
//! This crate provides common functionality used across all micromongo components:
//! - Error types and handling
//! - Configuration management
//! - Diagnostic counters

#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod metrics;

pub use config::Config;
pub use error::{Error, ProtocolError, Result};
