//! Patchbay - a CTI middleware core built with Rust
//!
//! Patchbay sits between a PBX signaling channel (an AMI-style event
//! stream) and connected client sessions, maintaining the authoritative
//! in-memory view of "who is talking to whom, on which line, on hold or
//! not, mid-transfer or not".

pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod interface;

// Re-export commonly used types
pub use domain::shared::error::CtiError;
pub use domain::shared::result::Result;
