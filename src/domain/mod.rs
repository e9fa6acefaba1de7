//! Domain layer - call-state tracking core
//!
//! This layer contains:
//! - Value objects: channel/line identities, extensions, endpoint status
//! - The Endpoint Status Store (`call::storage`) and Event Translator
//!   (`call::receiver`)
//! - The Current-Call View and its notifier (`current_call`)
//! - Ports to external collaborators: `directory`, `signaling`

pub mod call;
pub mod channel;
pub mod current_call;
pub mod directory;
pub mod endpoint;
pub mod extension;
pub mod shared;
pub mod signaling;

// Re-export commonly used types
pub use shared::{CtiError, Result};
