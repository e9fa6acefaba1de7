//! Domain errors

use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum CtiError {
    /// The acting user has no active call to operate on.
    #[error("no such call: {0}")]
    NoSuchCall(String),

    /// The user id does not resolve to a usable line.
    #[error("no such line: {0}")]
    NoSuchLine(String),

    /// Generic not-found condition from a directory lookup.
    #[error("not found: {0}")]
    NotFound(String),

    /// A channel name that cannot be parsed into an extension identity.
    #[error("invalid channel name: {0}")]
    InvalidChannel(String),

    /// A signaling frame missing a required field.
    #[error("missing field '{field}' in {event} event")]
    MissingField {
        event: &'static str,
        field: &'static str,
    },

    /// Outbound signaling command could not be sent.
    #[error("AMI command failed: {0}")]
    Ami(String),

    /// The client session's connection has closed.
    #[error("session closed")]
    SessionClosed,
}
