//! Endpoint status
//!
//! The per-extension status projection maintained by the call storage,
//! derived from AMI channel state changes.

use serde::{Deserialize, Serialize};

/// Current status of an endpoint (extension).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EndpointStatus {
    /// No live channel on the endpoint
    Available,
    /// An incoming call is ringing the endpoint
    Ringing,
    /// The endpoint is up and talking
    Talking,
}

impl EndpointStatus {
    pub fn as_str(&self) -> &str {
        match self {
            EndpointStatus::Available => "available",
            EndpointStatus::Ringing => "ringing",
            EndpointStatus::Talking => "talking",
        }
    }

    /// Map a raw AMI `ChannelState` to an endpoint status.
    ///
    /// Only a few states are interesting; everything else returns `None`
    /// and the event is ignored (not an error).
    pub fn from_channel_state(state: &str) -> Option<Self> {
        match state {
            "0" => Some(EndpointStatus::Available),
            "5" => Some(EndpointStatus::Ringing),
            "6" => Some(EndpointStatus::Talking),
            _ => None,
        }
    }
}
