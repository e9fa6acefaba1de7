//! Normalized signaling events

use std::collections::HashMap;

use crate::domain::shared::{CtiError, Result};

/// A decoded AMI frame: header keys to values, order discarded.
pub type AmiFrame = HashMap<String, String>;

/// The signaling events the call-state core reacts to.
///
/// Everything else on the manager socket is noise and decodes to `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AmiEvent {
    NewChannel {
        channel: String,
        unique_id: String,
    },
    DialBegin {
        channel: String,
        destination: String,
        unique_id: String,
        dest_unique_id: String,
    },
    BridgeLink {
        channel_1: String,
        channel_2: String,
        unique_id_1: String,
        unique_id_2: String,
    },
    BridgeUnlink {
        channel_1: String,
        channel_2: String,
        unique_id_1: String,
    },
    NewState {
        channel: String,
        channel_state: String,
    },
    NewCallerId {
        channel: String,
        name: String,
        number: String,
    },
    Hangup {
        channel: String,
        unique_id: String,
    },
    Hold {
        channel: String,
        on: bool,
    },
    Masquerade {
        original: String,
        clone: String,
    },
}

impl AmiEvent {
    /// Decode a frame into a normalized event.
    ///
    /// Frames without an `Event` header (action responses) and events the
    /// core does not track decode to `Ok(None)`. A tracked event missing a
    /// required field is a parse error; the caller drops the frame.
    pub fn from_frame(frame: &AmiFrame) -> Result<Option<Self>> {
        let Some(event) = frame.get("Event") else {
            return Ok(None);
        };

        let decoded = match event.as_str() {
            "Newchannel" => AmiEvent::NewChannel {
                channel: required(frame, "Newchannel", "Channel")?,
                unique_id: required(frame, "Newchannel", "Uniqueid")?,
            },
            "Dial" => {
                // only the Begin sub-event carries a destination to link
                if frame.get("SubEvent").map(String::as_str) != Some("Begin") {
                    return Ok(None);
                }
                AmiEvent::DialBegin {
                    channel: required(frame, "Dial", "Channel")?,
                    destination: required(frame, "Dial", "Destination")?,
                    unique_id: required(frame, "Dial", "UniqueID")?,
                    dest_unique_id: required(frame, "Dial", "DestUniqueID")?,
                }
            }
            "Bridge" | "Link" => AmiEvent::BridgeLink {
                channel_1: required(frame, "Bridge", "Channel1")?,
                channel_2: required(frame, "Bridge", "Channel2")?,
                unique_id_1: required(frame, "Bridge", "Uniqueid1")?,
                unique_id_2: required(frame, "Bridge", "Uniqueid2")?,
            },
            "Unlink" => AmiEvent::BridgeUnlink {
                channel_1: required(frame, "Unlink", "Channel1")?,
                channel_2: required(frame, "Unlink", "Channel2")?,
                unique_id_1: required(frame, "Unlink", "Uniqueid1")?,
            },
            "Newstate" => AmiEvent::NewState {
                channel: required(frame, "Newstate", "Channel")?,
                channel_state: required(frame, "Newstate", "ChannelState")?,
            },
            "NewCallerid" => AmiEvent::NewCallerId {
                channel: required(frame, "NewCallerid", "Channel")?,
                name: frame.get("CallerIDName").cloned().unwrap_or_default(),
                number: frame.get("CallerIDNum").cloned().unwrap_or_default(),
            },
            "Hangup" => AmiEvent::Hangup {
                channel: required(frame, "Hangup", "Channel")?,
                unique_id: required(frame, "Hangup", "Uniqueid")?,
            },
            "Hold" => AmiEvent::Hold {
                channel: required(frame, "Hold", "Channel")?,
                on: frame.get("Status").map(String::as_str) != Some("Off"),
            },
            "Unhold" => AmiEvent::Hold {
                channel: required(frame, "Unhold", "Channel")?,
                on: false,
            },
            "Masquerade" => AmiEvent::Masquerade {
                original: required(frame, "Masquerade", "Original")?,
                clone: required(frame, "Masquerade", "Clone")?,
            },
            _ => return Ok(None),
        };

        Ok(Some(decoded))
    }
}

fn required(frame: &AmiFrame, event: &'static str, field: &'static str) -> Result<String> {
    frame
        .get(field)
        .cloned()
        .ok_or(CtiError::MissingField { event, field })
}
