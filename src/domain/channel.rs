//! Channel name handling
//!
//! Channels are the ephemeral, vendor-formed names the signaling layer
//! attaches to one leg of a call (`"SIP/abcd-00000012"`,
//! `"Local/1000@ctx-00000009;1"`). They are compared case-insensitively
//! and do not survive a call's lifetime; the stable identity of a device
//! is its [`Line`], the lowercase, suffix-stripped prefix of the name.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable line identity derived from a channel name.
///
/// `"SIP/tc8nb4-00000004"` maps to `sip/tc8nb4`. Local channels keep
/// their half marker: `"Local/123@ctx-00000009;1"` maps to
/// `local/123@ctx;1`, so the two halves of a local pair stay distinct.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Line(String);

impl Line {
    /// Normalize a raw line identity (already suffix-free) for lookups.
    pub fn new(identity: &str) -> Self {
        Line(identity.to_ascii_lowercase())
    }

    /// Derive the line identity from a full channel name.
    pub fn from_channel(channel: &str) -> Self {
        Line(line_identity(channel))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lowercase, suffix-stripped prefix of a channel name.
fn line_identity(channel: &str) -> String {
    let base = match channel.rfind('-') {
        Some(idx) => &channel[..idx],
        None => channel,
    };
    let mut identity = base.to_ascii_lowercase();
    // Local channel halves keep their ;1/;2 marker
    if let Some(half) = local_half(channel) {
        identity.push_str(half);
    }
    identity
}

/// The `;1`/`;2` marker of a local channel, if any.
fn local_half(channel: &str) -> Option<&'static str> {
    if channel.ends_with(";1") {
        Some(";1")
    } else if channel.ends_with(";2") {
        Some(";2")
    } else {
        None
    }
}

/// Peer half of a local channel pair, computed without any lookup.
///
/// Returns `None` for channels that are not a local half.
pub fn local_channel_peer(channel: &str) -> Option<String> {
    if let Some(base) = channel.strip_suffix(";1") {
        Some(format!("{};2", base))
    } else {
        channel.strip_suffix(";2").map(|base| format!("{};1", base))
    }
}

/// Channel names are case-insensitive for comparison purposes.
pub fn same_channel(a: &str, b: &str) -> bool {
    a.eq_ignore_ascii_case(b)
}

/// Parse a caller id string of the form `"Name" <number>`.
///
/// Anything that does not match yields empty name and number; a bad
/// caller id is never an error.
pub fn parse_caller_id(caller_id: &str) -> (String, String) {
    let name = caller_id
        .split('"')
        .nth(1)
        .unwrap_or_default()
        .to_string();
    let number = caller_id
        .split('<')
        .nth(1)
        .and_then(|rest| rest.split('>').next())
        .unwrap_or_default()
        .to_string();
    if name.is_empty() && number.is_empty() {
        (String::new(), String::new())
    } else {
        (name, number)
    }
}
