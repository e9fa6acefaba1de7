//! Current-Call View
//!
//! The per-line table of active call legs, derived from bridge, hold,
//! transfer and masquerade events. This is the state client sessions
//! query and subscribe to.

pub mod formatter;
pub mod manager;
pub mod notifier;

pub use formatter::CurrentCallFormatter;
pub use manager::CurrentCallManager;
pub use notifier::{ClientSession, CurrentCallNotifier};

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::domain::channel::Line;

/// One active call leg on a line.
///
/// A line hosts an ordered list of these (call-waiting means more than
/// one); insertion order carries no meaning but is preserved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineCall {
    pub peer_channel: String,
    pub line_channel: String,
    pub bridge_time: DateTime<Utc>,
    pub on_hold: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transfer_channel: Option<String>,
}

/// Shared handle to the per-line call table.
///
/// The manager mutates it, the formatter reads consistent snapshots of
/// it; critical sections are bounded-time table edits with no I/O held
/// under the lock.
pub type CallsPerLine = Arc<Mutex<HashMap<Line, Vec<LineCall>>>>;

/// Fresh, empty call table.
pub fn new_calls_per_line() -> CallsPerLine {
    Arc::new(Mutex::new(HashMap::new()))
}
