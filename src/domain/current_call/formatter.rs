//! Current-call message formatting

use chrono::Utc;
use serde_json::{json, Value};

use crate::domain::channel::Line;
use crate::domain::current_call::CallsPerLine;

/// Renders a line's current calls into the client-facing message.
pub struct CurrentCallFormatter {
    calls_per_line: CallsPerLine,
}

impl CurrentCallFormatter {
    pub fn new(calls_per_line: CallsPerLine) -> Self {
        Self { calls_per_line }
    }

    /// Format the current-call message for a line from a consistent
    /// snapshot of the view.
    pub fn line_current_call(&self, line: &Line) -> Value {
        let snapshot = {
            let calls = self.calls_per_line.lock().unwrap();
            calls.get(line).cloned().unwrap_or_default()
        };
        let now = Utc::now();
        let calls: Vec<Value> = snapshot
            .iter()
            .map(|call| {
                json!({
                    "peer_channel": call.peer_channel,
                    "line_channel": call.line_channel,
                    "on_hold": call.on_hold,
                    "bridged_at": call.bridge_time.to_rfc3339(),
                    "duration_seconds": (now - call.bridge_time).num_seconds().max(0),
                })
            })
            .collect();

        json!({
            "class": "current_calls",
            "line": line.as_str(),
            "calls": calls,
        })
    }
}
