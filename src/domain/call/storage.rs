//! Endpoint Status Store
//!
//! Authoritative set of live [`Call`] entities plus the per-extension
//! status projection. Calls are keyed by the signaling source's unique
//! id; extension status lookups reference calls but never own them.

use std::collections::HashMap;
use std::sync::Mutex;

use tracing::debug;

use crate::domain::call::Call;
use crate::domain::channel::{same_channel, Line};
use crate::domain::endpoint::EndpointStatus;
use crate::domain::extension::Extension;

/// Callback invoked when an extension's status actually changes.
pub type StatusCallback = Box<dyn Fn(&Extension, EndpointStatus) + Send + Sync>;

#[derive(Default)]
struct StorageState {
    calls: HashMap<String, Call>,
    statuses: HashMap<Extension, EndpointStatus>,
    caller_ids: HashMap<String, (String, String)>,
}

/// The Endpoint Status Store.
pub struct CallStorage {
    state: Mutex<StorageState>,
    status_callback: Option<StatusCallback>,
}

impl CallStorage {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(StorageState::default()),
            status_callback: None,
        }
    }

    /// Register the status-change callback. Must be called before the
    /// storage is shared.
    pub fn set_status_callback(&mut self, callback: StatusCallback) {
        self.status_callback = Some(callback);
    }

    /// Create or extend the call identified by its unique id.
    pub fn new_call(&self, call: Call) {
        let mut state = self.state.lock().unwrap();
        debug!(unique_id = %call.unique_id, "tracking call");
        state.calls.insert(call.unique_id.clone(), call);
    }

    /// Destroy the call identified by `unique_id`. Unknown ids are a
    /// silent no-op (unlink events outlive their call).
    pub fn end_call(&self, unique_id: &str) {
        let mut state = self.state.lock().unwrap();
        if let Some(call) = state.calls.remove(unique_id) {
            debug!(unique_id = %unique_id, "call ended");
            for channel in [&call.source.channel, &call.destination.channel] {
                if !channel.is_empty() {
                    state.caller_ids.remove(&channel.to_ascii_lowercase());
                }
            }
        }
    }

    /// Update an extension's status, notifying the callback only on an
    /// actual change.
    pub fn update_endpoint_status(&self, extension: &Extension, status: EndpointStatus) {
        let changed = {
            let mut state = self.state.lock().unwrap();
            let previous = state.statuses.insert(extension.clone(), status);
            previous != Some(status)
        };
        if changed {
            if let Some(callback) = &self.status_callback {
                callback(extension, status);
            }
        }
    }

    /// Current status of an extension; untracked extensions are available.
    pub fn endpoint_status(&self, extension: &Extension) -> EndpointStatus {
        let state = self.state.lock().unwrap();
        state
            .statuses
            .get(extension)
            .copied()
            .unwrap_or(EndpointStatus::Available)
    }

    /// All live calls whose source or destination leg touches the
    /// extension.
    pub fn find_all_calls_for_extension(&self, extension: &Extension) -> Vec<Call> {
        let state = self.state.lock().unwrap();
        state
            .calls
            .values()
            .filter(|call| call.involves(extension))
            .cloned()
            .collect()
    }

    /// Channel currently holding the given unique id.
    pub fn channel_by_unique_id(&self, unique_id: &str) -> Option<String> {
        let state = self.state.lock().unwrap();
        state.calls.get(unique_id).map(|call| call.source.channel.clone())
    }

    /// Live channels whose line identity matches `line`.
    pub fn channels_for_line(&self, line: &Line) -> Vec<String> {
        let state = self.state.lock().unwrap();
        let mut channels: Vec<String> = Vec::new();
        for call in state.calls.values() {
            for channel in [&call.source.channel, &call.destination.channel] {
                if !channel.is_empty()
                    && Line::from_channel(channel) == *line
                    && !channels.iter().any(|c| same_channel(c, channel))
                {
                    channels.push(channel.clone());
                }
            }
        }
        channels
    }

    /// Record the caller id seen on a channel.
    pub fn set_caller_id(&self, channel: &str, name: &str, number: &str) {
        let mut state = self.state.lock().unwrap();
        state.caller_ids.insert(
            channel.to_ascii_lowercase(),
            (name.to_string(), number.to_string()),
        );
    }

    /// Caller id name and number last seen on a channel.
    pub fn caller_id(&self, channel: &str) -> Option<(String, String)> {
        let state = self.state.lock().unwrap();
        state.caller_ids.get(&channel.to_ascii_lowercase()).cloned()
    }
}

impl Default for CallStorage {
    fn default() -> Self {
        Self::new()
    }
}
