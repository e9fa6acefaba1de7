//! Directory lookups
//!
//! The directory resolves stable identities the signaling stream does not
//! carry: which line a user is logged on, which extension answers a queue
//! name, which channel currently holds a unique call id. Every lookup can
//! fail with a not-found condition, which callers treat as "do nothing".

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::call::storage::CallStorage;
use crate::domain::channel::Line;
use crate::domain::extension::Extension;
use crate::domain::shared::{CtiError, Result};

/// User identifier as carried by the client protocol.
pub type UserId = u64;

/// A user's current line as known by the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserLine {
    /// Line identity, e.g. `"sip/tc8nb4"`
    pub identity: String,
    pub number: String,
    pub context: String,
    /// Raw caller id string, e.g. `"John" <123>`
    pub caller_id: String,
}

/// Read-only directory port.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Directory: Send + Sync {
    /// Resolve a user id to its current line.
    async fn user_line(&self, user_id: UserId) -> Result<UserLine>;

    /// Resolve a line identity to its extension.
    async fn extension_for_line(&self, line: &Line) -> Result<Extension>;

    /// Resolve a queue name to its `(number, context)` pair.
    async fn queue(&self, name: &str) -> Result<(String, String)>;

    /// Resolve a unique call id to the channel currently holding it.
    async fn channel_from_unique_id(&self, unique_id: &str) -> Result<String>;

    /// Caller id name and number of a live channel.
    async fn caller_id(&self, channel: &str) -> Result<(String, String)>;

    /// Live channels whose line identity matches `line`.
    async fn channels_for_line(&self, line: &Line) -> Result<Vec<String>>;
}

/// Directory backed by configuration tables for the static entries and by
/// the call storage for live channel lookups.
pub struct InMemoryDirectory {
    users: HashMap<UserId, UserLine>,
    lines: HashMap<Line, Extension>,
    queues: HashMap<String, (String, String)>,
    call_storage: Arc<CallStorage>,
}

impl InMemoryDirectory {
    pub fn new(call_storage: Arc<CallStorage>) -> Self {
        Self {
            users: HashMap::new(),
            lines: HashMap::new(),
            queues: HashMap::new(),
            call_storage,
        }
    }

    pub fn add_user(&mut self, user_id: UserId, line: UserLine) {
        self.users.insert(user_id, line);
    }

    pub fn add_line(&mut self, line: Line, extension: Extension) {
        self.lines.insert(line, extension);
    }

    pub fn add_queue(&mut self, name: &str, number: &str, context: &str) {
        self.queues
            .insert(name.to_string(), (number.to_string(), context.to_string()));
    }
}

#[async_trait]
impl Directory for InMemoryDirectory {
    async fn user_line(&self, user_id: UserId) -> Result<UserLine> {
        self.users
            .get(&user_id)
            .cloned()
            .ok_or_else(|| CtiError::NoSuchLine(format!("user {}", user_id)))
    }

    async fn extension_for_line(&self, line: &Line) -> Result<Extension> {
        self.lines
            .get(line)
            .cloned()
            .ok_or_else(|| CtiError::NotFound(format!("line {}", line)))
    }

    async fn queue(&self, name: &str) -> Result<(String, String)> {
        self.queues
            .get(name)
            .cloned()
            .ok_or_else(|| CtiError::NotFound(format!("queue {}", name)))
    }

    async fn channel_from_unique_id(&self, unique_id: &str) -> Result<String> {
        self.call_storage
            .channel_by_unique_id(unique_id)
            .ok_or_else(|| CtiError::NotFound(format!("unique id {}", unique_id)))
    }

    async fn caller_id(&self, channel: &str) -> Result<(String, String)> {
        self.call_storage
            .caller_id(channel)
            .ok_or_else(|| CtiError::NotFound(format!("caller id of {}", channel)))
    }

    async fn channels_for_line(&self, line: &Line) -> Result<Vec<String>> {
        Ok(self.call_storage.channels_for_line(line))
    }
}
