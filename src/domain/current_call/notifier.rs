//! Call-state notification fan-out
//!
//! One subscriber per line; subscribing replaces any prior subscriber
//! and immediately pushes the current state. A subscriber whose
//! connection has closed is discovered lazily at push time and dropped
//! without escalation - the client will re-subscribe.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use metrics::counter;
use serde_json::{json, Value};
use tracing::debug;

use crate::domain::channel::Line;
use crate::domain::current_call::formatter::CurrentCallFormatter;
use crate::domain::shared::{CtiError, Result};

/// Handle to a connected client session.
///
/// `send_message` must not block; implementations enqueue onto the
/// session's writer and report a closed connection as
/// [`CtiError::SessionClosed`].
pub trait ClientSession: Send + Sync {
    fn send_message(&self, message: &Value) -> Result<()>;
}

/// Fan-out of current-call notifications to subscribed client sessions.
pub struct CurrentCallNotifier {
    formatter: CurrentCallFormatter,
    subscriptions: Mutex<HashMap<Line, Arc<dyn ClientSession>>>,
}

impl CurrentCallNotifier {
    pub fn new(formatter: CurrentCallFormatter) -> Self {
        Self {
            formatter,
            subscriptions: Mutex::new(HashMap::new()),
        }
    }

    /// Subscribe a session to a line, replacing any prior subscriber,
    /// then push the line's current state.
    pub fn subscribe(&self, line: &Line, session: Arc<dyn ClientSession>) {
        {
            let mut subscriptions = self.subscriptions.lock().unwrap();
            subscriptions.insert(line.clone(), session);
        }
        debug!(line = %line, "subscribed to current call");
        self.report_current_call(line);
    }

    /// Unsubscribe a line only if `session` is still its subscriber.
    ///
    /// Disconnect cleanup must not clobber the subscription of a client
    /// that reconnected and re-subscribed before the stale socket went
    /// away.
    pub fn unsubscribe_session(&self, line: &Line, session: &Arc<dyn ClientSession>) {
        let mut subscriptions = self.subscriptions.lock().unwrap();
        if let Some(current) = subscriptions.get(line) {
            if Arc::ptr_eq(current, session) {
                subscriptions.remove(line);
            }
        }
    }

    /// Push the line's state to its subscriber, if any.
    pub fn publish_current_call(&self, line: &Line) {
        let subscribed = {
            let subscriptions = self.subscriptions.lock().unwrap();
            subscriptions.contains_key(line)
        };
        if subscribed {
            self.report_current_call(line);
        }
    }

    /// Tell the line's subscriber that its attended transfer was
    /// answered by the transfer destination.
    pub fn attended_transfer_answered(&self, line: &Line) {
        let message = json!({
            "class": "attended_transfer_answered",
            "line": line.as_str(),
        });
        self.send_to_line(line, &message);
    }

    fn report_current_call(&self, line: &Line) {
        let message = self.formatter.line_current_call(line);
        self.send_to_line(line, &message);
    }

    fn send_to_line(&self, line: &Line, message: &Value) {
        let session = {
            let subscriptions = self.subscriptions.lock().unwrap();
            subscriptions.get(line).cloned()
        };
        let Some(session) = session else { return };

        match session.send_message(message) {
            Ok(()) => {
                counter!("cti_notifications_sent").increment(1);
            }
            Err(CtiError::SessionClosed) => {
                debug!(line = %line, "connection closed, dropping subscription");
                let mut subscriptions = self.subscriptions.lock().unwrap();
                subscriptions.remove(line);
            }
            Err(error) => {
                debug!(line = %line, %error, "failed to notify subscriber");
            }
        }
    }
}
