//! WebSocket-backed client session

use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::domain::current_call::ClientSession;
use crate::domain::shared::{CtiError, Result};

/// One connected client, addressed by the notifier through
/// [`ClientSession`].
///
/// Sends are non-blocking pushes onto the session's outbound queue; the
/// socket writer task drains it. A closed queue means the socket is gone
/// and surfaces as [`CtiError::SessionClosed`], which makes the notifier
/// drop the subscription.
pub struct WsSession {
    id: Uuid,
    outbound: mpsc::UnboundedSender<Value>,
}

impl WsSession {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<Value>) {
        let (outbound, rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                id: Uuid::new_v4(),
                outbound,
            }),
            rx,
        )
    }

    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl ClientSession for WsSession {
    fn send_message(&self, message: &Value) -> Result<()> {
        self.outbound
            .send(message.clone())
            .map_err(|_| CtiError::SessionClosed)
    }
}
