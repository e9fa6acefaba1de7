//! WebSocket command handling
//!
//! Clients connect to `/ws?user_id=N`, subscribe to their line and issue
//! transfer commands as tagged JSON objects. State pushes travel the
//! other way through the session queue.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::channel::Line;
use crate::domain::current_call::{ClientSession, CurrentCallManager, CurrentCallNotifier};
use crate::domain::directory::UserId;
use crate::interface::session::WsSession;

/// Commands a client session may issue.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "class", rename_all = "snake_case")]
pub enum ClientCommand {
    Subscribe { line: String },
    Unsubscribe { line: String },
    AttendedTransfer { number: String },
    DirectTransfer { number: String },
    CompleteTransfer,
    CancelTransfer,
    Hangup,
    SwitchboardHold { queue: String },
    SwitchboardRetrieve { unique_id: String },
}

#[derive(Clone)]
pub struct WsState {
    pub manager: Arc<CurrentCallManager>,
    pub notifier: Arc<CurrentCallNotifier>,
}

#[derive(Debug, Deserialize)]
pub struct ConnectParams {
    pub user_id: UserId,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(state): State<WsState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, params.user_id, state))
}

async fn handle_socket(socket: WebSocket, user_id: UserId, state: WsState) {
    let (mut sink, mut stream) = socket.split();
    let (session, mut outbound) = WsSession::new();

    info!(user_id = %user_id, session_id = %session.id(), "CTI client connected");

    let mut send_task = tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            let text = message.to_string();
            if sink.send(Message::Text(text)).await.is_err() {
                debug!("Failed to push to WebSocket client");
                break;
            }
        }
    });

    // lines this session subscribed, for cleanup on disconnect
    let mut subscribed: Vec<Line> = Vec::new();

    loop {
        let message = tokio::select! {
            message = stream.next() => message,
            _ = &mut send_task => break,
        };
        let Some(Ok(message)) = message else {
            break;
        };

        match message {
            Message::Text(text) => match serde_json::from_str::<ClientCommand>(&text) {
                Ok(command) => {
                    dispatch(&state, user_id, &session, &mut subscribed, command).await;
                }
                Err(e) => {
                    warn!(user_id = %user_id, "Unparseable client command: {}", e);
                    let _ = session
                        .send_message(&json!({"class": "error", "message": "unknown command"}));
                }
            },
            Message::Close(_) => break,
            Message::Ping(_) | Message::Pong(_) | Message::Binary(_) => {}
        }
    }

    // Only remove subscriptions this session still owns. The client may
    // already have reconnected and re-subscribed from a fresh socket.
    let as_client: Arc<dyn ClientSession> = session.clone();
    for line in &subscribed {
        state.notifier.unsubscribe_session(line, &as_client);
    }
    send_task.abort();
    info!(user_id = %user_id, "CTI client disconnected");
}

async fn dispatch(
    state: &WsState,
    user_id: UserId,
    session: &Arc<WsSession>,
    subscribed: &mut Vec<Line>,
    command: ClientCommand,
) {
    let result = match command {
        ClientCommand::Subscribe { line } => {
            let line = Line::new(&line);
            state.notifier.subscribe(&line, session.clone());
            if !subscribed.contains(&line) {
                subscribed.push(line);
            }
            Ok(())
        }
        ClientCommand::Unsubscribe { line } => {
            let line = Line::new(&line);
            let as_client: Arc<dyn ClientSession> = session.clone();
            state.notifier.unsubscribe_session(&line, &as_client);
            subscribed.retain(|l| l != &line);
            Ok(())
        }
        ClientCommand::AttendedTransfer { number } => {
            state.manager.attended_transfer(user_id, &number).await
        }
        ClientCommand::DirectTransfer { number } => {
            state.manager.direct_transfer(user_id, &number).await
        }
        ClientCommand::CompleteTransfer => state.manager.complete_transfer(user_id).await,
        ClientCommand::CancelTransfer => state.manager.cancel_transfer(user_id).await,
        ClientCommand::Hangup => state.manager.hangup(user_id).await,
        ClientCommand::SwitchboardHold { queue } => {
            state.manager.switchboard_hold(user_id, &queue).await
        }
        ClientCommand::SwitchboardRetrieve { unique_id } => {
            state
                .manager
                .switchboard_retrieve_waiting_call(user_id, &unique_id)
                .await
        }
    };

    if let Err(error) = result {
        warn!(user_id = %user_id, %error, "Client command failed");
        let _ = session
            .send_message(&json!({"class": "error", "message": error.to_string()}));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribe_command_parses() {
        let command: ClientCommand =
            serde_json::from_str(r#"{"class": "subscribe", "line": "sip/tc8nb4"}"#).unwrap();

        assert_eq!(
            command,
            ClientCommand::Subscribe {
                line: "sip/tc8nb4".to_string(),
            }
        );
    }

    #[test]
    fn test_attended_transfer_command_parses() {
        let command: ClientCommand =
            serde_json::from_str(r#"{"class": "attended_transfer", "number": "1002"}"#)
                .unwrap();

        assert_eq!(
            command,
            ClientCommand::AttendedTransfer {
                number: "1002".to_string(),
            }
        );
    }

    #[test]
    fn test_bare_commands_parse() {
        for (raw, expected) in [
            (r#"{"class": "complete_transfer"}"#, ClientCommand::CompleteTransfer),
            (r#"{"class": "cancel_transfer"}"#, ClientCommand::CancelTransfer),
            (r#"{"class": "hangup"}"#, ClientCommand::Hangup),
        ] {
            let command: ClientCommand = serde_json::from_str(raw).unwrap();
            assert_eq!(command, expected);
        }
    }

    #[test]
    fn test_switchboard_retrieve_command_parses() {
        let command: ClientCommand = serde_json::from_str(
            r#"{"class": "switchboard_retrieve", "unique_id": "1234567.44"}"#,
        )
        .unwrap();

        assert_eq!(
            command,
            ClientCommand::SwitchboardRetrieve {
                unique_id: "1234567.44".to_string(),
            }
        );
    }

    #[test]
    fn test_unknown_class_is_rejected() {
        let result = serde_json::from_str::<ClientCommand>(r#"{"class": "make_coffee"}"#);

        assert!(result.is_err());
    }
}
