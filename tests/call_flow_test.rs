//! End-to-end call flow through the event translator
//!
//! Drives a realistic AMI event sequence into both state containers and
//! observes what a subscribed client session sees.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Arc, Mutex};

use patchbay::domain::call::{CallReceiver, CallStorage};
use patchbay::domain::channel::Line;
use patchbay::domain::current_call::{
    new_calls_per_line, ClientSession, CurrentCallFormatter, CurrentCallManager,
    CurrentCallNotifier,
};
use patchbay::domain::directory::{Directory, InMemoryDirectory, UserLine};
use patchbay::domain::endpoint::EndpointStatus;
use patchbay::domain::extension::Extension;
use patchbay::domain::signaling::SignalingClient;
use patchbay::infrastructure::ami::AmiEvent;
use patchbay::Result;

const CHANNEL_1: &str = "SIP/tc8nb4-00000004";
const CHANNEL_2: &str = "SIP/6s7foq-00000005";

struct RecordingSession {
    messages: Mutex<Vec<Value>>,
}

impl ClientSession for RecordingSession {
    fn send_message(&self, message: &Value) -> Result<()> {
        self.messages.lock().unwrap().push(message.clone());
        Ok(())
    }
}

struct NullSignaling;

#[async_trait]
impl SignalingClient for NullSignaling {
    async fn hangup(&self, _channel: &str) -> Result<()> {
        Ok(())
    }

    async fn redirect(&self, _channel: &str, _exten: &str, _context: &str) -> Result<()> {
        Ok(())
    }

    async fn atxfer(&self, _channel: &str, _exten: &str, _context: &str) -> Result<()> {
        Ok(())
    }

    async fn switchboard_retrieve(
        &self,
        _line_identity: &str,
        _channel: &str,
        _cid_name: &str,
        _cid_number: &str,
        _line_cid_name: &str,
        _line_cid_number: &str,
    ) -> Result<()> {
        Ok(())
    }
}

struct Harness {
    receiver: CallReceiver,
    storage: Arc<CallStorage>,
    notifier: Arc<CurrentCallNotifier>,
    session: Arc<RecordingSession>,
}

fn harness() -> Harness {
    let storage = Arc::new(CallStorage::new());

    let mut directory = InMemoryDirectory::new(storage.clone());
    directory.add_user(
        5,
        UserLine {
            identity: "sip/tc8nb4".to_string(),
            number: "1001".to_string(),
            context: "default".to_string(),
            caller_id: "\"Alice\" <1001>".to_string(),
        },
    );
    directory.add_line(
        Line::new("sip/tc8nb4"),
        Extension::new("1001", "default", true),
    );
    directory.add_line(
        Line::new("sip/6s7foq"),
        Extension::new("1002", "default", true),
    );
    let directory: Arc<dyn Directory> = Arc::new(directory);

    let calls_per_line = new_calls_per_line();
    let notifier = Arc::new(CurrentCallNotifier::new(CurrentCallFormatter::new(
        calls_per_line.clone(),
    )));
    let manager = Arc::new(CurrentCallManager::new(
        calls_per_line,
        notifier.clone(),
        Arc::new(NullSignaling),
        directory.clone(),
        storage.clone(),
    ));
    let receiver = CallReceiver::new(storage.clone(), manager, directory);

    let session = Arc::new(RecordingSession {
        messages: Mutex::new(Vec::new()),
    });
    notifier.subscribe(&Line::new("sip/tc8nb4"), session.clone());

    Harness {
        receiver,
        storage,
        notifier,
        session,
    }
}

fn last_state_push(session: &RecordingSession) -> Value {
    session
        .messages
        .lock()
        .unwrap()
        .iter()
        .rev()
        .find(|m| m["class"] == "current_calls")
        .cloned()
        .expect("no current_calls message seen")
}

#[tokio::test]
async fn test_full_call_lifecycle() {
    let h = harness();

    h.receiver
        .handle(AmiEvent::NewChannel {
            channel: CHANNEL_1.to_string(),
            unique_id: "1.2".to_string(),
        })
        .await;
    h.receiver
        .handle(AmiEvent::NewState {
            channel: CHANNEL_2.to_string(),
            channel_state: "5".to_string(),
        })
        .await;

    assert_eq!(
        h.storage
            .endpoint_status(&Extension::new("1002", "default", true)),
        EndpointStatus::Ringing
    );

    h.receiver
        .handle(AmiEvent::BridgeLink {
            channel_1: CHANNEL_1.to_string(),
            channel_2: CHANNEL_2.to_string(),
            unique_id_1: "1.2".to_string(),
            unique_id_2: "1.3".to_string(),
        })
        .await;

    let push = last_state_push(&h.session);
    assert_eq!(push["line"], "sip/tc8nb4");
    assert_eq!(push["calls"].as_array().unwrap().len(), 1);
    assert_eq!(push["calls"][0]["peer_channel"], CHANNEL_2);
    assert_eq!(push["calls"][0]["on_hold"], false);

    h.receiver
        .handle(AmiEvent::Hold {
            channel: CHANNEL_2.to_string(),
            on: true,
        })
        .await;

    let push = last_state_push(&h.session);
    assert_eq!(push["calls"][0]["on_hold"], true);

    h.receiver
        .handle(AmiEvent::Hold {
            channel: CHANNEL_2.to_string(),
            on: false,
        })
        .await;

    let push = last_state_push(&h.session);
    assert_eq!(push["calls"][0]["on_hold"], false);

    h.receiver
        .handle(AmiEvent::Hangup {
            channel: CHANNEL_1.to_string(),
            unique_id: "1.2".to_string(),
        })
        .await;

    let push = last_state_push(&h.session);
    assert!(push["calls"].as_array().unwrap().is_empty());
    assert_eq!(h.storage.channel_by_unique_id("1.2"), None);
}

#[tokio::test]
async fn test_subscribe_pushes_current_state_immediately() {
    let h = harness();

    h.receiver
        .handle(AmiEvent::BridgeLink {
            channel_1: CHANNEL_1.to_string(),
            channel_2: CHANNEL_2.to_string(),
            unique_id_1: "1.2".to_string(),
            unique_id_2: "1.3".to_string(),
        })
        .await;

    // a late subscriber gets the current state without waiting for an event
    let late = Arc::new(RecordingSession {
        messages: Mutex::new(Vec::new()),
    });
    h.notifier.subscribe(&Line::new("sip/6s7foq"), late.clone());

    let push = last_state_push(&late);
    assert_eq!(push["line"], "sip/6s7foq");
    assert_eq!(push["calls"][0]["peer_channel"], CHANNEL_1);
}

#[tokio::test]
async fn test_events_for_unknown_channels_are_harmless() {
    let h = harness();

    h.receiver
        .handle(AmiEvent::NewChannel {
            channel: "IAX2/trunk-00000008".to_string(),
            unique_id: "9.9".to_string(),
        })
        .await;
    h.receiver
        .handle(AmiEvent::Hold {
            channel: "IAX2/trunk-00000008".to_string(),
            on: true,
        })
        .await;
    h.receiver
        .handle(AmiEvent::Hangup {
            channel: "IAX2/trunk-00000008".to_string(),
            unique_id: "9.9".to_string(),
        })
        .await;

    assert!(h.session.messages.lock().unwrap().len() <= 1);
    assert_eq!(h.storage.channel_by_unique_id("9.9"), None);
}
