//! Event translator
//!
//! Turns each normalized signaling event into operations against the
//! Endpoint Status Store and the Current-Call View. Both containers are
//! fed from the same stream; the receiver is the single writer driving
//! them, one event at a time, in arrival order.
//!
//! A channel that does not resolve to a known extension (trunks,
//! unconfigured devices) is not an error: the store-side effect is
//! skipped with a debug log and the event otherwise proceeds.

use std::sync::Arc;

use metrics::counter;
use tracing::debug;

use crate::domain::call::storage::CallStorage;
use crate::domain::call::{Call, CallLeg};
use crate::domain::channel::Line;
use crate::domain::current_call::CurrentCallManager;
use crate::domain::directory::Directory;
use crate::domain::endpoint::EndpointStatus;
use crate::domain::extension::Extension;
use crate::infrastructure::ami::AmiEvent;

pub struct CallReceiver {
    storage: Arc<CallStorage>,
    manager: Arc<CurrentCallManager>,
    directory: Arc<dyn Directory>,
}

impl CallReceiver {
    pub fn new(
        storage: Arc<CallStorage>,
        manager: Arc<CurrentCallManager>,
        directory: Arc<dyn Directory>,
    ) -> Self {
        Self {
            storage,
            manager,
            directory,
        }
    }

    /// Apply one event to both state containers.
    pub async fn handle(&self, event: AmiEvent) {
        counter!("cti_events_processed").increment(1);
        match event {
            AmiEvent::NewChannel { channel, unique_id } => {
                self.on_new_channel(&channel, &unique_id).await;
            }
            AmiEvent::DialBegin {
                channel,
                destination,
                unique_id,
                dest_unique_id,
            } => {
                self.link_call(&channel, &destination, &unique_id, &dest_unique_id)
                    .await;
            }
            AmiEvent::BridgeLink {
                channel_1,
                channel_2,
                unique_id_1,
                unique_id_2,
            } => {
                // bridge is the first correlatable event on some flows
                self.link_call(&channel_1, &channel_2, &unique_id_1, &unique_id_2)
                    .await;
                self.manager.bridge_channels(&channel_1, &channel_2);
            }
            AmiEvent::BridgeUnlink { unique_id_1, .. } => {
                self.storage.end_call(&unique_id_1);
            }
            AmiEvent::NewState {
                channel,
                channel_state,
            } => {
                self.on_newstate(&channel, &channel_state).await;
            }
            AmiEvent::NewCallerId {
                channel,
                name,
                number,
            } => {
                self.storage.set_caller_id(&channel, &name, &number);
            }
            AmiEvent::Hangup { channel, unique_id } => {
                self.on_hangup(&channel, &unique_id).await;
            }
            AmiEvent::Hold { channel, on } => {
                if on {
                    self.manager.hold_channel(&channel);
                } else {
                    self.manager.unhold_channel(&channel);
                }
            }
            AmiEvent::Masquerade { original, clone } => {
                self.manager.masquerade(&original, &clone);
            }
        }
    }

    async fn on_new_channel(&self, channel: &str, unique_id: &str) {
        let Some(extension) = self.resolve(channel).await else {
            return;
        };
        self.storage.new_call(Call {
            unique_id: unique_id.to_string(),
            dest_unique_id: String::new(),
            source: CallLeg::new(extension, channel),
            destination: CallLeg::unresolved(),
        });
    }

    /// Create or extend the call linking both sides. A side whose channel
    /// resolves to nothing keeps its channel with an empty extension;
    /// when neither side resolves the event is dropped.
    async fn link_call(
        &self,
        source_channel: &str,
        dest_channel: &str,
        unique_id: &str,
        dest_unique_id: &str,
    ) {
        let source = self.resolve(source_channel).await;
        let destination = self.resolve(dest_channel).await;
        if source.is_none() && destination.is_none() {
            debug!(
                source = %source_channel,
                destination = %dest_channel,
                "neither side resolves, dropping call linkage"
            );
            return;
        }

        self.storage.new_call(Call {
            unique_id: unique_id.to_string(),
            dest_unique_id: dest_unique_id.to_string(),
            source: CallLeg::new(source.unwrap_or_else(Extension::empty), source_channel),
            destination: CallLeg::new(
                destination.unwrap_or_else(Extension::empty),
                dest_channel,
            ),
        });
    }

    async fn on_newstate(&self, channel: &str, channel_state: &str) {
        // unmapped channel states carry no endpoint meaning
        let Some(status) = EndpointStatus::from_channel_state(channel_state) else {
            return;
        };
        let Some(extension) = self.resolve(channel).await else {
            return;
        };
        self.storage.update_endpoint_status(&extension, status);
    }

    async fn on_hangup(&self, channel: &str, unique_id: &str) {
        if let Some(extension) = self.resolve(channel).await {
            self.storage
                .update_endpoint_status(&extension, EndpointStatus::Available);
        }
        self.storage.end_call(unique_id);
        self.manager.end_call(channel);
    }

    async fn resolve(&self, channel: &str) -> Option<Extension> {
        let line = Line::from_channel(channel);
        match self.directory.extension_for_line(&line).await {
            Ok(extension) => Some(extension),
            Err(error) => {
                debug!(channel = %channel, %error, "channel has no extension");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::current_call::formatter::CurrentCallFormatter;
    use crate::domain::current_call::notifier::CurrentCallNotifier;
    use crate::domain::current_call::new_calls_per_line;
    use crate::domain::directory::MockDirectory;
    use crate::domain::shared::CtiError;
    use crate::domain::signaling::MockSignalingClient;
    use mockall::predicate::eq;

    const CHANNEL_1: &str = "SIP/tc8nb4-00000004";
    const CHANNEL_2: &str = "SIP/6s7foq-00000005";

    fn extension_1() -> Extension {
        Extension::new("1001", "default", true)
    }

    fn extension_2() -> Extension {
        Extension::new("1002", "default", true)
    }

    fn directory_knowing_both() -> MockDirectory {
        let mut directory = MockDirectory::new();
        directory
            .expect_extension_for_line()
            .with(eq(Line::new("sip/tc8nb4")))
            .returning(|_| Ok(extension_1()));
        directory
            .expect_extension_for_line()
            .with(eq(Line::new("sip/6s7foq")))
            .returning(|_| Ok(extension_2()));
        directory
            .expect_extension_for_line()
            .returning(|line| Err(CtiError::NotFound(line.to_string())));
        directory
    }

    fn receiver_with(
        directory: MockDirectory,
    ) -> (CallReceiver, Arc<CallStorage>, Arc<CurrentCallManager>) {
        let storage = Arc::new(CallStorage::new());
        let calls_per_line = new_calls_per_line();
        let notifier = Arc::new(CurrentCallNotifier::new(CurrentCallFormatter::new(
            calls_per_line.clone(),
        )));
        let directory: Arc<dyn Directory> = Arc::new(directory);
        let manager = Arc::new(CurrentCallManager::new(
            calls_per_line,
            notifier,
            Arc::new(MockSignalingClient::new()),
            directory.clone(),
            storage.clone(),
        ));
        (
            CallReceiver::new(storage.clone(), manager.clone(), directory),
            storage,
            manager,
        )
    }

    #[tokio::test]
    async fn test_new_channel_creates_a_call() {
        let (receiver, storage, _) = receiver_with(directory_knowing_both());

        receiver
            .handle(AmiEvent::NewChannel {
                channel: CHANNEL_1.to_string(),
                unique_id: "1.2".to_string(),
            })
            .await;

        let calls = storage.find_all_calls_for_extension(&extension_1());
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].source.channel, CHANNEL_1);
        assert_eq!(calls[0].unique_id, "1.2");
    }

    #[tokio::test]
    async fn test_new_channel_for_trunk_is_dropped() {
        let (receiver, storage, _) = receiver_with(directory_knowing_both());

        receiver
            .handle(AmiEvent::NewChannel {
                channel: "SIP/mytrunk-00000007".to_string(),
                unique_id: "1.9".to_string(),
            })
            .await;

        assert_eq!(storage.channel_by_unique_id("1.9"), None);
    }

    #[tokio::test]
    async fn test_dial_begin_links_both_legs() {
        let (receiver, storage, _) = receiver_with(directory_knowing_both());

        receiver
            .handle(AmiEvent::DialBegin {
                channel: CHANNEL_1.to_string(),
                destination: CHANNEL_2.to_string(),
                unique_id: "1.2".to_string(),
                dest_unique_id: "1.3".to_string(),
            })
            .await;

        let calls = storage.find_all_calls_for_extension(&extension_2());
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].destination.channel, CHANNEL_2);
        assert_eq!(calls[0].dest_unique_id, "1.3");
    }

    #[tokio::test]
    async fn test_dial_from_trunk_keeps_resolved_side() {
        let (receiver, storage, _) = receiver_with(directory_knowing_both());

        receiver
            .handle(AmiEvent::DialBegin {
                channel: "SIP/mytrunk-00000007".to_string(),
                destination: CHANNEL_2.to_string(),
                unique_id: "1.2".to_string(),
                dest_unique_id: "1.3".to_string(),
            })
            .await;

        let calls = storage.find_all_calls_for_extension(&extension_2());
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].source.channel, "SIP/mytrunk-00000007");
    }

    #[tokio::test]
    async fn test_bridge_feeds_both_containers() {
        let (receiver, storage, manager) = receiver_with(directory_knowing_both());

        receiver
            .handle(AmiEvent::BridgeLink {
                channel_1: CHANNEL_1.to_string(),
                channel_2: CHANNEL_2.to_string(),
                unique_id_1: "1.2".to_string(),
                unique_id_2: "1.3".to_string(),
            })
            .await;

        assert_eq!(
            storage.channel_by_unique_id("1.2"),
            Some(CHANNEL_1.to_string())
        );
        let line_calls = manager.get_line_calls("sip/tc8nb4");
        assert_eq!(line_calls.len(), 1);
        assert_eq!(line_calls[0].peer_channel, CHANNEL_2);
    }

    #[tokio::test]
    async fn test_unlink_destroys_the_stored_call() {
        let (receiver, storage, _) = receiver_with(directory_knowing_both());

        receiver
            .handle(AmiEvent::BridgeLink {
                channel_1: CHANNEL_1.to_string(),
                channel_2: CHANNEL_2.to_string(),
                unique_id_1: "1.2".to_string(),
                unique_id_2: "1.3".to_string(),
            })
            .await;
        receiver
            .handle(AmiEvent::BridgeUnlink {
                channel_1: CHANNEL_1.to_string(),
                channel_2: CHANNEL_2.to_string(),
                unique_id_1: "1.2".to_string(),
            })
            .await;

        assert_eq!(storage.channel_by_unique_id("1.2"), None);
    }

    #[tokio::test]
    async fn test_newstate_updates_endpoint_status() {
        let (receiver, storage, _) = receiver_with(directory_knowing_both());

        receiver
            .handle(AmiEvent::NewState {
                channel: CHANNEL_1.to_string(),
                channel_state: "5".to_string(),
            })
            .await;

        assert_eq!(
            storage.endpoint_status(&extension_1()),
            EndpointStatus::Ringing
        );
    }

    #[tokio::test]
    async fn test_newstate_unmapped_state_is_ignored() {
        let (receiver, storage, _) = receiver_with(directory_knowing_both());

        receiver
            .handle(AmiEvent::NewState {
                channel: CHANNEL_1.to_string(),
                channel_state: "4".to_string(),
            })
            .await;

        assert_eq!(
            storage.endpoint_status(&extension_1()),
            EndpointStatus::Available
        );
    }

    #[tokio::test]
    async fn test_hangup_clears_both_containers() {
        let (receiver, storage, manager) = receiver_with(directory_knowing_both());

        receiver
            .handle(AmiEvent::BridgeLink {
                channel_1: CHANNEL_1.to_string(),
                channel_2: CHANNEL_2.to_string(),
                unique_id_1: "1.2".to_string(),
                unique_id_2: "1.3".to_string(),
            })
            .await;
        receiver
            .handle(AmiEvent::NewState {
                channel: CHANNEL_1.to_string(),
                channel_state: "6".to_string(),
            })
            .await;
        receiver
            .handle(AmiEvent::Hangup {
                channel: CHANNEL_1.to_string(),
                unique_id: "1.2".to_string(),
            })
            .await;

        assert_eq!(
            storage.endpoint_status(&extension_1()),
            EndpointStatus::Available
        );
        assert_eq!(storage.channel_by_unique_id("1.2"), None);
        assert!(manager.get_line_calls("sip/tc8nb4").is_empty());
        assert!(manager.get_line_calls("sip/6s7foq").is_empty());
    }

    #[tokio::test]
    async fn test_hold_and_unhold_are_routed() {
        let (receiver, _, manager) = receiver_with(directory_knowing_both());

        receiver
            .handle(AmiEvent::BridgeLink {
                channel_1: CHANNEL_1.to_string(),
                channel_2: CHANNEL_2.to_string(),
                unique_id_1: "1.2".to_string(),
                unique_id_2: "1.3".to_string(),
            })
            .await;
        receiver
            .handle(AmiEvent::Hold {
                channel: CHANNEL_2.to_string(),
                on: true,
            })
            .await;

        assert!(manager.get_line_calls("sip/tc8nb4")[0].on_hold);

        receiver
            .handle(AmiEvent::Hold {
                channel: CHANNEL_2.to_string(),
                on: false,
            })
            .await;

        assert!(!manager.get_line_calls("sip/tc8nb4")[0].on_hold);
    }

    #[tokio::test]
    async fn test_masquerade_is_routed() {
        let (receiver, _, manager) = receiver_with(directory_knowing_both());

        receiver
            .handle(AmiEvent::BridgeLink {
                channel_1: CHANNEL_1.to_string(),
                channel_2: CHANNEL_2.to_string(),
                unique_id_1: "1.2".to_string(),
                unique_id_2: "1.3".to_string(),
            })
            .await;
        receiver
            .handle(AmiEvent::Masquerade {
                original: CHANNEL_2.to_string(),
                clone: "SIP/6s7foq-00000009".to_string(),
            })
            .await;

        assert_eq!(
            manager.get_line_calls("sip/tc8nb4")[0].peer_channel,
            "SIP/6s7foq-00000009"
        );
    }

    #[tokio::test]
    async fn test_new_callerid_is_stored() {
        let (receiver, storage, _) = receiver_with(directory_knowing_both());

        receiver
            .handle(AmiEvent::NewCallerId {
                channel: CHANNEL_1.to_string(),
                name: "Alice".to_string(),
                number: "1001".to_string(),
            })
            .await;

        assert_eq!(
            storage.caller_id(CHANNEL_1),
            Some(("Alice".to_string(), "1001".to_string()))
        );
    }

}
