//! Call lifecycle tracking
//!
//! A [`Call`] is the Endpoint Status Store's entity: one entry per live
//! call, keyed by the signaling source's unique id, linking the source
//! and destination legs. Calls are created on new-channel/dial-begin,
//! extended on bridge and destroyed on hangup/unlink.

pub mod receiver;
pub mod storage;

pub use receiver::CallReceiver;
pub use storage::CallStorage;

use crate::domain::extension::Extension;

/// One leg of a call: a transient channel bound to a stable extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallLeg {
    pub extension: Extension,
    pub channel: String,
}

impl CallLeg {
    pub fn new(extension: Extension, channel: &str) -> Self {
        Self {
            extension,
            channel: channel.to_string(),
        }
    }

    /// Placeholder leg for a call whose destination is not known yet.
    pub fn unresolved() -> Self {
        Self {
            extension: Extension::empty(),
            channel: String::new(),
        }
    }
}

/// A live call as tracked by the Endpoint Status Store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub unique_id: String,
    pub dest_unique_id: String,
    pub source: CallLeg,
    pub destination: CallLeg,
}

impl Call {
    /// Whether the call touches the given extension on either leg.
    pub fn involves(&self, extension: &Extension) -> bool {
        self.source.extension == *extension || self.destination.extension == *extension
    }
}
