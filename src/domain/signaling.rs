//! Outbound signaling command port
//!
//! The call-state core issues a handful of commands back to the PBX:
//! hangups, redirects and attended transfers. Failures are logged by the
//! caller, never retried here; retry belongs to the transport layer.

use async_trait::async_trait;

use crate::domain::shared::Result;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SignalingClient: Send + Sync {
    /// Hang up a channel.
    async fn hangup(&self, channel: &str) -> Result<()>;

    /// Blind-redirect a channel towards an extension.
    async fn redirect(&self, channel: &str, exten: &str, context: &str) -> Result<()>;

    /// Start an attended transfer of a channel towards an extension.
    async fn atxfer(&self, channel: &str, exten: &str, context: &str) -> Result<()>;

    /// Bridge a waiting channel back to a switchboard line, carrying both
    /// parties' caller id.
    async fn switchboard_retrieve(
        &self,
        line_identity: &str,
        channel: &str,
        cid_name: &str,
        cid_number: &str,
        line_cid_name: &str,
        line_cid_number: &str,
    ) -> Result<()>;
}
