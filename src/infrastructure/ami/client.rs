//! AMI TCP client

use async_trait::async_trait;
use bytes::BytesMut;
use metrics::counter;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use super::action::AmiAction;
use super::event::{AmiEvent, AmiFrame};
use crate::domain::shared::{CtiError, Result};
use crate::domain::signaling::SignalingClient;

/// Connected AMI manager session.
///
/// Owns the write side through an action queue; a background reader task
/// decodes incoming frames into [`AmiEvent`]s and feeds them to the
/// single consumer. Reconnection is left to process supervision.
pub struct AmiClient {
    actions: mpsc::UnboundedSender<AmiAction>,
}

impl AmiClient {
    /// Connect, log in, and start the reader and writer tasks.
    ///
    /// Returns the client handle plus the stream of decoded events.
    pub async fn connect(
        addr: &str,
        username: &str,
        secret: &str,
    ) -> Result<(Self, mpsc::Receiver<AmiEvent>)> {
        info!("Connecting to AMI at {}", addr);

        let stream = TcpStream::connect(addr)
            .await
            .map_err(|e| CtiError::Ami(format!("failed to connect to {}: {}", addr, e)))?;
        let (read_half, mut write_half) = stream.into_split();

        write_half
            .write_all(AmiAction::login(username, secret).serialize().as_bytes())
            .await
            .map_err(|e| CtiError::Ami(format!("failed to send login: {}", e)))?;

        let (action_tx, action_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::channel(1000);

        tokio::spawn(Self::write_loop(write_half, action_rx));
        tokio::spawn(Self::read_loop(read_half, event_tx));

        Ok((Self { actions: action_tx }, event_rx))
    }

    fn send_action(&self, action: AmiAction) -> Result<()> {
        self.actions
            .send(action)
            .map_err(|_| CtiError::Ami("AMI connection closed".to_string()))
    }

    async fn write_loop(
        mut write_half: OwnedWriteHalf,
        mut actions: mpsc::UnboundedReceiver<AmiAction>,
    ) {
        while let Some(action) = actions.recv().await {
            if let Err(e) = write_half.write_all(action.serialize().as_bytes()).await {
                error!("Failed to write AMI action: {}", e);
                break;
            }
        }
        debug!("AMI writer task stopped");
    }

    async fn read_loop(mut read_half: OwnedReadHalf, event_tx: mpsc::Sender<AmiEvent>) {
        let mut buf = BytesMut::with_capacity(8192);

        loop {
            match read_half.read_buf(&mut buf).await {
                Ok(0) => {
                    warn!("AMI connection closed by peer");
                    break;
                }
                Ok(_) => {
                    for frame in drain_frames(&mut buf) {
                        match AmiEvent::from_frame(&frame) {
                            Ok(Some(event)) => {
                                counter!("cti_ami_events_decoded").increment(1);
                                if event_tx.send(event).await.is_err() {
                                    debug!("AMI event consumer gone, stopping reader");
                                    return;
                                }
                            }
                            Ok(None) => {}
                            Err(e) => {
                                counter!("cti_ami_frames_dropped").increment(1);
                                warn!("Dropping malformed AMI frame: {}", e);
                            }
                        }
                    }
                }
                Err(e) => {
                    error!("Failed to read from AMI socket: {}", e);
                    break;
                }
            }
        }
    }
}

#[async_trait]
impl SignalingClient for AmiClient {
    async fn hangup(&self, channel: &str) -> Result<()> {
        debug!(channel = %channel, "AMI hangup");
        self.send_action(AmiAction::hangup(channel))
    }

    async fn redirect(&self, channel: &str, exten: &str, context: &str) -> Result<()> {
        debug!(channel = %channel, exten = %exten, "AMI redirect");
        self.send_action(AmiAction::redirect(channel, exten, context))
    }

    async fn atxfer(&self, channel: &str, exten: &str, context: &str) -> Result<()> {
        debug!(channel = %channel, exten = %exten, "AMI atxfer");
        self.send_action(AmiAction::atxfer(channel, exten, context))
    }

    async fn switchboard_retrieve(
        &self,
        line_identity: &str,
        channel: &str,
        cid_name: &str,
        cid_number: &str,
        line_cid_name: &str,
        line_cid_number: &str,
    ) -> Result<()> {
        debug!(line = %line_identity, channel = %channel, "AMI switchboard retrieve");
        self.send_action(AmiAction::switchboard_retrieve(
            line_identity,
            channel,
            cid_name,
            cid_number,
            line_cid_name,
            line_cid_number,
        ))
    }
}

/// Split complete `\r\n\r\n`-terminated frames off the front of the
/// buffer, leaving any trailing partial frame in place.
///
/// Lines without a `: ` separator (the protocol banner, continuation
/// noise) are skipped, so the banner that precedes the first frame
/// decodes to nothing instead of breaking it.
fn drain_frames(buf: &mut BytesMut) -> Vec<AmiFrame> {
    let mut frames = Vec::new();

    while let Some(end) = find_frame_end(buf) {
        let raw = buf.split_to(end + 4);
        let mut frame = AmiFrame::new();
        for line in std::str::from_utf8(&raw)
            .unwrap_or_default()
            .split("\r\n")
        {
            if let Some((key, value)) = line.split_once(": ") {
                frame.insert(key.to_string(), value.to_string());
            }
        }
        if !frame.is_empty() {
            frames.push(frame);
        }
    }

    frames
}

fn find_frame_end(buf: &BytesMut) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}
