//! Current-call state machine
//!
//! Maintains the per-line table of active call legs from bridge, hold,
//! hangup and masquerade events, and carries the user-facing transfer
//! orchestration (attended/direct transfer, switchboard hold/retrieve).
//!
//! Bookkeeping operations never fail: an event for an untracked channel
//! is a silent no-op, because events routinely arrive for calls set up
//! before a restart. Orchestration operations fail with
//! [`CtiError::NoSuchCall`] when the acting user has no usable call.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::call::storage::CallStorage;
use crate::domain::call::Call;
use crate::domain::channel::{local_channel_peer, parse_caller_id, same_channel, Line};
use crate::domain::current_call::notifier::CurrentCallNotifier;
use crate::domain::current_call::{CallsPerLine, LineCall};
use crate::domain::directory::{Directory, UserId, UserLine};
use crate::domain::extension::Extension;
use crate::domain::shared::{CtiError, Result};
use crate::domain::signaling::SignalingClient;

/// The Current-Call View and its transfer orchestration.
pub struct CurrentCallManager {
    calls_per_line: CallsPerLine,
    notifier: Arc<CurrentCallNotifier>,
    signaling: Arc<dyn SignalingClient>,
    directory: Arc<dyn Directory>,
    call_storage: Arc<CallStorage>,
}

impl CurrentCallManager {
    pub fn new(
        calls_per_line: CallsPerLine,
        notifier: Arc<CurrentCallNotifier>,
        signaling: Arc<dyn SignalingClient>,
        directory: Arc<dyn Directory>,
        call_storage: Arc<CallStorage>,
    ) -> Self {
        Self {
            calls_per_line,
            notifier,
            signaling,
            directory,
            call_storage,
        }
    }

    /// Record a bridge between two channels on both involved lines.
    ///
    /// Each side gets a record with the other channel as peer; bridging
    /// an already-tracked pair clears its hold flag. When one of the
    /// bridged channels is (or is the local-channel peer of) a tracked
    /// transfer channel, the bridge completes an attended transfer and
    /// the owning line is told exactly once.
    pub fn bridge_channels(&self, channel_1: &str, channel_2: &str) {
        let mut changed: Vec<Line> = Vec::new();
        let answered: Vec<Line>;
        {
            let mut calls = self.calls_per_line.lock().unwrap();
            let now = Utc::now();
            for (line_channel, peer_channel) in
                [(channel_1, channel_2), (channel_2, channel_1)]
            {
                let line = Line::from_channel(line_channel);
                let records = calls.entry(line.clone()).or_default();
                if upsert_bridge(records, line_channel, peer_channel, now)
                    && !changed.contains(&line)
                {
                    changed.push(line);
                }
            }
            answered = completed_transfers(&calls, channel_1, channel_2);
        }

        for line in &answered {
            debug!(line = %line, "attended transfer answered");
            self.notifier.attended_transfer_answered(line);
        }
        for line in &changed {
            self.notifier.publish_current_call(line);
        }
    }

    /// Remove every record mentioning `channel` as line or peer channel,
    /// across all lines; lines left with no records are dropped.
    pub fn end_call(&self, channel: &str) {
        let mut touched: Vec<Line> = Vec::new();
        {
            let mut calls = self.calls_per_line.lock().unwrap();
            calls.retain(|line, records| {
                let before = records.len();
                records.retain(|record| {
                    !same_channel(&record.line_channel, channel)
                        && !same_channel(&record.peer_channel, channel)
                });
                if records.len() != before {
                    touched.push(line.clone());
                }
                !records.is_empty()
            });
        }

        for line in &touched {
            self.notifier.publish_current_call(line);
        }
    }

    /// Mark every record whose peer is `channel` as held.
    pub fn hold_channel(&self, channel: &str) {
        self.set_hold(channel, true);
    }

    /// Clear the hold flag on every record whose peer is `channel`.
    pub fn unhold_channel(&self, channel: &str) {
        self.set_hold(channel, false);
    }

    fn set_hold(&self, channel: &str, on_hold: bool) {
        let mut changed: Vec<Line> = Vec::new();
        {
            let mut calls = self.calls_per_line.lock().unwrap();
            for (line, records) in calls.iter_mut() {
                for record in records.iter_mut() {
                    if same_channel(&record.peer_channel, channel)
                        && record.on_hold != on_hold
                    {
                        record.on_hold = on_hold;
                        if !changed.contains(line) {
                            changed.push(line.clone());
                        }
                    }
                }
            }
        }

        for line in &changed {
            self.notifier.publish_current_call(line);
        }
    }

    /// Rewrite channel identity after a masquerade.
    ///
    /// Every reference to `old` becomes `new`. When `old` is a local
    /// channel half the whole local pair is merged away: its other half
    /// is rewritten to the peer recorded on `old`'s line, and the two
    /// local lines' entries are dropped. Same-name rewrites are per-field
    /// no-ops, so a channel masqueraded onto itself terminates without
    /// touching anything. Masquerade is a bookkeeping correction and
    /// pushes no notification.
    pub fn masquerade(&self, old: &str, new: &str) {
        let old_line = Line::from_channel(old);
        let new_line = Line::from_channel(new);
        let mut calls = self.calls_per_line.lock().unwrap();

        let peer_half = local_channel_peer(old);
        let recorded_peer = calls
            .get(&old_line)
            .and_then(|records| records.first())
            .map(|record| record.peer_channel.clone());

        substitute_channel(&mut calls, old, new);

        if let (Some(peer_half), Some(recorded_peer)) = (peer_half, recorded_peer) {
            substitute_channel(&mut calls, &peer_half, &recorded_peer);

            let peer_line = Line::from_channel(&peer_half);
            if old_line != new_line {
                calls.remove(&old_line);
            }
            if peer_line != new_line {
                calls.remove(&peer_line);
            }
        }
    }

    /// Attach the local channel tracking an in-progress attended
    /// transfer to the record owning `line_channel`; no-op if untracked.
    pub fn set_transfer_channel(&self, line_channel: &str, transfer_channel: &str) {
        let line = Line::from_channel(line_channel);
        let mut calls = self.calls_per_line.lock().unwrap();
        if let Some(records) = calls.get_mut(&line) {
            if let Some(record) = records
                .iter_mut()
                .find(|record| same_channel(&record.line_channel, line_channel))
            {
                record.transfer_channel = Some(transfer_channel.to_string());
            }
        }
    }

    /// Clear the transfer channel from whichever record carries it and
    /// republish that line; no-op if untracked.
    pub fn remove_transfer_channel(&self, transfer_channel: &str) {
        let mut found: Option<Line> = None;
        {
            let mut calls = self.calls_per_line.lock().unwrap();
            'lines: for (line, records) in calls.iter_mut() {
                for record in records.iter_mut() {
                    let matches = record
                        .transfer_channel
                        .as_deref()
                        .is_some_and(|t| same_channel(t, transfer_channel));
                    if matches {
                        record.transfer_channel = None;
                        found = Some(line.clone());
                        break 'lines;
                    }
                }
            }
        }

        if let Some(line) = found {
            self.notifier.publish_current_call(&line);
        }
    }

    /// Snapshot of a line's records; untracked lines yield an empty list.
    pub fn get_line_calls(&self, line_identity: &str) -> Vec<LineCall> {
        let line = Line::new(line_identity);
        let calls = self.calls_per_line.lock().unwrap();
        calls.get(&line).cloned().unwrap_or_default()
    }

    /// Start an attended transfer of the user's current call.
    pub async fn attended_transfer(&self, user_id: UserId, number: &str) -> Result<()> {
        let (user_line, call) = self.active_line_call(user_id).await?;
        self.signaling
            .atxfer(&call.line_channel, number, &user_line.context)
            .await
    }

    /// Blind-transfer the peer of the user's current call.
    pub async fn direct_transfer(&self, user_id: UserId, number: &str) -> Result<()> {
        let (user_line, call) = self.active_line_call(user_id).await?;
        self.signaling
            .redirect(&call.peer_channel, number, &user_line.context)
            .await
    }

    /// Complete the user's in-progress attended transfer by hanging up
    /// the transferer's own leg.
    pub async fn complete_transfer(&self, user_id: UserId) -> Result<()> {
        let (_, call) = self.active_line_call(user_id).await?;
        self.signaling.hangup(&call.line_channel).await
    }

    /// Cancel the user's in-progress attended transfer by hanging up the
    /// transfer leg. Nothing to cancel is a logged no-op.
    pub async fn cancel_transfer(&self, user_id: UserId) -> Result<()> {
        let (user_line, call) = self.active_line_call(user_id).await?;
        let transfered = call
            .transfer_channel
            .as_deref()
            .and_then(local_channel_peer);
        match transfered {
            Some(channel) => self.signaling.hangup(&channel).await,
            None => {
                debug!(line = %user_line.identity, "no transfer in progress to cancel");
                Ok(())
            }
        }
    }

    /// Hang up the user's active call, looked up through the endpoint
    /// status store.
    pub async fn hangup(&self, user_id: UserId) -> Result<()> {
        let call = self.active_call(user_id).await?;
        self.signaling.hangup(&call.source.channel).await
    }

    /// Park the peer of the user's current call on the named hold queue.
    pub async fn switchboard_hold(&self, user_id: UserId, queue_name: &str) -> Result<()> {
        let (number, context) = self.directory.queue(queue_name).await?;
        let (_, call) = self.active_line_call(user_id).await?;
        self.signaling
            .redirect(&call.peer_channel, &number, &context)
            .await
    }

    /// Retrieve a waiting call onto the user's line.
    ///
    /// A line already talking is left alone; otherwise the line's
    /// ringing channels are hung up and the waiting channel is bridged
    /// back with both parties' caller id.
    pub async fn switchboard_retrieve_waiting_call(
        &self,
        user_id: UserId,
        unique_id: &str,
    ) -> Result<()> {
        let channel_to_intercept = match self.directory.channel_from_unique_id(unique_id).await
        {
            Ok(channel) => channel,
            Err(error) => {
                warn!(unique_id = %unique_id, %error, "no channel to retrieve");
                return Ok(());
            }
        };

        let user_line = self
            .directory
            .user_line(user_id)
            .await
            .map_err(|_| CtiError::NoSuchCall(format!("user {} has no line", user_id)))?;

        if !self.get_line_calls(&user_line.identity).is_empty() {
            debug!(line = %user_line.identity, "already talking, not retrieving");
            return Ok(());
        }

        let (cid_name, cid_number) = self
            .directory
            .caller_id(&channel_to_intercept)
            .await
            .unwrap_or_default();
        let (line_cid_name, line_cid_number) = parse_caller_id(&user_line.caller_id);

        let line = Line::new(&user_line.identity);
        if let Ok(ringing) = self.directory.channels_for_line(&line).await {
            for channel in ringing {
                self.signaling.hangup(&channel).await?;
            }
        }

        self.signaling
            .switchboard_retrieve(
                &user_line.identity,
                &channel_to_intercept,
                &cid_name,
                &cid_number,
                &line_cid_name,
                &line_cid_number,
            )
            .await
    }

    /// The user's line and the first record on it.
    async fn active_line_call(&self, user_id: UserId) -> Result<(UserLine, LineCall)> {
        let user_line = self
            .directory
            .user_line(user_id)
            .await
            .map_err(|_| CtiError::NoSuchCall(format!("user {} has no line", user_id)))?;
        let call = self
            .get_line_calls(&user_line.identity)
            .into_iter()
            .next()
            .ok_or_else(|| {
                CtiError::NoSuchCall(format!("no active call on {}", user_line.identity))
            })?;
        Ok((user_line, call))
    }

    /// The user's active call from the endpoint status store.
    async fn active_call(&self, user_id: UserId) -> Result<Call> {
        let user_line = self
            .directory
            .user_line(user_id)
            .await
            .map_err(|_| CtiError::NoSuchCall(format!("user {} has no line", user_id)))?;
        if user_line.number.is_empty() || user_line.context.is_empty() {
            return Err(CtiError::NoSuchCall(format!(
                "user {} has no usable line",
                user_id
            )));
        }
        let extension = Extension::new(&user_line.number, &user_line.context, true);
        self.call_storage
            .find_all_calls_for_extension(&extension)
            .into_iter()
            .next()
            .ok_or_else(|| CtiError::NoSuchCall(format!("no call on {}", extension)))
    }
}

/// Append a record for the bridged pair, or clear the hold flag on the
/// one already tracking it. Returns whether the line changed.
fn upsert_bridge(
    records: &mut Vec<LineCall>,
    line_channel: &str,
    peer_channel: &str,
    now: DateTime<Utc>,
) -> bool {
    if let Some(record) = records
        .iter_mut()
        .find(|record| same_channel(&record.peer_channel, peer_channel))
    {
        if record.on_hold {
            record.on_hold = false;
            return true;
        }
        return false;
    }

    records.push(LineCall {
        peer_channel: peer_channel.to_string(),
        line_channel: line_channel.to_string(),
        bridge_time: now,
        on_hold: false,
        transfer_channel: None,
    });
    true
}

/// Lines whose tracked transfer channel matches one of the bridged
/// channels, directly or as local-channel peer. Each line appears once.
fn completed_transfers(
    calls: &HashMap<Line, Vec<LineCall>>,
    channel_1: &str,
    channel_2: &str,
) -> Vec<Line> {
    let peers = [local_channel_peer(channel_1), local_channel_peer(channel_2)];
    let mut lines: Vec<Line> = Vec::new();
    for (line, records) in calls {
        for record in records {
            let Some(transfer) = record.transfer_channel.as_deref() else {
                continue;
            };
            let direct =
                same_channel(transfer, channel_1) || same_channel(transfer, channel_2);
            let via_peer = peers
                .iter()
                .flatten()
                .any(|peer| same_channel(transfer, peer));
            if (direct || via_peer) && !lines.contains(line) {
                lines.push(line.clone());
            }
        }
    }
    lines
}

/// Rewrite every reference to `old` into `new`, in place.
fn substitute_channel(calls: &mut HashMap<Line, Vec<LineCall>>, old: &str, new: &str) {
    if same_channel(old, new) {
        return;
    }
    for records in calls.values_mut() {
        for record in records.iter_mut() {
            if same_channel(&record.peer_channel, old) {
                record.peer_channel = new.to_string();
            }
            if same_channel(&record.line_channel, old) {
                record.line_channel = new.to_string();
            }
            let transfer_matches = record
                .transfer_channel
                .as_deref()
                .is_some_and(|t| same_channel(t, old));
            if transfer_matches {
                record.transfer_channel = Some(new.to_string());
            }
        }
    }
}
