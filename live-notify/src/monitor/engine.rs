//! The status engine.
//!
//! Each [`StatusEngine::tick`] drains pending transport events, then acts on
//! the current status:
//!
//! | status       | action                                               |
//! |--------------|------------------------------------------------------|
//! | Offline      | poll the room; connect or evaluate when it qualifies |
//! | Connected    | go Offline once the viewer count drops to zero       |
//! | Disconnected | go Offline once the cooldown has elapsed             |
//! | Ended        | nothing                                              |
//!
//! The state is copied at the start of a tick and written back as a whole at
//! the end, so an error escaping a tick leaves the previous state intact.

use std::sync::Arc;

use live_platform::{LiveEvent, LiveTransport, RoomSnapshot, RoomState, TransportError};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, error, info, warn};

use super::clock::Clock;
use super::policy::{NotifyDecision, NotifyPolicy};
use super::report::{FailureKind, TickReport};
use super::state::{MonitorState, MonitorStatus};
use crate::Result;
use crate::database::repositories::DedupStore;
use crate::notification::NotificationChannel;

/// Broadcasts younger than this get their introduction logged.
const INTRO_WINDOW_SECS: i64 = 300;

/// Rooms reporting this many viewers or fewer are not worth a connection attempt.
const CONNECT_VIEWER_FLOOR: u64 = 1;

/// Engine tuning.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub min_viewers: u64,
    /// Seconds.
    pub min_update_interval: i64,
    /// Seconds to wait after a dropped connection before polling again.
    pub disconnect_cooldown: i64,
    /// Keep the active connection open after the notify decision.
    pub keep_connection: bool,
    /// When false, a failed connection setup ends monitoring.
    pub auto_retry: bool,
    /// Notification text, already unescaped.
    pub message: String,
}

impl EngineConfig {
    pub fn policy(&self) -> NotifyPolicy {
        NotifyPolicy::new(self.min_viewers, self.min_update_interval)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_viewers: 1,
            min_update_interval: 3600,
            disconnect_cooldown: 1800,
            keep_connection: true,
            auto_retry: true,
            message: "The stream is live!".to_string(),
        }
    }
}

#[derive(Debug, Default)]
struct TickOutcome {
    notified: bool,
    failure: Option<FailureKind>,
}

impl TickOutcome {
    fn fail(&mut self, kind: FailureKind) {
        self.failure = Some(kind);
    }
}

/// Map a transport failure to its per-tick classification.
pub fn classify_failure(err: &TransportError) -> FailureKind {
    if err.is_not_live() {
        FailureKind::ExpectedAbsence
    } else {
        FailureKind::TransientTransport
    }
}

/// Live-status state machine for one monitored identity.
pub struct StatusEngine {
    transport: Arc<dyn LiveTransport>,
    channel: Arc<dyn NotificationChannel>,
    dedup: DedupStore,
    clock: Arc<dyn Clock>,
    policy: NotifyPolicy,
    config: EngineConfig,
    events: broadcast::Receiver<LiveEvent>,
    state: MonitorState,
}

impl StatusEngine {
    /// Create a new engine in the `Offline` state.
    pub fn new(
        transport: Arc<dyn LiveTransport>,
        channel: Arc<dyn NotificationChannel>,
        dedup: DedupStore,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        let events = transport.subscribe();
        Self {
            policy: config.policy(),
            transport,
            channel,
            dedup,
            clock,
            config,
            events,
            state: MonitorState::new(),
        }
    }

    pub fn state(&self) -> &MonitorState {
        &self.state
    }

    fn active_mode(&self) -> bool {
        self.transport.strategy().supports_active_connection()
    }

    /// Run one step of the state machine.
    ///
    /// Expected absences, transport errors and delivery failures are logged
    /// and reported in the [`TickReport`]. Only unclassified failures, such
    /// as the dedup store being unavailable, are returned as `Err`.
    pub async fn tick(&mut self) -> Result<TickReport> {
        let now = self.clock.now();
        let mut next = self.state;
        let mut outcome = TickOutcome::default();

        self.drain_events(&mut next, now, &mut outcome).await?;

        match next.status {
            MonitorStatus::Offline => self.poll_offline(&mut next, now, &mut outcome).await?,
            MonitorStatus::Connected => self.check_connected(&mut next, &mut outcome).await,
            MonitorStatus::Disconnected { retry_at } => {
                if now >= retry_at {
                    debug!("Disconnect cooldown elapsed");
                    next.status = MonitorStatus::Offline;
                }
            }
            MonitorStatus::Ended => {}
        }

        if next.status != self.state.status {
            info!(
                unique_id = %self.transport.unique_id(),
                from = %self.state.status,
                to = %next.status,
                "Monitor status changed"
            );
        }

        self.state = next;
        Ok(TickReport::new(&self.state, outcome.notified, outcome.failure))
    }

    /// Apply every pending transport event. Returns whether one of them was
    /// a `Connected` event.
    async fn drain_events(
        &mut self,
        next: &mut MonitorState,
        now: i64,
        outcome: &mut TickOutcome,
    ) -> Result<bool> {
        let mut saw_connected = false;
        loop {
            match self.events.try_recv() {
                Ok(event) => {
                    saw_connected |= self.apply_event(event, next, now, outcome).await?;
                }
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!(skipped, "Live event receiver lagged, events dropped");
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return Ok(saw_connected),
            }
        }
    }

    async fn apply_event(
        &self,
        event: LiveEvent,
        next: &mut MonitorState,
        now: i64,
        outcome: &mut TickOutcome,
    ) -> Result<bool> {
        match event {
            LiveEvent::Connected(room) => {
                if next.is_ended() {
                    return Ok(false);
                }
                self.on_connected(room, next, now, outcome).await?;
                return Ok(true);
            }
            LiveEvent::Disconnected => {
                if next.status == MonitorStatus::Connected {
                    let retry_at = now + self.config.disconnect_cooldown;
                    info!(retry_at, "Disconnected from room");
                    next.status = MonitorStatus::Disconnected { retry_at };
                    next.viewer_count = 0;
                } else {
                    debug!(status = %next.status, "Ignoring disconnect outside a connection");
                }
            }
            LiveEvent::ViewerCountChanged { viewer_count } => {
                debug!(viewer_count, "Viewer count changed");
                next.viewer_count = viewer_count;
            }
            LiveEvent::Error { message } => {
                warn!(error = %message, "Live connection error");
                outcome.fail(FailureKind::TransientTransport);
            }
        }
        Ok(false)
    }

    async fn on_connected(
        &self,
        room: RoomState,
        next: &mut MonitorState,
        now: i64,
        outcome: &mut TickOutcome,
    ) -> Result<()> {
        info!(room_id = %room.room_id, "Connected to room");
        next.status = MonitorStatus::Connected;
        next.viewer_count = room.viewer_count;
        next.broadcast_started_at = Some(room.broadcast_started_at);

        self.evaluate(room.broadcast_started_at, room.viewer_count, now, outcome)
            .await?;
        Ok(())
    }

    async fn poll_offline(
        &mut self,
        next: &mut MonitorState,
        now: i64,
        outcome: &mut TickOutcome,
    ) -> Result<()> {
        let snapshot = match self.transport.room_info().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                report_transport_failure(&e, outcome);
                return Ok(());
            }
        };

        next.viewer_count = snapshot.viewer_count;
        next.broadcast_started_at = Some(snapshot.broadcast_started_at);

        let introduced = snapshot.age_secs(now) < INTRO_WINDOW_SECS;
        if introduced {
            log_introduction(&snapshot);
        }

        if snapshot.viewer_count <= CONNECT_VIEWER_FLOOR {
            debug!(viewers = snapshot.viewer_count, "Too few viewers to evaluate");
            return Ok(());
        }

        if self.active_mode() {
            return self
                .connect_and_evaluate(&snapshot, introduced, next, now, outcome)
                .await;
        }

        let live = self
            .evaluate(
                snapshot.broadcast_started_at,
                snapshot.viewer_count,
                now,
                outcome,
            )
            .await?;
        if live {
            next.status = MonitorStatus::Connected;
        }
        Ok(())
    }

    async fn connect_and_evaluate(
        &mut self,
        snapshot: &RoomSnapshot,
        introduced: bool,
        next: &mut MonitorState,
        now: i64,
        outcome: &mut TickOutcome,
    ) -> Result<()> {
        let room = match self.transport.connect().await {
            Ok(room) => room,
            Err(e) => {
                report_transport_failure(&e, outcome);
                if !e.is_not_live() && !self.config.auto_retry {
                    warn!("Connection setup failed with auto retry disabled, monitoring ended");
                    next.status = MonitorStatus::Ended;
                }
                return Ok(());
            }
        };

        if !introduced {
            log_introduction(snapshot);
        }

        // The tick's state is discarded on error, so a session opened here
        // must not outlive it.
        if let Err(e) = self.settle_connection(room, next, now, outcome).await {
            warn!(error = %e, "Evaluation failed after connecting, releasing connection");
            self.release_connection().await;
            return Err(e);
        }

        if !self.config.keep_connection {
            self.release_connection().await;
            if next.status == MonitorStatus::Connected {
                next.status = MonitorStatus::Offline;
            }
        }
        Ok(())
    }

    async fn settle_connection(
        &mut self,
        room: RoomState,
        next: &mut MonitorState,
        now: i64,
        outcome: &mut TickOutcome,
    ) -> Result<()> {
        let saw_connected = self.drain_events(next, now, outcome).await?;
        if !saw_connected {
            debug!("Transport returned without a connected event");
            self.on_connected(room, next, now, outcome).await?;
        }
        Ok(())
    }

    async fn check_connected(&self, next: &mut MonitorState, outcome: &mut TickOutcome) {
        if !self.active_mode() {
            match self.transport.room_info().await {
                Ok(snapshot) => {
                    next.viewer_count = snapshot.viewer_count;
                    next.broadcast_started_at = Some(snapshot.broadcast_started_at);
                }
                Err(e) => {
                    report_transport_failure(&e, outcome);
                    if e.is_not_live() {
                        next.viewer_count = 0;
                    }
                }
            }
        }

        if next.viewer_count == 0 {
            info!("Broadcast is over");
            if self.active_mode() {
                self.release_connection().await;
            }
            next.status = MonitorStatus::Offline;
        }
    }

    /// Apply the notify policy to a candidate broadcast. Returns whether it
    /// counts as newly live.
    async fn evaluate(
        &self,
        started_at: i64,
        viewers: u64,
        now: i64,
        outcome: &mut TickOutcome,
    ) -> Result<bool> {
        let record = self.dedup.load().await?;
        let decision = self.policy.decide(started_at, viewers, now, &record);
        debug!(?decision, started_at, viewers, "Evaluated notify policy");

        match decision {
            NotifyDecision::Notify => {
                // Markers go first: a failed send still consumes the broadcast.
                self.dedup.record_notification(now, started_at).await?;
                match self.channel.send(&self.config.message).await {
                    Ok(()) => {
                        info!(
                            channel = self.channel.channel_type(),
                            started_at, viewers, "Broadcast announced"
                        );
                        outcome.notified = true;
                    }
                    Err(e) => {
                        error!(
                            channel = self.channel.channel_type(),
                            error = %e,
                            started_at,
                            "Failed to deliver notification"
                        );
                        outcome.fail(FailureKind::Delivery);
                    }
                }
            }
            NotifyDecision::RecordObservation => self.dedup.record_observation(now).await?,
            NotifyDecision::Ignore => {}
        }

        Ok(decision.is_live())
    }

    async fn release_connection(&self) {
        if let Err(e) = self.transport.disconnect().await {
            warn!(error = %e, "Failed to disconnect from room");
        }
    }
}

fn report_transport_failure(err: &TransportError, outcome: &mut TickOutcome) {
    let kind = classify_failure(err);
    match kind {
        FailureKind::ExpectedAbsence => debug!(reason = %err, "Not live"),
        _ => warn!(error = %err, timeout = err.is_timeout(), "Transport error"),
    }
    outcome.fail(kind);
}

fn log_introduction(snapshot: &RoomSnapshot) {
    let started = snapshot
        .started_at()
        .map(|t| {
            t.with_timezone(&chrono::Local)
                .format("%d/%m/%Y %H:%M:%S")
                .to_string()
        })
        .unwrap_or_else(|| snapshot.broadcast_started_at.to_string());

    info!(
        room_id = %snapshot.room_id,
        started_at = %started,
        bio = snapshot.bio_text.as_deref().unwrap_or(""),
        hls_url = snapshot.playback_url.as_deref().unwrap_or(""),
        viewers = snapshot.viewer_count,
        "Broadcast started"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_failure() {
        assert_eq!(
            classify_failure(&TransportError::NotLive("LIVE has ended".into())),
            FailureKind::ExpectedAbsence
        );
        assert_eq!(
            classify_failure(&TransportError::Other("LIVE has ended, room closed".into())),
            FailureKind::ExpectedAbsence
        );
        assert_eq!(
            classify_failure(&TransportError::Other("connection reset".into())),
            FailureKind::TransientTransport
        );
        assert_eq!(
            classify_failure(&TransportError::UserNotFound("someone".into())),
            FailureKind::TransientTransport
        );
    }

    #[test]
    fn test_default_config_policy() {
        let config = EngineConfig::default();
        assert_eq!(config.policy(), NotifyPolicy::new(1, 3600));
        assert_eq!(config.disconnect_cooldown, 1800);
    }
}
