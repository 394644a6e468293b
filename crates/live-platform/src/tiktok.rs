//! TikTok live transport.
//!
//! Room status is read from the public web endpoints. An "active connection"
//! is a presence watcher bound to the resolved room: it keeps re-reading the
//! room and reports viewer changes and the end of the broadcast as events.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Client;
use serde::de::DeserializeOwned;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{LIVE_ENDED_MESSAGE, TransportError};
use crate::event::{LiveEvent, LiveEventBroadcaster};
use crate::models::{
    ROOM_STATUS_ENDED, ROOM_STATUS_LIVE, RoomInfoResponse, RoomSnapshot, RoomState,
    USER_NOT_FOUND_CODE, UserRoomResponse,
};
use crate::proxy::TransportStrategy;
use crate::transport::LiveTransport;

const USER_ROOM_URL: &str = "https://www.tiktok.com/api-live/user/room/";
const ROOM_INFO_URL: &str = "https://webcast.tiktok.com/webcast/room/info/";
const REFERER: &str = "https://www.tiktok.com/";

/// Default delay between presence checks on an active connection.
pub const DEFAULT_PRESENCE_INTERVAL: Duration = Duration::from_secs(30);

const COMMON_PARAMS: &[(&str, &str)] = &[
    ("aid", "1988"),
    ("app_name", "tiktok_web"),
    ("app_language", "en"),
    ("browser_language", "en-US"),
    ("browser_platform", "Win32"),
    ("device_platform", "web_pc"),
    ("cookie_enabled", "true"),
    ("user_is_login", "false"),
];

struct Session {
    room_id: String,
    cancel: CancellationToken,
}

struct Inner {
    unique_id: String,
    client: Client,
    events: LiveEventBroadcaster,
    session: Mutex<Option<Session>>,
}

/// TikTok implementation of [`LiveTransport`].
pub struct TikTokClient {
    inner: Arc<Inner>,
    strategy: TransportStrategy,
    presence_interval: Duration,
}

impl TikTokClient {
    /// Create a client for `unique_id` (a leading `@` is ignored).
    pub fn new(
        unique_id: impl AsRef<str>,
        strategy: TransportStrategy,
        timeout: Duration,
    ) -> Result<Self, TransportError> {
        let client = strategy.build_client(timeout)?;
        Ok(Self::with_client(unique_id, strategy, client))
    }

    /// Create a client reusing an existing HTTP client.
    pub fn with_client(
        unique_id: impl AsRef<str>,
        strategy: TransportStrategy,
        client: Client,
    ) -> Self {
        let unique_id = unique_id.as_ref().trim().trim_start_matches('@').to_string();
        Self {
            inner: Arc::new(Inner {
                unique_id,
                client,
                events: LiveEventBroadcaster::new(),
                session: Mutex::new(None),
            }),
            strategy,
            presence_interval: DEFAULT_PRESENCE_INTERVAL,
        }
    }

    pub fn with_presence_interval(mut self, interval: Duration) -> Self {
        self.presence_interval = interval;
        self
    }

    /// Room id of the active connection, if any.
    pub fn connected_room(&self) -> Option<String> {
        self.inner
            .session
            .lock()
            .as_ref()
            .map(|s| s.room_id.clone())
    }
}

impl Inner {
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        extra: &[(&str, &str)],
    ) -> Result<T, TransportError> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::REFERER, REFERER)
            .query(COMMON_PARAMS)
            .query(extra)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json::<T>().await?)
    }

    async fn resolve_room_id(&self) -> Result<String, TransportError> {
        let resp: UserRoomResponse = self
            .get_json(
                USER_ROOM_URL,
                &[("sourceType", "54"), ("uniqueId", self.unique_id.as_str())],
            )
            .await?;

        if resp.status_code == USER_NOT_FOUND_CODE {
            return Err(TransportError::UserNotFound(self.unique_id.clone()));
        }
        if resp.status_code != 0 {
            return Err(TransportError::Api {
                code: resp.status_code,
                message: resp.message.unwrap_or_default(),
            });
        }

        let data = resp
            .data
            .ok_or_else(|| TransportError::Other("user room response without data".to_string()))?;

        if let Some(live_room) = &data.live_room
            && live_room.status != ROOM_STATUS_LIVE
        {
            return Err(TransportError::NotLive(LIVE_ENDED_MESSAGE.to_string()));
        }

        data.user
            .map(|u| u.room_id)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| TransportError::NotLive(format!("{} has no active room", self.unique_id)))
    }

    async fn fetch_room_info(&self, room_id: &str) -> Result<RoomSnapshot, TransportError> {
        let resp: RoomInfoResponse = self
            .get_json(ROOM_INFO_URL, &[("room_id", room_id)])
            .await?;

        if resp.status_code != 0 {
            let message = resp
                .data
                .and_then(|d| d.message.or(d.prompts))
                .unwrap_or_default();
            return Err(TransportError::Api {
                code: resp.status_code,
                message,
            });
        }

        let data = resp
            .data
            .ok_or_else(|| TransportError::Other("room info response without data".to_string()))?;

        match data.status {
            ROOM_STATUS_LIVE => Ok(data.into_snapshot(room_id)),
            ROOM_STATUS_ENDED => Err(TransportError::NotLive(LIVE_ENDED_MESSAGE.to_string())),
            other => Err(TransportError::NotLive(format!("room status {other}"))),
        }
    }

    async fn room_info(&self) -> Result<RoomSnapshot, TransportError> {
        let room_id = self.resolve_room_id().await?;
        self.fetch_room_info(&room_id).await
    }

    fn end_session(&self, room_id: &str) {
        let mut session = self.session.lock();
        if session.as_ref().is_some_and(|s| s.room_id == room_id) {
            *session = None;
        }
    }
}

async fn watch_presence(
    inner: Arc<Inner>,
    room_id: String,
    mut last_viewers: u64,
    interval: Duration,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!(room_id = %room_id, "Presence watcher stopped");
                return;
            }
            _ = tokio::time::sleep(interval) => {}
        }

        match inner.fetch_room_info(&room_id).await {
            Ok(snapshot) => {
                if snapshot.viewer_count != last_viewers {
                    last_viewers = snapshot.viewer_count;
                    inner.events.publish(LiveEvent::ViewerCountChanged {
                        viewer_count: last_viewers,
                    });
                }
            }
            Err(e) if e.is_not_live() => {
                info!(room_id = %room_id, "Room ended, closing connection");
                inner.end_session(&room_id);
                inner.events.publish(LiveEvent::Disconnected);
                return;
            }
            Err(e) => {
                warn!(room_id = %room_id, error = %e, "Presence check failed");
                inner.events.publish(LiveEvent::Error {
                    message: e.to_string(),
                });
            }
        }
    }
}

#[async_trait]
impl LiveTransport for TikTokClient {
    fn unique_id(&self) -> &str {
        &self.inner.unique_id
    }

    fn strategy(&self) -> &TransportStrategy {
        &self.strategy
    }

    async fn room_info(&self) -> Result<RoomSnapshot, TransportError> {
        self.inner.room_info().await
    }

    async fn connect(&self) -> Result<RoomState, TransportError> {
        if !self.strategy.supports_active_connection() {
            return Err(TransportError::Other(format!(
                "{} transport cannot carry an active connection",
                self.strategy.name()
            )));
        }

        if let Some(room_id) = self.connected_room() {
            return Err(TransportError::AlreadyConnected(room_id));
        }

        let snapshot = self.inner.room_info().await?;
        let state = RoomState::from(&snapshot);
        let cancel = CancellationToken::new();

        {
            let mut session = self.inner.session.lock();
            if let Some(existing) = session.as_ref() {
                return Err(TransportError::AlreadyConnected(existing.room_id.clone()));
            }
            *session = Some(Session {
                room_id: state.room_id.clone(),
                cancel: cancel.clone(),
            });
        }

        debug!(
            unique_id = %self.inner.unique_id,
            room_id = %state.room_id,
            "Connected to room"
        );
        self.inner.events.publish(LiveEvent::Connected(state.clone()));

        tokio::spawn(watch_presence(
            self.inner.clone(),
            state.room_id.clone(),
            state.viewer_count,
            self.presence_interval,
            cancel,
        ));

        Ok(state)
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        if let Some(session) = self.inner.session.lock().take() {
            debug!(room_id = %session.room_id, "Disconnecting from room");
            session.cancel.cancel();
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<LiveEvent> {
        self.inner.events.subscribe()
    }
}
