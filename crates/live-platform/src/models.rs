//! Room data produced by the transport and the raw platform payloads behind it.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Room status code the platform uses for a running broadcast.
pub(crate) const ROOM_STATUS_LIVE: i64 = 2;

/// Room status code the platform uses for a finished broadcast.
pub(crate) const ROOM_STATUS_ENDED: i64 = 4;

/// `statusCode` returned by the user room endpoint for an unknown handle.
pub(crate) const USER_NOT_FOUND_CODE: i64 = 19881007;

/// Read-only snapshot of a live room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSnapshot {
    pub room_id: String,
    pub viewer_count: u64,
    /// Broadcast start, seconds since epoch.
    pub broadcast_started_at: i64,
    pub bio_text: Option<String>,
    pub playback_url: Option<String>,
}

impl RoomSnapshot {
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.broadcast_started_at, 0).single()
    }

    /// Seconds elapsed since the broadcast started, relative to `now`.
    pub fn age_secs(&self, now: i64) -> i64 {
        now - self.broadcast_started_at
    }
}

/// State reported once an active connection to the room is established.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomState {
    pub room_id: String,
    /// Authoritative broadcast start, seconds since epoch.
    pub broadcast_started_at: i64,
    pub viewer_count: u64,
}

impl From<&RoomSnapshot> for RoomState {
    fn from(snapshot: &RoomSnapshot) -> Self {
        Self {
            room_id: snapshot.room_id.clone(),
            broadcast_started_at: snapshot.broadcast_started_at,
            viewer_count: snapshot.viewer_count,
        }
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UserRoomResponse {
    #[serde(default)]
    pub status_code: i64,
    #[serde(default)]
    pub message: Option<String>,
    pub data: Option<UserRoomData>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UserRoomData {
    pub user: Option<UserRoomUser>,
    pub live_room: Option<LiveRoom>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub(crate) struct UserRoomUser {
    #[serde(default)]
    pub room_id: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub(crate) struct LiveRoom {
    #[serde(default)]
    pub status: i64,
    #[serde(default)]
    pub start_time: i64,
}

#[derive(Deserialize, Debug)]
pub(crate) struct RoomInfoResponse {
    #[serde(default)]
    pub status_code: i64,
    pub data: Option<RoomInfoData>,
}

#[derive(Deserialize, Debug)]
pub(crate) struct RoomInfoData {
    #[serde(default)]
    pub status: i64,
    #[serde(default)]
    pub user_count: u64,
    #[serde(default)]
    pub create_time: i64,
    pub owner: Option<RoomOwner>,
    pub stream_url: Option<RoomStreamUrl>,
    pub message: Option<String>,
    pub prompts: Option<String>,
}

#[derive(Deserialize, Debug)]
pub(crate) struct RoomOwner {
    pub bio_description: Option<String>,
}

#[derive(Deserialize, Debug)]
pub(crate) struct RoomStreamUrl {
    pub hls_pull_url: Option<String>,
}

impl RoomInfoData {
    pub(crate) fn into_snapshot(self, room_id: &str) -> RoomSnapshot {
        RoomSnapshot {
            room_id: room_id.to_string(),
            viewer_count: self.user_count,
            broadcast_started_at: self.create_time,
            bio_text: self
                .owner
                .and_then(|o| o.bio_description)
                .filter(|s| !s.is_empty()),
            playback_url: self
                .stream_url
                .and_then(|s| s.hls_pull_url)
                .filter(|s| !s.is_empty()),
        }
    }
}
