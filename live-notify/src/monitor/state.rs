//! In-memory monitor state.

use serde::{Deserialize, Serialize};

/// Lifecycle of the monitored broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum MonitorStatus {
    /// Not connected; the next tick polls the room.
    #[default]
    Offline,
    /// A broadcast is being followed.
    Connected,
    /// The connection dropped; polling resumes once `retry_at` is reached.
    Disconnected { retry_at: i64 },
    /// Connection setup failed and retrying is disabled. Terminal.
    Ended,
}

impl MonitorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Offline => "offline",
            Self::Connected => "connected",
            Self::Disconnected { .. } => "disconnected",
            Self::Ended => "ended",
        }
    }

    pub fn retry_at(&self) -> Option<i64> {
        match self {
            Self::Disconnected { retry_at } => Some(*retry_at),
            _ => None,
        }
    }
}

impl std::fmt::Display for MonitorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of what the engine knows about the room.
///
/// Rebuilt from scratch on every start and replaced as a whole at the end of
/// each tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MonitorState {
    pub status: MonitorStatus,
    pub viewer_count: u64,
    pub broadcast_started_at: Option<i64>,
}

impl MonitorState {
    /// Fresh state at process start.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_ended(&self) -> bool {
        self.status == MonitorStatus::Ended
    }
}
