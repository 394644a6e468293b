//! Events emitted by a live transport.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::models::RoomState;

/// Connection state transitions and room updates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiveEvent {
    /// An active connection was established.
    Connected(RoomState),
    /// The platform closed the connection or the room ended.
    Disconnected,
    /// Latest viewer count reported for the room.
    ViewerCountChanged { viewer_count: u64 },
    /// Non-fatal transport failure observed by the connection.
    Error { message: String },
}

/// Fan-out for live events.
#[derive(Debug, Clone)]
pub struct LiveEventBroadcaster {
    sender: broadcast::Sender<LiveEvent>,
}

impl LiveEventBroadcaster {
    /// Create a new broadcaster with default capacity (64).
    pub fn new() -> Self {
        Self::with_capacity(64)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LiveEvent> {
        self.sender.subscribe()
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn publish(&self, event: LiveEvent) {
        let _ = self.sender.send(event);
    }
}

impl Default for LiveEventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}
