//! The live transport capability consumed by the status engine.

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::TransportError;
use crate::event::LiveEvent;
use crate::models::{RoomSnapshot, RoomState};
use crate::proxy::TransportStrategy;

/// Access to one monitored identity's live room.
#[async_trait]
pub trait LiveTransport: Send + Sync {
    /// Handle of the monitored identity.
    fn unique_id(&self) -> &str;

    /// Strategy the transport was built with.
    fn strategy(&self) -> &TransportStrategy;

    /// Fetch a room snapshot.
    ///
    /// Fails with [`TransportError::NotLive`] when the identity is not broadcasting.
    async fn room_info(&self) -> Result<RoomSnapshot, TransportError>;

    /// Open an active connection to the room.
    ///
    /// Implementations publish [`LiveEvent::Connected`] before returning `Ok`.
    async fn connect(&self) -> Result<RoomState, TransportError>;

    /// Close the active connection, if any. Does not publish `Disconnected`.
    async fn disconnect(&self) -> Result<(), TransportError>;

    /// Subscribe to connection events.
    fn subscribe(&self) -> broadcast::Receiver<LiveEvent>;
}
