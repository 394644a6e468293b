//! Live room transport for a single monitored streaming identity.
//!
//! Provides the [`LiveTransport`] capability (room snapshots, an active
//! connection and its event stream) and a TikTok implementation of it.

pub mod error;
pub mod event;
pub mod models;
pub mod proxy;
pub mod tiktok;
pub mod transport;

pub use error::TransportError;
pub use event::{LiveEvent, LiveEventBroadcaster};
pub use models::{RoomSnapshot, RoomState};
pub use proxy::{ProxyAuth, ProxyConfig, ProxyType, TransportStrategy};
pub use tiktok::TikTokClient;
pub use transport::LiveTransport;
