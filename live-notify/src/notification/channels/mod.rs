//! Notification channels.

mod discord;

pub use discord::{DiscordChannel, DiscordConfig, DiscordTarget};

use async_trait::async_trait;

use crate::Result;

/// Trait for notification channels.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    /// Get the channel type name.
    fn channel_type(&self) -> &'static str;

    /// Deliver `message` once.
    async fn send(&self, message: &str) -> Result<()>;
}
