//! Discord notification channel.
//!
//! Posts plain messages either through a channel webhook or through the bot
//! REST API. A failed post is reported to the caller and not retried.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, warn};

use super::NotificationChannel;
use crate::Result;

const DISCORD_API_BASE: &str = "https://discord.com/api/v10";

/// Where Discord messages are posted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DiscordTarget {
    /// Incoming webhook URL.
    Webhook { url: String },
    /// Bot token plus the channel to post in.
    Bot { token: String, channel_id: String },
}

/// Discord channel configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    pub target: DiscordTarget,
    /// Optional display name, honoured by webhooks only.
    pub username: Option<String>,
}

/// Discord notification channel.
pub struct DiscordChannel {
    config: DiscordConfig,
    client: Client,
}

impl DiscordChannel {
    /// Create a new Discord channel.
    pub fn new(config: DiscordConfig) -> Result<Self> {
        live_platform::proxy::install_rustls_provider();
        let client = Client::builder()
            .user_agent(concat!("live-notify/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| crate::Error::config(format!("Failed to build Discord client: {}", e)))?;
        Ok(Self { config, client })
    }

    fn endpoint(&self) -> String {
        match &self.config.target {
            DiscordTarget::Webhook { url } => url.clone(),
            DiscordTarget::Bot { channel_id, .. } => {
                format!("{}/channels/{}/messages", DISCORD_API_BASE, channel_id)
            }
        }
    }

    /// Build the request body for a message.
    fn build_payload(&self, message: &str) -> serde_json::Value {
        let mut payload = json!({ "content": message });

        if let DiscordTarget::Webhook { .. } = self.config.target
            && let Some(username) = &self.config.username
        {
            payload["username"] = json!(username);
        }

        payload
    }
}

#[async_trait]
impl NotificationChannel for DiscordChannel {
    fn channel_type(&self) -> &'static str {
        "discord"
    }

    async fn send(&self, message: &str) -> Result<()> {
        let payload = self.build_payload(message);
        let mut request = self.client.post(self.endpoint()).json(&payload);

        if let DiscordTarget::Bot { token, .. } = &self.config.target {
            request = request.header(reqwest::header::AUTHORIZATION, format!("Bot {}", token));
        }

        let response = request
            .send()
            .await
            .map_err(|e| crate::Error::notification(format!("Discord request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            debug!("Discord notification sent");
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        warn!("Discord message failed: {} - {}", status, body);
        Err(crate::Error::notification(format!(
            "Discord message failed: {} - {}",
            status, body
        )))
    }
}
