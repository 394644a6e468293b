//! Startup configuration.
//!
//! Everything is read once from the environment (after `dotenvy` has loaded an
//! optional `.env` file). Parsing goes through a lookup function so tests can
//! supply their own variables. Missing or malformed values are fatal.

use std::str::FromStr;
use std::time::Duration;

use live_platform::{ProxyConfig, ProxyType, TransportStrategy};

use crate::api::ApiServerConfig;
use crate::error::{Error, Result};
use crate::monitor::EngineConfig;
use crate::notification::{DiscordConfig, DiscordTarget, unescape_template};
use crate::scheduler::PollInterval;

/// Default notification text.
pub const DEFAULT_MESSAGE: &str = "The stream is live!";

/// Default SQLite database URL.
pub const DEFAULT_DATABASE_URL: &str = "sqlite:live-notify.db?mode=rwc";

/// How ticks are triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TriggerMode {
    /// Timer-driven ticks.
    #[default]
    Interval,
    /// One tick per inbound HTTP request.
    Http,
}

impl FromStr for TriggerMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "interval" => Ok(TriggerMode::Interval),
            "http" => Ok(TriggerMode::Http),
            other => Err(Error::config(format!("unknown trigger mode '{other}'"))),
        }
    }
}

/// Fully resolved application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Monitored handle, without a leading `@`.
    pub unique_id: String,
    pub discord: DiscordConfig,
    pub engine: EngineConfig,
    pub poll_interval: PollInterval,
    pub transport: TransportStrategy,
    pub transport_timeout: Duration,
    /// How often an open connection re-checks the room.
    pub presence_interval: Duration,
    pub trigger: TriggerMode,
    pub api: ApiServerConfig,
    pub database_url: String,
}

impl AppConfig {
    /// Load from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let vars = Vars(lookup);

        let unique_id = vars
            .required("TIKTOK_USERNAME")?
            .trim_start_matches('@')
            .to_string();
        if unique_id.is_empty() {
            return Err(Error::config("TIKTOK_USERNAME must not be empty"));
        }

        let engine = EngineConfig {
            min_viewers: vars.parse_or("MIN_VIEWERS", 1)?,
            min_update_interval: vars.parse_or("MIN_UPDATE_INTERVAL_SECS", 3600)?,
            disconnect_cooldown: vars.parse_or("DISCONNECT_COOLDOWN_SECS", 1800)?,
            keep_connection: vars.bool_or("KEEP_CONNECTION", true)?,
            auto_retry: vars.bool_or("AUTO_RETRY", true)?,
            message: unescape_template(
                &vars
                    .get("DISCORD_MESSAGE")
                    .unwrap_or_else(|| DEFAULT_MESSAGE.to_string()),
            ),
        };
        if engine.min_update_interval < 0 || engine.disconnect_cooldown < 0 {
            return Err(Error::config("intervals must not be negative"));
        }

        let presence_secs: u64 = vars.parse_or("PRESENCE_INTERVAL_SECS", 30)?;
        if presence_secs == 0 {
            return Err(Error::config("PRESENCE_INTERVAL_SECS must be positive"));
        }

        let mut api = ApiServerConfig::default();
        if let Some(bind_address) = vars.get("API_BIND_ADDRESS") {
            api.bind_address = bind_address;
        }
        api.port = vars.parse_or("API_PORT", api.port)?;
        if let Some(path) = vars.get("TRIGGER_PATH") {
            api.trigger_path = if path.starts_with('/') {
                path
            } else {
                format!("/{path}")
            };
        }

        Ok(Self {
            unique_id,
            discord: discord_config(&vars)?,
            engine,
            poll_interval: poll_interval(&vars)?,
            transport: transport_strategy(&vars)?,
            transport_timeout: Duration::from_millis(vars.parse_or("PROXY_TIMEOUT_MS", 10_000)?),
            presence_interval: Duration::from_secs(presence_secs),
            trigger: vars.parse_or("TRIGGER_MODE", TriggerMode::default())?,
            api,
            database_url: vars
                .get("DATABASE_URL")
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
        })
    }
}

/// Trimmed, non-empty variable access.
struct Vars<F>(F);

impl<F> Vars<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn get(&self, key: &str) -> Option<String> {
        (self.0)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn required(&self, key: &str) -> Result<String> {
        self.get(key)
            .ok_or_else(|| Error::config(format!("{key} is required")))
    }

    fn parse<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.get(key)
            .map(|raw| {
                raw.parse::<T>()
                    .map_err(|e| Error::config(format!("invalid {key} '{raw}': {e}")))
            })
            .transpose()
    }

    fn parse_or<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        Ok(self.parse(key)?.unwrap_or(default))
    }

    fn bool_or(&self, key: &str, default: bool) -> Result<bool> {
        match self.get(key).map(|v| v.to_ascii_lowercase()) {
            None => Ok(default),
            Some(v) => match v.as_str() {
                "true" | "1" | "yes" | "on" => Ok(true),
                "false" | "0" | "no" | "off" => Ok(false),
                _ => Err(Error::config(format!("invalid {key} '{v}': expected a boolean"))),
            },
        }
    }
}

fn discord_config<F>(vars: &Vars<F>) -> Result<DiscordConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let target = if let Some(url) = vars.get("DISCORD_WEBHOOK_URL") {
        DiscordTarget::Webhook { url }
    } else {
        match (vars.get("DISCORD_TOKEN"), vars.get("DISCORD_CHANNEL_ID")) {
            (Some(token), Some(channel_id)) => DiscordTarget::Bot { token, channel_id },
            (Some(_), None) => return Err(Error::config("DISCORD_CHANNEL_ID is required")),
            _ => {
                return Err(Error::config(
                    "DISCORD_WEBHOOK_URL or DISCORD_TOKEN with DISCORD_CHANNEL_ID is required",
                ));
            }
        }
    };

    Ok(DiscordConfig {
        target,
        username: vars.get("DISCORD_USERNAME"),
    })
}

fn poll_interval<F>(vars: &Vars<F>) -> Result<PollInterval>
where
    F: Fn(&str) -> Option<String>,
{
    let min = vars.parse::<u64>("POLL_INTERVAL_MIN_SECS")?;
    let max = vars.parse::<u64>("POLL_INTERVAL_MAX_SECS")?;

    match (min, max) {
        (Some(min), Some(max)) => {
            if min > max {
                return Err(Error::config(format!(
                    "POLL_INTERVAL_MIN_SECS ({min}) exceeds POLL_INTERVAL_MAX_SECS ({max})"
                )));
            }
            Ok(PollInterval::Jittered {
                min: Duration::from_secs(min),
                max: Duration::from_secs(max),
            })
        }
        (None, None) => {
            let secs = vars.parse_or("POLL_INTERVAL_SECS", 10u64)?;
            if secs == 0 {
                return Err(Error::config("POLL_INTERVAL_SECS must be positive"));
            }
            Ok(PollInterval::Fixed(Duration::from_secs(secs)))
        }
        _ => Err(Error::config(
            "POLL_INTERVAL_MIN_SECS and POLL_INTERVAL_MAX_SECS must be set together",
        )),
    }
}

fn transport_strategy<F>(vars: &Vars<F>) -> Result<TransportStrategy>
where
    F: Fn(&str) -> Option<String>,
{
    let proxy_type = vars
        .get("PROXY_TYPE")
        .map(|raw| raw.parse::<ProxyType>())
        .transpose()?;

    let Some(url) = vars.get("PROXY_URL") else {
        if proxy_type.is_some() {
            return Err(Error::config("PROXY_TYPE is set but PROXY_URL is missing"));
        }
        return Ok(TransportStrategy::Direct);
    };

    let mut proxy = ProxyConfig::new(url);
    if let Some(username) = vars.get("PROXY_USERNAME") {
        proxy = proxy.with_auth(username, vars.get("PROXY_PASSWORD").unwrap_or_default());
    }

    let strategy = TransportStrategy::from_proxy(proxy_type.unwrap_or(ProxyType::Http), proxy);
    // Surface malformed proxy URLs now rather than on the first poll.
    strategy.build_proxy()?;
    Ok(strategy)
}
