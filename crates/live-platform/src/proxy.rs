//! Transport strategy selection.
//!
//! The strategy is picked once when the transport is built and decides both how
//! the HTTP client reaches the platform and whether an active connection can be
//! carried over that path.

use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Duration;

use reqwest::{Client, Proxy};
use tracing::debug;

use crate::error::TransportError;

pub(crate) const DEFAULT_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0.0.0 Safari/537.36";

/// Proxy flavours understood by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyType {
    /// HTTP(S) forward proxy.
    Http,
    /// SOCKS5 proxy.
    Socks5,
}

impl FromStr for ProxyType {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "http" | "https" => Ok(ProxyType::Http),
            "socks5" | "socks5h" | "socks" => Ok(ProxyType::Socks5),
            other => Err(TransportError::InvalidProxy(format!(
                "unknown proxy type '{other}'"
            ))),
        }
    }
}

/// Proxy authentication.
#[derive(Debug, Clone)]
pub struct ProxyAuth {
    pub username: String,
    pub password: String,
}

/// Proxy endpoint configuration.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Proxy server URL (e.g. "http://proxy.example.com:8080").
    pub url: String,
    /// Optional basic authentication.
    pub auth: Option<ProxyAuth>,
}

impl ProxyConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            auth: None,
        }
    }

    pub fn with_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.auth = Some(ProxyAuth {
            username: username.into(),
            password: password.into(),
        });
        self
    }
}

/// How the transport reaches the platform.
#[derive(Debug, Clone, Default)]
pub enum TransportStrategy {
    /// No proxy; system proxy variables are ignored.
    #[default]
    Direct,
    /// Through an HTTP proxy. Only snapshot polling is possible.
    HttpProxy(ProxyConfig),
    /// Through a SOCKS5 tunnel, which can also carry an active connection.
    Socks5Proxy(ProxyConfig),
}

impl TransportStrategy {
    /// Build a strategy from a proxy type and URL.
    pub fn from_proxy(proxy_type: ProxyType, config: ProxyConfig) -> Self {
        match proxy_type {
            ProxyType::Http => TransportStrategy::HttpProxy(config),
            ProxyType::Socks5 => TransportStrategy::Socks5Proxy(config),
        }
    }

    /// Whether an active connection may be opened over this path.
    ///
    /// When `false` the caller must evaluate liveness from polled snapshots only.
    pub fn supports_active_connection(&self) -> bool {
        !matches!(self, TransportStrategy::HttpProxy(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            TransportStrategy::Direct => "direct",
            TransportStrategy::HttpProxy(_) => "http",
            TransportStrategy::Socks5Proxy(_) => "socks5",
        }
    }

    /// Build the reqwest proxy for this strategy, if any.
    pub fn build_proxy(&self) -> Result<Option<Proxy>, TransportError> {
        let (config, url) = match self {
            TransportStrategy::Direct => return Ok(None),
            TransportStrategy::HttpProxy(config) => {
                let url = if config.url.contains("://") {
                    config.url.clone()
                } else {
                    format!("http://{}", config.url)
                };
                (config, url)
            }
            TransportStrategy::Socks5Proxy(config) => {
                let url = if config.url.starts_with("socks5://")
                    || config.url.starts_with("socks5h://")
                {
                    config.url.clone()
                } else {
                    format!("socks5://{}", config.url)
                };
                (config, url)
            }
        };

        url::Url::parse(&url)
            .map_err(|e| TransportError::InvalidProxy(format!("{url}: {e}")))?;

        let mut proxy = Proxy::all(&url)
            .map_err(|e| TransportError::InvalidProxy(format!("{url}: {e}")))?;

        if let Some(auth) = &config.auth {
            proxy = proxy.basic_auth(&auth.username, &auth.password);
        }

        Ok(Some(proxy))
    }

    /// Build the HTTP client used by the transport.
    ///
    /// `timeout` bounds every request; a timed-out request surfaces as a
    /// transport error to the caller.
    pub fn build_client(&self, timeout: Duration) -> Result<Client, TransportError> {
        install_rustls_provider();

        let mut builder = Client::builder().user_agent(DEFAULT_UA);

        if timeout > Duration::ZERO {
            builder = builder.timeout(timeout);
        }

        builder = match self.build_proxy()? {
            Some(proxy) => builder.proxy(proxy),
            None => builder.no_proxy(),
        };

        Ok(builder.build()?)
    }
}

pub fn install_rustls_provider() {
    static PROVIDER_INSTALLED: OnceLock<()> = OnceLock::new();
    PROVIDER_INSTALLED.get_or_init(|| {
        if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
            // Another crate installed one first.
            debug!(existing_provider = ?e, "rustls CryptoProvider already installed");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proxy_type_from_str() {
        assert_eq!("http".parse::<ProxyType>().unwrap(), ProxyType::Http);
        assert_eq!("HTTPS".parse::<ProxyType>().unwrap(), ProxyType::Http);
        assert_eq!("socks5".parse::<ProxyType>().unwrap(), ProxyType::Socks5);
        assert!("ftp".parse::<ProxyType>().is_err());
    }

    #[test]
    fn test_active_connection_support() {
        assert!(TransportStrategy::Direct.supports_active_connection());
        assert!(
            TransportStrategy::Socks5Proxy(ProxyConfig::new("127.0.0.1:1080"))
                .supports_active_connection()
        );
        assert!(
            !TransportStrategy::HttpProxy(ProxyConfig::new("127.0.0.1:8080"))
                .supports_active_connection()
        );
    }

    #[test]
    fn test_build_proxy() {
        assert!(TransportStrategy::Direct.build_proxy().unwrap().is_none());

        let socks = TransportStrategy::from_proxy(
            ProxyType::Socks5,
            ProxyConfig::new("127.0.0.1:1080").with_auth("user", "pass"),
        );
        assert!(socks.build_proxy().unwrap().is_some());
        assert_eq!(socks.name(), "socks5");

        let http = TransportStrategy::from_proxy(ProxyType::Http, ProxyConfig::new("proxy:8080"));
        assert!(http.build_proxy().unwrap().is_some());
    }

    #[test]
    fn test_build_client() {
        let client = TransportStrategy::Direct.build_client(Duration::from_secs(5));
        assert!(client.is_ok());
    }
}
