use thiserror::Error;

/// Message the platform reports when a room exists but the broadcast is over.
pub const LIVE_ENDED_MESSAGE: &str = "LIVE has ended";

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("not live: {0}")]
    NotLive(String),
    #[error("user not found: {0}")]
    UserNotFound(String),
    #[error("already connected to room {0}")]
    AlreadyConnected(String),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid proxy: {0}")]
    InvalidProxy(String),
    #[error("api error {code}: {message}")]
    Api { code: i64, message: String },
    #[error("other: {0}")]
    Other(String),
}

impl TransportError {
    /// Whether this failure only means the broadcast is not running right now.
    ///
    /// Everything else is treated as a transient transport failure.
    pub fn is_not_live(&self) -> bool {
        match self {
            TransportError::NotLive(_) => true,
            TransportError::Api { message, .. } | TransportError::Other(message) => {
                message.contains(LIVE_ENDED_MESSAGE)
            }
            _ => false,
        }
    }

    /// Whether the underlying request timed out.
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Http(e) if e.is_timeout())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_live_classification() {
        assert!(TransportError::NotLive("offline".to_string()).is_not_live());
        assert!(
            TransportError::Other(format!("room 42: {}", LIVE_ENDED_MESSAGE)).is_not_live()
        );
        assert!(
            TransportError::Api {
                code: 4003110,
                message: LIVE_ENDED_MESSAGE.to_string(),
            }
            .is_not_live()
        );
    }

    #[test]
    fn test_transient_classification() {
        assert!(!TransportError::Other("connection reset".to_string()).is_not_live());
        assert!(!TransportError::UserNotFound("nobody".to_string()).is_not_live());
        assert!(!TransportError::InvalidProxy("bad".to_string()).is_not_live());
    }
}
