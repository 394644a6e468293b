//! Typed gateway for the persisted notification dedup markers.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::warn;

use super::kv::KvStore;
use crate::Result;

/// Key holding the time of the last notification attempt or observation.
pub const LAST_UPDATE_KEY: &str = "lastUpdate";

/// Key holding the broadcast start that was last announced.
pub const LAST_UPDATE_STARTED_TIME_KEY: &str = "lastUpdateStartedTime";

/// Persisted dedup facts. Timestamps are seconds since epoch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupRecord {
    pub last_notified_at: Option<i64>,
    pub last_notified_broadcast_start: Option<i64>,
}

/// Reads and writes [`DedupRecord`] through a [`KvStore`].
#[derive(Clone)]
pub struct DedupStore {
    store: Arc<dyn KvStore>,
}

impl DedupStore {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    pub async fn load(&self) -> Result<DedupRecord> {
        Ok(DedupRecord {
            last_notified_at: self.read_timestamp(LAST_UPDATE_KEY).await?,
            last_notified_broadcast_start: self
                .read_timestamp(LAST_UPDATE_STARTED_TIME_KEY)
                .await?,
        })
    }

    /// Mark broadcast `started_at` as announced at `now`.
    ///
    /// Both markers are written together. A half-written pair would leave
    /// `lastUpdate` fresh without a broadcast start to match against.
    pub async fn record_notification(&self, now: i64, started_at: i64) -> Result<()> {
        self.store
            .set_many(&[
                (LAST_UPDATE_KEY, json!(now)),
                (LAST_UPDATE_STARTED_TIME_KEY, json!(started_at)),
            ])
            .await
    }

    /// Record that a qualifying broadcast was seen at `now` without announcing it.
    pub async fn record_observation(&self, now: i64) -> Result<()> {
        self.store.set(LAST_UPDATE_KEY, json!(now)).await
    }

    /// Forget both markers.
    pub async fn reset(&self) -> Result<()> {
        self.store.delete(LAST_UPDATE_KEY).await?;
        self.store.delete(LAST_UPDATE_STARTED_TIME_KEY).await?;
        Ok(())
    }

    async fn read_timestamp(&self, key: &str) -> Result<Option<i64>> {
        let value = self.store.get(key).await?;
        Ok(value.and_then(|v| match parse_timestamp(&v) {
            Some(ts) => Some(ts),
            None => {
                warn!(key = %key, value = %v, "Ignoring malformed dedup marker");
                None
            }
        }))
    }
}

/// Accepts integers, floats and numeric strings.
fn parse_timestamp(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}
