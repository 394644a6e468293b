//! Live/notify decision policy.
//!
//! `min_update_interval` throttles how often notifications go out and also
//! decides whether two broadcast start times belong to the same session.
//! Both checks must pass before a send is allowed.

use serde::{Deserialize, Serialize};

use crate::database::repositories::DedupRecord;

/// What the engine should do with a candidate broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotifyDecision {
    /// Persist both markers and send the notification.
    Notify,
    /// Persist `lastUpdate` only.
    RecordObservation,
    /// Leave the markers untouched.
    Ignore,
}

impl NotifyDecision {
    /// Whether the broadcast counts as newly live.
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Notify)
    }
}

/// Thresholds for announcing a broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifyPolicy {
    pub min_viewers: u64,
    /// Seconds.
    pub min_update_interval: i64,
}

impl NotifyPolicy {
    pub fn new(min_viewers: u64, min_update_interval: i64) -> Self {
        Self {
            min_viewers,
            min_update_interval,
        }
    }

    /// Decide for broadcast start `started_at` seen with `viewers` at `now`.
    ///
    /// A missing marker never counts as fresh or as the same broadcast.
    pub fn decide(
        &self,
        started_at: i64,
        viewers: u64,
        now: i64,
        record: &DedupRecord,
    ) -> NotifyDecision {
        if viewers < self.min_viewers {
            return NotifyDecision::Ignore;
        }

        let still_fresh = record
            .last_notified_at
            .is_some_and(|last| now.saturating_sub(last) < self.min_update_interval);
        let same_broadcast = record
            .last_notified_broadcast_start
            .is_some_and(|last| started_at.saturating_sub(last) < self.min_update_interval);

        if still_fresh || same_broadcast {
            NotifyDecision::RecordObservation
        } else {
            NotifyDecision::Notify
        }
    }
}
