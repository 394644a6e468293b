//! Per-tick outcome reported to the scheduler and the HTTP trigger.

use serde::Serialize;

use super::state::MonitorState;

/// Kind of failure swallowed during a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The identity is not broadcasting right now.
    ExpectedAbsence,
    /// Network, timeout or protocol error from the transport.
    TransientTransport,
    /// The notification could not be delivered.
    Delivery,
}

/// Summary of one tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TickReport {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_at: Option<i64>,
    pub viewer_count: u64,
    pub broadcast_started_at: Option<i64>,
    pub notified: bool,
    pub failure: Option<FailureKind>,
}

impl TickReport {
    pub fn new(state: &MonitorState, notified: bool, failure: Option<FailureKind>) -> Self {
        Self {
            status: state.status.as_str(),
            retry_at: state.status.retry_at(),
            viewer_count: state.viewer_count,
            broadcast_started_at: state.broadcast_started_at,
            notified,
            failure,
        }
    }
}
