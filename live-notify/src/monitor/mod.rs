//! Live-status detection and notification dedup.

pub mod clock;
pub mod engine;
pub mod policy;
pub mod report;
pub mod state;

pub use clock::{Clock, SystemClock};
pub use engine::{EngineConfig, StatusEngine, classify_failure};
pub use policy::{NotifyDecision, NotifyPolicy};
pub use report::{FailureKind, TickReport};
pub use state::{MonitorState, MonitorStatus};
