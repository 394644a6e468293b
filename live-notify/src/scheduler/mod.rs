//! Tick scheduling.
//!
//! Two triggers drive the status engine: [`IntervalScheduler`] on a fixed or
//! jittered timer, and the HTTP trigger in [`crate::api`]. Both go through
//! [`tick_once`], which holds the engine lock for the whole tick so ticks
//! never overlap.

mod interval;

pub use interval::{IntervalScheduler, PollInterval};

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::Result;
use crate::monitor::{StatusEngine, TickReport};

/// The engine shared between triggers.
pub type SharedEngine = Arc<Mutex<StatusEngine>>;

/// Wrap an engine for sharing between triggers.
pub fn share(engine: StatusEngine) -> SharedEngine {
    Arc::new(Mutex::new(engine))
}

/// Run exactly one tick, waiting for any tick already in progress.
pub async fn tick_once(engine: &SharedEngine) -> Result<TickReport> {
    let mut engine = engine.lock().await;
    engine.tick().await
}
