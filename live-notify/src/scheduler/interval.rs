//! Timer-driven trigger.

use std::time::Duration;

use rand::random;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::{SharedEngine, tick_once};
use crate::Result;

/// Delay between timer-driven ticks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollInterval {
    Fixed(Duration),
    /// Drawn uniformly from `[min, max]` after every tick.
    Jittered { min: Duration, max: Duration },
}

impl PollInterval {
    pub fn next_delay(&self) -> Duration {
        match *self {
            PollInterval::Fixed(delay) => delay,
            PollInterval::Jittered { min, max } => {
                let min_ms = min.as_millis() as u64;
                let max_ms = max.as_millis() as u64;
                if max_ms <= min_ms {
                    return min;
                }
                let span = max_ms - min_ms + 1;
                Duration::from_millis(min_ms + random::<u64>() % span)
            }
        }
    }
}

impl Default for PollInterval {
    fn default() -> Self {
        PollInterval::Fixed(Duration::from_secs(10))
    }
}

/// Ticks the engine immediately, then after every delay.
pub struct IntervalScheduler {
    engine: SharedEngine,
    interval: PollInterval,
}

impl IntervalScheduler {
    /// Create a new interval scheduler.
    pub fn new(engine: SharedEngine, interval: PollInterval) -> Self {
        Self { engine, interval }
    }

    /// Run until cancelled, the engine ends, or a tick fails unclassified.
    ///
    /// The unclassified failure is returned so the process can exit and be
    /// restarted by its supervisor.
    pub async fn run(&self, cancel: CancellationToken) -> Result<()> {
        info!(interval = ?self.interval, "Interval scheduler started");

        while !cancel.is_cancelled() {
            match tick_once(&self.engine).await {
                Ok(report) => {
                    debug!(
                        status = report.status,
                        viewers = report.viewer_count,
                        notified = report.notified,
                        failure = ?report.failure,
                        "Tick completed"
                    );
                    if self.engine.lock().await.state().is_ended() {
                        info!("Monitoring ended, stopping interval scheduler");
                        return Ok(());
                    }
                }
                Err(e) => {
                    error!(error = %e, "Tick failed, stopping interval scheduler");
                    return Err(e);
                }
            }

            let delay = self.interval.next_delay();
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        info!("Interval scheduler stopped");
        Ok(())
    }
}
