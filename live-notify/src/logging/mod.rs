//! Logging setup.
//!
//! This module provides:
//! - Console and daily-rolling file output with local timezone timestamps
//! - Filter resolution from `RUST_LOG` or the `LOG_LEVEL` shorthand
//! - Log file retention cleanup (deletes logs older than 7 days)
//! - Panic reporting into the same log files

mod panic;

use chrono::{Local, NaiveDate, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::Writer, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

/// Default log filter directive.
pub const DEFAULT_LOG_FILTER: &str = "live_notify=info,live_platform=info,sqlx=warn";

/// Prefix of the daily log files.
pub const LOG_FILE_PREFIX: &str = "live-notify.log";

/// Timestamp format shared by log lines and panic records.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f%:z";

/// Log retention period in days.
const LOG_RETENTION_DAYS: i64 = 7;

/// Custom timer that uses the local timezone via chrono.
#[derive(Debug, Clone, Copy)]
struct LocalTimer;

impl FormatTime for LocalTimer {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = Local::now();
        write!(w, "{}", now.format(TIMESTAMP_FORMAT))
    }
}

/// Active logging configuration.
#[derive(Debug)]
pub struct LoggingConfig {
    directive: String,
    log_dir: PathBuf,
}

impl LoggingConfig {
    /// Get the filter directive in effect.
    pub fn filter(&self) -> &str {
        &self.directive
    }

    /// Report panics through tracing and, in abort builds, straight into
    /// today's log file.
    pub fn install_panic_hook(&self) {
        panic::install(self.log_dir.clone());
    }

    /// Start the log retention cleanup task.
    ///
    /// Runs daily and deletes log files older than 7 days.
    pub fn start_retention_cleanup(self: &Arc<Self>, cancel_token: CancellationToken) {
        let log_dir = self.log_dir.clone();

        tokio::spawn(async move {
            let cleanup_interval = Duration::from_secs(24 * 60 * 60); // Daily

            loop {
                tokio::select! {
                    _ = cancel_token.cancelled() => {
                        debug!("Log retention cleanup task shutting down");
                        break;
                    }
                    _ = tokio::time::sleep(cleanup_interval) => {
                        if let Err(e) = cleanup_old_logs(&log_dir, LOG_RETENTION_DAYS).await {
                            warn!(error = %e, "Failed to cleanup old logs");
                        }
                    }
                }
            }
        });
    }
}

/// Resolve the filter directive.
///
/// `RUST_LOG` wins when set. Otherwise a bare level such as `debug` applies to
/// both crates of the application, and anything else is used verbatim.
pub fn filter_directive(rust_log: Option<&str>, log_level: Option<&str>) -> String {
    if let Some(directive) = rust_log.map(str::trim).filter(|s| !s.is_empty()) {
        return directive.to_string();
    }

    match log_level.map(|s| s.trim().to_ascii_lowercase()) {
        Some(level) if matches!(level.as_str(), "trace" | "debug" | "info" | "warn" | "error") => {
            format!("live_notify={level},live_platform={level},sqlx=warn")
        }
        Some(directive) if !directive.is_empty() => directive,
        _ => DEFAULT_LOG_FILTER.to_string(),
    }
}

/// Path of the file `tracing_appender::rolling::daily` writes on `date`.
fn daily_log_file(log_dir: &Path, date: NaiveDate) -> PathBuf {
    log_dir.join(format!("{LOG_FILE_PREFIX}.{}", date.format("%Y-%m-%d")))
}

/// Delete log files older than `retention_days` days.
pub async fn cleanup_old_logs(log_dir: &Path, retention_days: i64) -> std::io::Result<usize> {
    let cutoff = Utc::now() - chrono::Duration::days(retention_days);
    let cutoff_ts = cutoff.timestamp();
    let prefix = format!("{LOG_FILE_PREFIX}.");

    let mut entries = tokio::fs::read_dir(log_dir).await?;
    let mut deleted_count = 0;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();

        if !path.is_file() {
            continue;
        }

        // live-notify.log.YYYY-MM-DD
        let date_str = match path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|name| name.strip_prefix(prefix.as_str()))
        {
            Some(date) => date,
            None => continue,
        };

        if let Ok(file_date) = NaiveDate::parse_from_str(date_str, "%Y-%m-%d") {
            let file_ts = file_date
                .and_hms_opt(0, 0, 0)
                .map(|dt| dt.and_utc().timestamp())
                .unwrap_or(0);

            if file_ts < cutoff_ts {
                if let Err(e) = tokio::fs::remove_file(&path).await {
                    warn!(path = %path.display(), error = %e, "Failed to delete old log file");
                } else {
                    deleted_count += 1;
                    debug!(path = %path.display(), "Deleted old log file");
                }
            }
        }
    }

    if deleted_count > 0 {
        info!(count = deleted_count, "Cleaned up old log files");
    }

    Ok(deleted_count)
}

/// Initialize logging.
///
/// # Returns
/// Tuple of (LoggingConfig, WorkerGuard) - keep the guard alive for the app lifetime
pub fn init_logging(
    log_dir: &str,
    log_level: Option<&str>,
) -> crate::Result<(Arc<LoggingConfig>, WorkerGuard)> {
    let log_path = PathBuf::from(log_dir);
    std::fs::create_dir_all(&log_path)?;

    let file_appender = tracing_appender::rolling::daily(&log_path, LOG_FILE_PREFIX);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let rust_log = std::env::var("RUST_LOG").ok();
    let directive = filter_directive(rust_log.as_deref(), log_level);
    let filter = EnvFilter::try_new(&directive)
        .map_err(|e| crate::Error::config(format!("Invalid log filter '{}': {}", directive, e)))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_ansi(true).with_timer(LocalTimer)) // Console output with local time
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_timer(LocalTimer),
        ) // File output with local time
        .try_init()
        .map_err(|e| {
            crate::Error::Other(format!("Failed to set global default subscriber: {}", e))
        })?;

    let config = Arc::new(LoggingConfig {
        directive,
        log_dir: log_path,
    });

    Ok((config, guard))
}
