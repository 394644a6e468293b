//! Panic reporting.
//!
//! Panics go through `tracing` like any other event. Release builds abort on
//! panic, and the non-blocking file writer may still hold the event when the
//! process dies, so in that case the record is also appended to today's log
//! file directly.

use std::backtrace::Backtrace;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::panic::{self, AssertUnwindSafe, PanicHookInfo};
use std::path::{Path, PathBuf};

use chrono::Local;

use super::{TIMESTAMP_FORMAT, daily_log_file};

/// What gets written for one panic.
struct PanicRecord {
    timestamp: String,
    thread: String,
    location: String,
    message: String,
    backtrace: Backtrace,
}

impl PanicRecord {
    fn capture(info: &PanicHookInfo<'_>) -> Self {
        let payload = info.payload();
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| info.to_string());

        Self {
            timestamp: Local::now().format(TIMESTAMP_FORMAT).to_string(),
            thread: std::thread::current()
                .name()
                .unwrap_or("<unnamed>")
                .to_string(),
            location: info
                .location()
                .map_or_else(|| "<unknown>".to_string(), ToString::to_string),
            message,
            backtrace: Backtrace::force_capture(),
        }
    }

    fn append_to(&self, log_dir: &Path) -> std::io::Result<()> {
        let path = daily_log_file(log_dir, Local::now().date_naive());
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{self}")?;
        file.flush()
    }
}

impl fmt::Display for PanicRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} PANIC thread={} location={} payload={}\nBacktrace:\n{}",
            self.timestamp, self.thread, self.location, self.message, self.backtrace
        )
    }
}

pub(super) fn install(log_dir: PathBuf) {
    let previous = panic::take_hook();

    panic::set_hook(Box::new(move |info: &PanicHookInfo<'_>| {
        let _ = panic::catch_unwind(AssertUnwindSafe(|| {
            let record = PanicRecord::capture(info);
            tracing::error!(
                target: "live_notify::panic",
                thread = %record.thread,
                location = %record.location,
                "Panic: {}\n{}",
                record.message,
                record.backtrace
            );

            if cfg!(panic = "abort") {
                let _ = record.append_to(&log_dir);
            }
        }));

        previous(info);
    }));
}
