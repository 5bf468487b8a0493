//! Tracing setup: one layer to the console, one to `habr_relay.log`.
//!
//! Both layers default to `info` and honour `RUST_LOG`. The file layer writes
//! through a non-blocking appender; keep the returned guard alive for the
//! lifetime of the process or buffered lines are lost on exit.

use std::io;
use std::path::Path;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, fmt};

pub const LOG_FILE_NAME: &str = "habr_relay.log";

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Non-blocking writer appending to [`LOG_FILE_NAME`] inside `log_dir`.
fn file_writer(log_dir: &Path) -> (NonBlocking, WorkerGuard) {
    tracing_appender::non_blocking(tracing_appender::rolling::never(log_dir, LOG_FILE_NAME))
}

/// Install the global subscriber. `log_dir` must already exist.
pub fn configure_logging(log_dir: &Path) -> WorkerGuard {
    let (file_writer, guard) = file_writer(log_dir);

    let stdout_log = fmt::layer()
        .with_writer(io::stdout)
        .with_target(true)
        .with_timer(UtcTime::rfc_3339())
        .with_filter(env_filter());

    let file_log = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(true)
        .with_timer(UtcTime::rfc_3339())
        .with_filter(env_filter());

    tracing_subscriber::registry()
        .with(stdout_log)
        .with(file_log)
        .init();

    guard
}
