//! Logging setup for the rtlog binary.
//!
//! Two sinks:
//! - stderr: warnings by default, `RUST_LOG` overrides, `--verbose` raises to info
//! - `<root>/rtlog-debug.log`: appended through a non-blocking writer so the
//!   precmd hook never waits on disk
//!
//! `RTLOG_DEBUG_LOG=1` switches both sinks to debug.

use std::env;
use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

const DEBUG_ENV: &str = "RTLOG_DEBUG_LOG";

/// Installs the global subscriber. Hold the returned guard until exit so
/// buffered file output is flushed.
pub fn init(log_file: Option<&Path>, verbose: bool) -> Option<WorkerGuard> {
    let debug_enabled = debug_enabled();

    let stderr_filter = if debug_enabled {
        EnvFilter::new("debug")
    } else if verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .with_filter(stderr_filter);

    let (file_layer, guard) = match log_file.and_then(open_log_file) {
        Some(file) => {
            let (writer, guard) = tracing_appender::non_blocking(file);
            let level = if debug_enabled { "debug" } else { "info" };
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_filter(EnvFilter::new(level));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let _ = tracing_subscriber::registry()
        .with(stderr_layer)
        .with(file_layer)
        .try_init();

    guard
}

fn debug_enabled() -> bool {
    env::var(DEBUG_ENV)
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false)
}

fn open_log_file(path: &Path) -> Option<std::fs::File> {
    if let Some(parent) = path.parent() {
        rtlog_core::artifacts::create_private_dir_all(parent).ok()?;
    }
    let file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .ok()?;
    rtlog_core::artifacts::harden(path, rtlog_core::artifacts::FILE_MODE).ok()?;
    Some(file)
}
