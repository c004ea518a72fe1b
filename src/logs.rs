//! Log file setup.
//!
//! The agent never writes to stdout during normal operation; everything
//! goes to `~/.codetick.log` (or `--log-file`). Debug-level output is
//! enabled with `--verbose` or the `debug` config setting. Failure to open
//! the log file degrades to logging on stderr rather than aborting - the
//! host editor must never notice.

use std::fs::OpenOptions;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::config::Settings;

/// Install the global tracing subscriber for this invocation.
pub fn setup(settings: &Settings) {
    let level = if settings.verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("codetick={}", level)));

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&settings.log_file);

    let result = match file {
        Ok(file) => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(Arc::new(file))
            .with_ansi(false)
            .try_init(),
        Err(_) => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .try_init(),
    };

    // A second init in the same process (tests) is fine to ignore.
    let _ = result;
}
