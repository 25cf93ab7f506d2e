//! Structured logging setup using `tracing-subscriber` and `tracing-appender`.
//!
//! [`init`] applies the `[logging]` section and is called by
//! [`Container::start`](crate::fixture::Container::start), so a fixture
//! logs at the configured level without further setup:
//! - with `dir` set: JSON file layer (daily rotation) + captured console layer
//! - without: captured console layer only
//!
//! Console output goes through the test harness capture and only shows for
//! failing tests. Whichever call installs a subscriber first wins; later
//! calls keep it.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;

/// Holds the non-blocking writer guard for file logging.
///
/// Dropping it flushes pending log entries and closes the file.
#[derive(Debug)]
pub struct LoggingGuard {
    _guard: WorkerGuard,
}

fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Install the subscriber described by `config`.
///
/// Returns the file writer guard when `config.dir` is set and the file layer
/// was installed. A failure to set up file logging is reported at `warn` and
/// never fails the caller.
pub fn init(config: &LoggingConfig) -> Option<LoggingGuard> {
    let Some(dir) = config.dir.as_deref() else {
        init_captured(&config.level);
        return None;
    };
    match init_file(dir, &config.level) {
        Ok(guard) => Some(guard),
        Err(e) => {
            tracing::warn!(error = %e, dir = %dir.display(), "file logging unavailable");
            None
        }
    }
}

/// Initialise logging with a rotating JSON log file.
///
/// Writes JSON logs to `{logs_dir}/webrig.log.YYYY-MM-DD` with daily
/// rotation, plus human-readable output through the test capture.
/// `RUST_LOG` takes precedence over `level`.
///
/// # Errors
///
/// Returns an error if the logs directory cannot be created or a global
/// subscriber is already installed.
pub fn init_file(logs_dir: &Path, level: &str) -> anyhow::Result<LoggingGuard> {
    std::fs::create_dir_all(logs_dir).map_err(|e| {
        anyhow::anyhow!(
            "failed to create logs directory {}: {e}",
            logs_dir.display()
        )
    })?;

    let file_appender = tracing_appender::rolling::daily(logs_dir, "webrig.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let json_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_writer(non_blocking);
    let console_layer = tracing_subscriber::fmt::layer().with_test_writer();

    tracing_subscriber::registry()
        .with(env_filter(level))
        .with(json_layer)
        .with(console_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install subscriber: {e}"))?;

    Ok(LoggingGuard { _guard: guard })
}

/// Initialise debug-level logging for test binaries.
///
/// Safe to call from every test; only the first call installs the
/// subscriber.
pub fn init_test() {
    init_captured("webrig=debug");
}

fn init_captured(level: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(level))
        .with_test_writer()
        .try_init();
}
