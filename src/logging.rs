//! Structured logging setup, mirroring the teacher's `tracing` +
//! `tracing-appender` stack but without the bevy `LogPlugin` wrapper the
//! teacher used to install it — this crate has no app framework to hook
//! into, so callers install the subscriber themselves at process startup.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, EnvFilter};

pub struct LogConfig {
    /// Directory the rolling log file is written into, e.g. "logs".
    pub log_dir: String,
    /// File name prefix, e.g. "server" or "client".
    pub file_prefix: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_dir: "logs".to_string(),
            file_prefix: "redoubt".to_string(),
        }
    }
}

/// Installs a global `tracing` subscriber writing filtered, formatted
/// output to a non-blocking rolling file appender. The returned
/// [`WorkerGuard`] must be kept alive for the lifetime of the process —
/// dropping it flushes and stops the background writer thread.
pub fn init(config: LogConfig) -> WorkerGuard {
    let file_appender = tracing_appender::rolling::daily(&config.log_dir, &config.file_prefix);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking)
        .with_target(true)
        .try_init()
        .ok();

    guard
}
