//! Logging setup: stdout plus a size-rotated log file
//!
//! The file lives at `<config dir>/netspeed-overlay/netspeed-overlay.log` and
//! rotates at 1 MB, keeping one old file. `DEBUG_LOGGING=1` turns on debug
//! output for this crate; `RUST_LOG` overrides the filter entirely.

use std::path::PathBuf;

use rolling_file::{BasicRollingFileAppender, RollingConditionBasic};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

const LOG_DIR_NAME: &str = "netspeed-overlay";
const LOG_FILE_NAME: &str = "netspeed-overlay.log";
const MAX_LOG_BYTES: u64 = 1024 * 1024;

/// Install the global subscriber.
///
/// Hold the returned guard until exit so buffered file output is flushed.
/// `None` means the log file could not be opened and only stdout is active.
pub fn init() -> Option<WorkerGuard> {
    let debug_logging = std::env::var("DEBUG_LOGGING").is_ok();

    let log_path = match open_log_path() {
        Ok(path) => path,
        Err(reason) => {
            // No subscriber yet
            eprintln!("{reason}, logging to stdout only");
            init_stdout_only(debug_logging);
            return None;
        }
    };

    let appender = match BasicRollingFileAppender::new(
        &log_path,
        RollingConditionBasic::new().max_size(MAX_LOG_BYTES),
        1,
    ) {
        Ok(appender) => appender,
        Err(e) => {
            eprintln!("Failed to open log file {}: {e}", log_path.display());
            init_stdout_only(debug_logging);
            return None;
        }
    };
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_span_events(FmtSpan::NONE);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stdout_layer())
        .with(filter(debug_logging))
        .init();

    tracing::info!(log_file = %log_path.display(), debug_logging, "Logging initialized");
    Some(guard)
}

fn open_log_path() -> Result<PathBuf, String> {
    let dir = dirs::config_dir()
        .ok_or_else(|| "No config directory on this system".to_string())?
        .join(LOG_DIR_NAME);
    std::fs::create_dir_all(&dir)
        .map_err(|e| format!("Failed to create log directory {}: {e}", dir.display()))?;
    Ok(dir.join(LOG_FILE_NAME))
}

fn init_stdout_only(debug_logging: bool) {
    tracing_subscriber::registry()
        .with(stdout_layer())
        .with(filter(debug_logging))
        .init();

    tracing::info!(debug_logging, "Logging initialized (stdout only)");
}

fn stdout_layer<S>() -> impl tracing_subscriber::Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    fmt::layer()
        .with_writer(std::io::stdout)
        .with_span_events(FmtSpan::NONE)
}

fn filter(debug_logging: bool) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directive(debug_logging)))
}

fn directive(debug_logging: bool) -> &'static str {
    if debug_logging {
        "info,netspeed_overlay=debug"
    } else {
        "info"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_flag_targets_this_crate() {
        assert_eq!(directive(false), "info");
        assert_eq!(directive(true), "info,netspeed_overlay=debug");
        assert!(EnvFilter::try_new(directive(true)).is_ok());
    }
}
