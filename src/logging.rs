//! Logging initialization.
//!
//! Server mode logs to stderr unless `logging.to_file` is set, in which case
//! output goes to `{logging.dir}/multistep-forms-{datetime}.log`.

use anyhow::Result;
use std::path::{Path, PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;

/// Result of logging initialization
pub struct LoggingHandle {
    /// Flushes buffered file output when dropped; keep alive for the process
    pub _guard: Option<WorkerGuard>,

    /// Set only when logging to a file
    pub log_file_path: Option<PathBuf>,
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins over the configured level; `debug_override` (the `--debug`
/// flag) wins over both.
pub fn init_logging(config: &Config, debug_override: bool) -> Result<LoggingHandle> {
    let filter = if debug_override {
        tracing_subscriber::EnvFilter::new("debug")
    } else {
        tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| config.logging.level.clone()),
        )
    };

    if config.logging.to_file {
        let logs_dir = config.logs_path();
        std::fs::create_dir_all(&logs_dir)?;

        let log_file_path = log_file_path(&logs_dir, chrono::Utc::now());
        let log_filename = log_file_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let file_appender = tracing_appender::rolling::never(&logs_dir, &log_filename);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_ansi(false)
                    .with_writer(non_blocking),
            )
            .init();

        Ok(LoggingHandle {
            _guard: Some(guard),
            log_file_path: Some(log_file_path),
        })
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();

        Ok(LoggingHandle {
            _guard: None,
            log_file_path: None,
        })
    }
}

fn log_file_path(logs_dir: &Path, now: chrono::DateTime<chrono::Utc>) -> PathBuf {
    logs_dir.join(format!("multistep-forms-{}.log", now.format("%Y%m%dT%H%M%SZ")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    #[test]
    fn test_log_file_name_format() {
        let temp_dir = TempDir::new().unwrap();
        let now = chrono::Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 0).unwrap();

        let path = log_file_path(temp_dir.path(), now);
        assert!(path.starts_with(temp_dir.path()));
        assert!(path.ends_with("multistep-forms-20240309T140500Z.log"));
    }

    #[test]
    fn test_logs_path_follows_config() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = Config::default();
        config.logging.dir = temp_dir.path().join("logs").to_string_lossy().to_string();

        assert_eq!(config.logs_path(), temp_dir.path().join("logs"));
    }
}
