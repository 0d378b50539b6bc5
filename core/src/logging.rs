// Tracing subscriber setup for hosts that embed the bridge.
//
// `RUST_LOG` wins over the configured filter. With a log directory configured a
// daily rolling file is written through a non-blocking appender; keep the
// returned guard alive or buffered lines are lost.

use crate::config::BridgeConfig;
use crate::error::BridgeError;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter, Layer};

pub const LOG_FILE_PREFIX: &str = "gattbridge.log";

/// Keeps the file appender flushing
pub struct LoggingGuard {
    guard: Option<WorkerGuard>,
}

impl LoggingGuard {
    pub fn has_file_output(&self) -> bool {
        self.guard.is_some()
    }
}

/// Resolve the effective filter directive
pub fn env_filter(config: &BridgeConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Install the global subscriber. Fails if one is already installed.
pub fn init_logging(config: &BridgeConfig) -> Result<LoggingGuard, BridgeError> {
    let console = if config.log_json {
        fmt::layer().json().with_writer(std::io::stderr).boxed()
    } else {
        fmt::layer().with_writer(std::io::stderr).boxed()
    };

    let (file, guard) = match &config.log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().with_writer(writer).with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(env_filter(config))
        .with(console)
        .with(file)
        .try_init()
        .map_err(|e| BridgeError::Config(format!("Logging already initialized: {}", e)))?;

    tracing::info!(
        "Logging initialized (filter: {}, file: {})",
        config.log_filter,
        config.log_dir.is_some()
    );

    Ok(LoggingGuard { guard })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_filter_falls_back_on_bad_directive() {
        let config = BridgeConfig {
            log_filter: "[[[".to_string(),
            ..BridgeConfig::default()
        };
        // Must not panic on an unparsable directive
        let _ = env_filter(&config);
    }

    #[test]
    fn test_second_init_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = BridgeConfig {
            log_dir: Some(dir.path().join("logs")),
            ..BridgeConfig::default()
        };

        // Another test may have installed a subscriber first; either way the
        // second attempt in this test must fail.
        let first = init_logging(&config);
        if let Ok(guard) = &first {
            assert!(guard.has_file_output());
        }
        assert!(init_logging(&config).is_err());
    }
}
