//! Logging setup.
//!
//! Installs a `tracing-subscriber` registry with an `EnvFilter` and a `fmt`
//! layer, plus a non-blocking daily rolling file layer when a log directory
//! is configured.

use crate::config::LoggingSettings;
use crate::error::{Error, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Environment variable overriding the configured filter
pub const FILTER_ENV: &str = "RUST_LOG";

/// Filter directives in effect: `RUST_LOG` when set and non-empty, the
/// configured filter otherwise.
pub fn resolve_filter(settings: &LoggingSettings) -> String {
    match std::env::var(FILTER_ENV) {
        Ok(value) if !value.trim().is_empty() => value,
        _ => settings.filter.clone(),
    }
}

/// Install the global subscriber.
///
/// The returned guard flushes the log file when dropped; keep it alive for
/// the lifetime of the program. It is `None` without file logging.
pub fn init(settings: &LoggingSettings) -> Result<Option<WorkerGuard>> {
    let directives = resolve_filter(settings);
    let filter = EnvFilter::try_new(&directives)
        .map_err(|e| Error::Logging(format!("Invalid log filter {:?}: {}", directives, e)))?;

    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_ansi(settings.ansi)
        .boxed();

    let (file_layer, guard) = match &settings.directory {
        Some(directory) => {
            std::fs::create_dir_all(directory).map_err(|e| {
                Error::Logging(format!(
                    "Failed to create log directory {:?}: {}",
                    directory, e
                ))
            })?;
            let appender = tracing_appender::rolling::daily(directory, &settings.file_prefix);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| Error::Logging(format!("Failed to install subscriber: {}", e)))?;

    tracing::info!("Logging initialized with filter {:?}", directives);
    Ok(guard)
}
