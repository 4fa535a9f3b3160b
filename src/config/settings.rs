//! Engine settings.
//!
//! # Main Types
//!
//! - [`GraphSettings`] - Batch size, message pool size and run back-off
//! - [`LoggingSettings`] - Log filter and optional rolling log file

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub use crate::pipeline::message::batch::DEFAULT_BATCH_CAPACITY;
pub use crate::pipeline::pool::DEFAULT_POOL_MAX_SIZE;

/// Default sleep between background runs answering "again", in milliseconds
pub const DEFAULT_AGAIN_BACKOFF_MS: u64 = 10;

/// Settings applied to every graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphSettings {
    /// Upper bound of every message batch
    pub batch_capacity: usize,

    /// Free message objects kept per message kind
    pub pool_max_size: usize,

    /// Sleep used by the background runner when no sink is ready
    pub again_backoff_ms: u64,
}

impl Default for GraphSettings {
    fn default() -> Self {
        Self {
            batch_capacity: DEFAULT_BATCH_CAPACITY,
            pool_max_size: DEFAULT_POOL_MAX_SIZE,
            again_backoff_ms: DEFAULT_AGAIN_BACKOFF_MS,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `EnvFilter` directives, overridden by `RUST_LOG` when set
    pub filter: String,

    /// Colored terminal output
    pub ansi: bool,

    /// Directory for daily rolling log files; no file logging when unset
    pub directory: Option<PathBuf>,

    /// File name prefix of the rolling log files
    pub file_prefix: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            ansi: true,
            directory: None,
            file_prefix: "tracegraph.log".to_string(),
        }
    }
}
