//! Configuration module for tracegraph-rs
//!
//! This module handles engine configuration:
//! - Graph settings (batch capacity, message pool size, run back-off)
//! - Logging settings (filter, ANSI output, rolling log file)
//!
//! Configuration is stored as TOML. Every field has a default, so a partial
//! or empty file is valid.
//!
//! # Example
//!
//! ```ignore
//! use tracegraph_rs::config::EngineConfig;
//!
//! let config = EngineConfig::load_or_default("tracegraph.toml");
//! let _guard = tracegraph_rs::logging::init(&config.logging)?;
//! let graph = tracegraph_rs::pipeline::Graph::with_settings(config.graph);
//! ```

pub mod settings;

pub use settings::*;

use crate::error::{Error, Result, ResultExt};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default configuration filename
pub const CONFIG_FILE: &str = "tracegraph.toml";

/// Complete engine configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Settings applied to every graph
    pub graph: GraphSettings,

    /// Logging configuration
    pub logging: LoggingSettings,
}

impl EngineConfig {
    /// Parse a configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config file {:?}: {}", path, e)))?;
        Self::from_toml_str(&content).with_context(|| format!("Invalid config file {:?}", path))
    }

    /// Load a configuration file, falling back to defaults
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            return Self::default();
        }
        Self::load(path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config, using defaults: {}", e);
            Self::default()
        })
    }

    /// Save the configuration as TOML
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    Error::Config(format!("Failed to create config directory: {}", e))
                })?;
            }
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)
            .map_err(Error::from)
            .with_context(|| format!("Failed to write config file {:?}", path))?;
        tracing::info!("Saved config to {:?}", path);
        Ok(())
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.graph.batch_capacity == 0 {
            return Err(Error::Config(
                "graph.batch_capacity must be greater than zero".to_string(),
            ));
        }
        if self.logging.file_prefix.is_empty() {
            return Err(Error::Config(
                "logging.file_prefix must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
