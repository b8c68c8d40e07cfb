// src/config.rs

//! Configuration for the watch engine.
//!
//! The embedding runner usually builds a [`WatchConfig`] in code, but the
//! same struct can be deserialized from a TOML fragment so a runner's config
//! file can carry a `[watch]` table verbatim.

use std::fs;
use std::path::Path;

use regex::Regex;
use serde::Deserialize;

use crate::errors::{Result, SuitewatchError};

/// Tunables for change detection.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WatchConfig {
    /// How many levels of local imports suite collaborators may follow when
    /// resolving dependencies. `0` means "the suite's own directory only".
    pub max_depth: u32,

    /// Regular expression a file name must match to count as watched code.
    pub watch_pattern: String,

    /// Use per-directory native file-system notifications in addition to
    /// on-demand polling.
    pub native_notifications: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            max_depth: 1,
            watch_pattern: r"\.go$".to_string(),
            native_notifications: false,
        }
    }
}

impl WatchConfig {
    /// Deserialize a config from a TOML string and validate it.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: WatchConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a config from a TOML file on disk.
    pub fn from_toml_path(path: impl AsRef<Path>) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&contents)
    }

    /// Check the config for values that cannot work at runtime.
    pub fn validate(&self) -> Result<()> {
        self.compile_watch_pattern()?;
        Ok(())
    }

    /// Compile `watch_pattern`, mapping a bad pattern to a config error that
    /// names the offending string.
    pub fn compile_watch_pattern(&self) -> Result<Regex> {
        Regex::new(&self.watch_pattern).map_err(|err| {
            SuitewatchError::ConfigError(format!(
                "invalid watch_pattern '{}': {}",
                self.watch_pattern, err
            ))
        })
    }
}
