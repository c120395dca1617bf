// Copyright 2025 boardkit contributors
// SPDX-License-Identifier: Apache-2.0

//! Logging configuration types

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level for crates without a debug flag (trace, debug, info, warn, error)
    pub level: String,

    /// Base directory; each run writes to `run_<timestamp>/` under it
    pub directory: PathBuf,

    /// Write a rotated log file in addition to the console (needs `file-logging`)
    pub file_logging: bool,

    /// Delete run folders older than this many days
    pub retention_days: u64,

    /// Keep at most this many run folders
    pub retention_runs: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: "info".to_string(),
            directory: PathBuf::from("./logs"),
            file_logging: false,
            retention_days: 30,
            retention_runs: 10,
        }
    }
}

#[cfg(feature = "config")]
impl From<&boardkit_config::BoardkitConfig> for LoggingConfig {
    /// `[system] log_level` plus the `[logging]` section of `boardkit.toml`
    fn from(config: &boardkit_config::BoardkitConfig) -> Self {
        LoggingConfig {
            level: config.system.log_level.clone(),
            directory: config.logging.directory.clone(),
            file_logging: config.logging.file_logging,
            retention_days: config.logging.retention_days,
            retention_runs: config.logging.retention_runs,
        }
    }
}
