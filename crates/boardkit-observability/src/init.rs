// Copyright 2025 boardkit contributors
// SPDX-License-Identifier: Apache-2.0

//! Logging initialisation
//!
//! Console output always; with the `file-logging` feature and
//! `LoggingConfig::file_logging` set, also a daily-rotated file:
//! ```text
//! ./logs/
//!   └── run_20250101_120000/
//!       └── boardkit.log.2025-01-01
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{Local, NaiveDateTime};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

use crate::cli::CrateDebugFlags;
use crate::config::LoggingConfig;

const RUN_PREFIX: &str = "run_";
const RUN_TIMESTAMP: &str = "%Y%m%d_%H%M%S";

/// Keeps file writers alive; logs are flushed when it is dropped
pub struct LoggingGuard {
    #[cfg(feature = "file-logging")]
    _file_guards: Vec<tracing_appender::non_blocking::WorkerGuard>,
    log_dir: Option<PathBuf>,
}

impl LoggingGuard {
    /// Run folder, if file logging is active
    pub fn log_dir(&self) -> Option<&Path> {
        self.log_dir.as_deref()
    }
}

type BoxedLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Install the global subscriber
///
/// # Errors
///
/// Fails if the log directory cannot be created or a global subscriber is
/// already installed.
pub fn init_logging(debug_flags: &CrateDebugFlags, config: &LoggingConfig) -> Result<LoggingGuard> {
    let filter = debug_flags.to_filter_string_with(&config.level);
    let env_filter = EnvFilter::try_new(&filter).with_context(|| format!("Invalid log filter: {}", filter))?;

    let mut layers: Vec<BoxedLayer> = Vec::new();
    let console_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_file(false)
        .with_line_number(false)
        .with_filter(env_filter)
        .boxed();
    layers.push(console_layer);

    #[cfg(feature = "file-logging")]
    let (file_guards, log_dir) = if config.file_logging {
        let run_folder = create_run_folder(&config.directory)?;
        prune_runs(&config.directory, config.retention_days, config.retention_runs)?;

        let appender = tracing_appender::rolling::daily(&run_folder, "boardkit.log");
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
            .with_filter(EnvFilter::try_new(&filter)?)
            .boxed();
        layers.push(file_layer);
        (vec![guard], Some(run_folder))
    } else {
        (Vec::new(), None)
    };

    #[cfg(not(feature = "file-logging"))]
    let log_dir = None;

    Registry::default()
        .with(layers)
        .try_init()
        .context("A global tracing subscriber is already installed")?;

    #[cfg(not(feature = "file-logging"))]
    if config.file_logging {
        tracing::warn!("File logging requested but boardkit was built without the file-logging feature");
    }

    Ok(LoggingGuard {
        #[cfg(feature = "file-logging")]
        _file_guards: file_guards,
        log_dir,
    })
}

/// Console logging at `info` plus the given debug flags
pub fn init_logging_default(debug_flags: &CrateDebugFlags) -> Result<LoggingGuard> {
    init_logging(debug_flags, &LoggingConfig::default())
}

/// Create `run_<timestamp>` under `base`
pub fn create_run_folder(base: &Path) -> Result<PathBuf> {
    let run_folder = base.join(format!("{}{}", RUN_PREFIX, Local::now().format(RUN_TIMESTAMP)));
    std::fs::create_dir_all(&run_folder)
        .with_context(|| format!("Failed to create log directory: {}", run_folder.display()))?;
    Ok(run_folder)
}

fn run_timestamp(path: &Path) -> Option<NaiveDateTime> {
    let name = path.file_name()?.to_str()?;
    let stamp = name.strip_prefix(RUN_PREFIX)?;
    NaiveDateTime::parse_from_str(stamp, RUN_TIMESTAMP).ok()
}

/// Remove run folders older than `retention_days`, then all but the newest
/// `retention_runs`. Returns how many were removed.
pub fn prune_runs(base: &Path, retention_days: u64, retention_runs: usize) -> Result<usize> {
    if !base.exists() {
        return Ok(0);
    }

    let mut runs: Vec<(PathBuf, NaiveDateTime)> = Vec::new();
    for entry in std::fs::read_dir(base)? {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }
        if let Some(stamp) = run_timestamp(&path) {
            runs.push((path, stamp));
        }
    }
    // Newest first
    runs.sort_by(|a, b| b.1.cmp(&a.1));

    let cutoff = Local::now().naive_local() - chrono::Duration::days(retention_days as i64);
    let mut removed = 0;
    for (index, (path, stamp)) in runs.iter().enumerate() {
        if index < retention_runs && *stamp >= cutoff {
            continue;
        }
        match std::fs::remove_dir_all(path) {
            Ok(()) => removed += 1,
            Err(e) => eprintln!("Warning: Failed to remove old log directory {}: {}", path.display(), e),
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_run(base: &Path, stamp: NaiveDateTime) -> PathBuf {
        let path = base.join(format!("{}{}", RUN_PREFIX, stamp.format(RUN_TIMESTAMP)));
        std::fs::create_dir_all(&path).unwrap();
        path
    }

    #[test]
    fn test_create_run_folder() {
        let dir = tempfile::tempdir().unwrap();
        let run = create_run_folder(&dir.path().join("logs")).unwrap();
        assert!(run.is_dir());
        assert!(run_timestamp(&run).is_some());
    }

    #[test]
    fn test_prune_keeps_newest_runs() {
        let dir = tempfile::tempdir().unwrap();
        let now = Local::now().naive_local();
        let runs: Vec<PathBuf> = (0..4)
            .map(|hours| make_run(dir.path(), now - chrono::Duration::hours(hours)))
            .collect();
        std::fs::create_dir_all(dir.path().join("not-a-run")).unwrap();

        assert_eq!(prune_runs(dir.path(), 30, 2).unwrap(), 2);
        assert!(runs[0].exists());
        assert!(runs[1].exists());
        assert!(!runs[2].exists());
        assert!(!runs[3].exists());
        assert!(dir.path().join("not-a-run").exists());
    }

    #[test]
    fn test_prune_drops_expired_runs() {
        let dir = tempfile::tempdir().unwrap();
        let now = Local::now().naive_local();
        let fresh = make_run(dir.path(), now - chrono::Duration::days(1));
        let stale = make_run(dir.path(), now - chrono::Duration::days(40));

        assert_eq!(prune_runs(dir.path(), 30, 10).unwrap(), 1);
        assert!(fresh.exists());
        assert!(!stale.exists());
    }

    #[test]
    fn test_prune_missing_base() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(prune_runs(&dir.path().join("absent"), 30, 10).unwrap(), 0);
    }
}
