// Copyright 2025 boardkit contributors
// SPDX-License-Identifier: Apache-2.0

//! # boardkit-observability
//!
//! Logging initialisation shared by boardkit applications, with per-crate
//! debug flags (`--debug-boardkit-native`, `BOARDKIT_DEBUG=all`).
//!
//! ## Features
//! - `file-logging`: daily-rotated log files under a timestamped run folder

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod cli;
pub mod config;
pub mod init;

pub use cli::*;
pub use config::*;
pub use init::*;

/// Workspace crates that accept a `--debug-<crate>` flag
pub const KNOWN_CRATES: &[&str] = &[
    "boardkit",
    "boardkit-board",
    "boardkit-native",
    "boardkit-device",
    "boardkit-config",
];
