// Copyright 2025 boardkit contributors
// SPDX-License-Identifier: Apache-2.0

//! # boardkit-board
//!
//! Board capability model: which pins a board exposes, which modes each pin
//! supports, and how ADC/DAC channels are numbered. Pure data and lookup, no
//! native access.
//!
//! Tables come from three places:
//! - built-in tables ([`builtin::by_name`])
//! - TOML files ([`BoardInfo::from_toml_file`])
//! - code, via [`BoardInfo::add_pin`]
//!
//! GPIO lookups are lenient: a pin missing from the table is synthesised as a
//! digital input/output pin so provisioning on unknown boards still works.

pub mod board;
pub mod builtin;
pub mod mode;
pub mod pin;
pub mod table;

pub use board::BoardInfo;
pub use mode::{DeviceMode, PullUpDown};
pub use pin::{PinCapability, PinKind};
pub use table::{BoardTable, PinEntry};

/// Board table errors
#[derive(Debug, thiserror::Error)]
pub enum BoardError {
    #[error("Unknown built-in board: {0}")]
    UnknownBoard(String),

    #[error("Failed to read board table: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid board table TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid board table: {0}")]
    InvalidTable(String),
}

pub type Result<T> = std::result::Result<T, BoardError>;
