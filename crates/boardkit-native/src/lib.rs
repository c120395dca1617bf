// Copyright 2025 boardkit contributors
// SPDX-License-Identifier: Apache-2.0

//! # boardkit-native
//!
//! The only code in boardkit that touches raw registers or bus file descriptors.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │   RegisterIo (trait)                │  ← getMode/setMode/read/write/pull
//! │   └─ BroadcomGpio<S: RegisterSource>│  ← per-handle lock, banked tables
//! │        ├─ DevMemSource (memmap2)    │  ← /dev/gpiomem
//! │        └─ SimulatedSoc              │  ← hardware model for tests/dry runs
//! └─────────────────────────────────────┘
//! ┌─────────────────────────────────────┐
//! │   BusIo (trait) → BusTransport      │  ← one kernel call per attempt
//! │   └─ BusHandle                      │  ← per-handle lock + RetryPolicy
//! │        ├─ LinuxBus (i2c-dev/spidev) │
//! │        └─ SimulatedBus              │
//! └─────────────────────────────────────┘
//! ```

pub mod bus;
pub mod register;
pub mod sim;

pub use boardkit_board::{DeviceMode, PullUpDown};

pub use bus::retry::{RetryOutcome, RetryPolicy, DEFAULT_RETRY_BUDGET};
pub use bus::status::{TransferStatus, TransientKind};
pub use bus::{
    BusAddress, BusConfig, BusHandle, BusIo, BusTransport, I2cConfig, SpiConfig, SpiMode,
    Transfer, TransferReport,
};
pub use register::broadcom::BroadcomGpio;
pub use register::layout::{BcmLayout, PullCodes, PullScheme, BCM2711, BCM2835};
pub use register::mmap::{DevMemSource, MmapRegisterFile};
pub use register::{RegisterIo, RegisterSource, RegisterWords};

#[cfg(target_os = "linux")]
pub use bus::linux::LinuxBus;

/// Native backend errors
#[derive(Debug, thiserror::Error)]
pub enum NativeError {
    /// Register file could not be mapped (permissions, missing device, too small)
    #[error("Failed to map register file {path}: {source}")]
    Mapping {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("GPIO {gpio} out of range (backend has {count} GPIOs)")]
    PinOutOfRange { gpio: u32, count: u32 },

    #[error("Mode {mode} not supported by {backend} (GPIO {gpio})")]
    UnsupportedMode {
        gpio: u32,
        mode: DeviceMode,
        backend: String,
    },

    #[error("Register backend {0} not initialised")]
    NotInitialised(String),

    #[error("Failed to open bus device {path}: {source}")]
    BusOpen {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Retry budget exhausted on would-block/timeout/remote-I/O
    #[error("Transient bus error on {address}: {kind} (gave up after {attempts} attempts)")]
    TransientBus {
        address: String,
        kind: TransientKind,
        attempts: u32,
    },

    #[error("Fatal bus error on {address}: errno {errno} after {attempts} attempt(s)")]
    FatalBus {
        address: String,
        errno: i32,
        attempts: u32,
    },

    /// Double close of a bus descriptor; reportable, never fatal
    #[error("Bus handle {0} already closed")]
    AlreadyClosed(String),

    #[error("Failed to close bus handle {address}: errno {errno}")]
    BusClose { address: String, errno: i32 },

    #[error("Invalid native configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, NativeError>;
