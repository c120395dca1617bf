// Copyright 2025 boardkit contributors
// SPDX-License-Identifier: Apache-2.0

//! # boardkit-device
//!
//! Device ownership and lifecycle.
//!
//! - [`DeviceRegistry`]: keyed store of open devices, one OPEN device per key,
//!   shared parents reference-counted by their channels
//! - [`DeviceFactory`]: the facade drivers call; validates capabilities,
//!   provisions through the registry, owns orderly shutdown
//! - [`GpioPin`], [`BusDevice`], [`BusChannel`]: typed handles returned by the
//!   factory; they close themselves on drop
//!
//! Device keys are opaque strings (`gpio:17`, `i2c:1:0x20`, `spi:0.1`,
//! `i2c:1:0x20/ch3`); see [`key`].

pub mod bus;
pub mod factory;
pub mod gpio;
pub mod key;
pub mod registry;

#[cfg(feature = "config")]
mod config;

pub use boardkit_board::{BoardError, BoardInfo, DeviceMode, PullUpDown};
pub use boardkit_native::{NativeError, TransientKind};

pub use bus::{BusChannel, BusDevice};
pub use factory::{DeviceFactory, FactoryOptions, FactoryState, ShutdownReport};
pub use gpio::GpioPin;
pub use registry::{
    CloseFailure, CloseOutcome, Device, DeviceKind, DeviceRegistry, DeviceState, Diagnostic,
    NativeResource, MAX_DIAGNOSTICS,
};

/// Device layer errors
///
/// Native failures are routed into the same taxonomy callers branch on:
/// mapping failures become [`DeviceError::NativeMapping`], exhausted retries
/// [`DeviceError::TransientBus`], other negative transfer results
/// [`DeviceError::FatalBus`].
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("Device {0} is already open")]
    AlreadyOpen(String),

    #[error("Mode {mode} not supported for {target}")]
    UnsupportedMode { target: String, mode: DeviceMode },

    #[error("Register file could not be mapped: {0}")]
    NativeMapping(#[source] NativeError),

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

    #[error("Device {0} is closed")]
    DeviceClosed(String),

    #[error("Device factory has been shut down")]
    FactoryShutdown,

    #[error("Device {key} is not a {expected} device")]
    KindMismatch { key: String, expected: DeviceKind },

    #[error("Invalid bus address: {0}")]
    InvalidBusAddress(String),

    #[error("Board table error: {0}")]
    Board(#[from] BoardError),

    #[error("Native backend error: {0}")]
    Native(#[source] NativeError),
}

impl DeviceError {
    /// Worth retrying at a higher level (the bounded native retry already ran)
    pub fn is_transient(&self) -> bool {
        matches!(self, DeviceError::TransientBus { .. })
    }
}

impl From<NativeError> for DeviceError {
    fn from(err: NativeError) -> Self {
        match err {
            NativeError::Mapping { .. } => DeviceError::NativeMapping(err),
            NativeError::UnsupportedMode { gpio, mode, .. } => DeviceError::UnsupportedMode {
                target: key::gpio_key(gpio),
                mode,
            },
            NativeError::TransientBus {
                address,
                kind,
                attempts,
            } => DeviceError::TransientBus {
                address,
                kind,
                attempts,
            },
            NativeError::FatalBus {
                address,
                errno,
                attempts,
            } => DeviceError::FatalBus {
                address,
                errno,
                attempts,
            },
            other => DeviceError::Native(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, DeviceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_errors_map_to_taxonomy() {
        let err: DeviceError = NativeError::TransientBus {
            address: "i2c-1@0x20".into(),
            kind: TransientKind::TimedOut,
            attempts: 3,
        }
        .into();
        assert!(err.is_transient());

        let err: DeviceError = NativeError::FatalBus {
            address: "i2c-1@0x20".into(),
            errno: 5,
            attempts: 1,
        }
        .into();
        assert!(matches!(err, DeviceError::FatalBus { errno: 5, .. }));
        assert!(!err.is_transient());

        let err: DeviceError = NativeError::Mapping {
            path: "/dev/gpiomem".into(),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        }
        .into();
        assert!(matches!(err, DeviceError::NativeMapping(_)));

        let err: DeviceError = NativeError::PinOutOfRange { gpio: 60, count: 54 }.into();
        assert!(matches!(err, DeviceError::Native(NativeError::PinOutOfRange { .. })));
    }
}
