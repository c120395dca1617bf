// Copyright 2025 boardkit contributors
// SPDX-License-Identifier: Apache-2.0

//! I2C/SPI bus access.
//!
//! A [`BusIo`] opens a [`BusTransport`] (one descriptor per device). The
//! transport performs exactly one kernel call per attempt; [`BusHandle`] owns
//! it, serialises access, and applies the [`RetryPolicy`].

#[cfg(target_os = "linux")]
pub mod linux;
pub mod retry;
pub mod status;

use std::path::PathBuf;

use parking_lot::Mutex;
use tracing::{debug, warn};

use self::retry::RetryPolicy;
use self::status::TransferStatus;
use crate::{NativeError, Result};

/// Where a bus device lives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BusAddress {
    I2c { controller: u32, address: u16 },
    Spi { controller: u32, chip_select: u32 },
}

impl BusAddress {
    pub fn i2c(controller: u32, address: u16) -> Self {
        BusAddress::I2c {
            controller,
            address,
        }
    }

    pub fn spi(controller: u32, chip_select: u32) -> Self {
        BusAddress::Spi {
            controller,
            chip_select,
        }
    }

    pub fn controller(&self) -> u32 {
        match self {
            BusAddress::I2c { controller, .. } | BusAddress::Spi { controller, .. } => *controller,
        }
    }

    /// Kernel character device for this address
    pub fn device_path(&self) -> PathBuf {
        match self {
            BusAddress::I2c { controller, .. } => PathBuf::from(format!("/dev/i2c-{}", controller)),
            BusAddress::Spi {
                controller,
                chip_select,
            } => PathBuf::from(format!("/dev/spidev{}.{}", controller, chip_select)),
        }
    }
}

impl std::fmt::Display for BusAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BusAddress::I2c {
                controller,
                address,
            } => write!(f, "i2c-{}@{:#04x}", controller, address),
            BusAddress::Spi {
                controller,
                chip_select,
            } => write!(f, "spi{}.{}", controller, chip_select),
        }
    }
}

/// I2C device settings
///
/// The bus clock is fixed by the kernel/device tree on Linux; `frequency_hz`
/// is recorded for the simulated backend and diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct I2cConfig {
    pub frequency_hz: u32,
    /// Claim the address even if a kernel driver is bound to it
    pub force_address: bool,
}

impl I2cConfig {
    pub const STANDARD_MODE_HZ: u32 = 100_000;
    pub const FAST_MODE_HZ: u32 = 400_000;
}

impl Default for I2cConfig {
    fn default() -> Self {
        Self {
            frequency_hz: Self::STANDARD_MODE_HZ,
            force_address: false,
        }
    }
}

/// SPI clock polarity/phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpiMode {
    #[default]
    Mode0,
    Mode1,
    Mode2,
    Mode3,
}

impl SpiMode {
    /// CPOL/CPHA bits as expected by `SPI_IOC_WR_MODE`
    pub fn bits(self) -> u8 {
        match self {
            SpiMode::Mode0 => 0,
            SpiMode::Mode1 => 1,
            SpiMode::Mode2 => 2,
            SpiMode::Mode3 => 3,
        }
    }
}

impl TryFrom<u8> for SpiMode {
    type Error = NativeError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(SpiMode::Mode0),
            1 => Ok(SpiMode::Mode1),
            2 => Ok(SpiMode::Mode2),
            3 => Ok(SpiMode::Mode3),
            other => Err(NativeError::Config(format!("SPI mode {} (expected 0..=3)", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpiConfig {
    pub frequency_hz: u32,
    pub mode: SpiMode,
    pub bits_per_word: u8,
    pub lsb_first: bool,
}

impl Default for SpiConfig {
    fn default() -> Self {
        Self {
            frequency_hz: 2_000_000,
            mode: SpiMode::Mode0,
            bits_per_word: 8,
            lsb_first: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusConfig {
    I2c(I2cConfig),
    Spi(SpiConfig),
}

impl BusConfig {
    /// Default settings for the kind of bus `address` refers to
    pub fn default_for(address: &BusAddress) -> Self {
        match address {
            BusAddress::I2c { .. } => BusConfig::I2c(I2cConfig::default()),
            BusAddress::Spi { .. } => BusConfig::Spi(SpiConfig::default()),
        }
    }

    pub fn matches(&self, address: &BusAddress) -> bool {
        matches!(
            (self, address),
            (BusConfig::I2c(_), BusAddress::I2c { .. }) | (BusConfig::Spi(_), BusAddress::Spi { .. })
        )
    }
}

/// Shape of a single transfer
#[derive(Debug)]
pub enum Transfer<'a> {
    Read(&'a mut [u8]),
    Write(&'a [u8]),
    /// Write then read with a repeated start (I2C) or in one message (SPI)
    WriteRead { write: &'a [u8], read: &'a mut [u8] },
    /// Full-duplex exchange; SPI only, buffers must be the same length
    Duplex { write: &'a [u8], read: &'a mut [u8] },
}

impl Transfer<'_> {
    pub fn len(&self) -> usize {
        match self {
            Transfer::Read(read) => read.len(),
            Transfer::Write(write) => write.len(),
            Transfer::WriteRead { write, read } => write.len() + read.len(),
            Transfer::Duplex { write, .. } => write.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One open bus descriptor
///
/// Both methods make exactly one kernel call and return `>= 0` on success or
/// `-errno` on failure; retries are the caller's business.
pub trait BusTransport: Send {
    fn transfer(&mut self, transfer: &mut Transfer<'_>) -> i32;
    fn close(&mut self) -> i32;
}

/// Bus backend: opens transports for addresses
pub trait BusIo: Send + Sync {
    fn name(&self) -> &str;
    fn open(&self, address: &BusAddress, config: &BusConfig) -> Result<Box<dyn BusTransport>>;
}

/// Successful transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferReport {
    /// Kernel return value (bytes or messages transferred)
    pub code: i32,
    pub attempts: u32,
}

/// An open bus device with its retry policy
///
/// Transfers on one handle are serialised; a transfer never runs concurrently
/// with `close`.
pub struct BusHandle {
    address: BusAddress,
    config: BusConfig,
    retry: RetryPolicy,
    transport: Mutex<Option<Box<dyn BusTransport>>>,
}

impl BusHandle {
    pub fn open(
        io: &dyn BusIo,
        address: BusAddress,
        config: BusConfig,
        retry: RetryPolicy,
    ) -> Result<Self> {
        if !config.matches(&address) {
            return Err(NativeError::Config(format!(
                "{:?} does not match bus address {}",
                config, address
            )));
        }
        let transport = io.open(&address, &config)?;
        debug!("[BUS] Opened {} via {}", address, io.name());
        Ok(Self {
            address,
            config,
            retry,
            transport: Mutex::new(Some(transport)),
        })
    }

    pub fn address(&self) -> &BusAddress {
        &self.address
    }

    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    pub fn is_open(&self) -> bool {
        self.transport.lock().is_some()
    }

    /// Transfer with the handle's retry policy
    pub fn transfer(&self, transfer: &mut Transfer<'_>) -> Result<TransferReport> {
        let mut guard = self.transport.lock();
        let transport = guard
            .as_mut()
            .ok_or_else(|| NativeError::AlreadyClosed(self.address.to_string()))?;
        let outcome = self.retry.run(|| transport.transfer(transfer));
        drop(guard);

        match outcome.status {
            TransferStatus::Ok => Ok(TransferReport {
                code: outcome.code,
                attempts: outcome.attempts,
            }),
            TransferStatus::Transient(kind) => {
                warn!(
                    "[BUS] {} still failing after {} attempts: {}",
                    self.address, outcome.attempts, kind
                );
                Err(NativeError::TransientBus {
                    address: self.address.to_string(),
                    kind,
                    attempts: outcome.attempts,
                })
            }
            TransferStatus::Fatal(errno) => Err(NativeError::FatalBus {
                address: self.address.to_string(),
                errno,
                attempts: outcome.attempts,
            }),
        }
    }

    /// Release the descriptor; a second call fails with `AlreadyClosed`
    pub fn close(&self) -> Result<()> {
        let transport = self.transport.lock().take();
        let Some(mut transport) = transport else {
            return Err(NativeError::AlreadyClosed(self.address.to_string()));
        };
        let code = transport.close();
        if code < 0 {
            return Err(NativeError::BusClose {
                address: self.address.to_string(),
                errno: -code,
            });
        }
        debug!("[BUS] Closed {}", self.address);
        Ok(())
    }
}

impl std::fmt::Debug for BusHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusHandle")
            .field("address", &self.address)
            .field("config", &self.config)
            .field("retry", &self.retry)
            .field("open", &self.is_open())
            .finish()
    }
}
