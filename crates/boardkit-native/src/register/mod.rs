// Copyright 2025 boardkit contributors
// SPDX-License-Identifier: Apache-2.0

//! Register-level GPIO access.
//!
//! [`RegisterIo`] is the contract the device layer programs against.
//! [`RegisterWords`]/[`RegisterSource`] separate the register math from where
//! the 32-bit words actually live (a memory map, or the simulated SoC).

pub mod broadcom;
pub mod layout;
pub mod mmap;

use crate::{DeviceMode, PullUpDown, Result};

/// A mapped window of 32-bit registers
///
/// Indices are word offsets from the start of the window. Callers guarantee
/// `index < word_count()`; the Broadcom backend checks the window size once
/// at initialise time.
pub trait RegisterWords: Send {
    fn word_count(&self) -> usize;
    fn load(&self, index: usize) -> u32;
    fn store(&mut self, index: usize, value: u32);
}

/// Something that can produce a [`RegisterWords`] window on demand
pub trait RegisterSource: Send + Sync {
    type Words: RegisterWords;

    fn map(&self) -> Result<Self::Words>;

    /// Human-readable origin, used in logs and mapping errors
    fn describe(&self) -> String;
}

/// Native GPIO register backend
///
/// All operations except `initialise`/`terminate` fail with
/// [`NativeError::NotInitialised`](crate::NativeError::NotInitialised) until
/// the register file is mapped. Each operation is atomic with respect to
/// other operations on the same backend.
pub trait RegisterIo: Send + Sync {
    fn name(&self) -> &str;

    /// Map the register file; idempotent
    fn initialise(&self) -> Result<()>;

    /// Unmap the register file; idempotent
    fn terminate(&self);

    fn is_initialised(&self) -> bool;

    /// Number of GPIOs addressable through the banked tables
    fn gpio_count(&self) -> u32;

    fn supports_mode(&self, mode: DeviceMode) -> bool {
        mode.is_digital()
    }

    fn get_mode(&self, gpio: u32) -> Result<DeviceMode>;
    fn set_mode(&self, gpio: u32, mode: DeviceMode) -> Result<()>;
    fn read(&self, gpio: u32) -> Result<bool>;
    fn write(&self, gpio: u32, value: bool) -> Result<()>;

    /// Latch a pull resistor setting; blocks for the settle delays
    fn set_pull_up_down(&self, gpio: u32, pud: PullUpDown) -> Result<()>;
}
