// Copyright 2025 boardkit contributors
// SPDX-License-Identifier: Apache-2.0

//! Digital GPIO pin handles.

use std::any::Any;
use std::sync::Arc;

use boardkit_native::{NativeError, RegisterIo};
use tracing::debug;

use crate::registry::{CloseOutcome, Device, DeviceRegistry, NativeResource};
use crate::{DeviceError, DeviceMode, PullUpDown, Result};

/// Registry resource for one GPIO line
///
/// The register window itself is shared by every pin and released by the
/// factory on shutdown, so releasing a line only drops the reference.
pub(crate) struct GpioLine {
    pub(crate) gpio: u32,
    pub(crate) io: Arc<dyn RegisterIo>,
}

impl NativeResource for GpioLine {
    fn release(&self) -> std::result::Result<(), NativeError> {
        debug!("[GPIO] Released GPIO {} on {}", self.gpio, self.io.name());
        Ok(())
    }

    fn as_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

/// An open digital pin
///
/// Closes itself on drop if still open.
pub struct GpioPin {
    device: Arc<Device>,
    line: Arc<GpioLine>,
    mode: DeviceMode,
    registry: Arc<DeviceRegistry>,
}

impl GpioPin {
    pub(crate) fn new(
        device: Arc<Device>,
        line: Arc<GpioLine>,
        mode: DeviceMode,
        registry: Arc<DeviceRegistry>,
    ) -> Self {
        Self {
            device,
            line,
            mode,
            registry,
        }
    }

    pub fn gpio(&self) -> u32 {
        self.line.gpio
    }

    pub fn key(&self) -> &str {
        self.device.key()
    }

    pub fn device(&self) -> &Arc<Device> {
        &self.device
    }

    /// Mode the pin was provisioned with
    pub fn provisioned_mode(&self) -> DeviceMode {
        self.mode
    }

    pub fn is_open(&self) -> bool {
        self.device.is_open()
    }

    fn ensure_open(&self) -> Result<()> {
        if !self.device.is_open() {
            return Err(DeviceError::DeviceClosed(self.key().to_string()));
        }
        Ok(())
    }

    /// Mode currently selected in hardware
    pub fn mode(&self) -> Result<DeviceMode> {
        self.ensure_open()?;
        self.device.native_result(self.line.io.get_mode(self.line.gpio))
    }

    pub fn read(&self) -> Result<bool> {
        self.ensure_open()?;
        self.device.native_result(self.line.io.read(self.line.gpio))
    }

    /// Drive the pin; only for output pins
    pub fn write(&self, value: bool) -> Result<()> {
        self.ensure_open()?;
        if self.mode != DeviceMode::DigitalOutput {
            return Err(DeviceError::UnsupportedMode {
                target: format!("{} write", self.key()),
                mode: self.mode,
            });
        }
        self.device.native_result(self.line.io.write(self.line.gpio, value))
    }

    /// Invert an output pin; returns the new level
    pub fn toggle(&self) -> Result<bool> {
        let level = !self.read()?;
        self.write(level)?;
        Ok(level)
    }

    /// Change the pull resistor; only for input pins
    pub fn set_pull(&self, pud: PullUpDown) -> Result<()> {
        self.ensure_open()?;
        if self.mode != DeviceMode::DigitalInput {
            return Err(DeviceError::UnsupportedMode {
                target: format!("{} pull {}", self.key(), pud),
                mode: self.mode,
            });
        }
        self.device.native_result(self.line.io.set_pull_up_down(self.line.gpio, pud))
    }

    pub fn close(&self) -> CloseOutcome {
        self.registry.close_device(&self.device)
    }
}

impl Drop for GpioPin {
    fn drop(&mut self) {
        if self.device.is_open() {
            self.registry.close_device_if_open(&self.device);
        }
    }
}

impl std::fmt::Debug for GpioPin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpioPin")
            .field("key", &self.key())
            .field("mode", &self.mode)
            .field("state", &self.device.state())
            .finish()
    }
}
