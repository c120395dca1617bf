// Copyright 2025 boardkit contributors
// SPDX-License-Identifier: Apache-2.0

//! I2C/SPI device and channel handles.

use std::sync::Arc;

use boardkit_native::{BusAddress, BusHandle, Transfer, TransferReport};

use crate::registry::{CloseOutcome, Device, DeviceRegistry};
use crate::{DeviceError, Result};

fn transfer_on(device: &Device, handle: &BusHandle, transfer: &mut Transfer<'_>) -> Result<TransferReport> {
    if !device.is_open() {
        return Err(DeviceError::DeviceClosed(device.key().to_string()));
    }
    device.native_result(handle.transfer(transfer))
}

macro_rules! bus_transfer_methods {
    () => {
        pub fn address(&self) -> &BusAddress {
            self.handle.address()
        }

        pub fn key(&self) -> &str {
            self.device.key()
        }

        pub fn device(&self) -> &Arc<Device> {
            &self.device
        }

        pub fn is_open(&self) -> bool {
            self.device.is_open()
        }

        /// Any transfer shape, with the retry report
        pub fn transfer(&self, transfer: &mut Transfer<'_>) -> Result<TransferReport> {
            transfer_on(&self.device, &self.handle, transfer)
        }

        pub fn read(&self, buf: &mut [u8]) -> Result<()> {
            self.transfer(&mut Transfer::Read(buf)).map(|_| ())
        }

        pub fn write(&self, data: &[u8]) -> Result<()> {
            self.transfer(&mut Transfer::Write(data)).map(|_| ())
        }

        /// Combined write-then-read (register read on most I2C chips)
        pub fn write_read(&self, write: &[u8], read: &mut [u8]) -> Result<()> {
            self.transfer(&mut Transfer::WriteRead { write, read }).map(|_| ())
        }

        pub fn close(&self) -> CloseOutcome {
            self.registry.close_device(&self.device)
        }
    };
}

/// An open I2C or SPI device with exclusive use of its address
pub struct BusDevice {
    device: Arc<Device>,
    handle: Arc<BusHandle>,
    registry: Arc<DeviceRegistry>,
}

impl BusDevice {
    pub(crate) fn new(device: Arc<Device>, handle: Arc<BusHandle>, registry: Arc<DeviceRegistry>) -> Self {
        Self {
            device,
            handle,
            registry,
        }
    }

    bus_transfer_methods!();
}

/// One logical channel of a shared bus device (e.g. one pin of an I2C expander)
///
/// Channels of the same parent share its bus handle; the handle is closed
/// when the last channel closes.
pub struct BusChannel {
    device: Arc<Device>,
    channel: u32,
    handle: Arc<BusHandle>,
    registry: Arc<DeviceRegistry>,
}

impl BusChannel {
    pub(crate) fn new(
        device: Arc<Device>,
        channel: u32,
        handle: Arc<BusHandle>,
        registry: Arc<DeviceRegistry>,
    ) -> Self {
        Self {
            device,
            channel,
            handle,
            registry,
        }
    }

    pub fn channel(&self) -> u32 {
        self.channel
    }

    pub fn parent_key(&self) -> Option<&str> {
        self.device.parent()
    }

    bus_transfer_methods!();
}

impl Drop for BusDevice {
    fn drop(&mut self) {
        if self.device.is_open() {
            self.registry.close_device_if_open(&self.device);
        }
    }
}

impl Drop for BusChannel {
    fn drop(&mut self) {
        if self.device.is_open() {
            self.registry.close_device_if_open(&self.device);
        }
    }
}

impl std::fmt::Debug for BusDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusDevice")
            .field("key", &self.key())
            .field("state", &self.device.state())
            .finish()
    }
}

impl std::fmt::Debug for BusChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BusChannel")
            .field("key", &self.key())
            .field("channel", &self.channel)
            .field("state", &self.device.state())
            .finish()
    }
}
