// Copyright 2025 boardkit contributors
// SPDX-License-Identifier: Apache-2.0

//! Simulated I2C/SPI bus.
//!
//! Every address is a 256-byte register file with an auto-incrementing
//! pointer: the first byte of a write selects the register, further bytes are
//! stored from there. Duplex transfers echo the written bytes. Return codes can
//! be scripted per address to exercise the retry policy.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::bus::{BusAddress, BusConfig, BusIo, BusTransport, Transfer};
use crate::{NativeError, Result};

const EIO: i32 = 5;
const EBADF: i32 = 9;
const EINVAL: i32 = 22;

/// One transfer attempt as seen by the simulated device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferAttempt {
    /// First written byte, if the transfer wrote anything
    pub first_byte: Option<u8>,
    pub code: i32,
}

#[derive(Debug)]
struct SimDevice {
    registers: [u8; 256],
    pointer: u8,
    script: VecDeque<i32>,
    opens: u32,
    closes: u32,
    attempts: u32,
    log: Vec<TransferAttempt>,
    fail_open: bool,
    fail_close: bool,
}

impl Default for SimDevice {
    fn default() -> Self {
        Self {
            registers: [0; 256],
            pointer: 0,
            script: VecDeque::new(),
            opens: 0,
            closes: 0,
            attempts: 0,
            log: Vec::new(),
            fail_open: false,
            fail_close: false,
        }
    }
}

impl SimDevice {
    fn write(&mut self, data: &[u8]) {
        let Some((&register, rest)) = data.split_first() else {
            return;
        };
        self.pointer = register;
        for byte in rest {
            self.registers[self.pointer as usize] = *byte;
            self.pointer = self.pointer.wrapping_add(1);
        }
    }

    /// Scripted failure, or the transfer against the register file
    fn apply(&mut self, transfer: &mut Transfer<'_>) -> i32 {
        if let Some(code) = self.script.pop_front() {
            if code < 0 {
                return code;
            }
        }
        match transfer {
            Transfer::Read(read) => self.read(read),
            Transfer::Write(write) => self.write(write),
            Transfer::WriteRead { write, read } => {
                self.write(write);
                self.read(read);
            }
            Transfer::Duplex { write, read } => {
                if write.len() != read.len() {
                    return -EINVAL;
                }
                read.copy_from_slice(write);
            }
        }
        transfer.len() as i32
    }

    fn read(&mut self, buf: &mut [u8]) {
        for byte in buf.iter_mut() {
            *byte = self.registers[self.pointer as usize];
            self.pointer = self.pointer.wrapping_add(1);
        }
    }
}

#[derive(Debug, Default)]
struct SimBusState {
    devices: HashMap<BusAddress, SimDevice>,
}

/// Shared handle to a simulated bus; clones share state
#[derive(Debug, Clone, Default)]
pub struct SimulatedBus {
    state: Arc<Mutex<SimBusState>>,
}

impl SimulatedBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_device<T>(&self, address: BusAddress, op: impl FnOnce(&mut SimDevice) -> T) -> T {
        let mut state = self.state.lock();
        op(state.devices.entry(address).or_default())
    }

    /// Queue return codes for the next transfer attempts on `address`
    ///
    /// A negative code fails the attempt with that `-errno`; a non-negative
    /// code lets the attempt through. Once the script runs out every attempt
    /// succeeds.
    pub fn script(&self, address: BusAddress, codes: &[i32]) {
        self.with_device(address, |device| device.script.extend(codes.iter().copied()));
    }

    pub fn fail_open(&self, address: BusAddress) {
        self.with_device(address, |device| device.fail_open = true);
    }

    /// Make the next close on `address` report `-EIO`; the descriptor is still released
    pub fn fail_close(&self, address: BusAddress) {
        self.with_device(address, |device| device.fail_close = true);
    }

    pub fn set_register(&self, address: BusAddress, register: u8, value: u8) {
        self.with_device(address, |device| device.registers[register as usize] = value);
    }

    pub fn register(&self, address: BusAddress, register: u8) -> u8 {
        self.with_device(address, |device| device.registers[register as usize])
    }

    pub fn opens(&self, address: BusAddress) -> u32 {
        self.with_device(address, |device| device.opens)
    }

    pub fn closes(&self, address: BusAddress) -> u32 {
        self.with_device(address, |device| device.closes)
    }

    /// Transfer attempts, including scripted failures
    pub fn attempts(&self, address: BusAddress) -> u32 {
        self.with_device(address, |device| device.attempts)
    }

    /// Every attempt on `address` in the order the device saw them
    pub fn attempt_log(&self, address: BusAddress) -> Vec<TransferAttempt> {
        self.with_device(address, |device| device.log.clone())
    }

    /// Descriptors currently open across all addresses
    pub fn open_descriptors(&self) -> u32 {
        let state = self.state.lock();
        state
            .devices
            .values()
            .map(|device| device.opens.saturating_sub(device.closes))
            .sum()
    }
}

impl BusIo for SimulatedBus {
    fn name(&self) -> &str {
        "simulated"
    }

    fn open(&self, address: &BusAddress, config: &BusConfig) -> Result<Box<dyn BusTransport>> {
        if !config.matches(address) {
            return Err(NativeError::Config(format!(
                "{:?} does not match bus address {}",
                config, address
            )));
        }
        let refused = self.with_device(*address, |device| {
            if device.fail_open {
                return true;
            }
            device.opens += 1;
            false
        });
        if refused {
            return Err(NativeError::BusOpen {
                path: address.device_path().display().to_string(),
                source: std::io::Error::from(std::io::ErrorKind::NotFound),
            });
        }
        Ok(Box::new(SimulatedTransport {
            address: *address,
            bus: self.clone(),
            closed: false,
        }))
    }
}

struct SimulatedTransport {
    address: BusAddress,
    bus: SimulatedBus,
    closed: bool,
}

impl BusTransport for SimulatedTransport {
    fn transfer(&mut self, transfer: &mut Transfer<'_>) -> i32 {
        if self.closed {
            return -EBADF;
        }
        let first_byte = match &*transfer {
            Transfer::Read(_) => None,
            Transfer::Write(write) | Transfer::WriteRead { write, .. } | Transfer::Duplex { write, .. } => {
                write.first().copied()
            }
        };
        self.bus.with_device(self.address, |device| {
            device.attempts += 1;
            let code = device.apply(transfer);
            device.log.push(TransferAttempt { first_byte, code });
            code
        })
    }

    fn close(&mut self) -> i32 {
        if self.closed {
            return -EBADF;
        }
        self.closed = true;
        self.bus.with_device(self.address, |device| {
            device.closes += 1;
            if std::mem::take(&mut device.fail_close) {
                -EIO
            } else {
                0
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::retry::RetryPolicy;
    use crate::bus::{BusHandle, I2cConfig, SpiConfig};
    use crate::TransientKind;

    fn i2c_handle(bus: &SimulatedBus, address: BusAddress) -> BusHandle {
        BusHandle::open(
            bus,
            address,
            BusConfig::I2c(I2cConfig::default()),
            RetryPolicy::new(3),
        )
        .unwrap()
    }

    #[test]
    fn test_register_file_semantics() {
        let bus = SimulatedBus::new();
        let address = BusAddress::i2c(1, 0x48);
        let handle = i2c_handle(&bus, address);

        handle.transfer(&mut Transfer::Write(&[0x10, 0xaa, 0xbb])).unwrap();
        assert_eq!(bus.register(address, 0x11), 0xbb);

        let mut buf = [0u8; 2];
        let report = handle
            .transfer(&mut Transfer::WriteRead {
                write: &[0x10],
                read: &mut buf,
            })
            .unwrap();
        assert_eq!(buf, [0xaa, 0xbb]);
        assert_eq!(report.attempts, 1);
    }

    #[test]
    fn test_scripted_transient_then_success() {
        let bus = SimulatedBus::new();
        let address = BusAddress::i2c(1, 0x20);
        bus.script(address, &[-11, -110]);
        let handle = i2c_handle(&bus, address);

        let report = handle.transfer(&mut Transfer::Write(&[0x00])).unwrap();
        assert_eq!(report.attempts, 3);
        assert_eq!(bus.attempts(address), 3);
    }

    #[test]
    fn test_exhausted_budget_is_transient_error() {
        let bus = SimulatedBus::new();
        let address = BusAddress::i2c(1, 0x20);
        bus.script(address, &[-121, -121, -121]);
        let handle = i2c_handle(&bus, address);

        let err = handle.transfer(&mut Transfer::Write(&[0x00])).unwrap_err();
        assert!(matches!(
            err,
            NativeError::TransientBus {
                kind: TransientKind::RemoteIo,
                attempts: 3,
                ..
            }
        ));
    }

    #[test]
    fn test_fatal_is_not_retried() {
        let bus = SimulatedBus::new();
        let address = BusAddress::i2c(1, 0x20);
        bus.script(address, &[-5]);
        let handle = i2c_handle(&bus, address);

        let err = handle.transfer(&mut Transfer::Write(&[0x00])).unwrap_err();
        assert!(matches!(err, NativeError::FatalBus { errno: 5, attempts: 1, .. }));
        assert_eq!(bus.attempts(address), 1);
    }

    #[test]
    fn test_duplex_echo_and_close() {
        let bus = SimulatedBus::new();
        let address = BusAddress::spi(0, 0);
        let handle = BusHandle::open(
            &bus,
            address,
            BusConfig::Spi(SpiConfig::default()),
            RetryPolicy::default(),
        )
        .unwrap();

        let mut read = [0u8; 3];
        handle
            .transfer(&mut Transfer::Duplex {
                write: &[1, 2, 3],
                read: &mut read,
            })
            .unwrap();
        assert_eq!(read, [1, 2, 3]);

        assert_eq!(bus.open_descriptors(), 1);
        handle.close().unwrap();
        assert_eq!(bus.open_descriptors(), 0);
        assert!(matches!(handle.close(), Err(NativeError::AlreadyClosed(_))));
        assert!(matches!(
            handle.transfer(&mut Transfer::Write(&[0])),
            Err(NativeError::AlreadyClosed(_))
        ));
    }

    #[test]
    fn test_fail_open() {
        let bus = SimulatedBus::new();
        let address = BusAddress::i2c(1, 0x77);
        bus.fail_open(address);
        let result = BusHandle::open(
            &bus,
            address,
            BusConfig::I2c(I2cConfig::default()),
            RetryPolicy::default(),
        );
        assert!(matches!(result, Err(NativeError::BusOpen { .. })));
        assert_eq!(bus.opens(address), 0);
    }
}
