// Copyright 2025 boardkit contributors
// SPDX-License-Identifier: Apache-2.0

//! Linux `i2c-dev` and `spidev` transports.

use std::fs::{File, OpenOptions};
use std::os::unix::io::{AsRawFd, IntoRawFd};

use tracing::{debug, info};

use super::{BusAddress, BusConfig, BusIo, BusTransport, I2cConfig, SpiConfig, Transfer};
use crate::{NativeError, Result};

// i2c-dev
const I2C_SLAVE: u64 = 0x0703;
const I2C_SLAVE_FORCE: u64 = 0x0706;
const I2C_RDWR: u64 = 0x0707;
const I2C_M_RD: u16 = 0x0001;

// spidev: _IOW('k', nr, size) with the asm-generic direction encoding
const fn spi_iow(nr: u64, size: u64) -> u64 {
    (1 << 30) | (size << 16) | ((b'k' as u64) << 8) | nr
}

const SPI_IOC_WR_MODE: u64 = spi_iow(1, 1);
const SPI_IOC_WR_LSB_FIRST: u64 = spi_iow(2, 1);
const SPI_IOC_WR_BITS_PER_WORD: u64 = spi_iow(3, 1);
const SPI_IOC_WR_MAX_SPEED_HZ: u64 = spi_iow(4, 4);

const fn spi_ioc_message(count: u64) -> u64 {
    spi_iow(0, count * std::mem::size_of::<SpiIocTransfer>() as u64)
}

#[repr(C)]
struct I2cMsg {
    addr: u16,
    flags: u16,
    len: u16,
    buf: *mut u8,
}

#[repr(C)]
struct I2cRdwrIoctlData {
    msgs: *mut I2cMsg,
    nmsgs: u32,
}

#[repr(C)]
#[derive(Default)]
struct SpiIocTransfer {
    tx_buf: u64,
    rx_buf: u64,
    len: u32,
    speed_hz: u32,
    delay_usecs: u16,
    bits_per_word: u8,
    cs_change: u8,
    tx_nbits: u8,
    rx_nbits: u8,
    word_delay_usecs: u8,
    pad: u8,
}

fn last_errno() -> i32 {
    std::io::Error::last_os_error()
        .raw_os_error()
        .unwrap_or(libc::EIO)
}

/// Map a libc return value to `>= 0` or `-errno`
fn rc(value: isize) -> i32 {
    if value < 0 {
        -last_errno()
    } else {
        value.min(i32::MAX as isize) as i32
    }
}

fn open_device(address: &BusAddress) -> Result<File> {
    let path = address.device_path();
    OpenOptions::new()
        .read(true)
        .write(true)
        .open(&path)
        .map_err(|source| NativeError::BusOpen {
            path: path.display().to_string(),
            source,
        })
}

fn ioctl_setup(file: &File, address: &BusAddress, request: u64, arg: libc::c_ulong) -> Result<()> {
    // SAFETY: every request used here takes its argument by value or points at a live local
    let result = unsafe { libc::ioctl(file.as_raw_fd(), request as _, arg) };
    if result < 0 {
        return Err(NativeError::BusOpen {
            path: address.device_path().display().to_string(),
            source: std::io::Error::last_os_error(),
        });
    }
    Ok(())
}

fn close_file(file: &mut Option<File>) -> i32 {
    match file.take() {
        // SAFETY: descriptor ownership moves out of the File, closed exactly once
        Some(file) => rc(unsafe { libc::close(file.into_raw_fd()) } as isize),
        None => -libc::EBADF,
    }
}

/// `/dev/i2c-N` and `/dev/spidevN.M`
#[derive(Debug, Default)]
pub struct LinuxBus;

impl LinuxBus {
    pub fn new() -> Self {
        Self
    }
}

impl BusIo for LinuxBus {
    fn name(&self) -> &str {
        "linux"
    }

    fn open(&self, address: &BusAddress, config: &BusConfig) -> Result<Box<dyn BusTransport>> {
        match (address, config) {
            (BusAddress::I2c { address: device, .. }, BusConfig::I2c(i2c)) => {
                Ok(Box::new(I2cTransport::open(address, *device, i2c)?))
            }
            (BusAddress::Spi { .. }, BusConfig::Spi(spi)) => {
                Ok(Box::new(SpiTransport::open(address, spi)?))
            }
            _ => Err(NativeError::Config(format!(
                "{:?} does not match bus address {}",
                config, address
            ))),
        }
    }
}

struct I2cTransport {
    file: Option<File>,
    device: u16,
}

impl I2cTransport {
    fn open(address: &BusAddress, device: u16, config: &I2cConfig) -> Result<Self> {
        let file = open_device(address)?;
        let request = if config.force_address {
            I2C_SLAVE_FORCE
        } else {
            I2C_SLAVE
        };
        ioctl_setup(&file, address, request, libc::c_ulong::from(device))?;
        info!(
            "[BUS] Opened {}{}",
            address,
            if config.force_address { " (forced)" } else { "" }
        );
        Ok(Self {
            file: Some(file),
            device,
        })
    }

    fn read_write(&mut self, write: &[u8], read: &mut [u8]) -> i32 {
        let Some(file) = self.file.as_ref() else {
            return -libc::EBADF;
        };
        let (Ok(write_len), Ok(read_len)) = (u16::try_from(write.len()), u16::try_from(read.len())) else {
            return -libc::EINVAL;
        };
        let mut msgs = [
            I2cMsg {
                addr: self.device,
                flags: 0,
                len: write_len,
                buf: write.as_ptr() as *mut u8,
            },
            I2cMsg {
                addr: self.device,
                flags: I2C_M_RD,
                len: read_len,
                buf: read.as_mut_ptr(),
            },
        ];
        let mut data = I2cRdwrIoctlData {
            msgs: msgs.as_mut_ptr(),
            nmsgs: msgs.len() as u32,
        };
        // SAFETY: msgs and both buffers outlive the call; the kernel never writes the first buffer
        rc(unsafe { libc::ioctl(file.as_raw_fd(), I2C_RDWR as _, &mut data as *mut I2cRdwrIoctlData) } as isize)
    }
}

impl BusTransport for I2cTransport {
    fn transfer(&mut self, transfer: &mut Transfer<'_>) -> i32 {
        let Some(fd) = self.file.as_ref().map(AsRawFd::as_raw_fd) else {
            return -libc::EBADF;
        };
        match transfer {
            // SAFETY: buffer pointers and lengths come from live slices
            Transfer::Read(read) => rc(unsafe { libc::read(fd, read.as_mut_ptr().cast(), read.len()) }),
            Transfer::Write(write) => rc(unsafe { libc::write(fd, write.as_ptr().cast(), write.len()) }),
            Transfer::WriteRead { write, read } => self.read_write(write, read),
            Transfer::Duplex { .. } => -libc::EINVAL,
        }
    }

    fn close(&mut self) -> i32 {
        close_file(&mut self.file)
    }
}

struct SpiTransport {
    file: Option<File>,
    config: SpiConfig,
}

impl SpiTransport {
    fn open(address: &BusAddress, config: &SpiConfig) -> Result<Self> {
        let file = open_device(address)?;
        let mode = config.mode.bits();
        let lsb_first = u8::from(config.lsb_first);
        let bits = config.bits_per_word;
        let speed = config.frequency_hz;
        ioctl_setup(&file, address, SPI_IOC_WR_MODE, &mode as *const u8 as libc::c_ulong)?;
        ioctl_setup(&file, address, SPI_IOC_WR_BITS_PER_WORD, &bits as *const u8 as libc::c_ulong)?;
        ioctl_setup(&file, address, SPI_IOC_WR_MAX_SPEED_HZ, &speed as *const u32 as libc::c_ulong)?;
        ioctl_setup(&file, address, SPI_IOC_WR_LSB_FIRST, &lsb_first as *const u8 as libc::c_ulong)?;
        info!(
            "[BUS] Opened {} (mode {}, {} Hz, {} bits/word)",
            address, mode, speed, bits
        );
        Ok(Self {
            file: Some(file),
            config: *config,
        })
    }

    fn segment(&self, tx: Option<&[u8]>, rx: Option<&mut [u8]>, len: usize) -> SpiIocTransfer {
        SpiIocTransfer {
            tx_buf: tx.map_or(0, |buf| buf.as_ptr() as u64),
            rx_buf: rx.map_or(0, |buf| buf.as_mut_ptr() as u64),
            len: len as u32,
            speed_hz: self.config.frequency_hz,
            bits_per_word: self.config.bits_per_word,
            ..Default::default()
        }
    }

    fn message(&self, segments: &mut [SpiIocTransfer]) -> i32 {
        let Some(file) = self.file.as_ref() else {
            return -libc::EBADF;
        };
        let request = spi_ioc_message(segments.len() as u64);
        // SAFETY: segment buffers point at slices that outlive the call
        rc(unsafe { libc::ioctl(file.as_raw_fd(), request as _, segments.as_mut_ptr()) } as isize)
    }
}

impl BusTransport for SpiTransport {
    fn transfer(&mut self, transfer: &mut Transfer<'_>) -> i32 {
        match transfer {
            Transfer::Read(read) => {
                let len = read.len();
                let mut segments = [self.segment(None, Some(&mut **read), len)];
                self.message(&mut segments)
            }
            Transfer::Write(write) => {
                let mut segments = [self.segment(Some(&**write), None, write.len())];
                self.message(&mut segments)
            }
            Transfer::WriteRead { write, read } => {
                let read_len = read.len();
                let mut segments = [
                    self.segment(Some(&**write), None, write.len()),
                    self.segment(None, Some(&mut **read), read_len),
                ];
                self.message(&mut segments)
            }
            Transfer::Duplex { write, read } => {
                if write.len() != read.len() {
                    return -libc::EINVAL;
                }
                let len = write.len();
                let mut segments = [self.segment(Some(&**write), Some(&mut **read), len)];
                self.message(&mut segments)
            }
        }
    }

    fn close(&mut self) -> i32 {
        let code = close_file(&mut self.file);
        debug!("[BUS] spidev closed ({})", code);
        code
    }
}
