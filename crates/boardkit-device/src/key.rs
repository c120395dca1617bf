// Copyright 2025 boardkit contributors
// SPDX-License-Identifier: Apache-2.0

//! Device key formats.
//!
//! Keys are stable for the lifetime of a provisioning. Collaborators should
//! treat them as opaque and rely only on uniqueness.

use boardkit_native::BusAddress;

pub fn gpio_key(gpio: u32) -> String {
    format!("gpio:{}", gpio)
}

pub fn bus_key(address: &BusAddress) -> String {
    match address {
        BusAddress::I2c {
            controller,
            address,
        } => format!("i2c:{}:0x{:02x}", controller, address),
        BusAddress::Spi {
            controller,
            chip_select,
        } => format!("spi:{}.{}", controller, chip_select),
    }
}

pub fn channel_key(parent: &str, channel: u32) -> String {
    format!("{}/ch{}", parent, channel)
}
