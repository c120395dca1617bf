// Copyright 2025 boardkit contributors
// SPDX-License-Identifier: Apache-2.0

//! Register math, pull sequencing and bus retry through the public API.

use std::time::Duration;

use boardkit::native::bus::status::errno::{EAGAIN, ETIMEDOUT};
use boardkit::native::sim::{SimulatedBus, SimulatedSoc};
use boardkit::native::{BusHandle, NativeError, TransferStatus, TransientKind};
use boardkit::prelude::*;

const EIO: i32 = 5;

/// Regular file standing in for the GPIO register device
fn register_file() -> (tempfile::NamedTempFile, BroadcomGpio<DevMemSource>) {
    let file = tempfile::NamedTempFile::new().unwrap();
    file.as_file().set_len(4096).unwrap();
    let gpio = BroadcomGpio::new(DevMemSource::new(file.path(), 0, 4096), &BCM2835)
        .with_settle_delay(Duration::ZERO);
    gpio.initialise().unwrap();
    (file, gpio)
}

fn scripted(codes: &[i32]) -> (u32, TransferStatus, i32) {
    let mut codes = codes.iter().copied();
    let outcome = RetryPolicy::new(3).run(|| codes.next().unwrap_or(0));
    (outcome.attempts, outcome.status, outcome.code)
}

#[test]
fn test_retry_policy_table() {
    assert_eq!(scripted(&[-EAGAIN, 0]), (2, TransferStatus::Ok, 0));
    assert_eq!(scripted(&[-EAGAIN, -ETIMEDOUT, 0]), (3, TransferStatus::Ok, 0));
    assert_eq!(
        scripted(&[-EAGAIN, -EAGAIN, -EAGAIN]),
        (3, TransferStatus::Transient(TransientKind::WouldBlock), -EAGAIN)
    );
    assert_eq!(scripted(&[-EIO]), (1, TransferStatus::Fatal(EIO), -EIO));
}

#[test]
fn test_retry_through_bus_handle() {
    let bus = SimulatedBus::new();
    let address = BusAddress::i2c(1, 0x48);
    let handle = BusHandle::open(&bus, address, BusConfig::default_for(&address), RetryPolicy::new(3)).unwrap();

    bus.script(address, &[-EAGAIN, -ETIMEDOUT]);
    let report = handle.transfer(&mut Transfer::Write(&[0x00, 0x01])).unwrap();
    assert_eq!(report.attempts, 3);
    assert_eq!(bus.attempts(address), 3);

    bus.script(address, &[-EIO, -EAGAIN]);
    assert!(matches!(
        handle.transfer(&mut Transfer::Write(&[0x00])),
        Err(NativeError::FatalBus { errno: EIO, attempts: 1, .. })
    ));
    assert_eq!(bus.attempts(address), 4);

    handle.close().unwrap();
    assert!(matches!(handle.close(), Err(NativeError::AlreadyClosed(_))));
}

#[test]
fn test_register_mode_round_trip_gpio_12() {
    let (_file, gpio) = register_file();
    gpio.set_mode(12, DeviceMode::DigitalOutput).unwrap();
    assert_eq!(gpio.get_mode(12).unwrap(), DeviceMode::DigitalOutput);
    gpio.set_mode(12, DeviceMode::DigitalInput).unwrap();
    assert_eq!(gpio.get_mode(12).unwrap(), DeviceMode::DigitalInput);
}

#[test]
fn test_register_bank_boundaries() {
    let (file, gpio) = register_file();
    for pin in [0u32, 31, 32] {
        let (word, shift) = BCM2835.fsel_location(pin);
        assert_eq!(word, (pin / 10) as usize);
        assert_eq!(shift, (pin % 10) * 3);

        gpio.set_mode(pin, DeviceMode::DigitalOutput).unwrap();
        assert_eq!(gpio.get_mode(pin).unwrap(), DeviceMode::DigitalOutput);
    }

    let bytes = std::fs::read(file.path()).unwrap();
    let word = |index: usize| u32::from_ne_bytes(bytes[index * 4..index * 4 + 4].try_into().unwrap());
    assert_eq!(word(0), 0b001);
    assert_eq!(word(3), (0b001 << 3) | (0b001 << 6));

    gpio.write(31, true).unwrap();
    gpio.write(32, true).unwrap();
    let bytes = std::fs::read(file.path()).unwrap();
    let word = |index: usize| u32::from_ne_bytes(bytes[index * 4..index * 4 + 4].try_into().unwrap());
    assert_eq!(word(7), 1 << 31);
    assert_eq!(word(8), 1);
}

#[test]
fn test_unsupported_mode_leaves_hardware_unchanged() {
    let (file, gpio) = register_file();
    let before = std::fs::read(file.path()).unwrap();
    assert!(matches!(
        gpio.set_mode(18, DeviceMode::SoftwarePwmOutput),
        Err(NativeError::UnsupportedMode { gpio: 18, .. })
    ));
    assert!(matches!(gpio.get_mode(60), Err(NativeError::PinOutOfRange { .. })));
    assert_eq!(std::fs::read(file.path()).unwrap(), before);
}

#[test]
fn test_pull_up_down_on_floating_pin() {
    let soc = SimulatedSoc::new(&BCM2835);
    let gpio = BroadcomGpio::new(soc.clone(), &BCM2835);
    gpio.initialise().unwrap();
    gpio.set_mode(17, DeviceMode::DigitalInput).unwrap();

    soc.set_floating_level(17, true);
    soc.clear_stores();
    gpio.set_pull_up_down(17, PullUpDown::PullDown).unwrap();
    assert!(!gpio.read(17).unwrap());

    let steps: Vec<(usize, u32)> = soc.stores().iter().map(|s| (s.index, s.value)).collect();
    assert_eq!(steps, vec![(37, 1), (38, 1 << 17), (37, 0), (38, 0)]);

    gpio.set_pull_up_down(17, PullUpDown::PullUp).unwrap();
    assert!(gpio.read(17).unwrap());

    // Every step waits out the settle delay
    let stores = soc.stores();
    let settle = gpio.settle_delay();
    for pair in stores.windows(2) {
        assert!(pair[1].at.duration_since(pair[0].at) >= settle);
    }
}

#[test]
fn test_direct_pull_scheme_on_bcm2711() {
    let soc = SimulatedSoc::new(&BCM2711);
    let gpio = BroadcomGpio::new(soc.clone(), &BCM2711).with_settle_delay(Duration::ZERO);
    gpio.initialise().unwrap();
    gpio.set_mode(40, DeviceMode::DigitalInput).unwrap();

    gpio.set_pull_up_down(40, PullUpDown::PullUp).unwrap();
    assert_eq!(soc.pull(40), PullUpDown::PullUp);
    assert!(gpio.read(40).unwrap());
    // 16 GPIOs per register, 2 bits each
    assert_eq!(soc.word(57 + 40 / 16), 1 << ((40 % 16) * 2));
}
