// Copyright 2025 boardkit contributors
// SPDX-License-Identifier: Apache-2.0

//! Device factory: the process-facing facade drivers provision through.
//!
//! ```text
//! UNSTARTED ──first provision──► STARTED ──shutdown()──► SHUTDOWN
//! ```
//!
//! Each `provision_*` call validates the request against the board table and
//! the backend before any native call, then goes through the registry.

use std::sync::Arc;

use boardkit_board::BoardInfo;
use boardkit_native::{
    BusAddress, BusConfig, BusHandle, BusIo, I2cConfig, RegisterIo, RetryPolicy, SpiConfig,
};
use parking_lot::{RwLock, RwLockReadGuard};
use tracing::{debug, info, warn};

use crate::bus::{BusChannel, BusDevice};
use crate::gpio::{GpioLine, GpioPin};
use crate::key;
use crate::registry::{CloseFailure, DeviceKind, DeviceRegistry};
use crate::{DeviceError, DeviceMode, PullUpDown, Result};

/// Highest 7-bit I2C address
const I2C_MAX_ADDRESS: u16 = 0x7f;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FactoryState {
    Unstarted,
    Started,
    Shutdown,
}

impl std::fmt::Display for FactoryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FactoryState::Unstarted => write!(f, "UNSTARTED"),
            FactoryState::Started => write!(f, "STARTED"),
            FactoryState::Shutdown => write!(f, "SHUTDOWN"),
        }
    }
}

/// Defaults applied to provisioned bus devices
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FactoryOptions {
    pub retry: RetryPolicy,
    pub i2c: I2cConfig,
    pub spi: SpiConfig,
    /// Map the GPIO register file at construction instead of on first use
    pub map_on_start: bool,
}

impl Default for FactoryOptions {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            i2c: I2cConfig::default(),
            spi: SpiConfig::default(),
            map_on_start: false,
        }
    }
}

/// Summary of [`DeviceFactory::shutdown`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Devices that were still open
    pub closed: usize,
    pub failures: Vec<CloseFailure>,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Explicitly constructed device context
///
/// Drivers receive an `Arc<DeviceFactory>` rather than reaching for a global.
pub struct DeviceFactory {
    board: BoardInfo,
    gpio: Arc<dyn RegisterIo>,
    bus: Arc<dyn BusIo>,
    registry: Arc<DeviceRegistry>,
    options: FactoryOptions,
    state: RwLock<FactoryState>,
}

impl DeviceFactory {
    pub fn new(
        board: BoardInfo,
        gpio: Arc<dyn RegisterIo>,
        bus: Arc<dyn BusIo>,
        options: FactoryOptions,
    ) -> Result<Arc<Self>> {
        if options.map_on_start {
            gpio.initialise()?;
        }
        info!(
            "[FACTORY] Created for {} (gpio: {}, bus: {}, retry budget: {})",
            board.name(),
            gpio.name(),
            bus.name(),
            options.retry.budget()
        );
        Ok(Arc::new(Self {
            board,
            gpio,
            bus,
            registry: Arc::new(DeviceRegistry::new()),
            options,
            state: RwLock::new(FactoryState::Unstarted),
        }))
    }

    pub fn state(&self) -> FactoryState {
        *self.state.read()
    }

    pub fn board(&self) -> &BoardInfo {
        &self.board
    }

    pub fn registry(&self) -> &Arc<DeviceRegistry> {
        &self.registry
    }

    pub fn gpio_backend_name(&self) -> &str {
        self.gpio.name()
    }

    pub fn bus_backend_name(&self) -> &str {
        self.bus.name()
    }

    pub fn options(&self) -> &FactoryOptions {
        &self.options
    }

    /// Enter a provisioning call: UNSTARTED becomes STARTED, SHUTDOWN is refused.
    /// The returned guard keeps `shutdown` out until provisioning finishes.
    fn enter(&self) -> Result<RwLockReadGuard<'_, FactoryState>> {
        {
            let state = self.state.read();
            match *state {
                FactoryState::Started => return Ok(state),
                FactoryState::Shutdown => return Err(DeviceError::FactoryShutdown),
                FactoryState::Unstarted => {}
            }
        }
        {
            let mut state = self.state.write();
            if *state == FactoryState::Unstarted {
                *state = FactoryState::Started;
                info!("[FACTORY] Started");
            }
        }
        let state = self.state.read();
        if *state == FactoryState::Shutdown {
            return Err(DeviceError::FactoryShutdown);
        }
        Ok(state)
    }

    fn check_gpio_request(&self, gpio: u32, mode: DeviceMode) -> Result<()> {
        let pin = self.board.by_gpio_or_default(gpio);
        if !pin.supports(mode) || !self.gpio.supports_mode(mode) {
            return Err(DeviceError::UnsupportedMode {
                target: key::gpio_key(gpio),
                mode,
            });
        }
        if gpio >= self.gpio.gpio_count() {
            return Err(boardkit_native::NativeError::PinOutOfRange {
                gpio,
                count: self.gpio.gpio_count(),
            }
            .into());
        }
        Ok(())
    }

    /// Provision a digital pin
    ///
    /// `pull` applies to inputs and is ignored for outputs.
    pub fn provision_digital_pin(&self, gpio: u32, mode: DeviceMode, pull: PullUpDown) -> Result<GpioPin> {
        self.provision_gpio(gpio, mode, pull, None)
    }

    pub fn provision_digital_input(&self, gpio: u32, pull: PullUpDown) -> Result<GpioPin> {
        self.provision_gpio(gpio, DeviceMode::DigitalInput, pull, None)
    }

    /// Provision an output, driving `initial` before the pin switches to output
    pub fn provision_digital_output(&self, gpio: u32, initial: bool) -> Result<GpioPin> {
        self.provision_gpio(gpio, DeviceMode::DigitalOutput, PullUpDown::None, Some(initial))
    }

    fn provision_gpio(
        &self,
        gpio: u32,
        mode: DeviceMode,
        pull: PullUpDown,
        initial: Option<bool>,
    ) -> Result<GpioPin> {
        let _state = self.enter()?;
        self.check_gpio_request(gpio, mode)?;
        self.gpio.initialise()?;

        let key = key::gpio_key(gpio);
        let io = Arc::clone(&self.gpio);
        let (device, line) = self.registry.provision(&key, DeviceKind::Gpio, || {
            if let Some(level) = initial {
                io.write(gpio, level)?;
            }
            io.set_mode(gpio, mode)?;
            match mode {
                DeviceMode::DigitalInput => io.set_pull_up_down(gpio, pull)?,
                _ if pull != PullUpDown::None => {
                    debug!("[FACTORY] Ignoring {} for {} pin {}", pull, mode, gpio)
                }
                _ => {}
            }
            Ok(Arc::new(GpioLine { gpio, io }))
        })?;
        Ok(GpioPin::new(device, line, mode, Arc::clone(&self.registry)))
    }

    fn check_bus_request(&self, address: &BusAddress) -> Result<()> {
        if let BusAddress::I2c { address: device, .. } = address {
            if *device > I2C_MAX_ADDRESS {
                return Err(DeviceError::InvalidBusAddress(address.to_string()));
            }
        }
        Ok(())
    }

    fn open_bus(&self, address: BusAddress, config: BusConfig) -> Result<Arc<BusHandle>> {
        Ok(Arc::new(BusHandle::open(
            self.bus.as_ref(),
            address,
            config,
            self.options.retry,
        )?))
    }

    /// Provision an I2C device with the factory's default I2C settings
    pub fn provision_i2c_device(&self, controller: u32, address: u16) -> Result<BusDevice> {
        self.provision_bus_device(BusAddress::i2c(controller, address), BusConfig::I2c(self.options.i2c))
    }

    pub fn provision_spi_device(&self, controller: u32, chip_select: u32) -> Result<BusDevice> {
        self.provision_bus_device(
            BusAddress::spi(controller, chip_select),
            BusConfig::Spi(self.options.spi),
        )
    }

    /// Provision a bus device with explicit settings
    pub fn provision_bus_device(&self, address: BusAddress, config: BusConfig) -> Result<BusDevice> {
        let _state = self.enter()?;
        self.check_bus_request(&address)?;
        let key = key::bus_key(&address);
        let (device, handle) = self
            .registry
            .provision(&key, bus_kind(&address), || self.open_bus(address, config))?;
        Ok(BusDevice::new(device, handle, Arc::clone(&self.registry)))
    }

    /// Provision channel `channel` of a shared I2C device
    pub fn provision_i2c_channel(&self, controller: u32, address: u16, channel: u32) -> Result<BusChannel> {
        self.provision_bus_channel(
            BusAddress::i2c(controller, address),
            BusConfig::I2c(self.options.i2c),
            channel,
        )
    }

    /// Provision a channel of a shared bus device, opening the device if needed
    pub fn provision_bus_channel(
        &self,
        address: BusAddress,
        config: BusConfig,
        channel: u32,
    ) -> Result<BusChannel> {
        let _state = self.enter()?;
        self.check_bus_request(&address)?;
        let parent_key = key::bus_key(&address);
        let channel_key = key::channel_key(&parent_key, channel);
        let (device, handle) = self.registry.provision_channel(
            &parent_key,
            bus_kind(&address),
            || self.open_bus(address, config),
            &channel_key,
        )?;
        Ok(BusChannel::new(device, channel, handle, Arc::clone(&self.registry)))
    }

    /// Close every open device, release the backends, refuse further provisioning
    ///
    /// Close failures are collected, not raised. Calling again is a no-op.
    pub fn shutdown(&self) -> ShutdownReport {
        let mut state = self.state.write();
        if *state == FactoryState::Shutdown {
            debug!("[FACTORY] Already shut down");
            return ShutdownReport::default();
        }
        *state = FactoryState::Shutdown;

        let (closed, failures) = self.registry.close_all();
        self.gpio.terminate();

        if failures.is_empty() {
            info!("[FACTORY] Shut down, closed {} device(s)", closed);
        } else {
            warn!(
                "[FACTORY] Shut down, closed {} device(s) with {} close failure(s): {}",
                closed,
                failures.len(),
                failures
                    .iter()
                    .map(|f| format!("{} ({})", f.key, f.error))
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
        ShutdownReport { closed, failures }
    }
}

fn bus_kind(address: &BusAddress) -> DeviceKind {
    match address {
        BusAddress::I2c { .. } => DeviceKind::I2c,
        BusAddress::Spi { .. } => DeviceKind::Spi,
    }
}

impl Drop for DeviceFactory {
    fn drop(&mut self) {
        if self.state() != FactoryState::Shutdown {
            self.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use boardkit_board::builtin;
    use boardkit_native::sim::{SimulatedBus, SimulatedSoc};
    use boardkit_native::{BroadcomGpio, NativeError, BCM2835};
    use std::time::Duration;

    struct Rig {
        factory: Arc<DeviceFactory>,
        soc: SimulatedSoc,
        bus: SimulatedBus,
    }

    fn rig(board: BoardInfo) -> Rig {
        let soc = SimulatedSoc::new(&BCM2835);
        let bus = SimulatedBus::new();
        let gpio = BroadcomGpio::new(soc.clone(), &BCM2835).with_settle_delay(Duration::ZERO);
        let factory = DeviceFactory::new(
            board,
            Arc::new(gpio),
            Arc::new(bus.clone()),
            FactoryOptions::default(),
        )
        .unwrap();
        Rig { factory, soc, bus }
    }

    #[test]
    fn test_lifecycle_states() {
        let rig = rig(builtin::raspberry_pi_40pin());
        assert_eq!(rig.factory.state(), FactoryState::Unstarted);
        assert_eq!(rig.soc.map_count(), 0);

        let pin = rig.factory.provision_digital_output(17, false).unwrap();
        assert_eq!(rig.factory.state(), FactoryState::Started);
        assert_eq!(rig.soc.map_count(), 1);
        drop(pin);

        rig.factory.shutdown();
        assert_eq!(rig.factory.state(), FactoryState::Shutdown);
        assert!(matches!(
            rig.factory.provision_digital_input(4, PullUpDown::None),
            Err(DeviceError::FactoryShutdown)
        ));
    }

    #[test]
    fn test_unsupported_mode_rejected_before_native_call() {
        let rig = rig(builtin::raspberry_pi_40pin());
        let err = rig
            .factory
            .provision_digital_pin(17, DeviceMode::SoftwarePwmOutput, PullUpDown::None)
            .unwrap_err();
        assert!(matches!(err, DeviceError::UnsupportedMode { .. }));

        // Board allows PWM on 18, but the register backend does not
        let err = rig
            .factory
            .provision_digital_pin(18, DeviceMode::SoftwarePwmOutput, PullUpDown::None)
            .unwrap_err();
        assert!(matches!(err, DeviceError::UnsupportedMode { .. }));
        assert_eq!(rig.soc.map_count(), 0);
        assert!(rig.soc.stores().is_empty());
    }

    #[test]
    fn test_unknown_pin_is_synthesised() {
        let rig = rig(builtin::generic());
        let pin = rig.factory.provision_digital_input(40, PullUpDown::PullUp).unwrap();
        assert!(pin.read().unwrap());
        assert!(matches!(
            rig.factory.provision_digital_input(60, PullUpDown::None),
            Err(DeviceError::Native(NativeError::PinOutOfRange { gpio: 60, .. }))
        ));
    }

    #[test]
    fn test_gpio_handle_operations() {
        let rig = rig(builtin::raspberry_pi_40pin());
        let out = rig.factory.provision_digital_output(18, true).unwrap();
        assert_eq!(out.mode().unwrap(), DeviceMode::DigitalOutput);
        assert!(out.read().unwrap());
        assert!(!out.toggle().unwrap());
        assert!(!rig.soc.output_latch(18));
        assert!(matches!(out.set_pull(PullUpDown::PullUp), Err(DeviceError::UnsupportedMode { .. })));

        let input = rig.factory.provision_digital_input(23, PullUpDown::PullDown).unwrap();
        assert!(!input.read().unwrap());
        input.set_pull(PullUpDown::PullUp).unwrap();
        assert!(input.read().unwrap());
        assert!(matches!(input.write(true), Err(DeviceError::UnsupportedMode { .. })));

        input.close();
        assert!(matches!(input.read(), Err(DeviceError::DeviceClosed(_))));
    }

    #[test]
    fn test_gpio_key_is_exclusive() {
        let rig = rig(builtin::raspberry_pi_40pin());
        let _pin = rig.factory.provision_digital_input(4, PullUpDown::None).unwrap();
        rig.soc.clear_stores();
        assert!(matches!(
            rig.factory.provision_digital_output(4, true),
            Err(DeviceError::AlreadyOpen(key)) if key == "gpio:4"
        ));
        assert!(rig.soc.stores().is_empty());
    }

    #[test]
    fn test_drop_closes_without_diagnostic() {
        let rig = rig(builtin::raspberry_pi_40pin());
        {
            let _device = rig.factory.provision_i2c_device(1, 0x20).unwrap();
            assert_eq!(rig.factory.registry().size(), 1);
        }
        assert_eq!(rig.factory.registry().size(), 0);
        assert_eq!(rig.bus.closes(BusAddress::i2c(1, 0x20)), 1);
        assert!(rig.factory.registry().diagnostics().is_empty());
    }

    #[test]
    fn test_invalid_i2c_address() {
        let rig = rig(builtin::generic());
        assert!(matches!(
            rig.factory.provision_i2c_device(1, 0x80),
            Err(DeviceError::InvalidBusAddress(_))
        ));
        assert_eq!(rig.bus.opens(BusAddress::i2c(1, 0x80)), 0);
    }

    #[test]
    fn test_bus_errors_surface_typed() {
        let rig = rig(builtin::generic());
        let address = BusAddress::i2c(1, 0x48);
        let device = rig.factory.provision_i2c_device(1, 0x48).unwrap();

        rig.bus.script(address, &[-11, -11, -11]);
        let err = device.write(&[0x01]).unwrap_err();
        assert!(err.is_transient());
        assert!(matches!(err, DeviceError::TransientBus { attempts: 3, .. }));

        rig.bus.script(address, &[-19]);
        assert!(matches!(
            device.write(&[0x01]),
            Err(DeviceError::FatalBus { errno: 19, attempts: 1, .. })
        ));
    }

    #[test]
    fn test_shutdown_idempotent() {
        let rig = rig(builtin::generic());
        let _a = rig.factory.provision_spi_device(0, 0).unwrap();
        let _b = rig.factory.provision_i2c_channel(1, 0x20, 0).unwrap();

        let report = rig.factory.shutdown();
        assert_eq!(report.closed, 3);
        assert!(report.is_clean());
        assert_eq!(rig.bus.open_descriptors(), 0);

        assert_eq!(rig.factory.shutdown(), ShutdownReport::default());
    }

    #[test]
    fn test_map_on_start_surfaces_mapping_error() {
        let soc = SimulatedSoc::new(&BCM2835);
        soc.fail_next_map(std::io::ErrorKind::PermissionDenied);
        let result = DeviceFactory::new(
            BoardInfo::unknown(),
            Arc::new(BroadcomGpio::new(soc, &BCM2835)),
            Arc::new(SimulatedBus::new()),
            FactoryOptions {
                map_on_start: true,
                ..Default::default()
            },
        );
        assert!(matches!(result, Err(DeviceError::NativeMapping(_))));
    }
}
