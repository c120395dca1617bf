// Copyright 2025 boardkit contributors
// SPDX-License-Identifier: Apache-2.0

//! Building a [`DeviceFactory`] from `boardkit.toml`.

use std::sync::Arc;
use std::time::Duration;

use boardkit_board::{builtin, BoardInfo};
use boardkit_config::{BoardkitConfig, BusBackendKind, GpioBackendKind};
use boardkit_native::sim::{SimulatedBus, SimulatedSoc};
use boardkit_native::{
    BcmLayout, BroadcomGpio, BusIo, DevMemSource, I2cConfig, NativeError, RegisterIo,
    RetryPolicy, SpiConfig, SpiMode,
};
use tracing::info;

use crate::factory::{DeviceFactory, FactoryOptions};
use crate::Result;

fn resolve_board(config: &BoardkitConfig) -> Result<BoardInfo> {
    match &config.board.table_path {
        Some(path) => Ok(BoardInfo::from_toml_file(path)?),
        None => Ok(builtin::by_name(&config.board.name)?),
    }
}

fn gpio_backend(config: &BoardkitConfig) -> Result<Arc<dyn RegisterIo>> {
    let gpio = &config.gpio;
    let layout = BcmLayout::for_name(&gpio.layout)
        .ok_or_else(|| NativeError::Config(format!("unknown register layout '{}'", gpio.layout)))?;
    let settle = Duration::from_micros(gpio.settle_delay_us);
    Ok(match gpio.backend {
        GpioBackendKind::Mmap => {
            let source = DevMemSource::new(&gpio.device_path, gpio.offset, gpio.length);
            Arc::new(BroadcomGpio::new(source, layout).with_settle_delay(settle))
        }
        GpioBackendKind::Simulated => {
            let gpio = BroadcomGpio::new(SimulatedSoc::new(layout), layout)
                .with_name(format!("{}-simulated", layout.name))
                .with_settle_delay(settle);
            Arc::new(gpio)
        }
    })
}

fn bus_backend(config: &BoardkitConfig) -> Result<Arc<dyn BusIo>> {
    match config.bus.backend {
        #[cfg(target_os = "linux")]
        BusBackendKind::Linux => Ok(Arc::new(boardkit_native::LinuxBus::new())),
        #[cfg(not(target_os = "linux"))]
        BusBackendKind::Linux => {
            Err(NativeError::Config("the linux bus backend needs a Linux host".to_string()).into())
        }
        BusBackendKind::Simulated => Ok(Arc::new(SimulatedBus::new())),
    }
}

fn factory_options(config: &BoardkitConfig) -> Result<FactoryOptions> {
    let bus = &config.bus;
    Ok(FactoryOptions {
        retry: RetryPolicy::new(bus.retry_budget),
        i2c: I2cConfig {
            frequency_hz: bus.i2c_frequency_hz,
            force_address: bus.i2c_force_address,
        },
        spi: SpiConfig {
            frequency_hz: bus.spi_frequency_hz,
            mode: SpiMode::try_from(bus.spi_mode)?,
            bits_per_word: bus.spi_bits_per_word,
            lsb_first: bus.spi_lsb_first,
        },
        map_on_start: config.gpio.map_on_start,
    })
}

impl DeviceFactory {
    /// Build a factory from a loaded configuration
    ///
    /// The configuration is validated first. With `gpio.map_on_start` the
    /// register file is mapped here and a mapping failure is returned.
    pub fn from_config(config: &BoardkitConfig) -> Result<Arc<Self>> {
        boardkit_config::validate_config(config).map_err(|e| NativeError::Config(e.to_string()))?;

        let board = resolve_board(config)?;
        let gpio = gpio_backend(config)?;
        let bus = bus_backend(config)?;
        let options = factory_options(config)?;
        info!(
            "[FACTORY] Configured from file: board {}, gpio backend {}, bus backend {}",
            board.name(),
            config.gpio.backend,
            config.bus.backend
        );
        Self::new(board, gpio, bus, options)
    }
}
