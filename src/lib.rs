// Copyright 2025 boardkit contributors
// SPDX-License-Identifier: Apache-2.0

//! # boardkit
//!
//! Hardware-abstraction runtime for single-board computers. Drivers ask a
//! [`DeviceFactory`](device::DeviceFactory) for GPIO pins and I2C/SPI
//! devices; the factory checks the board's capability table, opens the
//! native resource and records exclusive ownership in a registry until the
//! handle is closed or the factory shuts down.
//!
//! ## Feature Flags
//!
//! - **`config`** (default): `boardkit.toml` loading and `DeviceFactory::from_config`
//! - **`observability`** (default): logging initialisation with per-crate debug flags
//! - **`file-logging`**: daily-rotated log files
//!
//! ## Usage
//!
//! ```rust,no_run
//! use boardkit::prelude::*;
//!
//! let config = boardkit::config::load_config(None, None)?;
//! let factory = DeviceFactory::from_config(&config)?;
//!
//! let led = factory.provision_digital_output(17, false)?;
//! led.write(true)?;
//!
//! let expander = factory.provision_i2c_device(1, 0x20)?;
//! let mut port = [0u8; 1];
//! expander.write_read(&[0x09], &mut port)?;
//!
//! factory.shutdown();
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! Without hardware, select the simulated backends:
//!
//! ```rust
//! use std::sync::Arc;
//! use boardkit::prelude::*;
//! use boardkit::native::sim::{SimulatedBus, SimulatedSoc};
//!
//! let soc = SimulatedSoc::new(&BCM2835);
//! let factory = DeviceFactory::new(
//!     builtin::raspberry_pi_40pin(),
//!     Arc::new(BroadcomGpio::new(soc, &BCM2835)),
//!     Arc::new(SimulatedBus::new()),
//!     FactoryOptions::default(),
//! )?;
//! let button = factory.provision_digital_input(4, PullUpDown::PullUp)?;
//! assert!(button.read()?);
//! # Ok::<(), boardkit::device::DeviceError>(())
//! ```

pub use boardkit_board as board;
pub use boardkit_device as device;
pub use boardkit_native as native;

#[cfg(feature = "config")]
pub use boardkit_config as config;

#[cfg(feature = "observability")]
pub use boardkit_observability as observability;

/// Prelude - commonly used types and traits
pub mod prelude {
    pub use crate::board::{builtin, BoardInfo, DeviceMode, PinCapability, PullUpDown};
    pub use crate::device::{
        BusChannel, BusDevice, CloseOutcome, DeviceError, DeviceFactory, DeviceRegistry,
        FactoryOptions, FactoryState, GpioPin, ShutdownReport,
    };
    pub use crate::native::{
        BroadcomGpio, BusAddress, BusConfig, BusIo, DevMemSource, I2cConfig, RegisterIo,
        RetryPolicy, SpiConfig, SpiMode, Transfer, BCM2711, BCM2835,
    };

    #[cfg(feature = "config")]
    pub use crate::config::BoardkitConfig;

    #[cfg(feature = "observability")]
    pub use crate::observability::{init_logging, CrateDebugFlags, LoggingGuard};
}
