// Copyright 2025 boardkit contributors
// SPDX-License-Identifier: Apache-2.0

//! Configuration type definitions
//!
//! Each struct maps to one section of `boardkit.toml`. Every section is
//! optional; missing keys take the defaults below.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BoardkitConfig {
    pub system: SystemConfig,
    pub board: BoardConfig,
    pub gpio: GpioConfig,
    pub bus: BusConfig,
    pub logging: LoggingConfig,
}

/// System-level configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SystemConfig {
    pub log_level: String,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Board capability table selection
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BoardConfig {
    /// Built-in board id
    pub name: String,
    /// TOML pin table; takes precedence over `name`
    pub table_path: Option<PathBuf>,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            name: "raspberrypi-40pin".to_string(),
            table_path: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GpioBackendKind {
    /// Memory-mapped Broadcom register file
    #[default]
    Mmap,
    /// In-process register model, no hardware
    Simulated,
}

impl std::fmt::Display for GpioBackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GpioBackendKind::Mmap => write!(f, "mmap"),
            GpioBackendKind::Simulated => write!(f, "simulated"),
        }
    }
}

impl FromStr for GpioBackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mmap" => Ok(GpioBackendKind::Mmap),
            "simulated" | "sim" => Ok(GpioBackendKind::Simulated),
            other => Err(format!("unknown GPIO backend '{}'", other)),
        }
    }
}

/// Native GPIO backend configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct GpioConfig {
    pub backend: GpioBackendKind,
    /// Register layout: `bcm2835` (also 2836/2837) or `bcm2711`
    pub layout: String,
    pub device_path: PathBuf,
    pub offset: u64,
    pub length: usize,
    /// Busy-wait between pull-up/down register steps
    pub settle_delay_us: u64,
    /// Map the register file when the factory is built instead of on first use
    pub map_on_start: bool,
}

impl Default for GpioConfig {
    fn default() -> Self {
        Self {
            backend: GpioBackendKind::Mmap,
            layout: "bcm2835".to_string(),
            device_path: PathBuf::from("/dev/gpiomem"),
            offset: 0,
            length: 4096,
            settle_delay_us: 1,
            map_on_start: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BusBackendKind {
    /// `/dev/i2c-N` and `/dev/spidevN.M`
    #[default]
    Linux,
    Simulated,
}

impl std::fmt::Display for BusBackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BusBackendKind::Linux => write!(f, "linux"),
            BusBackendKind::Simulated => write!(f, "simulated"),
        }
    }
}

impl FromStr for BusBackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "linux" => Ok(BusBackendKind::Linux),
            "simulated" | "sim" => Ok(BusBackendKind::Simulated),
            other => Err(format!("unknown bus backend '{}'", other)),
        }
    }
}

/// I2C/SPI backend configuration and per-device defaults
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct BusConfig {
    pub backend: BusBackendKind,
    /// Attempts per transfer, including the first
    pub retry_budget: u32,
    pub i2c_frequency_hz: u32,
    pub i2c_force_address: bool,
    pub spi_frequency_hz: u32,
    pub spi_mode: u8,
    pub spi_bits_per_word: u8,
    pub spi_lsb_first: bool,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            backend: BusBackendKind::Linux,
            retry_budget: 3,
            i2c_frequency_hz: 100_000,
            i2c_force_address: false,
            spi_frequency_hz: 2_000_000,
            spi_mode: 0,
            spi_bits_per_word: 8,
            spi_lsb_first: false,
        }
    }
}

/// Log output configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub directory: PathBuf,
    pub file_logging: bool,
    pub retention_days: u64,
    pub retention_runs: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("./logs"),
            file_logging: false,
            retention_days: 30,
            retention_runs: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_takes_defaults() {
        let config: BoardkitConfig = toml::from_str("").unwrap();
        assert_eq!(config, BoardkitConfig::default());
        assert_eq!(config.gpio.device_path, PathBuf::from("/dev/gpiomem"));
        assert_eq!(config.bus.retry_budget, 3);
    }

    #[test]
    fn test_partial_sections() {
        let config: BoardkitConfig = toml::from_str(
            r#"
            [board]
            name = "generic"

            [gpio]
            backend = "simulated"
            layout = "bcm2711"

            [bus]
            backend = "simulated"
            spi_mode = 3
            "#,
        )
        .unwrap();
        assert_eq!(config.board.name, "generic");
        assert_eq!(config.gpio.backend, GpioBackendKind::Simulated);
        assert_eq!(config.gpio.layout, "bcm2711");
        assert_eq!(config.gpio.length, 4096);
        assert_eq!(config.bus.backend, BusBackendKind::Simulated);
        assert_eq!(config.bus.spi_mode, 3);
        assert_eq!(config.bus.spi_frequency_hz, 2_000_000);
    }

    #[test]
    fn test_unknown_backend_rejected() {
        let result = toml::from_str::<BoardkitConfig>("[gpio]\nbackend = \"sysfs\"");
        assert!(result.is_err());
    }

    #[test]
    fn test_backend_names_round_trip_through_display() {
        for kind in [GpioBackendKind::Mmap, GpioBackendKind::Simulated] {
            assert_eq!(kind.to_string().parse::<GpioBackendKind>().unwrap(), kind);
        }
        assert_eq!("SIM".parse::<BusBackendKind>().unwrap(), BusBackendKind::Simulated);
        assert!("i3c".parse::<BusBackendKind>().is_err());
    }

    #[test]
    fn test_serializes_to_json() {
        let json = serde_json::to_value(BoardkitConfig::default()).unwrap();
        assert_eq!(json["gpio"]["backend"], "mmap");
        assert_eq!(json["bus"]["backend"], "linux");
    }
}
