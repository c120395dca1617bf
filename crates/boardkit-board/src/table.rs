// Copyright 2025 boardkit contributors
// SPDX-License-Identifier: Apache-2.0

//! TOML board tables
//!
//! Boards that are not built in can be described in a file:
//!
//! ```toml
//! make = "Acme"
//! model = "Tiny"
//! memory_kb = 524288
//!
//! [[pins]]
//! gpio = 4
//! physical = 7
//! modes = ["digital_input", "digital_output"]
//!
//! [[pins]]
//! adc = 0
//! name = "AIN0"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::pin::{PinCapability, PinKind, DEFAULT_HEADER};
use crate::{BoardError, BoardInfo, DeviceMode, Result};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BoardTable {
    pub make: String,
    pub model: String,
    #[serde(default)]
    pub memory_kb: u32,
    #[serde(default)]
    pub adc_vref: Option<f32>,
    #[serde(default)]
    pub pins: Vec<PinEntry>,
}

/// One `[[pins]]` entry; exactly one of `gpio`, `adc`, `dac` must be set
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct PinEntry {
    pub gpio: Option<u32>,
    pub adc: Option<u32>,
    pub dac: Option<u32>,
    pub name: Option<String>,
    pub header: Option<String>,
    pub physical: Option<u32>,
    pub modes: Vec<DeviceMode>,
}

impl PinEntry {
    fn into_capability(self, index: usize) -> Result<PinCapability> {
        let (kind, number, default_modes): (PinKind, u32, &[DeviceMode]) =
            match (self.gpio, self.adc, self.dac) {
                (Some(gpio), None, None) => (PinKind::Gpio, gpio, DeviceMode::DIGITAL_IN_OUT),
                (None, Some(adc), None) => (PinKind::Adc, adc, &[DeviceMode::AnalogInput]),
                (None, None, Some(dac)) => (PinKind::Dac, dac, &[DeviceMode::AnalogOutput]),
                _ => {
                    return Err(BoardError::InvalidTable(format!(
                        "pins[{}]: exactly one of gpio, adc, dac must be set",
                        index
                    )))
                }
            };

        let modes: &[DeviceMode] = if self.modes.is_empty() {
            default_modes
        } else {
            &self.modes
        };
        let mut pin = PinCapability::new(kind, number, modes);
        if let Some(name) = self.name {
            pin = pin.with_name(name);
        }
        if let Some(physical) = self.physical {
            pin = pin.with_physical(self.header.unwrap_or_else(|| DEFAULT_HEADER.to_string()), physical);
        }
        Ok(pin)
    }
}

impl BoardTable {
    pub fn into_board_info(self) -> Result<BoardInfo> {
        let mut board = BoardInfo::new(self.make, self.model, self.memory_kb);
        if let Some(vref) = self.adc_vref {
            board = board.with_adc_vref(vref);
        }
        for (index, entry) in self.pins.into_iter().enumerate() {
            board.add_pin(entry.into_capability(index)?);
        }
        Ok(board)
    }
}

impl BoardInfo {
    pub fn from_toml_str(content: &str) -> Result<BoardInfo> {
        let table: BoardTable = toml::from_str(content)?;
        table.into_board_info()
    }

    pub fn from_toml_file(path: &Path) -> Result<BoardInfo> {
        let content = std::fs::read_to_string(path)?;
        let board = Self::from_toml_str(&content)?;
        tracing::info!("[BOARD] Loaded board table {} from {}", board.name(), path.display());
        Ok(board)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const TABLE: &str = r#"
make = "Acme"
model = "Tiny"
memory_kb = 1024
adc_vref = 3.3

[[pins]]
gpio = 4
physical = 7
header = "P1"
modes = ["digital_input", "digital_output", "software_pwm_output"]

[[pins]]
gpio = 5

[[pins]]
adc = 0
name = "VSENSE"
"#;

    #[test]
    fn test_parse_table() {
        let board = BoardInfo::from_toml_str(TABLE).unwrap();
        assert_eq!(board.name(), "Acme Tiny");
        assert_eq!(board.adc_vref(), 3.3);
        assert!(board.by_gpio(4).unwrap().supports(DeviceMode::SoftwarePwmOutput));
        assert!(board.by_gpio(5).unwrap().supports(DeviceMode::DigitalInput));
        assert_eq!(board.by_physical("P1", 7).unwrap().number, 4);
        assert_eq!(board.by_name("VSENSE").unwrap().adc_channel, Some(0));
    }

    #[test]
    fn test_ambiguous_pin_rejected() {
        let content = "make = \"A\"\nmodel = \"B\"\n[[pins]]\ngpio = 1\nadc = 1\n";
        assert!(matches!(
            BoardInfo::from_toml_str(content),
            Err(BoardError::InvalidTable(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(TABLE.as_bytes()).unwrap();
        let board = BoardInfo::from_toml_file(file.path()).unwrap();
        assert_eq!(board.memory_kb(), 1024);
    }
}
