// Copyright 2025 boardkit contributors
// SPDX-License-Identifier: Apache-2.0

//! Per-pin capability records.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::DeviceMode;

/// Header name used when a table does not say otherwise
pub const DEFAULT_HEADER: &str = "DEFAULT";

/// Which numbering space a capability record belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PinKind {
    Gpio,
    Adc,
    Dac,
}

impl PinKind {
    /// Prefix used for synthesised pin names ("GPIO4", "AIN0", "AOUT1")
    pub fn name_prefix(self) -> &'static str {
        match self {
            PinKind::Gpio => "GPIO",
            PinKind::Adc => "AIN",
            PinKind::Dac => "AOUT",
        }
    }
}

/// Capability of a single pin
///
/// Immutable once the board table is built. `number` is the GPIO, ADC or DAC
/// number depending on `kind`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinCapability {
    pub kind: PinKind,
    pub number: u32,
    pub name: String,
    pub header: String,
    pub physical_pin: Option<u32>,
    pub modes: BTreeSet<DeviceMode>,
    pub adc_channel: Option<u32>,
    pub dac_channel: Option<u32>,
}

impl PinCapability {
    pub fn new(kind: PinKind, number: u32, modes: &[DeviceMode]) -> Self {
        Self {
            kind,
            number,
            name: format!("{}{}", kind.name_prefix(), number),
            header: DEFAULT_HEADER.to_string(),
            physical_pin: None,
            modes: modes.iter().copied().collect(),
            adc_channel: match kind {
                PinKind::Adc => Some(number),
                _ => None,
            },
            dac_channel: match kind {
                PinKind::Dac => Some(number),
                _ => None,
            },
        }
    }

    /// Record synthesised for a GPIO absent from the board table
    pub fn unknown_gpio(gpio: u32) -> Self {
        Self::new(PinKind::Gpio, gpio, DeviceMode::DIGITAL_IN_OUT)
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_physical(mut self, header: impl Into<String>, physical_pin: u32) -> Self {
        self.header = header.into();
        self.physical_pin = Some(physical_pin);
        self
    }

    pub fn supports(&self, mode: DeviceMode) -> bool {
        self.modes.contains(&mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_gpio_is_digital_in_out() {
        let pin = PinCapability::unknown_gpio(77);
        assert_eq!(pin.name, "GPIO77");
        assert!(pin.supports(DeviceMode::DigitalInput));
        assert!(pin.supports(DeviceMode::DigitalOutput));
        assert!(!pin.supports(DeviceMode::SoftwarePwmOutput));
        assert_eq!(pin.physical_pin, None);
    }

    #[test]
    fn test_adc_record_carries_channel() {
        let pin = PinCapability::new(PinKind::Adc, 2, &[DeviceMode::AnalogInput]);
        assert_eq!(pin.name, "AIN2");
        assert_eq!(pin.adc_channel, Some(2));
        assert_eq!(pin.dac_channel, None);
    }
}
