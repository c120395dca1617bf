// Copyright 2025 boardkit contributors
// SPDX-License-Identifier: Apache-2.0

//! Device modes and pull resistor settings shared by every layer.

use serde::{Deserialize, Serialize};

/// Operating mode of a pin or logical device
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceMode {
    DigitalInput,
    DigitalOutput,
    SoftwarePwmOutput,
    AnalogInput,
    AnalogOutput,
    /// Hardware reports a function this runtime does not model (e.g. an ALT function)
    Unsupported,
}

impl DeviceMode {
    /// Digital input + output, the capability of any pin absent from a board table
    pub const DIGITAL_IN_OUT: &'static [DeviceMode] =
        &[DeviceMode::DigitalInput, DeviceMode::DigitalOutput];

    /// Digital input + output + software PWM
    pub const DIGITAL_IN_OUT_PWM: &'static [DeviceMode] = &[
        DeviceMode::DigitalInput,
        DeviceMode::DigitalOutput,
        DeviceMode::SoftwarePwmOutput,
    ];

    pub fn is_digital(self) -> bool {
        matches!(self, DeviceMode::DigitalInput | DeviceMode::DigitalOutput)
    }
}

impl std::fmt::Display for DeviceMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceMode::DigitalInput => write!(f, "digital_input"),
            DeviceMode::DigitalOutput => write!(f, "digital_output"),
            DeviceMode::SoftwarePwmOutput => write!(f, "software_pwm_output"),
            DeviceMode::AnalogInput => write!(f, "analog_input"),
            DeviceMode::AnalogOutput => write!(f, "analog_output"),
            DeviceMode::Unsupported => write!(f, "unsupported"),
        }
    }
}

impl std::str::FromStr for DeviceMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "digital_input" | "input" => Ok(DeviceMode::DigitalInput),
            "digital_output" | "output" => Ok(DeviceMode::DigitalOutput),
            "software_pwm_output" | "pwm" => Ok(DeviceMode::SoftwarePwmOutput),
            "analog_input" => Ok(DeviceMode::AnalogInput),
            "analog_output" => Ok(DeviceMode::AnalogOutput),
            _ => Err(format!("Invalid device mode: {}", s)),
        }
    }
}

/// Internal pull resistor selection for an input pin
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PullUpDown {
    #[default]
    None,
    PullUp,
    PullDown,
}

impl std::fmt::Display for PullUpDown {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PullUpDown::None => write!(f, "none"),
            PullUpDown::PullUp => write!(f, "pull_up"),
            PullUpDown::PullDown => write!(f, "pull_down"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parse_aliases() {
        assert_eq!("input".parse::<DeviceMode>().unwrap(), DeviceMode::DigitalInput);
        assert_eq!("PWM".parse::<DeviceMode>().unwrap(), DeviceMode::SoftwarePwmOutput);
        assert!("alt0".parse::<DeviceMode>().is_err());
    }

    #[test]
    fn test_is_digital() {
        assert!(DeviceMode::DigitalOutput.is_digital());
        assert!(!DeviceMode::AnalogInput.is_digital());
        assert!(!DeviceMode::Unsupported.is_digital());
    }
}
