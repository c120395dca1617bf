// Copyright 2025 boardkit contributors
// SPDX-License-Identifier: Apache-2.0

//! Configuration validation
//!
//! Every rule is checked and all violations are reported together.

use crate::{BoardkitConfig, ConfigError, ConfigResult};

/// Register windows are mapped at page granularity
const PAGE_SIZE: u64 = 4096;

/// Validation errors that can occur during config validation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValidationError {
    MissingRequired { field: String },
    InvalidValue { field: String, reason: String },
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingRequired { field } => {
                write!(f, "Missing required configuration: {}", field)
            }
            Self::InvalidValue { field, reason } => {
                write!(f, "Invalid configuration value for {}: {}", field, reason)
            }
        }
    }
}

fn invalid(errors: &mut Vec<ConfigValidationError>, field: &str, reason: impl Into<String>) {
    errors.push(ConfigValidationError::InvalidValue {
        field: field.to_string(),
        reason: reason.into(),
    });
}

/// Validate the complete configuration
///
/// # Errors
///
/// Returns `ConfigError::ValidationError` listing every violation
pub fn validate_config(config: &BoardkitConfig) -> ConfigResult<()> {
    let errors = collect_errors(config);
    if errors.is_empty() {
        return Ok(());
    }

    let error_messages = errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n");

    Err(ConfigError::ValidationError(format!(
        "Configuration validation failed:\n{}",
        error_messages
    )))
}

/// Every violation in `config`, in section order
pub fn collect_errors(config: &BoardkitConfig) -> Vec<ConfigValidationError> {
    let mut errors = Vec::new();
    validate_board(config, &mut errors);
    validate_gpio(config, &mut errors);
    validate_bus(config, &mut errors);
    errors
}

fn validate_board(config: &BoardkitConfig, errors: &mut Vec<ConfigValidationError>) {
    if config.board.name.trim().is_empty() && config.board.table_path.is_none() {
        errors.push(ConfigValidationError::MissingRequired {
            field: "board.name".to_string(),
        });
    }
}

fn validate_gpio(config: &BoardkitConfig, errors: &mut Vec<ConfigValidationError>) {
    let gpio = &config.gpio;
    if gpio.length == 0 || gpio.length % 4 != 0 {
        invalid(errors, "gpio.length", format!("{} is not a non-zero multiple of 4", gpio.length));
    }
    if gpio.offset % PAGE_SIZE != 0 {
        invalid(
            errors,
            "gpio.offset",
            format!("{:#x} is not aligned to {} bytes", gpio.offset, PAGE_SIZE),
        );
    }
    if gpio.settle_delay_us == 0 {
        invalid(errors, "gpio.settle_delay_us", "must be greater than 0");
    }
    if !matches!(
        gpio.layout.to_lowercase().as_str(),
        "bcm2835" | "bcm2836" | "bcm2837" | "bcm2711"
    ) {
        invalid(errors, "gpio.layout", format!("unknown register layout '{}'", gpio.layout));
    }
}

fn validate_bus(config: &BoardkitConfig, errors: &mut Vec<ConfigValidationError>) {
    let bus = &config.bus;
    if bus.retry_budget < 1 {
        invalid(errors, "bus.retry_budget", "must allow at least one attempt");
    }
    if bus.i2c_frequency_hz == 0 {
        invalid(errors, "bus.i2c_frequency_hz", "must be non-zero");
    }
    if bus.spi_frequency_hz == 0 {
        invalid(errors, "bus.spi_frequency_hz", "must be non-zero");
    }
    if bus.spi_mode > 3 {
        invalid(errors, "bus.spi_mode", format!("{} is not in 0..=3", bus.spi_mode));
    }
    if !(1..=32).contains(&bus.spi_bits_per_word) {
        invalid(
            errors,
            "bus.spi_bits_per_word",
            format!("{} is not in 1..=32", bus.spi_bits_per_word),
        );
    }
}
