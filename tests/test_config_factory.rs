// Copyright 2025 boardkit contributors
// SPDX-License-Identifier: Apache-2.0

//! From `boardkit.toml` to a working factory.

use std::collections::HashMap;
use std::io::Write;

use boardkit::config::{load_config, BusBackendKind, GpioBackendKind};
use boardkit::prelude::*;

fn write_config(dir: &tempfile::TempDir, content: &str) -> std::path::PathBuf {
    let path = dir.path().join("boardkit.toml");
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(content.as_bytes()).unwrap();
    path
}

#[test]
fn test_simulated_factory_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        &dir,
        r#"
[board]
name = "raspberrypi-40pin"

[gpio]
backend = "simulated"
layout = "bcm2711"

[bus]
backend = "simulated"
retry_budget = 2
"#,
    );

    let config = load_config(Some(&path), None).unwrap();
    assert_eq!(config.gpio.backend, GpioBackendKind::Simulated);
    assert_eq!(config.bus.backend, BusBackendKind::Simulated);

    let factory = DeviceFactory::from_config(&config).unwrap();
    assert_eq!(factory.gpio_backend_name(), "bcm2711-simulated");
    assert_eq!(factory.options().retry.budget(), 2);

    let input = factory.provision_digital_input(23, PullUpDown::PullDown).unwrap();
    assert!(!input.read().unwrap());
    let output = factory.provision_digital_output(24, true).unwrap();
    assert!(output.read().unwrap());

    let report = factory.shutdown();
    assert_eq!(report.closed, 2);
}

#[test]
fn test_cli_override_selects_backend() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "[gpio]\nbackend = \"simulated\"\n");

    let mut cli_args = HashMap::new();
    cli_args.insert("bus_backend".to_string(), "simulated".to_string());
    cli_args.insert("board".to_string(), "generic".to_string());
    let config = load_config(Some(&path), Some(&cli_args)).unwrap();

    let factory = DeviceFactory::from_config(&config).unwrap();
    assert_eq!(factory.bus_backend_name(), "simulated");
    assert_eq!(factory.board().model(), "Linux");
    // Generic board synthesises any pin as digital in/out
    factory.provision_digital_output(45, false).unwrap();
}

#[test]
fn test_invalid_file_reports_every_violation() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(&dir, "[bus]\nretry_budget = 0\nspi_mode = 7\n");
    let config = load_config(Some(&path), None).unwrap();

    let err = boardkit::config::validate_config(&config).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("bus.retry_budget"));
    assert!(message.contains("bus.spi_mode"));

    assert!(DeviceFactory::from_config(&config).is_err());
}
