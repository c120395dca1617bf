// Copyright 2025 boardkit contributors
// SPDX-License-Identifier: Apache-2.0

//! Configuration file loading with override support
//!
//! Three tiers, later tiers win:
//! 1. TOML file (base values)
//! 2. Environment variables (runtime overrides)
//! 3. CLI arguments (explicit user overrides)

use crate::{BoardkitConfig, ConfigError, ConfigResult, CONFIG_FILE_NAME};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit config file
pub const CONFIG_PATH_ENV: &str = "BOARDKIT_CONFIG_PATH";

/// Find the boardkit configuration file
///
/// Search order:
/// 1. `BOARDKIT_CONFIG_PATH` environment variable
/// 2. Current working directory: `./boardkit.toml`
/// 3. Up to 5 parent directories
///
/// # Errors
///
/// Returns `ConfigError::FileNotFound` if no config file is found in any location
pub fn find_config_file() -> ConfigResult<PathBuf> {
    if let Ok(env_path) = env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        }
        return Err(ConfigError::FileNotFound(format!(
            "Config file specified by {} not found: {}",
            CONFIG_PATH_ENV,
            path.display()
        )));
    }

    let mut search_paths = Vec::new();
    if let Ok(cwd) = env::current_dir() {
        search_paths.push(cwd.join(CONFIG_FILE_NAME));
        let mut current = cwd.as_path();
        for _ in 0..5 {
            match current.parent() {
                Some(parent) => {
                    search_paths.push(parent.join(CONFIG_FILE_NAME));
                    current = parent;
                }
                None => break,
            }
        }
    }

    if let Some(path) = search_paths.iter().find(|p| p.exists()) {
        return Ok(path.clone());
    }

    let search_list = search_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    Err(ConfigError::FileNotFound(format!(
        "'{}' not found in any of these locations:\n{}\n\nSet {} to specify a custom location.",
        CONFIG_FILE_NAME, search_list, CONFIG_PATH_ENV
    )))
}

/// Load configuration from a TOML file and apply overrides
///
/// # Arguments
///
/// * `config_path` - Path to the config file. If `None`, [`find_config_file`] is used.
/// * `cli_args` - Optional CLI argument overrides
///
/// # Errors
///
/// Returns error if the config file is missing, unreadable or not valid TOML.
/// Validation is separate; see [`crate::validate_config`].
pub fn load_config(
    config_path: Option<&Path>,
    cli_args: Option<&HashMap<String, String>>,
) -> ConfigResult<BoardkitConfig> {
    let config_file = match config_path {
        Some(path) => path.to_path_buf(),
        None => find_config_file()?,
    };

    let content = fs::read_to_string(&config_file)?;
    let mut config: BoardkitConfig = toml::from_str(&content)?;

    apply_environment_overrides(&mut config);
    if let Some(cli) = cli_args {
        apply_cli_overrides(&mut config, cli);
    }

    Ok(config)
}

fn parse_bool(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "1" | "yes")
}

/// Apply environment variable overrides to configuration
///
/// Supported environment variables:
/// - `BOARDKIT_LOG_LEVEL` -> `system.log_level`
/// - `BOARDKIT_BOARD` -> `board.name`
/// - `BOARDKIT_GPIO_BACKEND` -> `gpio.backend`
/// - `BOARDKIT_GPIO_DEVICE` -> `gpio.device_path`
/// - `BOARDKIT_GPIO_SETTLE_US` -> `gpio.settle_delay_us`
/// - `BOARDKIT_GPIO_MAP_ON_START` -> `gpio.map_on_start`
/// - `BOARDKIT_BUS_BACKEND` -> `bus.backend`
/// - `BOARDKIT_BUS_RETRY_BUDGET` -> `bus.retry_budget`
///
/// Unparseable values are ignored.
pub fn apply_environment_overrides(config: &mut BoardkitConfig) {
    if let Ok(value) = env::var("BOARDKIT_LOG_LEVEL") {
        config.system.log_level = value;
    }
    if let Ok(value) = env::var("BOARDKIT_BOARD") {
        config.board.name = value;
    }

    if let Ok(value) = env::var("BOARDKIT_GPIO_BACKEND") {
        if let Ok(backend) = value.parse() {
            config.gpio.backend = backend;
        }
    }
    if let Ok(value) = env::var("BOARDKIT_GPIO_DEVICE") {
        config.gpio.device_path = PathBuf::from(value);
    }
    if let Ok(value) = env::var("BOARDKIT_GPIO_SETTLE_US") {
        if let Ok(us) = value.parse::<u64>() {
            config.gpio.settle_delay_us = us;
        }
    }
    if let Ok(value) = env::var("BOARDKIT_GPIO_MAP_ON_START") {
        config.gpio.map_on_start = parse_bool(&value);
    }

    if let Ok(value) = env::var("BOARDKIT_BUS_BACKEND") {
        if let Ok(backend) = value.parse() {
            config.bus.backend = backend;
        }
    }
    if let Ok(value) = env::var("BOARDKIT_BUS_RETRY_BUDGET") {
        if let Ok(budget) = value.parse::<u32>() {
            config.bus.retry_budget = budget;
        }
    }
}

/// Apply CLI argument overrides to configuration
///
/// # Arguments
///
/// * `config` - Configuration to modify
/// * `cli_args` - e.g. `{"board": "generic", "retry_budget": "5"}`
pub fn apply_cli_overrides(config: &mut BoardkitConfig, cli_args: &HashMap<String, String>) {
    if let Some(value) = cli_args.get("log_level") {
        config.system.log_level = value.clone();
    }
    if let Some(value) = cli_args.get("board") {
        config.board.name = value.clone();
    }
    if let Some(value) = cli_args.get("board_table") {
        config.board.table_path = Some(PathBuf::from(value));
    }

    if let Some(value) = cli_args.get("gpio_backend") {
        if let Ok(backend) = value.parse() {
            config.gpio.backend = backend;
        }
    }
    if let Some(value) = cli_args.get("gpio_device") {
        config.gpio.device_path = PathBuf::from(value);
    }
    if let Some(value) = cli_args.get("settle_delay_us") {
        if let Ok(us) = value.parse::<u64>() {
            config.gpio.settle_delay_us = us;
        }
    }

    if let Some(value) = cli_args.get("bus_backend") {
        if let Ok(backend) = value.parse() {
            config.bus.backend = backend;
        }
    }
    if let Some(value) = cli_args.get("retry_budget") {
        if let Ok(budget) = value.parse::<u32>() {
            config.bus.retry_budget = budget;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BusBackendKind, GpioBackendKind};
    use std::fs::File;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::tempdir;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    const OVERRIDE_VARS: &[&str] = &[
        "BOARDKIT_LOG_LEVEL",
        "BOARDKIT_BOARD",
        "BOARDKIT_GPIO_BACKEND",
        "BOARDKIT_GPIO_DEVICE",
        "BOARDKIT_GPIO_SETTLE_US",
        "BOARDKIT_GPIO_MAP_ON_START",
        "BOARDKIT_BUS_BACKEND",
        "BOARDKIT_BUS_RETRY_BUDGET",
    ];

    fn clear_override_vars() {
        for var in OVERRIDE_VARS {
            env::remove_var(var);
        }
    }

    #[test]
    fn test_find_config_file_env_var() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("custom.toml");
        File::create(&config_path).unwrap();

        env::set_var(CONFIG_PATH_ENV, config_path.to_str().unwrap());
        let result = find_config_file();
        env::remove_var(CONFIG_PATH_ENV);

        assert_eq!(result.unwrap(), config_path);
    }

    #[test]
    fn test_find_config_file_env_var_missing() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("absent.toml");

        env::set_var(CONFIG_PATH_ENV, config_path.to_str().unwrap());
        let result = find_config_file();
        env::remove_var(CONFIG_PATH_ENV);

        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_minimal_config() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        clear_override_vars();
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);

        let mut file = File::create(&config_path).unwrap();
        writeln!(file, "[gpio]").unwrap();
        writeln!(file, "backend = \"simulated\"").unwrap();
        writeln!(file, "settle_delay_us = 5").unwrap();
        writeln!(file, "[bus]").unwrap();
        writeln!(file, "retry_budget = 4").unwrap();

        let config = load_config(Some(&config_path), None).unwrap();

        assert_eq!(config.gpio.backend, GpioBackendKind::Simulated);
        assert_eq!(config.gpio.settle_delay_us, 5);
        assert_eq!(config.bus.retry_budget, 4);
        assert_eq!(config.board.name, "raspberrypi-40pin");
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempdir().unwrap();
        let result = load_config(Some(&dir.path().join("nope.toml")), None);
        assert!(matches!(result, Err(ConfigError::IoError(_))));
    }

    #[test]
    fn test_environment_overrides() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let mut config = BoardkitConfig::default();

        env::set_var("BOARDKIT_BOARD", "generic");
        env::set_var("BOARDKIT_GPIO_BACKEND", "simulated");
        env::set_var("BOARDKIT_BUS_RETRY_BUDGET", "7");
        env::set_var("BOARDKIT_GPIO_SETTLE_US", "not-a-number");

        apply_environment_overrides(&mut config);
        clear_override_vars();

        assert_eq!(config.board.name, "generic");
        assert_eq!(config.gpio.backend, GpioBackendKind::Simulated);
        assert_eq!(config.bus.retry_budget, 7);
        assert_eq!(config.gpio.settle_delay_us, 1);
    }

    #[test]
    fn test_cli_overrides() {
        let mut config = BoardkitConfig::default();
        let mut cli_args = HashMap::new();
        cli_args.insert("bus_backend".to_string(), "simulated".to_string());
        cli_args.insert("gpio_device".to_string(), "/dev/mem".to_string());
        cli_args.insert("retry_budget".to_string(), "2".to_string());

        apply_cli_overrides(&mut config, &cli_args);

        assert_eq!(config.bus.backend, BusBackendKind::Simulated);
        assert_eq!(config.gpio.device_path, PathBuf::from("/dev/mem"));
        assert_eq!(config.bus.retry_budget, 2);
    }

    #[test]
    fn test_override_precedence() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        clear_override_vars();
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);

        let mut file = File::create(&config_path).unwrap();
        writeln!(file, "[board]").unwrap();
        writeln!(file, "name = \"file-board\"").unwrap();
        writeln!(file, "[bus]").unwrap();
        writeln!(file, "retry_budget = 1").unwrap();

        env::set_var("BOARDKIT_BOARD", "env-board");
        env::set_var("BOARDKIT_BUS_RETRY_BUDGET", "5");

        let mut cli_args = HashMap::new();
        cli_args.insert("board".to_string(), "cli-board".to_string());

        let config = load_config(Some(&config_path), Some(&cli_args)).unwrap();
        clear_override_vars();

        // CLI wins for board, env wins for budget (no CLI override)
        assert_eq!(config.board.name, "cli-board");
        assert_eq!(config.bus.retry_budget, 5);
    }
}
