use std::path::PathBuf;

use algodrill::config::{Config, ConfigError};

use super::FIXTURES_PATH;

#[test]
fn test_load_valid_config() {
    let path = format!("{FIXTURES_PATH}/configs/valid_full.toml");
    let config = Config::from_file(&path).expect("Failed to load config");

    assert_eq!(config.timeout_ms, 1500);
    assert_eq!(config.catalog_path, Some(PathBuf::from("problems.json")));
    assert_eq!(config.progress_dir(), PathBuf::from("/tmp/algodrill-progress"));
    assert_eq!(config.limits.max_steps, Some(50_000_000));
    assert_eq!(config.limits.stack_size_bytes(), 64 * 1024 * 1024);
    assert_eq!(config.limits.memory_limit_bytes(), 128 * 1024 * 1024);
}

#[test]
fn test_load_minimal_config() {
    let path = format!("{FIXTURES_PATH}/configs/valid_minimal.toml");
    let config = Config::from_file(&path).expect("Failed to load config");

    assert_eq!(config.timeout_ms, 500);
    assert_eq!(config.limits, Config::default().limits);
}

#[test]
fn test_load_invalid_zero_timeout() {
    let path = format!("{FIXTURES_PATH}/configs/invalid_zero_timeout.toml");
    let result = Config::from_file(&path);
    assert!(matches!(result, Err(ConfigError::Invalid(_))));
}

#[test]
fn test_load_invalid_small_stack() {
    let path = format!("{FIXTURES_PATH}/configs/invalid_small_stack.toml");
    let result = Config::from_file(&path);
    assert!(matches!(result, Err(ConfigError::Invalid(_))));
}

#[test]
fn test_example_config_is_default() {
    let config = Config::parse_toml(algodrill::EXAMPLE_CONFIG).unwrap();
    assert_eq!(config.timeout_ms, Config::DEFAULT_TIMEOUT_MS);
    assert_eq!(config.limits, Config::default().limits);
}
