use snipcube::config::{Config, ConfigError, EXAMPLE_CONFIG};
use snipcube::types::Limits;

use super::FIXTURES_PATH;

#[test]
fn test_load_valid_config() {
    let path = format!("{}/configs/valid_full.toml", FIXTURES_PATH);
    let config = Config::from_file(&path).expect("Failed to load config");

    assert_eq!(config.concurrency, 2);
    assert_eq!(config.poll_interval_ms, 25);
    assert_eq!(
        config.interpreter.command,
        vec!["/usr/local/bin/snipcube-eval", "{snippet}"]
    );
    assert_eq!(config.interpreter.env.get("LANG").map(String::as_str), Some("C.UTF-8"));
    assert_eq!(config.limits.max_output_bytes, 200);
    assert_eq!(config.limits.memory_limit, 64 * Limits::MIB);
    assert!((config.limits.wall_time_limit - 3.0).abs() < f64::EPSILON);
}

#[test]
fn test_load_minimal_config() {
    let path = format!("{}/configs/valid_minimal.toml", FIXTURES_PATH);
    let config = Config::from_file(&path).expect("Failed to load config");

    assert_eq!(config.concurrency, 1);
    assert_eq!(config.limits, Limits::default());
}

#[test]
fn test_load_invalid_empty_command() {
    let path = format!("{}/configs/invalid_empty_command.toml", FIXTURES_PATH);
    let result = Config::from_file(&path);
    assert!(matches!(result, Err(ConfigError::Invalid(_))));
}

#[test]
fn test_load_invalid_missing_placeholder() {
    let path = format!("{}/configs/invalid_missing_placeholder.toml", FIXTURES_PATH);
    let result = Config::from_file(&path);
    assert!(matches!(result, Err(ConfigError::Invalid(_))));
}

#[test]
fn test_load_invalid_zero_wall_time() {
    let path = format!("{}/configs/invalid_zero_wall_time.toml", FIXTURES_PATH);
    let result = Config::from_file(&path);
    assert!(result.is_err());
}

#[test]
fn test_load_missing_file() {
    let path = format!("{}/configs/does_not_exist.toml", FIXTURES_PATH);
    let result = Config::from_file(&path);
    assert!(matches!(result, Err(ConfigError::Parse(_))));
}

#[test]
fn test_example_config_parses() {
    let config = Config::parse_toml(EXAMPLE_CONFIG).expect("Failed to parse example config");
    assert_eq!(config.interpreter.command[0], "snipcube-eval");
}
