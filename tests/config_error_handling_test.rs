// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbus-endpoint project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

use anyhow::Result;
use rust_modbus_endpoint::config::Config;
use std::fs;
use std::sync::Once;
use tempfile::tempdir;

static INIT: Once = Once::new();

// Setup logger for tests
fn setup() {
    INIT.call_once(|| {
        let _ = env_logger::builder()
            .filter_level(log::LevelFilter::Debug)
            .is_test(true)
            .try_init();
    });
}

#[test]
fn test_schema_error_creates_sample_file() -> Result<()> {
    setup();
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("config.yaml");

    let invalid_yaml = r#"
modbus:
  enabled: "yes"
  port: "not-an-integer"
  address: 12345
"#;
    fs::write(&config_path, invalid_yaml)?;

    let result = Config::from_file(&config_path);
    assert!(result.is_err());

    let sample_path = temp_dir.path().join("config.sample.yaml");
    assert!(sample_path.exists(), "sample config should be created");

    // The sample holds the defaults and loads cleanly
    let sample = Config::from_file(&sample_path)?;
    assert_eq!(sample.modbus.port, 5502);
    assert_eq!(sample.store.units, 16);

    Ok(())
}

#[test]
fn test_rule_violation_creates_sample_file() -> Result<()> {
    setup();
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("endpoint.yaml");

    // Schema-valid, but coils and discrete inputs differ in length
    let yaml = r#"
modbus:
  enabled: true
  port: 5502
  address: 127.0.0.1
store:
  units: 2
  coils: 100
  discrete_inputs: 50
  holding_registers: 10
  input_registers: 10
"#;
    fs::write(&config_path, yaml)?;

    let err = Config::from_file(&config_path).unwrap_err();
    assert!(err.to_string().contains("coils"));
    assert!(temp_dir.path().join("endpoint.sample.yaml").exists());

    Ok(())
}

#[test]
fn test_unreadable_yaml_is_rejected() -> Result<()> {
    setup();
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("config.yaml");
    fs::write(&config_path, "modbus: [unterminated")?;

    assert!(Config::from_file(&config_path).is_err());
    Ok(())
}
