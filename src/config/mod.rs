// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbus-endpoint project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration management for the Modbus endpoint
//!
//! This module provides functionality for loading, validating, and applying
//! configuration settings. The configuration is backed by a YAML file and
//! validated against a JSON schema for robustness.
//!
//! ## Configuration Structure
//!
//! - `modbus`: Settings for the Modbus TCP server (binding, client limit)
//! - `store`: Number of units and the size of each register bank
//!
//! ## Usage
//!
//! ```no_run
//! use rust_modbus_endpoint::config::Config;
//! use std::path::Path;
//!
//! // Load config from file, creates a default if not found
//! let mut config = Config::from_file(Path::new("config.yaml")).unwrap();
//!
//! // Apply command line overrides if needed
//! config.apply_args(
//!     Some("0.0.0.0".to_string()), // Modbus address
//!     Some(502),                   // Modbus port
//!     Some(10),                    // Max clients
//!     None,                        // Units
//! );
//!
//! println!("Modbus port: {}", config.modbus.port);
//! ```

pub mod modbus;
pub mod store;
pub mod utils;

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, error};
use serde::{Deserialize, Serialize};

pub use modbus::ModbusConfig;
pub use store::StoreConfig;
pub use utils::{is_valid_ip_address, output_config_schema, CONFIG_SCHEMA};

/// Root configuration structure for the Modbus endpoint.
///
/// The configuration is deserialized from and serialized to YAML using serde.
/// Before deserialization the document is validated against the embedded JSON
/// schema; after deserialization [`utils::validate_specific_rules`] checks the
/// constraints the schema cannot express.
///
/// # Default Values
///
/// Each section uses default values when not explicitly specified in the
/// configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Modbus settings: whether the TCP server runs, where it binds, and how
    /// many clients it accepts.
    #[serde(default)]
    pub modbus: ModbusConfig,

    /// Register store sizing: number of units and bank lengths.
    #[serde(default)]
    pub store: StoreConfig,
}

impl Config {
    /// Helper method to create a sample config file when validation fails
    fn create_sample_config<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        let sample_path = path.with_extension("sample.yaml");
        debug!("Original path: {:?}, Sample path: {:?}", path, sample_path);

        // Create parent directories if they don't exist
        if let Some(parent) = sample_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                debug!("Creating parent directory: {:?}", parent);
                fs::create_dir_all(parent).with_context(|| {
                    format!(
                        "Failed to create parent directory for sample config at {:?}",
                        parent
                    )
                })?;
            }
        }

        Self::default()
            .save_to_file(&sample_path)
            .with_context(|| format!("Failed to save sample config to {:?}", sample_path))?;

        error!(
            "Sample configuration file created at {:?}\nPlease edit and rename it",
            sample_path
        );
        Ok(())
    }

    /// Load configuration from a file
    ///
    /// A missing file is created with default values. An invalid file leaves
    /// a `*.sample.yaml` with defaults next to it and returns an error.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(
                "Configuration file not found at {:?}, creating default",
                path
            );
            let default_config = Self::default();
            default_config.save_to_file(path)?;
            return Ok(default_config);
        }

        debug!("Loading configuration from {:?}", path);
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file at {:?}", path))?;

        Self::from_yaml_str(&contents).inspect_err(|_| {
            if let Err(e) = Self::create_sample_config(path) {
                error!("Failed to create sample config: {}", e);
            }
        })
    }

    /// Parse and validate a YAML document
    pub fn from_yaml_str(contents: &str) -> Result<Self> {
        // First step: convert YAML to a generic Value
        let yaml_value: serde_yml::Value =
            serde_yml::from_str(contents).context("Failed to parse YAML configuration")?;

        // Convert to JSON Value for validation
        let json_value = serde_json::to_value(&yaml_value)
            .context("Failed to convert YAML to JSON for validation")?;

        let schema: serde_json::Value =
            serde_json::from_str(CONFIG_SCHEMA).context("Failed to parse JSON schema")?;

        let validator = jsonschema::draft202012::options()
            .should_validate_formats(true)
            .build(&schema)?;

        debug!("Validating configuration against schema");
        if let Err(error) = validator.validate(&json_value) {
            error!("Configuration validation error before deserialization");
            anyhow::bail!("Configuration validation failed: {}", error);
        }

        debug!("Schema validation passed, deserializing into Config structure");
        let config: Config = serde_yml::from_str(contents).map_err(|err| {
            error!("Configuration deserialization error: {}", err);
            anyhow::anyhow!("Failed to deserialize configuration: {}", err)
        })?;

        // Perform additional specific validations
        if let Err(err) = utils::validate_specific_rules(&config) {
            error!("Configuration specific validation error: {}", err);
            return Err(err);
        }

        Ok(config)
    }

    /// Save the configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml =
            serde_yml::to_string(self).context("Failed to serialize configuration to YAML")?;

        let mut file = File::create(path.as_ref())
            .with_context(|| format!("Failed to create config file at {:?}", path.as_ref()))?;

        file.write_all(yaml.as_bytes())
            .with_context(|| format!("Failed to write configuration to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Run the rule checks that the JSON schema cannot express
    pub fn validate(&self) -> Result<()> {
        utils::validate_specific_rules(self)
    }

    /// Apply command line arguments to override configuration values.
    ///
    /// Only arguments that were explicitly provided override the loaded
    /// values.
    ///
    /// # Parameters
    ///
    /// * `modbus_address` - Optional network address for the Modbus server
    /// * `modbus_port` - Optional TCP port for the Modbus server
    /// * `max_clients` - Optional limit of concurrently served clients
    /// * `units` - Optional number of units to allocate
    pub fn apply_args(
        &mut self,
        modbus_address: Option<String>,
        modbus_port: Option<u16>,
        max_clients: Option<usize>,
        units: Option<u8>,
    ) {
        if let Some(address) = modbus_address {
            debug!("Overriding Modbus address from command line: {}", address);
            self.modbus.address = address;
        }
        if let Some(port) = modbus_port {
            debug!("Overriding Modbus port from command line: {}", port);
            self.modbus.port = port;
        }
        if let Some(max_clients) = max_clients {
            debug!("Overriding max clients from command line: {}", max_clients);
            self.modbus.max_clients = max_clients;
        }
        if let Some(units) = units {
            debug!("Overriding unit count from command line: {}", units);
            self.store.units = units;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.modbus.port, 5502);
        assert_eq!(config.store.units, 16);
        assert_eq!(config.store.coils, 10000);
        assert_eq!(config.store.holding_registers, 1000);
    }

    #[test]
    fn test_default_config_round_trips_through_yaml() {
        let yaml = serde_yml::to_string(&Config::default()).unwrap();
        let config = Config::from_yaml_str(&yaml).unwrap();
        assert_eq!(config.modbus.address, "127.0.0.1");
        assert_eq!(config.store.input_registers, 1000);
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let yaml = "modbus:\n  enabled: false\n  port: 1502\n  address: 0.0.0.0\n";
        let config = Config::from_yaml_str(yaml).unwrap();
        assert!(!config.modbus.enabled);
        assert_eq!(config.modbus.port, 1502);
        assert_eq!(config.modbus.max_clients, 5);
        assert_eq!(config.modbus.idle_timeout(), Some(Duration::from_secs(30)));
        assert_eq!(config.store.units, 16);
    }

    #[test]
    fn test_idle_timeout_zero_disables() {
        let yaml = "modbus:\n  enabled: true\n  port: 1502\n  address: 127.0.0.1\n  idle_timeout_secs: 0\n";
        let config = Config::from_yaml_str(yaml).unwrap();
        assert_eq!(config.modbus.idle_timeout(), None);
        assert!(Config::from_yaml_str(&yaml.replace(": 0", ": -5")).is_err());
    }

    #[test]
    fn test_schema_rejects_unknown_fields_and_bad_types() {
        assert!(Config::from_yaml_str("store:\n  units: many\n").is_err());
        let yaml = "modbus:\n  enabled: true\n  port: 502\n  address: 127.0.0.1\n  colour: blue\n";
        assert!(Config::from_yaml_str(yaml).is_err());
    }

    #[test]
    fn test_apply_args_overrides_only_given_values() {
        let mut config = Config::default();
        config.apply_args(None, Some(1502), None, Some(4));
        assert_eq!(config.modbus.address, "127.0.0.1");
        assert_eq!(config.modbus.port, 1502);
        assert_eq!(config.modbus.max_clients, 5);
        assert_eq!(config.store.units, 4);
    }
}
