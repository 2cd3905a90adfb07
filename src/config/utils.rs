// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbus-endpoint project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration utilities
//!
//! This module provides utility functions for working with configuration
//! settings, including validation and schema management.

use anyhow::{Context, Result};
use log::debug;

use super::Config;

/// JSON schema the YAML configuration is validated against
pub const CONFIG_SCHEMA: &str = include_str!("../../resources/config.schema.json");

/// Size of the Modbus address space (16-bit addresses)
pub const ADDRESS_SPACE: usize = 0x1_0000;

/// Output the embedded JSON schema to the console.
///
/// This function is called when the `--show-config-schema` flag is provided
/// on the command line.
///
/// # Example
///
/// ```bash
/// ./rust_modbus_endpoint --show-config-schema > config_schema.json
/// ```
pub fn output_config_schema() -> Result<()> {
    let schema: serde_json::Value =
        serde_json::from_str(CONFIG_SCHEMA).context("Failed to parse JSON schema")?;

    let formatted_schema =
        serde_json::to_string_pretty(&schema).context("Failed to format JSON schema")?;

    println!("{}", formatted_schema);

    Ok(())
}

/// Check if a string is a valid IP address
///
/// Validates that a string represents a valid IPv4 or IPv6 address,
/// or is one of the special values like "localhost" or "0.0.0.0".
pub fn is_valid_ip_address(addr: &str) -> bool {
    if addr.parse::<std::net::IpAddr>().is_ok() {
        return true;
    }

    // Special cases
    matches!(addr, "localhost" | "::" | "::0" | "0.0.0.0")
}

/// Validates the configuration against additional rules that aren't covered by the JSON schema.
///
/// # Validation Rules
///
/// - **Network**: the Modbus address is an IP address or "localhost", the port
///   is within 1-65534 and at least one client is allowed
/// - **Units**: at least one unit is configured
/// - **Bank sizes**: every bank has at least one element
/// - **Discrete inputs**: `discrete_inputs` equals `coils`, since discrete
///   input reads are bounded by the coil bank length
/// - **Address space**: each concatenated range (coils + discrete inputs,
///   holding + input registers) fits in the 65536 Modbus addresses
pub fn validate_specific_rules(config: &Config) -> Result<()> {
    debug!("Performing additional validation checks");

    let modbus = &config.modbus;
    if !is_valid_ip_address(&modbus.address) {
        anyhow::bail!("Invalid Modbus address: {}", modbus.address);
    }
    if modbus.port == 0 || modbus.port == u16::MAX {
        anyhow::bail!("Invalid Modbus port: {} (must be 1-65534)", modbus.port);
    }
    if modbus.max_clients == 0 {
        anyhow::bail!("max_clients must allow at least one client");
    }

    let store = &config.store;
    if store.units == 0 {
        anyhow::bail!("At least one unit must be configured");
    }

    for (name, len) in [
        ("coils", store.coils),
        ("discrete_inputs", store.discrete_inputs),
        ("holding_registers", store.holding_registers),
        ("input_registers", store.input_registers),
    ] {
        if len == 0 {
            anyhow::bail!("Bank '{}' must hold at least one element", name);
        }
    }

    if store.coils != store.discrete_inputs {
        anyhow::bail!(
            "coils ({}) and discrete_inputs ({}) must have the same length",
            store.coils,
            store.discrete_inputs
        );
    }

    let layout = store.layout();
    if layout.bit_capacity() > ADDRESS_SPACE {
        anyhow::bail!(
            "coils + discrete_inputs ({}) exceed the Modbus address space ({})",
            layout.bit_capacity(),
            ADDRESS_SPACE
        );
    }
    if layout.word_capacity() > ADDRESS_SPACE {
        anyhow::bail!(
            "holding_registers + input_registers ({}) exceed the Modbus address space ({})",
            layout.word_capacity(),
            ADDRESS_SPACE
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_ip_address() {
        assert!(is_valid_ip_address("127.0.0.1"));
        assert!(is_valid_ip_address("::1"));
        assert!(is_valid_ip_address("localhost"));
        assert!(!is_valid_ip_address("modbus.local"));
        assert!(!is_valid_ip_address("256.0.0.1"));
    }

    #[test]
    fn test_mismatched_coil_and_discrete_input_lengths_are_rejected() {
        let mut config = Config::default();
        config.store.discrete_inputs = 5000;
        let err = validate_specific_rules(&config).unwrap_err();
        assert!(err.to_string().contains("same length"));
    }

    #[test]
    fn test_combined_capacity_must_fit_address_space() {
        let mut config = Config::default();
        config.store.coils = 40000;
        config.store.discrete_inputs = 40000;
        assert!(validate_specific_rules(&config).is_err());

        config.store.coils = 32768;
        config.store.discrete_inputs = 32768;
        assert!(validate_specific_rules(&config).is_ok());
    }

    #[test]
    fn test_zero_sized_settings_are_rejected() {
        let mut config = Config::default();
        config.store.units = 0;
        assert!(validate_specific_rules(&config).is_err());

        let mut config = Config::default();
        config.store.holding_registers = 0;
        assert!(validate_specific_rules(&config).is_err());

        let mut config = Config::default();
        config.modbus.max_clients = 0;
        assert!(validate_specific_rules(&config).is_err());
    }

    #[test]
    fn test_schema_is_valid_json() {
        let schema: serde_json::Value = serde_json::from_str(CONFIG_SCHEMA).unwrap();
        assert_eq!(schema["type"], "object");
    }
}
