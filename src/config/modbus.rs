// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbus-endpoint project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus TCP server configuration
//!
//! This module defines the structures for configuring the Modbus TCP server
//! component of the endpoint.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Configuration for the Modbus TCP server component.
///
/// # Fields
///
/// * `enabled` - Flag to enable or disable the Modbus server
/// * `port` - TCP port number for the Modbus server (default: 5502)
/// * `address` - Network address for the Modbus server to bind to (default: 127.0.0.1)
/// * `max_clients` - Number of clients served concurrently (default: 5)
/// * `idle_timeout_secs` - Seconds of silence before a client is disconnected (default: 30)
///
/// # Example
///
/// ```
/// use rust_modbus_endpoint::config::ModbusConfig;
///
/// let modbus_config = ModbusConfig {
///     enabled: true,
///     port: 503,
///     address: "0.0.0.0".to_string(),
///     max_clients: 2,
///     idle_timeout_secs: 30,
/// };
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModbusConfig {
    /// Flag to enable or disable the Modbus server.
    ///
    /// When disabled, the register store is still allocated but nothing
    /// listens on the network.
    pub enabled: bool,

    /// The TCP port the Modbus server will listen on.
    ///
    /// Valid range is 1-65534. The default 5502 avoids the privileged port 502.
    pub port: u16,

    /// The network address the Modbus server will bind to.
    ///
    /// Can be an IPv4/IPv6 address or "localhost". Default is "127.0.0.1".
    /// Use "0.0.0.0" to bind to all IPv4 interfaces.
    pub address: String,

    /// Maximum number of simultaneously connected clients.
    ///
    /// Connections beyond this limit are closed immediately.
    #[serde(default = "default_max_clients")]
    pub max_clients: usize,

    /// Seconds a client may stay silent before its connection is closed.
    ///
    /// `0` disables the timeout.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
}

fn default_max_clients() -> usize {
    5
}

fn default_idle_timeout_secs() -> u64 {
    30
}

impl ModbusConfig {
    /// Socket address to bind, `localhost` standing for the IPv4 loopback
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let ip = match self.address.as_str() {
            "localhost" => IpAddr::V4(Ipv4Addr::LOCALHOST),
            other => other
                .parse::<IpAddr>()
                .with_context(|| format!("Invalid Modbus address {}", other))?,
        };
        Ok(SocketAddr::new(ip, self.port))
    }

    /// Idle timeout of a client connection, `None` when disabled
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }
}

impl Default for ModbusConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 5502,
            address: "127.0.0.1".to_string(), // Localhost for security
            max_clients: default_max_clients(),
            idle_timeout_secs: default_idle_timeout_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_address(address: &str) -> ModbusConfig {
        ModbusConfig {
            address: address.to_string(),
            ..ModbusConfig::default()
        }
    }

    #[test]
    fn test_socket_addr_accepts_ipv4_and_ipv6() {
        assert_eq!(
            with_address("0.0.0.0").socket_addr().unwrap(),
            "0.0.0.0:5502".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(
            with_address("::1").socket_addr().unwrap(),
            "[::1]:5502".parse::<SocketAddr>().unwrap()
        );
        assert_eq!(
            with_address("::").socket_addr().unwrap(),
            "[::]:5502".parse::<SocketAddr>().unwrap()
        );
    }

    #[test]
    fn test_socket_addr_maps_localhost_to_loopback() {
        let addr = with_address("localhost").socket_addr().unwrap();
        assert_eq!(addr.ip(), IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(addr.port(), 5502);
    }

    #[test]
    fn test_socket_addr_rejects_host_names() {
        assert!(with_address("modbus.local").socket_addr().is_err());
    }
}
