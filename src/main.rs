// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbus-endpoint project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

// Main entry point for the Modbus endpoint
use anyhow::Result;
use clap::Parser;
use log::info;
use std::path::PathBuf;

use rust_modbus_endpoint::config::{output_config_schema, Config};
use rust_modbus_endpoint::daemon::Daemon;

/// Multi-unit Modbus TCP data endpoint
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (YAML), created with defaults if missing
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Modbus server address, overrides the configuration file
    #[arg(long)]
    modbus_address: Option<String>,

    /// Modbus server port, overrides the configuration file
    #[arg(long)]
    modbus_port: Option<u16>,

    /// Maximum number of concurrent clients, overrides the configuration file
    #[arg(long)]
    max_clients: Option<usize>,

    /// Number of units to serve, overrides the configuration file
    #[arg(long)]
    units: Option<u8>,

    /// Print the configuration JSON schema and exit
    #[arg(long)]
    show_config_schema: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init_from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );
    let args = Args::parse();

    if args.show_config_schema {
        return output_config_schema();
    }

    let mut config = Config::from_file(&args.config)?;
    config.apply_args(
        args.modbus_address,
        args.modbus_port,
        args.max_clients,
        args.units,
    );
    config.validate()?;

    let mut daemon = Daemon::new();
    daemon.launch(&config).await?;

    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl+C, stopping");

    daemon.shutdown();
    daemon.join().await?;

    Ok(())
}
