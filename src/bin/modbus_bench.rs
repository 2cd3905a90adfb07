// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbus-endpoint project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Throughput harness for the Modbus endpoint
//!
//! For each object class, compares reading `n` addresses one request at a
//! time against reading the same range in as few requests as the protocol
//! allows.

use chrono::Local;
use clap::Parser;
use std::error::Error;
use std::fmt;
use std::net::SocketAddr;
use tokio::time::{Duration, Instant};
use tokio_modbus::client::Context;
use tokio_modbus::prelude::*;

/// Largest bit count a single read request may carry
const MAX_BITS_PER_READ: u16 = 2000;
/// Largest register count a single read request may carry
const MAX_WORDS_PER_READ: u16 = 125;

/// Benchmark single-address versus batched reads against a Modbus server
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Modbus server address
    #[clap(long, default_value = "127.0.0.1")]
    address: String,

    /// Modbus server port
    #[clap(long, default_value = "5502")]
    port: u16,

    /// Unit id to query
    #[clap(long, default_value = "1")]
    unit: u8,

    /// Number of coils and discrete inputs to read
    #[clap(long, default_value = "2000")]
    bits: u16,

    /// Number of holding and input registers to read
    #[clap(long, default_value = "1000")]
    registers: u16,

    /// Request timeout in milliseconds
    #[clap(long, default_value = "1000")]
    timeout_ms: u64,
}

#[derive(Debug, Clone, Copy)]
enum Class {
    Coils,
    DiscreteInputs,
    HoldingRegisters,
    InputRegisters,
}

impl fmt::Display for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Class::Coils => "Coils",
            Class::DiscreteInputs => "DiscreteInputs",
            Class::HoldingRegisters => "HoldingRegisters",
            Class::InputRegisters => "InputRegisters",
        };
        f.write_str(name)
    }
}

impl Class {
    fn max_per_read(self) -> u16 {
        match self {
            Class::Coils | Class::DiscreteInputs => MAX_BITS_PER_READ,
            Class::HoldingRegisters | Class::InputRegisters => MAX_WORDS_PER_READ,
        }
    }
}

/// Issue one read and return the number of values received.
async fn read_once(
    ctx: &mut Context,
    class: Class,
    addr: u16,
    cnt: u16,
    timeout: Duration,
) -> Result<usize, Box<dyn Error>> {
    let read = async {
        let len = match class {
            Class::Coils => ctx.read_coils(addr, cnt).await??.len(),
            Class::DiscreteInputs => ctx.read_discrete_inputs(addr, cnt).await??.len(),
            Class::HoldingRegisters => ctx.read_holding_registers(addr, cnt).await??.len(),
            Class::InputRegisters => ctx.read_input_registers(addr, cnt).await??.len(),
        };
        Ok::<_, Box<dyn Error>>(len)
    };
    tokio::time::timeout(timeout, read).await?
}

/// Outcome of one timed run
struct RunStats {
    requests: usize,
    values: usize,
    failures: usize,
    elapsed: Duration,
}

async fn loop_run(ctx: &mut Context, class: Class, n: u16, timeout: Duration) -> RunStats {
    let start = Instant::now();
    let mut stats = RunStats {
        requests: 0,
        values: 0,
        failures: 0,
        elapsed: Duration::ZERO,
    };
    for addr in 0..n {
        stats.requests += 1;
        match read_once(ctx, class, addr, 1, timeout).await {
            Ok(len) => stats.values += len,
            Err(e) => {
                log::debug!("{} read at {} failed: {}", class, addr, e);
                stats.failures += 1;
            }
        }
    }
    stats.elapsed = start.elapsed();
    stats
}

async fn batch_run(ctx: &mut Context, class: Class, n: u16, timeout: Duration) -> RunStats {
    let start = Instant::now();
    let mut stats = RunStats {
        requests: 0,
        values: 0,
        failures: 0,
        elapsed: Duration::ZERO,
    };
    let mut addr = 0;
    while addr < n {
        let cnt = (n - addr).min(class.max_per_read());
        stats.requests += 1;
        match read_once(ctx, class, addr, cnt, timeout).await {
            Ok(len) => stats.values += len,
            Err(e) => {
                log::debug!("{} read of {} at {} failed: {}", class, cnt, addr, e);
                stats.failures += 1;
            }
        }
        addr += cnt;
    }
    stats.elapsed = start.elapsed();
    stats
}

fn report(label: &str, class: Class, stats: &RunStats) {
    println!("{}", Local::now().format("%Y-%m-%d %H:%M:%S"));
    println!(
        "Read{} {} time used: {:?} ({} requests, {} values, {} failures)",
        class, label, stats.elapsed, stats.requests, stats.values, stats.failures
    );
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init_from_env(
        env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"),
    );

    let args = Args::parse();

    let socket_addr: SocketAddr = format!("{}:{}", args.address, args.port).parse()?;
    println!(
        "Connecting to Modbus server at {} as unit {}",
        socket_addr, args.unit
    );

    let mut ctx = tcp::connect_slave(socket_addr, Slave(args.unit)).await?;
    let timeout = Duration::from_millis(args.timeout_ms);

    let runs = [
        (Class::Coils, args.bits),
        (Class::DiscreteInputs, args.bits),
        (Class::HoldingRegisters, args.registers),
        (Class::InputRegisters, args.registers),
    ];

    for (class, n) in runs {
        let stats = loop_run(&mut ctx, class, n, timeout).await;
        report("loop", class, &stats);

        let stats = batch_run(&mut ctx, class, n, timeout).await;
        report("batch", class, &stats);
    }

    ctx.disconnect().await?;

    Ok(())
}
