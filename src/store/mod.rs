// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbus-endpoint project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Register storage for the Modbus endpoint
//!
//! This module owns the addressable memory of every configured Modbus unit.
//! Each unit has four fixed-size banks (coils, discrete inputs, holding
//! registers and input registers) which are allocated once at startup and
//! never resized.
//!
//! ## Key Components
//!
//! - `BankLayout`: the bank sizes and number of units, taken from configuration.
//! - `UnitBank`: the storage of one unit.
//! - `RegisterStore`: all units behind a single reader/writer guard.
//!
//! ## Address Space Concatenation
//!
//! The coil and discrete-input banks of a unit form one logical range of
//! `coils + discrete_inputs` addresses, coils first. Holding and input
//! registers are concatenated the same way. Writes that cross the boundary
//! spill into the second bank.

pub mod bank;
pub mod register_store;

pub use bank::{BankLayout, UnitBank};
pub use register_store::{BitClass, RegisterStore, WordClass};
