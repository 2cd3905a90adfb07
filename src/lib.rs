// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbus-endpoint project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Rust Modbus endpoint library
//!
//! This library models the addressable memory of several Modbus units and
//! serves it over Modbus TCP. Each unit owns coils, discrete inputs, holding
//! registers and input registers; the coil and holding register handlers
//! address their bank concatenated with the matching input bank.

pub mod config;
pub mod daemon;
pub mod error;
pub mod modbus;
pub mod store;

pub use error::{ObjectClass, RequestError};
