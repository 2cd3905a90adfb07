// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbus-endpoint project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Register store sizing
//!
//! Number of units and the length of each of their four banks. The values
//! are read once at startup; banks are never resized afterwards.

use serde::{Deserialize, Serialize};

use crate::store::BankLayout;

/// Sizing of the register store.
///
/// `coils` and `discrete_inputs` must be equal: discrete input reads are
/// bounded by the coil bank length.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Number of units, served under unit ids `1..=units`
    pub units: u8,
    /// Coils per unit
    pub coils: usize,
    /// Discrete inputs per unit
    pub discrete_inputs: usize,
    /// Holding registers per unit
    pub holding_registers: usize,
    /// Input registers per unit
    pub input_registers: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        let layout = BankLayout::default();
        Self {
            units: layout.units,
            coils: layout.coils,
            discrete_inputs: layout.discrete_inputs,
            holding_registers: layout.holding_registers,
            input_registers: layout.input_registers,
        }
    }
}

impl StoreConfig {
    pub fn layout(&self) -> BankLayout {
        BankLayout {
            units: self.units,
            coils: self.coils,
            discrete_inputs: self.discrete_inputs,
            holding_registers: self.holding_registers,
            input_registers: self.input_registers,
        }
    }
}
