// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbus-endpoint project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Per-unit bank storage

use crate::error::ObjectClass;

/// Sizes of the banks allocated for every unit, and the number of units.
///
/// The layout is fixed for the lifetime of a [`crate::store::RegisterStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BankLayout {
    /// Number of units, addressed with ids `1..=units`
    pub units: u8,
    pub coils: usize,
    pub discrete_inputs: usize,
    pub holding_registers: usize,
    pub input_registers: usize,
}

impl Default for BankLayout {
    fn default() -> Self {
        Self {
            units: 16,
            coils: 10000,
            discrete_inputs: 10000,
            holding_registers: 1000,
            input_registers: 1000,
        }
    }
}

impl BankLayout {
    /// Combined capacity of the coil + discrete input address range
    pub fn bit_capacity(&self) -> usize {
        self.coils + self.discrete_inputs
    }

    /// Combined capacity of the holding + input register address range
    pub fn word_capacity(&self) -> usize {
        self.holding_registers + self.input_registers
    }

    /// Address range a request on `class` is validated against.
    ///
    /// Discrete inputs are bounded by the coil length.
    pub fn capacity(&self, class: ObjectClass) -> usize {
        match class {
            ObjectClass::Coil => self.bit_capacity(),
            ObjectClass::DiscreteInput => self.coils,
            ObjectClass::HoldingRegister => self.word_capacity(),
            ObjectClass::InputRegister => self.input_registers,
        }
    }
}

/// Storage for one Modbus unit.
///
/// The four sequences are boxed slices so their length cannot change once
/// allocated. All values start zeroed / `false`.
#[derive(Debug, Clone)]
pub struct UnitBank {
    pub(crate) coils: Box<[bool]>,
    pub(crate) discrete_inputs: Box<[bool]>,
    pub(crate) holding_registers: Box<[u16]>,
    pub(crate) input_registers: Box<[u16]>,
}

impl UnitBank {
    pub fn new(layout: &BankLayout) -> Self {
        Self {
            coils: vec![false; layout.coils].into_boxed_slice(),
            discrete_inputs: vec![false; layout.discrete_inputs].into_boxed_slice(),
            holding_registers: vec![0; layout.holding_registers].into_boxed_slice(),
            input_registers: vec![0; layout.input_registers].into_boxed_slice(),
        }
    }

    pub fn coils(&self) -> &[bool] {
        &self.coils
    }

    pub fn discrete_inputs(&self) -> &[bool] {
        &self.discrete_inputs
    }

    pub fn holding_registers(&self) -> &[u16] {
        &self.holding_registers
    }

    pub fn input_registers(&self) -> &[u16] {
        &self.input_registers
    }
}

/// Write `values` into the logical range formed by `low` followed by `high`,
/// starting at `start`.
///
/// Each offset is routed independently, so a range straddling the end of
/// `low` continues at `high[0]`. Returns `false` without touching either
/// bank if the range does not fit.
pub(crate) fn write_concatenated<T: Copy>(
    low: &mut [T],
    high: &mut [T],
    start: usize,
    values: &[T],
) -> bool {
    if start + values.len() > low.len() + high.len() {
        return false;
    }
    let boundary = low.len();
    for (i, value) in values.iter().enumerate() {
        let addr = start + i;
        if addr < boundary {
            low[addr] = *value;
        } else {
            high[addr - boundary] = *value;
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_bank_is_zeroed_with_layout_lengths() {
        let layout = BankLayout {
            units: 1,
            coils: 8,
            discrete_inputs: 8,
            holding_registers: 4,
            input_registers: 3,
        };
        let bank = UnitBank::new(&layout);
        assert_eq!(bank.coils().len(), 8);
        assert_eq!(bank.discrete_inputs().len(), 8);
        assert_eq!(bank.holding_registers().len(), 4);
        assert_eq!(bank.input_registers().len(), 3);
        assert!(bank.coils().iter().all(|c| !c));
        assert!(bank.input_registers().iter().all(|r| *r == 0));
    }

    #[test]
    fn test_default_layout_capacities() {
        let layout = BankLayout::default();
        assert_eq!(layout.bit_capacity(), 20000);
        assert_eq!(layout.word_capacity(), 2000);
    }

    #[test]
    fn test_class_capacity_uses_coil_length_for_discrete_inputs() {
        let layout = BankLayout {
            units: 1,
            coils: 12,
            discrete_inputs: 7,
            holding_registers: 5,
            input_registers: 3,
        };
        assert_eq!(layout.capacity(ObjectClass::Coil), 19);
        assert_eq!(layout.capacity(ObjectClass::DiscreteInput), 12);
        assert_eq!(layout.capacity(ObjectClass::HoldingRegister), 8);
        assert_eq!(layout.capacity(ObjectClass::InputRegister), 3);
    }

    #[test]
    fn test_write_concatenated_straddles_boundary() {
        let mut low = [0u16; 3];
        let mut high = [0u16; 3];
        assert!(write_concatenated(&mut low, &mut high, 2, &[1, 2, 3]));
        assert_eq!(low, [0, 0, 1]);
        assert_eq!(high, [2, 3, 0]);
    }

    #[test]
    fn test_write_concatenated_entirely_in_high_bank() {
        let mut low = [false; 2];
        let mut high = [false; 4];
        assert!(write_concatenated(&mut low, &mut high, 3, &[true, true]));
        assert_eq!(low, [false, false]);
        assert_eq!(high, [false, true, true, false]);
    }

    #[test]
    fn test_write_concatenated_rejects_overflow_without_writing() {
        let mut low = [0u16; 2];
        let mut high = [0u16; 2];
        assert!(!write_concatenated(&mut low, &mut high, 3, &[9, 9]));
        assert_eq!(low, [0, 0]);
        assert_eq!(high, [0, 0]);
    }
}
