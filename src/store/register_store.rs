// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbus-endpoint project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Multi-unit register store guarded by a single reader/writer lock

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::debug;

use super::bank::{write_concatenated, BankLayout, UnitBank};
use crate::error::{ObjectClass, RequestError};

/// Single-bit object classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BitClass {
    Coil,
    DiscreteInput,
}

/// 16-bit object classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordClass {
    HoldingRegister,
    InputRegister,
}

impl From<BitClass> for ObjectClass {
    fn from(class: BitClass) -> Self {
        match class {
            BitClass::Coil => ObjectClass::Coil,
            BitClass::DiscreteInput => ObjectClass::DiscreteInput,
        }
    }
}

impl From<WordClass> for ObjectClass {
    fn from(class: WordClass) -> Self {
        match class {
            WordClass::HoldingRegister => ObjectClass::HoldingRegister,
            WordClass::InputRegister => ObjectClass::InputRegister,
        }
    }
}

/// Register banks for units `1..=N`, behind one lock shared by all units.
///
/// ### Locking
///
/// Coil and holding register access takes the lock exclusively, for reads as
/// well as writes. Discrete input and input register reads take it shared.
/// Every operation holds the guard for its whole range, so no caller ever
/// observes a partially applied write.
///
/// ### Writes
///
/// A coil write addresses the concatenation `coils ++ discrete_inputs`, and a
/// holding register write addresses `holding_registers ++ input_registers`.
/// Discrete input and input register writes address their own bank only;
/// they are not reachable from the protocol and exist so the process side
/// can publish input values.
#[derive(Debug)]
pub struct RegisterStore {
    layout: BankLayout,
    units: RwLock<Vec<UnitBank>>,
}

impl Default for RegisterStore {
    fn default() -> Self {
        Self::new(BankLayout::default())
    }
}

impl RegisterStore {
    /// Allocate zeroed banks for every unit of `layout`.
    pub fn new(layout: BankLayout) -> Self {
        let units = (0..layout.units).map(|_| UnitBank::new(&layout)).collect();
        debug!(
            "Allocated register store: {} units, {} coils, {} discrete inputs, {} holding registers, {} input registers",
            layout.units,
            layout.coils,
            layout.discrete_inputs,
            layout.holding_registers,
            layout.input_registers
        );
        Self {
            layout,
            units: RwLock::new(units),
        }
    }

    pub fn layout(&self) -> &BankLayout {
        &self.layout
    }

    /// Read `quantity` bits starting at `start_address`.
    ///
    /// Reads never apply the concatenation rule: a coil read is served from
    /// the coil bank alone and a discrete input read from the discrete input
    /// bank alone.
    pub fn read_bits(
        &self,
        unit_id: u8,
        class: BitClass,
        start_address: u16,
        quantity: u16,
    ) -> Result<Vec<bool>, RequestError> {
        let index = self.unit_index(unit_id)?;
        match class {
            BitClass::Coil => {
                let units = self.exclusive();
                copy_range(&units[index].coils[..], class.into(), start_address, quantity)
            }
            BitClass::DiscreteInput => {
                let units = self.shared();
                copy_range(
                    &units[index].discrete_inputs[..],
                    class.into(),
                    start_address,
                    quantity,
                )
            }
        }
    }

    /// Read `quantity` registers starting at `start_address`.
    pub fn read_words(
        &self,
        unit_id: u8,
        class: WordClass,
        start_address: u16,
        quantity: u16,
    ) -> Result<Vec<u16>, RequestError> {
        let index = self.unit_index(unit_id)?;
        match class {
            WordClass::HoldingRegister => {
                let units = self.exclusive();
                copy_range(
                    &units[index].holding_registers[..],
                    class.into(),
                    start_address,
                    quantity,
                )
            }
            WordClass::InputRegister => {
                let units = self.shared();
                copy_range(
                    &units[index].input_registers[..],
                    class.into(),
                    start_address,
                    quantity,
                )
            }
        }
    }

    /// Write bits starting at `start_address`.
    ///
    /// Nothing is written if any part of the range is out of bounds.
    pub fn write_bits(
        &self,
        unit_id: u8,
        class: BitClass,
        start_address: u16,
        values: &[bool],
    ) -> Result<(), RequestError> {
        let index = self.unit_index(unit_id)?;
        let mut units = self.exclusive();
        let bank = &mut units[index];
        let written = match class {
            BitClass::Coil => write_concatenated(
                &mut bank.coils[..],
                &mut bank.discrete_inputs[..],
                start_address.into(),
                values,
            ),
            BitClass::DiscreteInput => {
                write_own_bank(&mut bank.discrete_inputs[..], start_address.into(), values)
            }
        };
        if written {
            Ok(())
        } else {
            Err(self.out_of_range(class.into(), start_address, values.len()))
        }
    }

    /// Write registers starting at `start_address`.
    ///
    /// Nothing is written if any part of the range is out of bounds.
    pub fn write_words(
        &self,
        unit_id: u8,
        class: WordClass,
        start_address: u16,
        values: &[u16],
    ) -> Result<(), RequestError> {
        let index = self.unit_index(unit_id)?;
        let mut units = self.exclusive();
        let bank = &mut units[index];
        let written = match class {
            WordClass::HoldingRegister => write_concatenated(
                &mut bank.holding_registers[..],
                &mut bank.input_registers[..],
                start_address.into(),
                values,
            ),
            WordClass::InputRegister => {
                write_own_bank(&mut bank.input_registers[..], start_address.into(), values)
            }
        };
        if written {
            Ok(())
        } else {
            Err(self.out_of_range(class.into(), start_address, values.len()))
        }
    }

    /// Copy of one unit's banks taken under the shared guard.
    pub fn snapshot(&self, unit_id: u8) -> Result<UnitBank, RequestError> {
        let index = self.unit_index(unit_id)?;
        Ok(self.shared()[index].clone())
    }

    fn unit_index(&self, unit_id: u8) -> Result<usize, RequestError> {
        if unit_id == 0 || unit_id > self.layout.units {
            return Err(RequestError::IllegalUnit { unit_id });
        }
        Ok(usize::from(unit_id) - 1)
    }

    fn out_of_range(&self, class: ObjectClass, start_address: u16, quantity: usize) -> RequestError {
        RequestError::IllegalAddress {
            class,
            start_address,
            quantity,
            capacity: self.layout.capacity(class),
        }
    }

    // The banks are only indexed after range checks, so a poisoned lock
    // cannot hide a half-applied write.
    fn shared(&self) -> RwLockReadGuard<'_, Vec<UnitBank>> {
        self.units.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn exclusive(&self) -> RwLockWriteGuard<'_, Vec<UnitBank>> {
        self.units.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn copy_range<T: Copy>(
    bank: &[T],
    class: ObjectClass,
    start_address: u16,
    quantity: u16,
) -> Result<Vec<T>, RequestError> {
    let start = usize::from(start_address);
    let end = start + usize::from(quantity);
    bank.get(start..end)
        .map(<[T]>::to_vec)
        .ok_or(RequestError::IllegalAddress {
            class,
            start_address,
            quantity: quantity.into(),
            capacity: bank.len(),
        })
}

fn write_own_bank<T: Copy>(bank: &mut [T], start: usize, values: &[T]) -> bool {
    match bank.get_mut(start..start + values.len()) {
        Some(target) => {
            target.copy_from_slice(values);
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn small_layout() -> BankLayout {
        BankLayout {
            units: 2,
            coils: 10,
            discrete_inputs: 10,
            holding_registers: 5,
            input_registers: 5,
        }
    }

    #[test]
    fn test_unknown_unit_is_rejected() {
        let store = RegisterStore::new(small_layout());
        assert_eq!(
            store.read_bits(0, BitClass::Coil, 0, 1),
            Err(RequestError::IllegalUnit { unit_id: 0 })
        );
        assert_eq!(
            store.write_words(3, WordClass::HoldingRegister, 0, &[1]),
            Err(RequestError::IllegalUnit { unit_id: 3 })
        );
    }

    #[test]
    fn test_units_are_independent() {
        let store = RegisterStore::new(small_layout());
        store
            .write_words(1, WordClass::HoldingRegister, 0, &[11, 12])
            .unwrap();
        assert_eq!(
            store.read_words(2, WordClass::HoldingRegister, 0, 2).unwrap(),
            vec![0, 0]
        );
        assert_eq!(
            store.read_words(1, WordClass::HoldingRegister, 0, 2).unwrap(),
            vec![11, 12]
        );
    }

    #[test]
    fn test_coil_write_spills_into_discrete_inputs() {
        let store = RegisterStore::new(small_layout());
        store
            .write_bits(1, BitClass::Coil, 9, &[true, false, true])
            .unwrap();
        let bank = store.snapshot(1).unwrap();
        assert!(bank.coils()[9]);
        assert!(!bank.discrete_inputs()[0]);
        assert!(bank.discrete_inputs()[1]);
    }

    #[test]
    fn test_holding_write_spills_into_input_registers() {
        let store = RegisterStore::new(small_layout());
        store
            .write_words(2, WordClass::HoldingRegister, 4, &[40, 50, 60])
            .unwrap();
        assert_eq!(
            store.read_words(2, WordClass::HoldingRegister, 4, 1).unwrap(),
            vec![40]
        );
        assert_eq!(
            store.read_words(2, WordClass::InputRegister, 0, 3).unwrap(),
            vec![50, 60, 0]
        );
    }

    #[test]
    fn test_coil_read_past_coil_bank_is_rejected() {
        let store = RegisterStore::new(small_layout());
        let err = store.read_bits(1, BitClass::Coil, 8, 4).unwrap_err();
        assert_eq!(
            err,
            RequestError::IllegalAddress {
                class: ObjectClass::Coil,
                start_address: 8,
                quantity: 4,
                capacity: 10,
            }
        );
    }

    #[test]
    fn test_out_of_range_write_leaves_banks_untouched() {
        let store = RegisterStore::new(small_layout());
        let before = store.snapshot(1).unwrap();
        assert!(store
            .write_words(1, WordClass::HoldingRegister, 8, &[1, 2, 3])
            .is_err());
        assert!(store
            .write_words(1, WordClass::InputRegister, 4, &[1, 2])
            .is_err());
        let after = store.snapshot(1).unwrap();
        assert_eq!(before.holding_registers(), after.holding_registers());
        assert_eq!(before.input_registers(), after.input_registers());
    }

    #[test]
    fn test_input_side_writes_stay_in_own_bank() {
        let store = RegisterStore::new(small_layout());
        store
            .write_bits(1, BitClass::DiscreteInput, 8, &[true, true])
            .unwrap();
        store
            .write_words(1, WordClass::InputRegister, 0, &[7])
            .unwrap();
        let bank = store.snapshot(1).unwrap();
        assert!(bank.coils().iter().all(|c| !c));
        assert_eq!(&bank.discrete_inputs()[8..], &[true, true]);
        assert_eq!(bank.input_registers()[0], 7);
        assert!(bank.holding_registers().iter().all(|r| *r == 0));
    }

    #[test]
    fn test_failed_discrete_input_write_reports_coil_bound() {
        let store = RegisterStore::new(BankLayout {
            discrete_inputs: 6,
            ..small_layout()
        });
        let err = store
            .write_bits(1, BitClass::DiscreteInput, 5, &[true, true])
            .unwrap_err();
        assert_eq!(
            err,
            RequestError::IllegalAddress {
                class: ObjectClass::DiscreteInput,
                start_address: 5,
                quantity: 2,
                capacity: 10,
            }
        );

        let err = store
            .write_words(2, WordClass::InputRegister, 4, &[1, 2])
            .unwrap_err();
        assert!(matches!(
            err,
            RequestError::IllegalAddress { capacity: 5, .. }
        ));
    }

    #[test]
    fn test_concurrent_reads_never_see_torn_writes() {
        let store = RegisterStore::default();
        let done = AtomicBool::new(false);

        std::thread::scope(|s| {
            s.spawn(|| {
                for round in 0..200u16 {
                    let value = if round % 2 == 0 { 7 } else { 0 };
                    store
                        .write_words(1, WordClass::HoldingRegister, 100, &[value; 100])
                        .unwrap();
                }
                done.store(true, Ordering::SeqCst);
            });

            for _ in 0..2 {
                s.spawn(|| {
                    while !done.load(Ordering::SeqCst) {
                        let values = store
                            .read_words(1, WordClass::HoldingRegister, 100, 100)
                            .unwrap();
                        assert!(
                            values.iter().all(|v| *v == values[0]),
                            "torn read: {values:?}"
                        );
                        assert!(values[0] == 0 || values[0] == 7);
                    }
                });
            }
        });
    }
}
