// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbus-endpoint project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Request validation and dispatch
//!
//! The dispatcher sits between the protocol adapter and the register store.
//! Every request goes through the same checks, in this order, before any
//! bank is touched:
//!
//! 1. the unit id must be in `1..=N`, otherwise [`RequestError::IllegalUnit`];
//! 2. the range `start_address .. start_address + quantity` must be non-empty
//!    and fit the capacity of its object class, otherwise
//!    [`RequestError::IllegalAddress`].
//!
//! ## Capacities
//!
//! | Handler | Capacity |
//! |---------|----------|
//! | Coils | `coils + discrete_inputs` |
//! | Discrete inputs | `coils` |
//! | Holding registers | `holding_registers + input_registers` |
//! | Input registers | `input_registers` |
//!
//! The discrete input capacity intentionally reuses the coil length; the
//! configuration requires both banks to have the same size.

use std::sync::Arc;

use log::debug;

use crate::error::{ObjectClass, RequestError};
use crate::store::{BitClass, RegisterStore, WordClass};

/// A read of `quantity` consecutive addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadRequest {
    pub unit_id: u8,
    pub start_address: u16,
    pub quantity: u16,
}

/// A write of `values` to consecutive addresses; the quantity is `values.len()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteRequest<V> {
    pub unit_id: u8,
    pub start_address: u16,
    pub values: Vec<V>,
}

/// A decoded request for an object class that accepts both reads and writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request<V> {
    Read(ReadRequest),
    Write(WriteRequest<V>),
}

impl<V> Request<V> {
    pub fn read(unit_id: u8, start_address: u16, quantity: u16) -> Self {
        Request::Read(ReadRequest {
            unit_id,
            start_address,
            quantity,
        })
    }

    pub fn write(unit_id: u8, start_address: u16, values: Vec<V>) -> Self {
        Request::Write(WriteRequest {
            unit_id,
            start_address,
            values,
        })
    }

    pub fn unit_id(&self) -> u8 {
        match self {
            Request::Read(req) => req.unit_id,
            Request::Write(req) => req.unit_id,
        }
    }

    pub fn start_address(&self) -> u16 {
        match self {
            Request::Read(req) => req.start_address,
            Request::Write(req) => req.start_address,
        }
    }

    pub fn quantity(&self) -> usize {
        match self {
            Request::Read(req) => req.quantity.into(),
            Request::Write(req) => req.values.len(),
        }
    }

    pub fn is_write(&self) -> bool {
        matches!(self, Request::Write(_))
    }
}

/// Validates requests and forwards them to the shared [`RegisterStore`].
///
/// One handler per object class. Write handlers return an empty vector on
/// success.
#[derive(Debug, Clone)]
pub struct RequestDispatcher {
    store: Arc<RegisterStore>,
}

impl RequestDispatcher {
    pub fn new(store: Arc<RegisterStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<RegisterStore> {
        &self.store
    }

    /// Coils, over the concatenated coil + discrete input range.
    ///
    /// Reads are served from the coil bank; writes beyond the last coil
    /// continue into the discrete inputs.
    pub fn handle_coils(&self, req: &Request<bool>) -> Result<Vec<bool>, RequestError> {
        let capacity = self.store.layout().capacity(ObjectClass::Coil);
        self.validate(
            ObjectClass::Coil,
            req.unit_id(),
            req.start_address(),
            req.quantity(),
            capacity,
        )?;

        match req {
            Request::Read(read) => {
                debug!(
                    "Unit {}: reading {} coils from address {}",
                    read.unit_id, read.quantity, read.start_address
                );
                self.store
                    .read_bits(read.unit_id, BitClass::Coil, read.start_address, read.quantity)
            }
            Request::Write(write) => {
                debug!(
                    "Unit {}: writing {} coils from address {}",
                    write.unit_id,
                    write.values.len(),
                    write.start_address
                );
                self.store
                    .write_bits(write.unit_id, BitClass::Coil, write.start_address, &write.values)?;
                Ok(Vec::new())
            }
        }
    }

    /// Discrete inputs, read only.
    pub fn handle_discrete_inputs(&self, req: &ReadRequest) -> Result<Vec<bool>, RequestError> {
        let capacity = self.store.layout().capacity(ObjectClass::DiscreteInput);
        self.validate(
            ObjectClass::DiscreteInput,
            req.unit_id,
            req.start_address,
            req.quantity.into(),
            capacity,
        )?;

        debug!(
            "Unit {}: reading {} discrete inputs from address {}",
            req.unit_id, req.quantity, req.start_address
        );
        self.store
            .read_bits(req.unit_id, BitClass::DiscreteInput, req.start_address, req.quantity)
    }

    /// Holding registers, over the concatenated holding + input register range.
    ///
    /// Reads are served from the holding register bank; writes beyond the
    /// last holding register continue into the input registers.
    pub fn handle_holding_registers(&self, req: &Request<u16>) -> Result<Vec<u16>, RequestError> {
        let capacity = self.store.layout().capacity(ObjectClass::HoldingRegister);
        self.validate(
            ObjectClass::HoldingRegister,
            req.unit_id(),
            req.start_address(),
            req.quantity(),
            capacity,
        )?;

        match req {
            Request::Read(read) => {
                debug!(
                    "Unit {}: reading {} holding registers from address {}",
                    read.unit_id, read.quantity, read.start_address
                );
                self.store.read_words(
                    read.unit_id,
                    WordClass::HoldingRegister,
                    read.start_address,
                    read.quantity,
                )
            }
            Request::Write(write) => {
                debug!(
                    "Unit {}: writing {} holding registers from address {}",
                    write.unit_id,
                    write.values.len(),
                    write.start_address
                );
                self.store.write_words(
                    write.unit_id,
                    WordClass::HoldingRegister,
                    write.start_address,
                    &write.values,
                )?;
                Ok(Vec::new())
            }
        }
    }

    /// Input registers, read only.
    pub fn handle_input_registers(&self, req: &ReadRequest) -> Result<Vec<u16>, RequestError> {
        let capacity = self.store.layout().capacity(ObjectClass::InputRegister);
        self.validate(
            ObjectClass::InputRegister,
            req.unit_id,
            req.start_address,
            req.quantity.into(),
            capacity,
        )?;

        debug!(
            "Unit {}: reading {} input registers from address {}",
            req.unit_id, req.quantity, req.start_address
        );
        self.store
            .read_words(req.unit_id, WordClass::InputRegister, req.start_address, req.quantity)
    }

    fn validate(
        &self,
        class: ObjectClass,
        unit_id: u8,
        start_address: u16,
        quantity: usize,
        capacity: usize,
    ) -> Result<(), RequestError> {
        check_unit(unit_id, self.store.layout().units)?;
        check_range(class, start_address, quantity, capacity)
    }
}

fn check_unit(unit_id: u8, units: u8) -> Result<(), RequestError> {
    if unit_id == 0 || unit_id > units {
        return Err(RequestError::IllegalUnit { unit_id });
    }
    Ok(())
}

/// Empty ranges are rejected: they address nothing.
fn check_range(
    class: ObjectClass,
    start_address: u16,
    quantity: usize,
    capacity: usize,
) -> Result<(), RequestError> {
    if quantity == 0 || usize::from(start_address) + quantity > capacity {
        return Err(RequestError::IllegalAddress {
            class,
            start_address,
            quantity,
            capacity,
        });
    }
    Ok(())
}
