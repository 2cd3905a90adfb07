// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbus-endpoint project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Errors surfaced by request validation and register access

use std::fmt;

use thiserror::Error;
use tokio_modbus::ExceptionCode;

/// The four addressable object classes of a Modbus unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectClass {
    Coil,
    DiscreteInput,
    HoldingRegister,
    InputRegister,
}

impl fmt::Display for ObjectClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ObjectClass::Coil => "coil",
            ObjectClass::DiscreteInput => "discrete input",
            ObjectClass::HoldingRegister => "holding register",
            ObjectClass::InputRegister => "input register",
        };
        f.write_str(name)
    }
}

/// A request rejected before (or instead of) touching the register banks.
///
/// Both kinds are fatal to the request: no partial result is returned and no
/// value is written.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("Unit {unit_id} is not configured")]
    IllegalUnit { unit_id: u8 },

    #[error(
        "Illegal {class} range: {quantity} value(s) from address {start_address} exceed capacity {capacity}"
    )]
    IllegalAddress {
        class: ObjectClass,
        start_address: u16,
        quantity: usize,
        capacity: usize,
    },
}

/// Translate into the exception returned on the wire.
///
/// An unknown unit is a routing failure on this transport and is reported as
/// `IllegalFunction`, not as an addressing failure.
impl From<RequestError> for ExceptionCode {
    fn from(err: RequestError) -> Self {
        match err {
            RequestError::IllegalUnit { .. } => ExceptionCode::IllegalFunction,
            RequestError::IllegalAddress { .. } => ExceptionCode::IllegalDataAddress,
        }
    }
}
