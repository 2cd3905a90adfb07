// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbus-endpoint project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus communication module
//!
//! This module turns decoded Modbus requests into register store operations.
//!
//! ## Key Components
//!
//! - `RequestDispatcher`: validates unit ids and address ranges and calls the
//!   register store, one handler per object class.
//! - `RegisterModbusServer`: the `tokio-modbus` service that maps function
//!   codes onto the dispatcher handlers and errors onto exception codes.
//! - `ConnectionLimiter`: caps the number of concurrently served clients.
//! - `ClientStream`: connection transport that closes on daemon shutdown or
//!   after an idle timeout.
//!
//! ## Supported Function Codes
//!
//! | Code | Function | Handler |
//! |------|----------|---------|
//! | 0x01 | Read Coils | coils |
//! | 0x02 | Read Discrete Inputs | discrete inputs |
//! | 0x03 | Read Holding Registers | holding registers |
//! | 0x04 | Read Input Registers | input registers |
//! | 0x05 | Write Single Coil | coils |
//! | 0x06 | Write Single Register | holding registers |
//! | 0x0F | Write Multiple Coils | coils |
//! | 0x10 | Write Multiple Registers | holding registers |
//! | 0x17 | Read/Write Multiple Registers | holding registers |

pub mod client_stream;
pub mod dispatcher;
pub mod modbus_server;

pub use client_stream::ClientStream;
pub use dispatcher::{ReadRequest, Request, RequestDispatcher, WriteRequest};
pub use modbus_server::{ConnectionLimiter, ConnectionSlot, RegisterModbusServer};
