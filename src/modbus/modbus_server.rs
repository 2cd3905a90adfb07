// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the rust-modbus-endpoint project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus server implementation for the register endpoint
//!
//! For avoiding confusion with the Modbus master/slave terminology, this module uses
//! the terms "server" and "client" instead. The server is the device that provides data,
//! while the client is the device that requests data.
//!
//! One server hosts several units. The unit identifier of every request is
//! taken from the MBAP header and routed to the matching bank of the shared
//! register store.

use std::{
    future,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use log::{debug, error};
use tokio_modbus::prelude::{ExceptionCode, Request, Response, SlaveRequest};

use super::dispatcher::{ReadRequest, Request as UnitRequest, RequestDispatcher};

/// A Modbus TCP service for one client connection.
///
/// Every connection gets its own instance, but all instances share the same
/// [`RequestDispatcher`] and therefore the same register store. When a
/// [`ConnectionSlot`] is attached it is released as soon as the connection
/// closes and the service is dropped.
pub struct RegisterModbusServer {
    dispatcher: RequestDispatcher,
    _slot: Option<ConnectionSlot>,
}

impl tokio_modbus::server::Service for RegisterModbusServer {
    type Request = SlaveRequest<'static>;
    type Response = Response;
    type Exception = ExceptionCode;
    type Future = future::Ready<Result<Self::Response, Self::Exception>>;

    /// Process a Modbus request and provide a response
    ///
    /// Any function code not listed in the module documentation returns an
    /// IllegalFunction exception.
    fn call(&self, req: Self::Request) -> Self::Future {
        let SlaveRequest { slave, request } = req;
        debug!("Received Modbus request for unit {}: {:?}", slave, request);

        let res = self.process(slave, request);

        if let Err(e) = &res {
            error!("Modbus request error for unit {}: {:?}", slave, e);
        }

        future::ready(res)
    }
}

impl RegisterModbusServer {
    pub fn new(dispatcher: RequestDispatcher) -> Self {
        Self {
            dispatcher,
            _slot: None,
        }
    }

    /// Create a service that holds `slot` for the lifetime of the connection.
    pub fn with_slot(dispatcher: RequestDispatcher, slot: ConnectionSlot) -> Self {
        Self {
            dispatcher,
            _slot: Some(slot),
        }
    }

    /// Dispatch one decoded request addressed to `unit_id`.
    pub fn process(&self, unit_id: u8, request: Request<'static>) -> Result<Response, ExceptionCode> {
        let d = &self.dispatcher;
        match request {
            Request::ReadCoils(addr, cnt) => d
                .handle_coils(&UnitRequest::read(unit_id, addr, cnt))
                .map(Response::ReadCoils)
                .map_err(Into::into),
            Request::ReadDiscreteInputs(addr, cnt) => d
                .handle_discrete_inputs(&read_request(unit_id, addr, cnt))
                .map(Response::ReadDiscreteInputs)
                .map_err(Into::into),
            Request::ReadHoldingRegisters(addr, cnt) => d
                .handle_holding_registers(&UnitRequest::read(unit_id, addr, cnt))
                .map(Response::ReadHoldingRegisters)
                .map_err(Into::into),
            Request::ReadInputRegisters(addr, cnt) => d
                .handle_input_registers(&read_request(unit_id, addr, cnt))
                .map(Response::ReadInputRegisters)
                .map_err(Into::into),
            Request::WriteSingleCoil(addr, value) => d
                .handle_coils(&UnitRequest::write(unit_id, addr, vec![value]))
                .map(|_| Response::WriteSingleCoil(addr, value))
                .map_err(Into::into),
            Request::WriteMultipleCoils(addr, values) => {
                let cnt = values.len() as u16;
                d.handle_coils(&UnitRequest::write(unit_id, addr, values.into_owned()))
                    .map(|_| Response::WriteMultipleCoils(addr, cnt))
                    .map_err(Into::into)
            }
            Request::WriteSingleRegister(addr, value) => d
                .handle_holding_registers(&UnitRequest::write(unit_id, addr, vec![value]))
                .map(|_| Response::WriteSingleRegister(addr, value))
                .map_err(Into::into),
            Request::WriteMultipleRegisters(addr, values) => {
                let cnt = values.len() as u16;
                d.handle_holding_registers(&UnitRequest::write(unit_id, addr, values.into_owned()))
                    .map(|_| Response::WriteMultipleRegisters(addr, cnt))
                    .map_err(Into::into)
            }
            Request::ReadWriteMultipleRegisters(read_addr, read_cnt, write_addr, values) => {
                // The write is applied before the read, as two separate steps.
                d.handle_holding_registers(&UnitRequest::write(
                    unit_id,
                    write_addr,
                    values.into_owned(),
                ))?;
                d.handle_holding_registers(&UnitRequest::read(unit_id, read_addr, read_cnt))
                    .map(Response::ReadWriteMultipleRegisters)
                    .map_err(Into::into)
            }
            _ => {
                error!(
                    "Exception::IllegalFunction - Unimplemented function code in request: {request:?}"
                );
                Err(ExceptionCode::IllegalFunction)
            }
        }
    }
}

fn read_request(unit_id: u8, start_address: u16, quantity: u16) -> ReadRequest {
    ReadRequest {
        unit_id,
        start_address,
        quantity,
    }
}

/// Caps the number of clients served at the same time.
#[derive(Debug, Clone)]
pub struct ConnectionLimiter {
    active: Arc<AtomicUsize>,
    max: usize,
}

impl ConnectionLimiter {
    pub fn new(max: usize) -> Self {
        Self {
            active: Arc::new(AtomicUsize::new(0)),
            max,
        }
    }

    /// Reserve a slot, or `None` when `max` clients are already connected.
    pub fn try_acquire(&self) -> Option<ConnectionSlot> {
        self.active
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < self.max).then_some(n + 1)
            })
            .ok()
            .map(|_| ConnectionSlot {
                active: Arc::clone(&self.active),
            })
    }

    pub fn active(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }

    pub fn max(&self) -> usize {
        self.max
    }
}

/// A reserved client slot, released on drop.
#[derive(Debug)]
pub struct ConnectionSlot {
    active: Arc<AtomicUsize>,
}

impl Drop for ConnectionSlot {
    fn drop(&mut self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::RegisterStore;
    use std::borrow::Cow;
    use tokio_modbus::server::Service;

    fn server() -> RegisterModbusServer {
        RegisterModbusServer::new(RequestDispatcher::new(Arc::new(RegisterStore::default())))
    }

    #[test]
    fn test_unknown_unit_maps_to_illegal_function() {
        let server = server();
        let res = server.process(17, Request::ReadHoldingRegisters(0, 1));
        assert_eq!(res, Err(ExceptionCode::IllegalFunction));
    }

    #[test]
    fn test_out_of_range_maps_to_illegal_data_address() {
        let server = server();
        let res = server.process(1, Request::ReadInputRegisters(999, 2));
        assert_eq!(res, Err(ExceptionCode::IllegalDataAddress));
    }

    #[test]
    fn test_write_multiple_coils_echoes_quantity() {
        let server = server();
        let res = server.process(
            1,
            Request::WriteMultipleCoils(9999, Cow::Owned(vec![true, false, true])),
        );
        assert_eq!(res, Ok(Response::WriteMultipleCoils(9999, 3)));

        let res = server.process(1, Request::ReadDiscreteInputs(0, 2));
        assert_eq!(res, Ok(Response::ReadDiscreteInputs(vec![false, true])));
    }

    #[test]
    fn test_write_single_register_then_read() {
        let server = server();
        assert_eq!(
            server.process(2, Request::WriteSingleRegister(42, 999)),
            Ok(Response::WriteSingleRegister(42, 999))
        );
        assert_eq!(
            server.process(2, Request::ReadHoldingRegisters(42, 1)),
            Ok(Response::ReadHoldingRegisters(vec![999]))
        );
    }

    #[test]
    fn test_read_write_multiple_registers() {
        let server = server();
        let res = server.process(
            1,
            Request::ReadWriteMultipleRegisters(10, 3, 11, Cow::Owned(vec![5, 6])),
        );
        assert_eq!(res, Ok(Response::ReadWriteMultipleRegisters(vec![0, 5, 6])));
    }

    #[test]
    fn test_unsupported_function_is_rejected() {
        let server = server();
        let res = server.process(1, Request::MaskWriteRegister(0, 0xFF00, 0x00FF));
        assert_eq!(res, Err(ExceptionCode::IllegalFunction));
    }

    #[tokio::test]
    async fn test_service_call_routes_by_unit() {
        let server = server();
        let res = server
            .call(SlaveRequest {
                slave: 3,
                request: Request::WriteSingleCoil(5, true),
            })
            .await;
        assert_eq!(res, Ok(Response::WriteSingleCoil(5, true)));

        let res = server
            .call(SlaveRequest {
                slave: 3,
                request: Request::ReadCoils(5, 1),
            })
            .await;
        assert_eq!(res, Ok(Response::ReadCoils(vec![true])));
    }

    #[test]
    fn test_connection_limiter_releases_on_drop() {
        let limiter = ConnectionLimiter::new(2);
        let first = limiter.try_acquire();
        let second = limiter.try_acquire();
        assert!(first.is_some());
        assert!(second.is_some());
        assert!(limiter.try_acquire().is_none());
        assert_eq!(limiter.active(), 2);

        drop(first);
        assert_eq!(limiter.active(), 1);
        assert!(limiter.try_acquire().is_some());
        assert_eq!(limiter.active(), 1);
    }
}
