// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Executes a decoded [`Request`] against a [`SlaveContext`], producing a
//! typed [`Response`] or an [`Exception`].
//!
//! Range validation always runs before the address/datastore validation, so
//! an out-of-range count is reported as [`Exception::IllegalValue`] even when
//! the address would also be out of range — see the range policy tie-break
//! in the PDU layer.

use crate::{
    datastore::Space,
    frame::{Exception, Request, Response},
};

const BIT_COUNT_MAX: u16 = 0x7D0;
const READ_REGISTER_COUNT_MAX: u16 = 0x7D;
const WRITE_REGISTER_COUNT_MAX: u16 = 0x7B;

fn in_range(count: u16, max: u16) -> bool {
    count >= 1 && count <= max
}

/// Executes `req` against `ctx`, returning either the response or the
/// exception to send back to the caller.
pub(crate) fn execute(
    req: &Request,
    ctx: &mut crate::datastore::SlaveContext,
) -> Result<Response, Exception> {
    match req {
        Request::ReadCoils(addr, count) => {
            read_bits(ctx, Space::Coils, *addr, *count).map(Response::ReadCoils)
        }
        Request::ReadDiscreteInputs(addr, count) => {
            read_bits(ctx, Space::Discretes, *addr, *count).map(Response::ReadDiscreteInputs)
        }
        Request::ReadInputRegisters(addr, count) => {
            read_words(ctx, Space::InputRegisters, *addr, *count)
                .map(Response::ReadInputRegisters)
        }
        Request::ReadHoldingRegisters(addr, count) => {
            read_words(ctx, Space::HoldingRegisters, *addr, *count)
                .map(Response::ReadHoldingRegisters)
        }
        Request::WriteSingleCoil(addr, value) => {
            if !ctx.validate_bits(Space::Coils, *addr, 1) {
                return Err(Exception::IllegalAddress);
            }
            ctx.set_bits(Space::Coils, *addr, &[*value]);
            Ok(Response::WriteSingleCoil(*addr, *value))
        }
        Request::WriteSingleRegister(addr, value) => {
            if !ctx.validate_words(Space::HoldingRegisters, *addr, 1) {
                return Err(Exception::IllegalAddress);
            }
            ctx.set_words(Space::HoldingRegisters, *addr, &[*value]);
            Ok(Response::WriteSingleRegister(*addr, *value))
        }
        Request::WriteMultipleCoils(addr, values) => {
            let count = values.len() as u16;
            if !in_range(count, BIT_COUNT_MAX) {
                return Err(Exception::IllegalValue);
            }
            if !ctx.validate_bits(Space::Coils, *addr, count) {
                return Err(Exception::IllegalAddress);
            }
            ctx.set_bits(Space::Coils, *addr, values);
            Ok(Response::WriteMultipleCoils(*addr, count))
        }
        Request::WriteMultipleRegisters(addr, values) => {
            let count = values.len() as u16;
            if !in_range(count, WRITE_REGISTER_COUNT_MAX) {
                return Err(Exception::IllegalValue);
            }
            if !ctx.validate_words(Space::HoldingRegisters, *addr, count) {
                return Err(Exception::IllegalAddress);
            }
            ctx.set_words(Space::HoldingRegisters, *addr, values);
            Ok(Response::WriteMultipleRegisters(*addr, count))
        }
        Request::ReadWriteMultipleRegisters(read_addr, read_count, write_addr, write_data) => {
            let write_count = write_data.len() as u16;
            if !in_range(write_count, WRITE_REGISTER_COUNT_MAX)
                || !in_range(*read_count, READ_REGISTER_COUNT_MAX)
            {
                return Err(Exception::IllegalValue);
            }
            if !ctx.validate_words(Space::HoldingRegisters, *write_addr, write_count)
                || !ctx.validate_words(Space::HoldingRegisters, *read_addr, *read_count)
            {
                return Err(Exception::IllegalAddress);
            }
            // Writes are executed before reads, so a read window that overlaps
            // the write window observes the new values.
            ctx.set_words(Space::HoldingRegisters, *write_addr, write_data);
            let values = ctx.get_words(Space::HoldingRegisters, *read_addr, *read_count);
            Ok(Response::ReadWriteMultipleRegisters(values))
        }
        Request::MaskWriteRegister(addr, and_mask, or_mask) => {
            if !ctx.validate_words(Space::HoldingRegisters, *addr, 1) {
                return Err(Exception::IllegalAddress);
            }
            let current = ctx.get_words(Space::HoldingRegisters, *addr, 1)[0];
            let result = (current & and_mask) | (or_mask & !and_mask);
            ctx.set_words(Space::HoldingRegisters, *addr, &[result]);
            Ok(Response::MaskWriteRegister(*addr, *and_mask, *or_mask))
        }
        Request::ReadFifoQueue(_addr) => {
            // No FIFO queue storage is part of the datastore contract; an
            // empty queue is a valid, deterministic response.
            Ok(Response::ReadFifoQueue(Vec::new()))
        }
        Request::ReadExceptionStatus => Ok(Response::ReadExceptionStatus(0)),
        Request::GetCommEventCounter => Ok(Response::GetCommEventCounter(0, 0)),
        Request::GetCommEventLog => Ok(Response::GetCommEventLog(0, 0, 0, Vec::new())),
        Request::ReportSlaveId => Ok(Response::ReportSlaveId(0x00, Vec::new())),
        Request::Diagnostics(sub_function_code, data) => {
            // Only `ReturnQueryData` (sub-function 0x0000) can be implemented
            // without a diagnostic counter backing store; every other
            // sub-function, including the Modbus Plus statistics family,
            // falls back to `IllegalFunction`.
            if *sub_function_code == 0x0000 {
                Ok(Response::Diagnostics(0x0000, data.clone()))
            } else {
                Err(Exception::IllegalFunction)
            }
        }
        Request::ReadFileRecord(_) | Request::WriteFileRecord(_) => {
            Err(Exception::IllegalFunction)
        }
        Request::ReadDeviceInformation(_, _) => Err(Exception::IllegalFunction),
        Request::Custom(_, _) | Request::Disconnect => Err(Exception::IllegalFunction),
    }
}

fn read_bits(
    ctx: &crate::datastore::SlaveContext,
    space: Space,
    addr: u16,
    count: u16,
) -> Result<Vec<bool>, Exception> {
    if !in_range(count, BIT_COUNT_MAX) {
        return Err(Exception::IllegalValue);
    }
    if !ctx.validate_bits(space, addr, count) {
        return Err(Exception::IllegalAddress);
    }
    Ok(ctx.get_bits(space, addr, count))
}

fn read_words(
    ctx: &crate::datastore::SlaveContext,
    space: Space,
    addr: u16,
    count: u16,
) -> Result<Vec<u16>, Exception> {
    if !in_range(count, READ_REGISTER_COUNT_MAX) {
        return Err(Exception::IllegalValue);
    }
    if !ctx.validate_words(space, addr, count) {
        return Err(Exception::IllegalAddress);
    }
    Ok(ctx.get_words(space, addr, count))
}
