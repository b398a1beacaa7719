// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::future;

use modbus_core::{
    client::{Context, Reader as _, Writer as _},
    prelude::{Exception, ExceptionResponse, Request, Response, ResponsePdu},
    server::Service,
};

pub struct TestService {}

impl TestService {
    fn handle(&self, req: Request) -> Result<Response, Exception> {
        use Request::*;

        match req {
            ReadCoils(_, _) => Err(Exception::Acknowledge),
            ReadDiscreteInputs(_, _) => Err(Exception::GatewayPathUnavailable),
            WriteSingleCoil(_, _) => Err(Exception::GatewayNoResponse),
            WriteMultipleCoils(_, _) => Err(Exception::IllegalAddress),
            ReadInputRegisters(_, _) => Err(Exception::IllegalValue),
            ReadHoldingRegisters(_, _) => Err(Exception::IllegalFunction),
            WriteSingleRegister(_, _) => Err(Exception::MemoryParityError),
            WriteMultipleRegisters(_, _) => Err(Exception::SlaveBusy),
            MaskWriteRegister(_, _, _) => Err(Exception::SlaveFailure),
            _ => Err(Exception::IllegalFunction),
        }
    }
}

impl Service for TestService {
    type Request = Request;
    type Response = ResponsePdu;
    type Error = std::io::Error;
    type Future = future::Ready<Result<Self::Response, Self::Error>>;

    fn call(&self, req: Self::Request) -> Self::Future {
        let function = match &req {
            Request::ReadCoils(..) => 1,
            Request::ReadDiscreteInputs(..) => 2,
            Request::WriteSingleCoil(..) => 5,
            Request::WriteMultipleCoils(..) => 15,
            Request::ReadInputRegisters(..) => 4,
            Request::ReadHoldingRegisters(..) => 3,
            Request::WriteSingleRegister(..) => 6,
            Request::WriteMultipleRegisters(..) => 16,
            Request::MaskWriteRegister(..) => 22,
            Request::ReadWriteMultipleRegisters(..) => 23,
            _ => 0,
        };
        let pdu = match self.handle(req) {
            Ok(rsp) => ResponsePdu(Ok(rsp)),
            Err(exception) => ResponsePdu(Err(ExceptionResponse { function, exception })),
        };
        future::ready(Ok(pdu))
    }
}

/// Drives every request kind against [`TestService`] and checks that the
/// exception each one maps to comes back as an I/O error whose message
/// names that exception.
pub async fn check_client_context(mut ctx: Context) {
    let err = ctx.read_coils(0x00, 2).await.unwrap_err();
    assert!(err.to_string().contains("Acknowledge"));

    let err = ctx.read_discrete_inputs(0x00, 2).await.unwrap_err();
    assert!(err.to_string().contains("Gateway path unavailable"));

    let err = ctx.write_single_coil(0x00, true).await.unwrap_err();
    assert!(err
        .to_string()
        .contains("Gateway target device failed to respond"));

    let err = ctx.write_multiple_coils(0x00, &[true]).await.unwrap_err();
    assert!(err.to_string().contains("Illegal data address"));

    let err = ctx.read_input_registers(0x00, 2).await.unwrap_err();
    assert!(err.to_string().contains("Illegal data value"));

    let err = ctx.read_holding_registers(0x00, 2).await.unwrap_err();
    assert!(err.to_string().contains("Illegal function"));

    let err = ctx.write_single_register(0x00, 42).await.unwrap_err();
    assert!(err.to_string().contains("Memory parity error"));

    let err = ctx
        .write_multiple_registers(0x00, &[42])
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Slave device busy"));

    let err = ctx
        .read_write_multiple_registers(0x00, 2, 0x00, &[42])
        .await
        .unwrap_err();
    assert!(err.to_string().contains("Illegal function"));
}
