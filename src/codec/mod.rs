#![allow(deprecated)]
#[cfg(feature = "rtu")]
pub mod rtu;

#[cfg(feature = "tcp")]
pub mod tcp;

#[cfg(feature = "ascii")]
pub mod ascii;

#[cfg(feature = "binary")]
pub mod binary;

pub(crate) mod primitives;

use crate::factory::{ClientDecoder, ServerDecoder};
use crate::frame::*;

use byteorder::{BigEndian, ReadBytesExt};
use bytes::{BufMut, Bytes, BytesMut};
use std::convert::TryFrom;
use std::io::{self, Cursor, Error, ErrorKind};

use primitives::{pack_bits, unpack_bits};

/// Message Type Identifier of the Device Identification MEI, the only MEI
/// sub-type function code 43 is given a typed representation for.
const MEI_TYPE_DEVICE_IDENTIFICATION: u8 = 0x0E;

impl From<Request> for Bytes {
    fn from(req: Request) -> Bytes {
        let cnt = request_byte_count(&req);
        let mut data = BytesMut::with_capacity(cnt);
        use crate::frame::Request::*;
        data.put_u8(req_to_fn_code(&req));
        match req {
            ReadCoils(address, quantity)
            | ReadDiscreteInputs(address, quantity)
            | ReadInputRegisters(address, quantity)
            | ReadHoldingRegisters(address, quantity) => {
                data.put_u16(address);
                data.put_u16(quantity);
            }
            WriteSingleCoil(address, state) => {
                data.put_u16(address);
                data.put_u16(bool_to_coil(state));
            }
            WriteMultipleCoils(address, coils) => {
                data.put_u16(address);
                let len = coils.len();
                data.put_u16(len as u16);
                let packed_coils = pack_bits(&coils);
                data.put_u8(packed_coils.len() as u8);
                data.put_slice(&packed_coils);
            }
            WriteSingleRegister(address, word) => {
                data.put_u16(address);
                data.put_u16(word);
            }
            WriteMultipleRegisters(address, words) => {
                data.put_u16(address);
                let len = words.len();
                data.put_u16(len as u16);
                data.put_u8((len as u8) * 2);
                for w in words {
                    data.put_u16(w);
                }
            }
            ReadWriteMultipleRegisters(read_address, quantity, write_address, words) => {
                data.put_u16(read_address);
                data.put_u16(quantity);
                data.put_u16(write_address);
                let n = words.len();
                data.put_u16(n as u16);
                data.put_u8(n as u8 * 2);
                for w in words {
                    data.put_u16(w);
                }
            }
            ReadExceptionStatus | GetCommEventCounter | GetCommEventLog | ReportSlaveId => {
                // No request body beyond the function code.
            }
            ReadFileRecord(refs) => {
                data.put_u8((refs.len() * 7) as u8);
                for (file_number, record_number, record_length) in refs {
                    data.put_u8(0x06);
                    data.put_u16(file_number);
                    data.put_u16(record_number);
                    data.put_u16(record_length);
                }
            }
            WriteFileRecord(records) => {
                put_write_file_records(&mut data, &records);
            }
            MaskWriteRegister(address, and_mask, or_mask) => {
                data.put_u16(address);
                data.put_u16(and_mask);
                data.put_u16(or_mask);
            }
            ReadFifoQueue(address) => {
                data.put_u16(address);
            }
            Diagnostics(sub_function_code, words) => {
                data.put_u16(sub_function_code);
                for w in words {
                    data.put_u16(w);
                }
            }
            ReadDeviceInformation(read_device_id_code, object_id) => {
                data.put_u8(MEI_TYPE_DEVICE_IDENTIFICATION);
                data.put_u8(read_device_id_code);
                data.put_u8(object_id);
            }
            Custom(_, custom_data) => {
                data.put_slice(&custom_data);
            }
            Disconnect => unreachable!(),
        }
        data.freeze()
    }
}

fn put_write_file_records(data: &mut BytesMut, records: &[FileRecord]) {
    let byte_count: usize = records.iter().map(|r| 7 + r.record_data.len() * 2).sum();
    data.put_u8(byte_count as u8);
    for record in records {
        data.put_u8(0x06);
        data.put_u16(record.file_number);
        data.put_u16(record.record_number);
        data.put_u16(record.record_data.len() as u16);
        for w in &record.record_data {
            data.put_u16(*w);
        }
    }
}

impl From<RequestPdu> for Bytes {
    fn from(pdu: RequestPdu) -> Bytes {
        pdu.0.into()
    }
}

impl From<Response> for Bytes {
    fn from(rsp: Response) -> Bytes {
        let cnt = response_byte_count(&rsp);
        let mut data = BytesMut::with_capacity(cnt);
        use crate::frame::Response::*;
        data.put_u8(rsp_to_fn_code(&rsp));
        match rsp {
            ReadCoils(coils) | ReadDiscreteInputs(coils) => {
                let packed_coils = pack_bits(&coils);
                data.put_u8(packed_coils.len() as u8);
                data.put_slice(&packed_coils);
            }
            ReadInputRegisters(registers)
            | ReadHoldingRegisters(registers)
            | ReadWriteMultipleRegisters(registers) => {
                data.put_u8((registers.len() * 2) as u8);
                for r in registers {
                    data.put_u16(r);
                }
            }
            WriteSingleCoil(address, state) => {
                data.put_u16(address);
                data.put_u16(bool_to_coil(state));
            }
            WriteMultipleCoils(address, quantity) | WriteMultipleRegisters(address, quantity) => {
                data.put_u16(address);
                data.put_u16(quantity);
            }
            WriteSingleRegister(address, word) => {
                data.put_u16(address);
                data.put_u16(word);
            }
            ReadExceptionStatus(status) => {
                data.put_u8(status);
            }
            GetCommEventCounter(status, event_count) => {
                data.put_u16(status);
                data.put_u16(event_count);
            }
            GetCommEventLog(status, event_count, message_count, events) => {
                data.put_u8((6 + events.len()) as u8);
                data.put_u16(status);
                data.put_u16(event_count);
                data.put_u16(message_count);
                data.put_slice(&events);
            }
            ReportSlaveId(run_indicator_status, additional_data) => {
                data.put_u8((1 + additional_data.len()) as u8);
                data.put_u8(run_indicator_status);
                data.put_slice(&additional_data);
            }
            ReadFileRecord(groups) => {
                let byte_count: usize = groups.iter().map(|g| 2 + g.len() * 2).sum();
                data.put_u8(byte_count as u8);
                for words in groups {
                    data.put_u8((1 + words.len() * 2) as u8);
                    data.put_u8(0x06);
                    for w in words {
                        data.put_u16(w);
                    }
                }
            }
            WriteFileRecord(records) => {
                put_write_file_records(&mut data, &records);
            }
            MaskWriteRegister(address, and_mask, or_mask) => {
                data.put_u16(address);
                data.put_u16(and_mask);
                data.put_u16(or_mask);
            }
            ReadFifoQueue(values) => {
                data.put_u16((2 + values.len() * 2) as u16);
                data.put_u16(values.len() as u16);
                for v in values {
                    data.put_u16(v);
                }
            }
            Diagnostics(sub_function_code, words) => {
                data.put_u16(sub_function_code);
                for w in words {
                    data.put_u16(w);
                }
            }
            ReadDeviceInformation(conformity_level, objects) => {
                data.put_u8(MEI_TYPE_DEVICE_IDENTIFICATION);
                data.put_u8(0x01); // read device id code, not retained by this type
                data.put_u8(conformity_level);
                data.put_u8(0x00); // more follows
                data.put_u8(0x00); // next object id
                data.put_u8(objects.len() as u8);
                for (object_id, value) in objects {
                    data.put_u8(object_id);
                    data.put_u8(value.len() as u8);
                    data.put_slice(&value);
                }
            }
            Custom(_, custom_data) => {
                data.put_slice(&custom_data);
            }
        }
        data.freeze()
    }
}

impl From<ExceptionResponse> for Bytes {
    fn from(ex: ExceptionResponse) -> Bytes {
        let mut data = BytesMut::with_capacity(2);
        debug_assert!(ex.function < 0x80);
        data.put_u8(ex.function + 0x80);
        data.put_u8(ex.exception as u8);
        data.freeze()
    }
}

impl From<ResponsePdu> for Bytes {
    fn from(pdu: ResponsePdu) -> Bytes {
        pdu.0.map_or_else(Into::into, Into::into)
    }
}

impl TryFrom<Bytes> for Request {
    type Error = Error;

    fn try_from(bytes: Bytes) -> Result<Self, Self::Error> {
        use crate::frame::Request::*;
        let mut rdr = Cursor::new(&bytes);
        let fn_code = rdr.read_u8()?;
        let req = match fn_code {
            0x01 => ReadCoils(rdr.read_u16::<BigEndian>()?, rdr.read_u16::<BigEndian>()?),
            0x02 => ReadDiscreteInputs(rdr.read_u16::<BigEndian>()?, rdr.read_u16::<BigEndian>()?),
            0x05 => WriteSingleCoil(
                rdr.read_u16::<BigEndian>()?,
                coil_to_bool(rdr.read_u16::<BigEndian>()?)?,
            ),
            0x0F => {
                let address = rdr.read_u16::<BigEndian>()?;
                let quantity = rdr.read_u16::<BigEndian>()?;
                let byte_count = rdr.read_u8()?;
                if bytes.len() < (6 + byte_count as usize) {
                    return Err(Error::new(ErrorKind::InvalidData, "Invalid byte count"));
                }
                let x = &bytes[6..];
                WriteMultipleCoils(address, unpack_bits(x, quantity as usize))
            }
            0x04 => ReadInputRegisters(rdr.read_u16::<BigEndian>()?, rdr.read_u16::<BigEndian>()?),
            0x03 => {
                ReadHoldingRegisters(rdr.read_u16::<BigEndian>()?, rdr.read_u16::<BigEndian>()?)
            }
            0x06 => WriteSingleRegister(rdr.read_u16::<BigEndian>()?, rdr.read_u16::<BigEndian>()?),
            0x07 => ReadExceptionStatus,
            0x08 => {
                let sub_function_code = rdr.read_u16::<BigEndian>()?;
                let mut data = vec![];
                while let Ok(w) = rdr.read_u16::<BigEndian>() {
                    data.push(w);
                }
                Diagnostics(sub_function_code, data)
            }
            0x0B => GetCommEventCounter,
            0x0C => GetCommEventLog,
            0x10 => {
                let address = rdr.read_u16::<BigEndian>()?;
                let quantity = rdr.read_u16::<BigEndian>()?;
                let byte_count = rdr.read_u8()? as usize;
                if bytes.len() < (6 + byte_count) {
                    return Err(Error::new(ErrorKind::InvalidData, "Invalid byte count"));
                }
                let mut data = vec![];
                for _ in 0..quantity {
                    data.push(rdr.read_u16::<BigEndian>()?);
                }
                WriteMultipleRegisters(address, data)
            }
            0x11 => ReportSlaveId,
            0x14 => {
                let byte_count = rdr.read_u8()? as usize;
                if bytes.len() < (2 + byte_count) {
                    return Err(Error::new(ErrorKind::InvalidData, "Invalid byte count"));
                }
                let groups = byte_count / 7;
                let mut refs = Vec::with_capacity(groups);
                for _ in 0..groups {
                    let _reference_type = rdr.read_u8()?;
                    let file_number = rdr.read_u16::<BigEndian>()?;
                    let record_number = rdr.read_u16::<BigEndian>()?;
                    let record_length = rdr.read_u16::<BigEndian>()?;
                    refs.push((file_number, record_number, record_length));
                }
                ReadFileRecord(refs)
            }
            0x15 => WriteFileRecord(read_file_records(&mut rdr)?),
            0x16 => MaskWriteRegister(
                rdr.read_u16::<BigEndian>()?,
                rdr.read_u16::<BigEndian>()?,
                rdr.read_u16::<BigEndian>()?,
            ),
            0x17 => {
                let read_address = rdr.read_u16::<BigEndian>()?;
                let read_quantity = rdr.read_u16::<BigEndian>()?;
                let write_address = rdr.read_u16::<BigEndian>()?;
                let write_quantity = rdr.read_u16::<BigEndian>()?;
                let write_count = rdr.read_u8()? as usize;
                let mut data = vec![];
                if bytes.len() < (10 + write_count) {
                    return Err(Error::new(ErrorKind::InvalidData, "Invalid byte count"));
                }
                for _ in 0..write_quantity {
                    data.push(rdr.read_u16::<BigEndian>()?);
                }
                ReadWriteMultipleRegisters(read_address, read_quantity, write_address, data)
            }
            0x18 => ReadFifoQueue(rdr.read_u16::<BigEndian>()?),
            0x2B => {
                let _mei_type = rdr.read_u8()?;
                let read_device_id_code = rdr.read_u8()?;
                let object_id = rdr.read_u8()?;
                ReadDeviceInformation(read_device_id_code, object_id)
            }
            fn_code if fn_code < 0x80 => Custom(fn_code, bytes.slice(1..)),
            fn_code => {
                return Err(Error::new(
                    ErrorKind::InvalidData,
                    format!("Invalid function code: 0x{fn_code:0>2X}"),
                ));
            }
        };
        Ok(req)
    }
}

fn read_file_records(rdr: &mut Cursor<&Bytes>) -> io::Result<Vec<FileRecord>> {
    let byte_count = rdr.read_u8()? as usize;
    let end = rdr.position() as usize + byte_count;
    let mut records = vec![];
    while (rdr.position() as usize) < end {
        let _reference_type = rdr.read_u8()?;
        let file_number = rdr.read_u16::<BigEndian>()?;
        let record_number = rdr.read_u16::<BigEndian>()?;
        let record_length = rdr.read_u16::<BigEndian>()?;
        let mut record_data = Vec::with_capacity(record_length as usize);
        for _ in 0..record_length {
            record_data.push(rdr.read_u16::<BigEndian>()?);
        }
        records.push(FileRecord {
            file_number,
            record_number,
            record_data,
        });
    }
    Ok(records)
}

impl TryFrom<Bytes> for RequestPdu {
    type Error = Error;

    fn try_from(bytes: Bytes) -> Result<Self, Self::Error> {
        let pdu = ServerDecoder::new().decode_request(bytes)?.into();
        Ok(pdu)
    }
}

impl TryFrom<Bytes> for Response {
    type Error = Error;

    fn try_from(bytes: Bytes) -> Result<Self, Self::Error> {
        use crate::frame::Response::*;
        let mut rdr = Cursor::new(&bytes);
        let fn_code = rdr.read_u8()?;
        let rsp = match fn_code {
            0x01 => {
                let byte_count = rdr.read_u8()?;
                let x = &bytes[2..];
                // No information about the exact requested quantity is
                // available here, so the whole trailing byte is unpacked.
                let quantity = u16::from(byte_count) * 8;
                ReadCoils(unpack_bits(x, quantity as usize))
            }
            0x02 => {
                let byte_count = rdr.read_u8()?;
                let x = &bytes[2..];
                let quantity = u16::from(byte_count) * 8;
                ReadDiscreteInputs(unpack_bits(x, quantity as usize))
            }
            0x05 => WriteSingleCoil(
                rdr.read_u16::<BigEndian>()?,
                coil_to_bool(rdr.read_u16::<BigEndian>()?)?,
            ),
            0x0F => WriteMultipleCoils(rdr.read_u16::<BigEndian>()?, rdr.read_u16::<BigEndian>()?),
            0x04 => {
                let byte_count = rdr.read_u8()?;
                let quantity = byte_count / 2;
                let mut data = vec![];
                for _ in 0..quantity {
                    data.push(rdr.read_u16::<BigEndian>()?);
                }
                ReadInputRegisters(data)
            }
            0x03 => {
                let byte_count = rdr.read_u8()?;
                let quantity = byte_count / 2;
                let mut data = vec![];
                for _ in 0..quantity {
                    data.push(rdr.read_u16::<BigEndian>()?);
                }
                ReadHoldingRegisters(data)
            }
            0x06 => WriteSingleRegister(rdr.read_u16::<BigEndian>()?, rdr.read_u16::<BigEndian>()?),
            0x07 => ReadExceptionStatus(rdr.read_u8()?),
            0x08 => {
                let sub_function_code = rdr.read_u16::<BigEndian>()?;
                let mut data = vec![];
                while let Ok(w) = rdr.read_u16::<BigEndian>() {
                    data.push(w);
                }
                Diagnostics(sub_function_code, data)
            }
            0x0B => GetCommEventCounter(rdr.read_u16::<BigEndian>()?, rdr.read_u16::<BigEndian>()?),
            0x0C => {
                let byte_count = rdr.read_u8()? as usize;
                let status = rdr.read_u16::<BigEndian>()?;
                let event_count = rdr.read_u16::<BigEndian>()?;
                let message_count = rdr.read_u16::<BigEndian>()?;
                let mut events = Vec::with_capacity(byte_count.saturating_sub(6));
                for _ in 0..byte_count.saturating_sub(6) {
                    events.push(rdr.read_u8()?);
                }
                GetCommEventLog(status, event_count, message_count, events)
            }
            0x10 => {
                WriteMultipleRegisters(rdr.read_u16::<BigEndian>()?, rdr.read_u16::<BigEndian>()?)
            }
            0x11 => {
                let byte_count = rdr.read_u8()? as usize;
                let run_indicator_status = rdr.read_u8()?;
                let mut additional_data = Vec::with_capacity(byte_count.saturating_sub(1));
                for _ in 0..byte_count.saturating_sub(1) {
                    additional_data.push(rdr.read_u8()?);
                }
                ReportSlaveId(run_indicator_status, additional_data)
            }
            0x14 => {
                let byte_count = rdr.read_u8()? as usize;
                let end = rdr.position() as usize + byte_count;
                let mut groups = vec![];
                while (rdr.position() as usize) < end {
                    let response_data_length = rdr.read_u8()? as usize;
                    let _reference_type = rdr.read_u8()?;
                    let word_count = (response_data_length - 1) / 2;
                    let mut words = Vec::with_capacity(word_count);
                    for _ in 0..word_count {
                        words.push(rdr.read_u16::<BigEndian>()?);
                    }
                    groups.push(words);
                }
                ReadFileRecord(groups)
            }
            0x15 => WriteFileRecord(read_file_records(&mut rdr)?),
            0x16 => MaskWriteRegister(
                rdr.read_u16::<BigEndian>()?,
                rdr.read_u16::<BigEndian>()?,
                rdr.read_u16::<BigEndian>()?,
            ),
            0x17 => {
                let byte_count = rdr.read_u8()?;
                let quantity = byte_count / 2;
                let mut data = vec![];
                for _ in 0..quantity {
                    data.push(rdr.read_u16::<BigEndian>()?);
                }
                ReadWriteMultipleRegisters(data)
            }
            0x18 => {
                let _byte_count = rdr.read_u16::<BigEndian>()?;
                let fifo_count = rdr.read_u16::<BigEndian>()?;
                let mut values = Vec::with_capacity(fifo_count as usize);
                for _ in 0..fifo_count {
                    values.push(rdr.read_u16::<BigEndian>()?);
                }
                ReadFifoQueue(values)
            }
            0x2B => {
                let _mei_type = rdr.read_u8()?;
                let _read_device_id_code = rdr.read_u8()?;
                let conformity_level = rdr.read_u8()?;
                let _more_follows = rdr.read_u8()?;
                let _next_object_id = rdr.read_u8()?;
                let number_of_objects = rdr.read_u8()?;
                let mut objects = Vec::with_capacity(number_of_objects as usize);
                for _ in 0..number_of_objects {
                    let object_id = rdr.read_u8()?;
                    let len = rdr.read_u8()? as usize;
                    let mut value = Vec::with_capacity(len);
                    for _ in 0..len {
                        value.push(rdr.read_u8()?);
                    }
                    objects.push((object_id, value));
                }
                ReadDeviceInformation(conformity_level, objects)
            }
            _ => Custom(fn_code, bytes[1..].to_vec()),
        };
        Ok(rsp)
    }
}

impl TryFrom<Bytes> for ExceptionResponse {
    type Error = Error;

    fn try_from(bytes: Bytes) -> Result<Self, Self::Error> {
        let mut rdr = Cursor::new(&bytes);
        let fn_err_code = rdr.read_u8()?;
        if fn_err_code < 0x80 {
            return Err(Error::new(
                ErrorKind::InvalidData,
                "Invalid exception function code",
            ));
        }
        let function = fn_err_code - 0x80;
        let exception = Exception::try_from(rdr.read_u8()?)?;
        Ok(ExceptionResponse {
            function,
            exception,
        })
    }
}

impl TryFrom<u8> for Exception {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        use crate::frame::Exception::*;
        let ex = match code {
            0x01 => IllegalFunction,
            0x02 => IllegalAddress,
            0x03 => IllegalValue,
            0x04 => SlaveFailure,
            0x05 => Acknowledge,
            0x06 => SlaveBusy,
            0x08 => MemoryParityError,
            0x0A => GatewayPathUnavailable,
            0x0B => GatewayNoResponse,
            _ => {
                return Err(Error::new(ErrorKind::InvalidData, "Invalid exception code"));
            }
        };
        Ok(ex)
    }
}

impl TryFrom<Bytes> for ResponsePdu {
    type Error = Error;

    fn try_from(bytes: Bytes) -> Result<Self, Self::Error> {
        let fn_code = Cursor::new(&bytes).read_u8()?;
        let pdu = if fn_code < 0x80 {
            ClientDecoder::new().decode_response(bytes)?.into()
        } else {
            ExceptionResponse::try_from(bytes)?.into()
        };
        Ok(pdu)
    }
}

fn bool_to_coil(state: bool) -> u16 {
    if state {
        0xFF00
    } else {
        0x0000
    }
}

/// Rejects any raw value other than `0x0000`/`0xFF00`, matching the wire
/// constraint on function code 5: a malformed coil value is a decode-time
/// error rather than something [`crate::execute`] can turn into an
/// `IllegalValue` exception response, since by the time a typed `Coil`
/// would reach execution the invalid raw value is already gone.
fn coil_to_bool(coil: u16) -> io::Result<bool> {
    match coil {
        0xFF00 => Ok(true),
        0x0000 => Ok(false),
        _ => Err(Error::new(
            ErrorKind::InvalidData,
            format!("Invalid coil value: 0x{coil:04X}"),
        )),
    }
}

fn packed_coils_len(bitcount: usize) -> usize {
    (bitcount + 7) / 8
}

pub(crate) fn req_to_fn_code(req: &Request) -> u8 {
    use crate::frame::Request::*;
    match req {
        ReadCoils(_, _) => 0x01,
        ReadDiscreteInputs(_, _) => 0x02,
        WriteSingleCoil(_, _) => 0x05,
        WriteMultipleCoils(_, _) => 0x0F,
        ReadInputRegisters(_, _) => 0x04,
        ReadHoldingRegisters(_, _) => 0x03,
        WriteSingleRegister(_, _) => 0x06,
        WriteMultipleRegisters(_, _) => 0x10,
        ReadWriteMultipleRegisters(_, _, _, _) => 0x17,
        ReadExceptionStatus => 0x07,
        Diagnostics(_, _) => 0x08,
        GetCommEventCounter => 0x0B,
        GetCommEventLog => 0x0C,
        ReportSlaveId => 0x11,
        ReadFileRecord(_) => 0x14,
        WriteFileRecord(_) => 0x15,
        MaskWriteRegister(_, _, _) => 0x16,
        ReadFifoQueue(_) => 0x18,
        ReadDeviceInformation(_, _) => 0x2B,
        Custom(code, _) => *code,
        Disconnect => unreachable!(),
    }
}

fn rsp_to_fn_code(rsp: &Response) -> u8 {
    use crate::frame::Response::*;
    match rsp {
        ReadCoils(_) => 0x01,
        ReadDiscreteInputs(_) => 0x02,
        WriteSingleCoil(_, _) => 0x05,
        WriteMultipleCoils(_, _) => 0x0F,
        ReadInputRegisters(_) => 0x04,
        ReadHoldingRegisters(_) => 0x03,
        WriteSingleRegister(_, _) => 0x06,
        WriteMultipleRegisters(_, _) => 0x10,
        ReadWriteMultipleRegisters(_) => 0x17,
        ReadExceptionStatus(_) => 0x07,
        Diagnostics(_, _) => 0x08,
        GetCommEventCounter(_, _) => 0x0B,
        GetCommEventLog(_, _, _, _) => 0x0C,
        ReportSlaveId(_, _) => 0x11,
        ReadFileRecord(_) => 0x14,
        WriteFileRecord(_) => 0x15,
        MaskWriteRegister(_, _, _) => 0x16,
        ReadFifoQueue(_) => 0x18,
        ReadDeviceInformation(_, _) => 0x2B,
        Custom(code, _) => *code,
    }
}

fn request_byte_count(req: &Request) -> usize {
    use crate::frame::Request::*;
    match req {
        ReadCoils(_, _)
        | ReadDiscreteInputs(_, _)
        | ReadInputRegisters(_, _)
        | ReadHoldingRegisters(_, _)
        | WriteSingleRegister(_, _)
        | WriteSingleCoil(_, _) => 5,
        WriteMultipleCoils(_, coils) => 6 + packed_coils_len(coils.len()),
        WriteMultipleRegisters(_, data) => 6 + data.len() * 2,
        ReadWriteMultipleRegisters(_, _, _, data) => 10 + data.len() * 2,
        ReadExceptionStatus | GetCommEventCounter | GetCommEventLog | ReportSlaveId => 1,
        Diagnostics(_, data) => 3 + data.len() * 2,
        ReadFileRecord(refs) => 2 + refs.len() * 7,
        WriteFileRecord(records) => {
            2 + records.iter().map(|r| 7 + r.record_data.len() * 2).sum::<usize>()
        }
        MaskWriteRegister(_, _, _) => 7,
        ReadFifoQueue(_) => 3,
        ReadDeviceInformation(_, _) => 4,
        Custom(_, data) => 1 + data.len(),
        Disconnect => unreachable!(),
    }
}

fn response_byte_count(rsp: &Response) -> usize {
    use crate::frame::Response::*;
    match rsp {
        ReadCoils(coils) | ReadDiscreteInputs(coils) => 2 + packed_coils_len(coils.len()),
        WriteSingleCoil(_, _)
        | WriteMultipleCoils(_, _)
        | WriteMultipleRegisters(_, _)
        | WriteSingleRegister(_, _) => 5,
        ReadInputRegisters(data) | ReadHoldingRegisters(data) | ReadWriteMultipleRegisters(data) => {
            2 + data.len() * 2
        }
        ReadExceptionStatus(_) => 2,
        Diagnostics(_, data) => 3 + data.len() * 2,
        GetCommEventCounter(_, _) => 5,
        GetCommEventLog(_, _, _, events) => 7 + events.len(),
        ReportSlaveId(_, data) => 2 + data.len(),
        ReadFileRecord(groups) => 2 + groups.iter().map(|g| 2 + g.len() * 2).sum::<usize>(),
        WriteFileRecord(records) => {
            2 + records.iter().map(|r| 7 + r.record_data.len() * 2).sum::<usize>()
        }
        MaskWriteRegister(_, _, _) => 7,
        ReadFifoQueue(values) => 5 + values.len() * 2,
        ReadDeviceInformation(_, objects) => {
            7 + objects.iter().map(|(_, v)| 2 + v.len()).sum::<usize>()
        }
        Custom(_, data) => 1 + data.len(),
    }
}
