// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The Binary transmission mode framer.
//!
//! Each frame is `{` followed by the slave address, function code, PDU data
//! and a big-endian CRC-16, terminated by `}`. Only the PDU data is escaped:
//! a data byte equal to either delimiter is doubled on the wire and collapsed
//! back to a single byte on ingest, so the delimiters stay unambiguous
//! without a length prefix. The address, function code and CRC are always
//! emitted and read raw; the CRC itself is never escaped.

use std::io::{Error, ErrorKind, Result};

use byteorder::{BigEndian, ByteOrder};
use smallvec::SmallVec;
use tokio_util::codec::{Decoder, Encoder};

use crate::{
    bytes::{BufMut, Bytes, BytesMut},
    frame::binary::*,
    slave::SlaveId,
};

use super::*;

const START: u8 = 0x7B; // '{'
const END: u8 = 0x7D; // '}'

const MAX_FRAME_LEN: usize = 256;

type DroppedBytes = SmallVec<[u8; MAX_FRAME_LEN]>;

#[derive(Debug, Eq, PartialEq)]
pub(crate) struct FrameDecoder {
    dropped_bytes: DroppedBytes,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self {
            dropped_bytes: DroppedBytes::new(),
        }
    }
}

impl FrameDecoder {
    pub(crate) fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<(SlaveId, Bytes)>> {
        let Some(start) = buf.iter().position(|&b| b == START) else {
            if buf.len() > MAX_FRAME_LEN {
                self.record_dropped(&buf.split_to(buf.len()));
            }
            return Ok(None);
        };

        if start > 0 {
            self.record_dropped(&buf.split_to(start));
        }

        let Some(end) = find_unescaped_end(buf) else {
            if buf.len() > MAX_FRAME_LEN {
                let garbage = buf.split_to(buf.len());
                self.record_dropped(&garbage);
            }
            return Ok(None);
        };

        // buf[0] = START, buf[1] = uid, buf[2] = function code (both raw),
        // buf[3..end-2] = escaped PDU data, buf[end-2..end] = raw CRC, buf[end] = END.
        if end < 5 {
            buf.split_to(end + 1);
            return Err(Error::new(ErrorKind::InvalidData, "Binary frame too short"));
        }

        let uid = buf[1];
        let function = buf[2];
        let expected_crc = BigEndian::read_u16(&buf[end - 2..end]);
        let escaped_data = buf[3..end - 2].to_vec();
        buf.split_to(end + 1);

        let data = unescape(&escaped_data);
        let mut crc_input = Vec::with_capacity(2 + data.len());
        crc_input.push(uid);
        crc_input.push(function);
        crc_input.extend_from_slice(&data);
        if !primitives::check_crc16(&crc_input, expected_crc) {
            return Err(Error::new(
                ErrorKind::InvalidData,
                "Invalid CRC in binary frame",
            ));
        }

        if !self.dropped_bytes.is_empty() {
            log::warn!(
                "Successfully decoded frame after dropping {} byte(s): {:X?}",
                self.dropped_bytes.len(),
                self.dropped_bytes
            );
            self.dropped_bytes.clear();
        }

        let mut pdu_data = Vec::with_capacity(1 + data.len());
        pdu_data.push(function);
        pdu_data.extend_from_slice(&data);
        Ok(Some((uid, Bytes::from(pdu_data))))
    }

    fn record_dropped(&mut self, bytes: &[u8]) {
        for &b in bytes {
            if self.dropped_bytes.len() >= MAX_FRAME_LEN {
                log::error!(
                    "Giving up to decode frame after dropping {} byte(s): {:X?}",
                    self.dropped_bytes.len(),
                    self.dropped_bytes
                );
                self.dropped_bytes.clear();
            }
            self.dropped_bytes.push(b);
        }
    }
}

/// Scans `buf[3..]` (past the raw `START`/uid/function-code prefix) for the
/// first unescaped [`END`] delimiter, skipping doubled `{`/`}` escape pairs
/// in the PDU data. Returns its absolute index.
fn find_unescaped_end(buf: &BytesMut) -> Option<usize> {
    let mut i = 3;
    while i < buf.len() {
        let b = buf[i];
        if (b == START || b == END) && buf.get(i + 1) == Some(&b) {
            i += 2;
            continue;
        }
        if b == END {
            return Some(i);
        }
        i += 1;
    }
    None
}

fn unescape(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    let mut i = 0;
    while i < data.len() {
        let b = data[i];
        out.push(b);
        if (b == START || b == END) && data.get(i + 1) == Some(&b) {
            i += 2;
        } else {
            i += 1;
        }
    }
    out
}

fn escape(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    for &b in data {
        out.push(b);
        if b == START || b == END {
            out.push(b);
        }
    }
    out
}

#[derive(Debug, Default, Eq, PartialEq)]
pub(crate) struct ClientCodec {
    decoder: FrameDecoder,
}

#[derive(Debug, Default, Eq, PartialEq)]
pub(crate) struct ServerCodec {
    decoder: FrameDecoder,
}

impl Decoder for ClientCodec {
    type Item = ResponseAdu;
    type Error = Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<ResponseAdu>> {
        let Some((slave_id, pdu_data)) = self.decoder.decode(buf)? else {
            return Ok(None);
        };
        let hdr = Header { slave_id };
        let pdu = ResponsePdu::try_from(pdu_data)?;
        Ok(Some(ResponseAdu { hdr, pdu }))
    }
}

impl Decoder for ServerCodec {
    type Item = RequestAdu;
    type Error = Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<RequestAdu>> {
        let Some((slave_id, pdu_data)) = self.decoder.decode(buf)? else {
            return Ok(None);
        };
        let hdr = Header { slave_id };
        let pdu = RequestPdu::try_from(pdu_data)?;
        Ok(Some(RequestAdu {
            hdr,
            pdu,
            disconnect: false,
        }))
    }
}

fn encode_frame(slave_id: SlaveId, pdu_data: &[u8], buf: &mut BytesMut) {
    let Some((&function, data)) = pdu_data.split_first() else {
        debug_assert!(false, "PDU data must contain at least a function code");
        return;
    };

    let mut crc_input = Vec::with_capacity(2 + data.len());
    crc_input.push(slave_id);
    crc_input.push(function);
    crc_input.extend_from_slice(data);
    let crc = primitives::crc16(&crc_input);

    let escaped_data = escape(data);
    buf.reserve(1 + 2 + escaped_data.len() + 2 + 1);
    buf.put_u8(START);
    buf.put_u8(slave_id);
    buf.put_u8(function);
    buf.put_slice(&escaped_data);
    buf.put_u16(crc);
    buf.put_u8(END);
}

impl Encoder<RequestAdu> for ClientCodec {
    type Error = Error;

    fn encode(&mut self, adu: RequestAdu, buf: &mut BytesMut) -> Result<()> {
        if adu.disconnect {
            return Err(Error::new(
                ErrorKind::NotConnected,
                "Disconnecting - not an error",
            ));
        }
        let RequestAdu { hdr, pdu, .. } = adu;
        let pdu_data: Bytes = pdu.try_into()?;
        encode_frame(hdr.slave_id, &pdu_data, buf);
        Ok(())
    }
}

impl Encoder<ResponseAdu> for ServerCodec {
    type Error = Error;

    fn encode(&mut self, adu: ResponseAdu, buf: &mut BytesMut) -> Result<()> {
        let ResponseAdu { hdr, pdu } = adu;
        let pdu_data: Bytes = pdu.into();
        encode_frame(hdr.slave_id, &pdu_data, buf);
        Ok(())
    }
}
