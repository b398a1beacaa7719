// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The ASCII transmission mode framer.
//!
//! Each frame is `:` followed by the hex-encoded slave address, PDU and
//! trailing LRC-8, terminated by `\r\n`. Unlike RTU the byte stream is
//! self-delimiting, so framing never depends on an inter-character timeout.

use std::io::{Error, ErrorKind, Result};

use smallvec::SmallVec;
use tokio_util::codec::{Decoder, Encoder};

use crate::{
    bytes::{BufMut, Bytes, BytesMut},
    frame::ascii::*,
    slave::SlaveId,
};

use super::*;

const START: u8 = b':';
const DEFAULT_END_DELIMITER: &[u8; 2] = b"\r\n";

// Two hex digits per byte, plus the `:` start marker and `\r\n` terminator,
// matches RTU's 256 byte ceiling on the underlying ADU.
const MAX_FRAME_LEN: usize = 256;

type DroppedBytes = SmallVec<[u8; MAX_FRAME_LEN]>;

#[derive(Debug, Eq, PartialEq)]
pub(crate) struct FrameDecoder {
    dropped_bytes: DroppedBytes,
    end_delimiter: Vec<u8>,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self {
            dropped_bytes: DroppedBytes::new(),
            end_delimiter: DEFAULT_END_DELIMITER.to_vec(),
        }
    }
}

impl FrameDecoder {
    /// Reconfigures the end-of-frame marker, honoring a
    /// `ChangeAsciiInputDelimiter` diagnostic sub-function (0x0000) request.
    pub(crate) fn set_end_delimiter(&mut self, delimiter: u8) {
        self.end_delimiter = vec![delimiter];
    }

    pub(crate) fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<(SlaveId, Bytes)>> {
        let Some(start) = buf.iter().position(|&b| b == START) else {
            // No frame marker seen yet; keep the buffer in case the start
            // delimiter itself is still in flight.
            if buf.len() > MAX_FRAME_LEN {
                self.record_dropped(&buf.split_to(buf.len()));
            }
            return Ok(None);
        };

        if start > 0 {
            self.record_dropped(&buf.split_to(start));
        }

        let end_delimiter = self.end_delimiter.clone();
        let Some(end) = find_subslice(&buf[1..], &end_delimiter).map(|pos| pos + 1) else {
            if buf.len() > MAX_FRAME_LEN {
                // Never going to find a terminator in a frame this long.
                let garbage = buf.split_to(buf.len());
                self.record_dropped(&garbage);
            }
            return Ok(None);
        };

        let hex_body = buf.split_to(end)[1..].to_vec();
        let _terminator = buf.split_to(end_delimiter.len());

        let raw = hex::decode(&hex_body).map_err(|err| {
            Error::new(ErrorKind::InvalidData, format!("Invalid ASCII frame: {err}"))
        })?;

        let Some((&lrc, adu)) = raw.split_last() else {
            return Err(Error::new(ErrorKind::InvalidData, "Empty ASCII frame"));
        };

        if !primitives::check_lrc8(adu, lrc) {
            return Err(Error::new(
                ErrorKind::InvalidData,
                "Invalid LRC in ASCII frame",
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

        let slave_id = adu[0];
        let pdu_data = Bytes::copy_from_slice(&adu[1..]);
        Ok(Some((slave_id, pdu_data)))
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

fn find_subslice(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[derive(Debug, Eq, PartialEq)]
pub(crate) struct ClientCodec {
    decoder: FrameDecoder,
    end_delimiter: Vec<u8>,
}

impl Default for ClientCodec {
    fn default() -> Self {
        Self {
            decoder: FrameDecoder::default(),
            end_delimiter: DEFAULT_END_DELIMITER.to_vec(),
        }
    }
}

impl ClientCodec {
    /// See [`FrameDecoder::set_end_delimiter`].
    #[allow(dead_code)]
    pub(crate) fn set_end_delimiter(&mut self, delimiter: u8) {
        self.decoder.set_end_delimiter(delimiter);
        self.end_delimiter = vec![delimiter];
    }
}

#[derive(Debug, Eq, PartialEq)]
pub(crate) struct ServerCodec {
    decoder: FrameDecoder,
    end_delimiter: Vec<u8>,
}

impl Default for ServerCodec {
    fn default() -> Self {
        Self {
            decoder: FrameDecoder::default(),
            end_delimiter: DEFAULT_END_DELIMITER.to_vec(),
        }
    }
}

impl ServerCodec {
    /// See [`FrameDecoder::set_end_delimiter`].
    #[allow(dead_code)]
    pub(crate) fn set_end_delimiter(&mut self, delimiter: u8) {
        self.decoder.set_end_delimiter(delimiter);
        self.end_delimiter = vec![delimiter];
    }
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

fn encode_frame(slave_id: SlaveId, pdu_data: &[u8], end_delimiter: &[u8], buf: &mut BytesMut) {
    let mut adu = Vec::with_capacity(1 + pdu_data.len() + 1);
    adu.push(slave_id);
    adu.extend_from_slice(pdu_data);
    let lrc = primitives::lrc8(&adu);
    adu.push(lrc);

    buf.reserve(1 + adu.len() * 2 + end_delimiter.len());
    buf.put_u8(START);
    buf.put_slice(hex::encode_upper(&adu).as_bytes());
    buf.put_slice(end_delimiter);
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
        encode_frame(hdr.slave_id, &pdu_data, &self.end_delimiter, buf);
        Ok(())
    }
}

impl Encoder<ResponseAdu> for ServerCodec {
    type Error = Error;

    fn encode(&mut self, adu: ResponseAdu, buf: &mut BytesMut) -> Result<()> {
        let ResponseAdu { hdr, pdu } = adu;
        let pdu_data: Bytes = pdu.into();
        encode_frame(hdr.slave_id, &pdu_data, &self.end_delimiter, buf);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_incomplete_frame_without_terminator() {
        let mut codec = ClientCodec::default();
        let mut buf = BytesMut::from(&b":0103"[..]);
        let res = codec.decode(&mut buf).unwrap();
        assert!(res.is_none());
        assert_eq!(buf.len(), 5);
    }

    #[test]
    fn decode_drops_garbage_before_start_marker() {
        let mut codec = ClientCodec::default();
        let frame = encode_response_frame(0x11, &Response::ReadHoldingRegisters(vec![0x0017]));
        let mut buf = BytesMut::from(&b"garbage"[..]);
        buf.extend_from_slice(&frame);
        let ResponseAdu { hdr, pdu } = codec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(hdr.slave_id, 0x11);
        assert_eq!(
            Response::try_from(pdu).unwrap(),
            Response::ReadHoldingRegisters(vec![0x0017])
        );
    }

    #[test]
    fn decode_rejects_invalid_lrc() {
        let mut codec = ClientCodec::default();
        // ":1103001700" with a deliberately wrong trailing LRC byte.
        let mut buf = BytesMut::from(&b":110300170099\r\n"[..]);
        assert!(codec.decode(&mut buf).is_err());
    }

    #[test]
    fn encode_then_decode_request_roundtrip() {
        let mut client = ClientCodec::default();
        let mut server = ServerCodec::default();
        let mut buf = BytesMut::new();

        let req = Request::ReadHoldingRegisters(0x082B, 2);
        let adu = RequestAdu {
            hdr: Header { slave_id: 0x01 },
            pdu: req.clone().into(),
            disconnect: false,
        };
        client.encode(adu, &mut buf).unwrap();
        assert_eq!(buf[0], START);
        assert_eq!(&buf[buf.len() - 2..], &DEFAULT_END_DELIMITER[..]);

        let RequestAdu { hdr, pdu, .. } = server.decode(&mut buf).unwrap().unwrap();
        assert_eq!(hdr.slave_id, 0x01);
        assert_eq!(Request::from(pdu), req);
        assert!(buf.is_empty());
    }

    #[test]
    fn custom_end_delimiter_is_honored_on_both_sides() {
        let mut client = ClientCodec::default();
        let mut server = ServerCodec::default();
        client.set_end_delimiter(b'!');
        server.set_end_delimiter(b'!');
        let mut buf = BytesMut::new();

        let req = Request::ReadHoldingRegisters(0x082B, 2);
        let adu = RequestAdu {
            hdr: Header { slave_id: 0x01 },
            pdu: req.clone().into(),
            disconnect: false,
        };
        client.encode(adu, &mut buf).unwrap();
        assert_eq!(buf[buf.len() - 1], b'!');

        let RequestAdu { hdr, pdu, .. } = server.decode(&mut buf).unwrap().unwrap();
        assert_eq!(hdr.slave_id, 0x01);
        assert_eq!(Request::from(pdu), req);
    }

    fn encode_response_frame(slave_id: SlaveId, rsp: &Response) -> Bytes {
        let pdu_data: Bytes = rsp.clone().into();
        let mut buf = BytesMut::new();
        encode_frame(slave_id, &pdu_data, &DEFAULT_END_DELIMITER[..], &mut buf);
        buf.freeze()
    }
}
