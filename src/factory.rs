// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Decoder factories: the single point that decides, per direction, whether
//! a function code gets a typed [`Request`]/[`Response`] or falls through to
//! [`Request::Custom`]/[`Response::Custom`].
//!
//! A server and a client factory are kept separate (mirroring
//! `ServerDecoder`/`ClientDecoder`) because the fallback policy differs by
//! direction: a server that doesn't recognize a function code still has to
//! answer with an `IllegalFunction` exception, so it decodes the request as
//! `Custom` and lets [`crate::execute::execute`] produce that exception. A
//! client that doesn't recognize a response's function code has no typed
//! meaning to give it, so decoding fails outright instead of handing the
//! caller an opaque `Custom` payload for a function it never asked for.

use std::collections::HashSet;

use bytes::Bytes;
use thiserror::Error;

use crate::frame::{FunctionCode, Request, Response};

/// Function codes with a fully typed request/response representation.
const KNOWN_FUNCTION_CODES: &[FunctionCode] = &[
    1, 2, 3, 4, 5, 6, 7, 8, 11, 12, 15, 16, 17, 20, 21, 22, 23, 24, 43,
];

/// Errors raised while resolving a function code through the factory.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum FactoryError {
    #[error("empty PDU")]
    Empty,
}

/// Common behaviour shared by [`ServerDecoder`] and [`ClientDecoder`]: a
/// precomputed set of recognized function codes, built once at construction.
#[derive(Debug, Clone)]
struct FunctionCodeTable {
    known: HashSet<FunctionCode>,
}

impl FunctionCodeTable {
    fn new() -> Self {
        Self {
            known: KNOWN_FUNCTION_CODES.iter().copied().collect(),
        }
    }

    fn is_known(&self, function_code: FunctionCode) -> bool {
        self.known.contains(&function_code)
    }
}

/// Request-side decoder factory, used by a Modbus server.
#[derive(Debug, Clone)]
pub struct ServerDecoder {
    table: FunctionCodeTable,
}

impl Default for ServerDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ServerDecoder {
    pub fn new() -> Self {
        Self {
            table: FunctionCodeTable::new(),
        }
    }

    /// Returns whether `function_code` has a typed request representation.
    pub fn lookup_function_code(&self, function_code: FunctionCode) -> bool {
        self.table.is_known(function_code)
    }

    /// Reads the function code from the first byte of a PDU.
    pub fn peek_function_code(data: &[u8]) -> Result<FunctionCode, FactoryError> {
        data.first().copied().ok_or(FactoryError::Empty)
    }

    /// Decodes a request PDU. Function codes outside [`KNOWN_FUNCTION_CODES`]
    /// still decode successfully as [`Request::Custom`], which a default
    /// [`crate::execute::execute`] dispatch always answers with
    /// [`crate::frame::Exception::IllegalFunction`] — the equivalent of
    /// `IllegalFunctionRequest` in the source this crate is grounded on.
    pub fn decode_request(&self, data: Bytes) -> std::io::Result<Request> {
        Request::try_from(data)
    }
}

/// Response-side decoder factory, used by a Modbus client.
#[derive(Debug, Clone)]
pub struct ClientDecoder {
    table: FunctionCodeTable,
}

impl Default for ClientDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientDecoder {
    pub fn new() -> Self {
        Self {
            table: FunctionCodeTable::new(),
        }
    }

    /// Returns whether `function_code` has a typed response representation.
    pub fn lookup_function_code(&self, function_code: FunctionCode) -> bool {
        self.table.is_known(function_code)
    }

    pub fn peek_function_code(data: &[u8]) -> Result<FunctionCode, FactoryError> {
        data.first().copied().ok_or(FactoryError::Empty)
    }

    /// Decodes a response PDU. Unlike [`ServerDecoder::decode_request`], a
    /// function code outside [`KNOWN_FUNCTION_CODES`] is a decode error
    /// rather than a pass-through: a client has no typed meaning to give a
    /// response to a function it never sent.
    pub fn decode_response(&self, data: Bytes) -> std::io::Result<Response> {
        let rsp = Response::try_from(data)?;
        if let Response::Custom(function_code, _) = &rsp {
            if !self.table.is_known(*function_code) {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("Unknown response function code: 0x{function_code:0>2X}"),
                ));
            }
        }
        Ok(rsp)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_function_codes_are_recognized() {
        let server = ServerDecoder::new();
        for &fc in KNOWN_FUNCTION_CODES {
            assert!(server.lookup_function_code(fc));
        }
        assert!(!server.lookup_function_code(0x2C));
    }

    #[test]
    fn peek_function_code_rejects_empty_pdu() {
        assert_eq!(ServerDecoder::peek_function_code(&[]), Err(FactoryError::Empty));
        assert_eq!(ServerDecoder::peek_function_code(&[0x03]), Ok(0x03));
    }

    #[test]
    fn server_decoder_decodes_unknown_function_code_as_custom() {
        let server = ServerDecoder::new();
        let data = Bytes::from(vec![0x55, 0xAA]);
        let req = server.decode_request(data).unwrap();
        assert_eq!(req, Request::Custom(0x55, vec![0xAA]));
    }

    #[test]
    fn client_decoder_rejects_unknown_function_code() {
        let client = ClientDecoder::new();
        let data = Bytes::from(vec![0x55, 0xAA]);
        assert!(client.decode_response(data).is_err());
    }

    #[test]
    fn client_decoder_accepts_known_function_code() {
        let client = ClientDecoder::new();
        // ReadCoils response: byte count 1, one data byte.
        let data = Bytes::from(vec![0x01, 0x01, 0xFF]);
        assert!(client.decode_response(data).is_ok());
    }
}
