// SPDX-FileCopyrightText: Copyright (c) 2017-2024 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transaction correlation and the synchronous framing state machine.
//!
//! Two transaction table policies are provided: [`KeyedTransactionManager`]
//! for multiplexed transports (TCP, where responses may arrive out of
//! order and are matched by transaction id) and [`FifoTransactionManager`]
//! for transports that guarantee in-order delivery (serial lines, where the
//! oldest pending handle is always the next to complete).
//!
//! [`synchronous_transact`] drives the blocking request/response cycle for a
//! single attempt: send, then read through the `{Initializing, ReadingHeader,
//! ReadingContent, CompleteFrame, ErrorInFrame}` state machine until a full
//! frame is assembled or the retry budget is exhausted.

use std::collections::{HashMap, VecDeque};

/// A transaction identifier, wrapping modulo `0x10000`.
pub type TransactionId = u16;

/// The minimal buffer-management contract a framer exposes to the
/// synchronous transaction manager. Each wire format (TCP/RTU/ASCII/Binary)
/// implements this alongside its `tokio_util::codec::{Decoder, Encoder}` pair
/// used by the asynchronous client/server path; this trait backs only the
/// blocking state machine below.
pub trait Framer {
    /// The number of bytes needed before `check_frame` can be attempted.
    fn header_size(&self) -> usize;

    /// Appends newly received bytes to the internal buffer.
    fn add_to_frame(&mut self, data: &[u8]);

    /// The number of bytes currently buffered.
    fn buffered_len(&self) -> usize;

    /// Attempts to validate the header and, for integrity-checked framers,
    /// the frame trailer. On success the frame size becomes available via
    /// [`Framer::frame_size`].
    fn check_frame(&mut self) -> bool;

    /// The total frame size once `check_frame` has succeeded.
    fn frame_size(&self) -> usize;

    /// The decodable frame payload (function code + data), once complete.
    fn get_frame(&self) -> &[u8];

    /// Drops the committed frame from the buffer, preparing for the next one.
    fn advance_frame(&mut self);

    /// Drops the entire buffer, discarding any partial frame.
    fn reset_frame(&mut self);
}

/// The transport contract consumed by the synchronous transaction manager.
pub trait Transport {
    /// Establishes the connection. Idempotent: calling it while already
    /// connected is a no-op that returns `true`.
    fn connect(&mut self) -> std::io::Result<bool>;

    fn close(&mut self);

    fn send(&mut self, data: &[u8]) -> std::io::Result<usize>;

    /// Reads up to `size` bytes. An empty result indicates a timeout, not
    /// end-of-stream.
    fn receive(&mut self, size: usize) -> std::io::Result<Vec<u8>>;
}

/// Retry policy for [`synchronous_transact`].
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub retries: u32,
    pub retry_on_empty: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            retries: 3,
            retry_on_empty: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameState {
    Initializing,
    ReadingHeader,
    ReadingContent,
    CompleteFrame,
    ErrorInFrame,
}

/// Drives one full synchronous request/response cycle: connect, send, then
/// read through the framing state machine until a complete frame is
/// available or the retry budget is exhausted.
pub fn synchronous_transact<T, F>(
    transport: &mut T,
    framer: &mut F,
    request: &[u8],
    config: RetryConfig,
) -> std::io::Result<Option<Vec<u8>>>
where
    T: Transport,
    F: Framer,
{
    let mut retries_left = config.retries;

    'attempt: loop {
        if retries_left == 0 {
            return Ok(None);
        }

        if let Err(err) = transport.connect() {
            log::warn!("Failed to connect: {err}");
            retries_left -= 1;
            continue;
        }

        if let Err(err) = transport.send(request) {
            log::warn!("Failed to send request: {err}");
            transport.close();
            retries_left -= 1;
            continue;
        }

        let mut state = FrameState::Initializing;
        loop {
            match state {
                FrameState::Initializing => {
                    framer.advance_frame();
                    state = FrameState::ReadingHeader;
                }
                FrameState::ReadingHeader => {
                    let need = framer.header_size().saturating_sub(framer.buffered_len());
                    if need > 0 {
                        match transport.receive(need) {
                            Ok(data) if data.is_empty() => {
                                if config.retry_on_empty {
                                    retries_left = retries_left.saturating_sub(1);
                                    continue 'attempt;
                                }
                                state = FrameState::ErrorInFrame;
                                continue;
                            }
                            Ok(data) => framer.add_to_frame(&data),
                            Err(err) => {
                                log::warn!("Failed to read header: {err}");
                                transport.close();
                                retries_left = retries_left.saturating_sub(1);
                                continue 'attempt;
                            }
                        }
                    }
                    if !framer.check_frame() {
                        state = FrameState::ErrorInFrame;
                        continue;
                    }
                    state = FrameState::ReadingContent;
                }
                FrameState::ReadingContent => {
                    let need = framer.frame_size().saturating_sub(framer.buffered_len());
                    if need > 0 {
                        match transport.receive(need) {
                            Ok(data) if data.is_empty() => {
                                if config.retry_on_empty {
                                    retries_left = retries_left.saturating_sub(1);
                                    continue 'attempt;
                                }
                                state = FrameState::ErrorInFrame;
                                continue;
                            }
                            Ok(data) => framer.add_to_frame(&data),
                            Err(err) => {
                                log::warn!("Failed to read frame content: {err}");
                                transport.close();
                                retries_left = retries_left.saturating_sub(1);
                                continue 'attempt;
                            }
                        }
                    } else {
                        state = FrameState::CompleteFrame;
                    }
                }
                FrameState::CompleteFrame => {
                    let frame = framer.get_frame().to_vec();
                    framer.advance_frame();
                    return Ok(Some(frame));
                }
                FrameState::ErrorInFrame => {
                    framer.reset_frame();
                    return Ok(None);
                }
            }
        }
    }
}

/// A keyed (multiplexed) transaction table: responses may complete in any
/// order and are matched exactly by transaction id.
#[derive(Debug, Default)]
pub struct KeyedTransactionManager<H> {
    table: HashMap<TransactionId, H>,
    next_tid: TransactionId,
}

impl<H> KeyedTransactionManager<H> {
    pub fn new() -> Self {
        Self {
            table: HashMap::new(),
            next_tid: 0,
        }
    }

    pub fn get_next_tid(&mut self) -> TransactionId {
        let tid = self.next_tid;
        self.next_tid = self.next_tid.wrapping_add(1);
        tid
    }

    pub fn reset(&mut self) {
        self.next_tid = 0;
        self.table.clear();
    }

    pub fn add(&mut self, tid: TransactionId, handle: H) {
        self.table.insert(tid, handle);
    }

    /// Removes and returns the handle for `tid`, if any (pop semantics: a
    /// response is delivered at most once).
    pub fn get(&mut self, tid: TransactionId) -> Option<H> {
        self.table.remove(&tid)
    }

    /// Idempotent: removing an absent transaction is not an error.
    pub fn delete(&mut self, tid: TransactionId) {
        self.table.remove(&tid);
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Drains every pending handle, e.g. on disconnect. Each handle is
    /// yielded exactly once; the order is unspecified.
    pub fn drain(&mut self) -> impl Iterator<Item = H> + '_ {
        self.table.drain().map(|(_, handle)| handle)
    }
}

/// A FIFO transaction table for transports that cannot multiplex (serial
/// lines): `get` always pops the oldest pending handle regardless of the
/// transaction id supplied, since request/response order is guaranteed.
#[derive(Debug, Default)]
pub struct FifoTransactionManager<H> {
    table: VecDeque<(TransactionId, H)>,
    next_tid: TransactionId,
}

impl<H> FifoTransactionManager<H> {
    pub fn new() -> Self {
        Self {
            table: VecDeque::new(),
            next_tid: 0,
        }
    }

    pub fn get_next_tid(&mut self) -> TransactionId {
        let tid = self.next_tid;
        self.next_tid = self.next_tid.wrapping_add(1);
        tid
    }

    pub fn reset(&mut self) {
        self.next_tid = 0;
        self.table.clear();
    }

    pub fn add(&mut self, tid: TransactionId, handle: H) {
        self.table.push_back((tid, handle));
    }

    /// Pops the oldest pending handle, ignoring `tid`.
    pub fn get(&mut self, _tid: TransactionId) -> Option<H> {
        self.table.pop_front().map(|(_, handle)| handle)
    }

    pub fn delete(&mut self, tid: TransactionId) {
        self.table.retain(|(t, _)| *t != tid);
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn drain(&mut self) -> impl Iterator<Item = H> + '_ {
        self.table.drain(..).map(|(_, handle)| handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tid_sequence_wraps_modulo_0x10000() {
        let mut mgr: KeyedTransactionManager<()> = KeyedTransactionManager::new();
        assert_eq!(mgr.get_next_tid(), 0);
        assert_eq!(mgr.get_next_tid(), 1);
        mgr.next_tid = 0xFFFF;
        assert_eq!(mgr.get_next_tid(), 0xFFFF);
        assert_eq!(mgr.get_next_tid(), 0);
    }

    #[test]
    fn reset_restores_initial_tid_and_empties_table() {
        let mut mgr: KeyedTransactionManager<&str> = KeyedTransactionManager::new();
        mgr.get_next_tid();
        mgr.add(5, "pending");
        mgr.reset();
        assert_eq!(mgr.get_next_tid(), 0);
        assert!(mgr.is_empty());
    }

    #[test]
    fn keyed_get_has_pop_semantics() {
        let mut mgr: KeyedTransactionManager<&str> = KeyedTransactionManager::new();
        mgr.add(7, "handle");
        assert_eq!(mgr.get(7), Some("handle"));
        assert_eq!(mgr.get(7), None);
    }

    #[test]
    fn keyed_delete_is_idempotent() {
        let mut mgr: KeyedTransactionManager<&str> = KeyedTransactionManager::new();
        mgr.delete(1);
        mgr.add(1, "x");
        mgr.delete(1);
        mgr.delete(1);
        assert!(mgr.is_empty());
    }

    #[test]
    fn fifo_pops_oldest_regardless_of_requested_tid() {
        let mut mgr: FifoTransactionManager<&str> = FifoTransactionManager::new();
        mgr.add(1, "first");
        mgr.add(2, "second");
        assert_eq!(mgr.get(999), Some("first"));
        assert_eq!(mgr.get(0), Some("second"));
        assert_eq!(mgr.get(0), None);
    }

    struct ScriptedTransport {
        reads: VecDeque<Vec<u8>>,
    }

    impl Transport for ScriptedTransport {
        fn connect(&mut self) -> std::io::Result<bool> {
            Ok(true)
        }

        fn close(&mut self) {}

        fn send(&mut self, _data: &[u8]) -> std::io::Result<usize> {
            Ok(_data.len())
        }

        fn receive(&mut self, _size: usize) -> std::io::Result<Vec<u8>> {
            Ok(self.reads.pop_front().unwrap_or_default())
        }
    }

    struct FixedSizeFramer {
        buf: Vec<u8>,
        header_size: usize,
        frame_size: usize,
    }

    impl Framer for FixedSizeFramer {
        fn header_size(&self) -> usize {
            self.header_size
        }

        fn add_to_frame(&mut self, data: &[u8]) {
            self.buf.extend_from_slice(data);
        }

        fn buffered_len(&self) -> usize {
            self.buf.len()
        }

        fn check_frame(&mut self) -> bool {
            self.buf.len() >= self.header_size
        }

        fn frame_size(&self) -> usize {
            self.frame_size
        }

        fn get_frame(&self) -> &[u8] {
            &self.buf
        }

        fn advance_frame(&mut self) {
            self.buf.clear();
        }

        fn reset_frame(&mut self) {
            self.buf.clear();
        }
    }

    #[test]
    fn synchronous_transact_assembles_a_frame_across_two_reads() {
        let mut transport = ScriptedTransport {
            reads: VecDeque::from([vec![0xAA, 0xBB], vec![0xCC, 0xDD]]),
        };
        let mut framer = FixedSizeFramer {
            buf: Vec::new(),
            header_size: 2,
            frame_size: 4,
        };
        let result =
            synchronous_transact(&mut transport, &mut framer, &[0x01], RetryConfig::default())
                .unwrap();
        assert_eq!(result, Some(vec![0xAA, 0xBB, 0xCC, 0xDD]));
    }

    #[test]
    fn synchronous_transact_exhausts_retries_on_empty_reads() {
        let mut transport = ScriptedTransport {
            reads: VecDeque::new(),
        };
        let mut framer = FixedSizeFramer {
            buf: Vec::new(),
            header_size: 2,
            frame_size: 4,
        };
        let config = RetryConfig {
            retries: 2,
            retry_on_empty: true,
        };
        let result = synchronous_transact(&mut transport, &mut framer, &[0x01], config).unwrap();
        assert_eq!(result, None);
    }
}
