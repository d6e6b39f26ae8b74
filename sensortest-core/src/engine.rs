//! Protocol engine
//!
//! Owns the receive accumulation buffer and, once per control loop tick,
//! turns whatever bytes have arrived into dispatched commands and
//! transmitted responses. Each call does a bounded amount of work and
//! never waits for more input.

use heapless::Vec;
use sensortest_hal::{UartRx, UartTx};
use sensortest_protocol::{parse, ErrorCode, Frame, ParseOutcome, MAX_FRAME_SIZE};

use crate::dispatcher::{self, build_nak, DispatchContext};

/// Receive buffer capacity
pub const RX_BUFFER_SIZE: usize = 128;

/// Default blocking transmit timeout per frame
pub const UART_TX_TIMEOUT_MS: u32 = 1000;

/// Counters from one [`ProtocolEngine::process`] call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EngineStats {
    /// Frames that parsed and were dispatched
    pub frames: u16,
    pub checksum_errors: u16,
    pub format_errors: u16,
    /// Incoming bytes discarded because the buffer was full
    pub bytes_dropped: u16,
    pub rx_errors: u16,
    pub tx_errors: u16,
}

impl EngineStats {
    /// Whether anything worth logging happened
    pub fn is_quiet(&self) -> bool {
        *self == Self::default()
    }
}

/// Framer, dispatcher driver and transmitter for one serial link
pub struct ProtocolEngine<RX, TX> {
    rx: RX,
    tx: TX,
    buffer: Vec<u8, RX_BUFFER_SIZE>,
    tx_timeout_ms: u32,
    dropped: u16,
}

impl<RX: UartRx, TX: UartTx> ProtocolEngine<RX, TX> {
    pub fn new(rx: RX, tx: TX, tx_timeout_ms: u32) -> Self {
        Self {
            rx,
            tx,
            buffer: Vec::new(),
            tx_timeout_ms,
            dropped: 0,
        }
    }

    /// Append received bytes, for transports that push data
    ///
    /// Returns how many bytes were stored; the rest are dropped.
    pub fn feed(&mut self, data: &[u8]) -> usize {
        let space = self.buffer.capacity() - self.buffer.len();
        let take = data.len().min(space);
        // `take` fits by construction
        let _ = self.buffer.extend_from_slice(&data[..take]);

        let dropped = data.len() - take;
        if dropped > 0 {
            self.dropped = self.dropped.saturating_add(dropped as u16);
        }
        take
    }

    /// Bytes waiting in the receive buffer
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Run one tick: drain the UART, then parse and answer every complete
    /// frame in the buffer
    pub fn process(&mut self, ctx: &mut DispatchContext<'_, '_>) -> EngineStats {
        let mut stats = EngineStats {
            bytes_dropped: core::mem::take(&mut self.dropped),
            ..EngineStats::default()
        };

        self.drain_rx(&mut stats);

        while !self.buffer.is_empty() {
            let result = parse(&self.buffer);
            self.consume(result.consumed);

            match result.outcome {
                ParseOutcome::Incomplete => break,
                ParseOutcome::Ok(request) => {
                    stats.frames += 1;
                    trace!("Command {=u8:#x}", request.command);
                    if let Some(response) = dispatcher::process(&request, ctx) {
                        self.transmit(&response, &mut stats);
                    }
                }
                ParseOutcome::ChecksumError => {
                    stats.checksum_errors += 1;
                    warn!("Frame checksum mismatch");
                    self.transmit(&build_nak(ErrorCode::CrcFail), &mut stats);
                }
                ParseOutcome::FormatError => {
                    stats.format_errors += 1;
                    debug!("Malformed frame skipped");
                }
            }
        }

        if stats.bytes_dropped > 0 {
            warn!("Receive buffer full, {} bytes dropped", stats.bytes_dropped);
        }
        stats
    }

    fn drain_rx(&mut self, stats: &mut EngineStats) {
        let mut chunk = [0u8; RX_BUFFER_SIZE];
        let space = self.buffer.capacity() - self.buffer.len();
        if space == 0 {
            return;
        }

        match self.rx.read_available(&mut chunk[..space]) {
            Ok(n) => {
                let _ = self.buffer.extend_from_slice(&chunk[..n]);
            }
            Err(_) => {
                stats.rx_errors += 1;
                warn!("UART receive error");
            }
        }
    }

    /// Drop `count` bytes from the front, sliding the remainder down
    fn consume(&mut self, count: usize) {
        let count = count.min(self.buffer.len());
        if count == 0 {
            return;
        }
        let remaining = self.buffer.len() - count;
        self.buffer.copy_within(count.., 0);
        self.buffer.truncate(remaining);
    }

    fn transmit(&mut self, frame: &Frame, stats: &mut EngineStats) {
        let mut bytes = [0u8; MAX_FRAME_SIZE];
        let len = match frame.encode(&mut bytes) {
            Ok(len) => len,
            Err(_) => {
                stats.tx_errors += 1;
                error!("Response does not fit a frame");
                return;
            }
        };

        if self.tx.write_blocking(&bytes[..len], self.tx_timeout_ms).is_err() {
            stats.tx_errors += 1;
            warn!("UART transmit failed for response {=u8:#x}", frame.command);
        }
    }

    pub fn rx_mut(&mut self) -> &mut RX {
        &mut self.rx
    }

    /// Borrow the transmit half, e.g. to flush before a reset
    pub fn tx_mut(&mut self) -> &mut TX {
        &mut self.tx
    }
}
