//! Link framing: sync-prefixed, length-delimited, byte-stuffed frames.
//!
//! Wire shape in both directions: `[0xA5][0x5A][LEN][COBS(cmd || payload)]`
//! with no trailer and no CRC. The RX state machine is fed one byte at a
//! time from the receive interrupt; the main loop decodes and dispatches the
//! collected frame. Responses go out as a single DMA burst, with a one-deep
//! queue for the case where the transmitter is still draining.

use heapless::Vec;
use oledui_common::{Error, Result, cobs, frame};

use crate::config::RX_INTERBYTE_TIMEOUT_MS;

/// Single-shot burst transmitter toward the host.
pub trait HostPort {
    /// Whether the previous burst is still draining.
    fn tx_busy(&self) -> bool;

    /// Start one DMA burst. Only called when `tx_busy()` is false.
    fn tx_start(
        &mut self,
        bytes: &[u8],
    );
}

/// RX framing states.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum RxState {
    #[default]
    WaitSync0,
    WaitSync1,
    WaitLen,
    Collect,
}

/// Receive-side framing state machine.
///
/// `push_byte` is the only operation meant for interrupt context; everything
/// else runs from the main loop.
#[derive(Default)]
pub struct FrameRx {
    state: RxState,
    buf: Vec<u8, { frame::MAX_ENCODED_LEN }>,
    expected: u8,
    frame_ready: bool,
    overrun: bool,
    last_byte_ms: u32,
}

impl FrameRx {
    pub fn new() -> Self { Self::default() }

    /// Drop any partial frame and restart at sync search.
    pub fn reset(&mut self) {
        self.state = RxState::WaitSync0;
        self.buf.clear();
        self.expected = 0;
        self.frame_ready = false;
        self.last_byte_ms = 0;
    }

    /// Flag a hardware overrun; the next deferred-ops pass drops everything.
    pub fn set_overrun(&mut self) { self.overrun = true; }

    pub const fn overrun(&self) -> bool { self.overrun }

    pub fn clear_overrun(&mut self) { self.overrun = false; }

    pub const fn frame_ready(&self) -> bool { self.frame_ready }

    /// Encoded span of the completed frame.
    pub fn encoded(&self) -> &[u8] { &self.buf }

    /// Feed one received byte through the framing state machine.
    pub fn push_byte(
        &mut self,
        byte: u8,
        now_ms: u32,
    ) {
        if self.frame_ready {
            return;
        }
        self.last_byte_ms = now_ms;
        match self.state {
            RxState::WaitSync0 => {
                if byte == frame::SYNC0 {
                    self.state = RxState::WaitSync1;
                }
            }
            RxState::WaitSync1 => {
                self.state = if byte == frame::SYNC1 { RxState::WaitLen } else { RxState::WaitSync0 };
            }
            RxState::WaitLen => {
                self.buf.clear();
                if byte > 0 && byte as usize <= frame::MAX_ENCODED_LEN {
                    self.expected = byte;
                    self.state = RxState::Collect;
                } else {
                    self.state = RxState::WaitSync0;
                }
            }
            RxState::Collect => {
                if self.buf.push(byte).is_err() {
                    self.state = RxState::WaitSync0;
                    self.overrun = true;
                    return;
                }
                if self.buf.len() >= self.expected as usize {
                    self.frame_ready = true;
                    self.state = RxState::WaitSync0;
                }
            }
        }
    }

    /// Drop a stalled partial frame after the inter-byte timeout.
    pub fn watchdog_poll(
        &mut self,
        now_ms: u32,
    ) {
        if self.state == RxState::WaitSync0 || self.frame_ready {
            return;
        }
        if now_ms.wrapping_sub(self.last_byte_ms) >= RX_INTERBYTE_TIMEOUT_MS {
            self.reset();
        }
    }
}

/// Transmit-side framing with a one-deep deferred queue.
#[derive(Default)]
pub struct FrameTx {
    queue: Vec<u8, { frame::MAX_DECODED_LEN }>,
    pending: bool,
}

impl FrameTx {
    pub fn new() -> Self { Self::default() }

    pub const fn queue_pending(&self) -> bool { self.pending }

    pub fn clear(&mut self) {
        self.queue.clear();
        self.pending = false;
    }

    /// Frame and send a response payload (RC byte included by the caller).
    ///
    /// Starts the burst immediately when the transmitter is free, otherwise
    /// parks the frame in the single-slot queue. A second response while the
    /// queue is full is a *bad state*.
    pub fn send_response<P: HostPort>(
        &mut self,
        port: &mut P,
        payload: &[u8],
    ) -> Result<()> {
        let mut out = [0u8; frame::MAX_DECODED_LEN];
        out[0] = frame::SYNC0;
        out[1] = frame::SYNC1;
        let encoded = cobs::encode(payload, &mut out[3..]).ok_or(Error::Internal)?;
        out[2] = encoded as u8;
        let total = 3 + encoded;

        if self.pending {
            return Err(Error::BadState);
        }
        if port.tx_busy() {
            self.queue.clear();
            self.queue.extend_from_slice(&out[..total]).map_err(|_| Error::BadLen)?;
            self.pending = true;
            return Ok(());
        }
        port.tx_start(&out[..total]);
        Ok(())
    }

    /// Issue the parked frame once the transmitter has drained.
    pub fn process_queue<P: HostPort>(
        &mut self,
        port: &mut P,
    ) {
        if !self.pending || port.tx_busy() {
            return;
        }
        port.tx_start(&self.queue);
        self.pending = false;
        self.queue.clear();
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    struct MockPort {
        frames: std::vec::Vec<std::vec::Vec<u8>>,
        busy: bool,
    }

    impl MockPort {
        fn new() -> Self {
            Self {
                frames: std::vec::Vec::new(),
                busy: false,
            }
        }
    }

    impl HostPort for MockPort {
        fn tx_busy(&self) -> bool { self.busy }

        fn tx_start(
            &mut self,
            bytes: &[u8],
        ) {
            self.frames.push(bytes.to_vec());
        }
    }

    fn feed(
        rx: &mut FrameRx,
        bytes: &[u8],
    ) {
        for &b in bytes {
            rx.push_byte(b, 0);
        }
    }

    #[test]
    fn test_rx_happy_path() {
        let mut rx = FrameRx::new();
        feed(&mut rx, &[0xA5, 0x5A, 0x02, 0x01, 0x01]);
        assert!(rx.frame_ready());
        assert_eq!(rx.encoded(), &[0x01, 0x01]);
    }

    #[test]
    fn test_rx_resyncs_on_garbage() {
        let mut rx = FrameRx::new();
        feed(&mut rx, &[0x00, 0xA5, 0x00, 0xA5, 0x5A, 0x02, 0x07, 0x07]);
        assert!(rx.frame_ready());
        assert_eq!(rx.encoded(), &[0x07, 0x07]);
    }

    #[test]
    fn test_rx_rejects_bad_len() {
        let mut rx = FrameRx::new();
        feed(&mut rx, &[0xA5, 0x5A, 0x00]);
        assert!(!rx.frame_ready());
        feed(&mut rx, &[0xA5, 0x5A, 113]);
        assert!(!rx.frame_ready());
        // Back at sync search; a valid frame still gets through.
        feed(&mut rx, &[0xA5, 0x5A, 0x01, 0x42]);
        assert!(rx.frame_ready());
    }

    #[test]
    fn test_rx_ignores_bytes_while_frame_pending() {
        let mut rx = FrameRx::new();
        feed(&mut rx, &[0xA5, 0x5A, 0x01, 0x42]);
        assert!(rx.frame_ready());
        feed(&mut rx, &[0xA5, 0x5A, 0x01, 0x99]);
        assert_eq!(rx.encoded(), &[0x42]);
        rx.reset();
        assert!(!rx.frame_ready());
    }

    #[test]
    fn test_rx_watchdog_drops_partial_frame() {
        let mut rx = FrameRx::new();
        for (i, &b) in [0xA5u8, 0x5A, 0x04, 0x01].iter().enumerate() {
            rx.push_byte(b, i as u32);
        }
        rx.watchdog_poll(100); // below the timeout, partial frame survives
        rx.push_byte(0x02, 100);
        rx.watchdog_poll(400); // stalled past the timeout, frame dropped
        assert!(!rx.frame_ready());
        feed(&mut rx, &[0x03, 0x04]); // leftovers no longer complete anything
        assert!(!rx.frame_ready());
        feed(&mut rx, &[0xA5, 0x5A, 0x01, 0x42]);
        assert!(rx.frame_ready());
        assert_eq!(rx.encoded(), &[0x42]);
    }

    #[test]
    fn test_tx_immediate_when_free() {
        let mut tx = FrameTx::new();
        let mut port = MockPort::new();
        tx.send_response(&mut port, &[0x00, 0x01, 0x00, 0x00]).unwrap();
        assert_eq!(port.frames.len(), 1);
        assert_eq!(port.frames[0], vec![0xA5, 0x5A, 0x05, 0x01, 0x02, 0x01, 0x01, 0x01]);
        assert!(!tx.queue_pending());
    }

    #[test]
    fn test_tx_queues_when_busy_and_rejects_second() {
        let mut tx = FrameTx::new();
        let mut port = MockPort::new();
        port.busy = true;
        tx.send_response(&mut port, &[0x00]).unwrap();
        assert!(tx.queue_pending());
        assert!(port.frames.is_empty());
        assert_eq!(tx.send_response(&mut port, &[0x04]), Err(Error::BadState));

        port.busy = false;
        tx.process_queue(&mut port);
        assert!(!tx.queue_pending());
        assert_eq!(port.frames.len(), 1);
        assert_eq!(port.frames[0], vec![0xA5, 0x5A, 0x02, 0x01, 0x01]);
    }
}
