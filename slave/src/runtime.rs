//! Cooperative runtime: the fixed main-loop tick.
//!
//! One [`Slave`] value owns the whole stack: UI state, the page transfer
//! engine, link framing and the diagnostic ring. The integrator's loop calls
//! [`Slave::tick`] once per millisecond and feeds received bytes through
//! [`Slave::rx_byte`]; interrupt handlers never touch anything else.
//!
//! Per tick, in this order: advance the transfer engine one step, service
//! deferred RX/TX (decode, dispatch, respond), advance animations, surface
//! the standby request, start a render if one was requested, then advance
//! the millisecond time base. A COMMIT-flagged descriptor frame is therefore
//! always dispatched before the render-start gate of the same iteration.

use oledui_common::{Button, Error, Result, cobs, frame, result_rc};

use crate::diag::{DiagLog, Event};
use crate::link::{FrameRx, FrameTx, HostPort};
use crate::protocol::{self, AnimTimers, Reply};
use crate::render;
use crate::state::UiState;
use crate::transfer::{DisplayBus, PageTransfer};

/// The complete display-slave runtime.
pub struct Slave<B: DisplayBus, P: HostPort> {
    pub state: UiState,
    pub diag: DiagLog,
    transfer: PageTransfer,
    rx: FrameRx,
    tx: FrameTx,
    timers: AnimTimers,
    bus: B,
    port: P,
    now_ms: u32,
    render_was_busy: bool,
}

impl<B: DisplayBus, P: HostPort> Slave<B, P> {
    /// Build a runtime for a 32 or 64 pixel high panel.
    pub fn new(
        display_height: u8,
        bus: B,
        port: P,
    ) -> Result<Self> {
        if display_height != 32 && display_height != 64 {
            return Err(Error::Range);
        }
        Ok(Self {
            state: UiState::new(display_height),
            diag: DiagLog::new(),
            transfer: PageTransfer::new(display_height / 8),
            rx: FrameRx::new(),
            tx: FrameTx::new(),
            timers: AnimTimers::default(),
            bus,
            port,
            now_ms: 0,
            render_was_busy: false,
        })
    }

    /// Millisecond time base advanced by [`tick`](Self::tick).
    pub const fn now_ms(&self) -> u32 { self.now_ms }

    pub fn bus_mut(&mut self) -> &mut B { &mut self.bus }

    pub fn port_mut(&mut self) -> &mut P { &mut self.port }

    /// Feed one received byte (receive-interrupt path).
    pub fn rx_byte(
        &mut self,
        byte: u8,
    ) {
        self.rx.push_byte(byte, self.now_ms);
    }

    /// Flag a receive overrun (hardware OVR or buffer overflow).
    pub fn rx_overrun(&mut self) { self.rx.set_overrun(); }

    /// Inject a local button edge, mirroring the host input-event path.
    pub fn button_event(
        &mut self,
        button: Button,
        released: bool,
    ) {
        if self.state.overlay.screen_id != crate::element::INVALID_ID
            && self.state.overlay.mask_input
            && button != Button::Ok
        {
            return;
        }
        if released {
            self.state.handle_button_release(button);
            self.state.request_render();
        }
    }

    /// Consume a pending standby request. The shell is expected to drain the
    /// display bus, power the panel down, wait for the wake edge and then
    /// request a full re-render.
    pub fn take_standby_request(&mut self) -> bool {
        let pending = self.state.standby_requested;
        self.state.standby_requested = false;
        pending
    }

    /// Whether a frame is currently streaming to the panel.
    pub fn render_busy(&self) -> bool { self.transfer.busy() }

    /// Decode and dispatch a completed frame, then answer it.
    fn service_deferred_ops(&mut self) {
        if self.rx.overrun() {
            self.rx.reset();
            self.rx.clear_overrun();
        }
        self.tx.process_queue(&mut self.port);

        if self.rx.frame_ready() {
            let mut decoded = [0u8; frame::MAX_DECODED_LEN];
            if let Some(len) = cobs::decode(self.rx.encoded(), &mut decoded) {
                if len >= 1 {
                    let reply = protocol::handle_command(
                        &mut self.state,
                        &mut self.diag,
                        self.now_ms,
                        decoded[0],
                        &decoded[1..len],
                    );
                    let send_result = match reply {
                        Reply::Rc(result) => {
                            self.tx.send_response(&mut self.port, &[result_rc(result)])
                        }
                        Reply::Payload(payload) => self.tx.send_response(&mut self.port, &payload),
                        Reply::None => Ok(()),
                    };
                    let _ = send_result;
                }
            }
            self.rx.reset();
        }
        self.rx.watchdog_poll(self.now_ms);

        self.tx.process_queue(&mut self.port);
    }

    /// Start a frame when one was requested, coalescing while busy.
    fn handle_render_request(&mut self) {
        if !self.state.render_requested {
            return;
        }
        self.state.render_requested = false;
        if self.state.active_screen >= self.state.screen_count {
            self.state.active_screen = 0;
        }
        if !self.transfer.busy() {
            self.diag.record(Event::RenderStart, self.state.active_screen & 0x07, self.now_ms);
        }
        self.transfer.start_or_request();
    }

    /// One main-loop iteration.
    pub fn tick(&mut self) {
        let Self {
            transfer,
            bus,
            state,
            ..
        } = self;
        transfer.advance(bus, |page, buf| render::render_page(state, page, buf));
        if self.render_was_busy && !self.transfer.busy() {
            self.diag.record(Event::RenderDone, 0, self.now_ms);
        }
        self.render_was_busy = self.transfer.busy();

        self.service_deferred_ops();
        protocol::tick_animations(&mut self.state, &mut self.diag, &mut self.timers, self.now_ms);
        self.handle_render_request();
        self.now_ms = self.now_ms.wrapping_add(1);
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    struct LoopBus {
        chunks: Vec<Vec<u8>>,
    }

    impl DisplayBus for LoopBus {
        fn write_raw(
            &mut self,
            bytes: &[u8],
        ) -> Result<()> {
            self.chunks.push(bytes.to_vec());
            Ok(())
        }

        fn tx_busy(&self) -> bool { false }
    }

    struct LoopPort {
        frames: Vec<Vec<u8>>,
    }

    impl HostPort for LoopPort {
        fn tx_busy(&self) -> bool { false }

        fn tx_start(
            &mut self,
            bytes: &[u8],
        ) {
            self.frames.push(bytes.to_vec());
        }
    }

    fn slave() -> Slave<LoopBus, LoopPort> {
        Slave::new(64, LoopBus { chunks: Vec::new() }, LoopPort { frames: Vec::new() }).unwrap()
    }

    /// Frame a command + payload the way the host does.
    fn send(
        s: &mut Slave<LoopBus, LoopPort>,
        command: u8,
        payload: &[u8],
    ) {
        let mut raw = vec![command];
        raw.extend_from_slice(payload);
        let mut encoded = [0u8; 128];
        let n = cobs::encode(&raw, &mut encoded).unwrap();
        s.rx_byte(frame::SYNC0);
        s.rx_byte(frame::SYNC1);
        s.rx_byte(n as u8);
        for &b in &encoded[..n] {
            s.rx_byte(b);
        }
    }

    /// Pop and decode the oldest response payload.
    fn response(s: &mut Slave<LoopBus, LoopPort>) -> Vec<u8> {
        assert!(!s.port_mut().frames.is_empty(), "no response frame");
        let f = s.port_mut().frames.remove(0);
        assert_eq!(&f[..2], &[frame::SYNC0, frame::SYNC1]);
        assert_eq!(f[2] as usize, f.len() - 3);
        let mut out = [0u8; 128];
        let n = cobs::decode(&f[3..], &mut out).unwrap();
        out[..n].to_vec()
    }

    #[test]
    fn test_height_validation() {
        assert!(Slave::new(48, LoopBus { chunks: Vec::new() }, LoopPort { frames: Vec::new() }).is_err());
    }

    #[test]
    fn test_ping_roundtrip() {
        let mut s = slave();
        send(&mut s, 0x00, &[]);
        s.tick();
        assert_eq!(response(&mut s), vec![0x00, 0x01, 0x00, 0x00]);
    }

    #[test]
    fn test_malformed_frame_gets_no_response() {
        let mut s = slave();
        // LEN of zero is rejected at the framing layer.
        s.rx_byte(frame::SYNC0);
        s.rx_byte(frame::SYNC1);
        s.rx_byte(0);
        s.tick();
        assert!(s.port_mut().frames.is_empty());
    }

    #[test]
    fn test_commit_starts_render_same_tick() {
        let mut s = slave();
        send(&mut s, 0x01, &[0x01, b'{', b'"', b't', b'"', b':', b'"', b'h', b'"', b',', b'"', b'n', b'"', b':', b'1', b'}']);
        s.tick();
        let _ = response(&mut s);
        send(&mut s, 0x01, b"\x02{\"t\":\"s\"}");
        s.tick();
        // The COMMIT was dispatched and the frame started within one tick.
        assert!(s.render_busy());
        for _ in 0..500 {
            s.tick();
        }
        assert!(!s.render_busy());
        assert!(s.bus_mut().chunks.len() >= 8 * 6);
        let events: Vec<_> = s.diag.iter().map(|e| e.event).collect();
        assert!(events.contains(&Event::JsonCommit));
        assert!(events.contains(&Event::RenderStart));
        assert!(events.contains(&Event::RenderDone));
    }

    #[test]
    fn test_overrun_drops_pending_frame() {
        let mut s = slave();
        send(&mut s, 0x00, &[]);
        s.rx_overrun();
        s.tick();
        assert!(s.port_mut().frames.is_empty());
        // Link recovers afterwards.
        send(&mut s, 0x00, &[]);
        s.tick();
        assert_eq!(response(&mut s)[0], 0x00);
    }

    #[test]
    fn test_standby_request_surfaced_once() {
        let mut s = slave();
        send(&mut s, 0x50, &[]);
        s.tick();
        assert!(s.port_mut().frames.is_empty());
        assert!(s.take_standby_request());
        assert!(!s.take_standby_request());
    }
}
