//! Cooperative page transfer engine.
//!
//! A frame is streamed one page at a time: set the column/page address
//! window, build the shared 128-byte buffer via the render callback, then
//! stream it in chunks of at most [`I2C_BUFFER_LIMIT`] payload bytes behind a
//! one-byte control prefix (0x00 commands, 0x40 data). Two ping-pong chunk
//! buffers let the next chunk assemble while the previous one drains.
//!
//! `advance` is called once per main-loop tick and returns immediately while
//! the bus is busy. At most one rerender can be pending: requests while a
//! frame is in flight collapse into a single flag, and the restarted frame
//! always renders from the freshest state.

use oledui_common::{Error, Result};

use crate::config::I2C_BUFFER_LIMIT;
use crate::render::{PAGE_BUF_LEN, PageBuf};

/// Control prefix for command bytes.
pub const CONTROL_CMD: u8 = 0x00;
/// Control prefix for display data bytes.
pub const CONTROL_DATA: u8 = 0x40;

/// Set column address window.
const CMD_SET_COL_ADDR: u8 = 0x21;
/// Set page address window.
const CMD_SET_PAGE_ADDR: u8 = 0x22;

/// Non-blocking byte sink toward the display controller.
///
/// `write_raw` hands over one prepared chunk (control prefix included) for a
/// single DMA burst and must not block; `tx_busy` reports whether that burst
/// is still draining. Implementations may DMA directly from the borrowed
/// chunk: the engine never touches a chunk buffer again until the bus has
/// gone idle.
pub trait DisplayBus {
    fn write_raw(
        &mut self,
        bytes: &[u8],
    ) -> Result<()>;

    fn tx_busy(&self) -> bool;
}

/// Source region of the active chunked transfer.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Source {
    Cmd,
    Data,
}

/// Per-page pipeline stage.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
enum Stage {
    Idle,
    Addr,
    Build,
    StreamStart,
    Streaming,
}

/// Page transfer engine with single-frame rerender coalescing.
pub struct PageTransfer {
    stage: Stage,
    page: u8,
    pages: u8,
    rerender_pending: bool,

    xfer_active: bool,
    xfer_source: Source,
    xfer_control: u8,
    xfer_sent: usize,
    xfer_total: usize,
    cmd_buf: [u8; 6],
    bulk: [[u8; I2C_BUFFER_LIMIT + 1]; 2],
    bulk_index: usize,

    page_buf: PageBuf,
}

impl PageTransfer {
    /// Engine for a panel with the given page count (4 or 8).
    pub fn new(pages: u8) -> Self {
        Self {
            stage: Stage::Idle,
            page: 0,
            pages,
            rerender_pending: false,
            xfer_active: false,
            xfer_source: Source::Cmd,
            xfer_control: CONTROL_CMD,
            xfer_sent: 0,
            xfer_total: 0,
            cmd_buf: [0; 6],
            bulk: [[0; I2C_BUFFER_LIMIT + 1]; 2],
            bulk_index: 0,
            page_buf: [0; PAGE_BUF_LEN],
        }
    }

    /// Whether a frame is currently in flight.
    pub const fn busy(&self) -> bool { !matches!(self.stage, Stage::Idle) }

    /// Whether the low-level chunked transfer still holds the bus.
    pub const fn dma_xfer_active(&self) -> bool { self.xfer_active }

    /// Start a frame. Fails when one is already active.
    pub fn begin(&mut self) -> Result<()> {
        if self.busy() {
            return Err(Error::BadState);
        }
        self.stage = Stage::Addr;
        self.page = 0;
        self.rerender_pending = false;
        Ok(())
    }

    /// Queue a single rerender behind the active frame.
    pub fn request_rerender(&mut self) {
        if self.busy() {
            self.rerender_pending = true;
        }
    }

    /// Start a frame, or coalesce into a pending rerender when active.
    pub fn start_or_request(&mut self) {
        if self.begin().is_err() {
            self.request_rerender();
        }
    }

    fn start_xfer(
        &mut self,
        source: Source,
        control: u8,
        total: usize,
    ) {
        self.xfer_active = true;
        self.xfer_source = source;
        self.xfer_control = control;
        self.xfer_sent = 0;
        self.xfer_total = total;
    }

    /// Feed the next chunk to the bus when it is free.
    fn xfer_process<B: DisplayBus>(
        &mut self,
        bus: &mut B,
    ) {
        if !self.xfer_active || bus.tx_busy() {
            return;
        }
        if self.xfer_sent >= self.xfer_total {
            self.xfer_active = false;
            return;
        }
        let remaining = self.xfer_total - self.xfer_sent;
        let chunk = remaining.min(I2C_BUFFER_LIMIT);
        let bi = self.bulk_index ^ 1;
        self.bulk[bi][0] = self.xfer_control;
        let span = self.xfer_sent..self.xfer_sent + chunk;
        match self.xfer_source {
            Source::Cmd => self.bulk[bi][1..=chunk].copy_from_slice(&self.cmd_buf[span]),
            Source::Data => self.bulk[bi][1..=chunk].copy_from_slice(&self.page_buf[span]),
        }
        if bus.write_raw(&self.bulk[bi][..=chunk]).is_err() {
            // Bus error aborts the stream; the frame ends early.
            self.xfer_active = false;
            return;
        }
        self.bulk_index = bi;
        self.xfer_sent += chunk;
    }

    /// Queue the column/page address window burst for the current page.
    fn start_addr_burst(&mut self) {
        self.cmd_buf = [
            CMD_SET_COL_ADDR,
            0,
            (PAGE_BUF_LEN - 1) as u8,
            CMD_SET_PAGE_ADDR,
            self.page,
            self.page,
        ];
        self.start_xfer(Source::Cmd, CONTROL_CMD, self.cmd_buf.len());
    }

    /// Advance the per-page state machine by one step.
    ///
    /// `render` fills one page of the shared buffer; it is invoked exactly
    /// once per page per frame, after the address window burst has drained.
    pub fn advance<B: DisplayBus>(
        &mut self,
        bus: &mut B,
        mut render: impl FnMut(u8, &mut PageBuf),
    ) {
        if !self.busy() {
            return;
        }
        self.xfer_process(bus);

        match self.stage {
            Stage::Idle => {}
            Stage::Addr => {
                if bus.tx_busy() || self.xfer_active {
                    return;
                }
                self.start_addr_burst();
                self.stage = Stage::Build;
            }
            Stage::Build => {
                if bus.tx_busy() || self.xfer_active {
                    return;
                }
                self.page_buf.fill(0);
                render(self.page, &mut self.page_buf);
                self.stage = Stage::StreamStart;
            }
            Stage::StreamStart => {
                if bus.tx_busy() {
                    return;
                }
                self.start_xfer(Source::Data, CONTROL_DATA, PAGE_BUF_LEN);
                self.stage = Stage::Streaming;
            }
            Stage::Streaming => {
                if self.xfer_active {
                    return;
                }
                self.page += 1;
                if self.page >= self.pages {
                    if self.rerender_pending {
                        self.rerender_pending = false;
                        self.page = 0;
                        self.stage = Stage::Addr;
                        #[cfg(feature = "defmt")]
                        defmt::trace!("frame done, rerender queued");
                    } else {
                        self.stage = Stage::Idle;
                        #[cfg(feature = "defmt")]
                        defmt::trace!("frame done");
                    }
                    return;
                }
                self.stage = Stage::Addr;
            }
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Records every chunk and stays busy for a fixed number of polls after
    /// each write, imitating a draining DMA burst.
    struct MockBus {
        chunks: Vec<Vec<u8>>,
        busy_polls: u8,
        busy_per_write: u8,
    }

    impl MockBus {
        fn new(busy_per_write: u8) -> Self {
            Self {
                chunks: Vec::new(),
                busy_polls: 0,
                busy_per_write,
            }
        }
    }

    impl DisplayBus for MockBus {
        fn write_raw(
            &mut self,
            bytes: &[u8],
        ) -> Result<()> {
            self.chunks.push(bytes.to_vec());
            self.busy_polls = self.busy_per_write;
            Ok(())
        }

        fn tx_busy(&self) -> bool { self.busy_polls > 0 }
    }

    fn tick(
        engine: &mut PageTransfer,
        bus: &mut MockBus,
        frames: &mut u32,
    ) {
        if bus.busy_polls > 0 {
            bus.busy_polls -= 1;
        }
        engine.advance(bus, |_page, buf| {
            buf[0] = 0xAB;
            *frames += 1;
        });
    }

    #[test]
    fn test_full_frame_chunk_sequence() {
        let mut engine = PageTransfer::new(4);
        let mut bus = MockBus::new(0);
        let mut renders = 0;
        engine.begin().unwrap();
        for _ in 0..200 {
            tick(&mut engine, &mut bus, &mut renders);
            if !engine.busy() {
                break;
            }
        }
        assert!(!engine.busy());
        assert_eq!(renders, 4);
        // Per page: 1 address burst + ceil(128 / 28) = 5 data chunks.
        assert_eq!(bus.chunks.len(), 4 * 6);
        for page in 0..4u8 {
            let addr = &bus.chunks[page as usize * 6];
            assert_eq!(addr.as_slice(), &[0x00, 0x21, 0, 127, 0x22, page, page]);
            let data: usize = bus.chunks[page as usize * 6 + 1..page as usize * 6 + 6]
                .iter()
                .map(|c| {
                    assert_eq!(c[0], 0x40);
                    c.len() - 1
                })
                .sum();
            assert_eq!(data, 128);
        }
        // Last data chunk of each page carries the 128 % 28 remainder.
        assert_eq!(bus.chunks[5].len() - 1, 16);
    }

    #[test]
    fn test_advance_waits_for_busy_bus() {
        let mut engine = PageTransfer::new(4);
        let mut bus = MockBus::new(3);
        let mut renders = 0;
        engine.begin().unwrap();
        let mut ticks = 0;
        while engine.busy() && ticks < 1000 {
            tick(&mut engine, &mut bus, &mut renders);
            ticks += 1;
        }
        assert!(!engine.busy());
        assert_eq!(renders, 4);
        // Slower bus means more ticks, never more chunks.
        assert_eq!(bus.chunks.len(), 4 * 6);
        assert!(ticks > 4 * 6);
    }

    #[test]
    fn test_begin_while_active_fails() {
        let mut engine = PageTransfer::new(4);
        engine.begin().unwrap();
        assert_eq!(engine.begin(), Err(Error::BadState));
    }

    #[test]
    fn test_rerender_coalesces_to_one_extra_frame() {
        let mut engine = PageTransfer::new(4);
        let mut bus = MockBus::new(0);
        let mut renders = 0;
        engine.begin().unwrap();
        // Several requests while busy collapse into a single pending flag.
        engine.request_rerender();
        engine.start_or_request();
        engine.request_rerender();
        for _ in 0..400 {
            tick(&mut engine, &mut bus, &mut renders);
            if !engine.busy() {
                break;
            }
        }
        assert!(!engine.busy());
        assert_eq!(renders, 8);
        assert_eq!(bus.chunks.len(), 2 * 4 * 6);
    }

    #[test]
    fn test_request_rerender_when_idle_is_noop() {
        let mut engine = PageTransfer::new(4);
        engine.request_rerender();
        assert!(!engine.busy());
        let mut bus = MockBus::new(0);
        engine.advance(&mut bus, |_, _| panic!("no frame was started"));
        assert!(bus.chunks.is_empty());
    }

    #[test]
    fn test_eight_page_panel() {
        let mut engine = PageTransfer::new(8);
        let mut bus = MockBus::new(0);
        let mut renders = 0;
        engine.begin().unwrap();
        for _ in 0..400 {
            tick(&mut engine, &mut bus, &mut renders);
        }
        assert_eq!(renders, 8);
        assert_eq!(bus.chunks.len(), 8 * 6);
    }
}
