//! Virtual SSD1306-class panel.
//!
//! Interprets the same control-prefixed chunk stream the firmware sends over
//! I2C: 0x00 chunks carry command bytes (only the column/page address window
//! commands matter here), 0x40 chunks carry page data written at the current
//! window position in horizontal addressing order.

use oledui_slave::render::PAGE_BUF_LEN;
use oledui_slave::transfer::DisplayBus;

const MAX_PAGES: usize = 8;

const CMD_SET_COL_ADDR: u8 = 0x21;
const CMD_SET_PAGE_ADDR: u8 = 0x22;

/// Panel RAM plus the address window state machine.
pub struct VirtualPanel {
    vram: [[u8; PAGE_BUF_LEN]; MAX_PAGES],
    pages: usize,
    col_start: u8,
    col_end: u8,
    page_start: u8,
    page_end: u8,
    col: u8,
    page: u8,
    /// Command arguments still expected for the pending command.
    pending_cmd: Option<(u8, u8)>,
    pub chunk_count: usize,
}

impl VirtualPanel {
    pub fn new(height: usize) -> Self {
        Self {
            vram: [[0; PAGE_BUF_LEN]; MAX_PAGES],
            pages: height / 8,
            col_start: 0,
            col_end: PAGE_BUF_LEN as u8 - 1,
            page_start: 0,
            page_end: MAX_PAGES as u8 - 1,
            col: 0,
            page: 0,
            pending_cmd: None,
            chunk_count: 0,
        }
    }

    fn command_byte(
        &mut self,
        byte: u8,
    ) {
        if let Some((cmd, remaining)) = self.pending_cmd {
            match (cmd, remaining) {
                (CMD_SET_COL_ADDR, 2) => self.col_start = byte.min(PAGE_BUF_LEN as u8 - 1),
                (CMD_SET_COL_ADDR, 1) => {
                    self.col_end = byte.min(PAGE_BUF_LEN as u8 - 1);
                    self.col = self.col_start;
                }
                (CMD_SET_PAGE_ADDR, 2) => self.page_start = byte.min(MAX_PAGES as u8 - 1),
                (CMD_SET_PAGE_ADDR, 1) => {
                    self.page_end = byte.min(MAX_PAGES as u8 - 1);
                    self.page = self.page_start;
                }
                _ => {}
            }
            self.pending_cmd = if remaining > 1 { Some((cmd, remaining - 1)) } else { None };
            return;
        }
        match byte {
            CMD_SET_COL_ADDR | CMD_SET_PAGE_ADDR => self.pending_cmd = Some((byte, 2)),
            // Every other command is accepted and ignored.
            _ => {}
        }
    }

    fn data_byte(
        &mut self,
        byte: u8,
    ) {
        self.vram[self.page as usize][self.col as usize] = byte;
        if self.col < self.col_end {
            self.col += 1;
        } else {
            self.col = self.col_start;
            self.page = if self.page < self.page_end { self.page + 1 } else { self.page_start };
        }
    }

    /// Write one page directly, bypassing the bus (boot banner).
    pub fn blit_page(
        &mut self,
        page: usize,
        data: &[u8; PAGE_BUF_LEN],
    ) {
        if page < self.pages {
            self.vram[page] = *data;
        }
    }

    pub fn clear(&mut self) { self.vram = [[0; PAGE_BUF_LEN]; MAX_PAGES]; }

    fn pixel(
        &self,
        x: usize,
        y: usize,
    ) -> bool {
        self.vram[y / 8][x] & (1 << (y % 8)) != 0
    }

    /// Render the panel as unicode half-blocks, two pixel rows per line.
    pub fn to_ascii(&self) -> String {
        let height = self.pages * 8;
        let mut out = String::new();
        out.push('+');
        out.push_str(&"-".repeat(PAGE_BUF_LEN));
        out.push_str("+\n");
        for y in (0..height).step_by(2) {
            out.push('|');
            for x in 0..PAGE_BUF_LEN {
                let glyph = match (self.pixel(x, y), self.pixel(x, y + 1)) {
                    (true, true) => '\u{2588}',
                    (true, false) => '\u{2580}',
                    (false, true) => '\u{2584}',
                    (false, false) => ' ',
                };
                out.push(glyph);
            }
            out.push_str("|\n");
        }
        out.push('+');
        out.push_str(&"-".repeat(PAGE_BUF_LEN));
        out.push_str("+\n");
        out
    }
}

impl DisplayBus for VirtualPanel {
    fn write_raw(
        &mut self,
        bytes: &[u8],
    ) -> oledui_common::Result<()> {
        self.chunk_count += 1;
        let (&control, payload) = bytes.split_first().expect("empty chunk");
        for &b in payload {
            if control == 0x40 {
                self.data_byte(b);
            } else {
                self.command_byte(b);
            }
        }
        Ok(())
    }

    // The virtual bus latches synchronously, so it is never busy.
    fn tx_busy(&self) -> bool { false }
}
