//! Tunable constants for the slave core.
//!
//! Values mirror the reference wiring: a 128-column SSD1306-class panel in
//! page mode, a ~1 ms main-loop tick and a ~16 ms animation frame.

/// Panel width in pixels (also the size of one page buffer).
pub const DISPLAY_WIDTH: usize = 128;

/// Height of one page in pixels.
pub const PAGE_HEIGHT: u8 = 8;

/// Shared arena capacity in bytes. Tunable; must cover the per-element
/// tables, packed attributes and runtime nodes of the intended workload.
pub const ARENA_CAP: usize = 768;

/// Maximum payload bytes per display-bus DMA burst (excludes the control
/// prefix byte).
pub const I2C_BUFFER_LIMIT: usize = 28;

/// Animation frame period driven off the millisecond time base.
pub const ANIM_FRAME_MS: u32 = 16;

/// Horizontal screen-slide speed; 128 px / 8 px per frame = 16 frames.
pub const SCREEN_ANIM_PIXELS_PER_FRAME: i16 = 8;

/// List scroll speed; rows are 8 px high, so one row takes 8 frames.
pub const LIST_ANIM_PIXELS_PER_FRAME: u8 = 1;

/// Edit-mode blink half period in animation frames (~500 ms cycle).
pub const EDIT_BLINK_PERIOD_FRAMES: u8 = 30;

/// Maximum nesting depth of the navigation stack.
pub const NAV_STACK_MAX_DEPTH: usize = 4;

/// Inter-byte RX watchdog; a partial frame is dropped after this gap.
pub const RX_INTERBYTE_TIMEOUT_MS: u32 = 200;

/// Default overlay duration when the host omits one.
pub const OVERLAY_DEFAULT_MS: u16 = 1200;

/// Maximum stored text payload (characters, excluding the terminator).
pub const TEXT_CAP_MAX: u8 = 20;

const _: () = assert!(ARENA_CAP <= u16::MAX as usize);
const _: () = assert!(ARENA_CAP >= 256, "arena must hold tables for a minimal workload");
