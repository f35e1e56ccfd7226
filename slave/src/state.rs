//! Protocol state: the single value owned by the main loop.
//!
//! Everything the host can provision or mutate lives here: the arena-backed
//! model, focus and navigation, overlay and animation state, and the status
//! flags reported to the host. Interrupt handlers never touch this value;
//! they only feed bytes into the link layer.

use crate::arena::Arena;
use crate::config::NAV_STACK_MAX_DEPTH;
use crate::element::{ElementType, INVALID_ID, ScreenRole};

/// Navigation context type of one stack entry.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NavContext {
    /// Nested list entered via a list row.
    #[default]
    List,
    /// Local screen entered via a list row.
    LocalScreen,
}

/// Snapshot pushed when entering a nested list or local screen.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NavEntry {
    pub ctx: NavContext,
    /// Entered element id (list or screen).
    pub target: u8,
    /// Parent list to restore on pop.
    pub return_list: u8,
    pub saved_cursor: u8,
    pub saved_top: u8,
    pub saved_focus: u8,
    pub saved_active_screen: u8,
}

impl Default for NavEntry {
    fn default() -> Self {
        Self {
            ctx: NavContext::List,
            target: INVALID_ID,
            return_list: INVALID_ID,
            saved_cursor: 0,
            saved_top: 0,
            saved_focus: INVALID_ID,
            saved_active_screen: 0,
        }
    }
}

/// Horizontal screen-slide animation state.
#[derive(Clone, Copy, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ScreenAnim {
    pub active: bool,
    /// Source screen ordinal.
    pub from: u8,
    /// Destination screen ordinal.
    pub to: u8,
    /// Accumulated offset 0..128 px.
    pub offset_px: i16,
    /// +1 next screen enters from the right, -1 from the left.
    pub dir: i8,
}

/// Overlay screen runtime state.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Overlay {
    /// Element id of the active overlay screen; [`INVALID_ID`] when none.
    pub screen_id: u8,
    pub remaining_ms: u16,
    /// Only OK passes through while set.
    pub mask_input: bool,
    /// Focus restored when the overlay clears.
    pub prev_focus: u8,
}

impl Default for Overlay {
    fn default() -> Self {
        Self {
            screen_id: INVALID_ID,
            remaining_ms: 0,
            mask_input: false,
            prev_focus: INVALID_ID,
        }
    }
}

/// Edit-mode blink state shared by all editing barrels.
#[derive(Clone, Copy, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EditBlink {
    pub active: bool,
    /// `true` during the bright phase.
    pub bright: bool,
    pub counter: u8,
}

/// The full slave-side UI/protocol state.
pub struct UiState {
    pub arena: Arena,
    /// Active base-screen ordinal.
    pub active_screen: u8,
    /// Number of base screens declared so far.
    pub screen_count: u8,
    /// Horizontal scroll base in pixels.
    pub scroll_x: i16,
    /// Set by COMMIT; freezes attribute appends.
    pub initialized: bool,
    pub status_dirty: bool,
    /// Most recently changed element id (last-writer-wins).
    pub status_dirty_id: u8,
    pub header_seen: bool,
    pub protocol_version: u8,
    pub capabilities: u32,
    /// Focused element id, [`INVALID_ID`] when none.
    pub focused: u8,
    pub nav_depth: u8,
    pub nav_stack: [NavEntry; NAV_STACK_MAX_DEPTH],
    /// Current local screen id when nested, [`INVALID_ID`] otherwise.
    pub active_local_screen: u8,
    pub screen_anim: ScreenAnim,
    pub overlay: Overlay,
    pub edit_blink: EditBlink,
    /// Panel height in pixels (32 or 64).
    pub display_height: u8,
    /// Render wanted; consumed by the runtime once per loop.
    pub render_requested: bool,
    /// Standby wanted; consumed by the integrator shell.
    pub standby_requested: bool,
}

impl UiState {
    /// Fresh state for a panel of the given height.
    pub fn new(display_height: u8) -> Self {
        let mut s = Self {
            arena: Arena::new(),
            active_screen: 0,
            screen_count: 0,
            scroll_x: 0,
            initialized: false,
            status_dirty: false,
            status_dirty_id: INVALID_ID,
            header_seen: false,
            protocol_version: 1,
            capabilities: 0,
            focused: INVALID_ID,
            nav_depth: 0,
            nav_stack: [NavEntry::default(); NAV_STACK_MAX_DEPTH],
            active_local_screen: INVALID_ID,
            screen_anim: ScreenAnim::default(),
            overlay: Overlay::default(),
            edit_blink: EditBlink::default(),
            display_height,
            render_requested: false,
            standby_requested: false,
        };
        s.reset();
        s
    }

    /// Wipe all provisioned and runtime UI state (HEAD flag). The panel
    /// geometry and pending loop flags survive.
    pub fn reset(&mut self) {
        self.arena.reset();
        self.active_screen = 0;
        self.screen_count = 0;
        self.scroll_x = 0;
        self.initialized = false;
        self.status_dirty = false;
        self.status_dirty_id = INVALID_ID;
        self.header_seen = false;
        self.protocol_version = 1;
        self.capabilities = 0;
        self.focused = INVALID_ID;
        self.nav_depth = 0;
        self.nav_stack = [NavEntry::default(); NAV_STACK_MAX_DEPTH];
        self.active_local_screen = INVALID_ID;
        self.screen_anim = ScreenAnim::default();
        self.overlay = Overlay::default();
        self.edit_blink = EditBlink::default();
    }

    /// Record an element change for GET_STATUS dirty reporting.
    pub fn element_changed(
        &mut self,
        element_id: u8,
    ) {
        if element_id >= self.arena.element_count() {
            return;
        }
        self.status_dirty = true;
        self.status_dirty_id = element_id;
    }

    /// Ask the runtime to start (or coalesce) a frame.
    pub fn request_render(&mut self) { self.render_requested = true; }

    /// Overlay role of a screen element ([`ScreenRole::None`] for anything
    /// that is not a screen or has no role attribute).
    pub fn screen_role(
        &self,
        element_id: u8,
    ) -> ScreenRole {
        match self.arena.element(element_id) {
            Some(el) if el.ty == ElementType::Screen => self
                .arena
                .screen_role_attr(element_id)
                .map(ScreenRole::from_raw)
                .unwrap_or(ScreenRole::None),
            _ => ScreenRole::None,
        }
    }

    /// Barrel selection index (0 when the node does not exist).
    pub fn barrel_value(
        &self,
        element_id: u8,
    ) -> i16 {
        self.arena.barrel_find(element_id).map(|b| b.value).unwrap_or(0)
    }

    /// Barrel aux byte (0 when the node does not exist).
    pub fn barrel_aux(
        &self,
        element_id: u8,
    ) -> u8 {
        self.arena.barrel_find(element_id).map(|b| b.aux).unwrap_or(0)
    }

    /// Whether a barrel element is currently in edit mode.
    pub fn barrel_is_editing(
        &self,
        element_id: u8,
    ) -> bool {
        self.arena.barrel_find(element_id).map(|b| b.editing()).unwrap_or(false)
    }

    /// Whether any barrel element is in edit mode.
    pub fn any_barrel_editing(&self) -> bool {
        for id in 0..self.arena.element_count() {
            if matches!(self.arena.element(id), Some(el) if el.ty == ElementType::Barrel)
                && self.barrel_is_editing(id)
            {
                return true;
            }
        }
        false
    }

    /// Top-of-stack navigation entry, if any.
    pub fn nav_top(&self) -> Option<&NavEntry> {
        if self.nav_depth == 0 {
            return None;
        }
        self.nav_stack.get(self.nav_depth as usize - 1)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
