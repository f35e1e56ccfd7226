//! Runtime node stores: list, barrel and trigger state in the arena tail.
//!
//! Each store is a singly linked list of fixed-size nodes rooted at a 16-bit
//! offset (0 = null). Nodes are created lazily by `*_get_or_add`; allocation
//! failure is silent (`None`) so an exhausted arena degrades to default
//! behavior instead of corrupting state. Nodes live until the next full
//! arena reset.

use crate::arena::Arena;
use crate::element::INVALID_ID;

/// Node wire layout: [next: u16][element_id: u8][state bytes...].
const NODE_HDR: usize = 3;

const LIST_STATE_LEN: usize = 9;
const BARREL_STATE_LEN: usize = 3;
const TRIGGER_STATE_LEN: usize = 1;

/// Runtime state of a List element.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ListState {
    /// Selected row among visible Text children.
    pub cursor: u8,
    /// First visible row index.
    pub top_index: u8,
    /// Desired window size in rows.
    pub visible_rows: u8,
    /// Non-zero while a row scroll animation runs.
    pub anim_active: bool,
    /// -1 up, +1 down, 0 none.
    pub anim_dir: i8,
    /// Scroll progress 0..8 pixels.
    pub anim_pix: u8,
    /// `top_index` applied when the animation completes.
    pub pending_top: u8,
    /// `cursor` applied when the animation completes.
    pub pending_cursor: u8,
    /// Most recent Text child appended during provisioning.
    pub last_text_child: u8,
}

impl Default for ListState {
    fn default() -> Self {
        Self {
            cursor: 0,
            top_index: 0,
            visible_rows: 4,
            anim_active: false,
            anim_dir: 0,
            anim_pix: 0,
            pending_top: 0,
            pending_cursor: 0,
            last_text_child: INVALID_ID,
        }
    }
}

impl ListState {
    /// Cancel any in-flight scroll animation.
    pub fn stop_anim(&mut self) {
        self.anim_active = false;
        self.anim_dir = 0;
        self.anim_pix = 0;
    }
}

/// Runtime state of a Barrel element.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BarrelState {
    /// Bit 7: edit mode. Bits 0..6: pre-edit snapshot index.
    pub aux: u8,
    /// Selection index.
    pub value: i16,
}

impl BarrelState {
    pub const fn editing(self) -> bool { self.aux & 0x80 != 0 }

    pub const fn snapshot(self) -> u8 { self.aux & 0x7F }
}

/// Runtime state of a Trigger element.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TriggerState {
    /// Monotonic version, wraps modulo 256.
    pub version: u8,
}

// =============================================================================
// Store access
// =============================================================================

impl Arena {
    fn node_find(
        &self,
        head: u16,
        element_id: u8,
    ) -> Option<usize> {
        let mut cur = head as usize;
        while cur != 0 {
            if self.byte(cur + 2) == element_id {
                return Some(cur);
            }
            cur = self.word(cur) as usize;
        }
        None
    }

    fn read_list(
        &self,
        off: usize,
    ) -> ListState {
        let s = off + NODE_HDR;
        ListState {
            cursor: self.byte(s),
            top_index: self.byte(s + 1),
            visible_rows: self.byte(s + 2),
            anim_active: self.byte(s + 3) != 0,
            anim_dir: self.byte(s + 4) as i8,
            anim_pix: self.byte(s + 5),
            pending_top: self.byte(s + 6),
            pending_cursor: self.byte(s + 7),
            last_text_child: self.byte(s + 8),
        }
    }

    fn write_list(
        &mut self,
        off: usize,
        st: &ListState,
    ) {
        let s = off + NODE_HDR;
        self.set_byte(s, st.cursor);
        self.set_byte(s + 1, st.top_index);
        self.set_byte(s + 2, st.visible_rows);
        self.set_byte(s + 3, st.anim_active as u8);
        self.set_byte(s + 4, st.anim_dir as u8);
        self.set_byte(s + 5, st.anim_pix);
        self.set_byte(s + 6, st.pending_top);
        self.set_byte(s + 7, st.pending_cursor);
        self.set_byte(s + 8, st.last_text_child);
    }

    /// Look up list state without creating it.
    pub fn list_find(
        &self,
        element_id: u8,
    ) -> Option<ListState> {
        self.node_find(self.lists_head, element_id).map(|off| self.read_list(off))
    }

    /// Fetch or lazily create list state with default values.
    pub fn list_get_or_add(
        &mut self,
        element_id: u8,
    ) -> Option<ListState> {
        if let Some(off) = self.node_find(self.lists_head, element_id) {
            return Some(self.read_list(off));
        }
        let off = self.alloc_tail(NODE_HDR + LIST_STATE_LEN)?;
        self.set_word(off as usize, self.lists_head);
        self.set_byte(off as usize + 2, element_id);
        self.write_list(off as usize, &ListState::default());
        self.lists_head = off;
        Some(ListState::default())
    }

    /// Write back list state; no-op when the node does not exist.
    pub fn list_set(
        &mut self,
        element_id: u8,
        st: &ListState,
    ) {
        if let Some(off) = self.node_find(self.lists_head, element_id) {
            self.write_list(off, st);
        }
    }

    /// Read-modify-write every list node (animation tick).
    pub fn update_lists(
        &mut self,
        mut f: impl FnMut(u8, &mut ListState),
    ) {
        let mut cur = self.lists_head as usize;
        while cur != 0 {
            let id = self.byte(cur + 2);
            let mut st = self.read_list(cur);
            f(id, &mut st);
            self.write_list(cur, &st);
            cur = self.word(cur) as usize;
        }
    }

    /// Look up barrel state without creating it.
    pub fn barrel_find(
        &self,
        element_id: u8,
    ) -> Option<BarrelState> {
        self.node_find(self.barrels_head, element_id).map(|off| {
            let s = off + NODE_HDR;
            BarrelState {
                aux: self.byte(s),
                value: i16::from_le_bytes([self.byte(s + 1), self.byte(s + 2)]),
            }
        })
    }

    /// Fetch or lazily create barrel state (value 0, aux 0).
    pub fn barrel_get_or_add(
        &mut self,
        element_id: u8,
    ) -> Option<BarrelState> {
        if let Some(st) = self.barrel_find(element_id) {
            return Some(st);
        }
        let off = self.alloc_tail(NODE_HDR + BARREL_STATE_LEN)?;
        self.set_word(off as usize, self.barrels_head);
        self.set_byte(off as usize + 2, element_id);
        self.barrels_head = off;
        Some(BarrelState::default())
    }

    /// Write back barrel state; no-op when the node does not exist.
    pub fn barrel_set(
        &mut self,
        element_id: u8,
        st: BarrelState,
    ) {
        if let Some(off) = self.node_find(self.barrels_head, element_id) {
            let s = off + NODE_HDR;
            self.set_byte(s, st.aux);
            let v = st.value.to_le_bytes();
            self.set_byte(s + 1, v[0]);
            self.set_byte(s + 2, v[1]);
        }
    }

    /// Look up trigger state without creating it.
    pub fn trigger_find(
        &self,
        element_id: u8,
    ) -> Option<TriggerState> {
        self.node_find(self.triggers_head, element_id).map(|off| TriggerState {
            version: self.byte(off + NODE_HDR),
        })
    }

    /// Fetch or lazily create trigger state (version 0).
    pub fn trigger_get_or_add(
        &mut self,
        element_id: u8,
    ) -> Option<TriggerState> {
        if let Some(st) = self.trigger_find(element_id) {
            return Some(st);
        }
        let off = self.alloc_tail(NODE_HDR + TRIGGER_STATE_LEN)?;
        self.set_word(off as usize, self.triggers_head);
        self.set_byte(off as usize + 2, element_id);
        self.triggers_head = off;
        Some(TriggerState::default())
    }

    /// Write back trigger state; no-op when the node does not exist.
    pub fn trigger_set(
        &mut self,
        element_id: u8,
        st: TriggerState,
    ) {
        if let Some(off) = self.node_find(self.triggers_head, element_id) {
            self.set_byte(off + NODE_HDR, st.version);
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
