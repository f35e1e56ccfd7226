//! Tree helpers: child lookups, screen ordinals and bounded parent walks.
//!
//! All helpers iterate element ids 0..N-1 linearly; parent walks carry a hard
//! bound of N steps so malformed parent data can never hang the slave.

use crate::element::{ElementType, INVALID_ID, ScreenRole};
use crate::state::UiState;

impl UiState {
    /// Count all Text children of a list (creation order, no visibility).
    pub fn list_item_count(
        &self,
        list_id: u8,
    ) -> u8 {
        let mut count = 0;
        for id in 0..self.arena.element_count() {
            if let Some(el) = self.arena.element(id) {
                if el.parent == list_id && el.ty == ElementType::Text {
                    count += 1;
                }
            }
        }
        count
    }

    /// Count visible Text rows of a list.
    pub fn list_row_count(
        &self,
        list_id: u8,
    ) -> u8 {
        let mut count = 0;
        for id in 0..self.arena.element_count() {
            if let Some(el) = self.arena.element(id) {
                if el.parent == list_id && el.ty == ElementType::Text && self.is_element_visible(id) {
                    count += 1;
                }
            }
        }
        count
    }

    /// The `row`-th visible Text child of a list.
    pub fn list_child_by_index(
        &self,
        list_id: u8,
        row: u8,
    ) -> Option<u8> {
        let mut seen = 0;
        for id in 0..self.arena.element_count() {
            if let Some(el) = self.arena.element(id) {
                if el.parent == list_id && el.ty == ElementType::Text && self.is_element_visible(id) {
                    if seen == row {
                        return Some(id);
                    }
                    seen += 1;
                }
            }
        }
        None
    }

    /// Visible row index of a specific Text child within a list.
    pub fn list_row_index_of_text(
        &self,
        list_id: u8,
        text_id: u8,
    ) -> Option<u8> {
        let mut row = 0;
        for id in 0..self.arena.element_count() {
            if let Some(el) = self.arena.element(id) {
                if el.parent == list_id && el.ty == ElementType::Text && self.is_element_visible(id) {
                    if id == text_id {
                        return Some(row);
                    }
                    row += 1;
                }
            }
        }
        None
    }

    /// First Barrel child of a Text row, if any.
    pub fn text_inline_barrel(
        &self,
        text_id: u8,
    ) -> Option<u8> {
        self.first_child_of_type(text_id, ElementType::Barrel)
    }

    /// First List child of a Text row, if any.
    pub fn text_nested_list(
        &self,
        text_id: u8,
    ) -> Option<u8> {
        self.first_child_of_type(text_id, ElementType::List)
    }

    /// First Screen child of a Text row (its local screen), if any.
    pub fn text_local_screen(
        &self,
        text_id: u8,
    ) -> Option<u8> {
        self.first_child_of_type(text_id, ElementType::Screen)
    }

    fn first_child_of_type(
        &self,
        parent_id: u8,
        ty: ElementType,
    ) -> Option<u8> {
        if parent_id >= self.arena.element_count() {
            return None;
        }
        (0..self.arena.element_count()).find(|&id| {
            matches!(self.arena.element(id), Some(el) if el.parent == parent_id && el.ty == ty)
        })
    }

    /// Count Text options under a barrel.
    pub fn barrel_option_count(
        &self,
        barrel_id: u8,
    ) -> u8 {
        let mut count = 0;
        for id in 0..self.arena.element_count() {
            if let Some(el) = self.arena.element(id) {
                if el.parent == barrel_id && el.ty == ElementType::Text {
                    count += 1;
                }
            }
        }
        count
    }

    /// Text child of a barrel at a given option index.
    pub fn barrel_option_by_index(
        &self,
        barrel_id: u8,
        index: u8,
    ) -> Option<u8> {
        let mut seen = 0;
        for id in 0..self.arena.element_count() {
            if let Some(el) = self.arena.element(id) {
                if el.parent == barrel_id && el.ty == ElementType::Text {
                    if seen == index {
                        return Some(id);
                    }
                    seen += 1;
                }
            }
        }
        None
    }

    /// Nearest List ancestor of an element (bounded walk).
    pub fn element_parent_list(
        &self,
        element_id: u8,
    ) -> Option<u8> {
        let mut current = self.arena.element(element_id)?.parent;
        for _ in 0..self.arena.element_count() {
            let el = self.arena.element(current)?;
            if el.ty == ElementType::List {
                return Some(current);
            }
            current = el.parent;
        }
        None
    }

    /// Nearest Screen ancestor of an element, the element itself included.
    pub fn element_root_screen(
        &self,
        element_id: u8,
    ) -> Option<u8> {
        let mut current = element_id;
        for _ in 0..=self.arena.element_count() {
            let el = self.arena.element(current)?;
            if el.ty == ElementType::Screen {
                return Some(current);
            }
            current = el.parent;
        }
        None
    }

    /// Topmost base screen reached by climbing the parent chain past local
    /// screens. Used to resolve the ordinal an element scrolls with.
    pub fn element_owning_screen(
        &self,
        element_id: u8,
    ) -> Option<u8> {
        let mut owning = self.element_root_screen(element_id)?;
        let mut probe = owning;
        for _ in 0..self.arena.element_count() {
            let parent = match self.arena.element(probe) {
                Some(el) if el.parent != INVALID_ID => el.parent,
                _ => break,
            };
            if matches!(self.arena.element(parent), Some(el) if el.ty == ElementType::Screen) {
                owning = parent;
            }
            probe = parent;
        }
        Some(owning)
    }

    /// Bounded ancestor test; an element is its own descendant.
    pub fn is_descendant_of(
        &self,
        element_id: u8,
        ancestor: u8,
    ) -> bool {
        if ancestor == INVALID_ID {
            return false;
        }
        let mut current = element_id;
        for _ in 0..=self.arena.element_count() {
            if current == ancestor {
                return true;
            }
            current = match self.arena.element(current) {
                Some(el) => el.parent,
                None => return false,
            };
        }
        false
    }

    /// Element id of the `ordinal`-th base screen in declaration order.
    pub fn find_screen_id_by_ordinal(
        &self,
        ordinal: u8,
    ) -> Option<u8> {
        let mut seen = 0;
        for id in 0..self.arena.element_count() {
            if let Some(el) = self.arena.element(id) {
                if el.ty == ElementType::Screen
                    && el.parent == INVALID_ID
                    && self.screen_role(id) == ScreenRole::None
                {
                    if seen == ordinal {
                        return Some(id);
                    }
                    seen += 1;
                }
            }
        }
        None
    }

    /// Ordinal of a base screen element; `None` for local or overlay screens.
    pub fn find_screen_ordinal_by_id(
        &self,
        screen_id: u8,
    ) -> Option<u8> {
        let el = self.arena.element(screen_id)?;
        if el.ty != ElementType::Screen || el.parent != INVALID_ID {
            return None;
        }
        let mut ordinal = 0;
        for id in 0..self.arena.element_count() {
            if let Some(e) = self.arena.element(id) {
                if e.ty != ElementType::Screen || self.screen_role(id) != ScreenRole::None {
                    continue;
                }
                if id == screen_id {
                    return Some(ordinal);
                }
                ordinal += 1;
            }
        }
        None
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
