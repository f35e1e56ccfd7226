//! Input state machine: maps button releases onto focus, lists, barrels,
//! triggers and the navigation stack.
//!
//! Only release events are processed. All input is dropped while a screen
//! slide runs; LEFT/RIGHT slide between base screens at depth 0 and are
//! ignored deeper in the stack.

use oledui_common::Button;

use crate::config::PAGE_HEIGHT;
use crate::element::{ElementType, INVALID_ID};
use crate::nodes::ListState;
use crate::state::{NavContext, UiState};

/// Focus kinds used by the dispatch tables.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum FocusKind {
    None,
    List,
    Barrel { editing: bool },
    Trigger,
    Other,
}

/// Action resolved for the selected row of a focused list.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum RowAction {
    None,
    InlineBarrel(u8),
    NestedList(u8),
    LocalScreen(u8),
}

impl UiState {
    fn focus_kind(&self) -> FocusKind {
        let Some(el) = self.arena.element(self.focused) else {
            return FocusKind::None;
        };
        match el.ty {
            ElementType::List => FocusKind::List,
            ElementType::Barrel => FocusKind::Barrel {
                editing: self.barrel_is_editing(self.focused),
            },
            ElementType::Trigger => FocusKind::Trigger,
            _ => FocusKind::Other,
        }
    }

    /// Effective list window: desired rows clamped by the panel height and
    /// the space below the list's y position. Never zero.
    pub fn list_effective_window(
        &self,
        list_id: u8,
        state: &ListState,
    ) -> u8 {
        let mut desired = if state.visible_rows != 0 { state.visible_rows } else { 4 };
        let max_rows = if self.display_height >= 64 { 8 } else { 6 };
        desired = desired.min(max_rows);
        if self.arena.element(list_id).is_none() {
            return desired;
        }
        let (_, base_y) = self.arena.pos(list_id);
        if self.display_height <= base_y {
            return 1;
        }
        let avail = ((self.display_height - base_y) / PAGE_HEIGHT).max(1);
        desired.min(avail)
    }

    // =========================================================================
    // Barrel edit mode
    // =========================================================================

    fn edit_blink_start(&mut self) {
        self.edit_blink.active = true;
        self.edit_blink.bright = true;
        self.edit_blink.counter = 0;
    }

    fn edit_blink_stop_if_unused(&mut self) {
        if !self.edit_blink.active || self.any_barrel_editing() {
            return;
        }
        self.edit_blink.active = false;
        self.edit_blink.bright = true;
        self.edit_blink.counter = 0;
    }

    fn barrel_begin_edit(
        &mut self,
        barrel_id: u8,
    ) {
        let Some(mut st) = self.arena.barrel_get_or_add(barrel_id) else {
            return;
        };
        let snapshot = st.value.max(0) as u8;
        st.aux = 0x80 | (snapshot & 0x7F);
        self.arena.barrel_set(barrel_id, st);
        self.edit_blink_start();
    }

    fn barrel_cancel_edit(
        &mut self,
        barrel_id: u8,
    ) {
        let Some(mut st) = self.arena.barrel_get_or_add(barrel_id) else {
            return;
        };
        let snapshot = st.snapshot();
        st.value = snapshot as i16;
        st.aux = snapshot;
        self.arena.barrel_set(barrel_id, st);
        self.edit_blink_stop_if_unused();
    }

    fn barrel_commit_edit(
        &mut self,
        barrel_id: u8,
    ) {
        let Some(mut st) = self.arena.barrel_get_or_add(barrel_id) else {
            return;
        };
        st.aux = (st.value.max(0) as u8) & 0x7F;
        self.arena.barrel_set(barrel_id, st);
        self.edit_blink_stop_if_unused();
    }

    fn barrel_change_option(
        &mut self,
        barrel_id: u8,
        dir: i8,
    ) {
        let options = self.barrel_option_count(barrel_id);
        if options == 0 {
            return;
        }
        let Some(mut st) = self.arena.barrel_get_or_add(barrel_id) else {
            return;
        };
        let index = st.value.max(0) as u8;
        let index = if dir < 0 {
            if index == 0 { options - 1 } else { index - 1 }
        } else {
            (index + 1) % options
        };
        st.value = index as i16;
        self.arena.barrel_set(barrel_id, st);
    }

    /// Refocus the list owning a barrel. With `restore_row` the cursor and
    /// window are recomputed so the barrel's row stays in view.
    fn barrel_focus_parent_list(
        &mut self,
        barrel_id: u8,
        restore_row: bool,
    ) {
        let parent_text = self.arena.element(barrel_id).map(|el| el.parent).unwrap_or(INVALID_ID);
        let Some(owning_list) = self.element_parent_list(barrel_id) else {
            self.focus_first_on_screen(self.active_screen);
            return;
        };
        self.set_focus(owning_list);
        if self.focused == owning_list && restore_row {
            if let Some(mut ls) = self.arena.list_get_or_add(owning_list) {
                let row_count = self.list_row_count(owning_list);
                let window = self.list_effective_window(owning_list, &ls).max(1);
                if row_count == 0 {
                    ls.cursor = 0;
                    ls.top_index = 0;
                    ls.pending_top = 0;
                    ls.pending_cursor = 0;
                } else {
                    let mut target_row = self
                        .list_row_index_of_text(owning_list, parent_text)
                        .unwrap_or(row_count - 1);
                    if target_row >= row_count {
                        target_row = row_count - 1;
                    }
                    ls.cursor = target_row;
                    if ls.top_index > target_row {
                        ls.top_index = target_row;
                    } else if target_row as u16 > ls.top_index as u16 + window as u16 - 1 {
                        ls.top_index = target_row.saturating_sub(window - 1);
                    }
                    ls.pending_cursor = ls.cursor;
                    ls.pending_top = ls.top_index;
                }
                ls.stop_anim();
                self.arena.list_set(owning_list, &ls);
            }
        } else if self.focused == INVALID_ID {
            self.focus_first_on_screen(self.active_screen);
        }
    }

    // =========================================================================
    // List handling
    // =========================================================================

    /// Move the list cursor; starts a per-row scroll animation when the
    /// cursor would leave the visible window.
    fn list_move_cursor(
        &mut self,
        list_id: u8,
        dir: i8,
    ) {
        let Some(mut ls) = self.arena.list_get_or_add(list_id) else {
            return;
        };
        let row_count = self.list_row_count(list_id);
        if row_count == 0 {
            ls.cursor = 0;
            ls.top_index = 0;
            self.arena.list_set(list_id, &ls);
            return;
        }
        if ls.cursor >= row_count {
            ls.cursor = row_count - 1;
        }
        let window = self.list_effective_window(list_id, &ls).max(1);
        if dir < 0 {
            if !ls.anim_active && ls.cursor > 0 {
                let new_cursor = ls.cursor - 1;
                if new_cursor < ls.top_index {
                    ls.anim_active = true;
                    ls.anim_dir = -1;
                    ls.anim_pix = 0;
                    ls.pending_cursor = new_cursor;
                    ls.pending_top = ls.top_index.saturating_sub(1);
                } else {
                    ls.cursor = new_cursor;
                }
            }
        } else if !ls.anim_active && ls.cursor + 1 < row_count {
            let new_cursor = ls.cursor + 1;
            if new_cursor as u16 >= ls.top_index as u16 + window as u16 {
                ls.anim_active = true;
                ls.anim_dir = 1;
                ls.anim_pix = 0;
                ls.pending_cursor = new_cursor;
                ls.pending_top = ls.top_index + 1;
            } else {
                ls.cursor = new_cursor;
            }
        }
        self.arena.list_set(list_id, &ls);
    }

    /// Text element under the list cursor, clamping a stale cursor first.
    fn list_selected_text(
        &mut self,
        list_id: u8,
    ) -> Option<u8> {
        let mut ls = self.arena.list_get_or_add(list_id)?;
        let row_count = self.list_row_count(list_id);
        if row_count == 0 {
            ls.cursor = 0;
            ls.top_index = 0;
            self.arena.list_set(list_id, &ls);
            return None;
        }
        if ls.cursor >= row_count {
            ls.cursor = row_count - 1;
            self.arena.list_set(list_id, &ls);
        }
        self.list_child_by_index(list_id, ls.cursor)
    }

    fn list_resolve_row_action(
        &mut self,
        list_id: u8,
    ) -> RowAction {
        let Some(text_id) = self.list_selected_text(list_id) else {
            return RowAction::None;
        };
        if let Some(barrel) = self.text_inline_barrel(text_id) {
            return RowAction::InlineBarrel(barrel);
        }
        if let Some(nested) = self.text_nested_list(text_id) {
            return RowAction::NestedList(nested);
        }
        if let Some(screen) = self.text_local_screen(text_id) {
            return RowAction::LocalScreen(screen);
        }
        RowAction::None
    }

    fn list_handle_inline_barrel(
        &mut self,
        barrel_id: u8,
    ) {
        self.set_focus(barrel_id);
        if !self.barrel_is_editing(barrel_id) {
            self.barrel_begin_edit(barrel_id);
            return;
        }
        self.barrel_commit_edit(barrel_id);
        self.element_changed(barrel_id);
        self.barrel_focus_parent_list(barrel_id, false);
    }

    fn list_handle_ok(
        &mut self,
        list_id: u8,
    ) {
        match self.list_resolve_row_action(list_id) {
            RowAction::InlineBarrel(barrel) => self.list_handle_inline_barrel(barrel),
            RowAction::NestedList(target) => {
                self.nav_push_list(list_id, target);
            }
            RowAction::LocalScreen(screen) => {
                self.nav_push_local_screen(list_id, screen);
            }
            RowAction::None => {}
        }
    }

    // =========================================================================
    // Screen slide
    // =========================================================================

    /// Start a slide to the neighbor screen; clamped at the ends.
    fn handle_screen_slide(
        &mut self,
        button: Button,
    ) {
        if self.nav_depth != 0 {
            return;
        }
        let target = match button {
            Button::Left => {
                if self.active_screen == 0 {
                    return;
                }
                self.active_screen - 1
            }
            Button::Right => {
                if self.active_screen + 1 >= self.screen_count {
                    return;
                }
                self.active_screen + 1
            }
            _ => return,
        };
        let anim = &mut self.screen_anim;
        anim.active = true;
        anim.from = self.active_screen;
        anim.to = target;
        anim.offset_px = 0;
        anim.dir = if button == Button::Right { 1 } else { -1 };
        self.scroll_x = anim.from as i16 * 128;
        // Visibility follows the target immediately.
        self.active_screen = target;
        self.clear_focus();
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    fn handle_updown(
        &mut self,
        dir: i8,
    ) {
        match self.focus_kind() {
            FocusKind::List => self.list_move_cursor(self.focused, dir),
            FocusKind::Barrel { editing: true } => self.barrel_change_option(self.focused, dir),
            _ => {
                if dir < 0 {
                    self.focus_prev();
                } else {
                    self.focus_next();
                }
            }
        }
    }

    fn handle_ok(&mut self) {
        match self.focus_kind() {
            FocusKind::None => self.focus_next(),
            FocusKind::Trigger => {
                let id = self.focused;
                if let Some(mut ts) = self.arena.trigger_get_or_add(id) {
                    ts.version = ts.version.wrapping_add(1);
                    self.arena.trigger_set(id, ts);
                    self.element_changed(id);
                }
            }
            FocusKind::Barrel { editing } => {
                let id = self.focused;
                if editing {
                    self.barrel_commit_edit(id);
                    self.element_changed(id);
                    self.barrel_focus_parent_list(id, false);
                } else {
                    self.barrel_begin_edit(id);
                }
            }
            FocusKind::List => self.list_handle_ok(self.focused),
            FocusKind::Other => {}
        }
    }

    fn handle_back(&mut self) {
        let focused = self.focused;
        let handled = match self.focus_kind() {
            FocusKind::Barrel { editing } => {
                if editing {
                    self.barrel_cancel_edit(focused);
                }
                self.barrel_focus_parent_list(focused, true);
                true
            }
            FocusKind::List => {
                let top_is_list = matches!(
                    self.nav_top(),
                    Some(entry) if entry.ctx == NavContext::List && entry.target == focused
                );
                if top_is_list && !self.nav_pop() {
                    self.clear_focus();
                }
                true
            }
            FocusKind::Trigger | FocusKind::Other => {
                if let Some(owning_list) = self.element_parent_list(focused) {
                    self.set_focus(owning_list);
                    true
                } else {
                    false
                }
            }
            FocusKind::None => false,
        };
        if handled {
            return;
        }
        if self.nav_depth != 0 {
            if !self.nav_pop() {
                self.clear_focus();
            }
            return;
        }
        if focused != INVALID_ID {
            return;
        }
        self.focus_first_on_screen(self.active_screen);
    }

    /// Process one button release.
    pub fn handle_button_release(
        &mut self,
        button: Button,
    ) {
        if self.screen_anim.active {
            return;
        }
        match button {
            Button::Left | Button::Right => self.handle_screen_slide(button),
            Button::Up => self.handle_updown(-1),
            Button::Down => self.handle_updown(1),
            Button::Ok => self.handle_ok(),
            Button::Back => self.handle_back(),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// screen0 { list1 [5 rows, visible 3] }.
    fn list_fixture() -> UiState {
        let mut s = UiState::new(64);
        s.arena.reserve_elements(8).unwrap();
        s.arena.add_element(INVALID_ID, ElementType::Screen, 0, 0).unwrap(); // 0
        s.arena.add_element(0, ElementType::List, 8, 0).unwrap(); // 1
        for i in 0..5 {
            s.arena.add_element(1, ElementType::Text, 0, i * 8).unwrap();
        }
        let mut ls = s.arena.list_get_or_add(1).unwrap();
        ls.visible_rows = 3;
        s.arena.list_set(1, &ls);
        s.screen_count = 1;
        s.set_focus(1);
        s
    }

    /// Finish any pending scroll animation instantly.
    fn settle(s: &mut UiState) {
        s.arena.update_lists(|_, ls| {
            if ls.anim_active {
                ls.top_index = ls.pending_top;
                ls.cursor = ls.pending_cursor;
                ls.stop_anim();
            }
        });
    }

    #[test]
    fn test_cursor_walk_with_window() {
        let mut s = list_fixture();
        let mut expect = [(1u8, 0u8), (2, 0), (3, 1), (4, 2)].into_iter();
        for _ in 0..4 {
            s.handle_button_release(Button::Down);
            settle(&mut s);
            let ls = s.arena.list_find(1).unwrap();
            assert_eq!((ls.cursor, ls.top_index), expect.next().unwrap());
        }
        // Clamped at the last row.
        s.handle_button_release(Button::Down);
        settle(&mut s);
        let ls = s.arena.list_find(1).unwrap();
        assert_eq!((ls.cursor, ls.top_index), (4, 2));
    }

    #[test]
    fn test_cursor_up_scrolls_back() {
        let mut s = list_fixture();
        for _ in 0..4 {
            s.handle_button_release(Button::Down);
            settle(&mut s);
        }
        for _ in 0..4 {
            s.handle_button_release(Button::Up);
            settle(&mut s);
        }
        let ls = s.arena.list_find(1).unwrap();
        assert_eq!((ls.cursor, ls.top_index), (0, 0));
    }

    #[test]
    fn test_moves_ignored_while_animating() {
        let mut s = list_fixture();
        for _ in 0..4 {
            s.handle_button_release(Button::Down);
        }
        // The fourth press arrived mid-animation and was dropped.
        settle(&mut s);
        let ls = s.arena.list_find(1).unwrap();
        assert_eq!((ls.cursor, ls.top_index), (3, 1));
    }

    #[test]
    fn test_effective_window_clamps_to_panel() {
        let mut s = list_fixture();
        let ls = s.arena.list_find(1).unwrap();
        assert_eq!(s.list_effective_window(1, &ls), 3);
        // A 32 px panel with the list at y=0 leaves 4 rows; desired 6 clamps.
        s.display_height = 32;
        let mut ls6 = ls;
        ls6.visible_rows = 6;
        assert_eq!(s.list_effective_window(1, &ls6), 4);
    }

    fn barrel_fixture() -> UiState {
        let mut s = UiState::new(64);
        s.arena.reserve_elements(8).unwrap();
        s.arena.add_element(INVALID_ID, ElementType::Screen, 0, 0).unwrap(); // 0
        s.arena.add_element(0, ElementType::Barrel, 40, 8).unwrap(); // 1
        for _ in 0..3 {
            s.arena.add_element(1, ElementType::Text, 0, 0).unwrap();
        }
        s.arena.barrel_get_or_add(1).unwrap();
        s.screen_count = 1;
        s.set_focus(1);
        s
    }

    #[test]
    fn test_barrel_edit_cycle_with_cancel() {
        let mut s = barrel_fixture();
        s.handle_button_release(Button::Ok);
        assert!(s.barrel_is_editing(1));
        for expected in [1i16, 2, 0] {
            s.handle_button_release(Button::Down);
            assert_eq!(s.barrel_value(1), expected);
        }
        s.handle_button_release(Button::Back);
        assert!(!s.barrel_is_editing(1));
        assert_eq!(s.barrel_value(1), 0);
        assert!(!s.edit_blink.active);
    }

    #[test]
    fn test_barrel_commit_marks_dirty() {
        let mut s = barrel_fixture();
        s.handle_button_release(Button::Ok);
        s.handle_button_release(Button::Down);
        s.handle_button_release(Button::Ok);
        assert!(!s.barrel_is_editing(1));
        assert_eq!(s.barrel_value(1), 1);
        assert!(s.status_dirty);
        assert_eq!(s.status_dirty_id, 1);
    }

    #[test]
    fn test_barrel_wrap_up() {
        let mut s = barrel_fixture();
        s.handle_button_release(Button::Ok);
        s.handle_button_release(Button::Up);
        assert_eq!(s.barrel_value(1), 2);
    }

    #[test]
    fn test_trigger_ok_bumps_version() {
        let mut s = UiState::new(64);
        s.arena.reserve_elements(4).unwrap();
        s.arena.add_element(INVALID_ID, ElementType::Screen, 0, 0).unwrap();
        s.arena.add_element(0, ElementType::Trigger, 0, 0).unwrap();
        s.screen_count = 1;
        s.set_focus(1);
        s.handle_button_release(Button::Ok);
        s.handle_button_release(Button::Ok);
        assert_eq!(s.arena.trigger_find(1).unwrap().version, 2);
        assert_eq!(s.status_dirty_id, 1);
    }

    #[test]
    fn test_slide_clamped_at_ends() {
        let mut s = list_fixture();
        s.screen_count = 3;
        s.handle_button_release(Button::Left);
        assert!(!s.screen_anim.active);
        assert_eq!(s.active_screen, 0);
        s.handle_button_release(Button::Right);
        assert!(s.screen_anim.active);
        assert_eq!(s.screen_anim.from, 0);
        assert_eq!(s.screen_anim.to, 1);
        assert_eq!(s.active_screen, 1);
        // Input is dropped mid-slide.
        s.handle_button_release(Button::Right);
        assert_eq!(s.screen_anim.to, 1);
    }

    #[test]
    fn test_ok_enters_nested_list() {
        let mut s = list_fixture();
        // Row 2 (text id 2) gets a nested list with one row.
        let nested = s.arena.add_element(2, ElementType::List, 8, 0).unwrap(); // 7
        s.handle_button_release(Button::Ok);
        assert_eq!(s.nav_depth, 1);
        assert_eq!(s.focused, nested);
        // BACK on the nested list pops back to the parent.
        s.handle_button_release(Button::Back);
        assert_eq!(s.nav_depth, 0);
        assert_eq!(s.focused, 1);
    }
}
