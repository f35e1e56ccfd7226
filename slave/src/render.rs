//! Page renderer: fills one 128-byte page buffer per call.
//!
//! The panel is organized as 128 columns by `height / 8` pages, one byte per
//! column per page, LSB at the top. The transfer engine owns the shared page
//! buffer and calls [`render_page`] for each page while streaming a frame.
//!
//! Layout resolves an element's stored (x, y) against the owning base
//! screen's ordinal, the horizontal scroll base and a possible slide
//! animation; overlay-owned elements stay fixed on the panel. All drawing is
//! clipped per pixel column against the viewport and the current page.

use crate::element::{ElementType, INVALID_ID, ScreenRole};
use crate::font;
use crate::state::UiState;

/// One page worth of column bytes.
pub const PAGE_BUF_LEN: usize = crate::config::DISPLAY_WIDTH;

/// Shared page buffer type.
pub type PageBuf = [u8; PAGE_BUF_LEN];

const WIDTH: i16 = PAGE_BUF_LEN as i16;
const PAGE_H: i16 = crate::config::PAGE_HEIGHT as i16;

/// Horizontal cull window; content sliding in from either side still renders.
const CULL_X: i16 = 143;

/// Compute the on-panel position of an element.
///
/// Returns `None` when the element has no base-screen ancestor (nothing to
/// position against) or its owning screen left the ordinal sequence.
pub fn layout_element(
    state: &UiState,
    element_id: u8,
) -> Option<(i16, i16)> {
    let el = state.arena.element(element_id)?;
    let (x, y) = state.arena.pos(element_id);

    let owning = if el.ty == ElementType::Screen && el.parent == INVALID_ID {
        element_id
    } else {
        let mut parent = el.parent;
        let mut found = None;
        for _ in 0..state.arena.element_count() {
            let Some(p) = state.arena.element(parent) else {
                break;
            };
            if p.ty == ElementType::Screen && p.parent == INVALID_ID {
                found = Some(parent);
                break;
            }
            parent = p.parent;
        }
        found?
    };

    let mut gx = x as i16;
    let gy = y as i16;
    if state.screen_role(owning) == ScreenRole::None {
        let ordinal = state.find_screen_ordinal_by_id(owning)?;
        gx += ordinal as i16 * WIDTH - state.scroll_x;
        let anim = &state.screen_anim;
        if anim.active && (ordinal == anim.from || ordinal == anim.to) {
            gx -= anim.dir as i16 * anim.offset_px;
        }
    }
    Some((gx, gy))
}

// =============================================================================
// Draw primitives
// =============================================================================

/// Draw text columns with vertical clipping against a viewport and the
/// current page, and horizontal clipping against the panel.
fn draw_masked_text(
    buf: &mut PageBuf,
    x: i16,
    pixel_y: i16,
    text: &[u8],
    viewport_top: u8,
    viewport_bottom: u8,
    page_top: u8,
) {
    if pixel_y > viewport_bottom as i16 || pixel_y + 7 < viewport_top as i16 {
        return;
    }
    if pixel_y > page_top as i16 + 7 || pixel_y + 7 < page_top as i16 {
        return;
    }
    let mut cx = x;
    for &ch in text {
        if cx >= WIDTH {
            break;
        }
        let glyph = font::glyph(ch);
        for col in 0..font::GLYPH_WIDTH as usize {
            if cx >= WIDTH {
                break;
            }
            let col_bits = glyph[col];
            if col_bits != 0 {
                let mut out_bits = 0u8;
                for b in 0..8i16 {
                    if col_bits & (1 << b) == 0 {
                        continue;
                    }
                    let gy = pixel_y + b;
                    if gy < viewport_top as i16 || gy > viewport_bottom as i16 {
                        continue;
                    }
                    if gy < page_top as i16 || gy > page_top as i16 + 7 {
                        continue;
                    }
                    out_bits |= 1 << (gy - page_top as i16);
                }
                if cx >= 0 {
                    buf[cx as usize] |= out_bits;
                }
            }
            cx += 1;
        }
        if cx < WIDTH {
            cx += 1;
        }
    }
}

/// Invert a horizontal region over one 8-row band. `width` is inclusive.
fn invert_row_region(
    buf: &mut PageBuf,
    start_x: u8,
    width: u8,
    pixel_y: i16,
    viewport_top: u8,
    viewport_bottom: u8,
    page_top: u8,
) {
    if pixel_y > viewport_bottom as i16 || pixel_y + 7 < viewport_top as i16 {
        return;
    }
    if pixel_y > page_top as i16 + 7 || pixel_y + 7 < page_top as i16 {
        return;
    }
    if start_x as usize >= PAGE_BUF_LEN {
        return;
    }
    let width = if start_x as usize + width as usize >= PAGE_BUF_LEN {
        (PAGE_BUF_LEN - 1 - start_x as usize) as u8
    } else {
        width
    };
    let mut mask = 0u8;
    for b in 0..8i16 {
        let gy = page_top as i16 + b;
        if gy < pixel_y || gy > pixel_y + 7 {
            continue;
        }
        if gy < viewport_top as i16 || gy > viewport_bottom as i16 {
            continue;
        }
        mask |= 1 << b;
    }
    for cx in 0..=width {
        buf[start_x as usize + cx as usize] ^= mask;
    }
}

/// Inclusive highlight width for a label at base scale; usable directly as
/// the `width` of [`invert_row_region`].
fn text_highlight_width(text: &[u8]) -> u8 {
    if text.is_empty() {
        return font::GLYPH_WIDTH - 1;
    }
    let mut width = 0u16;
    for i in 0..text.len() {
        width += font::GLYPH_WIDTH as u16;
        if i + 1 < text.len() {
            width += 1;
        }
        if width >= PAGE_BUF_LEN as u16 {
            width = PAGE_BUF_LEN as u16;
            break;
        }
    }
    (width.clamp(1, PAGE_BUF_LEN as u16) - 1) as u8
}

/// Draw unclipped text into a page buffer with a vertical bit shift. Used
/// for single-page banners outside the element pipeline.
pub fn tile_text(
    buf: &mut PageBuf,
    mut x: u8,
    y_offset: i8,
    text: &[u8],
) {
    if y_offset <= -(PAGE_H as i8) || y_offset >= PAGE_H as i8 {
        return;
    }
    for &ch in text {
        if x as usize >= PAGE_BUF_LEN {
            break;
        }
        let glyph = font::glyph(ch);
        for col in 0..font::GLYPH_WIDTH as usize {
            if x as usize >= PAGE_BUF_LEN {
                break;
            }
            let column = glyph[col];
            let shifted = if y_offset >= 0 {
                column << y_offset
            } else {
                column >> (-y_offset)
            };
            buf[x as usize] |= shifted;
            x += 1;
        }
        if (x as usize) < PAGE_BUF_LEN {
            x += 1;
        }
    }
}

/// Centered banner shown before the host provisions anything.
pub fn boot_banner(buf: &mut PageBuf) {
    const BANNER: &[u8] = b"SLAVE START";
    let text_width = BANNER.len() as u16 * font::GLYPH_SPACING as u16 - 1;
    let start_x = if text_width < PAGE_BUF_LEN as u16 {
        ((PAGE_BUF_LEN as u16 - text_width) / 2) as u8
    } else {
        0
    };
    tile_text(buf, start_x, 0, BANNER);
}

// =============================================================================
// Page rendering
// =============================================================================

fn edit_blink_visible(state: &UiState) -> bool {
    if !state.edit_blink.active {
        return true;
    }
    state.edit_blink.bright
}

/// Overlay path: only Text descendants of the overlay screen, fixed on the
/// panel (no scroll, no ordinals).
fn render_overlay_page(
    state: &UiState,
    overlay_sid: u8,
    page_top: u8,
    buf: &mut PageBuf,
) {
    for id in 0..state.arena.element_count() {
        let Some(el) = state.arena.element(id) else {
            continue;
        };
        if el.ty != ElementType::Text {
            continue;
        }
        // Resolve the owning screen by climbing parents.
        let mut parent = el.parent;
        for _ in 0..state.arena.element_count() {
            match state.arena.element(parent) {
                Some(p) if p.ty != ElementType::Screen => parent = p.parent,
                _ => break,
            }
        }
        if parent != overlay_sid {
            continue;
        }
        let Some((gx, gy)) = layout_element(state, id) else {
            continue;
        };
        let text = state.arena.text(id).unwrap_or(b"");
        draw_masked_text(buf, gx, gy, text, page_top, page_top + 7, page_top);
    }
}

fn render_list_page(
    state: &UiState,
    list_id: u8,
    gx: i16,
    gy: i16,
    active_screen_id: Option<u8>,
    owning: u8,
    page_top: u8,
    buf: &mut PageBuf,
) {
    let ls = state.arena.list_find(list_id).unwrap_or_default();
    let base_x = gx;
    let base_y = gy.max(0);
    let mut window = if ls.visible_rows != 0 { ls.visible_rows } else { 4 };
    let max_rows = if state.display_height >= 64 { 8 } else { 6 };
    window = window.min(max_rows);
    let dir = if ls.anim_active { ls.anim_dir } else { 0 };
    let pix = if ls.anim_active { ls.anim_pix as i16 } else { 0 };
    let top = ls.top_index;
    let viewport_top = base_y.clamp(0, 255) as u8;
    let viewport_bottom = (base_y + window as i16 * PAGE_H - 1).clamp(0, 255) as u8;

    let item_count = state.list_item_count(list_id);
    let first = if dir == -1 && top > 0 { top as u16 - 1 } else { top as u16 };
    let mut last = top as u16 + window as u16 - 1;
    if dir == 1 && top as u16 + (window as u16) < item_count as u16 {
        last = top as u16 + window as u16;
    }

    for r in first..=last {
        if r >= item_count as u16 {
            break;
        }
        let r = r as u8;
        let pixel_y = match dir {
            0 => base_y + (r as i16 - top as i16) * PAGE_H,
            1 => base_y + (r as i16 - top as i16) * PAGE_H - pix,
            _ => {
                if top > 0 && r == top - 1 {
                    base_y - PAGE_H + pix
                } else {
                    base_y + (r as i16 - top as i16) * PAGE_H + pix
                }
            }
        };
        if pixel_y + 7 < viewport_top as i16 || pixel_y > viewport_bottom as i16 {
            continue;
        }
        if pixel_y > page_top as i16 + 7 || pixel_y + 7 < page_top as i16 {
            continue;
        }
        // r-th Text child in creation order.
        let mut item_id = INVALID_ID;
        let mut seen = 0;
        for cid in 0..state.arena.element_count() {
            if let Some(child) = state.arena.element(cid) {
                if child.parent == list_id && child.ty == ElementType::Text {
                    if seen == r {
                        item_id = cid;
                        break;
                    }
                    seen += 1;
                }
            }
        }
        if item_id == INVALID_ID {
            continue;
        }
        let (ix, _) = state.arena.pos(item_id);
        let item_gx = base_x + ix as i16;
        if !(-CULL_X..=CULL_X).contains(&item_gx) {
            continue;
        }
        let text = state.arena.text(item_id).unwrap_or(b"");
        draw_masked_text(buf, item_gx, pixel_y, text, viewport_top, viewport_bottom, page_top);

        let highlight = if ls.anim_active {
            r == ls.cursor || r == ls.pending_cursor
        } else {
            r == ls.cursor
        };
        let list_has_focus = state.focused == list_id;
        if highlight
            && Some(owning) == active_screen_id
            && !state.screen_anim.active
            && list_has_focus
        {
            draw_masked_text(buf, item_gx - 6, pixel_y, b">", viewport_top, viewport_bottom, page_top);
        }
    }
}

fn render_barrel_page(
    state: &UiState,
    barrel_id: u8,
    gx: i16,
    gy: i16,
    active_screen_id: Option<u8>,
    owning: u8,
    page_top: u8,
    buf: &mut PageBuf,
) {
    let selection = state.barrel_value(barrel_id).max(0) as u8;
    let draw_x = gx.clamp(0, 255) as u8;
    let y_u8 = gy.clamp(0, 255) as u8;

    // Row highlight applies when the barrel's parent text is the cursor row
    // of an enclosing list that is focused and idle.
    let mut inline_list_selected = false;
    let parent_text = state.arena.element(barrel_id).map(|el| el.parent).unwrap_or(INVALID_ID);
    if let Some(owner) = state.arena.element(parent_text) {
        if owner.ty == ElementType::Text {
            if let Some(list_el) = state.arena.element(owner.parent) {
                if list_el.ty == ElementType::List {
                    let list_parent = owner.parent;
                    let lsp = state.arena.list_find(list_parent).unwrap_or_default();
                    if list_parent == state.focused
                        && !lsp.anim_active
                        && Some(owning) == active_screen_id
                        && !state.screen_anim.active
                    {
                        let mut row_index = 0;
                        for scan in 0..state.arena.element_count() {
                            if let Some(c) = state.arena.element(scan) {
                                if c.parent != list_parent || c.ty != ElementType::Text {
                                    continue;
                                }
                                if scan == parent_text {
                                    break;
                                }
                                row_index += 1;
                            }
                        }
                        inline_list_selected = row_index == lsp.cursor;
                    }
                }
            }
        }
    }

    // Selected child label, or bracketed digits when no child exists.
    let mut label_buf = [0u8; 5];
    let label: &[u8] = match state.barrel_option_by_index(barrel_id, selection) {
        Some(child) => state.arena.text(child).unwrap_or(b""),
        None => {
            let v = selection % 100;
            let mut len = 0;
            label_buf[len] = b'[';
            len += 1;
            if v > 9 {
                label_buf[len] = b'0' + v / 10;
                len += 1;
            }
            label_buf[len] = b'0' + v % 10;
            len += 1;
            label_buf[len] = b']';
            len += 1;
            &label_buf[..len]
        }
    };
    draw_masked_text(buf, gx, gy, label, y_u8, y_u8.saturating_add(7), page_top);

    let editing = state.barrel_is_editing(barrel_id);
    let blink_on = if editing && state.edit_blink.active {
        edit_blink_visible(state)
    } else {
        true
    };
    let focused_here =
        barrel_id == state.focused && Some(owning) == active_screen_id && !state.screen_anim.active;
    let should_invert = (focused_here && (!editing || blink_on)) || inline_list_selected;
    if should_invert {
        invert_row_region(
            buf,
            draw_x,
            text_highlight_width(label),
            gy,
            y_u8,
            y_u8.saturating_add(7),
            page_top,
        );
    }
}

/// Fill one page of the frame from the current UI state.
///
/// The buffer arrives cleared from the transfer engine; drawing is additive
/// (OR) with explicit inversion spans on top.
pub fn render_page(
    state: &UiState,
    page: u8,
    buf: &mut PageBuf,
) {
    let page_top = page * crate::config::PAGE_HEIGHT;

    let overlay_sid = state.overlay.screen_id;
    if overlay_sid != INVALID_ID && state.screen_role(overlay_sid) == ScreenRole::FullOverlay {
        render_overlay_page(state, overlay_sid, page_top, buf);
        return;
    }

    let active_screen_id = state.find_screen_id_by_ordinal(state.active_screen);

    for id in 0..state.arena.element_count() {
        let Some(el) = state.arena.element(id) else {
            continue;
        };
        if !state.is_element_visible(id) {
            continue;
        }
        // List rows and barrel children are drawn by their containers.
        if let Some(parent) = state.arena.element(el.parent) {
            if parent.ty == ElementType::List && el.ty == ElementType::Text {
                continue;
            }
            if parent.ty == ElementType::Barrel {
                continue;
            }
        }
        if !matches!(el.ty, ElementType::Text | ElementType::List | ElementType::Barrel) {
            continue;
        }
        let Some(owning) = state.element_owning_screen(id) else {
            continue;
        };
        if state.screen_role(owning) != ScreenRole::None {
            continue;
        }
        let Some((gx, gy)) = layout_element(state, id) else {
            continue;
        };
        if !(-CULL_X..=CULL_X).contains(&gx) {
            continue;
        }
        let draw_x = gx.clamp(0, 255) as u8;

        match el.ty {
            ElementType::Text => {
                let text = state.arena.text(id).unwrap_or(b"");
                draw_masked_text(buf, gx, gy, text, page_top, page_top + 7, page_top);
                if id == state.focused
                    && Some(owning) == active_screen_id
                    && !state.screen_anim.active
                {
                    let width = text_highlight_width(text).max(18);
                    invert_row_region(
                        buf,
                        draw_x,
                        width,
                        gy,
                        gy.clamp(0, 255) as u8,
                        (gy + 7).clamp(0, 255) as u8,
                        page_top,
                    );
                }
            }
            ElementType::List => {
                render_list_page(state, id, gx, gy, active_screen_id, owning, page_top, buf);
            }
            ElementType::Barrel => {
                render_barrel_page(state, id, gx, gy, active_screen_id, owning, page_top, buf);
            }
            _ => {}
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
