//! Command handlers, dispatch and the per-frame animation tick.
//!
//! Every decoded frame is `[cmd][payload...]`. A handler either returns a
//! plain result (wrapped into a one-byte RC response by the caller), builds a
//! full response payload, or sends nothing at all (standby). All handlers run
//! on the main loop and are free of panics on arbitrary input.

use heapless::Vec;
use oledui_common::{Button, Error, Result, StatusFlags, cmd, json_flags, rc};

use crate::config::{
    ANIM_FRAME_MS,
    EDIT_BLINK_PERIOD_FRAMES,
    LIST_ANIM_PIXELS_PER_FRAME,
    OVERLAY_DEFAULT_MS,
    SCREEN_ANIM_PIXELS_PER_FRAME,
};
use crate::descriptor;
use crate::diag::{DiagLog, Event};
use crate::element::{ElementType, INVALID_ID, ScreenRole};
use crate::state::UiState;

/// Largest response payload: RC + type + len + a full text attribute.
pub const MAX_RESPONSE: usize = 24;

/// Outcome of one dispatched command.
#[derive(Debug, PartialEq, Eq)]
pub enum Reply {
    /// Wrap the result into a `[rc]` response.
    Rc(Result<()>),
    /// Send this payload verbatim (first byte is the RC).
    Payload(Vec<u8, MAX_RESPONSE>),
    /// Send nothing (standby request).
    None,
}

impl Reply {
    fn ok() -> Self { Reply::Rc(Ok(())) }

    fn err(e: Error) -> Self { Reply::Rc(Err(e)) }
}

/// Dispatch one decoded command frame.
pub fn handle_command(
    state: &mut UiState,
    diag: &mut DiagLog,
    now_ms: u32,
    command: u8,
    payload: &[u8],
) -> Reply {
    #[cfg(feature = "defmt")]
    defmt::trace!("cmd {=u8:x} len {=usize}", command, payload.len());
    match command {
        cmd::PING => cmd_ping(state, payload),
        cmd::JSON => cmd_json(state, diag, now_ms, payload),
        cmd::JSON_ABORT => Reply::ok(),
        cmd::SET_ACTIVE_SCREEN => cmd_set_active_screen(state, diag, now_ms, payload),
        cmd::GET_STATUS => cmd_get_status(state),
        cmd::SCROLL_TO_SCREEN => cmd_scroll_to_screen(state, diag, now_ms, payload),
        cmd::GET_ELEMENT_STATE => cmd_get_element_state(state, payload),
        cmd::SHOW_OVERLAY => cmd_show_overlay(state, diag, now_ms, payload),
        cmd::INPUT_EVENT => cmd_input_event(state, payload),
        cmd::GOTO_STANDBY => cmd_goto_standby(state, diag, now_ms, payload),
        _ => Reply::err(Error::BadLen),
    }
}

fn cmd_ping(
    state: &UiState,
    payload: &[u8],
) -> Reply {
    if !payload.is_empty() {
        return Reply::err(Error::BadLen);
    }
    let mut out = Vec::new();
    out.extend_from_slice(&[
        rc::OK,
        state.protocol_version,
        state.capabilities as u8,
        (state.capabilities >> 8) as u8,
    ])
    .ok();
    Reply::Payload(out)
}

fn cmd_json(
    state: &mut UiState,
    diag: &mut DiagLog,
    now_ms: u32,
    payload: &[u8],
) -> Reply {
    let Some((&flags, body)) = payload.split_first() else {
        return Reply::err(Error::BadLen);
    };
    let result = descriptor::apply(state, flags, body);
    if flags & json_flags::COMMIT != 0 && state.initialized {
        diag.record(Event::JsonCommit, 0, now_ms);
    }
    Reply::Rc(result)
}

fn cmd_set_active_screen(
    state: &mut UiState,
    diag: &mut DiagLog,
    now_ms: u32,
    payload: &[u8],
) -> Reply {
    if payload.len() != 1 {
        return Reply::err(Error::BadLen);
    }
    let ordinal = payload[0];
    if ordinal >= state.screen_count {
        return Reply::err(Error::Range);
    }
    state.active_screen = ordinal;
    state.scroll_x = ordinal as i16 * 128;
    state.screen_anim.active = false;
    state.screen_anim.offset_px = 0;
    state.screen_anim.dir = 0;
    state.screen_anim.from = ordinal;
    state.screen_anim.to = ordinal;
    state.focus_first_on_screen(ordinal);
    diag.record(Event::SetActiveScreen, ordinal & 0x07, now_ms);
    Reply::ok()
}

fn cmd_get_status(state: &mut UiState) -> Reply {
    let mut flags = 0;
    if state.initialized {
        flags |= StatusFlags::INITIALIZED;
    }
    if state.status_dirty {
        flags |= StatusFlags::DIRTY;
    }
    if state.overlay.screen_id != INVALID_ID {
        flags |= StatusFlags::OVERLAY;
    }
    let dirty_id = if state.status_dirty { state.status_dirty_id } else { INVALID_ID };
    let mut out = Vec::new();
    out.extend_from_slice(&[
        rc::OK,
        flags,
        state.arena.element_count(),
        state.screen_count,
        state.active_screen,
        state.protocol_version,
        dirty_id,
        0,
        0,
        0,
    ])
    .ok();
    // Reading the status consumes the dirty marker.
    state.status_dirty = false;
    state.status_dirty_id = INVALID_ID;
    Reply::Payload(out)
}

fn cmd_scroll_to_screen(
    state: &mut UiState,
    diag: &mut DiagLog,
    now_ms: u32,
    payload: &[u8],
) -> Reply {
    match payload.len() {
        1 => {
            // A host snap never interrupts a running slide.
            if state.screen_anim.active {
                return Reply::ok();
            }
            let ordinal = payload[0];
            if ordinal >= state.screen_count {
                return Reply::err(Error::Range);
            }
            state.active_screen = ordinal;
            state.scroll_x = ordinal as i16 * 128;
            diag.record(Event::ScrollToScreen, ordinal & 0x07, now_ms);
            Reply::ok()
        }
        3 => {
            if state.screen_anim.active {
                return Reply::ok();
            }
            let offset = i16::from_le_bytes([payload[0], payload[1]]);
            let ordinal = payload[2];
            if ordinal >= state.screen_count {
                return Reply::err(Error::Range);
            }
            let max_offset = (state.screen_count as i16 - 1) * 128;
            state.active_screen = ordinal;
            state.scroll_x = offset.clamp(0, max_offset);
            diag.record(Event::ScrollToScreen, ordinal & 0x07, now_ms);
            Reply::ok()
        }
        _ => Reply::err(Error::BadLen),
    }
}

fn cmd_get_element_state(
    state: &UiState,
    payload: &[u8],
) -> Reply {
    if payload.len() != 1 {
        return Reply::err(Error::BadLen);
    }
    let id = payload[0];
    let Some(el) = state.arena.element(id) else {
        return Reply::err(Error::UnknownId);
    };
    let mut out: Vec<u8, MAX_RESPONSE> = Vec::new();
    out.extend_from_slice(&[rc::OK, el.ty as u8]).ok();
    match el.ty {
        ElementType::Text => {
            let text = state.arena.text(id).unwrap_or(b"");
            let len = text.len().min(MAX_RESPONSE - 3);
            out.push(len as u8).ok();
            out.extend_from_slice(&text[..len]).ok();
        }
        ElementType::Trigger => match state.arena.trigger_find(id) {
            Some(ts) => {
                out.push(ts.version).ok();
            }
            None => return Reply::err(Error::Range),
        },
        ElementType::Barrel => {
            let value = state.barrel_value(id);
            out.extend_from_slice(&value.to_le_bytes()).ok();
        }
        _ => {
            out.push(0xFF).ok();
        }
    }
    Reply::Payload(out)
}

fn cmd_show_overlay(
    state: &mut UiState,
    diag: &mut DiagLog,
    now_ms: u32,
    payload: &[u8],
) -> Reply {
    if payload.is_empty() {
        return Reply::err(Error::BadLen);
    }
    let screen_id = payload[0];
    let mut duration = OVERLAY_DEFAULT_MS;
    let mut mask_input = false;
    if payload.len() >= 3 {
        duration = u16::from_le_bytes([payload[1], payload[2]]).max(1);
    }
    if payload.len() >= 4 {
        mask_input = payload[3] & 0x01 != 0;
    }
    let Some(el) = state.arena.element(screen_id) else {
        return Reply::err(Error::UnknownId);
    };
    if el.ty != ElementType::Screen {
        return Reply::err(Error::BadState);
    }
    if state.screen_role(screen_id) != ScreenRole::FullOverlay {
        return Reply::err(Error::BadState);
    }
    state.overlay.screen_id = screen_id;
    state.overlay.remaining_ms = duration;
    state.overlay.mask_input = mask_input;
    state.overlay.prev_focus = state.focused;
    diag.record(Event::ShowOverlay, screen_id & 0x07, now_ms);
    state.clear_focus();
    state.request_render();
    Reply::ok()
}

fn cmd_input_event(
    state: &mut UiState,
    payload: &[u8],
) -> Reply {
    if payload.len() < 2 {
        return Reply::err(Error::BadLen);
    }
    let Some(button) = Button::from_index(payload[0]) else {
        return Reply::err(Error::Range);
    };
    let event = payload[1];
    if state.overlay.screen_id != INVALID_ID && state.overlay.mask_input && button != Button::Ok {
        return Reply::ok();
    }
    if event == 0 {
        state.handle_button_release(button);
        state.request_render();
    }
    Reply::ok()
}

fn cmd_goto_standby(
    state: &mut UiState,
    diag: &mut DiagLog,
    now_ms: u32,
    payload: &[u8],
) -> Reply {
    if payload.is_empty() {
        state.standby_requested = true;
        diag.record(Event::StandbyRequest, 0, now_ms);
    }
    // No response frame, ever: the host may already be releasing the bus.
    Reply::None
}

// =============================================================================
// Animation tick
// =============================================================================

/// Millisecond bookkeeping for the animation tick.
#[derive(Default)]
pub struct AnimTimers {
    last_frame_ms: u32,
    last_overlay_ms: u32,
}

/// Restore focus after the overlay disappears.
fn overlay_cleared(state: &mut UiState) {
    let prev = state.overlay.prev_focus;
    state.overlay.prev_focus = INVALID_ID;
    if prev != INVALID_ID {
        state.set_focus(prev);
        if state.focused != INVALID_ID {
            return;
        }
    }
    state.focus_first_on_screen(state.active_screen);
}

/// Advance the overlay countdown, screen slide, list scrolls and the edit
/// blink. Called once per main-loop iteration; animation steps are gated to
/// one per [`ANIM_FRAME_MS`].
pub fn tick_animations(
    state: &mut UiState,
    diag: &mut DiagLog,
    timers: &mut AnimTimers,
    now_ms: u32,
) {
    if timers.last_overlay_ms == 0 {
        timers.last_overlay_ms = now_ms;
    }
    let elapsed = now_ms.wrapping_sub(timers.last_overlay_ms);
    timers.last_overlay_ms = now_ms;

    if state.overlay.screen_id != INVALID_ID && state.overlay.remaining_ms > 0 {
        let remaining = state.overlay.remaining_ms as u32;
        let remaining = remaining.saturating_sub(elapsed) as u16;
        state.overlay.remaining_ms = remaining;
        if remaining == 0 {
            let cleared = state.overlay.screen_id;
            state.overlay.screen_id = INVALID_ID;
            overlay_cleared(state);
            state.request_render();
            diag.record(Event::OverlayClear, cleared & 0x07, now_ms);
        }
    }

    if now_ms.wrapping_sub(timers.last_frame_ms) < ANIM_FRAME_MS {
        return;
    }
    timers.last_frame_ms = now_ms;

    // Screen slide: the logical active screen is already the target; the
    // visual offset catches up and then the scroll base snaps.
    if state.screen_anim.active {
        let step = SCREEN_ANIM_PIXELS_PER_FRAME.max(1);
        state.screen_anim.offset_px += step;
        if state.screen_anim.offset_px >= 128 {
            state.screen_anim.active = false;
            state.screen_anim.offset_px = 0;
            state.scroll_x = state.active_screen as i16 * 128;
            let ordinal = state.active_screen;
            state.focus_first_on_screen(ordinal);
            state.request_render();
        }
    }

    let mut any_list_anim = false;
    state.arena.update_lists(|_, ls| {
        if !ls.anim_active {
            return;
        }
        any_list_anim = true;
        if ls.anim_pix < 8 {
            let step = LIST_ANIM_PIXELS_PER_FRAME.max(1).min(8 - ls.anim_pix);
            ls.anim_pix += step;
            if ls.anim_pix >= 8 {
                ls.top_index = ls.pending_top;
                ls.cursor = ls.pending_cursor;
                ls.stop_anim();
            }
        }
    });
    if any_list_anim || state.screen_anim.active {
        state.request_render();
    }

    if state.edit_blink.active {
        state.edit_blink.counter += 1;
        if state.edit_blink.counter >= EDIT_BLINK_PERIOD_FRAMES {
            state.edit_blink.counter = 0;
            state.edit_blink.bright = !state.edit_blink.bright;
            state.request_render();
        }
    } else {
        state.edit_blink.counter = 0;
        state.edit_blink.bright = true;
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
