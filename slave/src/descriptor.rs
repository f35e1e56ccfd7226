//! Descriptor parser: one self-delimited ASCII object per frame.
//!
//! The wire text resembles a single JSON object. Extraction is key-order
//! independent: values are located by scanning for `"key"`-colon-value spans,
//! tolerating whitespace and quoted integers. Unknown keys are ignored, and a
//! malformed descriptor never poisons the rest of a COMMIT batch; the caller
//! just reports `parse fail` for that one frame.

use heapless::Vec;
use oledui_common::{Error, Result, json_flags};

use crate::config::TEXT_CAP_MAX;
use crate::element::{ElementType, INVALID_ID};
use crate::state::UiState;

/// Longest extractable text value.
const TEXT_BUF: usize = TEXT_CAP_MAX as usize;

const fn is_space(b: u8) -> bool { matches!(b, b' ' | b'\t' | b'\n' | b'\r' | b'\x0C' | b'\x0B') }

/// Locate the value span following `"key"` and a colon. Returns the offset
/// of the first value byte.
fn find_value(
    span: &[u8],
    key: &str,
) -> Option<usize> {
    let key = key.as_bytes();
    let mut p = 0;
    while p + key.len() + 3 <= span.len() {
        if span[p] != b'"' || !span[p + 1..].starts_with(key) || span[p + 1 + key.len()] != b'"' {
            p += 1;
            continue;
        }
        let mut q = p + key.len() + 2;
        while q < span.len() && is_space(span[q]) {
            q += 1;
        }
        if q >= span.len() || span[q] != b':' {
            p += 1;
            continue;
        }
        q += 1;
        while q < span.len() && is_space(span[q]) {
            q += 1;
        }
        if q >= span.len() {
            return None;
        }
        return Some(q);
    }
    None
}

/// Extract an integer value for `key`. Accepts optional quotes and a leading
/// minus sign.
pub fn extract_int(
    span: &[u8],
    key: &str,
) -> Option<i32> {
    let mut q = find_value(span, key)?;
    if span[q] == b'"' {
        q += 1;
    }
    let mut sign = 1i32;
    if q < span.len() && span[q] == b'-' {
        sign = -1;
        q += 1;
    }
    let mut value = 0i32;
    let mut any = false;
    while q < span.len() && span[q].is_ascii_digit() {
        value = value.saturating_mul(10).saturating_add((span[q] - b'0') as i32);
        q += 1;
        any = true;
    }
    if !any {
        return None;
    }
    Some(sign.saturating_mul(value))
}

/// Extract a string value for `key`, truncated to the buffer capacity.
pub fn extract_str<const N: usize>(
    span: &[u8],
    key: &str,
) -> Option<Vec<u8, N>> {
    let mut q = find_value(span, key)?;
    if span[q] != b'"' {
        return None;
    }
    q += 1;
    let mut out = Vec::new();
    while q < span.len() && span[q] != b'"' && !out.is_full() {
        out.push(span[q]).ok();
        q += 1;
    }
    if q >= span.len() {
        return None;
    }
    Some(out)
}

/// Map a type token to an element type. Accepts the one-letter tokens and
/// the legacy two-letter forms.
fn map_type_key(token: &[u8]) -> Option<ElementType> {
    match token {
        b"s" => Some(ElementType::Screen),
        b"t" | b"te" => Some(ElementType::Text),
        b"l" | b"li" => Some(ElementType::List),
        b"b" | b"ba" => Some(ElementType::Barrel),
        b"i" | b"tr" => Some(ElementType::Trigger),
        _ => None,
    }
}

// =============================================================================
// Element creation / update
// =============================================================================

fn create_screen(
    state: &mut UiState,
    parent: u8,
    x: u8,
    y: u8,
    span: &[u8],
) -> Result<()> {
    let sid = state
        .arena
        .add_element(parent, ElementType::Screen, x, y)
        .ok_or(Error::ParseFail)?;
    if parent == INVALID_ID {
        let ov = extract_int(span, "ov").unwrap_or(0).clamp(0, 1);
        if ov != 0 {
            let _ = state.arena.store_screen_role(sid, ov as u8);
        } else {
            state.screen_count += 1;
            if state.screen_count == 1 {
                state.active_screen = 0;
            }
        }
        return Ok(());
    }
    // A screen declared under a list attaches to the most recent row; one
    // declared under a text becomes that row's local screen.
    let owner_text = match state.arena.element(parent) {
        Some(el) if el.ty == ElementType::Text => Some(parent),
        Some(el) if el.ty == ElementType::List => state
            .arena
            .list_get_or_add(parent)
            .map(|ls| ls.last_text_child)
            .filter(|&id| id != INVALID_ID),
        _ => None,
    };
    if let Some(owner) = owner_text {
        if owner < state.arena.element_count() {
            state.arena.set_parent(sid, owner);
        }
    }
    Ok(())
}

/// Children declared with a list as parent attach to its most recent row.
fn redirect_list_parent(
    state: &mut UiState,
    parent: u8,
) -> u8 {
    if !matches!(state.arena.element(parent), Some(el) if el.ty == ElementType::List) {
        return parent;
    }
    state
        .arena
        .list_get_or_add(parent)
        .map(|ls| ls.last_text_child)
        .filter(|&id| id < state.arena.element_count())
        .unwrap_or(parent)
}

fn create_list(
    state: &mut UiState,
    parent: u8,
    x: u8,
    y: u8,
    span: &[u8],
) -> Result<()> {
    let parent = redirect_list_parent(state, parent);
    let lid = state
        .arena
        .add_element(parent, ElementType::List, x, y)
        .ok_or(Error::ParseFail)?;
    if let Some(mut ls) = state.arena.list_get_or_add(lid) {
        if let Some(rows) = extract_int(span, "r") {
            ls.visible_rows = rows.clamp(1, 6) as u8;
        }
        state.arena.list_set(lid, &ls);
    }
    Ok(())
}

fn create_text(
    state: &mut UiState,
    parent: u8,
    x: u8,
    y: u8,
    span: &[u8],
) -> Result<()> {
    let parent_is_list =
        matches!(state.arena.element(parent), Some(el) if el.ty == ElementType::List);
    // A row's y is derived from its creation index, not the descriptor.
    let y = if parent_is_list {
        (state.list_item_count(parent) as u16 * 8) as u8
    } else {
        y
    };
    let id = state
        .arena
        .add_element(parent, ElementType::Text, x, y)
        .ok_or(Error::ParseFail)?;
    let text: Vec<u8, TEXT_BUF> = extract_str(span, "tx").unwrap_or_default();
    let cap = extract_int(span, "c").unwrap_or(0).clamp(0, TEXT_CAP_MAX as i32) as u8;
    let _ = state.arena.store_text_with_cap(id, &text, cap);
    if parent_is_list {
        if let Some(mut ls) = state.arena.list_get_or_add(parent) {
            ls.last_text_child = id;
            state.arena.list_set(parent, &ls);
        }
    }
    Ok(())
}

fn create_barrel(
    state: &mut UiState,
    parent: u8,
    x: u8,
    y: u8,
    span: &[u8],
) -> Result<()> {
    let parent = redirect_list_parent(state, parent);
    let id = state
        .arena
        .add_element(parent, ElementType::Barrel, x, y)
        .ok_or(Error::ParseFail)?;
    let value = extract_int(span, "v").unwrap_or(0).max(0);
    if let Some(mut st) = state.arena.barrel_get_or_add(id) {
        st.value = value.clamp(i16::MIN as i32, i16::MAX as i32) as i16;
        st.aux = 0;
        state.arena.barrel_set(id, st);
    }
    Ok(())
}

fn create_trigger(
    state: &mut UiState,
    parent: u8,
    x: u8,
    y: u8,
) -> Result<()> {
    let id = state
        .arena
        .add_element(parent, ElementType::Trigger, x, y)
        .ok_or(Error::ParseFail)?;
    state.arena.trigger_get_or_add(id).ok_or(Error::ParseFail)?;
    Ok(())
}

fn update_element(
    state: &mut UiState,
    id: u8,
    ty: ElementType,
    span: &[u8],
) -> Result<()> {
    match ty {
        ElementType::Text => {
            if let Some(text) = extract_str::<TEXT_BUF>(span, "tx") {
                let _ = state.arena.update_text(id, &text);
            }
        }
        ElementType::Barrel => {
            let value = extract_int(span, "v").unwrap_or(0);
            if let Some(mut st) = state.arena.barrel_get_or_add(id) {
                st.value = value.clamp(i16::MIN as i32, i16::MAX as i32) as i16;
                state.arena.barrel_set(id, st);
            }
        }
        // Other element types have no updatable attributes.
        _ => {}
    }
    Ok(())
}

/// Dispatch one trimmed `{...}` object span to create or update handlers.
fn handle_element_object(
    state: &mut UiState,
    span: &[u8],
) -> Result<()> {
    let token: Vec<u8, 15> = extract_str(span, "t").unwrap_or_default();

    if token.as_slice() == b"h" {
        let n = extract_int(span, "n").ok_or(Error::ParseFail)?;
        if !(1..=255).contains(&n) {
            return Err(Error::ParseFail);
        }
        state.arena.reserve_elements(n as u8)?;
        state.header_seen = true;
        return Ok(());
    }
    if state.arena.element_capacity() == 0 {
        return Err(Error::BadState);
    }

    let ty = map_type_key(&token);
    let parent = extract_int(span, "p").unwrap_or(-1);

    // Update-by-id path.
    if let Some(eid) = extract_int(span, "e") {
        if (0..state.arena.element_count() as i32).contains(&eid) {
            let id = eid as u8;
            let existing = state.arena.element(id).ok_or(Error::Internal)?.ty;
            if !token.is_empty() && ty != Some(existing) {
                // Mismatched type on an update is ignored, not an error.
                return Ok(());
            }
            return update_element(state, id, existing, span);
        }
    }

    let parent_id = if (0..state.arena.element_count() as i32).contains(&parent) {
        parent as u8
    } else {
        INVALID_ID
    };
    let x = extract_int(span, "x").unwrap_or(0) as u8;
    let y = extract_int(span, "y").unwrap_or(0) as u8;

    match ty {
        Some(ElementType::Screen) => create_screen(state, parent_id, x, y, span),
        Some(ElementType::List) => create_list(state, parent_id, x, y, span),
        Some(ElementType::Text) => create_text(state, parent_id, x, y, span),
        Some(ElementType::Barrel) => create_barrel(state, parent_id, x, y, span),
        Some(ElementType::Trigger) => create_trigger(state, parent_id, x, y),
        // Unknown type tokens are ignored.
        None => Ok(()),
    }
}

/// Validate the outer braces and dispatch the object.
fn parse_single_object(
    state: &mut UiState,
    bytes: &[u8],
) -> Result<()> {
    if bytes.len() < 2 {
        return Err(Error::BadLen);
    }
    let mut s = 0;
    let mut e = bytes.len() - 1;
    while s <= e && is_space(bytes[s]) {
        s += 1;
    }
    while e > s && is_space(bytes[e]) {
        e -= 1;
    }
    if s >= e {
        return Err(Error::ParseFail);
    }
    if bytes[s] != b'{' || bytes[e] != b'}' {
        return Err(Error::ParseFail);
    }
    handle_element_object(state, &bytes[s..=e])
}

/// Apply one descriptor with its HEAD/COMMIT flags.
///
/// HEAD wipes all state before parsing; COMMIT marks the model initialized
/// and requests a render. A parse error inside one descriptor does not
/// affect earlier or later descriptors of the same batch.
pub fn apply(
    state: &mut UiState,
    flags: u8,
    bytes: &[u8],
) -> Result<()> {
    if flags & json_flags::HEAD != 0 {
        state.reset();
    }
    let mut result = Ok(());
    if !bytes.is_empty() {
        result = parse_single_object(state, bytes);
    }
    if flags & json_flags::COMMIT != 0 {
        if state.arena.element_capacity() == 0 {
            return result.and(Err(Error::BadState));
        }
        state.initialized = true;
        state.arena.mark_committed();
        state.request_render();
    }
    result
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> UiState { UiState::new(64) }

    fn apply_str(
        state: &mut UiState,
        flags: u8,
        json: &str,
    ) -> Result<()> {
        apply(state, flags, json.as_bytes())
    }

    #[test]
    fn test_extract_int_forms() {
        let span = br#"{"t":"b","x": 12 ,"v":"-3","n":255}"#;
        assert_eq!(extract_int(span, "x"), Some(12));
        assert_eq!(extract_int(span, "v"), Some(-3));
        assert_eq!(extract_int(span, "n"), Some(255));
        assert_eq!(extract_int(span, "q"), None);
    }

    #[test]
    fn test_extract_str_truncates() {
        let span = br#"{"tx":"Hello world, this is long"}"#;
        let s: Vec<u8, 6> = extract_str(span, "tx").unwrap();
        assert_eq!(s.as_slice(), b"Hello ");
    }

    #[test]
    fn test_extract_key_is_not_prefix_matched() {
        let span = br#"{"txx":"no","tx":"yes"}"#;
        let s: Vec<u8, 8> = extract_str(span, "tx").unwrap();
        assert_eq!(s.as_slice(), b"yes");
    }

    #[test]
    fn test_header_required_first() {
        let mut s = fresh();
        assert_eq!(apply_str(&mut s, 0, r#"{"t":"s"}"#), Err(Error::BadState));
        assert_eq!(apply_str(&mut s, json_flags::HEAD, r#"{"t":"h","n":4}"#), Ok(()));
        assert!(s.header_seen);
        assert_eq!(s.arena.element_capacity(), 4);
        assert_eq!(apply_str(&mut s, 0, r#"{"t":"s"}"#), Ok(()));
        assert_eq!(s.screen_count, 1);
    }

    #[test]
    fn test_header_count_range() {
        let mut s = fresh();
        assert_eq!(
            apply_str(&mut s, json_flags::HEAD, r#"{"t":"h","n":0}"#),
            Err(Error::ParseFail)
        );
        assert_eq!(
            apply_str(&mut s, json_flags::HEAD, r#"{"t":"h","n":300}"#),
            Err(Error::ParseFail)
        );
    }

    #[test]
    fn test_second_header_rejected() {
        let mut s = fresh();
        apply_str(&mut s, json_flags::HEAD, r#"{"t":"h","n":4}"#).unwrap();
        assert_eq!(apply_str(&mut s, 0, r#"{"t":"h","n":8}"#), Err(Error::BadState));
        assert_eq!(s.arena.element_capacity(), 4);
    }

    #[test]
    fn test_commit_without_header_fails() {
        let mut s = fresh();
        assert_eq!(apply_str(&mut s, json_flags::COMMIT, ""), Err(Error::BadState));
        assert!(!s.initialized);
    }

    #[test]
    fn test_text_under_list_derives_row_y() {
        let mut s = fresh();
        apply_str(&mut s, json_flags::HEAD, r#"{"t":"h","n":6}"#).unwrap();
        apply_str(&mut s, 0, r#"{"t":"s"}"#).unwrap();
        apply_str(&mut s, 0, r#"{"t":"l","p":0,"x":8,"y":0,"r":3}"#).unwrap();
        apply_str(&mut s, 0, r#"{"t":"t","p":1,"x":0,"y":99,"tx":"A"}"#).unwrap();
        apply_str(&mut s, 0, r#"{"t":"t","p":1,"x":0,"tx":"B"}"#).unwrap();
        assert_eq!(s.arena.pos(2), (0, 0));
        assert_eq!(s.arena.pos(3), (0, 8));
        assert_eq!(s.arena.list_find(1).unwrap().last_text_child, 3);
        assert_eq!(s.arena.list_find(1).unwrap().visible_rows, 3);
    }

    #[test]
    fn test_screen_under_list_attaches_to_last_row() {
        let mut s = fresh();
        apply_str(&mut s, json_flags::HEAD, r#"{"t":"h","n":6}"#).unwrap();
        apply_str(&mut s, 0, r#"{"t":"s"}"#).unwrap();
        apply_str(&mut s, 0, r#"{"t":"l","p":0,"x":8,"y":0}"#).unwrap();
        apply_str(&mut s, 0, r#"{"t":"t","p":1,"x":0,"tx":"Row"}"#).unwrap();
        apply_str(&mut s, 0, r#"{"t":"s","p":1}"#).unwrap();
        // Screen 3 reparented to the row text (2), making it a local screen.
        assert_eq!(s.arena.element(3).unwrap().parent, 2);
        assert_eq!(s.screen_count, 1);
    }

    #[test]
    fn test_list_under_list_attaches_to_last_row() {
        let mut s = fresh();
        apply_str(&mut s, json_flags::HEAD, r#"{"t":"h","n":8}"#).unwrap();
        apply_str(&mut s, 0, r#"{"t":"s"}"#).unwrap();
        apply_str(&mut s, 0, r#"{"t":"l","p":0,"x":8,"y":0}"#).unwrap();
        apply_str(&mut s, 0, r#"{"t":"t","p":1,"x":0,"tx":"More"}"#).unwrap();
        apply_str(&mut s, 0, r#"{"t":"l","p":1,"x":8,"y":0}"#).unwrap();
        apply_str(&mut s, 0, r#"{"t":"t","p":3,"x":0,"tx":"Inner"}"#).unwrap();
        // List 3 hangs off the row text (2), not the outer list.
        assert_eq!(s.arena.element(3).unwrap().parent, 2);
        assert_eq!(s.text_nested_list(2), Some(3));
        // Nested lists stay hidden until entered through the nav stack.
        assert!(!s.is_element_visible(3));
        assert!(!s.is_element_visible(4));
        assert!(s.nav_push_list(1, 3));
        assert!(s.is_element_visible(3));
        assert!(s.is_element_visible(4));
    }

    #[test]
    fn test_barrel_under_list_attaches_to_last_row() {
        let mut s = fresh();
        apply_str(&mut s, json_flags::HEAD, r#"{"t":"h","n":8}"#).unwrap();
        apply_str(&mut s, 0, r#"{"t":"s"}"#).unwrap();
        apply_str(&mut s, 0, r#"{"t":"l","p":0,"x":8,"y":0}"#).unwrap();
        apply_str(&mut s, 0, r#"{"t":"t","p":1,"x":0,"tx":"Volume"}"#).unwrap();
        apply_str(&mut s, 0, r#"{"t":"b","p":1,"x":70,"y":0,"v":2}"#).unwrap();
        apply_str(&mut s, 0, r#"{"t":"t","p":3,"x":0,"tx":"Loud"}"#).unwrap();
        // Barrel 3 becomes the row's inline barrel.
        assert_eq!(s.arena.element(3).unwrap().parent, 2);
        assert_eq!(s.text_inline_barrel(2), Some(3));
        assert_eq!(s.barrel_value(3), 2);
        // Without any row yet, the list itself stays the parent.
        apply_str(&mut s, 0, r#"{"t":"l","p":0,"x":8,"y":24}"#).unwrap();
        apply_str(&mut s, 0, r#"{"t":"b","p":5,"x":0,"y":0}"#).unwrap();
        assert_eq!(s.arena.element(5).unwrap().parent, 0);
        assert_eq!(s.arena.element(6).unwrap().parent, 5);
    }

    #[test]
    fn test_overlay_screen_role() {
        let mut s = fresh();
        apply_str(&mut s, json_flags::HEAD, r#"{"t":"h","n":4}"#).unwrap();
        apply_str(&mut s, 0, r#"{"t":"s"}"#).unwrap();
        apply_str(&mut s, 0, r#"{"t":"s","ov":1}"#).unwrap();
        assert_eq!(s.screen_count, 1);
        assert_eq!(s.arena.screen_role_attr(1), Some(1));
    }

    #[test]
    fn test_update_text_by_id() {
        let mut s = fresh();
        apply_str(&mut s, json_flags::HEAD, r#"{"t":"h","n":4}"#).unwrap();
        apply_str(&mut s, 0, r#"{"t":"s"}"#).unwrap();
        apply_str(&mut s, 0, r#"{"t":"t","p":0,"x":0,"y":0,"tx":"old","c":8}"#).unwrap();
        apply_str(&mut s, 0, r#"{"e":1,"tx":"newer"}"#).unwrap();
        assert_eq!(s.arena.text(1).unwrap(), b"newer");
        // Type mismatch on update is silently ignored.
        apply_str(&mut s, 0, r#"{"t":"b","e":1,"v":5}"#).unwrap();
        assert_eq!(s.arena.text(1).unwrap(), b"newer");
    }

    #[test]
    fn test_update_barrel_value() {
        let mut s = fresh();
        apply_str(&mut s, json_flags::HEAD, r#"{"t":"h","n":4}"#).unwrap();
        apply_str(&mut s, 0, r#"{"t":"s"}"#).unwrap();
        apply_str(&mut s, 0, r#"{"t":"b","p":0,"x":0,"y":0,"v":2}"#).unwrap();
        assert_eq!(s.barrel_value(1), 2);
        apply_str(&mut s, 0, r#"{"e":1,"v":7}"#).unwrap();
        assert_eq!(s.barrel_value(1), 7);
    }

    #[test]
    fn test_malformed_object() {
        let mut s = fresh();
        apply_str(&mut s, json_flags::HEAD, r#"{"t":"h","n":4}"#).unwrap();
        assert_eq!(apply_str(&mut s, 0, r#"no braces"#), Err(Error::ParseFail));
        assert_eq!(apply_str(&mut s, 0, "{"), Err(Error::BadLen));
        // A bad frame does not poison the next one.
        assert_eq!(apply_str(&mut s, 0, r#"{"t":"s"}"#), Ok(()));
    }

    #[test]
    fn test_legacy_type_tokens() {
        let mut s = fresh();
        apply_str(&mut s, json_flags::HEAD, r#"{"t":"h","n":4}"#).unwrap();
        apply_str(&mut s, 0, r#"{"t":"s"}"#).unwrap();
        apply_str(&mut s, 0, r#"{"t":"te","p":0,"x":0,"y":0,"tx":"L"}"#).unwrap();
        assert_eq!(s.arena.element(1).unwrap().ty, ElementType::Text);
    }

    #[test]
    fn test_commit_sets_initialized_and_render() {
        let mut s = fresh();
        apply_str(&mut s, json_flags::HEAD, r#"{"t":"h","n":2}"#).unwrap();
        apply_str(&mut s, 0, r#"{"t":"s"}"#).unwrap();
        apply_str(&mut s, json_flags::COMMIT, r#"{"t":"t","p":0,"x":0,"y":0,"tx":"Hi"}"#).unwrap();
        assert!(s.initialized);
        assert!(s.render_requested);
        assert_eq!(s.arena.element_count(), 2);
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let mut s = fresh();
        apply_str(&mut s, json_flags::HEAD, r#"{"t":"h","n":2,"zz":9}"#).unwrap();
        apply_str(&mut s, 0, r#"{"t":"s","sy":1,"future":"x"}"#).unwrap();
        assert_eq!(s.screen_count, 1);
    }
}
