//! Element types and the compact per-element reference.
//!
//! An element is two bytes of metadata (parent id + type) plus an (x, y)
//! position; all of it lives in per-element tables at the head of the arena.

/// Sentinel id meaning "no parent / no element".
pub const INVALID_ID: u8 = 0xFF;

/// Element types understood by the parser and the renderer.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ElementType {
    /// Drawable label with fixed-capacity text.
    Text = 0,
    /// Scrollable column of Text children.
    List = 9,
    /// Root of a rendering context.
    Screen = 10,
    /// Selector over its Text children with an edit mode.
    Barrel = 12,
    /// Action element carrying a version counter.
    Trigger = 14,
}

impl ElementType {
    /// Decode a raw type byte from the element table.
    pub const fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::Text),
            9 => Some(Self::List),
            10 => Some(Self::Screen),
            12 => Some(Self::Barrel),
            14 => Some(Self::Trigger),
            _ => None,
        }
    }

    /// Whether this type participates in focus traversal.
    pub const fn focusable(self) -> bool { matches!(self, Self::List | Self::Barrel | Self::Trigger) }
}

/// Compact element reference: parent id and type.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Element {
    /// Parent element id, or [`INVALID_ID`] for a root.
    pub parent: u8,
    /// Element type.
    pub ty: ElementType,
}

/// Overlay role stored in the screen-role attribute.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum ScreenRole {
    /// Ordinary base or local screen.
    #[default]
    None = 0,
    /// Full overlay: rendered on top, not counted in ordinals.
    FullOverlay = 1,
}

impl ScreenRole {
    pub const fn from_raw(raw: u8) -> Self {
        match raw {
            1 => Self::FullOverlay,
            _ => Self::None,
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_raw_roundtrip() {
        for ty in [
            ElementType::Text,
            ElementType::List,
            ElementType::Screen,
            ElementType::Barrel,
            ElementType::Trigger,
        ] {
            assert_eq!(ElementType::from_raw(ty as u8), Some(ty));
        }
        assert_eq!(ElementType::from_raw(0xFF), None);
    }

    #[test]
    fn test_focusable_types() {
        assert!(ElementType::List.focusable());
        assert!(ElementType::Barrel.focusable());
        assert!(ElementType::Trigger.focusable());
        assert!(!ElementType::Text.focusable());
        assert!(!ElementType::Screen.focusable());
    }
}
