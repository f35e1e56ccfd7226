//! Frame constants, command ids, RC codes, status flags and button indices.

/// Frame layout: `[SYNC0][SYNC1][LEN][COBS(cmd || payload)]`, no trailer.
pub mod frame {
    /// First sync byte of every frame in either direction.
    pub const SYNC0: u8 = 0xA5;
    /// Second sync byte.
    pub const SYNC1: u8 = 0x5A;
    /// Maximum encoded (byte-stuffed) length accepted in the LEN field.
    pub const MAX_ENCODED_LEN: usize = 112;
    /// Maximum decoded command + payload size.
    pub const MAX_DECODED_LEN: usize = 64;
}

/// Command ids (first decoded byte of a request frame).
pub mod cmd {
    pub const PING: u8 = 0x00;
    pub const JSON: u8 = 0x01;
    pub const JSON_ABORT: u8 = 0x03;
    pub const SET_ACTIVE_SCREEN: u8 = 0x10;
    pub const GET_STATUS: u8 = 0x20;
    pub const SCROLL_TO_SCREEN: u8 = 0x21;
    pub const GET_ELEMENT_STATE: u8 = 0x22;
    pub const SHOW_OVERLAY: u8 = 0x30;
    pub const INPUT_EVENT: u8 = 0x41;
    pub const GOTO_STANDBY: u8 = 0x50;
}

/// Response RC codes (first byte of every response payload).
pub mod rc {
    pub const OK: u8 = 0x00;
    pub const BAD_LEN: u8 = 0x01;
    pub const BAD_STATE: u8 = 0x02;
    pub const UNKNOWN_ID: u8 = 0x03;
    pub const RANGE: u8 = 0x04;
    pub const INTERNAL: u8 = 0x05;
    pub const PARSE_FAIL: u8 = 0x0B;
    pub const NO_SPACE: u8 = 0x0C;
    pub const STREAM_ERR: u8 = 0x0D;
}

/// Flag bits of the JSON command payload header byte.
pub mod json_flags {
    /// Reset all slave state before applying the object.
    pub const HEAD: u8 = 0x01;
    /// Mark the model initialized and request a render.
    pub const COMMIT: u8 = 0x02;
}

/// Flag bits reported by `GET_STATUS`.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StatusFlags(pub u8);

impl StatusFlags {
    pub const INITIALIZED: u8 = 0x01;
    pub const DIRTY: u8 = 0x02;
    pub const OVERLAY: u8 = 0x04;

    pub const fn initialized(self) -> bool { self.0 & Self::INITIALIZED != 0 }

    pub const fn dirty(self) -> bool { self.0 & Self::DIRTY != 0 }

    pub const fn overlay(self) -> bool { self.0 & Self::OVERLAY != 0 }
}

/// Logical button indices expected by the `INPUT_EVENT` command.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Button {
    Up = 0,
    Down = 1,
    Ok = 2,
    Back = 3,
    Left = 4,
    Right = 5,
}

impl Button {
    /// Total number of logical buttons.
    pub const COUNT: u8 = 6;

    /// Decode a wire button index.
    pub const fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Self::Up),
            1 => Some(Self::Down),
            2 => Some(Self::Ok),
            3 => Some(Self::Back),
            4 => Some(Self::Left),
            5 => Some(Self::Right),
            _ => None,
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
    fn test_button_roundtrip() {
        for i in 0..Button::COUNT {
            let b = Button::from_index(i).unwrap();
            assert_eq!(b as u8, i);
        }
        assert_eq!(Button::from_index(6), None);
        assert_eq!(Button::from_index(0xFF), None);
    }

    #[test]
    fn test_status_flags() {
        let f = StatusFlags(StatusFlags::INITIALIZED | StatusFlags::OVERLAY);
        assert!(f.initialized());
        assert!(!f.dirty());
        assert!(f.overlay());
    }
}
