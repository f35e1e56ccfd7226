//! Result codes used by command handlers and storage helpers.
//!
//! Each variant maps 1:1 to a wire RC byte so a handler result can be
//! turned into a response without a translation table at every call site.

use crate::wire::rc;

/// Errors produced by the slave core. Every host-visible failure is one of
/// these; internal helpers propagate them with `?`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// Payload size does not match the command.
    BadLen,
    /// Operation not allowed in the current state.
    BadState,
    /// Unknown or out-of-range element/screen id.
    UnknownId,
    /// Value out of the permitted domain.
    Range,
    /// Internal error (unreachable paths, bus failures).
    Internal,
    /// Arena or queue exhaustion.
    NoSpace,
    /// Descriptor object is ill-formed.
    ParseFail,
    /// Streaming transfer error.
    StreamErr,
}

impl Error {
    /// Wire RC byte for this error.
    pub const fn rc(self) -> u8 {
        match self {
            Self::BadLen => rc::BAD_LEN,
            Self::BadState => rc::BAD_STATE,
            Self::UnknownId => rc::UNKNOWN_ID,
            Self::Range => rc::RANGE,
            Self::Internal => rc::INTERNAL,
            Self::NoSpace => rc::NO_SPACE,
            Self::ParseFail => rc::PARSE_FAIL,
            Self::StreamErr => rc::STREAM_ERR,
        }
    }
}

/// Shorthand used across the workspace.
pub type Result<T> = core::result::Result<T, Error>;

/// Map a handler result to the RC byte placed first in every response.
pub const fn result_rc(res: Result<()>) -> u8 {
    match res {
        Ok(()) => rc::OK,
        Err(e) => e.rc(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
