//! Diagnostic event ring.
//!
//! The slave records one-byte events (render lifecycle, provisioning
//! commits, screen and overlay changes) into a small history buffer the
//! integrator can drain for a debug LED, a log console or a test harness.

use heapless::HistoryBuffer;

/// Number of retained entries; older ones are overwritten.
pub const DIAG_ENTRIES: usize = 8;

/// Recorded event kinds.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Event {
    RenderStart,
    RenderDone,
    JsonCommit,
    SetActiveScreen,
    ScrollToScreen,
    ShowOverlay,
    OverlayClear,
    StandbyRequest,
}

/// One diagnostic record.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DiagEntry {
    pub event: Event,
    /// Event-specific detail (screen ordinal, element id low bits, ...).
    pub value: u8,
    pub timestamp_ms: u32,
}

/// Fixed-size diagnostic ring.
pub struct DiagLog {
    entries: HistoryBuffer<DiagEntry, DIAG_ENTRIES>,
}

impl DiagLog {
    pub const fn new() -> Self {
        Self {
            entries: HistoryBuffer::new(),
        }
    }

    /// Append one event, evicting the oldest when full.
    pub fn record(
        &mut self,
        event: Event,
        value: u8,
        timestamp_ms: u32,
    ) {
        self.entries.write(DiagEntry {
            event,
            value,
            timestamp_ms,
        });
    }

    /// Entries oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &DiagEntry> { self.entries.oldest_ordered() }

    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.len() == 0 }

    pub fn clear(&mut self) { self.entries.clear() }
}

impl Default for DiagLog {
    fn default() -> Self { Self::new() }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_order() {
        let mut log = DiagLog::new();
        log.record(Event::RenderStart, 3, 10);
        log.record(Event::RenderDone, 0, 20);
        let events: Vec<_> = log.iter().map(|e| e.event).collect();
        assert_eq!(events, vec![Event::RenderStart, Event::RenderDone]);
    }

    #[test]
    fn test_ring_evicts_oldest() {
        let mut log = DiagLog::new();
        for i in 0..(DIAG_ENTRIES as u8 + 3) {
            log.record(Event::JsonCommit, i, i as u32);
        }
        assert_eq!(log.len(), DIAG_ENTRIES);
        assert_eq!(log.iter().next().unwrap().value, 3);
    }
}
