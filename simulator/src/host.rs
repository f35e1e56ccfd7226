//! Host side of the link: frames commands, collects and decodes responses.

use std::collections::VecDeque;

use oledui_common::{cobs, frame};
use oledui_slave::link::HostPort;

/// Captures response bursts; the virtual transmitter drains instantly.
#[derive(Default)]
pub struct HostLink {
    responses: VecDeque<Vec<u8>>,
}

impl HostLink {
    pub fn new() -> Self { Self::default() }

    /// Pop the oldest decoded response payload (RC byte first).
    pub fn pop_response(&mut self) -> Option<Vec<u8>> { self.responses.pop_front() }
}

impl HostPort for HostLink {
    fn tx_busy(&self) -> bool { false }

    fn tx_start(
        &mut self,
        bytes: &[u8],
    ) {
        assert!(bytes.len() >= 3, "runt response frame");
        assert_eq!(&bytes[..2], &[frame::SYNC0, frame::SYNC1]);
        assert_eq!(bytes[2] as usize, bytes.len() - 3, "bad LEN field");
        let mut decoded = [0u8; frame::MAX_DECODED_LEN];
        let len = cobs::decode(&bytes[3..], &mut decoded).expect("undecodable response");
        self.responses.push_back(decoded[..len].to_vec());
    }
}

/// Encode one command frame the way the master firmware does.
pub fn encode_command(
    command: u8,
    payload: &[u8],
) -> Vec<u8> {
    let mut raw = vec![command];
    raw.extend_from_slice(payload);
    let mut encoded = vec![0u8; cobs::max_encoded_len(raw.len())];
    let len = cobs::encode(&raw, &mut encoded).expect("encode");
    let mut out = vec![frame::SYNC0, frame::SYNC1, len as u8];
    out.extend_from_slice(&encoded[..len]);
    out
}
