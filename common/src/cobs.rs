//! COBS byte stuffing for link frames.
//!
//! The encoder produces canonical COBS: every 0x00 in the input is replaced
//! by a length-to-next-zero code byte, so no zero bytes remain in the stuffed
//! form. No trailing 0x00 delimiter is emitted or required; the frame LEN
//! field delimits the encoded span.
//!
//! The decoder is deliberately lenient: it copies `code - 1` bytes verbatim
//! without checking them for zeros, so a single-block `[len + 1][raw bytes]`
//! frame from a minimal host encoder decodes to the same payload.

/// Encode `input` into `out`. Returns the number of encoded bytes written,
/// or `None` when `out` is too small.
pub fn encode(
    input: &[u8],
    out: &mut [u8],
) -> Option<usize> {
    if out.is_empty() {
        return None;
    }
    let mut code: u8 = 1;
    let mut code_index = 0usize;
    let mut write = 1usize;
    out[code_index] = 0;

    for &b in input {
        if b == 0 {
            out[code_index] = code;
            code = 1;
            code_index = write;
            write += 1;
            if write > out.len() {
                return None;
            }
            out[code_index] = 0;
        } else {
            if write >= out.len() {
                return None;
            }
            out[write] = b;
            write += 1;
            code += 1;
            if code == 0xFF {
                out[code_index] = 0xFF;
                code = 1;
                code_index = write;
                write += 1;
                if write > out.len() {
                    return None;
                }
                out[code_index] = 0;
            }
        }
    }
    out[code_index] = code;
    Some(write)
}

/// Decode `input` into `out`. Returns the number of decoded bytes written,
/// or `None` on a malformed span (zero code byte, truncated block) or when
/// `out` is too small.
pub fn decode(
    input: &[u8],
    out: &mut [u8],
) -> Option<usize> {
    let mut read = 0usize;
    let mut write = 0usize;
    while read < input.len() {
        let code = input[read];
        read += 1;
        if code == 0 {
            return None;
        }
        for _ in 1..code {
            if read >= input.len() || write >= out.len() {
                return None;
            }
            out[write] = input[read];
            read += 1;
            write += 1;
        }
        if read < input.len() && code != 0xFF {
            if write >= out.len() {
                return None;
            }
            out[write] = 0;
            write += 1;
        }
    }
    Some(write)
}

/// Worst-case encoded size for a `len`-byte input (one code byte per started
/// 254-byte block, plus the leading code).
pub const fn max_encoded_len(len: usize) -> usize { len + 1 + len / 254 }

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(input: &[u8]) -> Vec<u8> {
        let mut enc = [0u8; 300];
        let n = encode(input, &mut enc).unwrap();
        assert!(
            enc[..n].iter().all(|&b| b != 0),
            "stuffed form must contain no zeros"
        );
        let mut dec = [0u8; 300];
        let m = decode(&enc[..n], &mut dec).unwrap();
        dec[..m].to_vec()
    }

    #[test]
    fn test_empty_input() {
        let mut enc = [0u8; 4];
        assert_eq!(encode(&[], &mut enc), Some(1));
        assert_eq!(enc[0], 1);
        let mut dec = [0u8; 4];
        assert_eq!(decode(&enc[..1], &mut dec), Some(0));
    }

    #[test]
    fn test_single_zero() {
        let mut enc = [0u8; 4];
        let n = encode(&[0x00], &mut enc).unwrap();
        assert_eq!(&enc[..n], &[0x01, 0x01]);
        assert_eq!(roundtrip(&[0x00]), vec![0x00]);
    }

    #[test]
    fn test_ping_response_payload() {
        // rc=OK, version=1, caps=0 -> [00 01 00 00]
        let mut enc = [0u8; 8];
        let n = encode(&[0x00, 0x01, 0x00, 0x00], &mut enc).unwrap();
        assert_eq!(&enc[..n], &[0x01, 0x02, 0x01, 0x01, 0x01]);
        assert_eq!(roundtrip(&[0x00, 0x01, 0x00, 0x00]), vec![0x00, 0x01, 0x00, 0x00]);
    }

    #[test]
    fn test_no_zero_payload() {
        assert_eq!(roundtrip(&[1, 2, 3, 4, 5]), vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_lenient_single_block_decode() {
        // A minimal host encoder frames the whole payload as one block:
        // [len + 1][raw bytes], zeros included. The decoder must accept it.
        let mut dec = [0u8; 8];
        let m = decode(&[0x05, 0x00, 0x01, 0x00, 0x00], &mut dec).unwrap();
        assert_eq!(&dec[..m], &[0x00, 0x01, 0x00, 0x00]);
        let m = decode(&[0x02, 0x00], &mut dec).unwrap();
        assert_eq!(&dec[..m], &[0x00]);
    }

    #[test]
    fn test_decode_rejects_zero_code() {
        let mut dec = [0u8; 8];
        assert_eq!(decode(&[0x00], &mut dec), None);
    }

    #[test]
    fn test_decode_rejects_truncated_block() {
        let mut dec = [0u8; 8];
        assert_eq!(decode(&[0x05, 0x01, 0x02], &mut dec), None);
    }

    #[test]
    fn test_long_run_block_boundary() {
        // 254 non-zero bytes fill a block exactly; 255 forces a second code.
        let long: Vec<u8> = (0..255u16).map(|i| (i % 253 + 1) as u8).collect();
        assert_eq!(roundtrip(&long), long);
    }
}
