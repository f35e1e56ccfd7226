//! Property test: COBS encode followed by decode returns the original bytes
//! for every input up to the frame payload limit, and the stuffed form never
//! contains a zero byte.

use oledui_common::cobs;
use proptest::prelude::*;

proptest! {
    #[test]
    fn roundtrip_identity(input in proptest::collection::vec(any::<u8>(), 0..=111)) {
        let mut enc = [0u8; 128];
        let n = cobs::encode(&input, &mut enc).expect("encode");
        prop_assert!(n <= cobs::max_encoded_len(input.len()));
        prop_assert!(enc[..n].iter().all(|&b| b != 0));

        let mut dec = [0u8; 128];
        let m = cobs::decode(&enc[..n], &mut dec).expect("decode");
        prop_assert_eq!(&dec[..m], &input[..]);
    }

    #[test]
    fn single_block_decode(input in proptest::collection::vec(any::<u8>(), 0..=111)) {
        // The lenient decoder accepts a trivial one-block framing.
        let mut framed = vec![input.len() as u8 + 1];
        framed.extend_from_slice(&input);

        let mut dec = [0u8; 128];
        let m = cobs::decode(&framed, &mut dec).expect("decode");
        prop_assert_eq!(&dec[..m], &input[..]);
    }
}
