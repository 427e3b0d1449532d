// SPDX-License-Identifier: MIT OR Apache-2.0
//! Property tests for the byte readers.

use proptest::prelude::*;
use runcx_bytes::{ByteCursor, BytesError, read_be, read_le};

proptest! {
    #[test]
    fn u64_matches_std_in_both_orders(value: u64, prefix in proptest::collection::vec(any::<u8>(), 0..8)) {
        let mut le = prefix.clone();
        le.extend_from_slice(&value.to_le_bytes());
        let mut pos = prefix.len();
        prop_assert_eq!(read_le::<u64>(&le, &mut pos).unwrap(), value);
        prop_assert_eq!(pos, le.len());

        let mut be = prefix.clone();
        be.extend_from_slice(&value.to_be_bytes());
        let mut pos = prefix.len();
        prop_assert_eq!(read_be::<u64>(&be, &mut pos).unwrap(), value);
    }

    #[test]
    fn reads_never_overrun(bytes in proptest::collection::vec(any::<u8>(), 0..32), start in 0usize..40) {
        let mut pos = start;
        match read_le::<u32>(&bytes, &mut pos) {
            Ok(_) => prop_assert_eq!(pos, start + 4),
            Err(BytesError::UnexpectedEnd { needed, .. }) => {
                prop_assert_eq!(needed, 4);
                prop_assert_eq!(pos, start);
                prop_assert!(start + 4 > bytes.len());
            }
        }
    }

    #[test]
    fn cursor_consumes_exactly_the_input(values in proptest::collection::vec(any::<i16>(), 0..16)) {
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_be_bytes()).collect();
        let mut cursor = ByteCursor::new(&bytes);
        for v in &values {
            prop_assert_eq!(cursor.read_be::<i16>().unwrap(), *v);
        }
        prop_assert!(cursor.is_empty());
        prop_assert!(cursor.read_be::<i16>().is_err());
    }
}
