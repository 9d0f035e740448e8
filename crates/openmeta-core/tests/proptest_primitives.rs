//! Property-based tests for core primitives.
//!
//! These tests verify that reads stay bounded and the arena round-trips
//! allocations without panicking on any input.

use openmeta_core::{parse_tiff_header, reader, ByteArena, ByteOrder};
use proptest::prelude::*;

proptest! {
    /// Primitive reads never escape the input span and never panic.
    #[test]
    fn reads_are_bounded(
        data in prop::collection::vec(any::<u8>(), 0..256),
        offset in any::<u64>(),
        big_endian in any::<bool>()
    ) {
        let order = if big_endian {
            ByteOrder::BigEndian
        } else {
            ByteOrder::LittleEndian
        };
        let _ = reader::read_u8(&data, offset);
        let _ = reader::read_u16(&data, offset, order);
        let _ = reader::read_u32(&data, offset, order);
        let _ = reader::read_u64(&data, offset, order);
        let _ = reader::read_f64(&data, offset, order);
    }

    /// In-bounds reads agree with a slice copy.
    #[test]
    fn in_bounds_reads_match_slice(data in prop::collection::vec(any::<u8>(), 4..64), offset in 0usize..32) {
        if offset + 4 <= data.len() {
            let expect = u32::from_le_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]]);
            prop_assert_eq!(reader::read_u32(&data, offset as u64, ByteOrder::LittleEndian), Some(expect));
        }
    }

    /// Header parsing never panics on arbitrary byte sequences.
    #[test]
    fn header_parse_no_panic(data in prop::collection::vec(any::<u8>(), 0..64)) {
        let _ = parse_tiff_header(&data);
    }

    /// `allocate(n, a).len == n` and the slice honours the alignment.
    #[test]
    fn arena_allocate_round_trip(
        sizes in prop::collection::vec((0u32..512, 0u32..5), 1..16)
    ) {
        let mut arena = ByteArena::new();
        for (size, align_pow) in sizes {
            let align = 1u32 << align_pow;
            let span = arena.allocate(size, align).unwrap();
            prop_assert_eq!(span.len(), size);
            let slice = arena.span(span);
            prop_assert_eq!(slice.len(), size as usize);
            prop_assert_eq!(span.offset() % align, 0);
        }
    }

    /// Interned bytes read back identically even as the arena grows.
    #[test]
    fn intern_survives_growth(
        blobs in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 1..24)
    ) {
        let mut arena = ByteArena::new();
        let spans: Vec<_> = blobs.iter().map(|b| arena.intern(b).unwrap()).collect();
        for (span, blob) in spans.iter().zip(&blobs) {
            prop_assert_eq!(arena.span(*span), blob.as_slice());
        }
    }
}
