// tests/property/framing_test.rs

//! Property-based tests for the frame codec
//! Tests that frames decode identically however the byte stream is chunked

use bytes::{Bytes, BytesMut};
use proptest::prelude::*;
use tokio_util::codec::{Decoder, Encoder};
use voltwire::core::protocol::{InvocationResponse, VoltFrameCodec};

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 100,
        max_shrink_iters: 1000,
        ..ProptestConfig::default()
    })]

    #[test]
    fn test_frames_survive_arbitrary_chunking(
        payloads in prop::collection::vec(prop::collection::vec(any::<u8>(), 1..256), 1..10),
        chunk in 1usize..64,
    ) {
        let mut codec = VoltFrameCodec;
        let mut wire = BytesMut::new();
        for payload in &payloads {
            codec.encode(Bytes::from(payload.clone()), &mut wire).unwrap();
        }

        let mut buffer = BytesMut::new();
        let mut decoded = Vec::new();
        for piece in wire.chunks(chunk) {
            buffer.extend_from_slice(piece);
            while let Some(frame) = codec.decode(&mut buffer).unwrap() {
                decoded.push(frame.to_vec());
            }
        }

        prop_assert!(buffer.is_empty());
        prop_assert_eq!(decoded, payloads);
    }

    #[test]
    fn test_response_handle_and_tables_survive_decoding(
        handle in any::<i64>(),
        round_trip_ms in any::<i32>(),
        tables in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 0..8),
    ) {
        let tables: Vec<Bytes> = tables.into_iter().map(Bytes::from).collect();
        let mut response = InvocationResponse::success(handle, tables.clone());
        response.round_trip_ms = round_trip_ms;

        let decoded = InvocationResponse::decode(response.encode()).unwrap();
        prop_assert_eq!(decoded.handle, handle);
        prop_assert_eq!(decoded.round_trip_ms, round_trip_ms);
        prop_assert_eq!(decoded.tables, tables);
    }
}
