// src/core/protocol/frame.rs

//! Implements the length-prefixed framing shared by every message on the wire,
//! together with the `Encoder` and `Decoder` used for network communication.

use crate::core::VoltError;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Size of the big-endian `i32` length prefix.
const LENGTH_PREFIX_LEN: usize = 4;

// Protocol-level limit to stop a corrupt prefix from allocating unbounded memory.
pub const MAX_FRAME_SIZE: usize = 50 * 1024 * 1024; // 50MB

/// A `tokio_util::codec` implementation that splits a byte stream into message
/// payloads. The payload of each frame is returned without its length prefix.
#[derive(Debug, Default, Clone, Copy)]
pub struct VoltFrameCodec;

impl Encoder<Bytes> for VoltFrameCodec {
    type Error = VoltError;

    /// Writes `payload.len()` as an `i32` followed by the payload itself.
    fn encode(&mut self, payload: Bytes, dst: &mut BytesMut) -> Result<(), Self::Error> {
        if payload.is_empty() || payload.len() > MAX_FRAME_SIZE {
            return Err(VoltError::Protocol(format!(
                "refusing to send frame of {} bytes",
                payload.len()
            )));
        }
        dst.reserve(LENGTH_PREFIX_LEN + payload.len());
        dst.put_i32(payload.len() as i32);
        dst.extend_from_slice(&payload);
        Ok(())
    }
}

impl Decoder for VoltFrameCodec {
    type Item = Bytes;
    type Error = VoltError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < LENGTH_PREFIX_LEN {
            return Ok(None);
        }

        let declared = i32::from_be_bytes([src[0], src[1], src[2], src[3]]);
        if declared < 1 || declared as usize > MAX_FRAME_SIZE {
            return Err(VoltError::Protocol(format!(
                "invalid frame length {declared}"
            )));
        }

        let frame_len = declared as usize;
        if src.len() < LENGTH_PREFIX_LEN + frame_len {
            // Reserve up front so the next read can complete the frame in one go.
            src.reserve(LENGTH_PREFIX_LEN + frame_len - src.len());
            return Ok(None);
        }

        src.advance(LENGTH_PREFIX_LEN);
        Ok(Some(src.split_to(frame_len).freeze()))
    }
}
