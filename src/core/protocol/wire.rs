// src/core/protocol/wire.rs

//! Primitive readers and writers for the fields that make up a message payload.
//! A payload is always a complete frame, so running out of bytes is a protocol
//! error rather than a request for more data.

use crate::core::VoltError;
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// The protocol version byte written at the start of every client message.
pub const PROTOCOL_VERSION: u8 = 0;

fn ensure(buf: &impl Buf, needed: usize, field: &str) -> Result<(), VoltError> {
    if buf.remaining() < needed {
        return Err(VoltError::Protocol(format!(
            "truncated payload while reading {field}: need {needed} bytes, have {}",
            buf.remaining()
        )));
    }
    Ok(())
}

pub fn get_u8(buf: &mut impl Buf, field: &str) -> Result<u8, VoltError> {
    ensure(buf, 1, field)?;
    Ok(buf.get_u8())
}

pub fn get_i8(buf: &mut impl Buf, field: &str) -> Result<i8, VoltError> {
    ensure(buf, 1, field)?;
    Ok(buf.get_i8())
}

pub fn get_i16(buf: &mut impl Buf, field: &str) -> Result<i16, VoltError> {
    ensure(buf, 2, field)?;
    Ok(buf.get_i16())
}

pub fn get_i32(buf: &mut impl Buf, field: &str) -> Result<i32, VoltError> {
    ensure(buf, 4, field)?;
    Ok(buf.get_i32())
}

pub fn get_i64(buf: &mut impl Buf, field: &str) -> Result<i64, VoltError> {
    ensure(buf, 8, field)?;
    Ok(buf.get_i64())
}

pub fn get_f64(buf: &mut impl Buf, field: &str) -> Result<f64, VoltError> {
    ensure(buf, 8, field)?;
    Ok(buf.get_f64())
}

/// Reads an `i32`-prefixed byte run. A length of `-1` is the null marker.
pub fn get_bytes(buf: &mut impl Buf, field: &str) -> Result<Option<Bytes>, VoltError> {
    let len = get_i32(buf, field)?;
    if len == -1 {
        return Ok(None);
    }
    if len < 0 {
        return Err(VoltError::Protocol(format!(
            "negative length {len} for {field}"
        )));
    }
    ensure(buf, len as usize, field)?;
    Ok(Some(buf.copy_to_bytes(len as usize)))
}

/// Reads an `i32`-prefixed UTF-8 string. A length of `-1` is the null marker.
pub fn get_string(buf: &mut impl Buf, field: &str) -> Result<Option<String>, VoltError> {
    match get_bytes(buf, field)? {
        Some(raw) => Ok(Some(String::from_utf8(raw.to_vec())?)),
        None => Ok(None),
    }
}

pub fn put_bytes(dst: &mut BytesMut, value: &[u8]) {
    dst.put_i32(value.len() as i32);
    dst.extend_from_slice(value);
}

pub fn put_string(dst: &mut BytesMut, value: &str) {
    put_bytes(dst, value.as_bytes());
}
