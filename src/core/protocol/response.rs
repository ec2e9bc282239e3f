// src/core/protocol/response.rs

//! Decoding of invocation responses, the frames the listener demultiplexes by
//! client handle.

use super::wire::{self, PROTOCOL_VERSION};
use crate::core::VoltError;
use bytes::{BufMut, Bytes, BytesMut};

// Bits of the `fields_present` byte.
const FIELD_APP_STATUS_STRING: u8 = 1 << 7;
const FIELD_EXCEPTION: u8 = 1 << 6;
const FIELD_STATUS_STRING: u8 = 1 << 5;

/// Status codes a server can attach to a response.
pub mod status {
    pub const SUCCESS: i8 = 1;
    pub const USER_ABORT: i8 = -1;
    pub const GRACEFUL_FAILURE: i8 = -2;
    pub const UNEXPECTED_FAILURE: i8 = -3;
    pub const CONNECTION_LOST: i8 = -4;
    pub const SERVER_UNAVAILABLE: i8 = -5;
    pub const CONNECTION_TIMEOUT: i8 = -6;
    pub const RESPONSE_UNKNOWN: i8 = -7;
    pub const TXN_RESTART: i8 = -8;
    pub const OPERATIONAL_FAILURE: i8 = -9;
    pub const UNINITIALIZED_APP_STATUS: i8 = i8::MIN;

    /// A short label for logs and error messages.
    pub fn describe(code: i8) -> &'static str {
        match code {
            SUCCESS => "SUCCESS",
            USER_ABORT => "USER_ABORT",
            GRACEFUL_FAILURE => "GRACEFUL_FAILURE",
            UNEXPECTED_FAILURE => "UNEXPECTED_FAILURE",
            CONNECTION_LOST => "CONNECTION_LOST",
            SERVER_UNAVAILABLE => "SERVER_UNAVAILABLE",
            CONNECTION_TIMEOUT => "CONNECTION_TIMEOUT",
            RESPONSE_UNKNOWN => "RESPONSE_UNKNOWN",
            TXN_RESTART => "TXN_RESTART",
            OPERATIONAL_FAILURE => "OPERATIONAL_FAILURE",
            _ => "UNKNOWN",
        }
    }
}

/// A decoded invocation response. Result tables are kept as serialized bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct InvocationResponse {
    pub handle: i64,
    pub status: i8,
    pub status_string: Option<String>,
    pub app_status: i8,
    pub app_status_string: Option<String>,
    pub round_trip_ms: i32,
    pub exception: Option<Bytes>,
    pub tables: Vec<Bytes>,
}

impl InvocationResponse {
    /// A successful response carrying `tables`.
    pub fn success(handle: i64, tables: Vec<Bytes>) -> Self {
        Self {
            handle,
            status: status::SUCCESS,
            status_string: None,
            app_status: status::UNINITIALIZED_APP_STATUS,
            app_status_string: None,
            round_trip_ms: 0,
            exception: None,
            tables,
        }
    }

    /// A failed response with a status string and no tables.
    pub fn failure(handle: i64, status: i8, message: impl Into<String>) -> Self {
        Self {
            status,
            status_string: Some(message.into()),
            ..Self::success(handle, Vec::new())
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == status::SUCCESS
    }

    /// Converts a non-success status into the error the waiter will see.
    pub fn status_error(&self) -> Option<VoltError> {
        if self.is_success() {
            return None;
        }
        let message = self
            .status_string
            .clone()
            .unwrap_or_else(|| status::describe(self.status).to_string());
        Some(VoltError::Server {
            status: self.status,
            message,
        })
    }

    /// Reads just the handle of a response payload, for frames whose remainder
    /// does not decode.
    pub fn peek_handle(payload: &[u8]) -> Option<i64> {
        let raw: [u8; 8] = payload.get(1..9)?.try_into().ok()?;
        Some(i64::from_be_bytes(raw))
    }

    pub fn decode(mut payload: Bytes) -> Result<Self, VoltError> {
        let buf = &mut payload;
        let _version = wire::get_u8(buf, "response version")?;
        let handle = wire::get_i64(buf, "client handle")?;
        let fields_present = wire::get_u8(buf, "fields present")?;
        let status = wire::get_i8(buf, "status")?;
        let status_string = if fields_present & FIELD_STATUS_STRING != 0 {
            wire::get_string(buf, "status string")?
        } else {
            None
        };
        let app_status = wire::get_i8(buf, "app status")?;
        let app_status_string = if fields_present & FIELD_APP_STATUS_STRING != 0 {
            wire::get_string(buf, "app status string")?
        } else {
            None
        };
        let round_trip_ms = wire::get_i32(buf, "cluster round trip time")?;
        let exception = if fields_present & FIELD_EXCEPTION != 0 {
            wire::get_bytes(buf, "serialized exception")?
        } else {
            None
        };

        let table_count = wire::get_i16(buf, "table count")?;
        if table_count < 0 {
            return Err(VoltError::Protocol(format!(
                "negative table count {table_count}"
            )));
        }
        let mut tables = Vec::with_capacity(table_count as usize);
        for _ in 0..table_count {
            let table = wire::get_bytes(buf, "result table")?
                .ok_or_else(|| VoltError::Protocol("null result table".to_string()))?;
            tables.push(table);
        }

        Ok(Self {
            handle,
            status,
            status_string,
            app_status,
            app_status_string,
            round_trip_ms,
            exception,
            tables,
        })
    }

    pub fn encode(&self) -> Bytes {
        let mut fields_present = 0u8;
        if self.status_string.is_some() {
            fields_present |= FIELD_STATUS_STRING;
        }
        if self.app_status_string.is_some() {
            fields_present |= FIELD_APP_STATUS_STRING;
        }
        if self.exception.is_some() {
            fields_present |= FIELD_EXCEPTION;
        }

        let mut dst = BytesMut::new();
        dst.put_u8(PROTOCOL_VERSION);
        dst.put_i64(self.handle);
        dst.put_u8(fields_present);
        dst.put_i8(self.status);
        if let Some(s) = &self.status_string {
            wire::put_string(&mut dst, s);
        }
        dst.put_i8(self.app_status);
        if let Some(s) = &self.app_status_string {
            wire::put_string(&mut dst, s);
        }
        dst.put_i32(self.round_trip_ms);
        if let Some(e) = &self.exception {
            wire::put_bytes(&mut dst, e);
        }
        dst.put_i16(self.tables.len() as i16);
        for table in &self.tables {
            wire::put_bytes(&mut dst, table);
        }
        dst.freeze()
    }
}
