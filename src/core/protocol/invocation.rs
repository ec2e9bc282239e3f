// src/core/protocol/invocation.rs

//! Serialization of stored procedure invocations, the only request a client
//! sends after login.

use super::wire::{self, PROTOCOL_VERSION};
use crate::core::VoltError;
use bytes::{BufMut, Bytes, BytesMut};

// Wire type tags for parameters.
const TYPE_NULL: u8 = 1;
const TYPE_TINYINT: u8 = 3;
const TYPE_SMALLINT: u8 = 4;
const TYPE_INTEGER: u8 = 5;
const TYPE_BIGINT: u8 = 6;
const TYPE_FLOAT: u8 = 8;
const TYPE_STRING: u8 = 9;
const TYPE_VARBINARY: u8 = 25;

/// A single procedure parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum Param {
    Null,
    TinyInt(i8),
    SmallInt(i16),
    Integer(i32),
    BigInt(i64),
    Float(f64),
    String(String),
    Varbinary(Bytes),
}

impl From<bool> for Param {
    fn from(v: bool) -> Self {
        Param::TinyInt(v as i8)
    }
}

impl From<i8> for Param {
    fn from(v: i8) -> Self {
        Param::TinyInt(v)
    }
}

impl From<i16> for Param {
    fn from(v: i16) -> Self {
        Param::SmallInt(v)
    }
}

impl From<i32> for Param {
    fn from(v: i32) -> Self {
        Param::Integer(v)
    }
}

impl From<i64> for Param {
    fn from(v: i64) -> Self {
        Param::BigInt(v)
    }
}

impl From<f64> for Param {
    fn from(v: f64) -> Self {
        Param::Float(v)
    }
}

impl From<&str> for Param {
    fn from(v: &str) -> Self {
        Param::String(v.to_string())
    }
}

impl From<String> for Param {
    fn from(v: String) -> Self {
        Param::String(v)
    }
}

impl From<Bytes> for Param {
    fn from(v: Bytes) -> Self {
        Param::Varbinary(v)
    }
}

impl<T: Into<Param>> From<Option<T>> for Param {
    fn from(v: Option<T>) -> Self {
        v.map_or(Param::Null, Into::into)
    }
}

impl Param {
    fn encode(&self, dst: &mut BytesMut) {
        match self {
            Param::Null => dst.put_u8(TYPE_NULL),
            Param::TinyInt(v) => {
                dst.put_u8(TYPE_TINYINT);
                dst.put_i8(*v);
            }
            Param::SmallInt(v) => {
                dst.put_u8(TYPE_SMALLINT);
                dst.put_i16(*v);
            }
            Param::Integer(v) => {
                dst.put_u8(TYPE_INTEGER);
                dst.put_i32(*v);
            }
            Param::BigInt(v) => {
                dst.put_u8(TYPE_BIGINT);
                dst.put_i64(*v);
            }
            Param::Float(v) => {
                dst.put_u8(TYPE_FLOAT);
                dst.put_f64(*v);
            }
            Param::String(s) => {
                dst.put_u8(TYPE_STRING);
                wire::put_string(dst, s);
            }
            Param::Varbinary(b) => {
                dst.put_u8(TYPE_VARBINARY);
                wire::put_bytes(dst, b);
            }
        }
    }

    fn decode(buf: &mut Bytes) -> Result<Self, VoltError> {
        let tag = wire::get_u8(buf, "parameter type")?;
        let param = match tag {
            TYPE_NULL => Param::Null,
            TYPE_TINYINT => Param::TinyInt(wire::get_i8(buf, "tinyint")?),
            TYPE_SMALLINT => Param::SmallInt(wire::get_i16(buf, "smallint")?),
            TYPE_INTEGER => Param::Integer(wire::get_i32(buf, "integer")?),
            TYPE_BIGINT => Param::BigInt(wire::get_i64(buf, "bigint")?),
            TYPE_FLOAT => Param::Float(wire::get_f64(buf, "float")?),
            TYPE_STRING => match wire::get_string(buf, "string")? {
                Some(s) => Param::String(s),
                None => Param::Null,
            },
            TYPE_VARBINARY => match wire::get_bytes(buf, "varbinary")? {
                Some(b) => Param::Varbinary(b),
                None => Param::Null,
            },
            other => {
                return Err(VoltError::Protocol(format!(
                    "unsupported parameter type {other}"
                )));
            }
        };
        Ok(param)
    }
}

/// A stored procedure invocation tagged with the handle its response will carry.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    pub procedure: String,
    pub handle: i64,
    pub params: Vec<Param>,
}

impl Invocation {
    pub fn encode(&self) -> Result<Bytes, VoltError> {
        if self.params.len() > i16::MAX as usize {
            return Err(VoltError::Protocol(format!(
                "too many parameters for {}: {}",
                self.procedure,
                self.params.len()
            )));
        }
        let mut dst = BytesMut::with_capacity(32 + self.procedure.len());
        dst.put_u8(PROTOCOL_VERSION);
        wire::put_string(&mut dst, &self.procedure);
        dst.put_i64(self.handle);
        dst.put_i16(self.params.len() as i16);
        for param in &self.params {
            param.encode(&mut dst);
        }
        Ok(dst.freeze())
    }

    pub fn decode(mut payload: Bytes) -> Result<Self, VoltError> {
        let buf = &mut payload;
        let _version = wire::get_u8(buf, "invocation version")?;
        let procedure = wire::get_string(buf, "procedure name")?
            .ok_or_else(|| VoltError::Protocol("null procedure name".to_string()))?;
        let handle = wire::get_i64(buf, "client handle")?;
        let count = wire::get_i16(buf, "parameter count")?;
        if count < 0 {
            return Err(VoltError::Protocol(format!(
                "negative parameter count {count}"
            )));
        }
        let mut params = Vec::with_capacity(count as usize);
        for _ in 0..count {
            params.push(Param::decode(buf)?);
        }
        Ok(Self {
            procedure,
            handle,
            params,
        })
    }
}
