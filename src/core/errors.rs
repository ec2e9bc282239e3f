// src/core/errors.rs

//! Defines the primary error type for the driver.

use std::sync::Arc;
use thiserror::Error;

/// Every failure the driver can report, either for a whole connection or for a
/// single in-flight handle.
#[derive(Error, Debug)]
pub enum VoltError {
    #[error("IO Error: {0}")]
    Io(Arc<std::io::Error>),

    #[error("Error resolving {0}")]
    Resolve(String),

    #[error("Connection Error: {0}")]
    Connect(String),

    #[error("Protocol Error: {0}")]
    Protocol(String),

    #[error("Authentication failed with code {0}")]
    AuthenticationFailed(u8),

    #[error("Connection is closed")]
    ClosedConnection,

    #[error("Connection is already open")]
    AlreadyOpen,

    // --- Per-handle delivery errors ---
    /// The listener dropped the delivery slot without producing a value.
    #[error("Result was not available, channel was closed")]
    ChannelClosed,

    /// A value arrived but it was not the shape the waiter expected.
    #[error("Unexpected return type, {0}")]
    UnexpectedResponse(String),

    /// The server answered the invocation with a non-success status.
    #[error("Server returned status {status}: {message}")]
    Server { status: i8, message: String },

    #[error("Error closing connection: {0}")]
    Close(String),
}

// `std::io::Error` is not cloneable, hence the Arc and the manual impl.
impl Clone for VoltError {
    fn clone(&self) -> Self {
        match self {
            VoltError::Io(e) => VoltError::Io(Arc::clone(e)),
            VoltError::Resolve(s) => VoltError::Resolve(s.clone()),
            VoltError::Connect(s) => VoltError::Connect(s.clone()),
            VoltError::Protocol(s) => VoltError::Protocol(s.clone()),
            VoltError::AuthenticationFailed(code) => VoltError::AuthenticationFailed(*code),
            VoltError::ClosedConnection => VoltError::ClosedConnection,
            VoltError::AlreadyOpen => VoltError::AlreadyOpen,
            VoltError::ChannelClosed => VoltError::ChannelClosed,
            VoltError::UnexpectedResponse(s) => VoltError::UnexpectedResponse(s.clone()),
            VoltError::Server { status, message } => VoltError::Server {
                status: *status,
                message: message.clone(),
            },
            VoltError::Close(s) => VoltError::Close(s.clone()),
        }
    }
}

impl PartialEq for VoltError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (VoltError::Io(e1), VoltError::Io(e2)) => e1.to_string() == e2.to_string(),
            (VoltError::Resolve(s1), VoltError::Resolve(s2)) => s1 == s2,
            (VoltError::Connect(s1), VoltError::Connect(s2)) => s1 == s2,
            (VoltError::Protocol(s1), VoltError::Protocol(s2)) => s1 == s2,
            (VoltError::AuthenticationFailed(c1), VoltError::AuthenticationFailed(c2)) => c1 == c2,
            (VoltError::UnexpectedResponse(s1), VoltError::UnexpectedResponse(s2)) => s1 == s2,
            (
                VoltError::Server {
                    status: s1,
                    message: m1,
                },
                VoltError::Server {
                    status: s2,
                    message: m2,
                },
            ) => s1 == s2 && m1 == m2,
            (VoltError::Close(s1), VoltError::Close(s2)) => s1 == s2,
            _ => core::mem::discriminant(self) == core::mem::discriminant(other),
        }
    }
}

impl VoltError {
    /// Returns true for errors that are scoped to one handle rather than the
    /// whole connection.
    pub fn is_delivery_error(&self) -> bool {
        matches!(
            self,
            VoltError::ChannelClosed | VoltError::UnexpectedResponse(_) | VoltError::Server { .. }
        )
    }
}

impl From<std::io::Error> for VoltError {
    fn from(e: std::io::Error) -> Self {
        VoltError::Io(Arc::new(e))
    }
}

impl From<std::string::FromUtf8Error> for VoltError {
    fn from(e: std::string::FromUtf8Error) -> Self {
        VoltError::Protocol(format!("invalid UTF-8 in string field: {e}"))
    }
}
