// src/connection/mod.rs

//! Manages a client session with a server node: the transport, the background
//! response listener, the registry of outstanding handles, and the public
//! `Connection` that ties them together.

mod conn;
mod listener;
mod pending;
mod registry;
mod statement;
mod transport;

// Publicly re-export the primary types from the sub-modules.
pub use conn::Connection;
pub use listener::{RequestKind, ResponseListener};
pub use pending::{
    Completion, ExecResult, Outcome, PendingExecution, PendingQuery, PendingResult, QueryRows,
};
pub use registry::HandleRegistry;
pub use statement::{ADHOC_PROCEDURE, Statement};
pub use transport::{BoxedReader, BoxedWriter, FrameReader, Handshake, Transport, dial, resolve};

/// The correlation id carried by a request and by its response.
pub type Handle = i64;
