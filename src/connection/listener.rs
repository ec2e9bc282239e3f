// src/connection/listener.rs

//! The background task that reads response frames from a session and routes
//! each one to the waiter registered for its handle.
//!
//! # Teardown
//!
//! When the read loop ends, for whatever reason, every waiter still in the table
//! has its sender dropped, so receivers resolve as closed instead of blocking
//! forever. Registrations that race with teardown are caught by re-checking the
//! `stopped` flag after insertion: either teardown sees the new waiter, or the
//! registering side sees the flag and drops the sender itself.

use super::pending::{Completion, ExecResult, QueryRows};
use super::transport::FrameReader;
use super::Handle;
use crate::core::VoltError;
use crate::core::protocol::InvocationResponse;
use dashmap::DashMap;
use futures::StreamExt;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// The class of request a handle was issued for. Decides which completion the
/// listener builds from a successful response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// A data-modifying statement.
    Exec,
    /// A read statement.
    Query,
}

#[derive(Debug)]
struct Waiter {
    kind: RequestKind,
    tx: oneshot::Sender<Completion>,
}

/// Demultiplexes inbound responses to per-handle delivery slots.
#[derive(Debug)]
pub struct ResponseListener {
    waiters: DashMap<Handle, Waiter>,
    stopped: AtomicBool,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ResponseListener {
    /// Creates a listener that is not bound to any stream. Nothing is ever
    /// delivered unless `deliver` is called directly.
    pub fn detached() -> Arc<Self> {
        Arc::new(Self {
            waiters: DashMap::new(),
            stopped: AtomicBool::new(false),
            task: Mutex::new(None),
        })
    }

    /// Spawns the read loop over `reader`.
    pub fn start(reader: FrameReader) -> Arc<Self> {
        let listener = Self::detached();
        let handle = tokio::spawn(run(Arc::downgrade(&listener), reader));
        *listener.task.lock() = Some(handle);
        listener
    }

    /// Registers a waiter for `handle` and returns its receiving end.
    ///
    /// If the listener has already stopped, the returned receiver is closed.
    /// Registering a handle that is already present replaces the old waiter,
    /// whose receiver then resolves as closed.
    pub fn register(&self, handle: Handle, kind: RequestKind) -> oneshot::Receiver<Completion> {
        let (tx, rx) = oneshot::channel();
        if self.stopped.load(Ordering::SeqCst) {
            debug!(handle, "Listener stopped; handing out a closed receiver");
            return rx;
        }

        if self.waiters.insert(handle, Waiter { kind, tx }).is_some() {
            warn!(handle, "Replaced an existing waiter for a duplicate handle");
        }

        if self.stopped.load(Ordering::SeqCst) {
            self.waiters.remove(&handle);
        }
        rx
    }

    /// Drops the waiter for `handle`, if any.
    pub fn cancel(&self, handle: Handle) {
        if self.waiters.remove(&handle).is_some() {
            debug!(handle, "Cancelled waiter");
        }
    }

    /// Routes one decoded response to its waiter.
    pub fn deliver(&self, response: InvocationResponse) {
        let handle = response.handle;
        let Some(waiter) = self.take_waiter(handle) else {
            return;
        };

        let completion = match response.status_error() {
            Some(err) => Completion::Failed(err),
            None => match waiter.kind {
                RequestKind::Exec => Completion::Exec(ExecResult::from(response)),
                RequestKind::Query => Completion::Query(QueryRows::from(response)),
            },
        };
        complete(handle, waiter, completion);
    }

    /// Resolves the waiter for `handle` with `err`.
    pub fn fail(&self, handle: Handle, err: VoltError) {
        if let Some(waiter) = self.take_waiter(handle) {
            complete(handle, waiter, Completion::Failed(err));
        }
    }

    fn take_waiter(&self, handle: Handle) -> Option<Waiter> {
        let waiter = self.waiters.remove(&handle).map(|(_, waiter)| waiter);
        if waiter.is_none() {
            warn!(handle, "Received a response for a handle with no waiter");
        }
        waiter
    }

    /// Stops the read loop and closes every outstanding waiter.
    pub fn stop(&self) {
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
        self.teardown("listener stopped");
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// The number of handles still waiting for a response.
    pub fn pending_count(&self) -> usize {
        self.waiters.len()
    }

    fn teardown(&self, reason: &str) {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        let abandoned = self.waiters.len();
        // Dropping the senders closes the receivers.
        self.waiters.clear();
        info!(abandoned, "Response listener shut down: {}", reason);
    }
}

fn complete(handle: Handle, waiter: Waiter, completion: Completion) {
    if waiter.tx.send(completion).is_err() {
        debug!(handle, "Waiter went away before its response arrived");
    } else {
        debug!(handle, "Delivered response");
    }
}

impl Drop for ResponseListener {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.abort();
        }
    }
}

async fn run(listener: Weak<ResponseListener>, mut reader: FrameReader) {
    let reason = loop {
        match reader.next().await {
            Some(Ok(frame)) => {
                let Some(listener) = listener.upgrade() else {
                    return;
                };
                match InvocationResponse::decode(frame.clone()) {
                    Ok(response) => listener.deliver(response),
                    // Only the waiter named by the frame is failed; the stream
                    // itself is still framed correctly.
                    Err(e) => match InvocationResponse::peek_handle(&frame) {
                        Some(handle) => {
                            warn!(handle, "Undecodable response: {}", e);
                            listener.fail(handle, e);
                        }
                        None => break format!("response frame without a handle: {e}"),
                    },
                }
            }
            Some(Err(e)) => break format!("read error: {e}"),
            None => break "stream closed by server".to_string(),
        }
    };

    if let Some(listener) = listener.upgrade() {
        listener.teardown(&reason);
    }
}
