// src/connection/pending.rs

//! One-shot delivery slots for in-flight requests.
//!
//! A `PendingResult` wraps the receiving end of the listener's channel and the
//! outcome it eventually resolves to. The outcome is recorded exactly once, by
//! whichever of a direct `wait` or a bulk drain gets there first; everyone else
//! observes the same recorded value.

use super::listener::RequestKind;
use super::registry::HandleRegistry;
use super::Handle;
use crate::core::VoltError;
use crate::core::protocol::InvocationResponse;
use bytes::Bytes;
use std::sync::{Arc, OnceLock, Weak};
use tokio::sync::{Mutex, OnceCell, oneshot};
use tracing::debug;

/// The typed payload delivered for one handle.
#[derive(Debug)]
pub enum Completion {
    Exec(ExecResult),
    Query(QueryRows),
    Failed(VoltError),
}

/// The result of a data-modifying statement.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecResult {
    /// Serialized result tables, in the order the server returned them.
    pub tables: Vec<Bytes>,
    pub app_status: i8,
    pub round_trip_ms: i32,
}

impl From<InvocationResponse> for ExecResult {
    fn from(response: InvocationResponse) -> Self {
        Self {
            tables: response.tables,
            app_status: response.app_status,
            round_trip_ms: response.round_trip_ms,
        }
    }
}

/// The row data of a read statement, as serialized result tables.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRows {
    pub tables: Vec<Bytes>,
    pub app_status: i8,
    pub round_trip_ms: i32,
}

impl From<InvocationResponse> for QueryRows {
    fn from(response: InvocationResponse) -> Self {
        Self {
            tables: response.tables,
            app_status: response.app_status,
            round_trip_ms: response.round_trip_ms,
        }
    }
}

/// A value a `PendingResult` can resolve to.
pub trait Outcome: Clone + Send + Sync + Sized + 'static {
    /// The request class this outcome answers.
    const KIND: RequestKind;

    /// Extracts `Self` from a completion, rejecting payloads of the wrong shape.
    fn from_completion(completion: Completion) -> Result<Self, VoltError>;

    /// Adds `pending` to the matching table of `registry`.
    fn register(registry: &Arc<HandleRegistry>, pending: Arc<PendingResult<Self>>);
}

impl Outcome for ExecResult {
    const KIND: RequestKind = RequestKind::Exec;

    fn from_completion(completion: Completion) -> Result<Self, VoltError> {
        match completion {
            Completion::Exec(result) => Ok(result),
            Completion::Failed(err) => Err(err),
            Completion::Query(_) => Err(VoltError::UnexpectedResponse(
                "expected an exec result, got query rows".to_string(),
            )),
        }
    }

    fn register(registry: &Arc<HandleRegistry>, pending: Arc<PendingResult<Self>>) {
        registry.register_exec(pending.handle(), pending);
    }
}

impl Outcome for QueryRows {
    const KIND: RequestKind = RequestKind::Query;

    fn from_completion(completion: Completion) -> Result<Self, VoltError> {
        match completion {
            Completion::Query(rows) => Ok(rows),
            Completion::Failed(err) => Err(err),
            Completion::Exec(_) => Err(VoltError::UnexpectedResponse(
                "expected query rows, got an exec result".to_string(),
            )),
        }
    }

    fn register(registry: &Arc<HandleRegistry>, pending: Arc<PendingResult<Self>>) {
        registry.register_query(pending.handle(), pending);
    }
}

/// A pending data-modifying request.
pub type PendingExecution = PendingResult<ExecResult>;
/// A pending read request.
pub type PendingQuery = PendingResult<QueryRows>;

/// A delivery slot for a single handle.
#[derive(Debug)]
pub struct PendingResult<T: Outcome> {
    handle: Handle,
    receiver: Mutex<oneshot::Receiver<Completion>>,
    outcome: OnceCell<Result<T, VoltError>>,
    registry: OnceLock<Weak<HandleRegistry>>,
}

impl<T: Outcome> PendingResult<T> {
    pub fn new(handle: Handle, receiver: oneshot::Receiver<Completion>) -> Self {
        Self {
            handle,
            receiver: Mutex::new(receiver),
            outcome: OnceCell::new(),
            registry: OnceLock::new(),
        }
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }

    /// Waits for the result of this handle.
    ///
    /// The first caller to get here consumes the channel; concurrent callers
    /// wait for it and all of them see the same outcome. A channel closed
    /// without a value resolves to `ChannelClosed`. Once resolved, the entry
    /// leaves the registry it was registered in.
    pub async fn wait(&self) -> Result<T, VoltError> {
        let outcome = self
            .outcome
            .get_or_init(|| async {
                let mut receiver = self.receiver.lock().await;
                let result = match (&mut *receiver).await {
                    Ok(completion) => T::from_completion(completion),
                    Err(_) => Err(VoltError::ChannelClosed),
                };
                debug!(handle = self.handle, ok = result.is_ok(), "Pending result resolved");
                result
            })
            .await;
        self.release();
        outcome.clone()
    }

    /// The recorded outcome, if this handle has resolved.
    pub fn outcome(&self) -> Option<&Result<T, VoltError>> {
        self.outcome.get()
    }

    pub fn is_resolved(&self) -> bool {
        self.outcome.initialized()
    }

    pub(crate) fn bind(&self, registry: Weak<HandleRegistry>) {
        // A slot belongs to the first registry it was added to.
        let _ = self.registry.set(registry);
    }

    /// Removes this entry from its registry, if it is still the registered one.
    pub(crate) fn release(&self) {
        if let Some(registry) = self.registry.get().and_then(Weak::upgrade) {
            registry.release(T::KIND, self.handle, self as *const Self as *const ());
        }
    }
}
