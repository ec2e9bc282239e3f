// src/connection/statement.rs

//! Prepared statements: a procedure target bound to a connection.

use super::conn::Shared;
use super::pending::{ExecResult, Outcome, PendingExecution, PendingQuery, PendingResult, QueryRows};
use crate::core::VoltError;
use crate::core::protocol::{Invocation, Param};
use std::sync::Arc;
use tracing::{debug, warn};

/// The system procedure that plans and runs a SQL string.
pub const ADHOC_PROCEDURE: &str = "@AdHoc";

/// A statement ready to be invoked any number of times.
///
/// Each invocation gets a fresh handle. The handle is registered with both the
/// listener and the connection's registry before the request is written.
#[derive(Clone)]
pub struct Statement {
    shared: Arc<Shared>,
    procedure: String,
    leading_params: Vec<Param>,
}

impl std::fmt::Debug for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Statement")
            .field("procedure", &self.procedure)
            .field("leading_params", &self.leading_params)
            .finish()
    }
}

impl Statement {
    pub(crate) fn procedure(shared: Arc<Shared>, procedure: &str) -> Self {
        Self {
            shared,
            procedure: procedure.to_string(),
            leading_params: Vec::new(),
        }
    }

    pub(crate) fn adhoc(shared: Arc<Shared>, sql: &str) -> Self {
        Self {
            shared,
            procedure: ADHOC_PROCEDURE.to_string(),
            leading_params: vec![Param::String(sql.to_string())],
        }
    }

    pub fn procedure_name(&self) -> &str {
        &self.procedure
    }

    /// Dispatches the statement as a data-modifying request.
    pub async fn exec(&self, params: Vec<Param>) -> Result<Arc<PendingExecution>, VoltError> {
        self.dispatch::<ExecResult>(params).await
    }

    /// Dispatches the statement as a read request. The result stays in the
    /// connection's registry until it is awaited or drained.
    pub async fn query(&self, params: Vec<Param>) -> Result<Arc<PendingQuery>, VoltError> {
        self.dispatch::<QueryRows>(params).await
    }

    /// Dispatches and waits for the exec result.
    pub async fn exec_wait(&self, params: Vec<Param>) -> Result<ExecResult, VoltError> {
        self.exec(params).await?.wait().await
    }

    /// Dispatches and waits for the query rows.
    pub async fn query_wait(&self, params: Vec<Param>) -> Result<QueryRows, VoltError> {
        self.query(params).await?.wait().await
    }

    async fn dispatch<T: Outcome>(
        &self,
        params: Vec<Param>,
    ) -> Result<Arc<PendingResult<T>>, VoltError> {
        let session = self.shared.session()?;
        let handle = self.shared.next_handle();

        let mut all_params = self.leading_params.clone();
        all_params.extend(params);
        let payload = Invocation {
            procedure: self.procedure.clone(),
            handle,
            params: all_params,
        }
        .encode()?;

        let receiver = session.listener.register(handle, T::KIND);
        let pending = Arc::new(PendingResult::<T>::new(handle, receiver));
        T::register(&self.shared.registry, pending.clone());

        if let Err(e) = session.transport.send(payload).await {
            warn!(handle, procedure = %self.procedure, "Failed to send invocation: {}", e);
            session.listener.cancel(handle);
            pending.release();
            return Err(e);
        }

        debug!(handle, procedure = %self.procedure, kind = ?T::KIND, "Invocation sent");
        Ok(pending)
    }
}
