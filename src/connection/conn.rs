// src/connection/conn.rs

//! The public connection object: lifecycle, statement preparation, handle
//! registration and the bulk drain.

use super::listener::ResponseListener;
use super::pending::{PendingExecution, PendingQuery};
use super::registry::HandleRegistry;
use super::statement::Statement;
use super::transport::{self, Transport};
use super::Handle;
use crate::config::ClientConfig;
use crate::core::VoltError;
use crate::core::protocol::{LoginRequest, SessionInfo};
use futures::StreamExt;
use futures::stream::FuturesUnordered;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, info, warn};

/// Everything that exists only while a connection is open.
pub(crate) struct Session {
    pub(crate) info: SessionInfo,
    pub(crate) transport: Transport,
    pub(crate) listener: Arc<ResponseListener>,
}

enum ConnectionState {
    Unopened,
    /// A handshake is in flight.
    Opening,
    Open(Arc<Session>),
    Closed,
}

/// State shared between a `Connection` and the statements prepared from it.
pub(crate) struct Shared {
    config: ClientConfig,
    state: Mutex<ConnectionState>,
    pub(crate) registry: Arc<HandleRegistry>,
    next_handle: AtomicI64,
}

impl Shared {
    /// The open session, or `ClosedConnection`. A session whose listener has
    /// stopped lost its stream and counts as closed.
    pub(crate) fn session(&self) -> Result<Arc<Session>, VoltError> {
        match &*self.state.lock() {
            ConnectionState::Open(session) if !session.listener.is_stopped() => {
                Ok(session.clone())
            }
            _ => Err(VoltError::ClosedConnection),
        }
    }

    pub(crate) fn next_handle(&self) -> Handle {
        self.next_handle.fetch_add(1, Ordering::Relaxed)
    }
}

/// A connection to a single server node.
///
/// Cloning is cheap and every clone refers to the same session.
#[derive(Clone)]
pub struct Connection {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("address", &self.shared.config.address())
            .field("open", &self.is_open())
            .finish()
    }
}

impl Connection {
    /// Creates an unopened connection.
    pub fn new(config: ClientConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                state: Mutex::new(ConnectionState::Unopened),
                registry: HandleRegistry::new(),
                next_handle: AtomicI64::new(1),
            }),
        }
    }

    /// Creates a connection for `address` (`host:port`) with default
    /// credentials and opens it.
    pub async fn connect(address: &str) -> Result<Self, VoltError> {
        let conn = Self::new(ClientConfig::for_address(address)?);
        conn.open().await?;
        Ok(conn)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.shared.config
    }

    /// Dials the configured address and logs in.
    ///
    /// On failure the connection stays unopened and may be opened again.
    pub async fn open(&self) -> Result<SessionInfo, VoltError> {
        self.begin_open()?;
        let address = self.shared.config.address();
        let timeout = self.shared.config.connect_timeout();
        let login = self.login_request();

        let attempt = async {
            let stream = transport::dial(&address).await?;
            Transport::handshake(stream, &login).await
        };
        let result = match tokio::time::timeout(timeout, attempt).await {
            Ok(result) => result,
            Err(_) => Err(VoltError::Connect(format!(
                "{address}: timed out after {timeout:?}"
            ))),
        };
        self.finish_open(result)
    }

    /// Logs in over an already established stream instead of dialing.
    pub async fn open_with_stream<S>(&self, stream: S) -> Result<SessionInfo, VoltError>
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        self.begin_open()?;
        let login = self.login_request();
        let result = Transport::handshake(stream, &login).await;
        self.finish_open(result)
    }

    fn login_request(&self) -> LoginRequest {
        LoginRequest::new(&self.shared.config.username, &self.shared.config.password)
    }

    fn begin_open(&self) -> Result<(), VoltError> {
        let mut state = self.shared.state.lock();
        match &*state {
            ConnectionState::Unopened => {
                *state = ConnectionState::Opening;
                Ok(())
            }
            ConnectionState::Open(session) if session.listener.is_stopped() => {
                Err(VoltError::ClosedConnection)
            }
            ConnectionState::Opening | ConnectionState::Open(_) => Err(VoltError::AlreadyOpen),
            ConnectionState::Closed => Err(VoltError::ClosedConnection),
        }
    }

    fn finish_open(
        &self,
        result: Result<transport::Handshake, VoltError>,
    ) -> Result<SessionInfo, VoltError> {
        let mut state = self.shared.state.lock();
        let handshake = match result {
            Ok(handshake) => handshake,
            Err(e) => {
                if matches!(*state, ConnectionState::Opening) {
                    *state = ConnectionState::Unopened;
                }
                warn!("Failed to open connection: {}", e);
                return Err(e);
            }
        };

        if !matches!(*state, ConnectionState::Opening) {
            // Closed while the handshake was in flight. Dropping the handshake
            // releases the stream.
            return Err(VoltError::ClosedConnection);
        }

        let info = handshake.info;
        let session = Arc::new(Session {
            info: info.clone(),
            transport: handshake.transport,
            listener: ResponseListener::start(handshake.reader),
        });
        *state = ConnectionState::Open(session);
        info!(
            server_node_id = info.server_node_id,
            session_id = info.session_id,
            build = %info.build_tag,
            "Connection opened"
        );
        Ok(info)
    }

    /// Closes the connection and releases the transport.
    ///
    /// Outstanding waiters resolve as closed and exec registrations are
    /// forgotten. Queries stay registered so a later drain reports them.
    /// Closing a connection that is not open is a no-op. If shutting the stream
    /// down fails the error is returned, but the connection is closed
    /// regardless.
    pub async fn close(&self) -> Result<(), VoltError> {
        let previous = std::mem::replace(&mut *self.shared.state.lock(), ConnectionState::Closed);
        let ConnectionState::Open(session) = previous else {
            debug!("Close called on a connection that is not open");
            return Ok(());
        };

        session.listener.stop();
        let dropped_execs = self.shared.registry.clear_execs();
        if dropped_execs > 0 {
            debug!(dropped_execs, "Forgot outstanding execs on close");
        }
        let result = session.transport.close().await;
        match &result {
            Ok(()) => info!(session_id = session.info.session_id, "Connection closed"),
            Err(e) => warn!(session_id = session.info.session_id, "Error while closing connection: {}", e),
        }
        result
    }

    /// True while the session is open and its stream is still being read.
    pub fn is_open(&self) -> bool {
        self.shared.session().is_ok()
    }

    /// The identifiers of the open session.
    pub fn session_info(&self) -> Option<SessionInfo> {
        self.shared.session().ok().map(|session| session.info.clone())
    }

    /// Prepares a call to the stored procedure `procedure`.
    pub fn prepare(&self, procedure: &str) -> Result<Statement, VoltError> {
        self.shared.session()?;
        Ok(Statement::procedure(self.shared.clone(), procedure))
    }

    /// Prepares an ad hoc SQL statement.
    pub fn prepare_adhoc(&self, sql: &str) -> Result<Statement, VoltError> {
        self.shared.session()?;
        Ok(Statement::adhoc(self.shared.clone(), sql))
    }

    /// Issues the next handle from this connection's sequence.
    ///
    /// Statements draw their handles from the same sequence, so a handle
    /// obtained here never collides with one a statement dispatches.
    pub fn next_handle(&self) -> Handle {
        self.shared.next_handle()
    }

    /// Registers an exec under `handle`.
    ///
    /// Handles share one key space with statement dispatch, which numbers from
    /// 1 upward. A handle not taken from `next_handle` may overwrite the entry
    /// of a dispatched statement; the older entry is then forgotten.
    pub fn register_exec(
        &self,
        handle: Handle,
        pending: Arc<PendingExecution>,
    ) -> Result<(), VoltError> {
        self.shared.session()?;
        self.shared.registry.register_exec(handle, pending);
        Ok(())
    }

    /// Registers a query under `handle`, to be collected by `drain_all`.
    ///
    /// The same key space caveat as `register_exec` applies: use
    /// `next_handle` to avoid overwriting a dispatched statement's entry.
    pub fn register_query(&self, handle: Handle, pending: Arc<PendingQuery>) -> Result<(), VoltError> {
        self.shared.session()?;
        self.shared.registry.register_query(handle, pending);
        Ok(())
    }

    pub fn remove_query(&self, handle: Handle) -> Result<(), VoltError> {
        self.shared.session()?;
        self.shared.registry.remove_query(handle);
        Ok(())
    }

    pub fn outstanding_queries(&self) -> usize {
        self.shared.registry.query_count()
    }

    pub fn outstanding_execs(&self) -> usize {
        self.shared.registry.exec_count()
    }

    /// Waits for every query outstanding at the time of the call and returns
    /// them in completion order.
    ///
    /// Each returned query has its outcome recorded: its rows, or the error
    /// that ended it. Queries registered after the call starts are left for a
    /// later drain. This never fails as a whole.
    pub async fn drain_all(&self) -> Vec<Arc<PendingQuery>> {
        let snapshot = self.shared.registry.query_snapshot();
        if snapshot.is_empty() {
            return Vec::new();
        }
        debug!(count = snapshot.len(), "Draining outstanding queries");

        let mut waiting: FuturesUnordered<_> = snapshot
            .into_iter()
            .map(|query| async move {
                // The outcome is recorded on the query itself.
                let _ = query.wait().await;
                query
            })
            .collect();

        let mut finished = Vec::with_capacity(waiting.len());
        while let Some(query) = waiting.next().await {
            debug!(handle = query.handle(), remaining = waiting.len(), "Query drained");
            finished.push(query);
        }
        finished
    }
}
