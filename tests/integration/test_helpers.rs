// tests/integration/test_helpers.rs

//! Test helpers and utilities for integration tests

#![allow(dead_code)]

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use std::sync::Arc;
use tokio::io::DuplexStream;
use tokio::sync::oneshot;
use tokio_util::codec::Framed;
use tracing_subscriber::EnvFilter;
use voltwire::config::ClientConfig;
use voltwire::connection::{Completion, ExecResult, PendingQuery, QueryRows};
use voltwire::core::protocol::{
    Invocation, InvocationResponse, LoginRequest, LoginResponse, SessionInfo, VoltFrameCodec,
};
use voltwire::{Connection, Handle};

/// Installs a quiet subscriber once per test binary.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new("warn"))
        .with_test_writer()
        .try_init();
}

/// The session identifiers the fake server hands out unless told otherwise.
pub fn sample_session_info() -> SessionInfo {
    SessionInfo {
        server_node_id: 3,
        session_id: 0x0102_0304_0506_0708,
        leader_node_id: 0x7f00_0001,
        build_tag: "voltdb-6.4-test".to_string(),
    }
}

/// Query rows whose single table is `tag`, so tests can tell results apart.
pub fn rows(tag: &str) -> QueryRows {
    QueryRows {
        tables: vec![Bytes::copy_from_slice(tag.as_bytes())],
        app_status: i8::MIN,
        round_trip_ms: 1,
    }
}

pub fn exec_result() -> ExecResult {
    ExecResult {
        tables: vec![Bytes::from_static(b"1")],
        app_status: i8::MIN,
        round_trip_ms: 1,
    }
}

/// A query slot with a hand-held sender, not attached to any listener.
pub fn query_channel(handle: Handle) -> (oneshot::Sender<Completion>, Arc<PendingQuery>) {
    let (tx, rx) = oneshot::channel();
    (tx, Arc::new(PendingQuery::new(handle, rx)))
}

/// The server end of an in-memory session.
pub struct FakeServer {
    framed: Framed<DuplexStream, VoltFrameCodec>,
}

impl FakeServer {
    pub fn new(stream: DuplexStream) -> Self {
        Self {
            framed: Framed::new(stream, VoltFrameCodec),
        }
    }

    /// Reads the login and answers it with `info`.
    pub async fn accept_login(&mut self, info: &SessionInfo) -> LoginRequest {
        let login = self.read_login().await;
        let reply = LoginResponse::Accepted {
            info: info.clone(),
            cluster_start_ms: 1_466_000_000_000,
        };
        self.framed
            .send(reply.encode())
            .await
            .expect("Failed to send login response");
        login
    }

    /// Reads the login and rejects it with `code`.
    pub async fn reject_login(&mut self, code: u8) -> LoginRequest {
        let login = self.read_login().await;
        self.framed
            .send(LoginResponse::Rejected(code).encode())
            .await
            .expect("Failed to send login rejection");
        login
    }

    async fn read_login(&mut self) -> LoginRequest {
        let frame = self
            .framed
            .next()
            .await
            .expect("Client closed before logging in")
            .expect("Failed to read login frame");
        LoginRequest::decode(frame).expect("Failed to decode login")
    }

    /// The next raw frame, or `None` once the client has hung up.
    pub async fn next_frame(&mut self) -> Option<Bytes> {
        match self.framed.next().await {
            Some(Ok(frame)) => Some(frame),
            _ => None,
        }
    }

    pub async fn next_invocation(&mut self) -> Invocation {
        let frame = self
            .framed
            .next()
            .await
            .expect("Client closed before sending an invocation")
            .expect("Failed to read invocation frame");
        Invocation::decode(frame).expect("Failed to decode invocation")
    }

    pub async fn respond(&mut self, response: InvocationResponse) {
        self.framed
            .send(response.encode())
            .await
            .expect("Failed to send response");
    }

    /// Sends `payload` as one frame, whether or not it decodes.
    pub async fn send_raw(&mut self, payload: Bytes) {
        self.framed
            .send(payload)
            .await
            .expect("Failed to send raw frame");
    }

    /// Answers `handle` with a successful response whose table is `tag`.
    pub async fn respond_rows(&mut self, handle: Handle, tag: &str) {
        self.respond(InvocationResponse::success(
            handle,
            vec![Bytes::copy_from_slice(tag.as_bytes())],
        ))
        .await;
    }
}

/// An open connection wired to a fake server over an in-memory stream.
pub struct TestContext {
    pub conn: Connection,
    pub server: FakeServer,
    pub info: SessionInfo,
}

impl TestContext {
    pub async fn new() -> Self {
        Self::with_info(sample_session_info()).await
    }

    pub async fn with_info(info: SessionInfo) -> Self {
        init_tracing();

        let (client, server_stream) = tokio::io::duplex(64 * 1024);
        let conn = Connection::new(ClientConfig::default());
        let mut server = FakeServer::new(server_stream);

        let (opened, _login) = tokio::join!(
            conn.open_with_stream(client),
            server.accept_login(&info)
        );
        opened.expect("Failed to open connection");

        Self { conn, server, info }
    }
}
