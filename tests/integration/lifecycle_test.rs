// tests/integration/lifecycle_test.rs

//! Integration tests for the connection lifecycle
//! Tests: open over TCP and in-memory streams, login rejection, close idempotence,
//! operations before open and after close

use super::test_helpers::{
    FakeServer, TestContext, init_tracing, query_channel, sample_session_info,
};
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::codec::Framed;
use voltwire::config::ClientConfig;
use voltwire::core::protocol::{LoginRequest, LoginResponse, SessionInfo, VoltFrameCodec};
use voltwire::{Connection, VoltError};

// ===== Open =====

#[tokio::test]
async fn test_open_echoes_session_info_over_tcp() {
    init_tracing();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let expected = SessionInfo {
        server_node_id: 7,
        session_id: -42,
        leader_node_id: 0x0a00_0005,
        build_tag: "build-xyz".to_string(),
    };

    let server_info = expected.clone();
    let server = tokio::spawn(async move {
        let (socket, _) = listener.accept().await.unwrap();
        let mut framed = Framed::new(socket, VoltFrameCodec);
        let frame = framed.next().await.unwrap().unwrap();
        let login = LoginRequest::decode(frame).unwrap();
        framed
            .send(
                LoginResponse::Accepted {
                    info: server_info,
                    cluster_start_ms: 0,
                }
                .encode(),
            )
            .await
            .unwrap();
        // Keep the socket open until the client hangs up.
        while framed.next().await.is_some() {}
        login
    });

    let conn = Connection::connect(&addr.to_string()).await.unwrap();
    assert!(conn.is_open());
    assert_eq!(conn.session_info(), Some(expected));

    conn.close().await.unwrap();
    let login = server.await.unwrap();
    assert_eq!(login.service, "database");
    assert_eq!(login.username, "");
}

#[tokio::test]
async fn test_open_sends_configured_credentials() {
    init_tracing();
    let (client, server_stream) = tokio::io::duplex(4096);
    let config = ClientConfig {
        username: "admin".to_string(),
        password: "hunter2".to_string(),
        ..ClientConfig::default()
    };
    let conn = Connection::new(config);
    let mut server = FakeServer::new(server_stream);
    let info = sample_session_info();

    let (opened, login) = tokio::join!(conn.open_with_stream(client), server.accept_login(&info));

    assert_eq!(opened.unwrap(), info);
    assert_eq!(login.username, "admin");
    assert_eq!(
        login.password_hash,
        LoginRequest::new("admin", "hunter2").password_hash
    );
}

#[tokio::test]
async fn test_open_rejected_login_stays_unopened() {
    init_tracing();
    let (client, server_stream) = tokio::io::duplex(4096);
    let conn = Connection::new(ClientConfig::default());
    let mut server = FakeServer::new(server_stream);

    let (opened, _) = tokio::join!(conn.open_with_stream(client), server.reject_login(1));

    assert_eq!(opened.unwrap_err(), VoltError::AuthenticationFailed(1));
    assert!(!conn.is_open());
    assert!(conn.session_info().is_none());

    // No partial state: a second attempt may succeed.
    let (client, server_stream) = tokio::io::duplex(4096);
    let mut server = FakeServer::new(server_stream);
    let info = sample_session_info();
    let (opened, _) = tokio::join!(conn.open_with_stream(client), server.accept_login(&info));
    assert_eq!(opened.unwrap(), info);
}

#[tokio::test]
async fn test_open_peer_hangs_up_during_login() {
    init_tracing();
    let (client, server_stream) = tokio::io::duplex(4096);
    let conn = Connection::new(ClientConfig::default());
    drop(server_stream);

    let err = conn.open_with_stream(client).await.unwrap_err();
    assert!(matches!(err, VoltError::Connect(_)), "got {err:?}");
    assert!(!conn.is_open());
}

#[tokio::test]
async fn test_connect_malformed_address() {
    let err = Connection::connect("not-an-address").await.unwrap_err();
    assert_eq!(err, VoltError::Resolve("not-an-address".to_string()));
}

#[tokio::test]
async fn test_connect_refused() {
    init_tracing();
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = Connection::connect(&addr.to_string()).await.unwrap_err();
    assert!(matches!(err, VoltError::Connect(_)), "got {err:?}");
}

#[tokio::test]
async fn test_open_twice_is_rejected() {
    let ctx = TestContext::new().await;
    let (client, _server_stream) = tokio::io::duplex(4096);
    let err = ctx.conn.open_with_stream(client).await.unwrap_err();
    assert_eq!(err, VoltError::AlreadyOpen);
    assert!(ctx.conn.is_open());
}

// ===== Close =====

#[tokio::test]
async fn test_close_twice_is_a_noop() {
    let ctx = TestContext::new().await;
    assert!(ctx.conn.close().await.is_ok());
    assert!(!ctx.conn.is_open());
    assert!(ctx.conn.close().await.is_ok());
    assert!(!ctx.conn.is_open());
}

#[tokio::test]
async fn test_close_unopened_connection() {
    let conn = Connection::new(ClientConfig::default());
    assert!(conn.close().await.is_ok());
    assert!(!conn.is_open());
}

#[tokio::test]
async fn test_open_after_close_is_rejected() {
    let ctx = TestContext::new().await;
    ctx.conn.close().await.unwrap();
    let (client, _server_stream) = tokio::io::duplex(4096);
    let err = ctx.conn.open_with_stream(client).await.unwrap_err();
    assert_eq!(err, VoltError::ClosedConnection);
}

#[tokio::test]
async fn test_close_releases_the_stream() {
    let mut ctx = TestContext::new().await;
    ctx.conn.close().await.unwrap();

    // The server sees end of stream once the client shuts its side down.
    let next = tokio::time::timeout(Duration::from_secs(2), ctx.server.next_frame()).await;
    assert!(matches!(next, Ok(None)));
}

#[tokio::test]
async fn test_close_resolves_outstanding_statements() {
    let mut ctx = TestContext::new().await;
    let pending = ctx.conn.prepare("Select").unwrap().query(Vec::new()).await.unwrap();
    ctx.server.next_invocation().await;

    ctx.conn.close().await.unwrap();

    let result = tokio::time::timeout(Duration::from_secs(2), pending.wait())
        .await
        .expect("pending query hung after close");
    assert_eq!(result.unwrap_err(), VoltError::ChannelClosed);
}

#[tokio::test]
async fn test_server_hangup_closes_connection() {
    let ctx = TestContext::new().await;
    let TestContext { conn, server, .. } = ctx;
    drop(server);

    tokio::time::timeout(Duration::from_secs(2), async {
        while conn.is_open() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("connection still open after the server hung up");

    assert!(conn.session_info().is_none());
    assert_eq!(conn.prepare("Select").unwrap_err(), VoltError::ClosedConnection);
    let (_tx, query) = query_channel(1);
    assert_eq!(
        conn.register_query(1, query).unwrap_err(),
        VoltError::ClosedConnection
    );
    assert_eq!(conn.outstanding_queries(), 0);

    // A lost session cannot be reopened, but can still be closed.
    let (client, _server_stream) = tokio::io::duplex(4096);
    assert_eq!(
        conn.open_with_stream(client).await.unwrap_err(),
        VoltError::ClosedConnection
    );
    let _ = conn.close().await;
    assert!(!conn.is_open());
}

// ===== Operations while not open =====

#[tokio::test]
async fn test_operations_before_open_fail() {
    let conn = Connection::new(ClientConfig::default());
    let (_tx, query) = query_channel(1);

    assert_eq!(conn.prepare("Select").unwrap_err(), VoltError::ClosedConnection);
    assert_eq!(
        conn.prepare_adhoc("SELECT 1").unwrap_err(),
        VoltError::ClosedConnection
    );
    assert_eq!(
        conn.register_query(1, query).unwrap_err(),
        VoltError::ClosedConnection
    );
    assert_eq!(conn.remove_query(1).unwrap_err(), VoltError::ClosedConnection);
    assert_eq!(conn.outstanding_queries(), 0);
    assert_eq!(conn.outstanding_execs(), 0);
}

#[tokio::test]
async fn test_operations_after_close_fail_without_side_effects() {
    let ctx = TestContext::new().await;
    let (_tx, kept) = query_channel(10);
    ctx.conn.register_query(10, kept).unwrap();
    let statement = ctx.conn.prepare("Select").unwrap();

    ctx.conn.close().await.unwrap();

    let (_tx, late) = query_channel(11);
    assert_eq!(
        ctx.conn.register_query(11, late).unwrap_err(),
        VoltError::ClosedConnection
    );
    assert_eq!(
        ctx.conn.remove_query(10).unwrap_err(),
        VoltError::ClosedConnection
    );
    assert_eq!(
        statement.query(Vec::new()).await.unwrap_err(),
        VoltError::ClosedConnection
    );
    assert_eq!(ctx.conn.prepare("Select").unwrap_err(), VoltError::ClosedConnection);

    // Only the registration made while open is present.
    assert_eq!(ctx.conn.outstanding_queries(), 1);
}
