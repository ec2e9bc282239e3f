// src/connection/transport.rs

//! Owns the raw byte stream of a session: dialing, the login handshake, and the
//! shared writer that every dispatcher sends frames through.

use crate::core::VoltError;
use crate::core::protocol::{LoginRequest, LoginResponse, SessionInfo, VoltFrameCodec};
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::debug;

/// The read side of a session, handed to the response listener.
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
/// The write side of a session, owned by the `Transport`.
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

pub type FrameReader = FramedRead<BoxedReader, VoltFrameCodec>;
type FrameWriter = FramedWrite<BoxedWriter, VoltFrameCodec>;

/// Resolves `address` (`host:port`) to the first socket address it names.
pub async fn resolve(address: &str) -> Result<SocketAddr, VoltError> {
    let mut addrs = tokio::net::lookup_host(address)
        .await
        .map_err(|_| VoltError::Resolve(address.to_string()))?;
    addrs
        .next()
        .ok_or_else(|| VoltError::Resolve(address.to_string()))
}

/// Resolves and dials `address`.
pub async fn dial(address: &str) -> Result<TcpStream, VoltError> {
    let addr = resolve(address).await?;
    let stream = TcpStream::connect(addr)
        .await
        .map_err(|e| VoltError::Connect(format!("{address}: {e}")))?;
    // Requests are small and latency bound.
    stream
        .set_nodelay(true)
        .map_err(|e| VoltError::Connect(format!("{address}: failed to set TCP_NODELAY: {e}")))?;
    Ok(stream)
}

/// The writer endpoint of an open session.
///
/// Frames are written while holding an async mutex, so bytes of distinct
/// requests never interleave on the wire. Once closed the writer is gone and
/// every send fails with `ClosedConnection`.
pub struct Transport {
    writer: Mutex<Option<FrameWriter>>,
}

/// Everything a successful login produces.
pub struct Handshake {
    pub info: SessionInfo,
    pub transport: Transport,
    pub reader: FrameReader,
}

impl Transport {
    /// Performs the login exchange over `stream`.
    ///
    /// Any I/O failure while writing the login or reading its reply is reported
    /// as a connection error; the stream is dropped in that case.
    pub async fn handshake<S>(stream: S, login: &LoginRequest) -> Result<Handshake, VoltError>
    where
        S: AsyncRead + AsyncWrite + Send + Unpin + 'static,
    {
        let (read_half, write_half) = tokio::io::split(stream);
        let mut reader: FrameReader =
            FramedRead::new(Box::new(read_half) as BoxedReader, VoltFrameCodec);
        let mut writer: FrameWriter =
            FramedWrite::new(Box::new(write_half) as BoxedWriter, VoltFrameCodec);

        writer
            .send(login.encode())
            .await
            .map_err(|e| VoltError::Connect(format!("failed to send login: {e}")))?;
        debug!(username = %login.username, "Login message sent");

        let reply = match reader.next().await {
            Some(Ok(frame)) => frame,
            Some(Err(e)) => {
                return Err(VoltError::Connect(format!(
                    "failed to read login response: {e}"
                )));
            }
            None => {
                return Err(VoltError::Connect(
                    "connection closed by peer during login".to_string(),
                ));
            }
        };
        let info = LoginResponse::decode(reply)?.into_session_info()?;

        Ok(Handshake {
            info,
            transport: Transport {
                writer: Mutex::new(Some(writer)),
            },
            reader,
        })
    }

    /// Writes one complete frame.
    pub async fn send(&self, payload: Bytes) -> Result<(), VoltError> {
        let mut guard = self.writer.lock().await;
        let writer = guard.as_mut().ok_or(VoltError::ClosedConnection)?;
        writer.send(payload).await
    }

    /// Shuts the stream down. Closing an already closed transport is a no-op.
    pub async fn close(&self) -> Result<(), VoltError> {
        let Some(writer) = self.writer.lock().await.take() else {
            return Ok(());
        };
        let mut inner = writer.into_inner();
        inner
            .shutdown()
            .await
            .map_err(|e| VoltError::Close(e.to_string()))
    }

    pub async fn is_closed(&self) -> bool {
        self.writer.lock().await.is_none()
    }
}
