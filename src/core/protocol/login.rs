// src/core/protocol/login.rs

//! The one-time login exchange: the client sends its identity and the server
//! answers with the identifiers of the new session.

use super::wire::{self, PROTOCOL_VERSION};
use crate::core::VoltError;
use bytes::{BufMut, Bytes, BytesMut};
use sha1::{Digest, Sha1};

/// The service name every client login targets.
pub const DATABASE_SERVICE: &str = "database";

/// Auth code the server uses to accept a login.
pub const AUTH_SUCCESS: u8 = 0;

const PASSWORD_HASH_LEN: usize = 20;

/// The values returned by a successful login. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    /// The id of the node that accepted this connection.
    pub server_node_id: i32,
    /// The server-assigned id of this session.
    pub session_id: i64,
    /// The address of the cluster leader, as the server encodes it.
    pub leader_node_id: i32,
    /// The server's build string.
    pub build_tag: String,
}

/// A login request carrying the client's credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginRequest {
    pub service: String,
    pub username: String,
    pub password_hash: [u8; PASSWORD_HASH_LEN],
}

impl LoginRequest {
    /// Builds a login for the database service, hashing the password with SHA-1.
    pub fn new(username: &str, password: &str) -> Self {
        let digest = Sha1::digest(password.as_bytes());
        let mut password_hash = [0u8; PASSWORD_HASH_LEN];
        password_hash.copy_from_slice(&digest);
        Self {
            service: DATABASE_SERVICE.to_string(),
            username: username.to_string(),
            password_hash,
        }
    }

    pub fn encode(&self) -> Bytes {
        let mut dst = BytesMut::with_capacity(
            1 + 8 + self.service.len() + self.username.len() + PASSWORD_HASH_LEN,
        );
        dst.put_u8(PROTOCOL_VERSION);
        wire::put_string(&mut dst, &self.service);
        wire::put_string(&mut dst, &self.username);
        dst.extend_from_slice(&self.password_hash);
        dst.freeze()
    }

    pub fn decode(mut payload: Bytes) -> Result<Self, VoltError> {
        let buf = &mut payload;
        let _version = wire::get_u8(buf, "login version")?;
        let service = wire::get_string(buf, "service")?.unwrap_or_default();
        let username = wire::get_string(buf, "username")?.unwrap_or_default();
        if buf.len() < PASSWORD_HASH_LEN {
            return Err(VoltError::Protocol("truncated password hash".to_string()));
        }
        let mut password_hash = [0u8; PASSWORD_HASH_LEN];
        password_hash.copy_from_slice(&buf[..PASSWORD_HASH_LEN]);
        Ok(Self {
            service,
            username,
            password_hash,
        })
    }
}

/// The server's answer to a `LoginRequest`.
#[derive(Debug, Clone, PartialEq)]
pub enum LoginResponse {
    Accepted {
        info: SessionInfo,
        cluster_start_ms: i64,
    },
    Rejected(u8),
}

impl LoginResponse {
    /// Decodes the fixed-shape login reply.
    pub fn decode(mut payload: Bytes) -> Result<Self, VoltError> {
        let buf = &mut payload;
        let _version = wire::get_u8(buf, "login response version")?;
        let auth_code = wire::get_u8(buf, "auth code")?;
        if auth_code != AUTH_SUCCESS {
            return Ok(LoginResponse::Rejected(auth_code));
        }

        let server_node_id = wire::get_i32(buf, "host id")?;
        let session_id = wire::get_i64(buf, "connection id")?;
        let cluster_start_ms = wire::get_i64(buf, "cluster start timestamp")?;
        let leader_node_id = wire::get_i32(buf, "leader address")?;
        let build_tag = wire::get_string(buf, "build string")?.unwrap_or_default();

        Ok(LoginResponse::Accepted {
            info: SessionInfo {
                server_node_id,
                session_id,
                leader_node_id,
                build_tag,
            },
            cluster_start_ms,
        })
    }

    pub fn encode(&self) -> Bytes {
        let mut dst = BytesMut::new();
        dst.put_u8(PROTOCOL_VERSION);
        match self {
            LoginResponse::Accepted {
                info,
                cluster_start_ms,
            } => {
                dst.put_u8(AUTH_SUCCESS);
                dst.put_i32(info.server_node_id);
                dst.put_i64(info.session_id);
                dst.put_i64(*cluster_start_ms);
                dst.put_i32(info.leader_node_id);
                wire::put_string(&mut dst, &info.build_tag);
            }
            LoginResponse::Rejected(code) => dst.put_u8(*code),
        }
        dst.freeze()
    }

    /// Turns the reply into the session identifiers, or the auth failure.
    pub fn into_session_info(self) -> Result<SessionInfo, VoltError> {
        match self {
            LoginResponse::Accepted { info, .. } => Ok(info),
            LoginResponse::Rejected(code) => Err(VoltError::AuthenticationFailed(code)),
        }
    }
}
