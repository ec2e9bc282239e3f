// src/core/protocol/mod.rs

pub mod frame;
pub mod invocation;
pub mod login;
pub mod response;
pub mod wire;

pub use frame::{MAX_FRAME_SIZE, VoltFrameCodec};
pub use invocation::{Invocation, Param};
pub use login::{LoginRequest, LoginResponse, SessionInfo};
pub use response::{InvocationResponse, status};
