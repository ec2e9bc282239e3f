// src/core/mod.rs

//! Protocol types and the error type shared by the whole driver.

pub mod errors;
pub mod protocol;

pub use errors::VoltError;
pub use protocol::SessionInfo;
