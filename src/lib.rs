// src/lib.rs

pub mod config;
pub mod connection;
pub mod core;

/// The driver release, as stamped at build time.
pub const VERSION: &str = env!("VOLTWIRE_BUILD_VERSION");
/// The target triple the driver was built for.
pub const BUILD_TARGET: &str = env!("VOLTWIRE_BUILD_TARGET");

/// A one-line description of this build, e.g. `voltwire 0.3.1 (x86_64-unknown-linux-gnu)`.
pub fn build_info() -> String {
    format!("voltwire {VERSION} ({BUILD_TARGET})")
}

// Re-export
pub use crate::config::ClientConfig;
pub use crate::connection::{Connection, Handle, PendingQuery, Statement};
pub use crate::core::protocol::Param;
pub use crate::core::{SessionInfo, VoltError};
