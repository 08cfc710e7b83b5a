//! # hive-transport
//!
//! WebSocket transport for the hive signaling service.
//!
//! - **Frame codec** ([`frame`]): one JSON text frame per event,
//!   `{"event": "<name>", "data": <payload>}`
//! - **Session table** ([`session`]): live connections keyed by peer id;
//!   implements the tracker's probe and sink capabilities
//! - **Server** ([`server`]): axum router with the WebSocket endpoint and a
//!   health route
//!
//! ## Connection lifecycle
//!
//! ```text
//! upgrade -> session inserted -> Dispatcher::connect -> read loop
//!         -> session removed  -> Dispatcher::disconnect (purge)
//! ```
//!
//! The session is in the table for the whole time the peer row may be
//! flagged active, so the periodic sweep never purges a connected peer.

pub mod frame;
pub mod server;
pub mod session;

pub use server::{router, serve, AppState, TransportConfig};
pub use session::SessionTable;

/// Error types for frame handling.
#[derive(Debug, thiserror::Error)]
pub enum WireError {
    /// Not valid JSON, or not an event envelope.
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error(transparent)]
    Event(#[from] hive_types::events::EventError),

    #[error("frame of {len} bytes exceeds limit of {max}")]
    Oversized { len: usize, max: usize },

    #[error("binary frames are not supported")]
    Binary,
}

/// Result type alias for frame handling.
pub type Result<T> = std::result::Result<T, WireError>;
