//! Client side of the Debug Adapter Protocol.
//!
//! Only what is needed to attach to a running adapter and issue inspection requests:
//! message framing, a TCP/stdio transport, a request/response client with an event channel
//! and an optional traffic tracer.

pub mod client;
pub mod protocol;
pub mod tracer;
pub mod transport;

pub use client::{ClientEvent, DapClient, PendingResponse};
pub use transport::Transport;

#[derive(Debug, thiserror::Error)]
pub enum DapError {
    #[error(transparent)]
    IO(#[from] std::io::Error),
    #[error("malformed DAP message: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid Content-Length header: {0}")]
    BadContentLength(String),
    #[error("missing Content-Length header")]
    MissingContentLength,
    #[error("DAP connection closed")]
    Closed,
}
