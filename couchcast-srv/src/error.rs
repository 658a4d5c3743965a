//! Error types for couchcast-srv
//!
//! Defines the session-manager error kinds using thiserror. Capability
//! absence (pause/seek not supported by the receiver) is not an error kind:
//! those operations degrade to silent no-ops so polling callers keep working.

use thiserror::Error;

/// Errors raised by the cast session manager and receiver client
#[derive(Error, Debug)]
pub enum CastError {
    /// Named receiver was not found during discovery
    #[error("receiver not found: {0}")]
    Discovery(String),

    /// Receiver did not reach a ready state within the connect timeout
    #[error("timed out connecting to receiver: {0}")]
    ConnectionTimeout(String),

    /// Operation requires a bound media channel (call connect first)
    #[error("no receiver connected: {0}")]
    Precondition(String),

    /// Caller-supplied argument was invalid
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Failure reported by the external receiver client
    #[error("receiver error: {0}")]
    Receiver(String),
}

/// Convenience Result type for cast operations
pub type Result<T> = std::result::Result<T, CastError>;
