//! Error types for beeline.

use std::sync::Arc;
use thiserror::Error;

/// Main error type for all beeline transport operations.
///
/// The type is `Clone` because a single fatal connection error has to be
/// delivered to every promise still pending on the session when the read
/// loop dies; I/O errors are therefore held behind an `Arc`.
#[derive(Debug, Clone, Error)]
pub enum BeelineError {
    /// I/O error on the underlying socket.
    #[error("I/O error: {0}")]
    Io(#[source] Arc<std::io::Error>),

    /// Connection establishment or handshake failure during open.
    #[error("connect failed: {0}")]
    Connect(String),

    /// Operation attempted on a closed or failed session.
    #[error("not connected")]
    NotConnected,

    /// A wait (or the connect exchange) exceeded its configured bound.
    #[error("operation timed out")]
    Timeout,

    /// Malformed or truncated frame on the wire.
    #[error("framing error: {0}")]
    Framing(String),

    /// Payload failed decoder validation or parse after being matched.
    #[error("decode error: {0}")]
    Decode(String),

    /// The peer closed the connection.
    #[error("connection closed")]
    ConnectionClosed,
}

impl From<std::io::Error> for BeelineError {
    fn from(err: std::io::Error) -> Self {
        BeelineError::Io(Arc::new(err))
    }
}

/// Result type alias using BeelineError.
pub type Result<T> = std::result::Result<T, BeelineError>;
