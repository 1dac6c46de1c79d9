/// Keelson Error Types
///
/// Errors surfaced to socket users. Wire-level decode failures never reach
/// them: they tear down the connection inside the engine.
use crate::message::Msg;
use std::io;
use thiserror::Error;

/// Main error type for Keelson operations
#[derive(Error, Debug)]
pub enum KeelsonError {
    /// IO error while setting up a transport
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Outbound message addressed to an unknown peer while mandatory
    /// routing is enabled. The rejected part is handed back.
    #[error("Unroutable message: no peer with the requested identity")]
    Unroutable(Msg),
}

/// Result type alias for Keelson operations
pub type Result<T> = std::result::Result<T, KeelsonError>;

impl KeelsonError {
    /// Check if this error is recoverable
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
            ),
            Self::Unroutable(_) => true,
        }
    }

    /// Recover the message carried by an `Unroutable` error.
    #[must_use]
    pub fn into_msg(self) -> Option<Msg> {
        match self {
            Self::Unroutable(msg) => Some(msg),
            Self::Io(_) => None,
        }
    }
}
