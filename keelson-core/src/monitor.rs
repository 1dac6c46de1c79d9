//! Connection event monitoring.
//!
//! Engines publish lifecycle events on a `flume` channel so an owner can
//! observe handshakes and disconnections without polling engine state.

use std::fmt;

/// Connection lifecycle events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocketEvent {
    /// Greeting exchange finished and a codec was selected.
    HandshakeSucceeded {
        endpoint: String,
        /// Negotiated protocol revision (0 for version-less peers).
        revision: u8,
    },

    /// Connection was torn down.
    Disconnected { endpoint: String, reason: String },
}

impl fmt::Display for SocketEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::HandshakeSucceeded { endpoint, revision } => {
                write!(f, "Handshake succeeded with {endpoint} (revision {revision})")
            }
            Self::Disconnected { endpoint, reason } => {
                write!(f, "Disconnected from {endpoint}: {reason}")
            }
        }
    }
}

/// Handle for receiving connection events.
pub type SocketMonitor = flume::Receiver<SocketEvent>;

/// Sender half handed to engines.
pub type SocketEventSender = flume::Sender<SocketEvent>;

/// Creates a new monitoring channel pair.
#[must_use]
pub fn create_monitor() -> (SocketEventSender, SocketMonitor) {
    flume::unbounded()
}
