//! Upstream side of an engine.
//!
//! The engine pushes decoded messages into a [`Session`] and pulls
//! messages to encode from it. A session can refuse a message for now
//! ([`PushError::Busy`]); the engine then keeps it and pauses input until
//! told to resume.

use keelson_core::message::Msg;
use keelson_core::pipe::{InprocPipe, Pipe};
use thiserror::Error;
use tracing::trace;

/// Why a session did not take a message.
#[derive(Debug, Error)]
pub enum PushError {
    /// Flow control. The message is handed back untouched.
    #[error("session is busy")]
    Busy(Msg),

    /// The session is gone; the connection should be torn down.
    #[error("session is closed")]
    Closed,
}

/// Consumer and producer of messages for one connection.
pub trait Session {
    fn push_msg(&mut self, msg: Msg) -> Result<(), PushError>;

    /// Next message to send, `None` when there is nothing queued.
    fn pull_msg(&mut self) -> Option<Msg>;

    /// Make pushed messages visible upstream.
    fn flush(&mut self);

    /// The engine is going away.
    fn detach(&mut self);
}

/// Session backed by one end of an in-process pipe.
///
/// The other end is what a socket (for example a ROUTER) attaches.
#[derive(Debug)]
pub struct PipeSession {
    pipe: Option<InprocPipe>,
}

impl PipeSession {
    pub fn new(pipe: InprocPipe) -> Self {
        Self { pipe: Some(pipe) }
    }

    pub fn is_detached(&self) -> bool {
        self.pipe.is_none()
    }

    pub fn pipe(&self) -> Option<&InprocPipe> {
        self.pipe.as_ref()
    }
}

impl Session for PipeSession {
    fn push_msg(&mut self, msg: Msg) -> Result<(), PushError> {
        let Some(pipe) = self.pipe.as_mut() else {
            return Err(PushError::Closed);
        };
        if pipe.is_peer_gone() {
            return Err(PushError::Closed);
        }
        pipe.write(msg).map_err(PushError::Busy)
    }

    fn pull_msg(&mut self) -> Option<Msg> {
        self.pipe.as_mut()?.read()
    }

    fn flush(&mut self) {
        if let Some(pipe) = self.pipe.as_mut() {
            pipe.flush();
        }
    }

    fn detach(&mut self) {
        if let Some(pipe) = self.pipe.take() {
            trace!("{} detached from engine", pipe.id());
        }
    }
}
