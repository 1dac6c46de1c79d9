//! Bidirectional message pipes.
//!
//! A pipe connects a socket to one peer. Sockets only see the [`Pipe`]
//! trait; [`InprocPipe`] is the in-process implementation built on a pair of
//! `flume` channels, used to wire engines and sockets together without a
//! kernel round-trip.
//!
//! Writes are staged locally until [`Pipe::flush`], so a partially written
//! multi-part message can be discarded with [`Pipe::rollback`] and the peer
//! never sees half a message.

use crate::message::{Identity, Msg};
use flume::{Receiver, Sender, TryRecvError};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

static PIPE_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Process-unique pipe handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PipeId(u64);

impl PipeId {
    /// Allocate a fresh id.
    pub fn next() -> Self {
        Self(PIPE_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    #[inline]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for PipeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "pipe#{}", self.0)
    }
}

/// Flow-controlled channel to a single peer.
pub trait Pipe {
    fn id(&self) -> PipeId;

    /// Next inbound message, `None` when nothing is queued.
    fn read(&mut self) -> Option<Msg>;

    /// Whether a write would currently be accepted.
    fn check_write(&mut self) -> bool;

    /// Stage a message. A refused message is handed back.
    fn write(&mut self, msg: Msg) -> Result<(), Msg>;

    /// Publish staged messages to the peer.
    fn flush(&mut self);

    /// Discard staged messages.
    fn rollback(&mut self);

    fn identity(&self) -> &Identity;

    fn set_identity(&mut self, identity: Identity);
}

/// One end of an in-process pipe.
#[derive(Debug)]
pub struct InprocPipe {
    id: PipeId,
    tx: Sender<Msg>,
    rx: Receiver<Msg>,
    staged: Vec<Msg>,
    hwm: usize,
    identity: Identity,
}

/// Create both ends of an in-process pipe.
///
/// `hwm` bounds the number of unread messages each direction may hold,
/// counting staged ones. `0` means unlimited.
pub fn pair(hwm: usize) -> (InprocPipe, InprocPipe) {
    let (a_tx, b_rx) = flume::unbounded();
    let (b_tx, a_rx) = flume::unbounded();
    (
        InprocPipe::from_channels(a_tx, a_rx, hwm),
        InprocPipe::from_channels(b_tx, b_rx, hwm),
    )
}

impl InprocPipe {
    fn from_channels(tx: Sender<Msg>, rx: Receiver<Msg>, hwm: usize) -> Self {
        Self {
            id: PipeId::next(),
            tx,
            rx,
            staged: Vec::new(),
            hwm,
            identity: Identity::default(),
        }
    }

    /// The peer end is gone and everything it sent has been read.
    pub fn is_closed(&self) -> bool {
        self.rx.is_disconnected() && self.rx.is_empty()
    }

    /// The peer end is gone; writes can no longer be delivered.
    pub fn is_peer_gone(&self) -> bool {
        self.tx.is_disconnected()
    }

    /// Messages waiting to be read on this end.
    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    /// Messages staged but not flushed.
    pub fn staged(&self) -> usize {
        self.staged.len()
    }
}

impl Pipe for InprocPipe {
    #[inline]
    fn id(&self) -> PipeId {
        self.id
    }

    fn read(&mut self) -> Option<Msg> {
        match self.rx.try_recv() {
            Ok(msg) => Some(msg),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    fn check_write(&mut self) -> bool {
        if self.tx.is_disconnected() {
            return false;
        }
        self.hwm == 0 || self.tx.len() + self.staged.len() < self.hwm
    }

    fn write(&mut self, msg: Msg) -> Result<(), Msg> {
        if !self.check_write() {
            return Err(msg);
        }
        self.staged.push(msg);
        Ok(())
    }

    fn flush(&mut self) {
        for msg in self.staged.drain(..) {
            if self.tx.send(msg).is_err() {
                trace!("{} peer gone, dropping staged messages", self.id);
                break;
            }
        }
        self.staged.clear();
    }

    fn rollback(&mut self) {
        if !self.staged.is_empty() {
            trace!("{} rolled back {} staged messages", self.id, self.staged.len());
        }
        self.staged.clear();
    }

    #[inline]
    fn identity(&self) -> &Identity {
        &self.identity
    }

    fn set_identity(&mut self, identity: Identity) {
        self.identity = identity;
    }
}
