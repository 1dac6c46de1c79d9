//! ROUTER socket.
//!
//! Turns a pool of pipes into identity-addressed peers:
//!
//! - inbound: every message is prefixed with the identity of the pipe it
//!   came from, pipes are served round-robin
//! - outbound: the first frame names the peer, the remaining frames go to
//!   that peer only
//!
//! A pipe becomes a peer once its first message (the peer identity, as
//! delivered by the engine) has been read. Until then it is anonymous and
//! neither readable nor addressable.

use hashbrown::HashMap;
use keelson_core::error::{KeelsonError, Result};
use keelson_core::fq::FairQueue;
use keelson_core::message::{Identity, Msg};
use keelson_core::options::SocketOptions;
use keelson_core::pipe::{Pipe, PipeId};
use keelson_core::router::{IdentityGenerator, RouterTable};
use tracing::{debug, trace, warn};

/// Why a pipe is not routable yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Anonymous {
    /// Identity not received yet.
    Pending,
    /// Announced an identity already in use. Never retried.
    Rejected,
}

enum Identified {
    Yes,
    NotYet,
    Rejected,
}

/// Identity-routing socket over a set of pipes.
pub struct RouterSocket<P> {
    pipes: HashMap<PipeId, P>,
    anonymous: HashMap<PipeId, Anonymous>,
    table: RouterTable,
    fq: FairQueue,
    ids: IdentityGenerator,

    // outbound
    current_out: Option<PipeId>,
    more_out: bool,

    // inbound
    current_in: Option<PipeId>,
    more_in: bool,
    prefetched_id: Option<Msg>,
    prefetched_msg: Option<Msg>,

    mandatory: bool,
}

impl<P: Pipe> RouterSocket<P> {
    pub fn new(options: &SocketOptions) -> Self {
        Self::with_generator(options, IdentityGenerator::new())
    }

    /// Use `ids` for synthetic peer identities.
    pub fn with_generator(options: &SocketOptions, ids: IdentityGenerator) -> Self {
        Self {
            pipes: HashMap::new(),
            anonymous: HashMap::new(),
            table: RouterTable::new(),
            fq: FairQueue::new(),
            ids,
            current_out: None,
            more_out: false,
            current_in: None,
            more_in: false,
            prefetched_id: None,
            prefetched_msg: None,
            mandatory: options.router_mandatory,
        }
    }

    /// Switch mandatory routing on or off.
    pub fn set_router_mandatory(&mut self, enabled: bool) {
        self.mandatory = enabled;
    }

    /// Take ownership of a new pipe and try to identify it.
    pub fn attach(&mut self, pipe: P) -> PipeId {
        let id = pipe.id();
        self.pipes.insert(id, pipe);

        match self.identify(id) {
            Identified::Yes => self.fq.attach(id),
            Identified::NotYet => {
                self.anonymous.insert(id, Anonymous::Pending);
            }
            Identified::Rejected => {
                self.anonymous.insert(id, Anonymous::Rejected);
            }
        }
        id
    }

    /// Remove a pipe, wherever it is, and hand it back.
    pub fn detach(&mut self, pipe: PipeId) -> Option<P> {
        if self.anonymous.remove(&pipe).is_none() {
            if let Some(identity) = self.table.remove_pipe(pipe) {
                debug!("[ROUTER] peer {:?} detached ({})", identity, pipe);
            }
            self.fq.terminated(pipe);
        }

        if self.current_out == Some(pipe) {
            self.current_out = None;
        }
        if self.current_in == Some(pipe) {
            // Drop the rest of its message; the next frame starts a new one.
            self.current_in = None;
            self.more_in = false;
            self.prefetched_id = None;
            self.prefetched_msg = None;
        }
        self.pipes.remove(&pipe)
    }

    /// `pipe` has messages to read.
    pub fn read_activated(&mut self, pipe: PipeId) {
        match self.anonymous.get(&pipe) {
            None => self.fq.activated(pipe),
            Some(Anonymous::Rejected) => {}
            Some(Anonymous::Pending) => match self.identify(pipe) {
                Identified::Yes => {
                    self.anonymous.remove(&pipe);
                    self.fq.attach(pipe);
                }
                Identified::NotYet => {}
                Identified::Rejected => {
                    self.anonymous.insert(pipe, Anonymous::Rejected);
                }
            },
        }
    }

    /// `pipe` accepts writes again.
    pub fn write_activated(&mut self, pipe: PipeId) {
        if !self.table.activate(pipe) {
            trace!("[ROUTER] write activation for unknown {}", pipe);
        }
    }

    /// Send one frame.
    ///
    /// The first frame of a message is the peer identity and must carry
    /// MORE; the rest are delivered to that peer. With mandatory routing an
    /// unknown identity is returned as [`KeelsonError::Unroutable`].
    pub fn send(&mut self, msg: Msg) -> Result<()> {
        if !self.more_out {
            debug_assert!(self.current_out.is_none());

            // An identity frame without a body is ignored.
            if !msg.has_more() {
                return Ok(());
            }
            self.more_out = true;

            let identity = Identity::new(msg.data().clone());
            match self.table.route(&identity).copied() {
                Some(route) => {
                    let writable = self
                        .pipes
                        .get_mut(&route.pipe)
                        .is_some_and(|p| p.check_write());
                    if writable {
                        self.current_out = Some(route.pipe);
                    } else {
                        trace!("[ROUTER] peer {:?} not writable, dropping", identity);
                        self.table.deactivate(&identity);
                    }
                }
                None if self.mandatory => {
                    self.more_out = false;
                    debug!("[ROUTER] unroutable identity {:?}", identity);
                    return Err(KeelsonError::Unroutable(msg));
                }
                None => {
                    trace!("[ROUTER] unknown peer {:?}, dropping", identity);
                }
            }
            return Ok(());
        }

        self.more_out = msg.has_more();

        let Some(target) = self.current_out else {
            // No target: the rest of the message is dropped.
            return Ok(());
        };
        let Some(pipe) = self.pipes.get_mut(&target) else {
            self.current_out = None;
            return Ok(());
        };

        if pipe.write(msg).is_err() {
            // Never leave half a message staged.
            trace!("[ROUTER] {} refused a frame, rolling back", target);
            pipe.rollback();
            self.current_out = None;
            return Ok(());
        }

        if !self.more_out {
            pipe.flush();
            self.current_out = None;
        }
        Ok(())
    }

    /// Next frame: the sender identity, then the message parts.
    pub fn recv(&mut self) -> Option<Msg> {
        if let Some(id) = self.prefetched_id.take() {
            self.more_in = true;
            return Some(id);
        }
        if let Some(msg) = self.prefetched_msg.take() {
            self.more_in = msg.has_more();
            return Some(msg);
        }

        let (pipe, msg) = self.fetch()?;

        if self.more_in {
            self.more_in = msg.has_more();
            return Some(msg);
        }

        // First part of a message: hand out the identity, keep the part.
        let identity = self.pipes.get(&pipe)?.identity().to_msg();
        self.prefetched_msg = Some(msg);
        self.more_in = true;
        Some(identity)
    }

    /// Whether `recv` would return a frame.
    pub fn has_in(&mut self) -> bool {
        if self.more_in || self.prefetched_id.is_some() || self.prefetched_msg.is_some() {
            return true;
        }

        let Some((pipe, msg)) = self.fetch() else {
            return false;
        };
        let Some(identity) = self.pipes.get(&pipe).map(|p| p.identity().to_msg()) else {
            return false;
        };
        self.prefetched_id = Some(identity);
        self.prefetched_msg = Some(msg);
        true
    }

    /// A ROUTER can always send; unroutable frames are dropped.
    pub fn has_out(&self) -> bool {
        true
    }

    /// Discard what was written of the current message.
    pub fn rollback(&mut self) {
        if let Some(target) = self.current_out.take() {
            if let Some(pipe) = self.pipes.get_mut(&target) {
                pipe.rollback();
            }
        }
        self.more_out = false;
    }

    pub fn pipe(&self, id: PipeId) -> Option<&P> {
        self.pipes.get(&id)
    }

    pub fn pipe_mut(&mut self, id: PipeId) -> Option<&mut P> {
        self.pipes.get_mut(&id)
    }

    /// Whether `pipe` is attached but not routable.
    pub fn is_anonymous(&self, pipe: PipeId) -> bool {
        self.anonymous.contains_key(&pipe)
    }

    /// Number of identified peers.
    pub fn peer_count(&self) -> usize {
        self.table.len()
    }

    pub fn identity_of(&self, pipe: PipeId) -> Option<&Identity> {
        self.table.identity_of(pipe)
    }

    fn fetch(&mut self) -> Option<(PipeId, Msg)> {
        let pipes = &mut self.pipes;
        let (pipe, msg) = self
            .fq
            .recv(|id| pipes.get_mut(&id).and_then(|pipe| pipe.read()))?;
        self.current_in = Some(pipe);
        Some((pipe, msg))
    }

    fn identify(&mut self, id: PipeId) -> Identified {
        let Some(pipe) = self.pipes.get_mut(&id) else {
            return Identified::NotYet;
        };
        let Some(msg) = pipe.read() else {
            return Identified::NotYet;
        };

        let identity = if msg.is_empty() {
            let table = &self.table;
            self.ids.generate(|candidate| table.contains(candidate))
        } else {
            let identity = Identity::new(msg.into_bytes());
            if self.table.contains(&identity) {
                warn!("[ROUTER] duplicate identity {:?} on {}, rejecting", identity, id);
                return Identified::Rejected;
            }
            identity
        };

        debug!("[ROUTER] {} identified as {:?}", id, identity);
        pipe.set_identity(identity.clone());
        self.table.insert(identity, id);
        Identified::Yes
    }
}

impl<P> std::fmt::Debug for RouterSocket<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouterSocket")
            .field("pipes", &self.pipes.len())
            .field("anonymous", &self.anonymous.len())
            .field("peers", &self.table.len())
            .field("more_out", &self.more_out)
            .field("more_in", &self.more_in)
            .finish()
    }
}
