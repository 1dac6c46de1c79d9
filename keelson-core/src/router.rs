//! ROUTER peer registry.
//!
//! - `RouterTable`: identity -> outbound route, plus the reverse pipe index
//! - `IdentityGenerator`: synthetic `[0x00, u32 BE]` identities for peers
//!   that announce an empty one
//!
//! The socket owning these decides when to call the mutations; nothing here
//! touches a pipe.

use crate::message::Identity;
use crate::pipe::PipeId;
use bytes::{BufMut, BytesMut};
use hashbrown::HashMap;

/// A pipe that can be written to, paired with its write-readiness.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutboundRoute {
    pub pipe: PipeId,
    /// Cleared when the pipe refused a write, set again on write activation.
    pub active: bool,
}

/// Identified peers, unique by identity.
#[derive(Debug, Default)]
pub struct RouterTable {
    routes: HashMap<Identity, OutboundRoute>,
    // reverse index for detach and write activation
    by_pipe: HashMap<PipeId, Identity>,
}

impl RouterTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a peer. Returns `false` and leaves the table untouched if the
    /// identity is already taken.
    pub fn insert(&mut self, identity: Identity, pipe: PipeId) -> bool {
        if self.routes.contains_key(&identity) {
            return false;
        }
        self.by_pipe.insert(pipe, identity.clone());
        self.routes.insert(identity, OutboundRoute { pipe, active: true });
        true
    }

    /// Drop the peer behind `pipe`, returning its identity.
    pub fn remove_pipe(&mut self, pipe: PipeId) -> Option<Identity> {
        let identity = self.by_pipe.remove(&pipe)?;
        self.routes.remove(&identity);
        Some(identity)
    }

    #[inline]
    pub fn contains(&self, identity: &Identity) -> bool {
        self.routes.contains_key(identity)
    }

    #[inline]
    pub fn contains_pipe(&self, pipe: PipeId) -> bool {
        self.by_pipe.contains_key(&pipe)
    }

    pub fn route(&self, identity: &Identity) -> Option<&OutboundRoute> {
        self.routes.get(identity)
    }

    pub fn identity_of(&self, pipe: PipeId) -> Option<&Identity> {
        self.by_pipe.get(&pipe)
    }

    /// Mark the route behind `pipe` writable again.
    pub fn activate(&mut self, pipe: PipeId) -> bool {
        let Some(identity) = self.by_pipe.get(&pipe) else {
            return false;
        };
        match self.routes.get_mut(identity) {
            Some(route) => {
                route.active = true;
                true
            }
            None => false,
        }
    }

    /// Mark a route as refusing writes.
    pub fn deactivate(&mut self, identity: &Identity) {
        if let Some(route) = self.routes.get_mut(identity) {
            route.active = false;
        }
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Source of synthetic peer identities.
///
/// A wrapping `u32` counter. The starting value is random unless injected,
/// so identities differ between sockets and runs.
#[derive(Debug, Clone)]
pub struct IdentityGenerator {
    next: u32,
}

impl Default for IdentityGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityGenerator {
    pub fn new() -> Self {
        Self::starting_at(rand::random())
    }

    /// Deterministic generator, for tests and reproducible setups.
    pub const fn starting_at(next: u32) -> Self {
        Self { next }
    }

    /// The next identity for which `in_use` is false.
    pub fn generate<F>(&mut self, in_use: F) -> Identity
    where
        F: Fn(&Identity) -> bool,
    {
        loop {
            let candidate = self.next_candidate();
            if !in_use(&candidate) {
                return candidate;
            }
        }
    }

    fn next_candidate(&mut self) -> Identity {
        let mut buf = BytesMut::with_capacity(5);
        buf.put_u8(0);
        buf.put_u32(self.next);
        self.next = self.next.wrapping_add(1);
        Identity::new(buf.freeze())
    }
}
