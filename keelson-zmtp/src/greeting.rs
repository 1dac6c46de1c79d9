//! Greeting exchange and revision detection.
//!
//! Layout (12 bytes):
//! ```text
//! [0]      0xFF
//! [1..9]   identity length + 1 (u64 BE)
//! [9]      0x7F
//! [10]     Revision
//! [11]     Socket type
//! ```
//!
//! The first 10 bytes double as the header of a legacy identity frame in
//! its long form, so a peer that predates versioning reads them as the
//! start of our identity message. The last 2 bytes are only sent once the
//! peer has proven it is versioned too.

use crate::codec::Revision;
use bytes::Bytes;
use keelson_core::options::SocketOptions;
use tracing::debug;

/// Full greeting length
pub const GREETING_SIZE: usize = 12;

/// Part of the greeting sent unconditionally
pub const SIGNATURE_SIZE: usize = 10;

const SIGNATURE_HEAD: u8 = 0xFF;
const SIGNATURE_TAIL: u8 = 0x7F;

/// Result of the greeting exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Negotiated {
    /// Peer predates versioning. `prebuffered` is what was read so far and
    /// belongs to the peer's first legacy frame.
    Versionless { prebuffered: Bytes },

    /// Peer sent a full greeting.
    Versioned { revision: Revision, peer_role: u8 },
}

impl Negotiated {
    /// Framing revision to use for this peer.
    pub const fn revision(&self) -> Revision {
        match self {
            Self::Versionless { .. } => Revision::V1,
            Self::Versioned { revision, .. } => *revision,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tail {
    NotYet,
    Pending,
    Sent,
}

/// Sans-IO greeting state machine.
///
/// Feed it whatever the transport produced, one byte at a time if need be;
/// it never asks for more than the greeting itself.
#[derive(Debug)]
pub struct HandshakeNegotiator {
    signature: [u8; SIGNATURE_SIZE],
    tail: [u8; 2],
    received: [u8; GREETING_SIZE],
    len: usize,
    tail_state: Tail,
    done: bool,
}

impl HandshakeNegotiator {
    pub fn new(options: &SocketOptions) -> Self {
        let mut signature = [0u8; SIGNATURE_SIZE];
        signature[0] = SIGNATURE_HEAD;
        signature[1..9].copy_from_slice(&(options.identity.len() as u64 + 1).to_be_bytes());
        signature[9] = SIGNATURE_TAIL;

        Self {
            signature,
            tail: [Revision::ANNOUNCED, options.socket_type.as_u8()],
            received: [0; GREETING_SIZE],
            len: 0,
            tail_state: Tail::NotYet,
            done: false,
        }
    }

    /// The 10 bytes sent as soon as the connection is up.
    pub fn signature(&self) -> [u8; SIGNATURE_SIZE] {
        self.signature
    }

    /// Space for the next transport read. Never larger than what is left of
    /// the peer's greeting.
    pub fn unfilled(&mut self) -> &mut [u8] {
        &mut self.received[self.len..]
    }

    /// Greeting bytes received so far.
    pub fn received_bytes(&self) -> &[u8] {
        &self.received[..self.len]
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Record `n` bytes written into [`unfilled`](Self::unfilled).
    pub fn received(&mut self, n: usize) -> Option<Negotiated> {
        debug_assert!(!self.done);
        self.len = (self.len + n).min(GREETING_SIZE);
        self.evaluate()
    }

    /// Copy from `input` and evaluate. Returns the bytes consumed.
    pub fn feed(&mut self, input: &[u8]) -> (usize, Option<Negotiated>) {
        let dst = self.unfilled();
        let n = dst.len().min(input.len());
        dst[..n].copy_from_slice(&input[..n]);
        (n, self.received(n))
    }

    /// The 2-byte tail, once the peer looks versioned. Returned at most once.
    pub fn take_pending_tail(&mut self) -> Option<[u8; 2]> {
        if self.tail_state == Tail::Pending {
            self.tail_state = Tail::Sent;
            Some(self.tail)
        } else {
            None
        }
    }

    fn evaluate(&mut self) -> Option<Negotiated> {
        if self.len == 0 {
            return None;
        }

        // Any first byte but 0xFF is a legacy short length.
        if self.received[0] != SIGNATURE_HEAD {
            return Some(self.versionless());
        }
        if self.len < SIGNATURE_SIZE {
            return None;
        }

        // Low bit of byte 9 would be the MORE flag of a legacy identity
        // frame; identities never have MORE, a greeting always does.
        if self.received[9] & 0x01 == 0 {
            return Some(self.versionless());
        }

        if self.tail_state == Tail::NotYet {
            self.tail_state = Tail::Pending;
        }
        if self.len < GREETING_SIZE {
            return None;
        }

        self.done = true;
        let revision = Revision::from_wire(self.received[10]);
        let peer_role = self.received[11];
        debug!(
            "[HANDSHAKE] Peer is versioned (revision byte {}, role {})",
            self.received[10], peer_role
        );
        Some(Negotiated::Versioned { revision, peer_role })
    }

    fn versionless(&mut self) -> Negotiated {
        self.done = true;
        debug!(
            "[HANDSHAKE] Peer is version-less ({} greeting bytes reused as frame data)",
            self.len
        );
        Negotiated::Versionless {
            prebuffered: Bytes::copy_from_slice(&self.received[..self.len]),
        }
    }
}
