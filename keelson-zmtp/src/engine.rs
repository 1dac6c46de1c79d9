//! Readiness-driven connection engine.
//!
//! Glues one non-blocking byte stream to one [`Session`]:
//!
//! ```text
//!  handle --read--> greeting / decoder --Msg--> session
//!  handle <-write-- output batch <-- encoder <--Msg-- session
//! ```
//!
//! The engine never blocks and never polls. An outer loop delivers
//! `in_event` / `out_event` according to the interest the engine declared
//! through its [`Registrar`], and calls `restart_input` / `restart_output`
//! when the session side has room or data again.
//!
//! Flow:
//! 1. `plug` sends the 10-byte signature and reads speculatively
//! 2. greeting exchange picks the framing revision
//! 3. identities are exchanged as the first message in each direction
//! 4. normal message flow until EOF, an I/O error, a decode error or a
//!    closed session tears the connection down

use crate::codec::{CodecFactory, Decoder, Encoder, Revision, StandardCodecs, ZmtpError};
use crate::config::{COALESCE_THRESHOLD, MAX_IOVECS};
use crate::greeting::{HandshakeNegotiator, Negotiated};
use crate::session::{PushError, Session};
use bytes::{Buf, Bytes, BytesMut};
use keelson_core::message::{Msg, MsgFlags};
use keelson_core::monitor::{SocketEvent, SocketEventSender};
use keelson_core::options::SocketOptions;
use keelson_core::poller::Registrar;
use keelson_core::socket_type::SocketType;
use smallvec::SmallVec;
use std::collections::VecDeque;
use std::io::{self, IoSlice, Read, Write};
use thiserror::Error;
use tracing::{debug, trace, warn};

/// Phony subscription injected for publishers talking to version-less peers.
const SUBSCRIBE_ALL: &[u8] = &[0x01];

/// Why a connection was torn down.
#[derive(Debug, Error)]
pub enum Teardown {
    #[error("peer closed the connection")]
    Closed,

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("decode error: {0}")]
    Decode(#[from] ZmtpError),

    #[error("session rejected a message")]
    SessionRejected,
}

#[inline]
fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
    )
}

/// One connection: handle, codecs and the session they feed.
pub struct ZmtpEngine<H, R, S> {
    handle: Option<H>,
    registrar: R,
    session: Option<S>,
    options: SocketOptions,
    endpoint: String,
    codecs: Box<dyn CodecFactory>,
    monitor: Option<SocketEventSender>,

    negotiator: HandshakeNegotiator,
    handshaking: bool,
    decoder: Option<Box<dyn Decoder>>,
    encoder: Option<Box<dyn Encoder>>,

    // inbound: messages the session has not accepted yet
    pending_in: VecDeque<Msg>,
    congested: bool,
    identity_received: bool,
    subscription_required: bool,

    // outbound batch
    out: VecDeque<Bytes>,
    outsize: usize,
    coalesce: BytesMut,
    tx_initialized: bool,

    plugged: bool,
    terminated: bool,
    teardown: Option<Teardown>,
}

impl<H, R, S> ZmtpEngine<H, R, S>
where
    H: Read + Write,
    R: Registrar,
    S: Session,
{
    /// `handle` must already be in non-blocking mode.
    pub fn new(handle: H, registrar: R, options: SocketOptions, endpoint: impl Into<String>) -> Self {
        let negotiator = HandshakeNegotiator::new(&options);
        Self {
            handle: Some(handle),
            registrar,
            session: None,
            endpoint: endpoint.into(),
            codecs: Box::new(StandardCodecs),
            monitor: None,
            negotiator,
            handshaking: true,
            decoder: None,
            encoder: None,
            pending_in: VecDeque::new(),
            congested: false,
            identity_received: false,
            subscription_required: false,
            out: VecDeque::new(),
            outsize: 0,
            coalesce: BytesMut::with_capacity(options.out_batch_size),
            tx_initialized: false,
            plugged: false,
            terminated: false,
            teardown: None,
            options,
        }
    }

    /// Replace the codec factory used once the greeting is done.
    pub fn with_codecs(mut self, codecs: Box<dyn CodecFactory>) -> Self {
        self.codecs = codecs;
        self
    }

    /// Publish lifecycle events on `monitor`.
    pub fn with_monitor(mut self, monitor: SocketEventSender) -> Self {
        self.monitor = Some(monitor);
        self
    }

    pub fn registrar(&self) -> &R {
        &self.registrar
    }

    pub fn registrar_mut(&mut self) -> &mut R {
        &mut self.registrar
    }

    pub fn handle(&self) -> Option<&H> {
        self.handle.as_ref()
    }

    pub fn handle_mut(&mut self) -> Option<&mut H> {
        self.handle.as_mut()
    }

    pub fn session(&self) -> Option<&S> {
        self.session.as_ref()
    }

    pub fn session_mut(&mut self) -> Option<&mut S> {
        self.session.as_mut()
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn is_handshaking(&self) -> bool {
        self.handshaking
    }

    /// Input is paused because the session refused a message.
    pub fn is_congested(&self) -> bool {
        self.congested
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Why the engine tore itself down, if it did.
    pub fn teardown_reason(&self) -> Option<&Teardown> {
        self.teardown.as_ref()
    }

    /// Framing in use, once negotiated.
    pub fn revision(&self) -> Option<Revision> {
        self.decoder.as_ref().map(|d| d.revision())
    }

    #[inline]
    fn is_live(&self) -> bool {
        self.plugged && !self.terminated
    }

    /// Attach the session and start the greeting exchange.
    pub fn plug(&mut self, session: S) {
        debug_assert!(!self.plugged);
        if self.terminated {
            return;
        }
        self.plugged = true;
        self.session = Some(session);

        self.registrar.register();
        self.registrar.set_poll_in();

        // 'length' and 'flags' of our identity frame, long form.
        let signature = self.negotiator.signature();
        self.queue_out(Bytes::copy_from_slice(&signature));
        self.registrar.set_poll_out();

        debug!("[ENGINE] {} plugged, signature queued", self.endpoint);

        // Data may already be waiting.
        self.in_event();
    }

    /// Detach without notifying the session, returning it to the caller.
    pub fn terminate(&mut self) -> Option<S> {
        if self.terminated {
            return None;
        }
        debug!("[ENGINE] {} terminated", self.endpoint);
        self.unplug();
        self.session.take()
    }

    /// The handle is readable.
    pub fn in_event(&mut self) {
        if !self.is_live() {
            return;
        }

        if self.handshaking {
            match self.handshake() {
                Ok(true) => {}
                Ok(false) => return,
                Err(reason) => return self.error(reason),
            }
        }

        if self.congested {
            return;
        }

        if let Err(reason) = self.read_and_decode() {
            return self.error(reason);
        }

        if let Some(session) = self.session.as_mut() {
            session.flush();
        }
    }

    /// The handle is writable.
    pub fn out_event(&mut self) {
        if !self.is_live() {
            return;
        }

        // Refill only once the previous batch is fully written.
        if self.outsize == 0 {
            if self.encoder.is_none() {
                // Still handshaking, nothing to send until it is done.
                self.registrar.reset_poll_out();
                return;
            }

            self.fill_batch();

            if self.outsize == 0 {
                self.registrar.reset_poll_out();
                return;
            }
        }

        if let Err(err) = self.write_batch() {
            return self.error(Teardown::Io(err));
        }

        if self.handshaking && self.outsize == 0 {
            self.registrar.reset_poll_out();
        }
    }

    /// The session has room again: deliver what was held back and resume
    /// reading.
    pub fn restart_input(&mut self) {
        if !self.is_live() || !self.congested {
            return;
        }

        match self.push_pending() {
            Ok(true) => {}
            Ok(false) => {
                if let Some(session) = self.session.as_mut() {
                    session.flush();
                }
                return;
            }
            Err(reason) => return self.error(reason),
        }

        trace!("[ENGINE] {} input resumed", self.endpoint);
        self.congested = false;
        self.registrar.set_poll_in();

        // Speculative read; pending input is decoded first.
        self.in_event();
    }

    /// The session has messages to send.
    pub fn restart_output(&mut self) {
        if !self.is_live() {
            return;
        }
        self.registrar.set_poll_out();

        // Speculative write: the socket is probably writable right now.
        self.out_event();
    }

    // ---- greeting ---------------------------------------------------------

    /// Returns `Ok(true)` once the greeting is complete.
    fn handshake(&mut self) -> Result<bool, Teardown> {
        loop {
            let Some(handle) = self.handle.as_mut() else {
                return Ok(false);
            };
            let n = match handle.read(self.negotiator.unfilled()) {
                Ok(0) => return Err(Teardown::Closed),
                Ok(n) => n,
                Err(err) if is_transient(&err) => return Ok(false),
                Err(err) => return Err(Teardown::Io(err)),
            };

            let negotiated = self.negotiator.received(n);

            if let Some(tail) = self.negotiator.take_pending_tail() {
                if self.outsize == 0 {
                    self.registrar.set_poll_out();
                }
                self.queue_out(Bytes::copy_from_slice(&tail));
            }

            if let Some(negotiated) = negotiated {
                self.finish_handshake(negotiated)?;
                return Ok(true);
            }
        }
    }

    fn finish_handshake(&mut self, negotiated: Negotiated) -> Result<(), Teardown> {
        let revision = negotiated.revision();
        let mut decoder = self.codecs.decoder(revision, &self.options);
        let mut encoder = self.codecs.encoder(revision, &self.options);

        let revision_byte = match &negotiated {
            Negotiated::Versionless { prebuffered } => {
                // The signature already carried the header of our identity
                // frame. Let the encoder produce it and throw it away.
                let header_size = if self.options.identity.len() + 1 >= 255 { 10 } else { 2 };
                encoder.load_msg(Msg::new(self.options.identity.clone()));
                match encoder.encode(header_size) {
                    Some(header) if header.len() == header_size => {}
                    _ => {
                        return Err(Teardown::Decode(ZmtpError::Protocol(
                            "legacy identity header mismatch",
                        )))
                    }
                }
                self.tx_initialized = true;

                // What was read as greeting is the start of the first frame.
                decoder.prime(prebuffered);

                // Old peers do not forward subscriptions.
                if self.options.socket_type.is_publisher() {
                    self.subscription_required = true;
                }
                0
            }
            Negotiated::Versioned { peer_role, .. } => {
                match SocketType::from_u8(*peer_role) {
                    Some(peer) if !self.options.socket_type.is_compatible(peer) => warn!(
                        "[HANDSHAKE] {} peer {} is not compatible with {}",
                        self.endpoint, peer, self.options.socket_type
                    ),
                    None => warn!(
                        "[HANDSHAKE] {} peer announced unknown socket type {}",
                        self.endpoint, peer_role
                    ),
                    Some(_) => {}
                }
                revision.as_u8()
            }
        };

        self.decoder = Some(decoder);
        self.encoder = Some(encoder);

        if self.outsize == 0 {
            self.registrar.set_poll_out();
        }

        self.handshaking = false;
        debug!("[HANDSHAKE] {} complete, framing {:?}", self.endpoint, revision);

        if let Some(monitor) = &self.monitor {
            let _ = monitor.send(SocketEvent::HandshakeSucceeded {
                endpoint: self.endpoint.clone(),
                revision: revision_byte,
            });
        }
        Ok(())
    }

    // ---- inbound ----------------------------------------------------------

    fn read_and_decode(&mut self) -> Result<(), Teardown> {
        let (Some(handle), Some(decoder)) = (self.handle.as_mut(), self.decoder.as_mut()) else {
            return Ok(());
        };

        if !decoder.has_pending() {
            match handle.read(decoder.read_buf()) {
                Ok(0) => return Err(Teardown::Closed),
                Ok(n) => decoder.filled(n),
                Err(err) if is_transient(&err) => return Ok(()),
                Err(err) => return Err(Teardown::Io(err)),
            }
        }

        loop {
            let decoded = match self.decoder.as_mut() {
                Some(decoder) => decoder.decode()?,
                None => None,
            };
            let Some(msg) = decoded else {
                return Ok(());
            };

            self.accept(msg);

            if !self.push_pending()? {
                trace!("[ENGINE] {} session busy, pausing input", self.endpoint);
                self.congested = true;
                self.registrar.reset_poll_in();
                return Ok(());
            }
        }
    }

    /// Queue a decoded message for the session, handling the identity
    /// exchange on the first one.
    fn accept(&mut self, msg: Msg) {
        if self.identity_received {
            self.pending_in.push_back(msg);
            return;
        }

        self.identity_received = true;
        if self.options.recv_identity {
            let mut msg = msg;
            msg.set_flags(MsgFlags::IDENTITY);
            self.pending_in.push_back(msg);
        } else {
            trace!("[ENGINE] {} dropping peer identity", self.endpoint);
        }

        if self.subscription_required {
            self.subscription_required = false;
            self.pending_in
                .push_back(Msg::new(Bytes::from_static(SUBSCRIBE_ALL)));
        }
    }

    /// Hand queued messages to the session. `Ok(false)` when it is busy.
    fn push_pending(&mut self) -> Result<bool, Teardown> {
        let Some(session) = self.session.as_mut() else {
            return Err(Teardown::SessionRejected);
        };
        while let Some(msg) = self.pending_in.pop_front() {
            match session.push_msg(msg) {
                Ok(()) => {}
                Err(PushError::Busy(msg)) => {
                    self.pending_in.push_front(msg);
                    return Ok(false);
                }
                Err(PushError::Closed) => return Err(Teardown::SessionRejected),
            }
        }
        Ok(true)
    }

    // ---- outbound ---------------------------------------------------------

    fn queue_out(&mut self, bytes: Bytes) {
        self.outsize += bytes.len();
        self.out.push_back(bytes);
    }

    /// Encode messages until the batch is full or the session runs dry.
    fn fill_batch(&mut self) {
        let batch = self.options.out_batch_size.max(1);
        let Some(encoder) = self.encoder.as_mut() else {
            return;
        };

        while self.outsize < batch {
            if !encoder.has_data() {
                let next = if self.tx_initialized {
                    self.session.as_mut().and_then(|s| s.pull_msg())
                } else {
                    self.tx_initialized = true;
                    Some(Msg::new(self.options.identity.clone()))
                };
                let Some(msg) = next else {
                    break;
                };
                encoder.load_msg(msg);
            }

            let Some(chunk) = encoder.encode(batch - self.outsize) else {
                break;
            };
            self.outsize += chunk.len();
            if chunk.len() <= COALESCE_THRESHOLD {
                self.coalesce.extend_from_slice(&chunk);
            } else {
                if !self.coalesce.is_empty() {
                    self.out.push_back(self.coalesce.split().freeze());
                }
                self.out.push_back(chunk);
            }
        }

        if !self.coalesce.is_empty() {
            self.out.push_back(self.coalesce.split().freeze());
        }
    }

    /// Write as much of the batch as the handle takes.
    fn write_batch(&mut self) -> io::Result<usize> {
        let Some(handle) = self.handle.as_mut() else {
            return Ok(0);
        };

        let written = {
            let slices: SmallVec<[IoSlice<'_>; MAX_IOVECS]> = self
                .out
                .iter()
                .take(MAX_IOVECS)
                .map(|chunk| IoSlice::new(chunk))
                .collect();
            match handle.write_vectored(&slices) {
                Ok(n) => n,
                Err(err) if is_transient(&err) => 0,
                Err(err) => return Err(err),
            }
        };

        self.consume_out(written);
        Ok(written)
    }

    fn consume_out(&mut self, mut n: usize) {
        self.outsize -= n;
        while n > 0 {
            let Some(front) = self.out.front_mut() else {
                break;
            };
            if front.len() <= n {
                n -= front.len();
                self.out.pop_front();
            } else {
                front.advance(n);
                n = 0;
            }
        }
    }

    // ---- teardown ---------------------------------------------------------

    fn error(&mut self, reason: Teardown) {
        if self.terminated {
            return;
        }
        debug!("[ENGINE] {} torn down: {}", self.endpoint, reason);

        if let Some(monitor) = &self.monitor {
            let _ = monitor.send(SocketEvent::Disconnected {
                endpoint: self.endpoint.clone(),
                reason: reason.to_string(),
            });
        }

        if let Some(mut session) = self.session.take() {
            session.flush();
            session.detach();
        }

        self.unplug();
        self.teardown = Some(reason);
    }

    fn unplug(&mut self) {
        self.terminated = true;
        self.plugged = false;
        self.registrar.deregister();
        self.handle = None;
        self.pending_in.clear();
        self.out.clear();
        self.outsize = 0;
    }
}

impl<H, R, S> std::fmt::Debug for ZmtpEngine<H, R, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZmtpEngine")
            .field("endpoint", &self.endpoint)
            .field("handshaking", &self.handshaking)
            .field("congested", &self.congested)
            .field("outsize", &self.outsize)
            .field("terminated", &self.terminated)
            .finish()
    }
}
