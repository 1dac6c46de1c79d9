//! # Keelson ZMTP
//!
//! ZMTP/1.0 and ZMTP/2.0 wire protocol plus the ROUTER socket.
//!
//! ## Overview
//!
//! - **codec**: frame decoders and encoders for both revisions
//! - **greeting**: the 12-byte greeting that picks a revision, with a
//!   fallback for peers that predate versioning
//! - **engine**: drives codecs from readiness events on a non-blocking
//!   stream and hands messages to a [`Session`](session::Session)
//! - **router**: identity-addressed routing over a set of pipes
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use keelson_core::options::SocketOptions;
//! use keelson_core::pipe::{self, InprocPipe};
//! use keelson_core::poller::Interest;
//! use keelson_zmtp::engine::ZmtpEngine;
//! use keelson_zmtp::router::RouterSocket;
//! use keelson_zmtp::session::PipeSession;
//! use std::net::TcpStream;
//!
//! # fn main() -> keelson_core::error::Result<()> {
//! let options = SocketOptions::default();
//! let stream = TcpStream::connect("127.0.0.1:5555")?;
//! keelson_core::tcp::prepare_stream(&stream, &options)?;
//!
//! let (engine_end, router_end) = pipe::pair(options.hwm);
//! let mut engine = ZmtpEngine::new(stream, Interest::new(), options.clone(), "tcp://127.0.0.1:5555");
//! engine.plug(PipeSession::new(engine_end));
//!
//! let mut router: RouterSocket<InprocPipe> = RouterSocket::new(&options);
//! let peer = router.attach(router_end);
//!
//! // Event loop: call engine.in_event()/out_event() as the stream becomes
//! // ready, then router.read_activated(peer) and router.recv().
//! # let _ = peer;
//! # Ok(())
//! # }
//! ```
//!
//! ## Features
//!
//! - **Zero-copy**: large bodies are read straight into the message and
//!   encoded as slices of it
//! - **Sans-IO codecs**: decoders and encoders never touch a socket
//! - **Backpressure**: a busy session pauses input without losing data

// Allow some pedantic lints
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::match_same_arms)]

pub mod codec;
pub mod config;
pub mod engine;
pub mod greeting;
pub mod router;
pub mod session;

pub use codec::{CodecFactory, Decoder, Encoder, Revision, StandardCodecs, ZmtpError};
pub use engine::{Teardown, ZmtpEngine};
pub use greeting::{HandshakeNegotiator, Negotiated};
pub use router::RouterSocket;
pub use session::{PipeSession, PushError, Session};
