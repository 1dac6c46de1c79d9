//! # Keelson
//!
//! A ZeroMQ-compatible wire protocol engine with an identity-routing
//! ROUTER socket.
//!
//! ## Architecture
//!
//! Keelson is structured as a **messaging kernel** with clean layering:
//!
//! - **`keelson-core`**: messages, pipes, fair queueing, the ROUTER identity
//!   table, options and errors
//! - **`keelson-zmtp`**: ZMTP/1.0 and ZMTP/2.0 codecs, greeting, the
//!   readiness-driven engine and the ROUTER socket
//! - **`keelson`**: Public API surface (this crate)
//!
//! ## Protocols (opt-in via features)
//!
//! - **`zmq`** - ZeroMQ wire protocol (ZMTP/1.0 and ZMTP/2.0)
//!
//! ```toml
//! [dependencies]
//! keelson = { version = "0.1", features = ["zmq"] }
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! # #[cfg(feature = "zmq")]
//! # fn example() -> keelson::Result<()> {
//! use keelson::zmq::prelude::*;
//! use std::net::TcpListener;
//!
//! let options = SocketOptions::new(SocketType::Router);
//! let listener = TcpListener::bind("127.0.0.1:5555")?;
//! let (stream, addr) = listener.accept()?;
//! prepare_stream(&stream, &options)?;
//!
//! let (engine_end, socket_end) = pipe::pair(options.hwm);
//! let mut engine = ZmtpEngine::new(stream, Interest::new(), options.clone(), addr.to_string());
//! engine.plug(PipeSession::new(engine_end));
//!
//! let mut router: RouterSocket<InprocPipe> = RouterSocket::new(&options);
//! router.attach(socket_end);
//! // Drive engine.in_event()/out_event() from a poll loop, then
//! // router.recv()/router.send().
//! # Ok(())
//! # }
//! ```
//!
//! ## Design
//!
//! - **Zero-copy**: Uses `bytes::Bytes` for refcounted message buffers
//! - **Sans-IO**: Codecs and the greeting never touch a socket
//! - **Readiness-driven**: Engines never block and never poll; an outer loop
//!   delivers readiness events
//! - **No `unsafe`** in the protocol and routing layers

#![warn(missing_docs)]
#![warn(clippy::all)]

// Re-export core types
pub use bytes::Bytes;
pub use keelson_core::error::{KeelsonError, Result};
pub use keelson_core::message::{Identity, Msg, MsgFlags};

/// Development helpers (tracing setup).
pub mod dev_tracing;

// Protocol modules (opt-in via features)
#[cfg(feature = "zmq")]
pub mod zmq;
