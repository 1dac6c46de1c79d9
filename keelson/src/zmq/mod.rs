//! ZeroMQ wire protocol.
//!
//! - [`ZmtpEngine`] - drives one connection from readiness events
//! - [`RouterSocket`] - identity-based routing over engine-backed pipes
//! - [`codec`] - ZMTP/1.0 and ZMTP/2.0 frame codecs
//!
//! # Wiring
//!
//! Each connection gets an engine and an in-process pipe. The engine owns
//! one end through a [`PipeSession`], the ROUTER attaches the other:
//!
//! ```text
//! TcpStream <-> ZmtpEngine <-> PipeSession | InprocPipe <-> RouterSocket
//! ```

pub use keelson_zmtp::codec;
pub use keelson_zmtp::config;
pub use keelson_zmtp::engine::{Teardown, ZmtpEngine};
pub use keelson_zmtp::greeting::{HandshakeNegotiator, Negotiated};
pub use keelson_zmtp::router::RouterSocket;
pub use keelson_zmtp::session::{PipeSession, PushError, Session};

pub use keelson_core::monitor::{create_monitor, SocketEvent, SocketMonitor};
pub use keelson_core::options::SocketOptions;
pub use keelson_core::pipe::{self, InprocPipe, Pipe, PipeId};
pub use keelson_core::poller::{Interest, Registrar};
pub use keelson_core::socket_type::SocketType;
pub use keelson_core::tcp::prepare_stream;

/// Convenient imports for the ZeroMQ protocol.
///
/// # Example
///
/// ```rust
/// use keelson::zmq::prelude::*;
///
/// let options = SocketOptions::new(SocketType::Router);
/// let router: RouterSocket<InprocPipe> = RouterSocket::new(&options);
/// assert!(router.has_out());
/// ```
pub mod prelude {
    pub use super::{
        pipe, prepare_stream, InprocPipe, Interest, Pipe, PipeSession, RouterSocket, Session,
        SocketOptions, SocketType, ZmtpEngine,
    };
    pub use bytes::Bytes;
    pub use keelson_core::message::{Identity, Msg};
}
