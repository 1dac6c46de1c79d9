//! TCP stream preparation.
//!
//! Engines expect a non-blocking handle. This applies that, disables
//! Nagle's algorithm and sizes the kernel buffers from the socket options.

use crate::error::Result;
use crate::options::SocketOptions;
use socket2::SockRef;
use std::net::TcpStream;
use tracing::debug;

/// Configure an accepted or connected stream before handing it to an engine.
///
/// # Errors
///
/// Returns an error if a socket option cannot be set.
pub fn prepare_stream(stream: &TcpStream, options: &SocketOptions) -> Result<()> {
    stream.set_nonblocking(true)?;
    stream.set_nodelay(true)?;

    let sock = SockRef::from(stream);
    if let Some(size) = options.sndbuf {
        sock.set_send_buffer_size(size)?;
    }
    if let Some(size) = options.rcvbuf {
        sock.set_recv_buffer_size(size)?;
    }

    debug!(
        "[TCP] prepared stream (sndbuf={:?}, rcvbuf={:?})",
        options.sndbuf, options.rcvbuf
    );
    Ok(())
}
