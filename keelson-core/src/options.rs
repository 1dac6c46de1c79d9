//! Socket configuration options
//!
//! This module provides the options consulted by the protocol engine and the
//! ROUTER socket, similar to libzmq's socket options (zmq_setsockopt).
//! Values are taken as given; nothing here validates them.

use crate::alloc::AllocStrategy;
use crate::socket_type::SocketType;
use bytes::Bytes;

/// Default size of the engine's input and output batches.
pub const DEFAULT_BATCH_SIZE: usize = 8192;

/// Socket configuration options.
///
/// # Examples
///
/// ```
/// use keelson_core::options::SocketOptions;
/// use keelson_core::socket_type::SocketType;
///
/// let opts = SocketOptions::new(SocketType::Router)
///     .with_identity(&b"frontend"[..])
///     .with_max_msg_size(Some(1 << 20))
///     .with_router_mandatory(true);
/// ```
#[derive(Debug, Clone)]
pub struct SocketOptions {
    /// Local socket type, announced as the role byte of the greeting.
    pub socket_type: SocketType,

    /// Local identity (ZMQ_IDENTITY)
    ///
    /// Sent as the first message on every connection. Empty by default.
    pub identity: Bytes,

    /// Maximum inbound message size (ZMQ_MAXMSGSIZE)
    ///
    /// - `None`: No limit (default)
    /// - `Some(n)`: Bodies larger than `n` bytes tear the connection down
    pub max_msg_size: Option<u64>,

    /// Kernel send buffer size (ZMQ_SNDBUF), `None` keeps the OS default.
    pub sndbuf: Option<usize>,

    /// Kernel receive buffer size (ZMQ_RCVBUF), `None` keeps the OS default.
    pub rcvbuf: Option<usize>,

    /// Bytes the engine reads per readiness event.
    ///
    /// Also the threshold above which decoders read straight into the
    /// message body.
    pub in_batch_size: usize,

    /// Bytes the engine gathers before writing.
    pub out_batch_size: usize,

    /// Deliver the peer identity upstream as the first message.
    ///
    /// On by default for ROUTER, which identifies peers from it.
    pub recv_identity: bool,

    /// ROUTER: fail sends to unknown peers instead of dropping (ZMQ_ROUTER_MANDATORY)
    pub router_mandatory: bool,

    /// High water mark for in-process pipes (ZMQ_SNDHWM)
    ///
    /// - Default: 1000 messages
    /// - `0`: No limit
    pub hwm: usize,

    /// How decoders obtain storage for message bodies.
    pub alloc: AllocStrategy,
}

impl Default for SocketOptions {
    fn default() -> Self {
        Self::new(SocketType::Router)
    }
}

impl SocketOptions {
    /// Create options for the given socket type with default values.
    pub fn new(socket_type: SocketType) -> Self {
        Self {
            socket_type,
            identity: Bytes::new(),
            max_msg_size: None, // No limit
            sndbuf: None,
            rcvbuf: None,
            in_batch_size: DEFAULT_BATCH_SIZE,
            out_batch_size: DEFAULT_BATCH_SIZE,
            // ROUTER needs the peer identity to route replies
            recv_identity: matches!(socket_type, SocketType::Router),
            router_mandatory: false,
            hwm: 1000,
            alloc: AllocStrategy::Heap,
        }
    }

    /// Set the local identity.
    pub fn with_identity(mut self, identity: impl Into<Bytes>) -> Self {
        self.identity = identity.into();
        self
    }

    /// Set the maximum inbound message size.
    pub fn with_max_msg_size(mut self, max: Option<u64>) -> Self {
        self.max_msg_size = max;
        self
    }

    /// Set the kernel send buffer size.
    pub fn with_sndbuf(mut self, size: usize) -> Self {
        self.sndbuf = Some(size);
        self
    }

    /// Set the kernel receive buffer size.
    pub fn with_rcvbuf(mut self, size: usize) -> Self {
        self.rcvbuf = Some(size);
        self
    }

    /// Set the input batch size.
    pub fn with_in_batch_size(mut self, size: usize) -> Self {
        self.in_batch_size = size;
        self
    }

    /// Set the output batch size.
    pub fn with_out_batch_size(mut self, size: usize) -> Self {
        self.out_batch_size = size;
        self
    }

    /// Deliver peer identities upstream.
    pub fn with_recv_identity(mut self, enabled: bool) -> Self {
        self.recv_identity = enabled;
        self
    }

    /// Enable ROUTER mandatory routing.
    pub fn with_router_mandatory(mut self, enabled: bool) -> Self {
        self.router_mandatory = enabled;
        self
    }

    /// Set the pipe high water mark.
    pub fn with_hwm(mut self, hwm: usize) -> Self {
        self.hwm = hwm;
        self
    }

    /// Select the body allocation strategy.
    pub fn with_alloc(mut self, alloc: AllocStrategy) -> Self {
        self.alloc = alloc;
        self
    }

    /// Effective inbound size limit, `u64::MAX` when unlimited.
    #[inline]
    pub fn max_msg_size_or_unlimited(&self) -> u64 {
        self.max_msg_size.unwrap_or(u64::MAX)
    }
}
