//! Frame codecs for both wire revisions.
//!
//! - `v1`: legacy framing, length first, flags byte counted in the length
//! - `v2`: current framing, flags first, LARGE bit selects the length width
//!
//! Engines only talk to the [`Decoder`] and [`Encoder`] traits; which pair
//! they get is decided after the greeting by a [`CodecFactory`].

pub mod decoder;
pub mod encoder;
pub mod v1;
pub mod v2;

use bytes::Bytes;
use keelson_core::alloc::MsgAllocator;
use keelson_core::message::Msg;
use keelson_core::options::SocketOptions;
use thiserror::Error;

pub use decoder::FrameDecoder;
pub use encoder::FrameEncoder;
pub use v1::{V1Decoder, V1Encoder};
pub use v2::{V2Decoder, V2Encoder};

/// More parts follow (both revisions).
pub const FLAG_MORE: u8 = 0x01;
/// 8-byte length follows (current revision only).
pub const FLAG_LARGE: u8 = 0x02;

/// ZMTP protocol errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ZmtpError {
    #[error("Protocol violation: {0}")]
    Protocol(&'static str),

    #[error("Message too large: {size} bytes (max: {max})")]
    MessageTooLarge { size: u64, max: u64 },

    #[error("Protocol violation: reserved flag bits set ({0:#04x})")]
    ReservedBits(u8),
}

impl ZmtpError {
    /// The frame was well formed but exceeds a size limit.
    #[must_use]
    pub const fn is_size_limit(&self) -> bool {
        matches!(self, Self::MessageTooLarge { .. })
    }
}

/// Result type alias for ZMTP operations
pub type Result<T> = std::result::Result<T, ZmtpError>;

/// Framing revision selected by the greeting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Revision {
    /// Length-first framing (ZMTP/1.0).
    V1,
    /// Flags-first framing (ZMTP/2.0).
    V2,
}

impl Revision {
    /// Revision announced in our own greeting.
    pub const ANNOUNCED: u8 = 1;

    /// Map the peer's revision byte. Zero is legacy, anything newer speaks
    /// at least the current framing.
    #[must_use]
    pub const fn from_wire(byte: u8) -> Self {
        if byte == 0 {
            Self::V1
        } else {
            Self::V2
        }
    }

    #[must_use]
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::V1 => 0,
            Self::V2 => 1,
        }
    }
}

/// Incremental decoder fed by a non-blocking transport.
///
/// Typical loop:
/// 1. `read_buf()` and read into it, then `filled(n)`
/// 2. call `decode()` until it returns `Ok(None)`
///
/// If a message cannot be delivered, stop calling `decode()`; the rest of
/// the input stays buffered (`has_pending()`) until it is resumed.
pub trait Decoder: Send {
    fn revision(&self) -> Revision;

    /// Buffer for the next transport read. Only valid with no pending input.
    fn read_buf(&mut self) -> &mut [u8];

    /// Record that `n` bytes were written into the last `read_buf()`.
    fn filled(&mut self, n: usize);

    /// Consume pending input until a message completes.
    fn decode(&mut self) -> Result<Option<Msg>>;

    /// Copying variant that consumes from `input` instead of the internal
    /// buffer. Returns the number of bytes used.
    fn decode_from(&mut self, input: &[u8]) -> Result<(usize, Option<Msg>)>;

    /// Buffered input not decoded yet.
    fn has_pending(&self) -> bool;

    /// Queue bytes that arrived before this decoder existed.
    fn prime(&mut self, bytes: &[u8]);

    fn set_allocator(&mut self, alloc: Box<dyn MsgAllocator>);
}

/// Incremental encoder drained by a non-blocking transport.
pub trait Encoder: Send {
    /// Start encoding `msg`. The previous message must be fully drained.
    fn load_msg(&mut self, msg: Msg);

    /// Next chunk of at most `max` bytes, `None` when a new message is needed.
    fn encode(&mut self, max: usize) -> Option<Bytes>;

    /// A loaded message still has bytes to emit.
    fn has_data(&self) -> bool;
}

/// Builds the codec pair for a negotiated revision.
pub trait CodecFactory: Send {
    fn decoder(&self, revision: Revision, options: &SocketOptions) -> Box<dyn Decoder>;

    fn encoder(&self, revision: Revision, options: &SocketOptions) -> Box<dyn Encoder>;
}

/// The built-in codecs, honouring batch size, size limit and allocator
/// options.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardCodecs;

impl CodecFactory for StandardCodecs {
    fn decoder(&self, revision: Revision, options: &SocketOptions) -> Box<dyn Decoder> {
        let max = options.max_msg_size_or_unlimited();
        let mut decoder: Box<dyn Decoder> = match revision {
            Revision::V1 => Box::new(V1Decoder::with_limits(options.in_batch_size, max)),
            Revision::V2 => Box::new(V2Decoder::with_limits(options.in_batch_size, max)),
        };
        decoder.set_allocator(options.alloc.build());
        decoder
    }

    fn encoder(&self, revision: Revision, _options: &SocketOptions) -> Box<dyn Encoder> {
        match revision {
            Revision::V1 => Box::new(V1Encoder::default()),
            Revision::V2 => Box::new(V2Encoder::default()),
        }
    }
}
