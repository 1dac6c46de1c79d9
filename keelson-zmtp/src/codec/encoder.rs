//! Frame encoding driver.
//!
//! One message at a time: the header is rendered into a reusable scratch
//! buffer, the body is handed out as zero-copy slices of the message.

use super::Encoder;
use bytes::{Bytes, BytesMut};
use keelson_core::message::Msg;

/// Largest header either revision produces (0xFF + u64 + flags).
pub const MAX_HEADER_LEN: usize = 10;

/// Per-revision header layout.
pub trait HeaderFormat: Send {
    fn write_header(&self, msg: &Msg, out: &mut BytesMut);
}

#[derive(Debug)]
enum State {
    /// Waiting for `load_msg`.
    MessageReady,
    /// Header rendered; `header` holds what is left of it.
    Header { header: Bytes, body: Bytes },
    /// Emitting the body.
    Body(Bytes),
}

/// Stateful frame encoder for one connection.
#[derive(Debug)]
pub struct FrameEncoder<H> {
    format: H,
    state: State,
    scratch: BytesMut,
}

impl<H: HeaderFormat + Default> Default for FrameEncoder<H> {
    fn default() -> Self {
        Self::new(H::default())
    }
}

impl<H: HeaderFormat> FrameEncoder<H> {
    pub fn new(format: H) -> Self {
        Self {
            format,
            state: State::MessageReady,
            scratch: BytesMut::with_capacity(MAX_HEADER_LEN * 16),
        }
    }
}

impl<H: HeaderFormat> Encoder for FrameEncoder<H> {
    fn load_msg(&mut self, msg: Msg) {
        debug_assert!(!self.has_data());
        self.scratch.reserve(MAX_HEADER_LEN);
        self.format.write_header(&msg, &mut self.scratch);
        let header = self.scratch.split().freeze();
        self.state = State::Header {
            header,
            body: msg.into_bytes(),
        };
    }

    fn encode(&mut self, max: usize) -> Option<Bytes> {
        if max == 0 {
            return None;
        }
        match std::mem::replace(&mut self.state, State::MessageReady) {
            State::MessageReady => None,
            State::Header { mut header, body } => {
                let chunk = header.split_to(max.min(header.len()));
                self.state = if !header.is_empty() {
                    State::Header { header, body }
                } else if !body.is_empty() {
                    State::Body(body)
                } else {
                    State::MessageReady
                };
                Some(chunk)
            }
            State::Body(mut body) => {
                let chunk = body.split_to(max.min(body.len()));
                if !body.is_empty() {
                    self.state = State::Body(body);
                }
                Some(chunk)
            }
        }
    }

    fn has_data(&self) -> bool {
        !matches!(self.state, State::MessageReady)
    }
}
