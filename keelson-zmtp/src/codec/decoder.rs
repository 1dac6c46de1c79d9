//! Size-prefixed frame decoding driver.
//!
//! Both framing revisions know, at every point, exactly how many bytes they
//! need next: a header field of fixed width or a body of announced length.
//! [`FrameDecoder`] owns that "how many bytes next" cursor and the input
//! staging buffer; a [`Framing`] only supplies the per-state transitions.
//!
//! Fast path:
//! - Body remainder >= buffer size -> transport reads straight into the body
//!
//! Slow path:
//! - Everything else is read into the staging buffer and copied over

use super::{Decoder, Result, Revision, ZmtpError};
use bytes::BytesMut;
use keelson_core::alloc::{HeapAllocator, MsgAllocator};
use keelson_core::message::Msg;
use tracing::trace;

/// What the decoder is currently filling.
#[derive(Debug)]
enum Target {
    /// Fixed-width header field, stored in the cursor's own buffer.
    Header { want: usize },
    /// Message body of known length.
    Body(BytesMut),
}

/// Destination of the next input bytes.
#[derive(Debug)]
pub struct ReadCursor {
    header: [u8; 8],
    target: Target,
    have: usize,
}

impl ReadCursor {
    fn new() -> Self {
        Self {
            header: [0; 8],
            target: Target::Header { want: 1 },
            have: 0,
        }
    }

    /// Next read fills `want` (1..=8) header bytes.
    pub fn expect_header(&mut self, want: usize) {
        debug_assert!((1..=8).contains(&want));
        self.target = Target::Header { want };
        self.have = 0;
    }

    /// Next reads fill `body` to its full length.
    pub fn expect_body(&mut self, body: BytesMut) {
        self.target = Target::Body(body);
        self.have = 0;
    }

    /// The completed header field.
    pub fn header(&self) -> &[u8] {
        match self.target {
            Target::Header { want } => &self.header[..want],
            Target::Body(_) => &[],
        }
    }

    /// Take the completed body out of the cursor.
    pub fn take_body(&mut self) -> BytesMut {
        match std::mem::replace(&mut self.target, Target::Header { want: 1 }) {
            Target::Body(body) => body,
            Target::Header { .. } => BytesMut::new(),
        }
    }

    /// Bytes still needed to complete the current target.
    #[inline]
    pub fn remaining(&self) -> usize {
        let total = match &self.target {
            Target::Header { want } => *want,
            Target::Body(body) => body.len(),
        };
        total - self.have
    }

    fn unfilled_mut(&mut self) -> &mut [u8] {
        match &mut self.target {
            Target::Header { want } => &mut self.header[self.have..*want],
            Target::Body(body) => &mut body[self.have..],
        }
    }

    #[inline]
    fn advance(&mut self, n: usize) {
        debug_assert!(n <= self.remaining());
        self.have += n;
    }

    fn copy_in(&mut self, input: &[u8]) -> usize {
        let n = self.remaining().min(input.len());
        self.unfilled_mut()[..n].copy_from_slice(&input[..n]);
        self.advance(n);
        n
    }

    fn is_body(&self) -> bool {
        matches!(self.target, Target::Body(_))
    }
}

/// Per-revision state machine.
///
/// `step` is called each time the cursor's current target is complete. It
/// inspects what was read, points the cursor at the next target and returns
/// a message when one is finished.
pub trait Framing: Send {
    const REVISION: Revision;

    fn step(
        &mut self,
        cursor: &mut ReadCursor,
        alloc: &mut dyn MsgAllocator,
    ) -> Result<Option<Msg>>;
}

/// Framing, cursor and allocator: everything needed to consume input.
struct Machine<F> {
    framing: F,
    cursor: ReadCursor,
    alloc: Box<dyn MsgAllocator>,
}

impl<F: Framing> Machine<F> {
    /// Consume `input` until a message completes or input runs out.
    ///
    /// Returns the number of bytes consumed.
    fn run(&mut self, input: &[u8]) -> Result<(usize, Option<Msg>)> {
        let mut pos = 0;
        loop {
            while self.cursor.remaining() == 0 {
                if let Some(msg) = self.framing.step(&mut self.cursor, self.alloc.as_mut())? {
                    return Ok((pos, Some(msg)));
                }
            }
            if pos == input.len() {
                return Ok((pos, None));
            }
            pos += self.cursor.copy_in(&input[pos..]);
        }
    }
}

/// Stateful frame decoder for one connection.
pub struct FrameDecoder<F> {
    machine: Machine<F>,
    staging: BytesMut,
    in_pos: usize,
    in_len: usize,
    bufsize: usize,
    zero_copy: bool,
    poisoned: Option<ZmtpError>,
}

impl<F: Framing> FrameDecoder<F> {
    /// `bufsize` is the staging buffer size and the zero-copy threshold.
    pub fn new(framing: F, bufsize: usize) -> Self {
        let bufsize = bufsize.max(1);
        Self {
            machine: Machine {
                framing,
                cursor: ReadCursor::new(),
                alloc: Box::new(HeapAllocator),
            },
            staging: BytesMut::zeroed(bufsize),
            in_pos: 0,
            in_len: 0,
            bufsize,
            zero_copy: false,
            poisoned: None,
        }
    }

    fn check_poison(&self) -> Result<()> {
        match &self.poisoned {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn poison<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            trace!("[DECODER] poisoned: {}", err);
            self.poisoned = Some(err.clone());
            self.in_pos = self.in_len;
        }
        result
    }
}

impl<F: Framing> Decoder for FrameDecoder<F> {
    fn revision(&self) -> Revision {
        F::REVISION
    }

    fn read_buf(&mut self) -> &mut [u8] {
        debug_assert!(!self.has_pending());
        let cursor = &mut self.machine.cursor;
        if cursor.is_body() && cursor.remaining() >= self.bufsize {
            self.zero_copy = true;
            return cursor.unfilled_mut();
        }
        self.zero_copy = false;
        self.in_pos = 0;
        self.in_len = 0;
        &mut self.staging[..]
    }

    fn filled(&mut self, n: usize) {
        if self.zero_copy {
            self.machine.cursor.advance(n);
            self.zero_copy = false;
        } else {
            self.in_pos = 0;
            self.in_len = n.min(self.staging.len());
        }
    }

    fn decode(&mut self) -> Result<Option<Msg>> {
        self.check_poison()?;
        let input = &self.staging[self.in_pos..self.in_len];
        let result = self.machine.run(input);
        let (used, msg) = self.poison(result)?;
        self.in_pos += used;
        Ok(msg)
    }

    fn decode_from(&mut self, input: &[u8]) -> Result<(usize, Option<Msg>)> {
        self.check_poison()?;
        let result = self.machine.run(input);
        self.poison(result)
    }

    fn has_pending(&self) -> bool {
        self.in_pos < self.in_len
    }

    fn prime(&mut self, bytes: &[u8]) {
        debug_assert!(!self.has_pending());
        if self.staging.len() < bytes.len() {
            self.staging.resize(bytes.len(), 0);
        }
        self.staging[..bytes.len()].copy_from_slice(bytes);
        self.in_pos = 0;
        self.in_len = bytes.len();
    }

    fn set_allocator(&mut self, alloc: Box<dyn MsgAllocator>) {
        self.machine.alloc = alloc;
    }
}
