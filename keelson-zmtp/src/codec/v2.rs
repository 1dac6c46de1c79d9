//! Current framing (ZMTP/2.0).
//!
//! ```text
//! +-------+--------------------------+-----------+
//! | flags | len: u8 | u64 BE (LARGE) | body[len] |
//! +-------+--------------------------+-----------+
//! ```
//!
//! Flags: bit 0 MORE, bit 1 LARGE, bits 2-7 reserved (must be zero).
//! Zero-length bodies are valid.

use super::decoder::{FrameDecoder, Framing, ReadCursor};
use super::encoder::{FrameEncoder, HeaderFormat};
use super::{Result, Revision, ZmtpError, FLAG_LARGE, FLAG_MORE};
use bytes::{BufMut, BytesMut};
use keelson_core::alloc::MsgAllocator;
use keelson_core::message::{Msg, MsgFlags};

const RESERVED_MASK: u8 = !(FLAG_MORE | FLAG_LARGE);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Flags,
    OneByteSize,
    EightByteSize,
    Body,
}

/// Current decoding states.
#[derive(Debug)]
pub struct V2Framing {
    state: State,
    max_msg_size: u64,
    flags: MsgFlags,
}

impl V2Framing {
    pub fn new(max_msg_size: u64) -> Self {
        Self {
            state: State::Flags,
            max_msg_size,
            flags: MsgFlags::NONE,
        }
    }

    fn flags_ready(&mut self, cursor: &mut ReadCursor) -> Result<Option<Msg>> {
        let wire = cursor.header()[0];
        if wire & RESERVED_MASK != 0 {
            return Err(ZmtpError::ReservedBits(wire));
        }

        self.flags = if wire & FLAG_MORE != 0 {
            MsgFlags::MORE
        } else {
            MsgFlags::NONE
        };

        if wire & FLAG_LARGE != 0 {
            cursor.expect_header(8);
            self.state = State::EightByteSize;
        } else {
            cursor.expect_header(1);
            self.state = State::OneByteSize;
        }
        Ok(None)
    }

    fn one_byte_size_ready(
        &mut self,
        cursor: &mut ReadCursor,
        alloc: &mut dyn MsgAllocator,
    ) -> Result<Option<Msg>> {
        let size = u64::from(cursor.header()[0]);
        if size > self.max_msg_size {
            return Err(ZmtpError::MessageTooLarge {
                size,
                max: self.max_msg_size,
            });
        }
        self.size_ready(size as usize, cursor, alloc)
    }

    fn eight_byte_size_ready(
        &mut self,
        cursor: &mut ReadCursor,
        alloc: &mut dyn MsgAllocator,
    ) -> Result<Option<Msg>> {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(cursor.header());
        let size = u64::from_be_bytes(raw);

        if size > self.max_msg_size {
            return Err(ZmtpError::MessageTooLarge {
                size,
                max: self.max_msg_size,
            });
        }
        // The most significant bit is never set by a conforming peer.
        if size > i64::MAX as u64 {
            return Err(ZmtpError::MessageTooLarge {
                size,
                max: i64::MAX as u64,
            });
        }
        let Ok(len) = usize::try_from(size) else {
            return Err(ZmtpError::MessageTooLarge {
                size,
                max: usize::MAX as u64,
            });
        };
        self.size_ready(len, cursor, alloc)
    }

    fn size_ready(
        &mut self,
        len: usize,
        cursor: &mut ReadCursor,
        alloc: &mut dyn MsgAllocator,
    ) -> Result<Option<Msg>> {
        cursor.expect_body(alloc.allocate(len));
        self.state = State::Body;
        Ok(None)
    }

    fn message_ready(&mut self, cursor: &mut ReadCursor) -> Result<Option<Msg>> {
        let body = cursor.take_body().freeze();
        cursor.expect_header(1);
        self.state = State::Flags;
        Ok(Some(Msg::with_flags(body, self.flags)))
    }
}

impl Framing for V2Framing {
    const REVISION: Revision = Revision::V2;

    fn step(
        &mut self,
        cursor: &mut ReadCursor,
        alloc: &mut dyn MsgAllocator,
    ) -> Result<Option<Msg>> {
        match self.state {
            State::Flags => self.flags_ready(cursor),
            State::OneByteSize => self.one_byte_size_ready(cursor, alloc),
            State::EightByteSize => self.eight_byte_size_ready(cursor, alloc),
            State::Body => self.message_ready(cursor),
        }
    }
}

/// Current header: flags then a 1 or 8 byte length.
#[derive(Debug, Default)]
pub struct V2Header;

impl HeaderFormat for V2Header {
    fn write_header(&self, msg: &Msg, out: &mut BytesMut) {
        let size = msg.size();
        let mut flags = 0u8;
        if msg.has_more() {
            flags |= FLAG_MORE;
        }
        if size > 255 {
            flags |= FLAG_LARGE;
            out.put_u8(flags);
            out.put_u64(size as u64);
        } else {
            out.put_u8(flags);
            out.put_u8(size as u8);
        }
    }
}

pub type V2Decoder = FrameDecoder<V2Framing>;
pub type V2Encoder = FrameEncoder<V2Header>;

impl V2Decoder {
    pub fn with_limits(bufsize: usize, max_msg_size: u64) -> Self {
        FrameDecoder::new(V2Framing::new(max_msg_size), bufsize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Decoder, Encoder};
    use bytes::Bytes;

    fn decode_all(dec: &mut V2Decoder, mut input: &[u8]) -> Result<Vec<Msg>> {
        let mut out = Vec::new();
        loop {
            let (used, msg) = dec.decode_from(input)?;
            input = &input[used..];
            match msg {
                Some(m) => out.push(m),
                None => return Ok(out),
            }
        }
    }

    #[test]
    fn decodes_multipart() {
        let mut dec = V2Decoder::with_limits(64, u64::MAX);
        let wire = [0x01, 0x02, b'h', b'i', 0x00, 0x00];
        let msgs = decode_all(&mut dec, &wire).unwrap();
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0].data().as_ref(), b"hi");
        assert!(msgs[0].has_more());
        assert!(msgs[1].is_empty());
        assert!(!msgs[1].has_more());
    }

    #[test]
    fn decodes_large_frame() {
        let body = vec![0x5A; 256];
        let mut wire = vec![FLAG_LARGE];
        wire.extend_from_slice(&256u64.to_be_bytes());
        wire.extend_from_slice(&body);

        let mut dec = V2Decoder::with_limits(64, u64::MAX);
        let msgs = decode_all(&mut dec, &wire).unwrap();
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].size(), 256);
    }

    #[test]
    fn reserved_bits_are_rejected() {
        let mut dec = V2Decoder::with_limits(64, u64::MAX);
        let err = decode_all(&mut dec, &[0x04, 0x00]).unwrap_err();
        assert_eq!(err, ZmtpError::ReservedBits(0x04));
    }

    #[test]
    fn size_limit_is_inclusive() {
        let mut dec = V2Decoder::with_limits(64, 2);
        assert!(decode_all(&mut dec, &[0x00, 0x02, 1, 2]).is_ok());

        let mut dec = V2Decoder::with_limits(64, 2);
        let err = decode_all(&mut dec, &[0x00, 0x03]).unwrap_err();
        assert_eq!(err, ZmtpError::MessageTooLarge { size: 3, max: 2 });
    }

    #[test]
    fn large_form_size_limit() {
        fn large_frame(len: usize) -> Vec<u8> {
            let mut wire = vec![FLAG_LARGE];
            wire.extend_from_slice(&(len as u64).to_be_bytes());
            wire.extend(std::iter::repeat(0x22).take(len));
            wire
        }

        let mut dec = V2Decoder::with_limits(64, 300);
        let msgs = decode_all(&mut dec, &large_frame(300)).unwrap();
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].size(), 300);

        let mut dec = V2Decoder::with_limits(64, 300);
        let err = decode_all(&mut dec, &large_frame(301)).unwrap_err();
        assert_eq!(err, ZmtpError::MessageTooLarge { size: 301, max: 300 });
    }

    #[test]
    fn top_bit_length_is_size_error() {
        let mut dec = V2Decoder::with_limits(64, u64::MAX);
        let mut wire = vec![FLAG_LARGE];
        wire.extend_from_slice(&(1u64 << 63).to_be_bytes());
        let err = decode_all(&mut dec, &wire).unwrap_err();
        assert!(err.is_size_limit());
    }

    #[test]
    fn large_flag_follows_size() {
        let mut enc = V2Encoder::default();
        enc.load_msg(Msg::new(Bytes::from(vec![0u8; 255])));
        assert_eq!(enc.encode(64).unwrap().as_ref(), &[0x00, 0xFF]);

        let mut enc = V2Encoder::default();
        enc.load_msg(Msg::from_part(Bytes::from(vec![0u8; 256]), true));
        let header = enc.encode(64).unwrap();
        assert_eq!(header[0], FLAG_MORE | FLAG_LARGE);
        assert_eq!(&header[1..], &256u64.to_be_bytes());
    }

    #[test]
    fn zero_copy_read_into_body() {
        // bufsize 16: a 300-byte body is read in place
        let mut dec = V2Decoder::with_limits(16, u64::MAX);
        let mut header = vec![FLAG_LARGE];
        header.extend_from_slice(&300u64.to_be_bytes());

        let buf = dec.read_buf();
        assert_eq!(buf.len(), 16);
        buf[..9].copy_from_slice(&header);
        dec.filled(9);
        assert!(dec.decode().unwrap().is_none());
        assert!(!dec.has_pending());

        // The whole body is offered at once.
        assert_eq!(dec.read_buf().len(), 300);

        let mut written = 0;
        while written < 300 {
            let buf = dec.read_buf();
            let n = buf.len().min(100);
            buf[..n].fill(0x42);
            dec.filled(n);
            written += n;
            if let Some(msg) = dec.decode().unwrap() {
                assert_eq!(written, 300);
                assert_eq!(msg.size(), 300);
                assert!(msg.data().iter().all(|&b| b == 0x42));
                return;
            }
        }
        panic!("message never completed");
    }
}
