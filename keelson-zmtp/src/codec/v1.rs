//! Legacy framing (ZMTP/1.0).
//!
//! ```text
//! +-------------+----------------------+-------+----------------+
//! | len: u8     | [len: u64 BE]        | flags | body[len - 1]  |
//! | 0xFF => u64 | only after 0xFF      | 1 B   |                |
//! +-------------+----------------------+-------+----------------+
//! ```
//!
//! The length counts the flags byte, so it is never zero.

use super::decoder::{FrameDecoder, Framing, ReadCursor};
use super::encoder::{FrameEncoder, HeaderFormat};
use super::{Result, Revision, ZmtpError, FLAG_MORE};
use bytes::{BufMut, BytesMut};
use keelson_core::alloc::MsgAllocator;
use keelson_core::message::{Msg, MsgFlags};

/// Length byte announcing an 8-byte length.
const LONG_LENGTH: u8 = 0xFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    OneByteSize,
    EightByteSize,
    Flags,
    Body,
}

/// Legacy decoding states.
#[derive(Debug)]
pub struct V1Framing {
    state: State,
    max_msg_size: u64,
    payload_len: usize,
    flags: MsgFlags,
}

impl V1Framing {
    pub fn new(max_msg_size: u64) -> Self {
        Self {
            state: State::OneByteSize,
            max_msg_size,
            payload_len: 0,
            flags: MsgFlags::NONE,
        }
    }

    fn one_byte_size_ready(&mut self, cursor: &mut ReadCursor) -> Result<Option<Msg>> {
        let first = cursor.header()[0];
        if first == LONG_LENGTH {
            cursor.expect_header(8);
            self.state = State::EightByteSize;
            return Ok(None);
        }

        // There has to be at least the flags byte.
        if first == 0 {
            return Err(ZmtpError::Protocol("legacy frame length is zero"));
        }

        let payload = u64::from(first - 1);
        if payload > self.max_msg_size {
            return Err(ZmtpError::MessageTooLarge {
                size: payload,
                max: self.max_msg_size,
            });
        }

        self.payload_len = payload as usize;
        cursor.expect_header(1);
        self.state = State::Flags;
        Ok(None)
    }

    fn eight_byte_size_ready(&mut self, cursor: &mut ReadCursor) -> Result<Option<Msg>> {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(cursor.header());
        // Signed on the wire: anything that reads negative is malformed.
        let len = i64::from_be_bytes(raw);
        if len <= 0 {
            return Err(ZmtpError::Protocol("legacy frame length is not positive"));
        }

        let payload = (len - 1) as u64;
        if payload > self.max_msg_size {
            return Err(ZmtpError::MessageTooLarge {
                size: payload,
                max: self.max_msg_size,
            });
        }
        let Ok(payload_len) = usize::try_from(payload) else {
            return Err(ZmtpError::MessageTooLarge {
                size: payload,
                max: usize::MAX as u64,
            });
        };

        self.payload_len = payload_len;
        cursor.expect_header(1);
        self.state = State::Flags;
        Ok(None)
    }

    fn flags_ready(
        &mut self,
        cursor: &mut ReadCursor,
        alloc: &mut dyn MsgAllocator,
    ) -> Result<Option<Msg>> {
        self.flags = if cursor.header()[0] & FLAG_MORE != 0 {
            MsgFlags::MORE
        } else {
            MsgFlags::NONE
        };
        cursor.expect_body(alloc.allocate(self.payload_len));
        self.state = State::Body;
        Ok(None)
    }

    fn message_ready(&mut self, cursor: &mut ReadCursor) -> Result<Option<Msg>> {
        let body = cursor.take_body().freeze();
        cursor.expect_header(1);
        self.state = State::OneByteSize;
        Ok(Some(Msg::with_flags(body, self.flags)))
    }
}

impl Framing for V1Framing {
    const REVISION: Revision = Revision::V1;

    fn step(
        &mut self,
        cursor: &mut ReadCursor,
        alloc: &mut dyn MsgAllocator,
    ) -> Result<Option<Msg>> {
        match self.state {
            State::OneByteSize => self.one_byte_size_ready(cursor),
            State::EightByteSize => self.eight_byte_size_ready(cursor),
            State::Flags => self.flags_ready(cursor, alloc),
            State::Body => self.message_ready(cursor),
        }
    }
}

/// Legacy header: length (counting the flags byte) then flags.
#[derive(Debug, Default)]
pub struct V1Header;

impl HeaderFormat for V1Header {
    fn write_header(&self, msg: &Msg, out: &mut BytesMut) {
        let len = msg.size() as u64 + 1;
        if len < u64::from(LONG_LENGTH) {
            out.put_u8(len as u8);
        } else {
            out.put_u8(LONG_LENGTH);
            out.put_u64(len);
        }
        out.put_u8(if msg.has_more() { FLAG_MORE } else { 0 });
    }
}

pub type V1Decoder = FrameDecoder<V1Framing>;
pub type V1Encoder = FrameEncoder<V1Header>;

impl V1Decoder {
    pub fn with_limits(bufsize: usize, max_msg_size: u64) -> Self {
        FrameDecoder::new(V1Framing::new(max_msg_size), bufsize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Decoder, Encoder};
    use bytes::Bytes;

    fn decode_all(dec: &mut V1Decoder, mut input: &[u8]) -> Result<Vec<Msg>> {
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
    fn decodes_short_frame() {
        let mut dec = V1Decoder::with_limits(64, u64::MAX);
        let msgs = decode_all(&mut dec, &[0x04, 0x01, b'a', b'b', b'c']).unwrap();
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].data().as_ref(), b"abc");
        assert!(msgs[0].has_more());
    }

    #[test]
    fn decodes_empty_body() {
        let mut dec = V1Decoder::with_limits(64, u64::MAX);
        let msgs = decode_all(&mut dec, &[0x01, 0x00]).unwrap();
        assert_eq!(msgs.len(), 1);
        assert!(msgs[0].is_empty());
        assert!(!msgs[0].has_more());
    }

    #[test]
    fn decodes_long_frame() {
        let body = vec![0xAB; 300];
        let mut wire = vec![0xFF];
        wire.extend_from_slice(&301u64.to_be_bytes());
        wire.push(0x00);
        wire.extend_from_slice(&body);

        let mut dec = V1Decoder::with_limits(64, u64::MAX);
        let msgs = decode_all(&mut dec, &wire).unwrap();
        assert_eq!(msgs[0].data().as_ref(), &body[..]);
    }

    #[test]
    fn zero_length_byte_is_protocol_error() {
        let mut dec = V1Decoder::with_limits(64, u64::MAX);
        let err = decode_all(&mut dec, &[0x00]).unwrap_err();
        assert!(matches!(err, ZmtpError::Protocol(_)));
    }

    #[test]
    fn non_positive_long_length_is_protocol_error() {
        let mut dec = V1Decoder::with_limits(64, u64::MAX);
        let mut wire = vec![0xFF];
        wire.extend_from_slice(&0u64.to_be_bytes());
        assert!(matches!(
            decode_all(&mut dec, &wire).unwrap_err(),
            ZmtpError::Protocol(_)
        ));

        let mut dec = V1Decoder::with_limits(64, u64::MAX);
        let mut wire = vec![0xFF];
        wire.extend_from_slice(&u64::MAX.to_be_bytes());
        assert!(matches!(
            decode_all(&mut dec, &wire).unwrap_err(),
            ZmtpError::Protocol(_)
        ));
    }

    #[test]
    fn size_limit_is_exclusive_of_flags() {
        // payload 4 == max: fine
        let mut dec = V1Decoder::with_limits(64, 4);
        assert!(decode_all(&mut dec, &[0x05, 0x00, 1, 2, 3, 4]).is_ok());

        // payload 5 > max
        let mut dec = V1Decoder::with_limits(64, 4);
        let err = decode_all(&mut dec, &[0x06]).unwrap_err();
        assert_eq!(err, ZmtpError::MessageTooLarge { size: 5, max: 4 });
        assert!(err.is_size_limit());
    }

    #[test]
    fn long_form_size_limit() {
        fn long_frame(payload: usize) -> Vec<u8> {
            let mut wire = vec![0xFF];
            wire.extend_from_slice(&(payload as u64 + 1).to_be_bytes());
            wire.push(0x00);
            wire.extend(std::iter::repeat(0x11).take(payload));
            wire
        }

        let mut dec = V1Decoder::with_limits(64, 300);
        let msgs = decode_all(&mut dec, &long_frame(300)).unwrap();
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].size(), 300);

        let mut dec = V1Decoder::with_limits(64, 300);
        let err = decode_all(&mut dec, &long_frame(301)).unwrap_err();
        assert_eq!(err, ZmtpError::MessageTooLarge { size: 301, max: 300 });
    }

    #[test]
    fn error_poisons_decoder() {
        let mut dec = V1Decoder::with_limits(64, u64::MAX);
        let first = dec.decode_from(&[0x00]).unwrap_err();
        let again = dec.decode_from(&[0x02, 0x00, b'x']).unwrap_err();
        assert_eq!(first, again);
    }

    #[test]
    fn header_forms() {
        let mut enc = V1Encoder::default();
        enc.load_msg(Msg::from_part(Bytes::from_static(b"hi"), true));
        assert_eq!(enc.encode(64).unwrap().as_ref(), &[0x03, 0x01]);
        assert_eq!(enc.encode(64).unwrap().as_ref(), b"hi");
        assert!(enc.encode(64).is_none());

        // 253 bytes + flags = 254 still fits the short form
        enc.load_msg(Msg::new(Bytes::from(vec![0u8; 253])));
        assert_eq!(enc.encode(64).unwrap().as_ref(), &[0xFE, 0x00]);

        let mut enc = V1Encoder::default();
        enc.load_msg(Msg::new(Bytes::from(vec![0u8; 254])));
        let header = enc.encode(64).unwrap();
        assert_eq!(header.len(), 10);
        assert_eq!(header[0], 0xFF);
        assert_eq!(&header[1..9], &255u64.to_be_bytes());
        assert_eq!(header[9], 0x00);
    }
}
