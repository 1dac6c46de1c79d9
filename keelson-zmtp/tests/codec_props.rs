//! Property tests: framing survives arbitrary chunking on both sides.

use bytes::Bytes;
use keelson_core::message::Msg;
use keelson_zmtp::codec::{Decoder, Encoder, V1Decoder, V1Encoder, V2Decoder, V2Encoder};
use proptest::prelude::*;

fn parts() -> impl Strategy<Value = Vec<(Vec<u8>, bool)>> {
    prop::collection::vec(
        (prop::collection::vec(any::<u8>(), 0..700), any::<bool>()),
        1..8,
    )
}

fn encode_all(enc: &mut dyn Encoder, parts: &[(Vec<u8>, bool)], chunk: usize) -> Vec<u8> {
    let mut wire = Vec::new();
    for (body, more) in parts {
        enc.load_msg(Msg::from_part(Bytes::from(body.clone()), *more));
        while let Some(out) = enc.encode(chunk) {
            assert!(out.len() <= chunk);
            wire.extend_from_slice(&out);
        }
    }
    wire
}

fn decode_split(dec: &mut dyn Decoder, wire: &[u8], split: usize) -> Vec<Msg> {
    let mut out = Vec::new();
    for mut piece in wire.chunks(split) {
        loop {
            let (used, msg) = dec.decode_from(piece).unwrap();
            piece = &piece[used..];
            match msg {
                Some(msg) => out.push(msg),
                None => break,
            }
        }
    }
    out
}

/// Feed through the zero-copy read path, as an engine does.
fn decode_reads(dec: &mut dyn Decoder, wire: &[u8], read_size: usize) -> Vec<Msg> {
    let mut out = Vec::new();
    let mut pos = 0;
    while pos < wire.len() {
        let buf = dec.read_buf();
        let n = buf.len().min(read_size).min(wire.len() - pos);
        buf[..n].copy_from_slice(&wire[pos..pos + n]);
        dec.filled(n);
        pos += n;
        while let Some(msg) = dec.decode().unwrap() {
            out.push(msg);
        }
    }
    out
}

fn assert_same(decoded: &[Msg], parts: &[(Vec<u8>, bool)]) {
    assert_eq!(decoded.len(), parts.len());
    for (msg, (body, more)) in decoded.iter().zip(parts) {
        assert_eq!(msg.data().as_ref(), &body[..]);
        assert_eq!(msg.has_more(), *more);
    }
}

proptest! {
    #[test]
    fn v2_survives_fragmentation(parts in parts(), chunk in 1usize..64, split in 1usize..97) {
        let wire = encode_all(&mut V2Encoder::default(), &parts, chunk);
        let decoded = decode_split(&mut V2Decoder::with_limits(64, u64::MAX), &wire, split);
        assert_same(&decoded, &parts);
    }

    #[test]
    fn v1_survives_fragmentation(parts in parts(), chunk in 1usize..64, split in 1usize..97) {
        let wire = encode_all(&mut V1Encoder::default(), &parts, chunk);
        let decoded = decode_split(&mut V1Decoder::with_limits(64, u64::MAX), &wire, split);
        assert_same(&decoded, &parts);
    }

    #[test]
    fn read_path_matches_copy_path(parts in parts(), bufsize in 1usize..300, read_size in 1usize..512) {
        let wire = encode_all(&mut V2Encoder::default(), &parts, usize::MAX);
        let decoded = decode_reads(&mut V2Decoder::with_limits(bufsize, u64::MAX), &wire, read_size);
        assert_same(&decoded, &parts);

        let wire = encode_all(&mut V1Encoder::default(), &parts, usize::MAX);
        let decoded = decode_reads(&mut V1Decoder::with_limits(bufsize, u64::MAX), &wire, read_size);
        assert_same(&decoded, &parts);
    }

    #[test]
    fn decoder_never_panics_on_garbage(input in prop::collection::vec(any::<u8>(), 0..256)) {
        let mut v1 = V1Decoder::with_limits(32, 1 << 16);
        let mut v2 = V2Decoder::with_limits(32, 1 << 16);
        let _ = decode_split_fallible(&mut v1, &input);
        let _ = decode_split_fallible(&mut v2, &input);
    }
}

fn decode_split_fallible(dec: &mut dyn Decoder, mut input: &[u8]) -> usize {
    let mut count = 0;
    while let Ok((used, msg)) = dec.decode_from(input) {
        input = &input[used..];
        match msg {
            Some(_) => count += 1,
            None => break,
        }
    }
    count
}
