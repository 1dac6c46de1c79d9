#![no_main]

use keelson_core::options::SocketOptions;
use keelson_zmtp::codec::{Decoder, V1Decoder, V2Decoder};
use keelson_zmtp::greeting::HandshakeNegotiator;
use libfuzzer_sys::fuzz_target;

const MAX_MSG_SIZE: u64 = 1 << 20;

fuzz_target!(|data: &[u8]| {
    // Greeting first, then whatever follows goes to the negotiated decoder,
    // the way an engine consumes a connection.
    let mut negotiator = HandshakeNegotiator::new(&SocketOptions::default());
    let (used, negotiated) = negotiator.feed(data);
    let _ = negotiator.take_pending_tail();
    if let Some(negotiated) = negotiated {
        let mut decoder: Box<dyn Decoder> = match negotiated.revision() {
            keelson_zmtp::codec::Revision::V1 => Box::new(V1Decoder::with_limits(64, MAX_MSG_SIZE)),
            keelson_zmtp::codec::Revision::V2 => Box::new(V2Decoder::with_limits(64, MAX_MSG_SIZE)),
        };
        if let keelson_zmtp::greeting::Negotiated::Versionless { prebuffered } = &negotiated {
            decoder.prime(prebuffered);
            drain_buffered(decoder.as_mut());
        }
        drain(decoder.as_mut(), &data[used..]);
    }

    // Raw frames for both revisions, no greeting.
    drain(&mut V1Decoder::with_limits(64, MAX_MSG_SIZE), data);
    drain(&mut V2Decoder::with_limits(64, MAX_MSG_SIZE), data);
});

fn drain(decoder: &mut dyn Decoder, mut input: &[u8]) {
    while let Ok((used, msg)) = decoder.decode_from(input) {
        input = &input[used..];
        if msg.is_none() {
            break;
        }
    }
}

fn drain_buffered(decoder: &mut dyn Decoder) {
    while let Ok(Some(_)) = decoder.decode() {}
}
