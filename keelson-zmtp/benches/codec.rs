//! Codec benchmarks: encode and decode throughput per revision
//!
//! Measures: how fast can a batch of messages be framed and parsed back?
//!
//! The decode side goes through `read_buf`/`filled` like an engine does,
//! so large bodies take the zero-copy path.

use bytes::Bytes;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use keelson_core::message::Msg;
use keelson_zmtp::codec::{Decoder, Encoder, V1Decoder, V1Encoder, V2Decoder, V2Encoder};
use keelson_zmtp::config::{IN_BATCH_SIZE, OUT_BATCH_SIZE};
use std::time::Duration;

const MESSAGE_SIZES: &[usize] = &[16, 256, 4096, 65536];
const BATCH: usize = 256;

fn encode_batch(enc: &mut dyn Encoder, payload: &Bytes) -> Vec<u8> {
    let mut wire = Vec::with_capacity(BATCH * (payload.len() + 10));
    for _ in 0..BATCH {
        enc.load_msg(Msg::new(payload.clone()));
        while let Some(chunk) = enc.encode(OUT_BATCH_SIZE) {
            wire.extend_from_slice(&chunk);
        }
    }
    wire
}

fn decode_batch(dec: &mut dyn Decoder, wire: &[u8]) -> usize {
    let mut pos = 0;
    let mut count = 0;
    while pos < wire.len() {
        let buf = dec.read_buf();
        let n = buf.len().min(wire.len() - pos);
        buf[..n].copy_from_slice(&wire[pos..pos + n]);
        dec.filled(n);
        pos += n;
        while let Ok(Some(msg)) = dec.decode() {
            black_box(msg);
            count += 1;
        }
    }
    count
}

fn encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec/encode");
    group.measurement_time(Duration::from_secs(5));

    for &size in MESSAGE_SIZES {
        let payload = Bytes::from(vec![0xA5u8; size]);
        group.throughput(Throughput::Bytes((size * BATCH) as u64));

        group.bench_with_input(BenchmarkId::new("v1", format!("{size}B")), &payload, |b, p| {
            let mut enc = V1Encoder::default();
            b.iter(|| black_box(encode_batch(&mut enc, p)));
        });
        group.bench_with_input(BenchmarkId::new("v2", format!("{size}B")), &payload, |b, p| {
            let mut enc = V2Encoder::default();
            b.iter(|| black_box(encode_batch(&mut enc, p)));
        });
    }
    group.finish();
}

fn decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("codec/decode");
    group.measurement_time(Duration::from_secs(5));

    for &size in MESSAGE_SIZES {
        let payload = Bytes::from(vec![0x5Au8; size]);
        group.throughput(Throughput::Bytes((size * BATCH) as u64));

        let v1_wire = encode_batch(&mut V1Encoder::default(), &payload);
        group.bench_with_input(BenchmarkId::new("v1", format!("{size}B")), &v1_wire, |b, w| {
            b.iter(|| {
                let mut dec = V1Decoder::with_limits(IN_BATCH_SIZE, u64::MAX);
                assert_eq!(decode_batch(&mut dec, w), BATCH);
            });
        });

        let v2_wire = encode_batch(&mut V2Encoder::default(), &payload);
        group.bench_with_input(BenchmarkId::new("v2", format!("{size}B")), &v2_wire, |b, w| {
            b.iter(|| {
                let mut dec = V2Decoder::with_limits(IN_BATCH_SIZE, u64::MAX);
                assert_eq!(decode_batch(&mut dec, w), BATCH);
            });
        });
    }
    group.finish();
}

criterion_group!(benches, encode, decode);
criterion_main!(benches);
