//! Frame encoding/decoding benchmarks.

use bytes::{Bytes, BytesMut};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use stripmill_protocol::{Decoder, Frame, FrameKind, MAX_PAYLOAD_SIZE};

fn bench_frame_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_encode");

    for size in [1_000, 100_000, 1_000_000] {
        let frame = Frame::data(Bytes::from(vec![0x42u8; size]));

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &frame, |b, frame| {
            b.iter(|| black_box(frame.encode().unwrap()));
        });
    }

    group.finish();
}

fn bench_frame_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("frame_decode");

    for size in [1_000, 100_000, 1_000_000] {
        let encoded = Frame::data(Bytes::from(vec![0x42u8; size]))
            .encode()
            .unwrap();

        group.throughput(Throughput::Bytes(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &encoded, |b, encoded| {
            b.iter(|| {
                let mut buf = encoded.clone();
                black_box(Frame::decode(&mut buf, FrameKind::Data, MAX_PAYLOAD_SIZE).unwrap())
            });
        });
    }

    group.finish();
}

fn bench_decoder_chunked(c: &mut Criterion) {
    let mut group = c.benchmark_group("decoder_chunked");

    // Ten 100 KB frames arriving in socket-sized chunks
    let mut stream = BytesMut::new();
    for _ in 0..10 {
        stream.extend_from_slice(&Frame::data(vec![7u8; 100_000]).encode().unwrap());
    }

    for chunk in [4_096, 65_536] {
        group.throughput(Throughput::Bytes(stream.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(chunk), &chunk, |b, &chunk| {
            b.iter(|| {
                let mut decoder = Decoder::new();
                let mut frames = 0;
                for piece in stream.chunks(chunk) {
                    decoder.extend(piece);
                    while decoder.decode_data().unwrap().is_some() {
                        frames += 1;
                    }
                }
                black_box(frames)
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_frame_encode,
    bench_frame_decode,
    bench_decoder_chunked,
);

criterion_main!(benches);
