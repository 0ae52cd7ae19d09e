//! Session state codec benchmarks
//!
//! Measures the offline half of the pipeline:
//! - token serialization in both record layouts
//! - token parsing (base64, JSON, DER) back into a session
//! - rebuilding a session from legacy fields
//!
//! Run with: cargo bench --bench codec_performance

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use tls_resumption::resumption::{RecordLayout, SessionCodec, SessionState};

fn sample_state(ticket_len: usize) -> SessionState {
    let ticket = vec![0x5a; ticket_len];
    SessionState::from_legacy_fields(&ticket, 0x0303, 0xc02f, &[0x42; 48])
        .expect("valid legacy fields")
}

fn bench_serialize(c: &mut Criterion) {
    let mut group = c.benchmark_group("serialize");
    let state = sample_state(192);

    for layout in [RecordLayout::Opaque, RecordLayout::Legacy] {
        let codec = SessionCodec::new(layout);
        let id = BenchmarkId::from_parameter(format!("{:?}", layout));
        group.bench_with_input(id, &codec, |b, codec| {
            b.iter(|| black_box(codec.serialize(black_box(&state)).unwrap()));
        });
    }

    group.finish();
}

fn bench_parse(c: &mut Criterion) {
    let mut group = c.benchmark_group("parse");

    for ticket_len in [64usize, 192, 1024] {
        let codec = SessionCodec::default();
        let token = codec.serialize(&sample_state(ticket_len)).unwrap();

        group.throughput(Throughput::Bytes(token.len() as u64));
        group.bench_with_input(BenchmarkId::new("opaque", ticket_len), &token, |b, token| {
            b.iter(|| black_box(codec.parse(black_box(token)).unwrap()));
        });
    }

    let legacy = SessionCodec::new(RecordLayout::Legacy);
    let token = legacy.serialize(&sample_state(192)).unwrap();
    group.bench_function("legacy", |b| {
        b.iter(|| black_box(legacy.parse(black_box(&token)).unwrap()));
    });

    group.finish();
}

fn bench_legacy_reconstruction(c: &mut Criterion) {
    let ticket = vec![0x5a; 192];
    let secret = [0x42; 48];

    c.bench_function("from_legacy_fields", |b| {
        b.iter(|| {
            let state = SessionState::from_legacy_fields(
                black_box(&ticket),
                0x0303,
                0xc02f,
                black_box(&secret),
            );
            black_box(state.unwrap())
        });
    });
}

criterion_group!(benches, bench_serialize, bench_parse, bench_legacy_reconstruction);
criterion_main!(benches);
