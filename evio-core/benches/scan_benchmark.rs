//! Benchmarks for EVIO classification and block reading.
//!
//! Run with: cargo bench

use byteorder::{BigEndian, WriteBytesExt};
use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use evio_core::{
    parser, EventClassifier, EvioReader, FormatVersion, ReadStatus, RecordSource,
    MAX_RECORD_WORDS,
};
use std::io::Cursor;

const BLOCK_WORDS: usize = 8192;

/// Synthetic CODA 2 stream: 100k physics records of 40 words each.
fn synthetic_records() -> Vec<u32> {
    let mut stream = Vec::new();
    for i in 0..100_000u32 {
        let mut record = vec![0u32; 40];
        record[0] = 39;
        record[1] = (1 << 16) | 0x10cc;
        record[4] = i;
        stream.extend_from_slice(&record);
    }
    stream
}

fn to_evio_bytes(stream: &[u32]) -> Vec<u8> {
    let payload = BLOCK_WORDS - parser::BLOCK_HEADER_WORDS;
    let mut bytes = Vec::new();
    for (n, chunk) in stream.chunks(payload).enumerate() {
        let header = [
            BLOCK_WORDS as u32,
            n as u32 + 1,
            8,
            8,
            (8 + chunk.len()) as u32,
            2,
            0,
            parser::BLOCK_MAGIC,
        ];
        for &w in header.iter().chain(chunk) {
            bytes.write_u32::<BigEndian>(w).unwrap();
        }
        for _ in chunk.len()..payload {
            bytes.write_u32::<BigEndian>(0).unwrap();
        }
    }
    bytes
}

fn classify_benchmark(c: &mut Criterion) {
    let stream = synthetic_records();

    let mut group = c.benchmark_group("classify");
    group.throughput(Throughput::Elements(100_000));

    group.bench_function("coda2_physics_100k", |b| {
        b.iter(|| {
            let mut classifier = EventClassifier::new();
            let mut physics = 0u64;
            for record in stream.chunks_exact(40) {
                let c = classifier
                    .classify(black_box(record), FormatVersion::V2)
                    .unwrap();
                physics += u64::from(c.is_physics());
            }
            black_box(physics)
        })
    });

    group.finish();
}

fn read_benchmark(c: &mut Criterion) {
    let bytes = to_evio_bytes(&synthetic_records());

    let mut group = c.benchmark_group("read");
    group.throughput(Throughput::Bytes(bytes.len() as u64));

    group.bench_function("block_stream_100k", |b| {
        let mut buffer = vec![0u32; MAX_RECORD_WORDS];
        b.iter(|| {
            let mut reader = EvioReader::from_reader(Cursor::new(black_box(&bytes[..]))).unwrap();
            let mut records = 0u64;
            while reader.read_next(&mut buffer).unwrap() == ReadStatus::Record {
                records += 1;
            }
            black_box(records)
        })
    });

    group.finish();
}

criterion_group!(benches, classify_benchmark, read_benchmark);
criterion_main!(benches);
