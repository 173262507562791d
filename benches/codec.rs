//! Benchmarks for windowed CSV decoding.
//!
//! Decoding a window re-reads the file from the start, so late windows cost
//! more than early ones. These benchmarks track that cost:
//! - First window of a 10,000-row file
//! - Last window of a 10,000-row file
//! - Encoding a 1,000-row window

// Criterion macros generate items without docs - this is expected for benchmarks
// Benchmarks use expect/unwrap for simplicity - panics are acceptable in benchmarks
#![allow(missing_docs)]
#![allow(clippy::expect_used, clippy::unwrap_used)]

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::io::Cursor;

use datasync::Row;
use datasync::io::{CsvCodec, FormatCodec};

const FILE_ROWS: usize = 10_000;
const WINDOW: usize = 1_000;

fn columns() -> Vec<String> {
    ["id", "name", "email", "city"].map(String::from).to_vec()
}

fn rows(count: usize) -> Vec<Row> {
    (0..count)
        .map(|i| {
            Row::from_pairs([
                ("id", i.to_string()),
                ("name", format!("user {i}")),
                ("email", format!("user{i}@example.com")),
                ("city", "Springfield, IL".to_string()),
            ])
        })
        .collect()
}

fn bench_decode_window(c: &mut Criterion) {
    let columns = columns();
    let bytes = CsvCodec::new()
        .encode(&rows(FILE_ROWS), &columns, true)
        .unwrap();

    let mut group = c.benchmark_group("csv_decode_window");
    for offset in [0, FILE_ROWS - WINDOW] {
        group.bench_with_input(BenchmarkId::from_parameter(offset), &offset, |b, &offset| {
            b.iter(|| {
                let stream = Box::new(Cursor::new(bytes.clone()));
                let window = CsvCodec::new()
                    .decode(stream, Some(&columns), offset, WINDOW)
                    .unwrap();
                black_box(window.rows_consumed)
            });
        });
    }
    group.finish();
}

fn bench_encode_window(c: &mut Criterion) {
    let columns = columns();
    let window = rows(WINDOW);

    c.bench_function("csv_encode_window", |b| {
        b.iter(|| black_box(CsvCodec::new().encode(&window, &columns, false).unwrap()));
    });
}

criterion_group!(benches, bench_decode_window, bench_encode_window);
criterion_main!(benches);
