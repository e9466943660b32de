use criterion::{criterion_group, criterion_main, Criterion};
use model_engine::generation::{StopSet, Utf8Assembler};

fn bench_utf8_reassembly(c: &mut Criterion) {
    let text = "Streaming 世界 tokens ✓ with mixed-width 🦀 text pieces. ".repeat(16);
    let bytes = text.as_bytes();

    c.bench_function("utf8_reassembly_4_byte_pieces", |b| {
        b.iter(|| {
            let mut assembler = Utf8Assembler::new();
            let mut released = 0;
            for piece in bytes.chunks(4) {
                released += assembler.push(piece).len();
            }
            std::hint::black_box(released);
        });
    });
}

fn bench_stop_scanning(c: &mut Criterion) {
    let stops = StopSet::new(vec![
        "<|end|>".to_string(),
        "</s>".to_string(),
        "\n\n".to_string(),
    ]);
    let text = "a plausible generation that never quite reaches a stop <|en".repeat(4);

    c.bench_function("stop_scan_partial_tail", |b| {
        b.iter(|| {
            std::hint::black_box(stops.scan(&text));
        });
    });
}

criterion_group!(benches, bench_utf8_reassembly, bench_stop_scanning);
criterion_main!(benches);
