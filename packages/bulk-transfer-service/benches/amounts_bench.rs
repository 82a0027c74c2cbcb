use bulk_transfer_service::amounts::{format_euros, to_cents};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn bench_to_cents(c: &mut Criterion) {
    c.bench_function("to_cents", |b| {
        b.iter(|| to_cents(black_box("1234.56")))
    });
}

fn bench_format_euros(c: &mut Criterion) {
    c.bench_function("format_euros", |b| {
        b.iter(|| format_euros(black_box(123_456)))
    });
}

criterion_group!(benches, bench_to_cents, bench_format_euros);
criterion_main!(benches);
