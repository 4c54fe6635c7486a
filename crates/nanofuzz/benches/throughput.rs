//! Measures `Context::next` throughput for a handful of representative
//! patterns.
//!
//! Run with: `cargo bench --bench throughput`

use std::time::Duration;

use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use nanofuzz::{open, OpenOptions};

fn bench_next(c: &mut Criterion) {
    let mut group = c.benchmark_group("nanofuzz_next");
    group.measurement_time(Duration::from_secs(10));
    group.warm_up_time(Duration::from_secs(2));
    group.throughput(Throughput::Elements(1));

    let patterns = [
        ("literal", "the quick brown fox jumps over the lazy dog"),
        ("range_repetition", "[A-Za-z0-9]{64}"),
        ("alternation", "(ab|cd|ef|gh){16}"),
        ("declaration_paste", "(AB){8}<$X>-<@X><@X><@X>"),
    ];

    for (name, pattern) in patterns {
        let mut ctx = open(pattern, OpenOptions { seed: 0xDEAD_BEEF, ..Default::default() }).unwrap();
        group.bench_function(name, |b| b.iter(|| ctx.next().unwrap().unwrap().len()));
    }

    group.finish();
}

criterion_group!(benches, bench_next);
criterion_main!(benches);
