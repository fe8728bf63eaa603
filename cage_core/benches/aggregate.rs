use cage_core::weight::{WeightBounds, aggregate};
use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};

// A day of weighing: a mouse near 25 g, plus climbing spikes and empty-floor zeros
fn synth_day(n: usize, seed: u32) -> Vec<f32> {
    let mut state = seed.max(1);
    let mut next_f32 = || {
        let mut x = state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        state = x;
        (x as f32) / (u32::MAX as f32 + 1.0)
    };
    (0..n)
        .map(|i| match i % 50 {
            0 => 0.0,
            1 => 70.0 + next_f32() * 10.0,
            _ => 25.0 + (next_f32() * 2.0 - 1.0) * 0.4,
        })
        .collect()
}

pub fn bench_aggregate(c: &mut Criterion) {
    let mut g = c.benchmark_group("daily_weight");
    //   BENCH_SAMPLE_SIZE=10 cargo bench -p cage_core --bench aggregate
    if let Ok(ss) = std::env::var("BENCH_SAMPLE_SIZE")
        && let Ok(n) = ss.parse::<usize>()
    {
        g.sample_size(n.max(10));
    }

    let bounds = WeightBounds::default();
    // 5 Hz over 1 h and 8 h of presence
    for &n in &[18_000usize, 144_000] {
        let day = synth_day(n, 0xC0FFEE);
        g.bench_function(format!("mode_{n}_samples"), |b| {
            b.iter_batched(
                || day.clone(),
                |s| {
                    let w = aggregate(black_box(s), bounds);
                    black_box(w.ok());
                },
                BatchSize::LargeInput,
            )
        });
    }
    g.finish();
}

criterion_group!(aggregate_benches, bench_aggregate);
criterion_main!(aggregate_benches);
