use river_course::{
    arc_length_of, binary_search_path, sample_river, BankSolverConfig, MeanderingRiver,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

fn bench_sampling(c: &mut Criterion) {
    let mut group = c.benchmark_group("sampling");
    let river = MeanderingRiver::new(5);
    let solver = BankSolverConfig::default();

    for step in [1.0f32, 2.0, 5.0] {
        group.bench_with_input(BenchmarkId::new("river_2km", step), &step, |b, &step| {
            b.iter(|| sample_river(&river, 0.0, 2000.0, step, &solver).map(|points| points.len()))
        });
    }

    let points = sample_river(&river, 0.0, 2000.0, 2.0, &solver).expect("river samples");
    let total = points.last().map(arc_length_of).unwrap_or(0.0);
    group.bench_function("binary_search_arc", |b| {
        b.iter(|| {
            let mut acc = 0.0f32;
            for i in 0..64 {
                acc += binary_search_path(&points, total * i as f32 / 64.0, arc_length_of);
            }
            black_box(acc)
        })
    });

    group.finish();
}

criterion_group!(sampling_benches, bench_sampling);
criterion_main!(sampling_benches);
