use river_course::{create_layout, CourseConfig, EntityCatalog, MeanderingRiver};
use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};

fn bench_layout(c: &mut Criterion) {
    let mut group = c.benchmark_group("layout");
    let config = CourseConfig::builtin();
    let catalog = EntityCatalog::from_rules(&config.entities);

    for length in [500.0f32, 1000.0, 2000.0, 4000.0] {
        group.bench_with_input(BenchmarkId::new("course", length as u32), &length, |b, &length| {
            b.iter_batched(
                || MeanderingRiver::new(11),
                |river| {
                    create_layout(&river, &config, &catalog, 42, (0.0, length))
                        .map(|layout| layout.placements.len())
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

criterion_group!(layout_benches, bench_layout);
criterion_main!(layout_benches);
