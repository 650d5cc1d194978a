mod common;

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use glam::Vec2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use stand_dynamics::disperse::kernel::scatter_seeds;
use stand_dynamics::prelude::{DispersalKernel, DistanceCdf, Plot, SeedGrid};

fn kernels() -> [(&'static str, DispersalKernel); 2] {
    [
        (
            "weibull",
            DispersalKernel::Weibull {
                dispersal: 1e-3,
                theta: 2.0,
            },
        ),
        ("lognormal", DispersalKernel::Lognormal { x0: 8.0, xb: 0.7 }),
    ]
}

fn cdf_build_benches(c: &mut Criterion) {
    let mut group = c.benchmark_group("kernel/build");

    for &horizon in &[100usize, 400, 1000] {
        for (name, kernel) in kernels() {
            group.bench_with_input(BenchmarkId::new(name, horizon), &horizon, |b, &h| {
                b.iter(|| {
                    let cdf = DistanceCdf::build(&kernel, h, 0);
                    black_box(cdf.is_ok());
                });
            });
        }
    }

    group.finish();
}

fn seed_placement_benches(c: &mut Criterion) {
    let mut group = c.benchmark_group("kernel/scatter");
    let plot = Plot::new(Vec2::new(200.0, 200.0));
    let horizon = DistanceCdf::horizon(&plot);

    for (name, kernel) in kernels() {
        let Ok(cdf) = DistanceCdf::build(&kernel, horizon, 0) else {
            continue;
        };
        for &seeds in &[100u64, 10_000] {
            group.throughput(common::trees_throughput(seeds as usize));
            group.bench_with_input(BenchmarkId::new(name, seeds), &seeds, |b, &n| {
                let mut grid = SeedGrid::new(&plot, 10.0, 1).ok();
                let mut rng = StdRng::seed_from_u64(0x5EED);
                b.iter(|| {
                    if let Some(grid) = grid.as_mut() {
                        grid.timestep_cleanup();
                        scatter_seeds(grid, &plot, Vec2::new(100.0, 100.0), 0, n, &cdf, &mut rng);
                        black_box(grid.total());
                    }
                });
            });
        }
    }

    group.finish();
}

criterion_group! {
    name = benches;
    config = common::default_criterion();
    targets = cdf_build_benches,
              seed_placement_benches
}
criterion_main!(benches);
