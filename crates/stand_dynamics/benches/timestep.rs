mod common;

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use glam::Vec2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use stand_dynamics::prelude::*;

const SIDE: f32 = 200.0;

fn params() -> ParameterFile {
    let sp = common::SPECIES;
    let mut p = ParameterFile::new();
    p.set_scalar("seed_distribution", 1.0)
        .set_species_all("mortality_rate", sp, 0.02)
        .set_species_all("self_thinning_radius", sp, 5.0)
        .set_species_all("self_thinning_radius_increment", sp, 2.0)
        .set_species_all("self_thinning_min_neighbors", sp, 3.0)
        .set_species_all("min_density_for_mortality", sp, 100.0)
        .set_species_all("self_thinning_asymptote", sp, 0.05)
        .set_species_all("self_thinning_diam_effect", sp, 0.05)
        .set_species_all("self_thinning_density_effect", sp, 500.0)
        .set_species_all("min_reproductive_dbh", sp, 20.0)
        .set_species_all("mast_cdf_a", sp, 4.0)
        .set_species_all("mast_cdf_b", sp, -3.0)
        .set_species_all("mast_group", sp, 1.0)
        .set_species_all("seed_producer", sp, 2.0);
    for event in ["mast_", "nonmast_"] {
        let str_mean = if event == "mast_" { 40.0 } else { 4.0 };
        p.set_species_all(&format!("{event}str_mean"), sp, str_mean)
            .set_species_all(&format!("{event}str_sd"), sp, str_mean * 0.3)
            .set_species_all(&format!("{event}beta"), sp, 2.0)
            .set_species_all(&format!("{event}dispersal_kernel"), sp, 0.0)
            .set_species_all(&format!("{event}weibull_dispersal"), sp, 1e-3)
            .set_species_all(&format!("{event}weibull_theta"), sp, 2.0);
    }
    p
}

fn build_runner(trees: usize) -> Option<StandRunner> {
    let combos = combos_for(&[0, 1, 2], &[LifeStage::Adult]);
    let mortality: Vec<Box<dyn MortalityStrategy>> = vec![
        Box::new(StochasticMortality::new(combos.clone())),
        Box::new(SelfThinningMortality::new(combos.clone())),
    ];
    let disperse: Vec<Box<dyn DisperseStrategy>> =
        vec![Box::new(MastingSpatialDisperse::new(combos))];
    let settings = RunSettings::new(Vec2::splat(SIDE))
        .with_number_of_timesteps(100)
        .with_years_per_timestep(5.0)
        .with_seed_grid_cell_size(10.0);
    let mut runner = StandRunner::new(settings, common::lattice_stand(trees, SIDE))
        .with_mortality(MortalityOrg::try_new(mortality).ok()?)
        .with_disperse(DisperseOrg::try_new(disperse).ok()?);
    runner.setup(&params()).ok()?;
    Some(runner)
}

fn timestep_benches(c: &mut Criterion) {
    let mut group = c.benchmark_group("timestep/full");

    for &trees in &[250usize, 1000, 4000] {
        group.throughput(common::trees_throughput(trees));
        group.bench_with_input(BenchmarkId::from_parameter(trees), &trees, |b, &n| {
            b.iter_batched(
                || build_runner(n),
                |runner| {
                    if let Some(mut runner) = runner {
                        let mut rng = StdRng::seed_from_u64(0xF0E57);
                        black_box(runner.run_timestep(&mut rng).ok());
                    }
                },
                BatchSize::LargeInput,
            );
        });
    }

    group.finish();
}

fn setup_benches(c: &mut Criterion) {
    let mut group = c.benchmark_group("timestep/setup");

    for &trees in &[250usize, 4000] {
        group.bench_with_input(BenchmarkId::from_parameter(trees), &trees, |b, &n| {
            b.iter(|| black_box(build_runner(n).is_some()));
        });
    }

    group.finish();
}

criterion_group! {
    name = benches;
    config = common::default_criterion();
    targets = timestep_benches,
              setup_benches
}
criterion_main!(benches);
