use std::collections::BTreeMap;

use glam::Vec2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use stand_dynamics::prelude::*;
use stand_dynamics_examples::{init_tracing, random_stand, StandLayout};

const SPECIES: [&str; 3] = ["Fir", "Beech", "Spruce"];

fn main() -> anyhow::Result<()> {
    init_tracing();
    let extent = Vec2::new(100.0, 100.0);
    let mut rng = StdRng::seed_from_u64(7);
    let layout = StandLayout::new(extent, 1200, &SPECIES).with_dbh(5.0, 90.0);
    let population = random_stand(&layout, &mut rng);

    let adults = combos_for(&[0, 1, 2], &[LifeStage::Adult]);
    let strategies: Vec<Box<dyn MortalityStrategy>> = vec![
        Box::new(AggregatedMortality::new(combos_for(&[2], &[LifeStage::Adult]))),
        Box::new(SelfThinningMortality::new(adults.clone())),
        Box::new(SenescenceMortality::new(combos_for(&[1], &[LifeStage::Adult]))),
        Box::new(StochasticMortality::new(adults)),
    ];
    let settings = RunSettings::new(extent)
        .with_years_per_timestep(5.0)
        .with_number_of_timesteps(20);
    let mut runner =
        StandRunner::new(settings, population).with_mortality(MortalityOrg::try_new(strategies)?);
    runner.setup(&params())?;

    let mut kills: BTreeMap<String, usize> = BTreeMap::new();
    let mut sink = FnSink::new(|event| {
        if let StandEvent::TreeKilled { strategy, .. } = event {
            *kills.entry(strategy).or_default() += 1;
        }
    });
    let reports = runner.run_with_events(&mut rng, &mut sink)?;

    println!("timestep  deaths  trees");
    let mut alive = layout.trees;
    for r in &reports {
        alive -= r.removed;
        println!("{:>8}  {:>6}  {:>5}", r.timestep, r.deaths(), alive);
    }
    println!();
    for (strategy, n) in &kills {
        println!("{strategy:<24} {n:>5}");
    }
    Ok(())
}

fn params() -> ParameterFile {
    let mut p = ParameterFile::new();
    p.set_species_all("mortality_rate", SPECIES, 0.004)
        .set_species_all("self_thinning_radius", SPECIES, 4.0)
        .set_species_all("self_thinning_radius_increment", SPECIES, 1.0)
        .set_species_all("self_thinning_min_neighbors", SPECIES, 4.0)
        .set_species_all("min_density_for_mortality", SPECIES, 800.0)
        .set_species_all("self_thinning_asymptote", SPECIES, 0.1)
        .set_species_all("self_thinning_diam_effect", SPECIES, 0.05)
        .set_species_all("self_thinning_density_effect", SPECIES, 1500.0)
        .set_species("senescence_alpha", "Beech", -8.0)
        .set_species("senescence_beta", "Beech", 0.08)
        .set_species("senescence_dbh", "Beech", 60.0)
        .set_species("senescence_background_rate", "Beech", 0.002)
        .set_scalar("aggregated_return_interval", 40.0)
        .set_scalar("aggregated_clump_size", 6.0)
        .set_scalar("aggregated_clump_distribution", 1.0)
        .set_scalar("aggregated_clumping_parameter", 1.5)
        .set_species("aggregated_mortality_rate", "Spruce", 0.05);
    p
}
