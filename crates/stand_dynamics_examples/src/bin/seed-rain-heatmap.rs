use glam::Vec2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use stand_dynamics::prelude::*;
use stand_dynamics_examples::{
    init_tracing, random_stand, render_seed_grid_to_png, HeatmapConfig, StandLayout,
};

const SPECIES: [&str; 2] = ["Oak", "Birch"];

fn main() -> anyhow::Result<()> {
    init_tracing();
    let extent = Vec2::new(200.0, 200.0);
    let mut rng = StdRng::seed_from_u64(2024);
    let layout = StandLayout::new(extent, 150, &SPECIES).with_dbh(5.0, 70.0);
    let mut population = random_stand(&layout, &mut rng);

    let settings = RunSettings::new(extent)
        .with_years_per_timestep(5.0)
        .with_seed_grid_cell_size(5.0);
    settings.validate()?;

    let adults = combos_for(&[0, 1], &[LifeStage::Adult]);
    let strategies: Vec<Box<dyn DisperseStrategy>> = vec![
        Box::new(NonSpatialDisperse::new(adults.clone())),
        Box::new(SpatialDisperse::new(adults)),
    ];
    let mut org = DisperseOrg::try_new(strategies)?;
    let params = params();
    org.setup(&mut SetupContext::new(&mut population, &params, &settings))?;

    let report = org.do_disperse(&mut population, &settings, &mut rng)?;
    println!(
        "raw seeds {:.0}, after Poisson adjustment {:.0}",
        report.raw_total, report.adjusted_total
    );

    let Some(grid) = org.grid() else {
        anyhow::bail!("disperse orchestrator has no grid after setup");
    };
    let gaps = (0..grid.height)
        .flat_map(|iy| (0..grid.width).map(move |ix| (ix, iy)))
        .filter(|&(ix, iy)| grid.is_gap(ix, iy))
        .count();
    println!("{gaps} of {} cells are gaps", grid.cell_count());

    let all = HeatmapConfig::new(4).with_gap_outline([90, 140, 255]);
    render_seed_grid_to_png(grid, &all, "seed-rain-heatmap.png")?;
    for (sp, name) in SPECIES.iter().enumerate() {
        let config = HeatmapConfig::new(4).with_species(sp);
        render_seed_grid_to_png(grid, &config, format!("seed-rain-heatmap-{name}.png"))?;
    }
    Ok(())
}

fn params() -> ParameterFile {
    let mut p = ParameterFile::new();
    p.set_scalar("seed_distribution", 1.0)
        .set_scalar("use_gap_dispersal", 1.0)
        .set_scalar("min_canopy_dbh", 30.0)
        .set_species_all("seed_rain_per_ha", SPECIES, 20.0)
        .set_species_all("min_reproductive_dbh", SPECIES, 15.0)
        .set_species("str", "Oak", 30.0)
        .set_species("str", "Birch", 120.0)
        .set_species_all("beta", SPECIES, 2.0)
        .set_species("dispersal_kernel", "Oak", 0.0)
        .set_species("weibull_dispersal", "Oak", 5e-3)
        .set_species("weibull_theta", "Oak", 2.0)
        .set_species("dispersal_kernel", "Birch", 1.0)
        .set_species("lognormal_x0", "Birch", 20.0)
        .set_species("lognormal_xb", "Birch", 0.8)
        .set_species_all("gap_str", SPECIES, 60.0)
        .set_species_all("gap_beta", SPECIES, 2.0)
        .set_species_all("gap_dispersal_kernel", SPECIES, 0.0)
        .set_species_all("gap_weibull_dispersal", SPECIES, 2e-3)
        .set_species_all("gap_weibull_theta", SPECIES, 2.0);
    p
}
