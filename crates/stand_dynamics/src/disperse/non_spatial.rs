//! Background seed rain that ignores parent trees.
use glam::Vec2;

use crate::applicability::{SpeciesIndex, SpeciesTypeCombo, SpeciesValues};
use crate::behavior::SetupContext;
use crate::disperse::{DisperseEnv, DisperseStrategy};
use crate::error::Result;
use crate::random::{rand01, random_round};

/// Adds `seed_rain_per_ha` seeds per hectare per year of every species it
/// covers, spread uniformly over the plot one seed at a time.
#[derive(Debug, Clone)]
pub struct NonSpatialDisperse {
    combos: Vec<SpeciesTypeCombo>,
    rain: Option<SpeciesValues<f64>>,
}

impl NonSpatialDisperse {
    pub const NAME: &'static str = "NonSpatialDisperse";

    pub fn new(combos: Vec<SpeciesTypeCombo>) -> Self {
        Self { combos, rain: None }
    }

    /// Expected seeds of `species` per timestep over the whole plot.
    pub fn expected_seeds(&self, species: usize, area_ha: f64, years: f64) -> f64 {
        self.rain
            .as_ref()
            .and_then(|r| r.get(species))
            .map_or(0.0, |&r| r * area_ha * years)
    }
}

impl DisperseStrategy for NonSpatialDisperse {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn combos(&self) -> &[SpeciesTypeCombo] {
        &self.combos
    }

    fn setup(&mut self, ctx: &mut SetupContext<'_>) -> Result<()> {
        let index: SpeciesIndex = ctx.species_index(&self.combos);
        let rain = ctx
            .binder(Self::NAME)
            .species_non_negative("seed_rain_per_ha", &index)?;
        self.rain = Some(rain);
        Ok(())
    }

    fn add_seeds(&mut self, env: &mut DisperseEnv<'_>) -> Result<()> {
        let Some(rain) = self.rain.as_ref() else {
            return Ok(());
        };
        let area = f64::from(env.plot.area_ha());
        let extent = env.plot.extent;
        for (species, _) in rain.iter() {
            let expected = self.expected_seeds(species, area, env.years_per_timestep);
            let count = random_round(env.rng, expected);
            for _ in 0..count {
                let x = rand01(env.rng) as f32 * extent.x;
                let y = rand01(env.rng) as f32 * extent.y;
                env.grid
                    .add_seeds_at_point(env.plot.wrap(Vec2::new(x, y)), species, 1.0);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::applicability::combos_for;
    use crate::disperse::SeedGrid;
    use crate::params::ParameterFile;
    use crate::population::{LifeStage, TreePopulation};
    use crate::settings::RunSettings;

    #[test]
    fn seed_rain_scales_with_area_and_timestep() {
        let mut pop = TreePopulation::new(["Ash", "Elm"]);
        let mut params = ParameterFile::new();
        params
            .set_species("seed_rain_per_ha", "Ash", 100.0)
            .set_species("seed_rain_per_ha", "Elm", 0.0);
        let settings = RunSettings::new(Vec2::new(100.0, 50.0)).with_years_per_timestep(3.0);

        let mut rain = NonSpatialDisperse::new(combos_for(&[0, 1], &[LifeStage::Adult]));
        rain.setup(&mut SetupContext::new(&mut pop, &params, &settings))
            .unwrap();
        assert_eq!(rain.expected_seeds(0, 0.5, 3.0), 150.0);

        let plot = settings.plot();
        let mut grid = SeedGrid::new(&plot, 10.0, 2).unwrap();
        let mut rng = StdRng::seed_from_u64(4);
        let mut sink = ();
        let mut env = DisperseEnv {
            population: &mut pop,
            grid: &mut grid,
            plot: &plot,
            years_per_timestep: 3.0,
            rng: &mut rng,
            sink: &mut sink,
        };
        rain.add_seeds(&mut env).unwrap();
        assert_eq!(grid.species_total(0), 150.0);
        assert_eq!(grid.species_total(1), 0.0);
    }
}
