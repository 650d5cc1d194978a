//! Episodic, spatially clumped mortality.
//!
//! Each timestep an episode occurs with probability `T / aggregated_return_interval`.
//! During an episode every live tree becomes a clump seed with probability
//! `p / N`, where `p` is the species' per-timestep mortality and `N` the clump
//! size; the seed and its `N - 1` nearest live neighbors die together. Kill
//! selection happens in `pre_mortality`, before any tree is evaluated.
use std::collections::HashSet;

use rand::RngCore;
use tracing::debug;

use crate::applicability::{AppliesTo, SpeciesTypeCombo, SpeciesValues};
use crate::behavior::{compound_probability, SetupContext};
use crate::error::Result;
use crate::mortality::{
    widening_radii, DeathCause, MortalityEnv, MortalityStrategy, MIN_SEARCH_INCREMENT,
};
use crate::population::{Tree, TreeId};
use crate::random::{chance, negative_binomial};

/// How many trees die together.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ClumpSize {
    /// Every clump holds exactly this many trees.
    Fixed(usize),
    /// Clump size drawn from a negative binomial with this mean and clumping
    /// parameter, at least 1.
    NegativeBinomial { mean: f64, clumping: f64 },
}

impl ClumpSize {
    fn mean(&self) -> f64 {
        match *self {
            ClumpSize::Fixed(n) => n as f64,
            ClumpSize::NegativeBinomial { mean, .. } => mean,
        }
    }

    fn draw(&self, rng: &mut dyn RngCore) -> usize {
        match *self {
            ClumpSize::Fixed(n) => n,
            ClumpSize::NegativeBinomial { mean, clumping } => {
                (negative_binomial(rng, mean, clumping) as usize).max(1)
            }
        }
    }
}

#[derive(Debug, Clone)]
struct Bound {
    return_interval: f64,
    timestep_probability: SpeciesValues<f64>,
    clump: ClumpSize,
    search_increment: f32,
    applies: AppliesTo,
}

#[derive(Debug, Clone)]
pub struct AggregatedMortality {
    combos: Vec<SpeciesTypeCombo>,
    bound: Option<Bound>,
    doomed: HashSet<TreeId>,
}

impl AggregatedMortality {
    pub const NAME: &'static str = "AggregatedMortality";

    pub fn new(combos: Vec<SpeciesTypeCombo>) -> Self {
        Self {
            combos,
            bound: None,
            doomed: HashSet::new(),
        }
    }

    /// Trees selected to die this timestep.
    pub fn doomed(&self) -> &HashSet<TreeId> {
        &self.doomed
    }

    fn eligible(bound: &Bound, tree: &Tree, env: &MortalityEnv<'_>) -> bool {
        bound.applies.applies(tree.species(), tree.stage()) && !env.is_dead(tree)
    }

    /// Adds up to `wanted` nearest eligible neighbors of `seed` to the kill set.
    fn kill_neighbors(
        bound: &Bound,
        doomed: &mut HashSet<TreeId>,
        seed: &Tree,
        wanted: usize,
        env: &MortalityEnv<'_>,
    ) {
        if wanted == 0 {
            return;
        }
        let max_radius = 0.5 * env.plot.extent.x.min(env.plot.extent.y);
        let increment = bound.search_increment;
        for radius in widening_radii(increment, max_radius, increment) {
            let mut found: Vec<(f32, TreeId)> = env
                .population
                .find_within(env.plot, seed.position(), radius, 0.0)
                .filter(|(_, t)| {
                    t.id() != seed.id()
                        && !doomed.contains(&t.id())
                        && Self::eligible(bound, t, env)
                })
                .map(|(_, t)| (env.plot.distance_squared(seed.position(), t.position()), t.id()))
                .collect();

            if found.len() >= wanted || radius >= max_radius {
                found.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
                doomed.extend(found.into_iter().take(wanted).map(|(_, id)| id));
                return;
            }
        }
    }
}

impl MortalityStrategy for AggregatedMortality {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn combos(&self) -> &[SpeciesTypeCombo] {
        &self.combos
    }

    fn setup(&mut self, ctx: &mut SetupContext<'_>) -> Result<()> {
        let index = ctx.species_index(&self.combos);
        let b = ctx.binder(Self::NAME);

        let return_interval = b.single("aggregated_return_interval")?;
        if return_interval.is_nan() || return_interval <= 0.0 {
            return Err(b.reject("aggregated_return_interval", "must be > 0"));
        }
        let annual = b.species_probability("aggregated_mortality_rate", &index)?;
        let years = ctx.settings.years_per_timestep;

        let size = b.single("aggregated_clump_size")?;
        if size.is_nan() || size < 1.0 {
            return Err(b.reject("aggregated_clump_size", format!("{size} must be >= 1")));
        }
        let clump = match b.single_code("aggregated_clump_distribution")? {
            0 => ClumpSize::Fixed(size.round() as usize),
            1 => {
                let clumping = b.single("aggregated_clumping_parameter")?;
                if clumping.is_nan() || clumping <= 0.0 {
                    return Err(b.reject("aggregated_clumping_parameter", "must be > 0"));
                }
                ClumpSize::NegativeBinomial {
                    mean: size,
                    clumping,
                }
            }
            other => {
                return Err(b.reject(
                    "aggregated_clump_distribution",
                    format!("unrecognized code {other}"),
                ))
            }
        };

        let search_increment = b.single_or("aggregated_search_increment", 5.0);
        if search_increment.is_nan() || search_increment < MIN_SEARCH_INCREMENT {
            return Err(b.reject(
                "aggregated_search_increment",
                format!("{search_increment} must be >= {MIN_SEARCH_INCREMENT}"),
            ));
        }

        self.bound = Some(Bound {
            return_interval,
            timestep_probability: annual.map(|&r| compound_probability(r, years)),
            clump,
            search_increment: search_increment as f32,
            applies: AppliesTo::from_combos(ctx.population.species_count(), &self.combos),
        });
        Ok(())
    }

    fn pre_mortality(&mut self, env: &mut MortalityEnv<'_>) -> Result<()> {
        self.doomed.clear();
        let Some(bound) = self.bound.as_ref() else {
            return Ok(());
        };

        let episode = (env.years_per_timestep / bound.return_interval).min(1.0);
        if !chance(env.rng, episode) {
            return Ok(());
        }

        let population = env.population;
        let mean = bound.clump.mean();
        let mut seeds = 0usize;
        for tree in population.trees() {
            if self.doomed.contains(&tree.id()) || !Self::eligible(bound, tree, env) {
                continue;
            }
            let p = bound.timestep_probability[tree.species()];
            if !chance(env.rng, p / mean) {
                continue;
            }
            let size = bound.clump.draw(env.rng);
            self.doomed.insert(tree.id());
            Self::kill_neighbors(bound, &mut self.doomed, tree, size - 1, env);
            seeds += 1;
        }
        debug!(
            "{}: episode with {} clumps, {} trees selected.",
            Self::NAME,
            seeds,
            self.doomed.len()
        );
        Ok(())
    }

    fn evaluate(&mut self, tree: &Tree, _diameter: f32, _env: &mut MortalityEnv<'_>) -> DeathCause {
        if self.doomed.remove(&tree.id()) {
            DeathCause::Natural
        } else {
            DeathCause::NotDead
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec2;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::applicability::combos_for;
    use crate::error::Error;
    use crate::mortality::{MortalityOrg, StochasticMortality};
    use crate::params::ParameterFile;
    use crate::plot::Plot;
    use crate::population::{LifeStage, TreePopulation};
    use crate::settings::RunSettings;
    use crate::testing::{mortality_env, setup_alone, FixedRng};

    fn grid_stand(n: usize) -> TreePopulation {
        let mut pop = TreePopulation::new(["Pine"]);
        for i in 0..n {
            let x = (i % 100) as f32 + 0.5;
            let y = (i / 100) as f32 + 0.5;
            pop.add_tree(0, LifeStage::Adult, [x, y], 30.0, 20.0);
        }
        pop
    }

    fn params(distribution: f64, size: f64) -> ParameterFile {
        let mut p = ParameterFile::new();
        p.set_scalar("aggregated_return_interval", 5.0)
            .set_scalar("aggregated_clump_size", size)
            .set_scalar("aggregated_clump_distribution", distribution)
            .set_scalar("aggregated_clumping_parameter", 2.0)
            .set_species("aggregated_mortality_rate", "Pine", 0.05)
            .set_species("mortality_rate", "Pine", 0.05);
        p
    }

    fn death_rate(strategy: Box<dyn MortalityStrategy>, seed: u64) -> f64 {
        let n = 10_000;
        let mut pop = grid_stand(n);
        let settings = RunSettings::new(Vec2::new(100.0, 100.0)).with_years_per_timestep(5.0);
        let params = params(0.0, 1.0);
        let mut org = MortalityOrg::try_new(vec![strategy]).unwrap();
        org.setup(&mut SetupContext::new(&mut pop, &params, &settings))
            .unwrap();
        let mut rng = StdRng::seed_from_u64(seed);
        let report = org.do_mortality(&mut pop, &settings, &mut rng).unwrap();
        report.deaths() as f64 / n as f64
    }

    #[test]
    fn clump_size_one_matches_plain_stochastic_mortality() {
        let combos = combos_for(&[0], &[LifeStage::Adult]);
        let expected = 1.0 - 0.95f64.powi(5);
        let aggregated = death_rate(Box::new(AggregatedMortality::new(combos.clone())), 11);
        let stochastic = death_rate(Box::new(StochasticMortality::new(combos)), 12);
        assert!((aggregated - expected).abs() < 0.02, "aggregated {aggregated}");
        assert!((stochastic - expected).abs() < 0.02, "stochastic {stochastic}");
        assert!((aggregated - stochastic).abs() < 0.03);
    }

    #[test]
    fn clumps_take_the_nearest_neighbors() {
        let mut pop = TreePopulation::new(["Pine"]);
        pop.add_tree(0, LifeStage::Adult, [10.0, 10.0], 30.0, 20.0);
        pop.add_tree(0, LifeStage::Adult, [11.0, 10.0], 30.0, 20.0);
        pop.add_tree(0, LifeStage::Adult, [10.0, 12.0], 30.0, 20.0);
        pop.add_tree(0, LifeStage::Adult, [30.0, 30.0], 30.0, 20.0);
        let settings = RunSettings::new(Vec2::new(100.0, 100.0)).with_years_per_timestep(5.0);
        let mut params = params(0.0, 3.0);
        params.set_species("aggregated_mortality_rate", "Pine", 1.0);

        let mut agg = AggregatedMortality::new(combos_for(&[0], &[LifeStage::Adult]));
        let dead = setup_alone(&mut agg, &mut pop, &params, &settings).unwrap();

        // Every draw is 0, so the episode happens and the first tree seeds a clump.
        let plot = Plot::new(settings.plot_extent);
        let mut rng = FixedRng::from_unit(0.0);
        let mut env = mortality_env(&pop, &plot, 5.0, &mut rng, &dead);
        agg.pre_mortality(&mut env).unwrap();

        let ids: Vec<_> = pop.trees().iter().map(|t| t.id()).collect();
        assert!(agg.doomed().contains(&ids[0]));
        assert!(agg.doomed().contains(&ids[1]));
        assert!(agg.doomed().contains(&ids[2]));
        // The lone tree seeds its own clump; no neighbors are close enough to join.
        assert!(agg.doomed().contains(&ids[3]));
        assert_eq!(agg.doomed().len(), 4);
    }

    #[test]
    fn no_episode_means_no_deaths() {
        let mut pop = grid_stand(50);
        let settings = RunSettings::new(Vec2::new(100.0, 100.0)).with_years_per_timestep(1.0);
        let mut agg = AggregatedMortality::new(combos_for(&[0], &[LifeStage::Adult]));
        let dead = setup_alone(&mut agg, &mut pop, &params(1.0, 4.0), &settings).unwrap();

        // A draw of 0.9 is above the episode probability 1/5.
        let plot = Plot::new(settings.plot_extent);
        let mut rng = FixedRng::from_unit(0.9);
        let mut env = mortality_env(&pop, &plot, 1.0, &mut rng, &dead);
        agg.pre_mortality(&mut env).unwrap();
        assert!(agg.doomed().is_empty());
    }

    #[test]
    fn smallest_search_increment_still_finishes_the_clump() {
        let mut pop = TreePopulation::new(["Pine"]);
        pop.add_tree(0, LifeStage::Adult, [10.0, 10.0], 30.0, 20.0);
        pop.add_tree(0, LifeStage::Adult, [30.0, 10.0], 30.0, 20.0);
        let settings = RunSettings::new(Vec2::new(100.0, 100.0)).with_years_per_timestep(5.0);
        let mut params = params(0.0, 3.0);
        params
            .set_species("aggregated_mortality_rate", "Pine", 1.0)
            .set_scalar("aggregated_search_increment", MIN_SEARCH_INCREMENT);

        let mut agg = AggregatedMortality::new(combos_for(&[0], &[LifeStage::Adult]));
        let dead = setup_alone(&mut agg, &mut pop, &params, &settings).unwrap();

        // The clump wants two neighbors but the stand only has one.
        let plot = Plot::new(settings.plot_extent);
        let mut rng = FixedRng::from_unit(0.0);
        let mut env = mortality_env(&pop, &plot, 5.0, &mut rng, &dead);
        agg.pre_mortality(&mut env).unwrap();
        assert_eq!(agg.doomed().len(), 2);
    }

    #[test]
    fn search_increment_below_the_minimum_is_rejected() {
        let mut pop = grid_stand(1);
        let settings = RunSettings::new(Vec2::new(100.0, 100.0));
        let mut params = params(0.0, 2.0);
        params.set_scalar("aggregated_search_increment", 1e-7);
        let mut agg = AggregatedMortality::new(combos_for(&[0], &[LifeStage::Adult]));
        let err = setup_alone(&mut agg, &mut pop, &params, &settings).unwrap_err();
        assert!(
            matches!(&err, Error::BadData { tag, .. } if tag == "aggregated_search_increment"),
            "{err}"
        );
    }

    #[test]
    fn unknown_distribution_code_is_rejected() {
        let mut pop = grid_stand(1);
        let settings = RunSettings::new(Vec2::new(100.0, 100.0));
        let mut agg = AggregatedMortality::new(combos_for(&[0], &[LifeStage::Adult]));
        assert!(setup_alone(&mut agg, &mut pop, &params(7.0, 2.0), &settings).is_err());
    }
}
