//! The disperse orchestrator.
use rand::RngCore;
use tracing::{debug, info};

use crate::applicability::{AppliesTo, SpeciesIndex};
use crate::behavior::SetupContext;
use crate::disperse::adjust::{SeedAdjuster, SeedDistribution};
use crate::disperse::grid::SeedGrid;
use crate::disperse::{DisperseEnv, DisperseStrategy};
use crate::error::{Error, Result};
use crate::events::{EventSink, StandEvent, StandEventKind};
use crate::population::TreePopulation;
use crate::settings::RunSettings;

/// Seed totals from one call to [`DisperseOrg::do_disperse`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DisperseReport {
    /// Sum of the tallies the strategies added.
    pub raw_total: f64,
    /// Sum after adjustment.
    pub adjusted_total: f64,
}

/// Whether a behavior name marks a disperse behavior.
pub fn is_disperse_name(name: &str) -> bool {
    name.to_ascii_lowercase().contains("disperse")
}

/// Runs every disperse strategy into the shared seed grid, then adjusts the
/// tallies with one configured distribution.
pub struct DisperseOrg {
    strategies: Vec<Box<dyn DisperseStrategy>>,
    uses_disperse: AppliesTo,
    adjuster: Option<SeedAdjuster>,
    grid: Option<SeedGrid>,
}

impl DisperseOrg {
    /// The tag of the seed distribution code, read as a single value.
    pub const SEED_DISTRIBUTION: &'static str = "seed_distribution";
    pub const NAME: &'static str = "DisperseOrg";

    /// Creates the orchestrator for the given strategies, in registration order.
    /// Every strategy name must contain "disperse", in any case.
    pub fn try_new(strategies: Vec<Box<dyn DisperseStrategy>>) -> Result<Self> {
        if strategies.is_empty() {
            return Err(Error::InvalidConfig(
                "disperse orchestrator needs at least one strategy".into(),
            ));
        }
        if let Some(s) = strategies.iter().find(|s| !is_disperse_name(s.name())) {
            return Err(Error::InvalidConfig(format!(
                "{} is not a disperse behavior",
                s.name()
            )));
        }
        Ok(Self {
            strategies,
            uses_disperse: AppliesTo::new(0),
            adjuster: None,
            grid: None,
        })
    }

    /// Uses an existing seed grid instead of creating one at setup.
    pub fn with_grid(mut self, grid: SeedGrid) -> Self {
        if self.grid.is_none() {
            self.grid = Some(grid);
        }
        self
    }

    pub fn strategies(&self) -> impl Iterator<Item = &dyn DisperseStrategy> {
        self.strategies.iter().map(|s| s.as_ref())
    }

    /// Union of every strategy's (species, stage) combos.
    pub fn uses_disperse(&self) -> &AppliesTo {
        &self.uses_disperse
    }

    pub fn adjuster(&self) -> Option<&SeedAdjuster> {
        self.adjuster.as_ref()
    }

    pub fn grid(&self) -> Option<&SeedGrid> {
        self.grid.as_ref()
    }

    pub fn grid_mut(&mut self) -> Option<&mut SeedGrid> {
        self.grid.as_mut()
    }

    /// Reads the seed distribution, creates the grid if none was supplied, and
    /// sets up every strategy in order.
    ///
    /// Stochastic shapes need one scale value per species used by any strategy.
    pub fn setup(&mut self, ctx: &mut SetupContext<'_>) -> Result<()> {
        let n_species = ctx.population.species_count();
        for strategy in &self.strategies {
            if let Some(c) = strategy.combos().iter().find(|c| c.species >= n_species) {
                return Err(Error::InvalidConfig(format!(
                    "{}: species {} does not exist",
                    strategy.name(),
                    c.species
                )));
            }
        }
        let mut uses = AppliesTo::new(n_species);
        for strategy in &self.strategies {
            uses.union_with(&AppliesTo::from_combos(n_species, strategy.combos()));
        }

        let adjuster = {
            let b = ctx.binder(Self::NAME);
            let code = b.single_code(Self::SEED_DISTRIBUTION)?;
            let Some(distribution) = SeedDistribution::from_code(code) else {
                return Err(b.reject(
                    Self::SEED_DISTRIBUTION,
                    format!("unrecognized distribution code {code}"),
                ));
            };
            let index = SpeciesIndex::from_combos(n_species, &uses.combos());
            match distribution {
                SeedDistribution::Deterministic => SeedAdjuster::Deterministic,
                SeedDistribution::Poisson => SeedAdjuster::Poisson,
                SeedDistribution::Lognormal => {
                    SeedAdjuster::Lognormal(b.species_non_negative("seed_dist_std_dev", &index)?)
                }
                SeedDistribution::Normal => {
                    SeedAdjuster::Normal(b.species_non_negative("seed_dist_std_dev", &index)?)
                }
                SeedDistribution::NegativeBinomial => {
                    SeedAdjuster::NegativeBinomial(b.species_positive("seed_clumping", &index)?)
                }
            }
        };

        match &self.grid {
            Some(grid) if grid.n_species() != n_species => {
                return Err(Error::InvalidConfig(format!(
                    "seed grid holds {} species, population has {}",
                    grid.n_species(),
                    n_species
                )));
            }
            Some(_) => {}
            None => {
                let plot = ctx.settings.plot();
                let cell = ctx.settings.seed_grid_cell_size;
                self.grid = Some(SeedGrid::new(&plot, cell, n_species)?);
            }
        }

        for strategy in &mut self.strategies {
            strategy.setup(ctx)?;
        }

        info!(
            "Disperse: {} strategies [{}], {:?} seed adjustment.",
            self.strategies.len(),
            self.strategies
                .iter()
                .map(|s| s.name())
                .collect::<Vec<_>>()
                .join(", "),
            adjuster.distribution(),
        );
        self.uses_disperse = uses;
        self.adjuster = Some(adjuster);
        Ok(())
    }

    pub fn do_disperse(
        &mut self,
        population: &mut TreePopulation,
        settings: &RunSettings,
        rng: &mut dyn RngCore,
    ) -> Result<DisperseReport> {
        self.do_disperse_with_events(population, settings, rng, &mut ())
    }

    /// Lets every strategy add seeds, in registration order, then replaces every
    /// positive tally with one draw from the configured distribution.
    ///
    /// The grid is not cleared here; see [`DisperseOrg::timestep_cleanup`].
    pub fn do_disperse_with_events(
        &mut self,
        population: &mut TreePopulation,
        settings: &RunSettings,
        rng: &mut dyn RngCore,
        sink: &mut dyn EventSink,
    ) -> Result<DisperseReport> {
        let (Some(grid), Some(adjuster)) = (self.grid.as_mut(), self.adjuster.as_ref()) else {
            return Err(Error::InvalidConfig(
                "disperse orchestrator used before setup".into(),
            ));
        };

        let plot = settings.plot();
        {
            let mut env = DisperseEnv {
                population,
                grid: &mut *grid,
                plot: &plot,
                years_per_timestep: settings.years_per_timestep,
                rng: &mut *rng,
                sink: &mut *sink,
            };
            for strategy in &mut self.strategies {
                strategy.add_seeds(&mut env)?;
            }
        }

        let (raw_total, adjusted_total) = adjuster.adjust_grid(grid, rng);
        if sink.wants(StandEventKind::SeedsAdjusted) {
            sink.send(StandEvent::SeedsAdjusted {
                raw_total,
                adjusted_total,
            });
        }
        debug!(
            "Disperse: {:.1} seeds before adjustment, {:.1} after.",
            raw_total, adjusted_total
        );
        Ok(DisperseReport {
            raw_total,
            adjusted_total,
        })
    }

    /// Zeroes the grid's seed counters and clears its gap-updated flag.
    pub fn timestep_cleanup(&mut self) {
        if let Some(grid) = self.grid.as_mut() {
            grid.timestep_cleanup();
        }
    }
}
