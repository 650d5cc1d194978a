//! Seed dispersal: the strategy contract, the shared seed grid, and the
//! orchestrator that adjusts the accumulated tallies.
//!
//! Every disperse strategy implements [`DisperseStrategy`] and is registered into
//! a [`DisperseOrg`]. Each timestep the orchestrator lets every strategy add
//! seeds to the [`SeedGrid`] in registration order, then replaces every positive
//! tally with one draw from the configured [`SeedDistribution`].
use rand::RngCore;

use crate::applicability::SpeciesTypeCombo;
use crate::behavior::SetupContext;
use crate::error::Result;
use crate::events::EventSink;
use crate::plot::Plot;
use crate::population::TreePopulation;

pub mod adjust;
pub mod grid;
pub mod kernel;
pub mod masting;
pub mod masting_spatial;
pub mod non_spatial;
pub mod org;
pub mod spatial;

pub use adjust::{SeedAdjuster, SeedDistribution};
pub use grid::{SeedGrid, DISPERSED_SEEDS};
pub use kernel::{DispersalKernel, DistanceCdf};
pub use masting::{MastEvent, MastSchedule};
pub use masting_spatial::{MastingSpatialDisperse, SeedProducer};
pub use non_spatial::NonSpatialDisperse;
pub use org::{DisperseOrg, DisperseReport};
pub use spatial::SpatialDisperse;

/// What a strategy sees while adding seeds.
pub struct DisperseEnv<'a> {
    pub population: &'a mut TreePopulation,
    pub grid: &'a mut SeedGrid,
    pub plot: &'a Plot,
    pub years_per_timestep: f64,
    pub rng: &'a mut dyn RngCore,
    pub sink: &'a mut dyn EventSink,
}

/// A pluggable seed production and dispersal calculation.
pub trait DisperseStrategy {
    fn name(&self) -> &str;

    /// The (species, stage) slice of the population that produces seeds.
    fn combos(&self) -> &[SpeciesTypeCombo];

    /// Reads parameters, registers data members and precomputes tables.
    fn setup(&mut self, ctx: &mut SetupContext<'_>) -> Result<()>;

    /// Adds this timestep's seeds to the grid. Tallies are only ever added to.
    fn add_seeds(&mut self, env: &mut DisperseEnv<'_>) -> Result<()>;
}
