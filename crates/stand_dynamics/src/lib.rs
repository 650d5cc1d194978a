#![forbid(unsafe_code)]
//! stand_dynamics: forest-stand mortality gauntlet and seed dispersal with masting.
//!
//! Modules:
//! - mortality: strategy contract, the ordered gauntlet orchestrator, and the built-in strategies
//! - disperse: seed grid, dispersal kernels, masting schedule, strategies, and seed adjustment
//! - population, applicability, params, settings: the stand and configuration the behaviors bind to
//! - runner: a timestep driver owning a stand and both orchestrators
//! - events: observation of a run through event sinks
//!
//! For examples and docs, see README.
pub mod applicability;
pub mod behavior;
pub mod disperse;
pub mod error;
pub mod events;
pub mod mortality;
pub mod params;
pub mod plot;
pub mod population;
pub mod random;
pub mod runner;
pub mod settings;

#[cfg(test)]
mod testing;

/// Convenient re-exports for common types. Import with `use stand_dynamics::prelude::*;`.
pub mod prelude {
    pub use crate::applicability::{
        combos_for, AppliesTo, SpeciesIndex, SpeciesTypeCombo, SpeciesValues,
    };
    pub use crate::behavior::{ComboCodes, SetupContext};
    pub use crate::disperse::masting_spatial::{PREVIOUS_SEEDS, SEEDS_PRODUCED};
    pub use crate::disperse::{
        DispersalKernel, DisperseEnv, DisperseOrg, DisperseReport, DisperseStrategy,
        DistanceCdf, MastEvent, MastSchedule, MastingSpatialDisperse, NonSpatialDisperse,
        SeedAdjuster, SeedDistribution, SeedGrid, SeedProducer, SpatialDisperse,
    };
    pub use crate::error::{Error, Result};
    pub use crate::events::{EventSink, FnSink, MultiSink, StandEvent, StandEventKind, VecSink};
    pub use crate::mortality::{
        AggregatedMortality, BcMortality, BrowsedMortality, ClumpSize, DeathCause,
        InsectInfestationMortality, MortalityEnv, MortalityOrg, MortalityReport,
        MortalityStrategy, SelfThinningMortality, SenescenceMortality, StochasticMortality,
        WeibullSnagMortality, DEAD_FLAG,
    };
    pub use crate::params::{ConfigBinder, ParameterFile};
    pub use crate::plot::Plot;
    pub use crate::population::{LifeStage, SpeciesId, Tree, TreeId, TreePopulation};
    pub use crate::runner::{StandRunner, TimestepReport};
    pub use crate::settings::RunSettings;
}
