//! Mortality gauntlet: the strategy contract and its orchestrator.
//!
//! Every mortality strategy implements [`MortalityStrategy`] and is registered into
//! a [`MortalityOrg`], which owns the shared "dead" flag and runs the applicable
//! strategies against each live tree in registration order until one kills it.
use rand::RngCore;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::applicability::SpeciesTypeCombo;
use crate::behavior::{ComboCodes, SetupContext};
use crate::error::Result;
use crate::plot::Plot;
use crate::population::{IntCode, Tree, TreePopulation};

pub mod aggregated;
pub mod bc;
pub mod browsed;
pub mod insect;
pub mod org;
pub mod self_thinning;
pub mod senescence;
pub mod stochastic;
pub mod weibull_snag;

pub use aggregated::{AggregatedMortality, ClumpSize};
pub use bc::BcMortality;
pub use browsed::BrowsedMortality;
pub use insect::InsectInfestationMortality;
pub use org::{MortalityOrg, MortalityReport};
pub use self_thinning::SelfThinningMortality;
pub use senescence::SenescenceMortality;
pub use stochastic::StochasticMortality;
pub use weibull_snag::WeibullSnagMortality;

/// Label of the shared int data member that holds a tree's [`DeathCause`].
pub const DEAD_FLAG: &str = "dead";

/// Smallest radius increment, in metres, accepted by widening neighbor searches.
pub const MIN_SEARCH_INCREMENT: f64 = 0.01;

/// Radii of a widening neighbor search: `start + k * increment` for integer `k`,
/// capped at `max`. The last radius yielded is always `max`.
pub(crate) fn widening_radii(start: f32, max: f32, increment: f32) -> impl Iterator<Item = f32> {
    let start = start.min(max);
    let steps = ((max - start) / increment).ceil();
    let steps = if steps.is_finite() && steps >= 0.0 {
        steps as u32
    } else {
        1
    };
    (0..=steps).map(move |k| {
        if k == steps {
            max
        } else {
            (start + k as f32 * increment).min(max)
        }
    })
}

/// Why a tree died; stored in the dead flag as its integer code.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeathCause {
    NotDead,
    Harvest,
    Natural,
    Disease,
    Fire,
    Insects,
    Storm,
}

impl DeathCause {
    pub const ALL: [DeathCause; 7] = [
        DeathCause::NotDead,
        DeathCause::Harvest,
        DeathCause::Natural,
        DeathCause::Disease,
        DeathCause::Fire,
        DeathCause::Insects,
        DeathCause::Storm,
    ];

    pub fn code(self) -> i32 {
        match self {
            DeathCause::NotDead => 0,
            DeathCause::Harvest => 1,
            DeathCause::Natural => 2,
            DeathCause::Disease => 3,
            DeathCause::Fire => 4,
            DeathCause::Insects => 5,
            DeathCause::Storm => 6,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Self::ALL.iter().copied().find(|c| c.code() == code)
    }

    #[inline]
    pub fn is_dead(self) -> bool {
        self != DeathCause::NotDead
    }
}

/// Read-only view of the stand handed to strategies during a timestep.
///
/// Strategies cannot mutate trees through it: the orchestrator alone writes the
/// dead flag.
pub struct MortalityEnv<'a> {
    pub population: &'a TreePopulation,
    pub plot: &'a Plot,
    pub years_per_timestep: f64,
    pub rng: &'a mut dyn RngCore,
    pub(crate) dead_codes: &'a ComboCodes<IntCode>,
}

impl MortalityEnv<'_> {
    /// Whether `tree` is already marked dead (by an earlier timestep or an
    /// earlier tree in this one).
    pub fn is_dead(&self, tree: &Tree) -> bool {
        self.dead_codes
            .get(tree.species(), tree.stage())
            .is_some_and(|code| tree.int(code) != DeathCause::NotDead.code())
    }
}

/// A pluggable mortality calculation.
pub trait MortalityStrategy {
    /// Name used in logs, events and error messages.
    fn name(&self) -> &str;

    /// The (species, stage) slice of the population this strategy governs.
    fn combos(&self) -> &[SpeciesTypeCombo];

    /// Reads parameters and resolves data member codes. Called once, after the
    /// orchestrator registered the dead flag.
    fn setup(&mut self, ctx: &mut SetupContext<'_>) -> Result<()>;

    /// Runs before any tree is evaluated this timestep. Must not kill trees.
    fn pre_mortality(&mut self, _env: &mut MortalityEnv<'_>) -> Result<()> {
        Ok(())
    }

    /// Decides whether `tree` dies this timestep. `diameter` is 0 for seedlings.
    fn evaluate(&mut self, tree: &Tree, diameter: f32, env: &mut MortalityEnv<'_>) -> DeathCause;
}
