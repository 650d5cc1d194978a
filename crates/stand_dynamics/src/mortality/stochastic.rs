//! Background mortality at a constant annual rate.
use tracing::debug;

use crate::applicability::{SpeciesTypeCombo, SpeciesValues};
use crate::behavior::{compound_probability, SetupContext};
use crate::error::Result;
use crate::mortality::{DeathCause, MortalityEnv, MortalityStrategy};
use crate::population::Tree;
use crate::random::chance;

/// Kills each tree with the annual probability `mortality_rate`, compounded
/// over the timestep as `1 - (1 - r)^T`.
#[derive(Debug, Clone)]
pub struct StochasticMortality {
    combos: Vec<SpeciesTypeCombo>,
    timestep_probability: Option<SpeciesValues<f64>>,
}

impl StochasticMortality {
    pub const NAME: &'static str = "StochasticMortality";

    pub fn new(combos: Vec<SpeciesTypeCombo>) -> Self {
        Self {
            combos,
            timestep_probability: None,
        }
    }

    /// Per-timestep death probability for `species`, once set up.
    pub fn timestep_probability(&self, species: usize) -> Option<f64> {
        self.timestep_probability.as_ref()?.get(species).copied()
    }
}

impl MortalityStrategy for StochasticMortality {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn combos(&self) -> &[SpeciesTypeCombo] {
        &self.combos
    }

    fn setup(&mut self, ctx: &mut SetupContext<'_>) -> Result<()> {
        let index = ctx.species_index(&self.combos);
        let binder = ctx.binder(Self::NAME);
        let annual = binder.species_probability("mortality_rate", &index)?;
        let years = ctx.settings.years_per_timestep;
        let per_step = annual.map(|&r| compound_probability(r, years));
        debug!("{}: per-timestep probabilities {:?}", Self::NAME, per_step);
        self.timestep_probability = Some(per_step);
        Ok(())
    }

    fn evaluate(&mut self, tree: &Tree, _diameter: f32, env: &mut MortalityEnv<'_>) -> DeathCause {
        let Some(p) = self.timestep_probability(tree.species()) else {
            return DeathCause::NotDead;
        };
        if chance(env.rng, p) {
            DeathCause::Natural
        } else {
            DeathCause::NotDead
        }
    }
}
