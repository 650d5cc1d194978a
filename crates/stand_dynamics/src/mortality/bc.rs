//! Growth-based mortality.
//!
//! Trees that grow slowly die more often:
//!
//! ```text
//! p = 1 - exp(-T · m0 · exp(-L · g))
//! ```
//!
//! where `T` is the timestep length in years, `m0` is the mortality at zero
//! growth, `L` is the light-dependent mortality and `g` is the tree's "Growth"
//! member (radial growth in mm) written by a growth behavior.
use crate::applicability::{SpeciesTypeCombo, SpeciesValues};
use crate::behavior::{ComboCodes, SetupContext};
use crate::error::Result;
use crate::mortality::{DeathCause, MortalityEnv, MortalityStrategy};
use crate::population::{FloatCode, Tree};
use crate::random::rand01;

/// Label of the growth member this strategy reads.
pub const GROWTH: &str = "Growth";

#[derive(Debug, Clone)]
struct Bound {
    zero_growth: SpeciesValues<f64>,
    light_dependent: SpeciesValues<f64>,
    growth: ComboCodes<FloatCode>,
}

#[derive(Debug, Clone)]
pub struct BcMortality {
    combos: Vec<SpeciesTypeCombo>,
    bound: Option<Bound>,
}

impl BcMortality {
    pub const NAME: &'static str = "BcMortality";

    pub fn new(combos: Vec<SpeciesTypeCombo>) -> Self {
        Self {
            combos,
            bound: None,
        }
    }

    /// Death probability over `years` for a tree of `species` with the given growth.
    pub fn death_probability(&self, species: usize, growth: f64, years: f64) -> Option<f64> {
        let b = self.bound.as_ref()?;
        let m0 = *b.zero_growth.get(species)?;
        let l = *b.light_dependent.get(species)?;
        Some(1.0 - (-years * m0 * (-l * growth).exp()).exp())
    }
}

impl MortalityStrategy for BcMortality {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn combos(&self) -> &[SpeciesTypeCombo] {
        &self.combos
    }

    fn setup(&mut self, ctx: &mut SetupContext<'_>) -> Result<()> {
        let index = ctx.species_index(&self.combos);
        let binder = ctx.binder(Self::NAME);
        let zero_growth = binder.species_non_negative("mortality_at_zero_growth", &index)?;
        let light_dependent = binder.species_non_negative("light_dependent_mortality", &index)?;
        let growth = ctx.require_float(Self::NAME, GROWTH, &self.combos)?;
        self.bound = Some(Bound {
            zero_growth,
            light_dependent,
            growth,
        });
        Ok(())
    }

    fn evaluate(&mut self, tree: &Tree, _diameter: f32, env: &mut MortalityEnv<'_>) -> DeathCause {
        let Some(code) = self
            .bound
            .as_ref()
            .and_then(|b| b.growth.get(tree.species(), tree.stage()))
        else {
            return DeathCause::NotDead;
        };
        let growth = f64::from(tree.float(code));
        let p = self
            .death_probability(tree.species(), growth, env.years_per_timestep)
            .unwrap_or(0.0);
        if rand01(env.rng) < p {
            DeathCause::Natural
        } else {
            DeathCause::NotDead
        }
    }
}
