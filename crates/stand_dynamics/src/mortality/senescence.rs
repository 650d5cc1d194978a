//! Background mortality with a senescence term for large trees.
//!
//! Below `senescence_dbh` the annual probability is the background rate. At and
//! above it a logistic term is added:
//!
//! ```text
//! p = background + exp(α + β·(d - d_s)) / (1 + exp(α + β·(d - d_s)))
//! ```
use crate::applicability::{SpeciesTypeCombo, SpeciesValues};
use crate::behavior::{compound_probability, SetupContext};
use crate::error::Result;
use crate::mortality::{DeathCause, MortalityEnv, MortalityStrategy};
use crate::population::{SpeciesId, Tree};
use crate::random::chance;

#[derive(Debug, Clone, Copy, PartialEq)]
struct Senescence {
    alpha: f64,
    beta: f64,
    dbh: f64,
    background: f64,
}

#[derive(Debug, Clone)]
pub struct SenescenceMortality {
    combos: Vec<SpeciesTypeCombo>,
    params: Option<SpeciesValues<Senescence>>,
}

impl SenescenceMortality {
    pub const NAME: &'static str = "SenescenceMortality";

    pub fn new(combos: Vec<SpeciesTypeCombo>) -> Self {
        Self {
            combos,
            params: None,
        }
    }

    pub fn annual_probability(&self, species: SpeciesId, diameter: f32) -> f64 {
        let Some(s) = self.params.as_ref().and_then(|v| v.get(species)) else {
            return 0.0;
        };
        let d = f64::from(diameter);
        if d < s.dbh {
            return s.background;
        }
        let z = (s.alpha + s.beta * (d - s.dbh)).exp();
        let logistic = if z.is_finite() { z / (1.0 + z) } else { 1.0 };
        (s.background + logistic).min(1.0)
    }
}

impl MortalityStrategy for SenescenceMortality {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn combos(&self) -> &[SpeciesTypeCombo] {
        &self.combos
    }

    fn setup(&mut self, ctx: &mut SetupContext<'_>) -> Result<()> {
        let index = ctx.species_index(&self.combos);
        let b = ctx.binder(Self::NAME);
        let alpha = b.species("senescence_alpha", &index)?;
        let beta = b.species("senescence_beta", &index)?;
        let dbh = b.species_non_negative("senescence_dbh", &index)?;
        let background = b.species_probability("senescence_background_rate", &index)?;
        self.params = Some(SpeciesValues::from_fn(&index, |sp| Senescence {
            alpha: alpha[sp],
            beta: beta[sp],
            dbh: dbh[sp],
            background: background[sp],
        }));
        Ok(())
    }

    fn evaluate(&mut self, tree: &Tree, diameter: f32, env: &mut MortalityEnv<'_>) -> DeathCause {
        let annual = self.annual_probability(tree.species(), diameter);
        if chance(env.rng, compound_probability(annual, env.years_per_timestep)) {
            DeathCause::Natural
        } else {
            DeathCause::NotDead
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec2;

    use super::*;
    use crate::applicability::combos_for;
    use crate::params::ParameterFile;
    use crate::population::{LifeStage, TreePopulation};
    use crate::settings::RunSettings;
    use crate::testing::setup_alone;

    #[test]
    fn senescence_kicks_in_at_threshold() {
        let mut pop = TreePopulation::new(["Beech"]);
        let mut params = ParameterFile::new();
        params
            .set_species("senescence_alpha", "Beech", -5.0)
            .set_species("senescence_beta", "Beech", 0.1)
            .set_species("senescence_dbh", "Beech", 60.0)
            .set_species("senescence_background_rate", "Beech", 0.002);
        let settings = RunSettings::new(Vec2::new(10.0, 10.0));
        let mut m = SenescenceMortality::new(combos_for(&[0], &[LifeStage::Adult]));
        setup_alone(&mut m, &mut pop, &params, &settings).unwrap();

        assert_eq!(m.annual_probability(0, 40.0), 0.002);
        let at = m.annual_probability(0, 60.0);
        let logistic = (-5.0f64).exp() / (1.0 + (-5.0f64).exp());
        assert!((at - (0.002 + logistic)).abs() < 1e-12);
        assert!(m.annual_probability(0, 100.0) > at);
        assert!(m.annual_probability(0, 10_000.0) <= 1.0);
    }
}
