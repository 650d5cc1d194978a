//! Snag fall driven by time since death.
//!
//! Snag survival follows a Weibull curve `S(t) = exp(-(a·t)^b)` in years dead.
//! The chance a snag aged `t` falls during a timestep of `T` years is
//! `1 - S(t + T) / S(t)`.
use crate::applicability::{SpeciesTypeCombo, SpeciesValues};
use crate::behavior::{ComboCodes, SetupContext};
use crate::error::{Error, Result};
use crate::mortality::{DeathCause, MortalityEnv, MortalityStrategy};
use crate::population::{IntCode, LifeStage, SpeciesId, Tree};
use crate::random::chance;

/// Label of the years-dead member written by the snag aging behavior.
pub const TREE_AGE: &str = "Tree Age";

#[derive(Debug, Clone)]
struct Bound {
    a: SpeciesValues<f64>,
    b: SpeciesValues<f64>,
    age: ComboCodes<IntCode>,
}

#[derive(Debug, Clone)]
pub struct WeibullSnagMortality {
    combos: Vec<SpeciesTypeCombo>,
    bound: Option<Bound>,
}

impl WeibullSnagMortality {
    pub const NAME: &'static str = "WeibullSnagMortality";

    pub fn new(combos: Vec<SpeciesTypeCombo>) -> Self {
        Self {
            combos,
            bound: None,
        }
    }

    /// Probability that a snag `years_dead` old falls within `years`.
    pub fn fall_probability(&self, species: SpeciesId, years_dead: f64, years: f64) -> f64 {
        let Some(bound) = self.bound.as_ref() else {
            return 0.0;
        };
        let (Some(&a), Some(&b)) = (bound.a.get(species), bound.b.get(species)) else {
            return 0.0;
        };
        let t = years_dead.max(0.0);
        // ln S(t) - ln S(t + T), kept in log space so old snags do not underflow.
        let log_ratio = (a * t).powf(b) - (a * (t + years)).powf(b);
        (1.0 - log_ratio.exp()).clamp(0.0, 1.0)
    }
}

impl MortalityStrategy for WeibullSnagMortality {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn combos(&self) -> &[SpeciesTypeCombo] {
        &self.combos
    }

    fn setup(&mut self, ctx: &mut SetupContext<'_>) -> Result<()> {
        if let Some(c) = self.combos.iter().find(|c| c.stage != LifeStage::Snag) {
            return Err(Error::InvalidConfig(format!(
                "{}: applies to snags only, got {} for species {}",
                Self::NAME,
                c.stage,
                c.species
            )));
        }
        let index = ctx.species_index(&self.combos);
        let binder = ctx.binder(Self::NAME);
        let a = binder.species_positive("snag_weibull_a", &index)?;
        let b = binder.species_positive("snag_weibull_b", &index)?;
        let age = ctx.require_int(Self::NAME, TREE_AGE, &self.combos)?;
        self.bound = Some(Bound { a, b, age });
        Ok(())
    }

    fn evaluate(&mut self, tree: &Tree, _diameter: f32, env: &mut MortalityEnv<'_>) -> DeathCause {
        let Some(code) = self
            .bound
            .as_ref()
            .and_then(|b| b.age.get(tree.species(), tree.stage()))
        else {
            return DeathCause::NotDead;
        };
        let age = f64::from(tree.int(code));
        let p = self.fall_probability(tree.species(), age, env.years_per_timestep);
        if chance(env.rng, p) {
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
    use crate::plot::Plot;
    use crate::population::TreePopulation;
    use crate::settings::RunSettings;
    use crate::testing::{mortality_env, setup_alone, FixedRng};

    fn setup() -> (TreePopulation, WeibullSnagMortality, ComboCodes<IntCode>) {
        let mut pop = TreePopulation::new(["Birch"]);
        let age = pop.register_int(TREE_AGE, 0, LifeStage::Snag);
        pop.add_tree(0, LifeStage::Snag, [1.0, 1.0], 20.0, 12.0);
        pop.tree_mut(0).set_int(age, 10);
        let mut params = ParameterFile::new();
        params
            .set_species("snag_weibull_a", "Birch", 0.05)
            .set_species("snag_weibull_b", "Birch", 2.0);
        let settings = RunSettings::new(Vec2::new(10.0, 10.0)).with_years_per_timestep(5.0);
        let mut snag = WeibullSnagMortality::new(combos_for(&[0], &[LifeStage::Snag]));
        let dead = setup_alone(&mut snag, &mut pop, &params, &settings).unwrap();
        (pop, snag, dead)
    }

    #[test]
    fn conditional_fall_probability() {
        let (_, snag, _) = setup();
        let s = |t: f64| (-(0.05 * t).powf(2.0)).exp();
        let expected = 1.0 - s(15.0) / s(10.0);
        assert!((snag.fall_probability(0, 10.0, 5.0) - expected).abs() < 1e-12);
        // Older snags fall more readily when b > 1.
        assert!(snag.fall_probability(0, 30.0, 5.0) > snag.fall_probability(0, 10.0, 5.0));
        assert!(snag.fall_probability(0, 0.0, 5.0) > 0.0);
    }

    #[test]
    fn evaluation_reads_tree_age() {
        let (pop, mut snag, dead) = setup();
        let plot = Plot::new(Vec2::new(10.0, 10.0));
        let p = snag.fall_probability(0, 10.0, 5.0);

        let mut rng = FixedRng::from_unit(p * 0.5);
        let mut env = mortality_env(&pop, &plot, 5.0, &mut rng, &dead);
        assert_eq!(snag.evaluate(pop.tree(0), 20.0, &mut env), DeathCause::Natural);

        let mut rng = FixedRng::from_unit((p + 1.0) * 0.5);
        let mut env = mortality_env(&pop, &plot, 5.0, &mut rng, &dead);
        assert_eq!(snag.evaluate(pop.tree(0), 20.0, &mut env), DeathCause::NotDead);
    }

    #[test]
    fn live_stages_are_rejected() {
        let mut pop = TreePopulation::new(["Birch"]);
        let settings = RunSettings::new(Vec2::new(10.0, 10.0));
        let mut snag = WeibullSnagMortality::new(combos_for(&[0], &[LifeStage::Adult]));
        let err = setup_alone(&mut snag, &mut pop, &ParameterFile::new(), &settings);
        assert!(matches!(err, Err(Error::InvalidConfig(_))));
    }
}
