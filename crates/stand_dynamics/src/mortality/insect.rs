//! Mortality of trees under insect attack.
use crate::applicability::{SpeciesTypeCombo, SpeciesValues};
use crate::behavior::{ComboCodes, SetupContext};
use crate::error::Result;
use crate::mortality::{DeathCause, MortalityEnv, MortalityStrategy};
use crate::population::{IntCode, SpeciesId, Tree};
use crate::random::chance;

/// Label of the infestation-duration member written by the infestation behavior.
pub const YEARS_INFESTED: &str = "YearsInfested";

#[derive(Debug, Clone, Copy, PartialEq)]
struct Curve {
    min: f64,
    max: f64,
    x0: f64,
    xb: f64,
}

/// Per-timestep death probability rising with years infested:
/// `min + (max - min) / (1 + (x0 / years)^xb)`. Uninfested trees never die here.
#[derive(Debug, Clone)]
pub struct InsectInfestationMortality {
    combos: Vec<SpeciesTypeCombo>,
    curves: Option<SpeciesValues<Curve>>,
    infested: Option<ComboCodes<IntCode>>,
}

impl InsectInfestationMortality {
    pub const NAME: &'static str = "InsectInfestationMortality";

    pub fn new(combos: Vec<SpeciesTypeCombo>) -> Self {
        Self {
            combos,
            curves: None,
            infested: None,
        }
    }

    pub fn death_probability(&self, species: SpeciesId, years_infested: i32) -> f64 {
        if years_infested <= 0 {
            return 0.0;
        }
        let Some(c) = self.curves.as_ref().and_then(|v| v.get(species)) else {
            return 0.0;
        };
        let years = f64::from(years_infested);
        c.min + (c.max - c.min) / (1.0 + (c.x0 / years).powf(c.xb))
    }
}

impl MortalityStrategy for InsectInfestationMortality {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn combos(&self) -> &[SpeciesTypeCombo] {
        &self.combos
    }

    fn setup(&mut self, ctx: &mut SetupContext<'_>) -> Result<()> {
        let index = ctx.species_index(&self.combos);
        let b = ctx.binder(Self::NAME);
        let min = b.species_probability("insect_mortality_min", &index)?;
        let max = b.species_probability("insect_mortality_max", &index)?;
        let x0 = b.species_positive("insect_mortality_x0", &index)?;
        let xb = b.species("insect_mortality_xb", &index)?;
        for (sp, &lo) in min.iter() {
            if lo > max[sp] {
                let name = b.species_name(sp)?;
                return Err(b.reject(
                    "insect_mortality_min",
                    format!("{name}: minimum {lo} exceeds maximum {}", max[sp]),
                ));
            }
        }
        self.curves = Some(SpeciesValues::from_fn(&index, |sp| Curve {
            min: min[sp],
            max: max[sp],
            x0: x0[sp],
            xb: xb[sp],
        }));
        self.infested = Some(ctx.require_int(Self::NAME, YEARS_INFESTED, &self.combos)?);
        Ok(())
    }

    fn evaluate(&mut self, tree: &Tree, _diameter: f32, env: &mut MortalityEnv<'_>) -> DeathCause {
        let Some(code) = self
            .infested
            .as_ref()
            .and_then(|c| c.get(tree.species(), tree.stage()))
        else {
            return DeathCause::NotDead;
        };
        let years = tree.int(code);
        if years <= 0 {
            return DeathCause::NotDead;
        }
        if chance(env.rng, self.death_probability(tree.species(), years)) {
            DeathCause::Insects
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
    use crate::error::Error;
    use crate::params::ParameterFile;
    use crate::plot::Plot;
    use crate::population::{LifeStage, TreePopulation};
    use crate::settings::RunSettings;
    use crate::testing::{mortality_env, setup_alone, FixedRng};

    fn params() -> ParameterFile {
        let mut p = ParameterFile::new();
        p.set_species("insect_mortality_min", "Spruce", 0.0)
            .set_species("insect_mortality_max", "Spruce", 0.8)
            .set_species("insect_mortality_x0", "Spruce", 3.0)
            .set_species("insect_mortality_xb", "Spruce", 2.0);
        p
    }

    #[test]
    fn probability_is_half_way_at_x0() {
        let mut pop = TreePopulation::new(["Spruce"]);
        pop.register_int(YEARS_INFESTED, 0, LifeStage::Adult);
        let settings = RunSettings::new(Vec2::new(10.0, 10.0));
        let mut m = InsectInfestationMortality::new(combos_for(&[0], &[LifeStage::Adult]));
        setup_alone(&mut m, &mut pop, &params(), &settings).unwrap();

        assert_eq!(m.death_probability(0, 0), 0.0);
        assert!((m.death_probability(0, 3) - 0.4).abs() < 1e-12);
        assert!(m.death_probability(0, 10) > m.death_probability(0, 3));
    }

    #[test]
    fn uninfested_trees_survive_any_draw() {
        let mut pop = TreePopulation::new(["Spruce"]);
        let code = pop.register_int(YEARS_INFESTED, 0, LifeStage::Adult);
        pop.add_tree(0, LifeStage::Adult, [1.0, 1.0], 30.0, 20.0);
        pop.add_tree(0, LifeStage::Adult, [2.0, 1.0], 30.0, 20.0);
        pop.tree_mut(1).set_int(code, 6);
        let settings = RunSettings::new(Vec2::new(10.0, 10.0));
        let mut m = InsectInfestationMortality::new(combos_for(&[0], &[LifeStage::Adult]));
        let dead = setup_alone(&mut m, &mut pop, &params(), &settings).unwrap();

        let plot = Plot::new(settings.plot_extent);
        let mut rng = FixedRng::from_unit(0.0);
        let mut env = mortality_env(&pop, &plot, 1.0, &mut rng, &dead);
        assert_eq!(m.evaluate(pop.tree(0), 30.0, &mut env), DeathCause::NotDead);
        assert_eq!(m.evaluate(pop.tree(1), 30.0, &mut env), DeathCause::Insects);
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        let mut pop = TreePopulation::new(["Spruce"]);
        pop.register_int(YEARS_INFESTED, 0, LifeStage::Adult);
        let mut p = params();
        p.set_species("insect_mortality_min", "Spruce", 0.9);
        let settings = RunSettings::new(Vec2::new(10.0, 10.0));
        let mut m = InsectInfestationMortality::new(combos_for(&[0], &[LifeStage::Adult]));
        let err = setup_alone(&mut m, &mut pop, &p, &settings).unwrap_err();
        assert!(matches!(err, Error::BadData { .. }));
    }
}
