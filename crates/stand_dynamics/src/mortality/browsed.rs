//! Mortality that depends on whether a tree was browsed this timestep.
use crate::applicability::{SpeciesTypeCombo, SpeciesValues};
use crate::behavior::{compound_probability, ComboCodes, SetupContext};
use crate::error::Result;
use crate::mortality::{DeathCause, MortalityEnv, MortalityStrategy};
use crate::population::{BoolCode, Tree};
use crate::random::chance;

/// Label of the browse flag written by the browse behavior.
pub const BROWSED: &str = "Browsed";

#[derive(Debug, Clone)]
struct Bound {
    browsed: SpeciesValues<f64>,
    unbrowsed: SpeciesValues<f64>,
    flag: ComboCodes<BoolCode>,
}

#[derive(Debug, Clone)]
pub struct BrowsedMortality {
    combos: Vec<SpeciesTypeCombo>,
    bound: Option<Bound>,
}

impl BrowsedMortality {
    pub const NAME: &'static str = "BrowsedMortality";

    pub fn new(combos: Vec<SpeciesTypeCombo>) -> Self {
        Self {
            combos,
            bound: None,
        }
    }
}

impl MortalityStrategy for BrowsedMortality {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn combos(&self) -> &[SpeciesTypeCombo] {
        &self.combos
    }

    fn setup(&mut self, ctx: &mut SetupContext<'_>) -> Result<()> {
        let index = ctx.species_index(&self.combos);
        let years = ctx.settings.years_per_timestep;
        let b = ctx.binder(Self::NAME);
        let browsed = b.species_probability("browsed_mortality_rate", &index)?;
        let unbrowsed = b.species_probability("unbrowsed_mortality_rate", &index)?;
        self.bound = Some(Bound {
            browsed: browsed.map(|&r| compound_probability(r, years)),
            unbrowsed: unbrowsed.map(|&r| compound_probability(r, years)),
            flag: ctx.require_bool(Self::NAME, BROWSED, &self.combos)?,
        });
        Ok(())
    }

    fn evaluate(&mut self, tree: &Tree, _diameter: f32, env: &mut MortalityEnv<'_>) -> DeathCause {
        let Some(bound) = self.bound.as_ref() else {
            return DeathCause::NotDead;
        };
        let Some(code) = bound.flag.get(tree.species(), tree.stage()) else {
            return DeathCause::NotDead;
        };
        let rates = if tree.bool(code) {
            &bound.browsed
        } else {
            &bound.unbrowsed
        };
        if chance(env.rng, rates[tree.species()]) {
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
    use crate::population::{LifeStage, TreePopulation};
    use crate::settings::RunSettings;
    use crate::testing::{mortality_env, setup_alone, FixedRng};

    #[test]
    fn browsed_trees_use_their_own_rate() {
        let mut pop = TreePopulation::new(["Oak"]);
        let flag = pop.register_bool(BROWSED, 0, LifeStage::Seedling);
        pop.add_tree(0, LifeStage::Seedling, [1.0, 1.0], 0.0, 0.3);
        pop.add_tree(0, LifeStage::Seedling, [2.0, 1.0], 0.0, 0.3);
        pop.tree_mut(0).set_bool(flag, true);

        let mut params = ParameterFile::new();
        params
            .set_species("browsed_mortality_rate", "Oak", 0.3)
            .set_species("unbrowsed_mortality_rate", "Oak", 0.01);
        let settings = RunSettings::new(Vec2::new(10.0, 10.0)).with_years_per_timestep(2.0);
        let mut m = BrowsedMortality::new(combos_for(&[0], &[LifeStage::Seedling]));
        let dead = setup_alone(&mut m, &mut pop, &params, &settings).unwrap();

        // Timestep probabilities: 0.51 browsed, 0.0199 unbrowsed.
        let plot = Plot::new(settings.plot_extent);
        let mut rng = FixedRng::from_unit(0.25);
        let mut env = mortality_env(&pop, &plot, 2.0, &mut rng, &dead);
        assert_eq!(m.evaluate(pop.tree(0), 0.0, &mut env), DeathCause::Natural);
        assert_eq!(m.evaluate(pop.tree(1), 0.0, &mut env), DeathCause::NotDead);
    }
}
