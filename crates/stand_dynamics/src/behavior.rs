//! Setup-time context shared by mortality and disperse behaviors.
//!
//! Behaviors read parameters, register their own data members and look up the
//! members sibling behaviors registered, all through a [`SetupContext`].
use crate::applicability::{SpeciesIndex, SpeciesTypeCombo};
use crate::error::{Error, Result};
use crate::params::{ConfigBinder, ParameterFile};
use crate::population::{BoolCode, FloatCode, IntCode, LifeStage, SpeciesId, TreePopulation};
use crate::settings::RunSettings;

/// Data member codes resolved per (species, stage).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComboCodes<C> {
    n_species: usize,
    codes: Vec<Option<C>>,
}

impl<C: Copy> ComboCodes<C> {
    pub fn new(n_species: usize) -> Self {
        Self {
            n_species,
            codes: vec![None; n_species * LifeStage::COUNT],
        }
    }

    pub fn set(&mut self, species: SpeciesId, stage: LifeStage, code: C) {
        self.codes[species * LifeStage::COUNT + stage.index()] = Some(code);
    }

    #[inline]
    pub fn get(&self, species: SpeciesId, stage: LifeStage) -> Option<C> {
        if species >= self.n_species {
            return None;
        }
        self.codes[species * LifeStage::COUNT + stage.index()]
    }
}

/// Everything a behavior may touch while setting up.
pub struct SetupContext<'a> {
    pub population: &'a mut TreePopulation,
    pub params: &'a ParameterFile,
    pub settings: &'a RunSettings,
}

impl<'a> SetupContext<'a> {
    pub fn new(
        population: &'a mut TreePopulation,
        params: &'a ParameterFile,
        settings: &'a RunSettings,
    ) -> Self {
        Self {
            population,
            params,
            settings,
        }
    }

    pub fn binder<'b>(&'b self, behavior: &'b str) -> ConfigBinder<'b> {
        ConfigBinder::new(behavior, self.params, &*self.population)
    }

    pub fn species_index(&self, combos: &[SpeciesTypeCombo]) -> SpeciesIndex {
        SpeciesIndex::from_combos(self.population.species_count(), combos)
    }

    /// Looks up a float member a sibling behavior registered for every combo.
    pub fn require_float(
        &self,
        behavior: &str,
        label: &str,
        combos: &[SpeciesTypeCombo],
    ) -> Result<ComboCodes<FloatCode>> {
        self.require(behavior, label, combos, |p, sp, st| p.float_code(label, sp, st))
    }

    pub fn require_int(
        &self,
        behavior: &str,
        label: &str,
        combos: &[SpeciesTypeCombo],
    ) -> Result<ComboCodes<IntCode>> {
        self.require(behavior, label, combos, |p, sp, st| p.int_code(label, sp, st))
    }

    pub fn require_bool(
        &self,
        behavior: &str,
        label: &str,
        combos: &[SpeciesTypeCombo],
    ) -> Result<ComboCodes<BoolCode>> {
        self.require(behavior, label, combos, |p, sp, st| p.bool_code(label, sp, st))
    }

    fn require<C: Copy>(
        &self,
        behavior: &str,
        label: &str,
        combos: &[SpeciesTypeCombo],
        lookup: impl Fn(&TreePopulation, SpeciesId, LifeStage) -> Option<C>,
    ) -> Result<ComboCodes<C>> {
        let mut codes = ComboCodes::new(self.population.species_count());
        for c in combos {
            match lookup(&*self.population, c.species, c.stage) {
                Some(code) => codes.set(c.species, c.stage, code),
                None => {
                    return Err(Error::MissingDataMember {
                        behavior: behavior.to_string(),
                        label: label.to_string(),
                        species: c.species,
                        stage: c.stage,
                    })
                }
            }
        }
        Ok(codes)
    }
}

/// Per-timestep probability from an annual probability compounded over `years`.
#[inline]
pub fn compound_probability(annual: f64, years: f64) -> f64 {
    1.0 - (1.0 - annual.clamp(0.0, 1.0)).powf(years)
}

#[cfg(test)]
mod tests {
    use glam::Vec2;

    use super::*;
    use crate::applicability::combos_for;

    #[test]
    fn require_reports_first_missing_combo() {
        let mut pop = TreePopulation::new(["A", "B"]);
        pop.register_float("Growth", 0, LifeStage::Sapling);
        let params = ParameterFile::new();
        let settings = RunSettings::new(Vec2::new(10.0, 10.0));
        let ctx = SetupContext::new(&mut pop, &params, &settings);

        let ok = ctx
            .require_float("g", "Growth", &combos_for(&[0], &[LifeStage::Sapling]))
            .unwrap();
        assert!(ok.get(0, LifeStage::Sapling).is_some());
        assert!(ok.get(1, LifeStage::Sapling).is_none());

        let err = ctx
            .require_float("g", "Growth", &combos_for(&[0, 1], &[LifeStage::Sapling]))
            .unwrap_err();
        assert!(matches!(err, Error::MissingDataMember { species: 1, .. }));
    }

    #[test]
    fn compounding_matches_closed_form() {
        let p = compound_probability(0.1, 5.0);
        assert!((p - (1.0 - 0.9f64.powi(5))).abs() < 1e-12);
        assert_eq!(compound_probability(0.0, 5.0), 0.0);
        assert_eq!(compound_probability(1.0, 5.0), 1.0);
    }
}
