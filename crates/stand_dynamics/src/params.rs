//! Parameter storage and per-behavior binding.
//!
//! [`ParameterFile`] is the in-memory form of the run's parameter file: scalar
//! values by tag and species-specific values by (tag, species name). Behaviors read
//! it once at setup through a [`ConfigBinder`], which resolves species names against
//! the population, builds dense [`SpeciesValues`] arrays, and validates ranges.
use std::collections::HashMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::applicability::{SpeciesIndex, SpeciesValues};
use crate::error::{Error, Result};
use crate::population::{SpeciesId, TreePopulation};

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParameterFile {
    /// Single values by tag.
    pub scalars: HashMap<String, f64>,
    /// Species-specific values: tag -> species name -> value.
    pub species: HashMap<String, HashMap<String, f64>>,
}

impl ParameterFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_scalar(&mut self, tag: &str, value: f64) -> &mut Self {
        self.scalars.insert(tag.to_string(), value);
        self
    }

    pub fn set_species(&mut self, tag: &str, species: &str, value: f64) -> &mut Self {
        self.species
            .entry(tag.to_string())
            .or_default()
            .insert(species.to_string(), value);
        self
    }

    /// Sets the same species-specific value for every listed species.
    pub fn set_species_all<S: AsRef<str>>(
        &mut self,
        tag: &str,
        species: impl IntoIterator<Item = S>,
        value: f64,
    ) -> &mut Self {
        for sp in species {
            self.set_species(tag, sp.as_ref(), value);
        }
        self
    }

    pub fn scalar(&self, tag: &str) -> Option<f64> {
        self.scalars.get(tag).copied()
    }

    pub fn species_value(&self, tag: &str, species: &str) -> Option<f64> {
        self.species.get(tag).and_then(|m| m.get(species)).copied()
    }

    pub fn has_species_tag(&self, tag: &str) -> bool {
        self.species.contains_key(tag)
    }
}

/// Reads and validates one behavior's parameters.
pub struct ConfigBinder<'a> {
    behavior: &'a str,
    params: &'a ParameterFile,
    population: &'a TreePopulation,
}

impl<'a> ConfigBinder<'a> {
    pub fn new(
        behavior: &'a str,
        params: &'a ParameterFile,
        population: &'a TreePopulation,
    ) -> Self {
        Self {
            behavior,
            params,
            population,
        }
    }

    pub fn behavior(&self) -> &str {
        self.behavior
    }

    /// A required single value.
    pub fn single(&self, tag: &str) -> Result<f64> {
        self.params
            .scalar(tag)
            .ok_or_else(|| Error::data_missing(self.behavior, tag))
    }

    /// An optional single value with a default.
    pub fn single_or(&self, tag: &str, default: f64) -> f64 {
        self.params.scalar(tag).unwrap_or(default)
    }

    /// A required single integer code; fails if the stored value is not integral.
    pub fn single_code(&self, tag: &str) -> Result<i64> {
        let v = self.single(tag)?;
        self.as_code(tag, v)
    }

    /// A required value for every species in `index`.
    pub fn species(&self, tag: &str, index: &SpeciesIndex) -> Result<SpeciesValues<f64>> {
        let mut values = Vec::with_capacity(index.len());
        for &sp in index.species() {
            let name = self.species_name(sp)?;
            match self.params.species_value(tag, name) {
                Some(v) if v.is_finite() => values.push(v),
                Some(v) => {
                    return Err(Error::bad_data(
                        self.behavior,
                        tag,
                        format!("{name}: {v} is not a finite number"),
                    ))
                }
                None => {
                    return Err(Error::data_missing(
                        self.behavior,
                        format!("{tag} ({name})"),
                    ))
                }
            }
        }
        Ok(SpeciesValues::new(index.clone(), values))
    }

    /// Species values with a default for species missing from the file.
    pub fn species_or(&self, tag: &str, index: &SpeciesIndex, default: f64) -> SpeciesValues<f64> {
        SpeciesValues::from_fn(index, |sp| {
            self.population
                .species_name(sp)
                .and_then(|name| self.params.species_value(tag, name))
                .unwrap_or(default)
        })
    }

    /// Species values that must all lie in [0, 1].
    pub fn species_probability(
        &self,
        tag: &str,
        index: &SpeciesIndex,
    ) -> Result<SpeciesValues<f64>> {
        self.species_checked(tag, index, |v| (0.0..=1.0).contains(&v), "must be in [0, 1]")
    }

    /// Species values that must all be > 0.
    pub fn species_positive(&self, tag: &str, index: &SpeciesIndex) -> Result<SpeciesValues<f64>> {
        self.species_checked(tag, index, |v| v > 0.0, "must be > 0")
    }

    /// Species values that must all be >= 0.
    pub fn species_non_negative(
        &self,
        tag: &str,
        index: &SpeciesIndex,
    ) -> Result<SpeciesValues<f64>> {
        self.species_checked(tag, index, |v| v >= 0.0, "must be >= 0")
    }

    /// Species integer codes (enumerated choices).
    pub fn species_code(&self, tag: &str, index: &SpeciesIndex) -> Result<SpeciesValues<i64>> {
        let raw = self.species(tag, index)?;
        let mut codes = Vec::with_capacity(index.len());
        for (_, &v) in raw.iter() {
            codes.push(self.as_code(tag, v)?);
        }
        Ok(SpeciesValues::new(index.clone(), codes))
    }

    pub fn species_checked(
        &self,
        tag: &str,
        index: &SpeciesIndex,
        ok: impl Fn(f64) -> bool,
        expectation: &str,
    ) -> Result<SpeciesValues<f64>> {
        let values = self.species(tag, index)?;
        for (sp, &v) in values.iter() {
            if !ok(v) {
                let name = self.species_name(sp)?;
                return Err(Error::bad_data(
                    self.behavior,
                    tag,
                    format!("{name}: {v} {expectation}"),
                ));
            }
        }
        Ok(values)
    }

    /// Fails with a [`Error::BadData`] for `tag`.
    pub fn reject(&self, tag: &str, message: impl Into<String>) -> Error {
        Error::bad_data(self.behavior, tag, message)
    }

    pub(crate) fn species_name(&self, species: SpeciesId) -> Result<&'a str> {
        self.population.species_name(species).ok_or_else(|| {
            Error::InvalidConfig(format!("{}: unknown species id {species}", self.behavior))
        })
    }

    fn as_code(&self, tag: &str, v: f64) -> Result<i64> {
        if v.fract() != 0.0 || !v.is_finite() {
            return Err(Error::bad_data(
                self.behavior,
                tag,
                format!("{v} is not an integer code"),
            ));
        }
        Ok(v as i64)
    }
}
