//! Species × life-stage applicability tables and compact per-behavior species indices.
//!
//! A behavior declares the slice of the population it governs as a list of
//! [`SpeciesTypeCombo`]s. [`AppliesTo`] is the boolean matrix derived from such a
//! list (or from the union of several), and [`SpeciesIndex`] maps global species ids
//! to the small dense index a behavior uses for its own parameter arrays.
use std::ops::Index;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::population::{LifeStage, SpeciesId};

/// A (species, life stage) pair a behavior applies to.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpeciesTypeCombo {
    pub species: SpeciesId,
    pub stage: LifeStage,
}

impl SpeciesTypeCombo {
    pub fn new(species: SpeciesId, stage: LifeStage) -> Self {
        Self { species, stage }
    }
}

/// Helper for building combo lists: every listed species at every listed stage.
pub fn combos_for(species: &[SpeciesId], stages: &[LifeStage]) -> Vec<SpeciesTypeCombo> {
    species
        .iter()
        .flat_map(|&sp| stages.iter().map(move |&st| SpeciesTypeCombo::new(sp, st)))
        .collect()
}

/// Boolean matrix over (species × life stage).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppliesTo {
    n_species: usize,
    cells: Vec<bool>,
}

impl AppliesTo {
    pub fn new(n_species: usize) -> Self {
        Self {
            n_species,
            cells: vec![false; n_species * LifeStage::COUNT],
        }
    }

    pub fn from_combos(n_species: usize, combos: &[SpeciesTypeCombo]) -> Self {
        let mut table = Self::new(n_species);
        for c in combos {
            table.set(c.species, c.stage, true);
        }
        table
    }

    pub fn n_species(&self) -> usize {
        self.n_species
    }

    pub fn set(&mut self, species: SpeciesId, stage: LifeStage, value: bool) {
        debug_assert!(species < self.n_species, "species {species} out of range");
        let i = self.slot(species, stage);
        self.cells[i] = value;
    }

    #[inline]
    pub fn applies(&self, species: SpeciesId, stage: LifeStage) -> bool {
        species < self.n_species && self.cells[self.slot(species, stage)]
    }

    /// Merges `other` into `self` (logical or).
    pub fn union_with(&mut self, other: &AppliesTo) {
        debug_assert_eq!(self.n_species, other.n_species);
        for (a, b) in self.cells.iter_mut().zip(&other.cells) {
            *a |= *b;
        }
    }

    pub fn count(&self) -> usize {
        self.cells.iter().filter(|c| **c).count()
    }

    /// The combinations set in this table, species-major.
    pub fn combos(&self) -> Vec<SpeciesTypeCombo> {
        let mut out = Vec::with_capacity(self.count());
        for sp in 0..self.n_species {
            for stage in LifeStage::ALL {
                if self.applies(sp, stage) {
                    out.push(SpeciesTypeCombo::new(sp, stage));
                }
            }
        }
        out
    }

    #[inline]
    fn slot(&self, species: SpeciesId, stage: LifeStage) -> usize {
        species * LifeStage::COUNT + stage.index()
    }
}

/// Maps global species ids to a dense per-behavior index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SpeciesIndex {
    dense: Vec<Option<usize>>,
    species: Vec<SpeciesId>,
}

impl SpeciesIndex {
    /// Builds the index from the species appearing in `combos`, in ascending species order.
    pub fn from_combos(n_species: usize, combos: &[SpeciesTypeCombo]) -> Self {
        let mut present = vec![false; n_species];
        for c in combos {
            present[c.species] = true;
        }
        Self::from_mask(&present)
    }

    pub fn from_species(n_species: usize, species: &[SpeciesId]) -> Self {
        let mut present = vec![false; n_species];
        for &sp in species {
            present[sp] = true;
        }
        Self::from_mask(&present)
    }

    fn from_mask(present: &[bool]) -> Self {
        let mut dense = vec![None; present.len()];
        let mut species = Vec::new();
        for (sp, &p) in present.iter().enumerate() {
            if p {
                dense[sp] = Some(species.len());
                species.push(sp);
            }
        }
        Self { dense, species }
    }

    /// Dense index of `species`, if this behavior covers it.
    #[inline]
    pub fn get(&self, species: SpeciesId) -> Option<usize> {
        self.dense.get(species).copied().flatten()
    }

    pub fn contains(&self, species: SpeciesId) -> bool {
        self.get(species).is_some()
    }

    /// Covered species, ascending.
    pub fn species(&self) -> &[SpeciesId] {
        &self.species
    }

    pub fn len(&self) -> usize {
        self.species.len()
    }

    pub fn is_empty(&self) -> bool {
        self.species.is_empty()
    }
}

/// Per-species values stored densely and addressed by global species id.
#[derive(Clone, Debug, PartialEq)]
pub struct SpeciesValues<T> {
    index: SpeciesIndex,
    values: Vec<T>,
}

impl<T> SpeciesValues<T> {
    pub(crate) fn new(index: SpeciesIndex, values: Vec<T>) -> Self {
        debug_assert_eq!(index.len(), values.len());
        Self { index, values }
    }

    /// Builds values by calling `f` for each covered species.
    pub fn from_fn(index: &SpeciesIndex, f: impl FnMut(SpeciesId) -> T) -> Self {
        let values = index.species().iter().copied().map(f).collect();
        Self::new(index.clone(), values)
    }

    pub fn get(&self, species: SpeciesId) -> Option<&T> {
        self.index.get(species).map(|i| &self.values[i])
    }

    pub fn get_mut(&mut self, species: SpeciesId) -> Option<&mut T> {
        let i = self.index.get(species)?;
        Some(&mut self.values[i])
    }

    /// (species, value) pairs in ascending species order.
    pub fn iter(&self) -> impl Iterator<Item = (SpeciesId, &T)> {
        self.index.species().iter().copied().zip(self.values.iter())
    }

    pub fn species_index(&self) -> &SpeciesIndex {
        &self.index
    }

    pub fn map<U>(&self, mut f: impl FnMut(&T) -> U) -> SpeciesValues<U> {
        SpeciesValues::new(self.index.clone(), self.values.iter().map(&mut f).collect())
    }
}

impl<T> Index<SpeciesId> for SpeciesValues<T> {
    type Output = T;

    fn index(&self, species: SpeciesId) -> &T {
        match self.index.get(species) {
            Some(i) => &self.values[i],
            None => panic!("species {species} is not covered by this parameter set"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_covers_both_tables() {
        let a = AppliesTo::from_combos(3, &[SpeciesTypeCombo::new(0, LifeStage::Adult)]);
        let b = AppliesTo::from_combos(
            3,
            &[
                SpeciesTypeCombo::new(0, LifeStage::Adult),
                SpeciesTypeCombo::new(2, LifeStage::Sapling),
            ],
        );
        let mut u = a.clone();
        u.union_with(&b);
        assert_eq!(u.count(), 2);
        assert!(u.applies(2, LifeStage::Sapling));
        assert!(!u.applies(1, LifeStage::Sapling));
        assert!(!u.applies(7, LifeStage::Adult));
    }

    #[test]
    fn combos_roundtrip_through_table_in_species_major_order() {
        let combos = combos_for(&[2, 0], &[LifeStage::Snag, LifeStage::Sapling]);
        let table = AppliesTo::from_combos(3, &combos);
        assert_eq!(
            table.combos(),
            vec![
                SpeciesTypeCombo::new(0, LifeStage::Sapling),
                SpeciesTypeCombo::new(0, LifeStage::Snag),
                SpeciesTypeCombo::new(2, LifeStage::Sapling),
                SpeciesTypeCombo::new(2, LifeStage::Snag),
            ]
        );
    }

    #[test]
    fn species_index_is_dense_and_ordered() {
        let idx = SpeciesIndex::from_combos(
            5,
            &combos_for(&[4, 1], &[LifeStage::Adult, LifeStage::Sapling]),
        );
        assert_eq!(idx.species(), &[1, 4]);
        assert_eq!(idx.get(1), Some(0));
        assert_eq!(idx.get(4), Some(1));
        assert_eq!(idx.get(0), None);
        assert_eq!(idx.get(99), None);
    }

    #[test]
    fn species_values_index_by_global_id() {
        let idx = SpeciesIndex::from_species(4, &[3, 1]);
        let values = SpeciesValues::from_fn(&idx, |sp| sp as f64 * 10.0);
        assert_eq!(values[3], 30.0);
        assert_eq!(values[1], 10.0);
        assert!(values.get(0).is_none());
        let doubled = values.map(|v| v * 2.0);
        assert_eq!(doubled[3], 60.0);
    }
}
