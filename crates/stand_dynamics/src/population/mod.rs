//! Tree population collaborator: trees, life stages, and per-tree data members.
//!
//! The mortality and disperse frameworks only read and write trees through data
//! member codes resolved once at setup. They never create trees and never remove
//! them directly; removal of dead trees is a separate step ([`TreePopulation::remove_dead`]).
use std::fmt;

use glam::Vec2;
use mint::Vector2;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::plot::Plot;

pub mod members;
pub mod tree;

pub use members::{BoolCode, DataMemberRegistry, FloatCode, IntCode};
pub use tree::{Tree, TreeId};

/// Global species identifier, stable for the whole run.
pub type SpeciesId = usize;

/// Life-history stage of a tree.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LifeStage {
    Seedling,
    Sapling,
    Adult,
    Snag,
}

impl LifeStage {
    pub const COUNT: usize = 4;

    pub const ALL: [LifeStage; LifeStage::COUNT] = [
        LifeStage::Seedling,
        LifeStage::Sapling,
        LifeStage::Adult,
        LifeStage::Snag,
    ];

    #[inline]
    pub fn index(self) -> usize {
        match self {
            LifeStage::Seedling => 0,
            LifeStage::Sapling => 1,
            LifeStage::Adult => 2,
            LifeStage::Snag => 3,
        }
    }
}

impl fmt::Display for LifeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifeStage::Seedling => "seedling",
            LifeStage::Sapling => "sapling",
            LifeStage::Adult => "adult",
            LifeStage::Snag => "snag",
        };
        f.write_str(name)
    }
}

/// The tree population: species list, trees, and the data member registry.
#[derive(Debug, Clone)]
pub struct TreePopulation {
    species_names: Vec<String>,
    trees: Vec<Tree>,
    registry: DataMemberRegistry,
    next_id: u64,
}

impl TreePopulation {
    /// Creates an empty population with the given species names; species ids are
    /// the positions in this list.
    pub fn new<S: Into<String>>(species_names: impl IntoIterator<Item = S>) -> Self {
        let species_names: Vec<String> = species_names.into_iter().map(Into::into).collect();
        let registry = DataMemberRegistry::new(species_names.len());
        Self {
            species_names,
            trees: Vec::new(),
            registry,
            next_id: 0,
        }
    }

    pub fn species_count(&self) -> usize {
        self.species_names.len()
    }

    pub fn stage_count(&self) -> usize {
        LifeStage::COUNT
    }

    pub fn species_name(&self, species: SpeciesId) -> Option<&str> {
        self.species_names.get(species).map(String::as_str)
    }

    pub fn species_names(&self) -> &[String] {
        &self.species_names
    }

    pub fn species_id(&self, name: &str) -> Option<SpeciesId> {
        self.species_names.iter().position(|n| n == name)
    }

    /// Adds a tree and returns its identity. Diameter is ignored (stored as 0) for seedlings.
    pub fn add_tree(
        &mut self,
        species: SpeciesId,
        stage: LifeStage,
        position: impl Into<Vector2<f32>>,
        dbh: f32,
        height: f32,
    ) -> TreeId {
        debug_assert!(species < self.species_count(), "unknown species {species}");
        let id = TreeId(self.next_id);
        self.next_id += 1;
        let position: Vector2<f32> = position.into();
        let position = Vec2::from(position);
        let dbh = if stage == LifeStage::Seedling { 0.0 } else { dbh };
        let mut tree = Tree::new(id, species, stage, position, dbh, height);
        tree.resize_members(
            self.registry.int_len(),
            self.registry.float_len(),
            self.registry.bool_len(),
        );
        self.trees.push(tree);
        id
    }

    pub fn len(&self) -> usize {
        self.trees.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }

    pub fn trees(&self) -> &[Tree] {
        &self.trees
    }

    pub fn tree(&self, index: usize) -> &Tree {
        &self.trees[index]
    }

    pub fn tree_mut(&mut self, index: usize) -> &mut Tree {
        &mut self.trees[index]
    }

    /// Full scan over every tree, in storage order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Tree)> {
        self.trees.iter().enumerate()
    }

    pub fn registry(&self) -> &DataMemberRegistry {
        &self.registry
    }

    pub fn register_int(&mut self, label: &str, species: SpeciesId, stage: LifeStage) -> IntCode {
        let code = self.registry.register_int(label, species, stage);
        self.sync_member_storage();
        code
    }

    pub fn register_float(
        &mut self,
        label: &str,
        species: SpeciesId,
        stage: LifeStage,
    ) -> FloatCode {
        let code = self.registry.register_float(label, species, stage);
        self.sync_member_storage();
        code
    }

    pub fn register_bool(&mut self, label: &str, species: SpeciesId, stage: LifeStage) -> BoolCode {
        let code = self.registry.register_bool(label, species, stage);
        self.sync_member_storage();
        code
    }

    pub fn int_code(&self, label: &str, species: SpeciesId, stage: LifeStage) -> Option<IntCode> {
        self.registry.int_code(label, species, stage)
    }

    pub fn float_code(
        &self,
        label: &str,
        species: SpeciesId,
        stage: LifeStage,
    ) -> Option<FloatCode> {
        self.registry.float_code(label, species, stage)
    }

    pub fn bool_code(&self, label: &str, species: SpeciesId, stage: LifeStage) -> Option<BoolCode> {
        self.registry.bool_code(label, species, stage)
    }

    /// Trees within `radius` of `origin` (toroidal distance) that are at least
    /// `min_height` tall. Iteration order is storage order and carries no meaning.
    pub fn find_within<'a>(
        &'a self,
        plot: &'a Plot,
        origin: Vec2,
        radius: f32,
        min_height: f32,
    ) -> impl Iterator<Item = (usize, &'a Tree)> + 'a {
        let radius_sq = radius * radius;
        self.trees.iter().enumerate().filter(move |(_, t)| {
            t.height() >= min_height && plot.distance_squared(origin, t.position()) <= radius_sq
        })
    }

    /// Trees of the given species and stage.
    pub fn find_species_stage(
        &self,
        species: SpeciesId,
        stage: LifeStage,
    ) -> impl Iterator<Item = (usize, &Tree)> {
        self.trees
            .iter()
            .enumerate()
            .filter(move |(_, t)| t.species() == species && t.stage() == stage)
    }

    /// Whether `tree`'s dead flag (looked up by `label`) holds a non-zero cause.
    /// Trees of combos without the flag count as alive.
    pub fn is_dead(&self, label: &str, tree: &Tree) -> bool {
        self.registry
            .int_code(label, tree.species(), tree.stage())
            .is_some_and(|code| tree.int(code) != 0)
    }

    /// Removes every tree whose dead flag (looked up by `label`) holds a non-zero cause.
    /// Returns the number of trees removed.
    pub fn remove_dead(&mut self, label: &str) -> usize {
        let before = self.trees.len();
        let registry = &self.registry;
        self.trees.retain(|t| {
            match registry.int_code(label, t.species(), t.stage()) {
                Some(code) => t.int(code) == 0,
                None => true,
            }
        });
        before - self.trees.len()
    }

    fn sync_member_storage(&mut self) {
        let (ni, nf, nb) = (
            self.registry.int_len(),
            self.registry.float_len(),
            self.registry.bool_len(),
        );
        for t in &mut self.trees {
            t.resize_members(ni, nf, nb);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn population() -> TreePopulation {
        TreePopulation::new(["ACRU", "TSCA"])
    }

    #[test]
    fn seedlings_have_zero_diameter() {
        let mut pop = population();
        pop.add_tree(0, LifeStage::Seedling, [1.0, 1.0], 3.0, 0.5);
        assert_eq!(pop.tree(0).dbh(), 0.0);
    }

    #[test]
    fn registration_resizes_existing_trees() {
        let mut pop = population();
        pop.add_tree(0, LifeStage::Adult, [1.0, 1.0], 30.0, 20.0);
        let code = pop.register_float("Growth", 0, LifeStage::Adult);
        pop.tree_mut(0).set_float(code, 2.5);
        assert_eq!(pop.tree(0).float(code), 2.5);

        pop.add_tree(0, LifeStage::Adult, [2.0, 1.0], 30.0, 20.0);
        assert_eq!(pop.tree(1).float(code), 0.0);
    }

    #[test]
    fn find_within_wraps_around_plot_edges() {
        let plot = Plot::new(Vec2::new(100.0, 100.0));
        let mut pop = population();
        pop.add_tree(0, LifeStage::Adult, [1.0, 50.0], 30.0, 20.0);
        pop.add_tree(0, LifeStage::Adult, [99.0, 50.0], 30.0, 20.0);
        pop.add_tree(0, LifeStage::Adult, [50.0, 50.0], 30.0, 20.0);

        let found: Vec<usize> = pop
            .find_within(&plot, Vec2::new(0.0, 50.0), 2.0, 0.0)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(found, vec![0, 1]);
    }

    #[test]
    fn find_within_respects_min_height() {
        let plot = Plot::new(Vec2::new(100.0, 100.0));
        let mut pop = population();
        pop.add_tree(0, LifeStage::Seedling, [10.0, 10.0], 0.0, 0.3);
        pop.add_tree(0, LifeStage::Adult, [10.5, 10.0], 30.0, 20.0);
        let found = pop.find_within(&plot, Vec2::new(10.0, 10.0), 5.0, 1.35).count();
        assert_eq!(found, 1);
    }

    #[test]
    fn remove_dead_drops_flagged_trees_only() {
        let mut pop = population();
        pop.add_tree(0, LifeStage::Adult, [1.0, 1.0], 30.0, 20.0);
        pop.add_tree(1, LifeStage::Adult, [2.0, 1.0], 30.0, 20.0);
        pop.add_tree(0, LifeStage::Adult, [3.0, 1.0], 30.0, 20.0);
        let code = pop.register_int("dead", 0, LifeStage::Adult);
        pop.tree_mut(2).set_int(code, 2);

        assert_eq!(pop.remove_dead("dead"), 1);
        assert_eq!(pop.len(), 2);
        assert_eq!(pop.tree(1).species(), 1);
    }
}
