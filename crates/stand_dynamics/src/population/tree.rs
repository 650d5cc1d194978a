//! A single tree and its data member storage.
use glam::Vec2;

use crate::population::members::{BoolCode, FloatCode, IntCode};
use crate::population::{LifeStage, SpeciesId};

/// Stable identity of a tree for the lifetime of the run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TreeId(pub u64);

#[derive(Debug, Clone)]
pub struct Tree {
    id: TreeId,
    species: SpeciesId,
    stage: LifeStage,
    position: Vec2,
    dbh: f32,
    height: f32,
    ints: Vec<i32>,
    floats: Vec<f32>,
    bools: Vec<bool>,
}

impl Tree {
    pub(crate) fn new(
        id: TreeId,
        species: SpeciesId,
        stage: LifeStage,
        position: Vec2,
        dbh: f32,
        height: f32,
    ) -> Self {
        Self {
            id,
            species,
            stage,
            position,
            dbh,
            height,
            ints: Vec::new(),
            floats: Vec::new(),
            bools: Vec::new(),
        }
    }

    pub fn id(&self) -> TreeId {
        self.id
    }

    pub fn species(&self) -> SpeciesId {
        self.species
    }

    pub fn stage(&self) -> LifeStage {
        self.stage
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    /// Diameter at breast height in cm; 0 for seedlings.
    pub fn dbh(&self) -> f32 {
        self.dbh
    }

    pub fn height(&self) -> f32 {
        self.height
    }

    pub fn int(&self, code: IntCode) -> i32 {
        self.ints[code.0]
    }

    pub fn float(&self, code: FloatCode) -> f32 {
        self.floats[code.0]
    }

    pub fn bool(&self, code: BoolCode) -> bool {
        self.bools[code.0]
    }

    pub fn set_int(&mut self, code: IntCode, value: i32) {
        self.ints[code.0] = value;
    }

    pub fn set_float(&mut self, code: FloatCode, value: f32) {
        self.floats[code.0] = value;
    }

    pub fn set_bool(&mut self, code: BoolCode, value: bool) {
        self.bools[code.0] = value;
    }

    pub(crate) fn resize_members(&mut self, ints: usize, floats: usize, bools: usize) {
        self.ints.resize(ints, 0);
        self.floats.resize(floats, 0.0);
        self.bools.resize(bools, false);
    }
}
