use std::fs;
use std::path::Path;

use anyhow::Context;
use glam::Vec2;
use rand::Rng;
use stand_dynamics::prelude::{LifeStage, ParameterFile, TreePopulation};

/// A randomly planted stand of adults.
#[derive(Debug, Clone)]
pub struct StandLayout {
    pub extent: Vec2,
    pub trees: usize,
    pub species: Vec<String>,
    /// DBH range in cm, drawn uniformly.
    pub dbh: (f32, f32),
}

impl StandLayout {
    pub fn new(extent: Vec2, trees: usize, species: &[&str]) -> Self {
        Self {
            extent,
            trees,
            species: species.iter().map(|s| s.to_string()).collect(),
            dbh: (10.0, 60.0),
        }
    }

    pub fn with_dbh(mut self, min: f32, max: f32) -> Self {
        self.dbh = (min, max.max(min));
        self
    }
}

/// Plants `layout.trees` adults at uniform positions, species chosen uniformly.
pub fn random_stand(layout: &StandLayout, rng: &mut impl Rng) -> TreePopulation {
    let mut pop = TreePopulation::new(layout.species.iter().cloned());
    if layout.species.is_empty() {
        return pop;
    }
    for _ in 0..layout.trees {
        let sp = rng.random_range(0..layout.species.len());
        let x = rng.random::<f32>() * layout.extent.x;
        let y = rng.random::<f32>() * layout.extent.y;
        let dbh = layout.dbh.0 + rng.random::<f32>() * (layout.dbh.1 - layout.dbh.0);
        pop.add_tree(sp, LifeStage::Adult, [x, y], dbh, 1.3 + dbh * 0.6);
    }
    pop
}

/// Reads a JSON parameter file.
pub fn load_params(path: impl AsRef<Path>) -> anyhow::Result<ParameterFile> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))
}
