//! The "Dispersed Seeds" grid.
//!
//! [`SeedGrid`] tiles the plot in square cells and keeps, per cell, one float
//! seed counter per species, a gap flag, and the count of canopy trees that
//! decided the gap flag.
use glam::Vec2;

use crate::error::{Error, Result};
use crate::mortality::DEAD_FLAG;
use crate::plot::Plot;
use crate::population::{LifeStage, SpeciesId, TreePopulation};

/// Name of the seed grid.
pub const DISPERSED_SEEDS: &str = "Dispersed Seeds";

/// Per-cell seed tallies over a toroidal plot.
#[derive(Clone, Debug)]
pub struct SeedGrid {
    /// Cell edge length in metres.
    pub cell_size: f32,
    /// Number of cells in X.
    pub width: usize,
    /// Number of cells in Y.
    pub height: usize,
    n_species: usize,
    seeds: Vec<f32>,
    is_gap: Vec<bool>,
    count: Vec<i32>,
    gap_status_updated: bool,
}

impl SeedGrid {
    /// Creates an empty grid covering `plot`. Edge cells may extend past the plot.
    pub fn new(plot: &Plot, cell_size: f32, n_species: usize) -> Result<Self> {
        if cell_size.is_nan() || cell_size <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "{DISPERSED_SEEDS}: cell size must be > 0, got {cell_size}"
            )));
        }
        let width = ((plot.extent.x / cell_size).ceil() as usize).max(1);
        let height = ((plot.extent.y / cell_size).ceil() as usize).max(1);
        let cells = width * height;
        Ok(Self {
            cell_size,
            width,
            height,
            n_species,
            seeds: vec![0.0; cells * n_species],
            is_gap: vec![true; cells],
            count: vec![0; cells],
            gap_status_updated: false,
        })
    }

    pub fn size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    pub fn n_species(&self) -> usize {
        self.n_species
    }

    pub fn cell_count(&self) -> usize {
        self.width * self.height
    }

    /// Cell holding the (already wrapped) point `p`.
    pub fn cell_of(&self, p: Vec2) -> (usize, usize) {
        let ix = (p.x / self.cell_size).floor().max(0.0) as usize;
        let iy = (p.y / self.cell_size).floor().max(0.0) as usize;
        (ix.min(self.width - 1), iy.min(self.height - 1))
    }

    /// Lower-left corner of a cell.
    pub fn cell_origin(&self, ix: usize, iy: usize) -> Vec2 {
        Vec2::new(ix as f32 * self.cell_size, iy as f32 * self.cell_size)
    }

    #[inline]
    fn cell_index(&self, ix: usize, iy: usize) -> usize {
        debug_assert!(ix < self.width && iy < self.height);
        iy * self.width + ix
    }

    #[inline]
    fn seed_index(&self, ix: usize, iy: usize, species: SpeciesId) -> usize {
        debug_assert!(species < self.n_species);
        self.cell_index(ix, iy) * self.n_species + species
    }

    pub fn seeds(&self, ix: usize, iy: usize, species: SpeciesId) -> f32 {
        self.seeds[self.seed_index(ix, iy, species)]
    }

    pub fn set_seeds(&mut self, ix: usize, iy: usize, species: SpeciesId, value: f32) {
        let i = self.seed_index(ix, iy, species);
        self.seeds[i] = value;
    }

    /// Adds to a cell's tally. Negative amounts are ignored.
    pub fn add_seeds(&mut self, ix: usize, iy: usize, species: SpeciesId, amount: f32) {
        if amount > 0.0 {
            let i = self.seed_index(ix, iy, species);
            self.seeds[i] += amount;
        }
    }

    pub fn add_seeds_at_point(&mut self, p: Vec2, species: SpeciesId, amount: f32) {
        let (ix, iy) = self.cell_of(p);
        self.add_seeds(ix, iy, species, amount);
    }

    pub fn seeds_at_point(&self, p: Vec2, species: SpeciesId) -> f32 {
        let (ix, iy) = self.cell_of(p);
        self.seeds(ix, iy, species)
    }

    pub fn species_total(&self, species: SpeciesId) -> f64 {
        self.seeds
            .iter()
            .skip(species)
            .step_by(self.n_species.max(1))
            .map(|&v| f64::from(v))
            .sum()
    }

    pub fn total(&self) -> f64 {
        self.seeds.iter().map(|&v| f64::from(v)).sum()
    }

    /// Mutable tallies of one cell, indexed by species.
    pub fn cell_seeds_mut(&mut self, ix: usize, iy: usize) -> &mut [f32] {
        let start = self.cell_index(ix, iy) * self.n_species;
        &mut self.seeds[start..start + self.n_species]
    }

    pub fn is_gap(&self, ix: usize, iy: usize) -> bool {
        self.is_gap[self.cell_index(ix, iy)]
    }

    pub fn is_gap_at_point(&self, p: Vec2) -> bool {
        let (ix, iy) = self.cell_of(p);
        self.is_gap(ix, iy)
    }

    /// Canopy trees counted in the cell at the last gap update.
    pub fn count(&self, ix: usize, iy: usize) -> i32 {
        self.count[self.cell_index(ix, iy)]
    }

    pub fn gap_status_updated(&self) -> bool {
        self.gap_status_updated
    }

    /// Recomputes gap status unless it was already done this timestep. A cell is
    /// a gap when it holds no live adult with a DBH of at least `min_canopy_dbh`.
    pub fn update_gap_status(&mut self, population: &TreePopulation, min_canopy_dbh: f32) {
        if self.gap_status_updated {
            return;
        }
        self.count.iter_mut().for_each(|c| *c = 0);
        for tree in population.trees() {
            if tree.stage() != LifeStage::Adult
                || tree.dbh() < min_canopy_dbh
                || population.is_dead(DEAD_FLAG, tree)
            {
                continue;
            }
            let (ix, iy) = self.cell_of(tree.position());
            let i = self.cell_index(ix, iy);
            self.count[i] += 1;
        }
        for (gap, &count) in self.is_gap.iter_mut().zip(&self.count) {
            *gap = count == 0;
        }
        self.gap_status_updated = true;
    }

    /// Zeroes every seed counter and clears the gap-updated flag.
    pub fn timestep_cleanup(&mut self) {
        self.seeds.iter_mut().for_each(|v| *v = 0.0);
        self.gap_status_updated = false;
    }
}
