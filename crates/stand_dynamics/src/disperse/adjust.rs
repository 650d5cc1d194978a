//! Stochastic adjustment of raw seed tallies.
use rand::RngCore;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::applicability::SpeciesValues;
use crate::disperse::grid::SeedGrid;
use crate::population::SpeciesId;
use crate::random::{lognormal, negative_binomial, normal, poisson};

/// Shape of the draw that replaces each positive seed tally.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeedDistribution {
    Deterministic,
    Poisson,
    Lognormal,
    Normal,
    NegativeBinomial,
}

impl SeedDistribution {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(SeedDistribution::Deterministic),
            1 => Some(SeedDistribution::Poisson),
            2 => Some(SeedDistribution::Lognormal),
            3 => Some(SeedDistribution::Normal),
            4 => Some(SeedDistribution::NegativeBinomial),
            _ => None,
        }
    }

    pub fn code(self) -> i64 {
        match self {
            SeedDistribution::Deterministic => 0,
            SeedDistribution::Poisson => 1,
            SeedDistribution::Lognormal => 2,
            SeedDistribution::Normal => 3,
            SeedDistribution::NegativeBinomial => 4,
        }
    }

    /// Per-species parameter tag the shape needs, if any.
    pub fn scale_tag(self) -> Option<&'static str> {
        match self {
            SeedDistribution::Lognormal | SeedDistribution::Normal => Some("seed_dist_std_dev"),
            SeedDistribution::NegativeBinomial => Some("seed_clumping"),
            SeedDistribution::Deterministic | SeedDistribution::Poisson => None,
        }
    }
}

/// The adjustment chosen at setup, with its per-species scale.
#[derive(Debug, Clone, PartialEq)]
pub enum SeedAdjuster {
    /// Tallies pass through unchanged, fractions included.
    Deterministic,
    Poisson,
    /// Mean-preserving lognormal with this sigma per species.
    Lognormal(SpeciesValues<f64>),
    /// Tally plus zero-mean noise with this standard deviation, floored at 0.
    Normal(SpeciesValues<f64>),
    /// Negative binomial with this clumping parameter per species.
    NegativeBinomial(SpeciesValues<f64>),
}

impl SeedAdjuster {
    pub fn distribution(&self) -> SeedDistribution {
        match self {
            SeedAdjuster::Deterministic => SeedDistribution::Deterministic,
            SeedAdjuster::Poisson => SeedDistribution::Poisson,
            SeedAdjuster::Lognormal(_) => SeedDistribution::Lognormal,
            SeedAdjuster::Normal(_) => SeedDistribution::Normal,
            SeedAdjuster::NegativeBinomial(_) => SeedDistribution::NegativeBinomial,
        }
    }

    /// One draw with mean `tally`. Species without a scale keep their tally.
    pub fn adjust(&self, species: SpeciesId, tally: f64, rng: &mut dyn RngCore) -> f64 {
        match self {
            SeedAdjuster::Deterministic => tally,
            SeedAdjuster::Poisson => poisson(rng, tally) as f64,
            SeedAdjuster::Lognormal(sigma) => match sigma.get(species) {
                Some(&s) => lognormal(rng, tally, s),
                None => tally,
            },
            SeedAdjuster::Normal(sd) => match sd.get(species) {
                Some(&s) => normal(rng, tally, s).max(0.0),
                None => tally,
            },
            SeedAdjuster::NegativeBinomial(k) => match k.get(species) {
                Some(&k) => negative_binomial(rng, tally, k) as f64,
                None => tally,
            },
        }
    }

    /// Replaces every positive tally in `grid` with one draw. Cells are visited
    /// row-major, species innermost. Returns the raw and adjusted totals.
    pub fn adjust_grid(&self, grid: &mut SeedGrid, rng: &mut dyn RngCore) -> (f64, f64) {
        let mut raw = 0.0;
        let mut adjusted = 0.0;
        let (w, h) = grid.size();
        for iy in 0..h {
            for ix in 0..w {
                for (species, tally) in grid.cell_seeds_mut(ix, iy).iter_mut().enumerate() {
                    if *tally <= 0.0 {
                        continue;
                    }
                    raw += f64::from(*tally);
                    *tally = self.adjust(species, f64::from(*tally), rng) as f32;
                    adjusted += f64::from(*tally);
                }
            }
        }
        (raw, adjusted)
    }
}
