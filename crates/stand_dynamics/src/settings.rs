//! Run-wide settings shared by every behavior.
use glam::Vec2;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::plot::Plot;

/// Settings for a simulation run.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    /// Length of one timestep in years.
    pub years_per_timestep: f64,
    /// Total number of timesteps in the run.
    pub number_of_timesteps: u32,
    /// Plot size in metres.
    pub plot_extent: Vec2,
    /// Cell size of the dispersed-seeds grid in metres.
    pub seed_grid_cell_size: f32,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            years_per_timestep: 1.0,
            number_of_timesteps: 1,
            plot_extent: Vec2::new(0.0, 0.0),
            seed_grid_cell_size: 8.0,
        }
    }
}

impl RunSettings {
    /// Creates settings for a plot of the given extent.
    pub fn new(plot_extent: Vec2) -> Self {
        Self {
            plot_extent,
            ..Default::default()
        }
    }

    /// Sets the timestep length in years.
    pub fn with_years_per_timestep(mut self, years: f64) -> Self {
        self.years_per_timestep = years;
        self
    }

    /// Sets the run length in timesteps.
    pub fn with_number_of_timesteps(mut self, timesteps: u32) -> Self {
        self.number_of_timesteps = timesteps;
        self
    }

    /// Sets the dispersed-seeds grid cell size.
    pub fn with_seed_grid_cell_size(mut self, size: f32) -> Self {
        self.seed_grid_cell_size = size;
        self
    }

    pub fn plot(&self) -> Plot {
        Plot::new(self.plot_extent)
    }

    /// Validates the settings, returning an error if invalid.
    pub fn validate(&self) -> Result<()> {
        if self.plot_extent.x <= 0.0 || self.plot_extent.y <= 0.0 {
            return Err(Error::InvalidConfig(
                "plot_extent must be > 0 in both components".into(),
            ));
        }
        if self.years_per_timestep.is_nan() || self.years_per_timestep <= 0.0 {
            return Err(Error::InvalidConfig(
                "years_per_timestep must be > 0".into(),
            ));
        }
        if self.number_of_timesteps == 0 {
            return Err(Error::InvalidConfig(
                "number_of_timesteps must be > 0".into(),
            ));
        }
        if self.seed_grid_cell_size <= 0.0 {
            return Err(Error::InvalidConfig(
                "seed_grid_cell_size must be > 0".into(),
            ));
        }
        Ok(())
    }
}
