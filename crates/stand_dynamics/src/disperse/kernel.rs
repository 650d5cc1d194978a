//! Dispersal kernels and their cumulative distance distributions.
//!
//! A kernel gives the relative seed density at distance `r` from the parent.
//! [`DistanceCdf::build`] integrates it over unit-width rings (`2π·r·k(r)`) out to
//! `min(1000 m, larger plot side)` and normalizes the result, so that a single
//! uniform draw maps to a dispersal distance.
use std::f64::consts::PI;

use glam::Vec2;
use rand::RngCore;
use tracing::warn;

use crate::applicability::{SpeciesIndex, SpeciesValues};
use crate::disperse::grid::SeedGrid;
use crate::error::{Error, Result};
use crate::params::ConfigBinder;
use crate::plot::Plot;
use crate::population::SpeciesId;
use crate::random::rand01;

/// Farthest distance, in metres, any seed travels.
pub const MAX_DISPERSAL_DISTANCE: usize = 1000;

/// Largest Weibull theta or lognormal Xb accepted; beyond it `powf`/`exp`
/// underflow over the kernel range.
pub const MAX_SHAPE: f64 = 50.0;

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DispersalKernel {
    /// `k(r) = exp(-dispersal · r^theta)`.
    Weibull { dispersal: f64, theta: f64 },
    /// `k(r) = exp(-0.5 · (ln(r / x0) / xb)²)`.
    Lognormal { x0: f64, xb: f64 },
}

impl DispersalKernel {
    pub const WEIBULL_CODE: i64 = 0;
    pub const LOGNORMAL_CODE: i64 = 1;

    /// Relative (unnormalized) seed density at distance `r`.
    pub fn density(&self, r: f64) -> f64 {
        match *self {
            DispersalKernel::Weibull { dispersal, theta } => (-dispersal * r.powf(theta)).exp(),
            DispersalKernel::Lognormal { x0, xb } => {
                if r <= 0.0 {
                    return 0.0;
                }
                let z = (r / x0).ln() / xb;
                (-0.5 * z * z).exp()
            }
        }
    }

    /// Rejects parameter combinations that cannot produce a usable distribution.
    pub fn check(&self) -> std::result::Result<(), String> {
        match *self {
            DispersalKernel::Weibull { dispersal, theta } => {
                if dispersal.is_nan() || dispersal <= 0.0 {
                    return Err(format!("Weibull dispersal {dispersal} must be > 0"));
                }
                if theta.is_nan() || theta <= 0.0 || theta > MAX_SHAPE {
                    return Err(format!("Weibull theta {theta} must be in (0, {MAX_SHAPE}]"));
                }
            }
            DispersalKernel::Lognormal { x0, xb } => {
                if x0.is_nan() || x0 <= 0.0 {
                    return Err(format!("lognormal X0 {x0} must be > 0"));
                }
                if xb.is_nan() || xb <= 0.0 || xb > MAX_SHAPE {
                    return Err(format!("lognormal Xb {xb} must be in (0, {MAX_SHAPE}]"));
                }
            }
        }
        Ok(())
    }

    /// Reads one kernel per species from `{prefix}dispersal_kernel` and the
    /// family parameters `{prefix}weibull_dispersal`, `{prefix}weibull_theta`,
    /// `{prefix}lognormal_x0` and `{prefix}lognormal_xb`. Only the parameters of
    /// the family a species selects are required.
    pub fn read_species(
        binder: &ConfigBinder<'_>,
        index: &SpeciesIndex,
        prefix: &str,
    ) -> Result<SpeciesValues<DispersalKernel>> {
        let code_tag = format!("{prefix}dispersal_kernel");
        let codes = binder.species_code(&code_tag, index)?;
        let n_species = index.species().iter().max().map_or(0, |&m| m + 1);

        let mut weibull = Vec::new();
        let mut lognormal = Vec::new();
        for (sp, &code) in codes.iter() {
            match code {
                Self::WEIBULL_CODE => weibull.push(sp),
                Self::LOGNORMAL_CODE => lognormal.push(sp),
                other => {
                    let name = binder.species_name(sp)?;
                    return Err(binder.reject(
                        &code_tag,
                        format!("{name}: unrecognized kernel code {other}"),
                    ));
                }
            }
        }

        let weibull_index = SpeciesIndex::from_species(n_species, &weibull);
        let dispersal = binder.species(&format!("{prefix}weibull_dispersal"), &weibull_index)?;
        let theta = binder.species(&format!("{prefix}weibull_theta"), &weibull_index)?;
        let lognormal_index = SpeciesIndex::from_species(n_species, &lognormal);
        let x0 = binder.species(&format!("{prefix}lognormal_x0"), &lognormal_index)?;
        let xb = binder.species(&format!("{prefix}lognormal_xb"), &lognormal_index)?;

        let mut kernels = Vec::with_capacity(index.len());
        for &sp in index.species() {
            let kernel = if weibull_index.contains(sp) {
                DispersalKernel::Weibull {
                    dispersal: dispersal[sp],
                    theta: theta[sp],
                }
            } else {
                DispersalKernel::Lognormal {
                    x0: x0[sp],
                    xb: xb[sp],
                }
            };
            if let Err(message) = kernel.check() {
                let name = binder.species_name(sp)?;
                return Err(binder.reject(&code_tag, format!("{name}: {message}")));
            }
            kernels.push(kernel);
        }
        Ok(SpeciesValues::new(index.clone(), kernels))
    }
}

/// Cumulative probability of dispersal distance over integer-metre buckets.
///
/// Entry `i` is the probability that a seed lands within `i + 1` metres of its
/// parent. Entries never decrease and the last one is exactly 1.
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceCdf {
    values: Vec<f64>,
}

impl DistanceCdf {
    /// Horizon for a plot: `min(1000, larger plot side)`, at least one metre.
    pub fn horizon(plot: &Plot) -> usize {
        (plot.max_dimension().floor() as usize).clamp(1, MAX_DISPERSAL_DISTANCE)
    }

    /// Builds the distribution for `kernel` out to `horizon` metres.
    pub fn build(kernel: &DispersalKernel, horizon: usize, species: SpeciesId) -> Result<Self> {
        let horizon = horizon.clamp(1, MAX_DISPERSAL_DISTANCE);
        let ring = |i: usize| {
            let r = i as f64 + 0.5;
            2.0 * PI * r * kernel.density(r)
        };

        let mut values = Vec::with_capacity(horizon);
        let mut total = 0.0;
        for i in 0..horizon {
            total += ring(i);
            values.push(total);
        }
        if !total.is_finite() || total <= 0.0 {
            return Err(Error::Kernel {
                species,
                message: format!("kernel {kernel:?} has no mass within {horizon} m"),
            });
        }

        if horizon < MAX_DISPERSAL_DISTANCE {
            let beyond: f64 = (horizon..MAX_DISPERSAL_DISTANCE).map(ring).sum();
            if beyond > 0.01 * (total + beyond) {
                warn!(
                    "Dispersal kernel for species {} loses {:.1}% of its mass past {} m.",
                    species,
                    100.0 * beyond / (total + beyond),
                    horizon
                );
            }
        }

        for v in &mut values {
            *v = (*v / total).min(1.0);
        }
        if let Some(last) = values.last_mut() {
            *last = 1.0;
        }
        if values.windows(2).any(|w| w[1] < w[0]) {
            return Err(Error::Kernel {
                species,
                message: "cumulative distance distribution is not monotonic".into(),
            });
        }
        Ok(Self { values })
    }

    /// Builds one distribution per species.
    pub fn build_species(
        kernels: &SpeciesValues<DispersalKernel>,
        horizon: usize,
    ) -> Result<SpeciesValues<DistanceCdf>> {
        let mut cdfs = Vec::with_capacity(kernels.species_index().len());
        for (sp, kernel) in kernels.iter() {
            cdfs.push(Self::build(kernel, horizon, sp)?);
        }
        Ok(SpeciesValues::new(kernels.species_index().clone(), cdfs))
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Maps a uniform draw `u` in [0, 1) to a distance in metres: the first
    /// bucket whose cumulative value reaches `u`, interpolated within the bucket.
    pub fn distance(&self, u: f64) -> f64 {
        let i = self
            .values
            .iter()
            .position(|&c| c >= u)
            .unwrap_or(self.values.len() - 1);
        let lower = if i == 0 { 0.0 } else { self.values[i - 1] };
        let upper = self.values[i];
        let frac = if upper > lower {
            ((u - lower) / (upper - lower)).clamp(0.0, 1.0)
        } else {
            0.0
        };
        i as f64 + frac
    }

    /// Draws a dispersal distance.
    pub fn sample(&self, rng: &mut dyn RngCore) -> f64 {
        self.distance(rand01(rng))
    }
}

/// Drops `count` seeds of `species` around `origin`, one at a time: a distance
/// from `cdf`, a uniform direction, then a wrap into the plot.
pub fn scatter_seeds(
    grid: &mut SeedGrid,
    plot: &Plot,
    origin: Vec2,
    species: SpeciesId,
    count: u64,
    cdf: &DistanceCdf,
    rng: &mut dyn RngCore,
) {
    for _ in 0..count {
        let distance = cdf.sample(rng) as f32;
        let angle = (2.0 * PI * rand01(rng)) as f32;
        let p = origin + Vec2::new(angle.cos(), angle.sin()) * distance;
        grid.add_seeds_at_point(plot.wrap(p), species, 1.0);
    }
}
