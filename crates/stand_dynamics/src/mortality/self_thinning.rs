//! Density-dependent self-thinning.
//!
//! Neighbors are counted in a circle around each tree. The circle starts at
//! `self_thinning_radius` and widens by `self_thinning_radius_increment` until it
//! holds `self_thinning_min_neighbors` live trees this strategy governs (or reaches
//! half the shorter plot side). The increment must be at least
//! [`MIN_SEARCH_INCREMENT`] metres. Local density in trees/ha is then
//!
//! ```text
//! density = count · 10000 / (π · r²)
//! ```
//!
//! and the annual death probability saturates with density:
//!
//! ```text
//! p = asymptote · density / (density + density_effect · exp(diam_effect · d))
//! ```
//!
//! Below `min_density_for_mortality` no tree dies.
use std::f64::consts::PI;

use glam::Vec2;

use crate::applicability::{AppliesTo, SpeciesTypeCombo, SpeciesValues};
use crate::behavior::{compound_probability, SetupContext};
use crate::error::Result;
use crate::mortality::{
    widening_radii, DeathCause, MortalityEnv, MortalityStrategy, MIN_SEARCH_INCREMENT,
};
use crate::population::{SpeciesId, Tree};
use crate::random::chance;

#[derive(Debug, Clone, Copy, PartialEq)]
struct SpeciesParams {
    radius: f32,
    radius_increment: f32,
    min_neighbors: usize,
    min_density: f64,
    asymptote: f64,
    diam_effect: f64,
    density_effect: f64,
}

/// Result of a widening neighborhood search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighborhood {
    /// Qualifying neighbors found, excluding the focal tree.
    pub count: usize,
    /// Final search radius in metres.
    pub radius: f32,
    /// Trees per hectare.
    pub density: f64,
}

#[derive(Debug, Clone)]
pub struct SelfThinningMortality {
    combos: Vec<SpeciesTypeCombo>,
    applies: AppliesTo,
    params: Option<SpeciesValues<SpeciesParams>>,
}

impl SelfThinningMortality {
    pub const NAME: &'static str = "SelfThinningMortality";

    pub fn new(combos: Vec<SpeciesTypeCombo>) -> Self {
        Self {
            combos,
            applies: AppliesTo::new(0),
            params: None,
        }
    }

    /// Counts qualifying neighbors of `tree`, widening the radius as needed.
    pub fn neighborhood(&self, tree: &Tree, env: &MortalityEnv<'_>) -> Option<Neighborhood> {
        let p = self.params.as_ref()?.get(tree.species())?;
        let max_radius = 0.5 * env.plot.extent.x.min(env.plot.extent.y);
        let (mut count, mut radius) = (0, max_radius);
        for r in widening_radii(p.radius, max_radius, p.radius_increment) {
            radius = r;
            count = self.count_within(tree, tree.position(), r, env);
            if count >= p.min_neighbors {
                break;
            }
        }
        let r = f64::from(radius);
        let density = count as f64 * 10_000.0 / (PI * r * r);
        Some(Neighborhood {
            count,
            radius,
            density,
        })
    }

    /// Annual death probability at the given local density and diameter.
    pub fn annual_probability(&self, species: SpeciesId, density: f64, diameter: f32) -> f64 {
        let Some(p) = self.params.as_ref().and_then(|v| v.get(species)) else {
            return 0.0;
        };
        if density < p.min_density {
            return 0.0;
        }
        let half = p.density_effect * (p.diam_effect * f64::from(diameter)).exp();
        let denom = density + half;
        if denom <= 0.0 || !denom.is_finite() {
            return 0.0;
        }
        (p.asymptote * density / denom).clamp(0.0, 1.0)
    }

    fn count_within(
        &self,
        focal: &Tree,
        origin: Vec2,
        radius: f32,
        env: &MortalityEnv<'_>,
    ) -> usize {
        env.population
            .find_within(env.plot, origin, radius, 0.0)
            .filter(|(_, t)| {
                t.id() != focal.id()
                    && self.applies.applies(t.species(), t.stage())
                    && !env.is_dead(t)
            })
            .count()
    }
}

impl MortalityStrategy for SelfThinningMortality {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn combos(&self) -> &[SpeciesTypeCombo] {
        &self.combos
    }

    fn setup(&mut self, ctx: &mut SetupContext<'_>) -> Result<()> {
        let index = ctx.species_index(&self.combos);
        let b = ctx.binder(Self::NAME);
        let radius = b.species_positive("self_thinning_radius", &index)?;
        let increment = b.species_checked(
            "self_thinning_radius_increment",
            &index,
            |v| v >= MIN_SEARCH_INCREMENT,
            &format!("must be >= {MIN_SEARCH_INCREMENT}"),
        )?;
        let min_neighbors = b.species_non_negative("self_thinning_min_neighbors", &index)?;
        let min_density = b.species_non_negative("min_density_for_mortality", &index)?;
        let asymptote = b.species_probability("self_thinning_asymptote", &index)?;
        let diam_effect = b.species("self_thinning_diam_effect", &index)?;
        let density_effect = b.species_non_negative("self_thinning_density_effect", &index)?;

        self.params = Some(SpeciesValues::from_fn(&index, |sp| SpeciesParams {
            radius: radius[sp] as f32,
            radius_increment: increment[sp] as f32,
            min_neighbors: min_neighbors[sp].round() as usize,
            min_density: min_density[sp],
            asymptote: asymptote[sp],
            diam_effect: diam_effect[sp],
            density_effect: density_effect[sp],
        }));
        self.applies = AppliesTo::from_combos(ctx.population.species_count(), &self.combos);
        Ok(())
    }

    fn evaluate(&mut self, tree: &Tree, diameter: f32, env: &mut MortalityEnv<'_>) -> DeathCause {
        let Some(hood) = self.neighborhood(tree, env) else {
            return DeathCause::NotDead;
        };
        let annual = self.annual_probability(tree.species(), hood.density, diameter);
        if annual <= 0.0 {
            return DeathCause::NotDead;
        }
        if chance(env.rng, compound_probability(annual, env.years_per_timestep)) {
            DeathCause::Natural
        } else {
            DeathCause::NotDead
        }
    }
}
