//! Kernel-based dispersal from individual parent trees.
//!
//! Each live reproductive tree (DBH above zero and at least
//! `min_reproductive_dbh`) produces `STR · (DBH / 30)^β` seeds per year. Seeds
//! are scattered one at a time using the species' distance distribution. With
//! `use_gap_dispersal = 1`, parents standing in a gap cell of the seed grid use
//! a second parameter set read from the `gap_` tags.
use rand::RngCore;
use tracing::debug;

use crate::applicability::{AppliesTo, SpeciesIndex, SpeciesTypeCombo, SpeciesValues};
use crate::behavior::SetupContext;
use crate::disperse::kernel::{scatter_seeds, DispersalKernel, DistanceCdf};
use crate::disperse::{DisperseEnv, DisperseStrategy};
use crate::error::{Error, Result};
use crate::mortality::DEAD_FLAG;
use crate::params::ConfigBinder;
use crate::population::SpeciesId;
use crate::random::random_round;

/// Reference DBH in cm for the STR parameter.
pub const STR_REFERENCE_DBH: f64 = 30.0;

/// Largest seed count a single parent may produce in one timestep.
pub const MAX_SEEDS_PER_PARENT: f64 = 1.0e9;

/// Seed production and dispersal parameters for one canopy condition.
#[derive(Debug, Clone)]
struct ParameterSet {
    str: SpeciesValues<f64>,
    beta: SpeciesValues<f64>,
    cdf: SpeciesValues<DistanceCdf>,
}

impl ParameterSet {
    fn read(
        binder: &ConfigBinder<'_>,
        index: &SpeciesIndex,
        prefix: &str,
        horizon: usize,
    ) -> Result<Self> {
        let str = binder.species_non_negative(&format!("{prefix}str"), index)?;
        let beta = binder.species(&format!("{prefix}beta"), index)?;
        let kernels = DispersalKernel::read_species(binder, index, prefix)?;
        Ok(Self {
            str,
            beta,
            cdf: DistanceCdf::build_species(&kernels, horizon)?,
        })
    }

    fn seeds_per_year(&self, species: usize, dbh: f32) -> f64 {
        let (Some(&s), Some(&b)) = (self.str.get(species), self.beta.get(species)) else {
            return 0.0;
        };
        str_production(s, b, dbh)
    }
}

/// `str · (dbh / 30)^beta` seeds per year. Trees without a diameter produce none.
pub(crate) fn str_production(str: f64, beta: f64, dbh: f32) -> f64 {
    if dbh <= 0.0 {
        return 0.0;
    }
    str * (f64::from(dbh) / STR_REFERENCE_DBH).powf(beta)
}

/// Rounds the seeds one parent produces in a timestep to a whole count.
///
/// Fails with [`Error::BadData`] on `str` when the expectation is not finite or
/// exceeds [`MAX_SEEDS_PER_PARENT`].
pub(crate) fn parent_seed_count(
    rng: &mut dyn RngCore,
    behavior: &str,
    tag: &str,
    species: SpeciesId,
    expected: f64,
) -> Result<u64> {
    if !expected.is_finite() || expected > MAX_SEEDS_PER_PARENT {
        return Err(Error::bad_data(
            behavior,
            tag,
            format!("species {species}: {expected} seeds from one parent in one timestep"),
        ));
    }
    Ok(random_round(rng, expected))
}

#[derive(Debug, Clone)]
struct Bound {
    applies: AppliesTo,
    min_reproductive_dbh: SpeciesValues<f64>,
    canopy: ParameterSet,
    gap: Option<(ParameterSet, f32)>,
}

#[derive(Debug, Clone)]
pub struct SpatialDisperse {
    combos: Vec<SpeciesTypeCombo>,
    bound: Option<Bound>,
}

impl SpatialDisperse {
    pub const NAME: &'static str = "SpatialDisperse";

    pub fn new(combos: Vec<SpeciesTypeCombo>) -> Self {
        Self {
            combos,
            bound: None,
        }
    }

    /// Seeds per year of a parent of `species` with the given DBH, under the
    /// canopy or in a gap. Zero below the reproductive DBH.
    pub fn seeds_per_year(&self, species: usize, dbh: f32, in_gap: bool) -> f64 {
        let Some(bound) = self.bound.as_ref() else {
            return 0.0;
        };
        match bound.min_reproductive_dbh.get(species) {
            Some(&min) if f64::from(dbh) >= min => {}
            _ => return 0.0,
        }
        match (&bound.gap, in_gap) {
            (Some((gap, _)), true) => gap.seeds_per_year(species, dbh),
            _ => bound.canopy.seeds_per_year(species, dbh),
        }
    }

    pub fn distance_cdf(&self, species: usize, in_gap: bool) -> Option<&DistanceCdf> {
        let bound = self.bound.as_ref()?;
        match (&bound.gap, in_gap) {
            (Some((gap, _)), true) => gap.cdf.get(species),
            _ => bound.canopy.cdf.get(species),
        }
    }
}

impl DisperseStrategy for SpatialDisperse {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn combos(&self) -> &[SpeciesTypeCombo] {
        &self.combos
    }

    fn setup(&mut self, ctx: &mut SetupContext<'_>) -> Result<()> {
        let index = ctx.species_index(&self.combos);
        let horizon = DistanceCdf::horizon(&ctx.settings.plot());
        let b = ctx.binder(Self::NAME);

        let min_reproductive_dbh = b.species_non_negative("min_reproductive_dbh", &index)?;
        let canopy = ParameterSet::read(&b, &index, "", horizon)?;
        let gap = match b.single_or("use_gap_dispersal", 0.0) {
            v if v == 0.0 => None,
            v if v == 1.0 => {
                let min_canopy_dbh = b.single("min_canopy_dbh")?;
                if min_canopy_dbh.is_nan() || min_canopy_dbh < 0.0 {
                    return Err(b.reject("min_canopy_dbh", "must be >= 0"));
                }
                let set = ParameterSet::read(&b, &index, "gap_", horizon)?;
                Some((set, min_canopy_dbh as f32))
            }
            v => return Err(b.reject("use_gap_dispersal", format!("{v} is not 0 or 1"))),
        };

        debug!(
            "{}: {} species, horizon {} m, gap parameters {}.",
            Self::NAME,
            index.len(),
            horizon,
            if gap.is_some() { "on" } else { "off" }
        );
        self.bound = Some(Bound {
            applies: AppliesTo::from_combos(ctx.population.species_count(), &self.combos),
            min_reproductive_dbh,
            canopy,
            gap,
        });
        Ok(())
    }

    fn add_seeds(&mut self, env: &mut DisperseEnv<'_>) -> Result<()> {
        let Some(bound) = self.bound.as_ref() else {
            return Ok(());
        };
        if let Some((_, min_canopy_dbh)) = &bound.gap {
            env.grid.update_gap_status(env.population, *min_canopy_dbh);
        }

        for tree in env.population.trees() {
            if !bound.applies.applies(tree.species(), tree.stage())
                || env.population.is_dead(DEAD_FLAG, tree)
            {
                continue;
            }
            let in_gap = bound.gap.is_some() && env.grid.is_gap_at_point(tree.position());
            let per_year = self.seeds_per_year(tree.species(), tree.dbh(), in_gap);
            if per_year <= 0.0 {
                continue;
            }
            let Some(cdf) = self.distance_cdf(tree.species(), in_gap) else {
                continue;
            };
            let count = parent_seed_count(
                env.rng,
                Self::NAME,
                if in_gap { "gap_str" } else { "str" },
                tree.species(),
                per_year * env.years_per_timestep,
            )?;
            scatter_seeds(
                env.grid,
                env.plot,
                tree.position(),
                tree.species(),
                count,
                cdf,
                env.rng,
            );
        }
        Ok(())
    }
}
