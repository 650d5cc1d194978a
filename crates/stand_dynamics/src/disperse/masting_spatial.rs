//! Spatial dispersal with synchronized masting.
//!
//! Every timestep the [`MastSchedule`] decides, per synchrony group, whether the
//! species mast. Reproductive trees then produce `STR · (DBH / 30)^β` seeds per
//! year using the parameter set of the decided event (`mast_` or `nonmast_`
//! tags) and scatter them with that event's distance distribution.
//!
//! How STR is chosen is a per-species [`SeedProducer`]: the mean itself, one
//! normal draw shared by the whole species, or one draw per tree.
//!
//! Each tree carries two float members: [`SEEDS_PRODUCED`] holds this timestep's
//! seed count and [`PREVIOUS_SEEDS`] the count from the timestep before.
use rand::RngCore;
use tracing::debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::applicability::{AppliesTo, SpeciesIndex, SpeciesTypeCombo, SpeciesValues};
use crate::behavior::{ComboCodes, SetupContext};
use crate::disperse::kernel::{scatter_seeds, DispersalKernel, DistanceCdf};
use crate::disperse::masting::{MastEvent, MastSchedule};
use crate::disperse::spatial::{parent_seed_count, str_production};
use crate::disperse::{DisperseEnv, DisperseStrategy};
use crate::error::Result;
use crate::events::{StandEvent, StandEventKind};
use crate::mortality::DEAD_FLAG;
use crate::params::ConfigBinder;
use crate::population::{FloatCode, LifeStage, SpeciesId};
use crate::random::normal;

/// Seeds a tree produced this timestep.
pub const SEEDS_PRODUCED: &str = "sps";
/// Seeds a tree produced the timestep before.
pub const PREVIOUS_SEEDS: &str = "prevseeds";

/// How the STR of a reproducing tree is obtained.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SeedProducer {
    /// STR is the configured mean.
    Deterministic,
    /// One normal draw per species per timestep, shared by all its trees.
    SpeciesNormal,
    /// One normal draw per tree per timestep.
    TreeNormal,
}

impl SeedProducer {
    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(SeedProducer::Deterministic),
            1 => Some(SeedProducer::SpeciesNormal),
            2 => Some(SeedProducer::TreeNormal),
            _ => None,
        }
    }

    pub fn code(self) -> i64 {
        match self {
            SeedProducer::Deterministic => 0,
            SeedProducer::SpeciesNormal => 1,
            SeedProducer::TreeNormal => 2,
        }
    }
}

#[derive(Debug, Clone)]
struct EventParams {
    str_mean: SpeciesValues<f64>,
    /// Only covers species whose producer draws.
    str_sd: SpeciesValues<f64>,
    beta: SpeciesValues<f64>,
    cdf: SpeciesValues<DistanceCdf>,
}

impl EventParams {
    fn read(
        binder: &ConfigBinder<'_>,
        index: &SpeciesIndex,
        drawing: &SpeciesIndex,
        prefix: &str,
        horizon: usize,
    ) -> Result<Self> {
        let kernels = DispersalKernel::read_species(binder, index, prefix)?;
        Ok(Self {
            str_mean: binder.species_non_negative(&format!("{prefix}str_mean"), index)?,
            str_sd: binder.species_non_negative(&format!("{prefix}str_sd"), drawing)?,
            beta: binder.species(&format!("{prefix}beta"), index)?,
            cdf: DistanceCdf::build_species(&kernels, horizon)?,
        })
    }

    fn draw_str(&self, species: SpeciesId, rng: &mut dyn RngCore) -> f64 {
        let mean = self.str_mean.get(species).copied().unwrap_or(0.0);
        match self.str_sd.get(species) {
            Some(&sd) => normal(rng, mean, sd).max(0.0),
            None => mean,
        }
    }
}

#[derive(Debug, Clone)]
struct Bound {
    applies: AppliesTo,
    producer: SpeciesValues<SeedProducer>,
    min_reproductive_dbh: SpeciesValues<f64>,
    mast: EventParams,
    nonmast: EventParams,
    schedule: MastSchedule,
    seeds_produced: ComboCodes<FloatCode>,
    previous_seeds: ComboCodes<FloatCode>,
}

impl Bound {
    fn params(&self, event: MastEvent) -> &EventParams {
        match event {
            MastEvent::Mast => &self.mast,
            MastEvent::NonMast => &self.nonmast,
        }
    }
}

#[derive(Debug, Clone)]
pub struct MastingSpatialDisperse {
    combos: Vec<SpeciesTypeCombo>,
    bound: Option<Bound>,
}

impl MastingSpatialDisperse {
    pub const NAME: &'static str = "MastingSpatialDisperse";

    pub fn new(combos: Vec<SpeciesTypeCombo>) -> Self {
        Self {
            combos,
            bound: None,
        }
    }

    pub fn schedule(&self) -> Option<&MastSchedule> {
        self.bound.as_ref().map(|b| &b.schedule)
    }

    /// This timestep's masting decision for `species`.
    pub fn mast_event(&self, species: SpeciesId) -> Option<MastEvent> {
        self.schedule()?.event(species)
    }

    pub fn producer(&self, species: SpeciesId) -> Option<SeedProducer> {
        self.bound.as_ref()?.producer.get(species).copied()
    }

    pub fn distance_cdf(&self, species: SpeciesId, event: MastEvent) -> Option<&DistanceCdf> {
        self.bound.as_ref()?.params(event).cdf.get(species)
    }

    /// Code of the [`SEEDS_PRODUCED`] member for a combo this strategy covers.
    pub fn seeds_produced_code(&self, species: SpeciesId, stage: LifeStage) -> Option<FloatCode> {
        self.bound.as_ref()?.seeds_produced.get(species, stage)
    }

    pub fn previous_seeds_code(&self, species: SpeciesId, stage: LifeStage) -> Option<FloatCode> {
        self.bound.as_ref()?.previous_seeds.get(species, stage)
    }
}

impl DisperseStrategy for MastingSpatialDisperse {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn combos(&self) -> &[SpeciesTypeCombo] {
        &self.combos
    }

    fn setup(&mut self, ctx: &mut SetupContext<'_>) -> Result<()> {
        let index = ctx.species_index(&self.combos);
        let n_species = ctx.population.species_count();
        let horizon = DistanceCdf::horizon(&ctx.settings.plot());
        let b = ctx.binder(Self::NAME);

        let a = b.species_positive("mast_cdf_a", &index)?;
        let shape = b.species_checked("mast_cdf_b", &index, |v| v < 0.0, "must be < 0")?;
        let groups = b.species_code("mast_group", &index)?;

        let codes = b.species_code("seed_producer", &index)?;
        let mut producers = Vec::with_capacity(index.len());
        let mut drawing = Vec::new();
        for (sp, &code) in codes.iter() {
            let Some(producer) = SeedProducer::from_code(code) else {
                let name = b.species_name(sp)?;
                return Err(b.reject(
                    "seed_producer",
                    format!("{name}: unrecognized producer code {code}"),
                ));
            };
            if producer != SeedProducer::Deterministic {
                drawing.push(sp);
            }
            producers.push(producer);
        }
        let producer = SpeciesValues::new(index.clone(), producers);
        let drawing = SpeciesIndex::from_species(n_species, &drawing);

        let min_reproductive_dbh = b.species_non_negative("min_reproductive_dbh", &index)?;
        let mast = EventParams::read(&b, &index, &drawing, "mast_", horizon)?;
        let nonmast = EventParams::read(&b, &index, &drawing, "nonmast_", horizon)?;

        let schedule = MastSchedule::new(
            &a,
            &shape,
            groups,
            ctx.settings.years_per_timestep,
            ctx.settings.number_of_timesteps,
        );

        let mut seeds_produced = ComboCodes::new(n_species);
        let mut previous_seeds = ComboCodes::new(n_species);
        for c in &self.combos {
            let sps = ctx.population.register_float(SEEDS_PRODUCED, c.species, c.stage);
            let prev = ctx.population.register_float(PREVIOUS_SEEDS, c.species, c.stage);
            seeds_produced.set(c.species, c.stage, sps);
            previous_seeds.set(c.species, c.stage, prev);
        }

        debug!(
            "{}: {} species, masting horizon {} timesteps, kernel horizon {} m.",
            Self::NAME,
            index.len(),
            schedule.horizon(),
            horizon
        );
        self.bound = Some(Bound {
            applies: AppliesTo::from_combos(n_species, &self.combos),
            producer,
            min_reproductive_dbh,
            mast,
            nonmast,
            schedule,
            seeds_produced,
            previous_seeds,
        });
        Ok(())
    }

    fn add_seeds(&mut self, env: &mut DisperseEnv<'_>) -> Result<()> {
        let Some(bound) = self.bound.as_mut() else {
            return Ok(());
        };
        bound.schedule.decide(env.rng);
        let bound = &*bound;

        let mut species_str = SpeciesValues::from_fn(bound.producer.species_index(), |_| 0.0);
        for (sp, &producer) in bound.producer.iter() {
            let Some(event) = bound.schedule.event(sp) else {
                continue;
            };
            if env.sink.wants(StandEventKind::MastDecided) {
                env.sink.send(StandEvent::MastDecided {
                    species: sp,
                    group: bound.schedule.group(sp).unwrap_or_default(),
                    event,
                });
            }
            if producer == SeedProducer::SpeciesNormal {
                if let Some(s) = species_str.get_mut(sp) {
                    *s = bound.params(event).draw_str(sp, env.rng);
                }
            }
        }

        let mut total = 0u64;
        for i in 0..env.population.len() {
            let dead = env.population.is_dead(DEAD_FLAG, env.population.tree(i));
            let tree = env.population.tree_mut(i);
            let (sp, stage) = (tree.species(), tree.stage());
            if !bound.applies.applies(sp, stage) {
                continue;
            }
            let (Some(sps), Some(prev)) = (
                bound.seeds_produced.get(sp, stage),
                bound.previous_seeds.get(sp, stage),
            ) else {
                continue;
            };
            let last = tree.float(sps);
            tree.set_float(prev, last);
            tree.set_float(sps, 0.0);
            if dead {
                continue;
            }

            let (Some(event), Some(&min_dbh), Some(&producer)) = (
                bound.schedule.event(sp),
                bound.min_reproductive_dbh.get(sp),
                bound.producer.get(sp),
            ) else {
                continue;
            };
            if f64::from(tree.dbh()) < min_dbh {
                continue;
            }
            let params = bound.params(event);
            let str = match producer {
                SeedProducer::Deterministic => params.str_mean.get(sp).copied().unwrap_or(0.0),
                SeedProducer::SpeciesNormal => species_str.get(sp).copied().unwrap_or(0.0),
                SeedProducer::TreeNormal => params.draw_str(sp, env.rng),
            };
            let beta = params.beta.get(sp).copied().unwrap_or(0.0);
            let per_year = str_production(str, beta, tree.dbh());
            let tag = match event {
                MastEvent::Mast => "mast_str_mean",
                MastEvent::NonMast => "nonmast_str_mean",
            };
            let expected = per_year * env.years_per_timestep;
            let count = parent_seed_count(env.rng, Self::NAME, tag, sp, expected)?;
            tree.set_float(sps, count as f32);

            let origin = tree.position();
            if let Some(cdf) = params.cdf.get(sp) {
                scatter_seeds(env.grid, env.plot, origin, sp, count, cdf, env.rng);
                total += count;
            }
        }
        debug!("{}: scattered {} seeds.", Self::NAME, total);
        Ok(())
    }
}
