//! A timestep driver that owns a stand and its two orchestrators.
use rand::RngCore;
use tracing::{debug, info, warn};

use crate::behavior::SetupContext;
use crate::disperse::{DisperseOrg, DisperseReport, SeedGrid};
use crate::error::{Error, Result};
use crate::events::{EventSink, StandEvent, StandEventKind};
use crate::mortality::{MortalityOrg, MortalityReport, DEAD_FLAG};
use crate::params::ParameterFile;
use crate::population::TreePopulation;
use crate::settings::RunSettings;

/// What happened during one timestep.
#[non_exhaustive]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimestepReport {
    /// One-based timestep number.
    pub timestep: u32,
    pub mortality: MortalityReport,
    /// Dead trees removed from the population after mortality.
    pub removed: usize,
    pub seeds: DisperseReport,
}

impl TimestepReport {
    pub fn deaths(&self) -> usize {
        self.mortality.deaths()
    }
}

pub struct StandRunner {
    settings: RunSettings,
    population: TreePopulation,
    mortality: Option<MortalityOrg>,
    disperse: Option<DisperseOrg>,
    remove_dead: bool,
    timestep: u32,
    ready: bool,
}

impl StandRunner {
    /// Creates a runner with no orchestrators. Dead trees are removed after
    /// mortality unless disabled with [`StandRunner::with_dead_removal`].
    pub fn new(settings: RunSettings, population: TreePopulation) -> Self {
        Self {
            settings,
            population,
            mortality: None,
            disperse: None,
            remove_dead: true,
            timestep: 0,
            ready: false,
        }
    }

    pub fn with_mortality(mut self, org: MortalityOrg) -> Self {
        self.mortality = Some(org);
        self
    }

    pub fn with_disperse(mut self, org: DisperseOrg) -> Self {
        self.disperse = Some(org);
        self
    }

    /// Keeps dead trees in the population when `remove` is false.
    pub fn with_dead_removal(mut self, remove: bool) -> Self {
        self.remove_dead = remove;
        self
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    pub fn population(&self) -> &TreePopulation {
        &self.population
    }

    pub fn population_mut(&mut self) -> &mut TreePopulation {
        &mut self.population
    }

    pub fn mortality(&self) -> Option<&MortalityOrg> {
        self.mortality.as_ref()
    }

    pub fn disperse(&self) -> Option<&DisperseOrg> {
        self.disperse.as_ref()
    }

    /// The shared seed grid, once the disperse orchestrator is set up.
    pub fn seed_grid(&self) -> Option<&SeedGrid> {
        self.disperse.as_ref()?.grid()
    }

    /// Timesteps run so far.
    pub fn timestep(&self) -> u32 {
        self.timestep
    }

    /// Validates the settings and sets up mortality, then dispersal.
    pub fn setup(&mut self, params: &ParameterFile) -> Result<()> {
        self.settings.validate()?;
        if self.mortality.is_none() && self.disperse.is_none() {
            return Err(Error::InvalidConfig(
                "stand runner needs a mortality or disperse orchestrator".into(),
            ));
        }
        let mut ctx = SetupContext::new(&mut self.population, params, &self.settings);
        if let Some(org) = self.mortality.as_mut() {
            org.setup(&mut ctx)?;
        }
        if let Some(org) = self.disperse.as_mut() {
            org.setup(&mut ctx)?;
        }
        info!(
            "Stand set up: {} trees, {} species, {} timesteps of {} years.",
            self.population.len(),
            self.population.species_count(),
            self.settings.number_of_timesteps,
            self.settings.years_per_timestep
        );
        self.ready = true;
        Ok(())
    }

    pub fn run_timestep(&mut self, rng: &mut dyn RngCore) -> Result<TimestepReport> {
        self.run_timestep_with_events(rng, &mut ())
    }

    /// Clears the seed grid, runs mortality, removes the dead, then disperses.
    pub fn run_timestep_with_events(
        &mut self,
        rng: &mut dyn RngCore,
        sink: &mut dyn EventSink,
    ) -> Result<TimestepReport> {
        if !self.ready {
            return Err(Error::InvalidConfig("stand runner used before setup".into()));
        }
        self.timestep += 1;
        let timestep = self.timestep;
        if sink.wants(StandEventKind::TimestepStarted) {
            sink.send(StandEvent::TimestepStarted { timestep });
        }
        if self.population.is_empty() {
            warn!("Timestep {}: the stand has no trees.", timestep);
            if sink.wants(StandEventKind::Warning) {
                sink.send(StandEvent::Warning {
                    context: format!("timestep:{timestep}"),
                    message: "Stand has no trees".into(),
                });
            }
        }

        let mut report = TimestepReport {
            timestep,
            ..Default::default()
        };

        if let Some(org) = self.disperse.as_mut() {
            org.timestep_cleanup();
        }
        if let Some(org) = self.mortality.as_mut() {
            report.mortality =
                org.do_mortality_with_events(&mut self.population, &self.settings, rng, sink)?;
            if self.remove_dead {
                report.removed = self.population.remove_dead(DEAD_FLAG);
            }
        }
        if let Some(org) = self.disperse.as_mut() {
            report.seeds =
                org.do_disperse_with_events(&mut self.population, &self.settings, rng, sink)?;
        }

        if sink.wants(StandEventKind::TimestepFinished) {
            sink.send(StandEvent::TimestepFinished {
                timestep,
                deaths: report.deaths(),
                seeds: report.seeds.adjusted_total,
            });
        }
        debug!(
            "Timestep {}: {} deaths, {} removed, {:.1} seeds, {} trees left.",
            timestep,
            report.deaths(),
            report.removed,
            report.seeds.adjusted_total,
            self.population.len()
        );
        Ok(report)
    }

    /// Runs the remaining timesteps of the configured run length.
    pub fn run(&mut self, rng: &mut dyn RngCore) -> Result<Vec<TimestepReport>> {
        self.run_with_events(rng, &mut ())
    }

    pub fn run_with_events(
        &mut self,
        rng: &mut dyn RngCore,
        sink: &mut dyn EventSink,
    ) -> Result<Vec<TimestepReport>> {
        let remaining = self.settings.number_of_timesteps.saturating_sub(self.timestep);
        let mut reports = Vec::with_capacity(remaining as usize);
        for _ in 0..remaining {
            reports.push(self.run_timestep_with_events(rng, sink)?);
        }
        Ok(reports)
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec2;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::applicability::combos_for;
    use crate::disperse::{DisperseStrategy, NonSpatialDisperse, SpatialDisperse};
    use crate::events::VecSink;
    use crate::mortality::{DeathCause, MortalityStrategy, StochasticMortality};
    use crate::population::LifeStage;

    fn stand() -> TreePopulation {
        let mut pop = TreePopulation::new(["Oak", "Pine"]);
        for i in 0..200 {
            let x = (i % 20) as f32 * 5.0 + 2.5;
            let y = (i / 20) as f32 * 10.0 + 5.0;
            pop.add_tree(i % 2, LifeStage::Adult, [x, y], 35.0, 22.0);
        }
        pop
    }

    fn params() -> ParameterFile {
        let mut p = ParameterFile::new();
        p.set_species_all("mortality_rate", ["Oak", "Pine"], 0.1)
            .set_species_all("seed_rain_per_ha", ["Oak", "Pine"], 50.0)
            .set_species_all("min_reproductive_dbh", ["Oak", "Pine"], 20.0)
            .set_species_all("str", ["Oak", "Pine"], 4.0)
            .set_species_all("beta", ["Oak", "Pine"], 2.0)
            .set_species_all("dispersal_kernel", ["Oak", "Pine"], 0.0)
            .set_species_all("weibull_dispersal", ["Oak", "Pine"], 1e-3)
            .set_species_all("weibull_theta", ["Oak", "Pine"], 2.0)
            .set_scalar("seed_distribution", 1.0);
        p
    }

    fn runner(remove_dead: bool) -> StandRunner {
        let combos = combos_for(&[0, 1], &[LifeStage::Adult]);
        let mortality: Vec<Box<dyn MortalityStrategy>> =
            vec![Box::new(StochasticMortality::new(combos.clone()))];
        let disperse: Vec<Box<dyn DisperseStrategy>> = vec![
            Box::new(NonSpatialDisperse::new(combos.clone())),
            Box::new(SpatialDisperse::new(combos)),
        ];
        let settings = RunSettings::new(Vec2::new(100.0, 100.0))
            .with_number_of_timesteps(5)
            .with_seed_grid_cell_size(10.0);
        StandRunner::new(settings, stand())
            .with_mortality(MortalityOrg::try_new(mortality).unwrap())
            .with_disperse(DisperseOrg::try_new(disperse).unwrap())
            .with_dead_removal(remove_dead)
    }

    #[test]
    fn runs_the_configured_number_of_timesteps() {
        let mut r = runner(true);
        r.setup(&params()).unwrap();
        let mut rng = StdRng::seed_from_u64(12);
        let mut sink = VecSink::only(&[
            StandEventKind::TimestepStarted,
            StandEventKind::TimestepFinished,
        ]);
        let reports = r.run_with_events(&mut rng, &mut sink).unwrap();

        assert_eq!(reports.len(), 5);
        assert_eq!(r.timestep(), 5);
        assert_eq!(
            reports.iter().map(|t| t.timestep).collect::<Vec<_>>(),
            vec![1, 2, 3, 4, 5]
        );
        let removed: usize = reports.iter().map(|t| t.removed).sum();
        let deaths: usize = reports.iter().map(|t| t.deaths()).sum();
        assert_eq!(removed, deaths);
        assert_eq!(r.population().len(), 200 - removed);
        assert!(reports.iter().all(|t| t.seeds.raw_total > 0.0));
        assert_eq!(sink.len(), 10);
        assert_eq!(sink.as_slice()[0], StandEvent::TimestepStarted { timestep: 1 });

        // The run is over.
        assert!(r.run(&mut rng).unwrap().is_empty());
    }

    #[test]
    fn grid_holds_only_the_latest_timestep() {
        let mut r = runner(true);
        r.setup(&params()).unwrap();
        let mut rng = StdRng::seed_from_u64(5);
        r.run_timestep(&mut rng).unwrap();
        let report = r.run_timestep(&mut rng).unwrap();
        let total = r.seed_grid().unwrap().total();
        assert!((total - report.seeds.adjusted_total).abs() < 1e-6 * total.max(1.0));
    }

    #[test]
    fn dead_trees_are_kept_but_never_killed_twice() {
        let mut r = runner(false);
        r.setup(&params()).unwrap();
        let mut rng = StdRng::seed_from_u64(77);
        let reports = r.run(&mut rng).unwrap();
        let deaths: usize = reports.iter().map(|t| t.deaths()).sum();

        assert_eq!(r.population().len(), 200);
        let code = r.mortality().unwrap().dead_code(0, LifeStage::Adult).unwrap();
        let code_pine = r.mortality().unwrap().dead_code(1, LifeStage::Adult).unwrap();
        let dead = r
            .population()
            .trees()
            .iter()
            .filter(|t| {
                let c = if t.species() == 0 { code } else { code_pine };
                t.int(c) == DeathCause::Natural.code()
            })
            .count();
        assert_eq!(dead, deaths);
        assert!(reports.iter().all(|t| t.removed == 0));
    }

    #[test]
    fn empty_stand_warns_but_still_runs() {
        let combos = combos_for(&[0], &[LifeStage::Adult]);
        let mortality: Vec<Box<dyn MortalityStrategy>> =
            vec![Box::new(StochasticMortality::new(combos))];
        let mut r = StandRunner::new(
            RunSettings::new(Vec2::new(50.0, 50.0)),
            TreePopulation::new(["Oak", "Pine"]),
        )
        .with_mortality(MortalityOrg::try_new(mortality).unwrap());
        r.setup(&params()).unwrap();

        let mut rng = StdRng::seed_from_u64(1);
        let mut sink = VecSink::only(&[StandEventKind::Warning]);
        let report = r.run_timestep_with_events(&mut rng, &mut sink).unwrap();
        assert_eq!(report.deaths(), 0);
        assert!(matches!(
            sink.as_slice(),
            [StandEvent::Warning { context, .. }] if context == "timestep:1"
        ));
    }

    #[test]
    fn setup_is_required_and_validates_settings() {
        let mut r = runner(true);
        let mut rng = StdRng::seed_from_u64(0);
        assert!(r.run_timestep(&mut rng).is_err());

        let mut bad = StandRunner::new(RunSettings::new(Vec2::ZERO), stand());
        assert!(bad.setup(&params()).is_err());

        let mut empty = StandRunner::new(RunSettings::new(Vec2::new(10.0, 10.0)), stand());
        assert!(matches!(
            empty.setup(&params()),
            Err(Error::InvalidConfig(_))
        ));
    }
}
