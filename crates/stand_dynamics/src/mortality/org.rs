//! The mortality orchestrator.
use rand::RngCore;
use tracing::{debug, info};

use crate::applicability::{AppliesTo, SpeciesTypeCombo};
use crate::behavior::{ComboCodes, SetupContext};
use crate::error::{Error, Result};
use crate::events::{EventSink, StandEvent, StandEventKind};
use crate::mortality::{DeathCause, MortalityEnv, MortalityStrategy, DEAD_FLAG};
use crate::population::{IntCode, LifeStage, TreePopulation};
use crate::settings::RunSettings;

/// Deaths recorded by one call to [`MortalityOrg::do_mortality`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MortalityReport {
    /// Trees evaluated by at least one strategy.
    pub trees_evaluated: usize,
    /// Deaths indexed by [`DeathCause::code`].
    pub deaths_by_cause: [usize; 7],
}

impl MortalityReport {
    pub fn deaths(&self) -> usize {
        self.deaths_by_cause.iter().sum()
    }

    pub fn deaths_of(&self, cause: DeathCause) -> usize {
        self.deaths_by_cause[cause.code() as usize]
    }
}

/// Runs the ordered mortality gauntlet over the population once per timestep.
pub struct MortalityOrg {
    strategies: Vec<Box<dyn MortalityStrategy>>,
    applies: Vec<AppliesTo>,
    uses_mortality: AppliesTo,
    /// Strategy indices per (species, stage) slot, in registration order.
    gauntlets: Vec<Vec<usize>>,
    dead_codes: ComboCodes<IntCode>,
    combos: Vec<SpeciesTypeCombo>,
    registered: bool,
}

impl MortalityOrg {
    /// Creates the orchestrator for the given strategies, in gauntlet order.
    pub fn try_new(strategies: Vec<Box<dyn MortalityStrategy>>) -> Result<Self> {
        if strategies.is_empty() {
            return Err(Error::InvalidConfig(
                "mortality orchestrator needs at least one strategy".into(),
            ));
        }
        Ok(Self {
            strategies,
            applies: Vec::new(),
            uses_mortality: AppliesTo::new(0),
            gauntlets: Vec::new(),
            dead_codes: ComboCodes::new(0),
            combos: Vec::new(),
            registered: false,
        })
    }

    pub fn strategies(&self) -> impl Iterator<Item = &dyn MortalityStrategy> {
        self.strategies.iter().map(|s| s.as_ref())
    }

    /// Union of every strategy's combos.
    pub fn combos(&self) -> &[SpeciesTypeCombo] {
        &self.combos
    }

    pub fn uses_mortality(&self) -> &AppliesTo {
        &self.uses_mortality
    }

    /// Code of the shared dead flag for a combination, if any strategy claims it.
    pub fn dead_code(&self, species: usize, stage: LifeStage) -> Option<IntCode> {
        self.dead_codes.get(species, stage)
    }

    /// Builds the applicability tables and registers one shared dead flag per
    /// (species, stage) that any strategy claims.
    pub fn update_data_member_registrations(
        &mut self,
        population: &mut TreePopulation,
    ) -> Result<()> {
        let n_species = population.species_count();
        for strategy in &self.strategies {
            if let Some(c) = strategy.combos().iter().find(|c| c.species >= n_species) {
                return Err(Error::InvalidConfig(format!(
                    "{}: species {} does not exist",
                    strategy.name(),
                    c.species
                )));
            }
        }

        self.applies = self
            .strategies
            .iter()
            .map(|s| AppliesTo::from_combos(n_species, s.combos()))
            .collect();

        let mut uses = AppliesTo::new(n_species);
        for table in &self.applies {
            uses.union_with(table);
        }

        let mut gauntlets = vec![Vec::new(); n_species * LifeStage::COUNT];
        for sp in 0..n_species {
            for stage in LifeStage::ALL {
                let slot = sp * LifeStage::COUNT + stage.index();
                gauntlets[slot] = self
                    .applies
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| t.applies(sp, stage))
                    .map(|(i, _)| i)
                    .collect();
            }
        }

        let mut dead_codes = ComboCodes::new(n_species);
        for combo in uses.combos() {
            let code = population.register_int(DEAD_FLAG, combo.species, combo.stage);
            dead_codes.set(combo.species, combo.stage, code);
        }

        self.combos = uses.combos();
        self.uses_mortality = uses;
        self.gauntlets = gauntlets;
        self.dead_codes = dead_codes;
        self.registered = true;
        Ok(())
    }

    /// Registers the dead flag, then sets up every strategy in order.
    pub fn setup(&mut self, ctx: &mut SetupContext<'_>) -> Result<()> {
        self.update_data_member_registrations(ctx.population)?;
        for strategy in &mut self.strategies {
            strategy.setup(ctx)?;
        }
        info!(
            "Mortality: {} strategies [{}] over {} species/stage combos.",
            self.strategies.len(),
            self.strategies
                .iter()
                .map(|s| s.name())
                .collect::<Vec<_>>()
                .join(", "),
            self.combos.len(),
        );
        Ok(())
    }

    pub fn do_mortality(
        &mut self,
        population: &mut TreePopulation,
        settings: &RunSettings,
        rng: &mut dyn RngCore,
    ) -> Result<MortalityReport> {
        self.do_mortality_with_events(population, settings, rng, &mut ())
    }

    /// Runs one timestep of the gauntlet.
    ///
    /// All `pre_mortality` hooks run first. Then every tree whose (species, stage)
    /// uses mortality and is not already dead is handed to the applicable
    /// strategies in registration order; the first non-`NotDead` cause is written
    /// to the dead flag and the remaining strategies are skipped for that tree.
    pub fn do_mortality_with_events(
        &mut self,
        population: &mut TreePopulation,
        settings: &RunSettings,
        rng: &mut dyn RngCore,
        sink: &mut dyn EventSink,
    ) -> Result<MortalityReport> {
        if !self.registered {
            return Err(Error::InvalidConfig(
                "mortality orchestrator used before setup".into(),
            ));
        }

        let plot = settings.plot();
        let years = settings.years_per_timestep;

        {
            let mut env = MortalityEnv {
                population: &*population,
                plot: &plot,
                years_per_timestep: years,
                rng: &mut *rng,
                dead_codes: &self.dead_codes,
            };
            for strategy in &mut self.strategies {
                strategy.pre_mortality(&mut env)?;
            }
        }

        let mut report = MortalityReport::default();
        for i in 0..population.len() {
            let (species, stage) = {
                let t = population.tree(i);
                (t.species(), t.stage())
            };
            if !self.uses_mortality.applies(species, stage) {
                continue;
            }
            let Some(dead_code) = self.dead_codes.get(species, stage) else {
                continue;
            };
            if population.tree(i).int(dead_code) != DeathCause::NotDead.code() {
                continue;
            }

            let slot = species * LifeStage::COUNT + stage.index();
            let (cause, killer) = {
                let tree = population.tree(i);
                let diameter = if stage == LifeStage::Seedling {
                    0.0
                } else {
                    tree.dbh()
                };
                let mut env = MortalityEnv {
                    population: &*population,
                    plot: &plot,
                    years_per_timestep: years,
                    rng: &mut *rng,
                    dead_codes: &self.dead_codes,
                };
                let mut outcome = (DeathCause::NotDead, None);
                for &s in &self.gauntlets[slot] {
                    let cause = self.strategies[s].evaluate(tree, diameter, &mut env);
                    if cause.is_dead() {
                        outcome = (cause, Some(s));
                        break;
                    }
                }
                outcome
            };
            report.trees_evaluated += 1;

            if let Some(s) = killer {
                let tree = population.tree_mut(i);
                tree.set_int(dead_code, cause.code());
                report.deaths_by_cause[cause.code() as usize] += 1;
                if sink.wants(StandEventKind::TreeKilled) {
                    sink.send(StandEvent::TreeKilled {
                        tree: tree.id(),
                        species,
                        stage,
                        cause,
                        strategy: self.strategies[s].name().to_string(),
                    });
                }
            }
        }

        debug!(
            "Mortality: {} trees evaluated, {} died.",
            report.trees_evaluated,
            report.deaths()
        );
        Ok(report)
    }
}
