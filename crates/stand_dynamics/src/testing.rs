//! Shared test doubles.
use rand::RngCore;

use crate::behavior::{ComboCodes, SetupContext};
use crate::mortality::{MortalityEnv, MortalityStrategy, DEAD_FLAG};
use crate::params::ParameterFile;
use crate::plot::Plot;
use crate::population::{IntCode, TreePopulation};
use crate::settings::RunSettings;

/// Generator that returns the same value on every call.
pub(crate) struct FixedRng {
    pub value: u64,
}

impl FixedRng {
    /// A generator whose [`crate::random::rand01`] draws are exactly `u`.
    pub fn from_unit(u: f64) -> Self {
        let bits = (u * (1u64 << 53) as f64) as u64;
        Self { value: bits << 11 }
    }
}

impl RngCore for FixedRng {
    fn next_u32(&mut self) -> u32 {
        (self.value >> 32) as u32
    }

    fn next_u64(&mut self) -> u64 {
        self.value
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        let bytes = self.value.to_le_bytes();
        for (i, b) in dest.iter_mut().enumerate() {
            *b = bytes[i % 8];
        }
    }
}

/// Registers the strategy's dead flag and runs its setup, the way the
/// orchestrator does, without wrapping it in one.
pub(crate) fn setup_alone(
    strategy: &mut dyn MortalityStrategy,
    population: &mut TreePopulation,
    params: &ParameterFile,
    settings: &RunSettings,
) -> crate::error::Result<ComboCodes<IntCode>> {
    let mut codes = ComboCodes::new(population.species_count());
    for c in strategy.combos().to_vec() {
        let code = population.register_int(DEAD_FLAG, c.species, c.stage);
        codes.set(c.species, c.stage, code);
    }
    strategy.setup(&mut SetupContext::new(population, params, settings))?;
    Ok(codes)
}

/// Builds a [`MortalityEnv`] over borrowed parts.
pub(crate) fn mortality_env<'a>(
    population: &'a TreePopulation,
    plot: &'a Plot,
    years_per_timestep: f64,
    rng: &'a mut dyn RngCore,
    dead_codes: &'a ComboCodes<IntCode>,
) -> MortalityEnv<'a> {
    MortalityEnv {
        population,
        plot,
        years_per_timestep,
        rng,
        dead_codes,
    }
}
