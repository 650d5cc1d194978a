//! Masting decisions shared across synchrony groups.
//!
//! The probability that a species has masted by `X` years after its last mast is
//!
//! ```text
//! P(X) = 1 / (1 + (X / a)^b)
//! ```
//!
//! with `b < 0`. The schedule tabulates `P` at whole timesteps, out to the
//! horizon where every species reaches 0.9999 (capped by the run length), and
//! compares one uniform draw per group against the entry for the timesteps since
//! the group last masted.
use std::collections::HashMap;

use rand::RngCore;
use tracing::debug;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::applicability::{SpeciesIndex, SpeciesValues};
use crate::population::SpeciesId;
use crate::random::rand01;

/// Cumulative probability at which the masting table stops.
pub const MAST_CDF_LIMIT: f64 = 0.9999;

/// Outcome of a masting decision for one timestep.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MastEvent {
    Mast,
    NonMast,
}

/// `1 / (1 + (years / a)^b)`, the chance of having masted within `years`.
pub fn mast_probability(a: f64, b: f64, years: f64) -> f64 {
    if years <= 0.0 {
        return 0.0;
    }
    1.0 / (1.0 + (years / a).powf(b))
}

/// Per-species masting state for a run.
#[derive(Debug, Clone)]
pub struct MastSchedule {
    index: SpeciesIndex,
    groups: SpeciesValues<i64>,
    cdf: SpeciesValues<Vec<f64>>,
    horizon: usize,
    since_last: SpeciesValues<usize>,
    current: SpeciesValues<MastEvent>,
}

impl MastSchedule {
    /// Tabulates the masting CDF of every species.
    ///
    /// Entry `k` holds `P((k + 1) · years_per_timestep)`. The table length is the
    /// first `k` at which all species reach [`MAST_CDF_LIMIT`], capped at
    /// `number_of_timesteps` and at least 1.
    pub fn new(
        a: &SpeciesValues<f64>,
        b: &SpeciesValues<f64>,
        groups: SpeciesValues<i64>,
        years_per_timestep: f64,
        number_of_timesteps: u32,
    ) -> Self {
        let index = a.species_index().clone();
        let cap = (number_of_timesteps as usize).max(1);

        let mut horizon = 1;
        for &sp in index.species() {
            let reached = |k: usize| {
                mast_probability(a[sp], b[sp], k as f64 * years_per_timestep) >= MAST_CDF_LIMIT
            };
            let mut k = 1;
            while k < cap && !reached(k) {
                k += 1;
            }
            horizon = horizon.max(k);
        }

        let cdf = SpeciesValues::from_fn(&index, |sp| {
            (0..horizon)
                .map(|k| mast_probability(a[sp], b[sp], (k + 1) as f64 * years_per_timestep))
                .collect()
        });
        Self {
            since_last: SpeciesValues::from_fn(&index, |_| 0),
            current: SpeciesValues::from_fn(&index, |_| MastEvent::NonMast),
            index,
            groups,
            cdf,
            horizon,
        }
    }

    pub fn horizon(&self) -> usize {
        self.horizon
    }

    pub fn cdf(&self, species: SpeciesId) -> Option<&[f64]> {
        self.cdf.get(species).map(Vec::as_slice)
    }

    pub fn group(&self, species: SpeciesId) -> Option<i64> {
        self.groups.get(species).copied()
    }

    /// Timesteps since `species` last masted, saturating at `horizon - 1`.
    pub fn timesteps_since_mast(&self, species: SpeciesId) -> Option<usize> {
        self.since_last.get(species).copied()
    }

    /// This timestep's decision for `species`.
    pub fn event(&self, species: SpeciesId) -> Option<MastEvent> {
        self.current.get(species).copied()
    }

    /// Decides this timestep's events. The first species of each group, in
    /// ascending id order, draws for the whole group.
    pub fn decide(&mut self, rng: &mut dyn RngCore) {
        let mut decided: HashMap<i64, MastEvent> = HashMap::new();
        for &sp in self.index.species() {
            let group = self.groups[sp];
            let event = *decided.entry(group).or_insert_with(|| {
                let since = self.since_last[sp];
                let threshold = self.cdf[sp][since.min(self.horizon - 1)];
                if rand01(rng) < threshold {
                    MastEvent::Mast
                } else {
                    MastEvent::NonMast
                }
            });

            if let Some(current) = self.current.get_mut(sp) {
                *current = event;
            }
            if let Some(since) = self.since_last.get_mut(sp) {
                *since = match event {
                    MastEvent::Mast => 0,
                    MastEvent::NonMast => (*since + 1).min(self.horizon - 1),
                };
            }
        }
        debug!("Masting decisions: {:?}", decided);
    }
}

#[cfg(test)]
mod tests {
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use super::*;
    use crate::testing::FixedRng;

    fn schedule(groups: [i64; 4], timesteps: u32) -> MastSchedule {
        let index = SpeciesIndex::from_species(4, &[0, 1, 2, 3]);
        let a = SpeciesValues::from_fn(&index, |sp| 3.0 + sp as f64);
        let b = SpeciesValues::from_fn(&index, |_| -4.0);
        let groups = SpeciesValues::from_fn(&index, |sp| groups[sp]);
        MastSchedule::new(&a, &b, groups, 1.0, timesteps)
    }

    #[test]
    fn cdf_is_tabulated_at_whole_timesteps() {
        let s = schedule([0, 1, 2, 3], 500);
        let cdf = s.cdf(0).unwrap();
        assert_eq!(cdf.len(), s.horizon());
        assert!((cdf[0] - mast_probability(3.0, -4.0, 1.0)).abs() < 1e-15);
        assert!(cdf.windows(2).all(|w| w[0] <= w[1]));
        // The slowest species sets the horizon.
        let slowest = s.cdf(3).unwrap();
        assert!(slowest[s.horizon() - 1] >= MAST_CDF_LIMIT);
        assert!(slowest[s.horizon() - 2] < MAST_CDF_LIMIT);
    }

    #[test]
    fn horizon_is_capped_by_run_length() {
        assert_eq!(schedule([0, 0, 0, 0], 3).horizon(), 3);
        assert_eq!(schedule([0, 0, 0, 0], 0).horizon(), 1);
    }

    #[test]
    fn grouped_species_always_agree() {
        let mut s = schedule([7, 7, 9, 7], 100);
        let mut rng = StdRng::seed_from_u64(99);
        let mut masts = 0;
        for _ in 0..200 {
            s.decide(&mut rng);
            let e0 = s.event(0).unwrap();
            assert_eq!(s.event(1), Some(e0));
            assert_eq!(s.event(3), Some(e0));
            assert_eq!(s.timesteps_since_mast(1), s.timesteps_since_mast(0));
            if e0 == MastEvent::Mast {
                masts += 1;
            }
        }
        assert!(masts > 0);
    }

    #[test]
    fn counter_resets_on_mast_and_saturates_otherwise() {
        let mut s = schedule([0, 1, 2, 3], 4);
        let mut never = FixedRng::from_unit(0.999_999);
        for _ in 0..10 {
            s.decide(&mut never);
        }
        assert_eq!(s.event(0), Some(MastEvent::NonMast));
        assert_eq!(s.timesteps_since_mast(0), Some(s.horizon() - 1));

        let mut always = FixedRng::from_unit(0.0);
        s.decide(&mut always);
        assert_eq!(s.event(0), Some(MastEvent::Mast));
        assert_eq!(s.timesteps_since_mast(0), Some(0));
    }
}
