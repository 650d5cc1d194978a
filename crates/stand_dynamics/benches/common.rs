use std::time::Duration;

use criterion::{Criterion, Throughput};
use stand_dynamics::prelude::{LifeStage, TreePopulation};

pub const SAMPLE_SIZE: usize = 20;
pub const WARM_UP: Duration = Duration::from_secs(1);
pub const MEASUREMENT_TIME: Duration = Duration::from_secs(3);

pub const SPECIES: [&str; 3] = ["Oak", "Beech", "Pine"];

pub fn default_criterion() -> Criterion {
    Criterion::default()
        .configure_from_args()
        .sample_size(SAMPLE_SIZE)
        .warm_up_time(WARM_UP)
        .measurement_time(MEASUREMENT_TIME)
}

pub fn trees_throughput(trees: usize) -> Throughput {
    Throughput::Elements(trees.max(1) as u64)
}

/// Adults on a regular lattice over a square plot of side `side`, species cycling.
#[allow(dead_code)]
pub fn lattice_stand(trees: usize, side: f32) -> TreePopulation {
    let mut pop = TreePopulation::new(SPECIES);
    let per_row = (trees as f32).sqrt().ceil().max(1.0) as usize;
    let step = side / per_row as f32;
    for i in 0..trees {
        let x = (i % per_row) as f32 * step + step * 0.5;
        let y = (i / per_row) as f32 * step + step * 0.5;
        let dbh = 15.0 + (i % 30) as f32;
        pop.add_tree(i % SPECIES.len(), LifeStage::Adult, [x, y], dbh, dbh * 0.7);
    }
    pop
}
