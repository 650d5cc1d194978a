#![forbid(unsafe_code)]

mod rendering;
mod stands;

pub use rendering::{init_tracing, render_seed_grid_to_png, HeatmapConfig};
pub use stands::{load_params, random_stand, StandLayout};
