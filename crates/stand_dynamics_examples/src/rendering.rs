use std::path::Path;

use image::{ImageBuffer, Rgb};
use stand_dynamics::prelude::{SeedGrid, SpeciesId};

/// Installs a `fmt` subscriber filtered by `RUST_LOG`. Repeated calls are ignored.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}

/// How a seed grid is drawn.
#[derive(Debug, Clone)]
pub struct HeatmapConfig {
    /// Edge length of one grid cell in pixels.
    pub pixels_per_cell: u32,
    /// Species to draw, or every species summed.
    pub species: Option<SpeciesId>,
    /// Color of an empty cell.
    pub low: [u8; 3],
    /// Color of the fullest cell.
    pub high: [u8; 3],
    /// Outline gap cells in this color.
    pub gap_outline: Option<[u8; 3]>,
}

impl Default for HeatmapConfig {
    fn default() -> Self {
        Self {
            pixels_per_cell: 8,
            species: None,
            low: [12, 20, 12],
            high: [250, 220, 90],
            gap_outline: None,
        }
    }
}

impl HeatmapConfig {
    pub fn new(pixels_per_cell: u32) -> Self {
        Self {
            pixels_per_cell: pixels_per_cell.max(1),
            ..Default::default()
        }
    }

    pub fn with_species(mut self, species: SpeciesId) -> Self {
        self.species = Some(species);
        self
    }

    pub fn with_colors(mut self, low: [u8; 3], high: [u8; 3]) -> Self {
        self.low = low;
        self.high = high;
        self
    }

    pub fn with_gap_outline(mut self, color: [u8; 3]) -> Self {
        self.gap_outline = Some(color);
        self
    }

    fn cell_value(&self, grid: &SeedGrid, ix: usize, iy: usize) -> f32 {
        match self.species {
            Some(sp) => grid.seeds(ix, iy, sp),
            None => (0..grid.n_species()).map(|sp| grid.seeds(ix, iy, sp)).sum(),
        }
    }
}

/// Writes the grid as a PNG heatmap, square-root scaled to the fullest cell.
pub fn render_seed_grid_to_png(
    grid: &SeedGrid,
    config: &HeatmapConfig,
    path: impl AsRef<Path>,
) -> anyhow::Result<()> {
    let (w, h) = grid.size();
    let ppc = config.pixels_per_cell.max(1);
    let mut img = ImageBuffer::new(w as u32 * ppc, h as u32 * ppc);

    let mut max = 0.0f32;
    for iy in 0..h {
        for ix in 0..w {
            max = max.max(config.cell_value(grid, ix, iy));
        }
    }

    for iy in 0..h {
        for ix in 0..w {
            let t = if max > 0.0 {
                (config.cell_value(grid, ix, iy) / max).sqrt()
            } else {
                0.0
            };
            let fill = lerp(config.low, config.high, t);
            let outline = config.gap_outline.filter(|_| grid.is_gap(ix, iy));
            // Image rows run top-down, grid rows bottom-up.
            let top = (h - 1 - iy) as u32 * ppc;
            for py in 0..ppc {
                for px in 0..ppc {
                    let edge = px == 0 || py == 0 || px == ppc - 1 || py == ppc - 1;
                    let color = match outline {
                        Some(c) if edge => c,
                        _ => fill,
                    };
                    img.put_pixel(ix as u32 * ppc + px, top + py, Rgb(color));
                }
            }
        }
    }

    img.save(path.as_ref())?;
    tracing::info!("Wrote {}", path.as_ref().display());
    Ok(())
}

fn lerp(a: [u8; 3], b: [u8; 3], t: f32) -> [u8; 3] {
    let t = t.clamp(0.0, 1.0);
    let mix = |x: u8, y: u8| (x as f32 + (y as f32 - x as f32) * t).round() as u8;
    [mix(a[0], b[0]), mix(a[1], b[1]), mix(a[2], b[2])]
}
