//! Toroidal plot geometry.
//!
//! The plot is the rectangle `[0, x) × [0, y)` with opposite edges joined, so seeds
//! dispersed past an edge land on the other side and neighborhood queries see
//! across edges.
use glam::Vec2;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Plot {
    /// Plot extent in metres.
    pub extent: Vec2,
}

impl Plot {
    pub fn new(extent: Vec2) -> Self {
        debug_assert!(
            extent.x > 0.0 && extent.y > 0.0,
            "plot extent must be > 0 in both components"
        );
        Self { extent }
    }

    /// Plot area in hectares.
    pub fn area_ha(&self) -> f32 {
        self.extent.x * self.extent.y / 10_000.0
    }

    /// Larger of the two plot dimensions.
    pub fn max_dimension(&self) -> f32 {
        self.extent.x.max(self.extent.y)
    }

    /// Wraps a point into the plot.
    pub fn wrap(&self, p: Vec2) -> Vec2 {
        let x = wrap_axis(p.x, self.extent.x);
        let y = wrap_axis(p.y, self.extent.y);
        Vec2::new(x, y)
    }

    pub fn distance_squared(&self, a: Vec2, b: Vec2) -> f32 {
        let dx = axis_delta(a.x, b.x, self.extent.x);
        let dy = axis_delta(a.y, b.y, self.extent.y);
        dx * dx + dy * dy
    }

    pub fn distance(&self, a: Vec2, b: Vec2) -> f32 {
        self.distance_squared(a, b).sqrt()
    }
}

fn wrap_axis(v: f32, len: f32) -> f32 {
    let w = v.rem_euclid(len);
    // rem_euclid can round up to `len` for tiny negative inputs.
    if w >= len {
        0.0
    } else {
        w
    }
}

fn axis_delta(a: f32, b: f32, len: f32) -> f32 {
    let d = (a - b).abs() % len;
    d.min(len - d)
}
