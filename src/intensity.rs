//! Heat normalization.
//!
//! Location histories are heavily skewed: home and work cells collect orders
//! of magnitude more points than anywhere else. Counts are compressed with a
//! double square root before normalizing, so a few hot cells do not wash out
//! the rest of the map.

use crate::grid::Grid;

/// Perceptual compression of a raw count: `count^(1/4)`.
#[inline]
pub fn heat(count: u32) -> f64 {
    (count as f64).sqrt().sqrt()
}

/// `width × height` matrix of intensities in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct IntensityMatrix {
    width: usize,
    height: usize,
    values: Vec<f64>,
}

impl IntensityMatrix {
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Intensity at `(x, y)`. Panics when out of range.
    pub fn get(&self, x: usize, y: usize) -> f64 {
        assert!(
            x < self.width && y < self.height,
            "intensity cell ({}, {}) out of range for {}x{} matrix",
            x,
            y,
            self.width,
            self.height
        );
        self.values[x * self.height + y]
    }
}

/// Normalize `grid` so the hottest cell has intensity 1.
///
/// An empty grid yields all zeros.
pub fn normalize(grid: &Grid) -> IntensityMatrix {
    let (width, height) = (grid.width(), grid.height());
    let max_heat = heat(grid.max_count());

    let mut values = Vec::with_capacity(width * height);
    for x in 0..width {
        for y in 0..height {
            let v = if max_heat > 0.0 {
                heat(grid.get(x, y)) / max_heat
            } else {
                0.0
            };
            values.push(v);
        }
    }

    IntensityMatrix {
        width,
        height,
        values,
    }
}
