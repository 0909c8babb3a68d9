//! Count grids and history aggregation.
//!
//! A [`Grid`] divides the output image into `width × height` cells and counts
//! how many history points fall into each. Aggregation keeps geography
//! undistorted: when the bounding box and the grid have different aspect
//! ratios, one axis is compressed so that the slack ends up along one edge of
//! the grid instead of stretching point positions.

use log::debug;

use crate::bounds::BoundingBox;
use crate::History;

/// Dense `width × height` matrix of point counts, addressed by `(x, y)` with
/// `y = 0` as the top row of the output image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Grid {
    width: usize,
    height: usize,
    // Column-major: cell (x, y) lives at x * height + y
    counts: Vec<u32>,
}

impl Grid {
    /// Zero-initialized grid.
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            counts: vec![0; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Count at `(x, y)`. Panics when out of range.
    pub fn get(&self, x: usize, y: usize) -> u32 {
        self.counts[self.index(x, y)]
    }

    /// Overwrite the count at `(x, y)`. Panics when out of range.
    pub fn set(&mut self, x: usize, y: usize, value: u32) {
        let i = self.index(x, y);
        self.counts[i] = value;
    }

    /// Increment the count at `(x, y)`. Panics when out of range.
    pub fn inc(&mut self, x: usize, y: usize) {
        let i = self.index(x, y);
        self.counts[i] += 1;
    }

    /// Largest count in the grid (0 for an empty grid).
    pub fn max_count(&self) -> u32 {
        self.counts.iter().copied().max().unwrap_or(0)
    }

    /// Sum of all counts.
    pub fn total(&self) -> u64 {
        self.counts.iter().map(|&c| c as u64).sum()
    }

    /// Iterate over `(x, y, count)` for every non-empty cell, column by column.
    pub fn occupied(&self) -> impl Iterator<Item = (usize, usize, u32)> + '_ {
        let height = self.height;
        self.counts
            .iter()
            .enumerate()
            .filter(|(_, &c)| c > 0)
            .map(move |(i, &c)| (i / height, i % height, c))
    }

    /// Bucket the non-empty cells by count, `resolution` counts per bucket.
    pub fn histogram(&self, resolution: u32) -> Histogram {
        let resolution = resolution.max(1);
        let max = self.max_count();
        let mut buckets = vec![0u32; (max / resolution) as usize + 1];
        let mut occupied = 0;

        for (_, _, count) in self.occupied() {
            buckets[(count / resolution) as usize] += 1;
            occupied += 1;
        }

        Histogram {
            resolution,
            max,
            total: self.total(),
            occupied,
            buckets,
        }
    }

    fn index(&self, x: usize, y: usize) -> usize {
        assert!(
            x < self.width && y < self.height,
            "grid cell ({}, {}) out of range for {}x{} grid",
            x,
            y,
            self.width,
            self.height
        );
        x * self.height + y
    }
}

/// Distribution of cell counts, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Histogram {
    /// Counts per bucket
    pub resolution: u32,
    /// Largest cell count
    pub max: u32,
    /// Sum of all counts
    pub total: u64,
    /// Number of non-empty cells
    pub occupied: u32,
    /// `buckets[i]` holds the number of non-empty cells with a count in
    /// `[i * resolution, (i + 1) * resolution)`
    pub buckets: Vec<u32>,
}

impl Histogram {
    /// Log every non-empty bucket with its cumulative share of occupied cells.
    pub fn log(&self) {
        debug!(
            "[Histogram] max={} total={} occupied={}",
            self.max, self.total, self.occupied
        );
        let mut acc = 0u32;
        for (i, &n) in self.buckets.iter().enumerate() {
            acc += n;
            if n > 0 {
                let lo = i as u32 * self.resolution;
                debug!(
                    "[Histogram] {:4} - {:4}: {:4} ({:.2}%)",
                    lo,
                    lo + self.resolution - 1,
                    n,
                    100.0 * acc as f64 / self.occupied as f64
                );
            }
        }
    }
}

/// Result of aggregating a history.
#[derive(Debug, Clone)]
pub struct Aggregation {
    pub grid: Grid,
    /// Points that fell outside the bounding box
    pub dropped: usize,
}

/// Count every point of `history` inside `bounds` into a
/// `grid_width × grid_height` grid.
///
/// The axis with slack is compressed so the box keeps its aspect ratio: a box
/// wider than the grid occupies only the bottom rows, a box taller than the
/// grid only the left columns. Rows are flipped so that north is up. Points
/// outside `bounds` are dropped.
///
/// Both grid dimensions must be non-zero.
pub fn aggregate_history(
    history: &History,
    bounds: &BoundingBox,
    grid_width: usize,
    grid_height: usize,
) -> Aggregation {
    let mut grid = Grid::new(grid_width, grid_height);

    let input_skew = bounds.width() / bounds.height();
    let output_skew = grid_width as f64 / grid_height as f64;
    let (x_scale, y_scale) = if input_skew >= output_skew {
        (1.0, output_skew / input_skew)
    } else {
        (input_skew / output_skew, 1.0)
    };

    let mut dropped = 0;
    for point in history {
        if !bounds.contains(point) {
            dropped += 1;
            continue;
        }

        // Float rounding can land a point exactly on the far edge
        let x = ((bounds.width_fraction(point) * x_scale * grid_width as f64) as usize)
            .min(grid_width - 1);
        let y_raw = ((bounds.height_fraction(point) * y_scale * grid_height as f64) as usize)
            .min(grid_height - 1);
        let y = grid_height - y_raw - 1;

        grid.inc(x, y);
    }

    if dropped > 0 {
        debug!(
            "[Aggregator] dropped {} of {} points outside bounds",
            dropped,
            history.len()
        );
    }

    Aggregation { grid, dropped }
}
