//! # latvis
//!
//! Location history density maps.
//!
//! This library provides:
//! - Antimeridian-aware geographic bounding boxes
//! - Aspect-preserving aggregation of a location history into a count grid
//! - Perceptual heat normalization of the grid
//! - Black/white PNG and SVG dot-density renderers
//! - A render orchestrator that stores results under opaque handles
//!
//! ## Features
//!
//! - **`parallel`** - Run enqueued render tasks on the rayon thread pool
//! - **`http`** - Enable the HTTP location history source
//! - **`cli`** - Build the `latvis` command line tool
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use latvis::{BoundingBox, Coordinate, History, Style, RenderConfig};
//!
//! let mut history = History::new();
//! history.push(Coordinate::new(40.7128, -74.0060));
//! history.push(Coordinate::new(40.7138, -74.0070));
//!
//! let bounds = BoundingBox::new(
//!     Coordinate::new(40.70, -74.02),
//!     Coordinate::new(40.72, -74.00),
//! ).unwrap();
//!
//! let config = RenderConfig::default();
//! let png = Style::BlackWhite
//!     .visualizer(&config)
//!     .visualize(&history, &bounds, 64, 64)
//!     .unwrap();
//! assert!(!png.is_empty());
//! ```

use geo::{Coord, LineString, Point};

pub mod blobs;
pub mod bounds;
pub mod config;
pub mod engine;
pub mod error;
pub mod grid;
pub mod handle;
pub mod intensity;
pub mod kml;
pub mod queue;
pub mod raster;
pub mod request;
pub mod source;
pub mod svg;
pub mod visualizer;

// HTTP module for history fetching
#[cfg(feature = "http")]
pub mod http;

pub use blobs::{Blob, BlobStore, InMemoryBlobStore, LocalFsBlobStore};
pub use bounds::{output_dimensions, BoundingBox};
pub use config::{RenderConfig, SvgStyle};
pub use engine::{Dispatcher, JobState, RenderEngine, RenderJob, WORKER_PATH};
pub use error::{Error, Result};
pub use grid::{aggregate_history, Aggregation, Grid, Histogram};
pub use handle::{Handle, Params};
pub use intensity::{heat, normalize, IntensityMatrix};
pub use kml::KmlHistorySource;
pub use queue::{InMemoryTaskQueue, Task, TaskQueue};
pub use request::RenderRequest;
pub use source::{HistorySource, LocationRecord, RecordHistorySource};
pub use visualizer::{BwPngVisualizer, Style, SvgVisualizer, Visualizer};

#[cfg(feature = "parallel")]
pub use queue::RayonTaskQueue;

#[cfg(feature = "http")]
pub use http::{HttpHistorySource, HttpSourceConfig};

// ============================================================================
// Core Types
// ============================================================================

/// A geographic coordinate in degrees.
///
/// No range validation is applied: values outside [-90, 90] / [-180, 180] are
/// legal during computation (reversed bounding boxes shift longitudes by 360).
///
/// # Example
/// ```
/// use latvis::Coordinate;
/// let point = Coordinate::new(51.5074, -0.1278); // London
/// assert_eq!(point.lat, 51.5074);
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    /// Create a new coordinate.
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

impl From<Coord<f64>> for Coordinate {
    fn from(c: Coord<f64>) -> Self {
        Self::new(c.y, c.x)
    }
}

impl From<Point<f64>> for Coordinate {
    fn from(p: Point<f64>) -> Self {
        Self::new(p.y(), p.x())
    }
}

impl From<Coordinate> for Coord<f64> {
    fn from(c: Coordinate) -> Self {
        Coord { x: c.lng, y: c.lat }
    }
}

impl From<Coordinate> for Point<f64> {
    fn from(c: Coordinate) -> Self {
        Point::new(c.lng, c.lat)
    }
}

/// An ordered, append-only sequence of coordinates.
///
/// Insertion order has no effect on rendering; aggregation only counts points.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct History {
    points: Vec<Coordinate>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            points: Vec::with_capacity(capacity),
        }
    }

    /// Append a single coordinate.
    pub fn push(&mut self, c: Coordinate) {
        self.points.push(c);
    }

    /// Append every coordinate of `other`, preserving its order.
    pub fn extend_from(&mut self, other: &History) {
        self.points.extend_from_slice(&other.points);
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Coordinate at `index`. Panics when out of range.
    pub fn at(&self, index: usize) -> Coordinate {
        self.points[index]
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Coordinate> {
        self.points.iter()
    }

    pub fn as_slice(&self) -> &[Coordinate] {
        &self.points
    }
}

impl FromIterator<Coordinate> for History {
    fn from_iter<I: IntoIterator<Item = Coordinate>>(iter: I) -> Self {
        Self {
            points: iter.into_iter().collect(),
        }
    }
}

impl Extend<Coordinate> for History {
    fn extend<I: IntoIterator<Item = Coordinate>>(&mut self, iter: I) {
        self.points.extend(iter);
    }
}

impl<'a> IntoIterator for &'a History {
    type Item = &'a Coordinate;
    type IntoIter = std::slice::Iter<'a, Coordinate>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}

impl From<Vec<Coordinate>> for History {
    fn from(points: Vec<Coordinate>) -> Self {
        Self { points }
    }
}

/// Build a history from a GPS track (x = longitude, y = latitude).
impl From<&LineString<f64>> for History {
    fn from(line: &LineString<f64>) -> Self {
        line.coords().map(|c| Coordinate::from(*c)).collect()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_append_and_index() {
        let mut history = History::new();
        assert!(history.is_empty());

        history.push(Coordinate::new(1.0, 2.0));
        history.push(Coordinate::new(3.0, 4.0));

        assert_eq!(history.len(), 2);
        assert_eq!(history.at(0), Coordinate::new(1.0, 2.0));
        assert_eq!(history.at(1), Coordinate::new(3.0, 4.0));
    }

    #[test]
    fn test_history_concatenation() {
        let mut a: History = vec![Coordinate::new(1.0, 1.0)].into();
        let b: History = vec![Coordinate::new(2.0, 2.0), Coordinate::new(3.0, 3.0)].into();

        a.extend_from(&b);

        assert_eq!(a.len(), 3);
        assert_eq!(a.at(2), Coordinate::new(3.0, 3.0));
        // The source is untouched
        assert_eq!(b.len(), 2);
    }

    #[test]
    fn test_geo_conversions_swap_axes() {
        let c = Coordinate::new(51.5, -0.12);
        let coord: Coord<f64> = c.into();
        assert_eq!(coord.x, -0.12);
        assert_eq!(coord.y, 51.5);
        assert_eq!(Coordinate::from(coord), c);

        let point: Point<f64> = c.into();
        assert_eq!(Coordinate::from(point), c);
    }

    #[test]
    fn test_history_from_line_string() {
        let line = LineString::from(vec![(-0.12, 51.5), (-0.13, 51.6)]);
        let history = History::from(&line);

        assert_eq!(history.len(), 2);
        assert_eq!(history.at(1), Coordinate::new(51.6, -0.13));
    }
}
