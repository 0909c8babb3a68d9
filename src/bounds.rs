//! # Bounding Boxes
//!
//! Rectangular geographic windows, including windows that straddle the
//! ±180° antimeridian.
//!
//! ## Overview
//!
//! | Item | Description |
//! |------|-------------|
//! | [`BoundingBox::new`] | Validated construction (latitude ordering only) |
//! | [`BoundingBox::contains`] | Strict, wrap-aware containment |
//! | [`BoundingBox::width_fraction`] | Horizontal position of a point inside the box |
//! | [`BoundingBox::enclosing`] | Smallest box around a history |
//! | [`output_dimensions`] | Image size that preserves the box aspect ratio |
//!
//! ## Reversed Boxes
//!
//! Latitude never wraps, so `lower_left.lat <= upper_right.lat` is enforced.
//! Longitude does: when `lower_left.lng > upper_right.lng` the box is read as
//! running east from `lower_left.lng` across the antimeridian to
//! `upper_right.lng`. Internally the right edge moves to `upper_right.lng + 360`
//! and points with negative longitude move by +360 as well, so a box from 179°
//! to -179° is 2° wide and contains both 179.5° and -179.5°.
//!
//! ```rust
//! use latvis::{BoundingBox, Coordinate};
//!
//! let bounds = BoundingBox::new(
//!     Coordinate::new(1.0, 179.0),
//!     Coordinate::new(10.0, -179.0),
//! ).unwrap();
//!
//! assert_eq!(bounds.width(), 2.0);
//! assert!(bounds.contains(&Coordinate::new(5.0, -179.5)));
//! ```

use geo::{BoundingRect, MultiPoint, Point};

use crate::error::{Error, Result};
use crate::{Coordinate, History};

const FULL_TURN: f64 = 360.0;

/// A geographic window, possibly wrapping the antimeridian.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    lower_left: Coordinate,
    upper_right: Coordinate,
}

impl BoundingBox {
    /// Create a bounding box.
    ///
    /// Fails with [`Error::InvalidBounds`] when the lower-left latitude is above
    /// the upper-right latitude. Longitudes are never validated.
    pub fn new(lower_left: Coordinate, upper_right: Coordinate) -> Result<Self> {
        if lower_left.lat > upper_right.lat {
            return Err(Error::InvalidBounds {
                lower: lower_left.lat,
                upper: upper_right.lat,
            });
        }
        Ok(Self {
            lower_left,
            upper_right,
        })
    }

    /// Smallest non-wrapping box around every point of `history`.
    ///
    /// Returns `None` for an empty history.
    pub fn enclosing(history: &History) -> Option<Self> {
        let points: MultiPoint<f64> = history.iter().map(|c| Point::from(*c)).collect();
        let rect = points.bounding_rect()?;
        Some(Self {
            lower_left: Coordinate::from(rect.min()),
            upper_right: Coordinate::from(rect.max()),
        })
    }

    pub fn lower_left(&self) -> Coordinate {
        self.lower_left
    }

    pub fn upper_right(&self) -> Coordinate {
        self.upper_right
    }

    /// Whether the box crosses the antimeridian.
    pub fn is_reversed(&self) -> bool {
        self.lower_left.lng > self.upper_right.lng
    }

    /// Angular width in degrees, always positive for a wrapping box.
    pub fn width(&self) -> f64 {
        if self.is_reversed() {
            self.upper_right.lng - self.lower_left.lng + FULL_TURN
        } else {
            self.upper_right.lng - self.lower_left.lng
        }
    }

    /// Angular height in degrees.
    pub fn height(&self) -> f64 {
        self.upper_right.lat - self.lower_left.lat
    }

    /// Strict containment: points on any edge are outside.
    pub fn contains(&self, c: &Coordinate) -> bool {
        let box_shift = if self.is_reversed() { FULL_TURN } else { 0.0 };
        let lng = self.shifted_lng(c);

        c.lat > self.lower_left.lat
            && c.lat < self.upper_right.lat
            && lng > self.lower_left.lng
            && lng < self.upper_right.lng + box_shift
    }

    /// Fractional horizontal position of `c`, 0 at the west edge and 1 at the
    /// east edge. Not clamped; check [`contains`](Self::contains) first.
    pub fn width_fraction(&self, c: &Coordinate) -> f64 {
        (self.shifted_lng(c) - self.lower_left.lng) / self.width()
    }

    /// Fractional vertical position of `c`, 0 at the south edge and 1 at the
    /// north edge. Not clamped.
    pub fn height_fraction(&self, c: &Coordinate) -> f64 {
        (c.lat - self.lower_left.lat) / self.height()
    }

    /// Longitude of `c` in the box's unwrapped frame.
    fn shifted_lng(&self, c: &Coordinate) -> f64 {
        if self.is_reversed() && c.lng < 0.0 {
            c.lng + FULL_TURN
        } else {
            c.lng
        }
    }
}

/// Image dimensions for `bounds` whose longer side is `max_px`.
///
/// The shorter side is scaled by the box aspect ratio and truncated, but never
/// drops below one pixel.
pub fn output_dimensions(bounds: &BoundingBox, max_px: u32) -> (u32, u32) {
    let max = max_px as f64;
    let skew = bounds.height() / bounds.width();

    let (w, h) = if skew > 1.0 {
        (max / skew, max)
    } else {
        (max, max * skew)
    };

    ((w as u32).max(1), (h as u32).max(1))
}
