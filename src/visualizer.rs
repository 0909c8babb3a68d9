//! Visualizers: history in, image bytes out.
//!
//! A [`Visualizer`] runs the whole pipeline for one output style:
//! aggregate the history into a grid, then render. The two styles share the
//! aggregation step and differ only in what they draw.

use std::fmt;
use std::str::FromStr;

use image::RgbaImage;
use serde::{Deserialize, Serialize};

use crate::bounds::BoundingBox;
use crate::config::{RenderConfig, SvgStyle};
use crate::error::{Error, Result};
use crate::grid::aggregate_history;
use crate::intensity::normalize;
use crate::{raster, svg, History};

/// Turns a location history into an encoded image.
///
/// `width`/`height` are grid dimensions: pixels for raster output, lattice
/// points for vector output. Implementations are pure and deterministic.
pub trait Visualizer: Send + Sync {
    fn visualize(
        &self,
        history: &History,
        bounds: &BoundingBox,
        width: usize,
        height: usize,
    ) -> Result<Vec<u8>>;

    /// MIME type of the bytes produced.
    fn content_type(&self) -> &'static str;

    /// File extension for the bytes produced.
    fn suffix(&self) -> &'static str;
}

/// Black/white density silhouette, PNG encoded.
#[derive(Debug, Clone, Copy, Default)]
pub struct BwPngVisualizer;

impl BwPngVisualizer {
    /// Build the decoded image; exposed so callers can inspect pixels.
    pub fn make_image(
        &self,
        history: &History,
        bounds: &BoundingBox,
        width: usize,
        height: usize,
    ) -> Result<RgbaImage> {
        check_dimensions(width, height)?;
        let aggregation = aggregate_history(history, bounds, width, height);
        raster::bw_image(&normalize(&aggregation.grid))
    }
}

impl Visualizer for BwPngVisualizer {
    fn visualize(
        &self,
        history: &History,
        bounds: &BoundingBox,
        width: usize,
        height: usize,
    ) -> Result<Vec<u8>> {
        check_dimensions(width, height)?;
        let aggregation = aggregate_history(history, bounds, width, height);
        raster::render_bw_png(&normalize(&aggregation.grid))
    }

    fn content_type(&self) -> &'static str {
        "image/png"
    }

    fn suffix(&self) -> &'static str {
        "png"
    }
}

/// Dot-density SVG.
#[derive(Debug, Clone, Default)]
pub struct SvgVisualizer {
    pub style: SvgStyle,
}

impl SvgVisualizer {
    pub fn new(style: SvgStyle) -> Self {
        Self { style }
    }
}

impl Visualizer for SvgVisualizer {
    fn visualize(
        &self,
        history: &History,
        bounds: &BoundingBox,
        width: usize,
        height: usize,
    ) -> Result<Vec<u8>> {
        check_dimensions(width, height)?;
        let aggregation = aggregate_history(history, bounds, width, height);
        aggregation.grid.histogram(5).log();
        svg::render_svg(&aggregation.grid, &self.style)
    }

    fn content_type(&self) -> &'static str {
        "image/svg+xml"
    }

    fn suffix(&self) -> &'static str {
        "svg"
    }
}

fn check_dimensions(width: usize, height: usize) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(Error::Encoding(format!(
            "cannot encode a {}x{} image",
            width, height
        )));
    }
    Ok(())
}

/// Output style selector carried by render requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Style {
    /// Black/white PNG
    #[default]
    #[serde(rename = "bw")]
    BlackWhite,
    /// SVG dot density
    #[serde(rename = "svg")]
    Dots,
}

impl Style {
    /// The visualizer for this style, configured from `config`.
    pub fn visualizer(&self, config: &RenderConfig) -> Box<dyn Visualizer> {
        match self {
            Style::BlackWhite => Box::new(BwPngVisualizer),
            Style::Dots => Box::new(SvgVisualizer::new(config.svg.clone())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Style::BlackWhite => "bw",
            Style::Dots => "svg",
        }
    }
}

impl fmt::Display for Style {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Style {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "bw" => Ok(Style::BlackWhite),
            "svg" => Ok(Style::Dots),
            other => Err(Error::UnknownStyle(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::{BLACK, WHITE};
    use crate::Coordinate;
    use image::Rgba;

    fn bbox(ll_lat: f64, ll_lng: f64, ur_lat: f64, ur_lng: f64) -> BoundingBox {
        BoundingBox::new(Coordinate::new(ll_lat, ll_lng), Coordinate::new(ur_lat, ur_lng)).unwrap()
    }

    /// `expected[y][x]`, laid out the way the image reads top to bottom.
    fn assert_image(expected: &[&[Rgba<u8>]], actual: &RgbaImage) {
        assert_eq!(actual.height() as usize, expected.len(), "Unexpected image height");
        assert_eq!(actual.width() as usize, expected[0].len(), "Unexpected image width");
        for (y, row) in expected.iter().enumerate() {
            for (x, pixel) in row.iter().enumerate() {
                assert_eq!(
                    actual.get_pixel(x as u32, y as u32),
                    pixel,
                    "Unexpected pixel at: ({}, {})",
                    x,
                    y
                );
            }
        }
    }

    const B: Rgba<u8> = BLACK;
    const W: Rgba<u8> = WHITE;

    #[test]
    fn test_bw_2_by_2() {
        let bounds = bbox(0.0, 0.0, 2.0, 2.0);
        let mut history: History = vec![Coordinate::new(0.5, 0.5)].into();

        let img = BwPngVisualizer.make_image(&history, &bounds, 2, 2).unwrap();
        assert_image(&[&[W, W], &[B, W]], &img);

        history.push(Coordinate::new(1.5, 1.5));

        let img = BwPngVisualizer.make_image(&history, &bounds, 2, 2).unwrap();
        assert_image(&[&[W, B], &[B, W]], &img);
    }

    #[test]
    fn test_bw_not_square() {
        let bounds = bbox(0.0, 0.0, 3.0, 5.0);
        let history: History = vec![
            Coordinate::new(0.5, 0.5),
            Coordinate::new(1.5, 1.5),
            Coordinate::new(2.5, 2.5),
            Coordinate::new(1.5, 3.5),
            Coordinate::new(0.5, 4.5),
        ]
        .into();

        let img = BwPngVisualizer.make_image(&history, &bounds, 5, 3).unwrap();
        assert_image(
            &[
                &[W, W, B, W, W],
                &[W, B, W, B, W],
                &[B, W, W, W, B],
            ],
            &img,
        );
    }

    #[test]
    fn test_bw_smushed_into_corner() {
        let bounds = bbox(0.0, 0.0, 50.0, 50.0);
        // Lots of points, but they're all in the lower left
        let history: History = (1..=5).map(|i| Coordinate::new(i as f64, i as f64)).collect();

        let img = BwPngVisualizer.make_image(&history, &bounds, 2, 2).unwrap();
        assert_image(&[&[W, W], &[B, W]], &img);
    }

    #[test]
    fn test_bw_rendering_is_deterministic() {
        let bounds = bbox(0.0, 0.0, 2.0, 2.0);
        let history: History = vec![Coordinate::new(0.5, 0.5), Coordinate::new(1.2, 0.3)].into();

        let a = BwPngVisualizer.visualize(&history, &bounds, 16, 16).unwrap();
        let b = BwPngVisualizer.visualize(&history, &bounds, 16, 16).unwrap();
        assert_eq!(a, b);
        assert_eq!(&a[..4], b"\x89PNG");
    }

    #[test]
    fn test_svg_rendering_is_deterministic() {
        let bounds = bbox(0.0, 0.0, 2.0, 2.0);
        let points = vec![
            Coordinate::new(0.5, 0.5),
            Coordinate::new(1.2, 0.3),
            Coordinate::new(1.2, 0.3),
            Coordinate::new(1.9, 1.9),
        ];
        let history: History = points.clone().into();
        let reversed: History = points.into_iter().rev().collect();
        let visualizer = SvgVisualizer::default();

        let a = visualizer.visualize(&history, &bounds, 8, 8).unwrap();
        let b = visualizer.visualize(&history, &bounds, 8, 8).unwrap();
        let c = visualizer.visualize(&reversed, &bounds, 8, 8).unwrap();

        assert_eq!(a, b);
        // Circles follow grid order, not history order
        assert_eq!(a, c);
        assert_eq!(String::from_utf8(a).unwrap().matches("<circle").count(), 3);
    }

    #[test]
    fn test_svg_visualizer_output() {
        let bounds = bbox(0.0, 0.0, 2.0, 2.0);
        let history: History = vec![Coordinate::new(0.5, 0.5)].into();

        let bytes = SvgVisualizer::default().visualize(&history, &bounds, 2, 2).unwrap();
        let svg = String::from_utf8(bytes).unwrap();

        assert!(svg.contains(r#"width="20" height="20""#));
        assert!(svg.contains(r#"cx="0" cy="10""#));
    }

    #[test]
    fn test_zero_dimensions_fail_before_aggregation() {
        let bounds = bbox(0.0, 0.0, 2.0, 2.0);
        let history: History = vec![Coordinate::new(0.5, 0.5)].into();

        assert!(matches!(
            BwPngVisualizer.visualize(&history, &bounds, 0, 2),
            Err(Error::Encoding(_))
        ));
        assert!(matches!(
            SvgVisualizer::default().visualize(&history, &bounds, 2, 0),
            Err(Error::Encoding(_))
        ));
    }

    #[test]
    fn test_style_parsing() {
        assert_eq!("bw".parse::<Style>().unwrap(), Style::BlackWhite);
        assert_eq!("svg".parse::<Style>().unwrap(), Style::Dots);
        assert!(matches!("sepia".parse::<Style>(), Err(Error::UnknownStyle(_))));
        assert_eq!(Style::Dots.to_string(), "svg");
    }

    #[test]
    fn test_style_picks_visualizer() {
        let config = RenderConfig::default();
        assert_eq!(Style::BlackWhite.visualizer(&config).content_type(), "image/png");
        assert_eq!(Style::Dots.visualizer(&config).suffix(), "svg");
    }
}
