//! Render configuration.
//!
//! Built once at startup (from defaults or a JSON file) and passed by
//! reference to the engine and renderers.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::visualizer::Style;

/// Configuration for the render pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    /// Pixels along the longer side of a rendered image.
    /// Default: 512
    pub image_size_px: u32,

    /// Style used when a request does not name one.
    /// Default: black/white PNG
    pub default_style: Style,

    /// Dot geometry for SVG output.
    pub svg: SvgStyle,

    /// Directory for the filesystem blob store.
    /// Default: "images"
    pub blob_dir: PathBuf,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            image_size_px: 512,
            default_style: Style::BlackWhite,
            svg: SvgStyle::default(),
            blob_dir: PathBuf::from("images"),
        }
    }
}

impl RenderConfig {
    /// Load a configuration from a JSON file. Missing fields take defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let data = std::fs::read(path)?;
        Ok(serde_json::from_slice(&data)?)
    }
}

/// Geometry of the SVG dot-density renderer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SvgStyle {
    /// Distance between neighbouring cell centres in SVG user units.
    /// Default: 10
    pub spacing: u32,

    /// Radius approached by the densest cells.
    /// Default: 5.0
    pub max_radius: f64,

    /// Count scale of the logistic radius curve; larger values grow dots
    /// more slowly. Default: 10.0
    pub tau: f64,
}

impl Default for SvgStyle {
    fn default() -> Self {
        Self {
            spacing: 10,
            max_radius: 5.0,
            tau: 10.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_partial_json_takes_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"image_size_px": 256, "svg": {{"tau": 4.0}}, "default_style": "svg"}}"#).unwrap();

        let config = RenderConfig::from_json_file(file.path()).unwrap();

        assert_eq!(config.image_size_px, 256);
        assert_eq!(config.default_style, Style::Dots);
        assert_eq!(config.svg.tau, 4.0);
        assert_eq!(config.svg.spacing, 10);
        assert_eq!(config.blob_dir, PathBuf::from("images"));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = RenderConfig::from_json_file(Path::new("/nonexistent/latvis.json"));
        assert!(matches!(result, Err(crate::Error::Io(_))));
    }
}
